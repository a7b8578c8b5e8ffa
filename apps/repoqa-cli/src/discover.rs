//! Repository discovery helper: lists a repository's top-level directories
//! or the file extensions present on a branch, to help pick the ingest
//! allow-lists.

use std::env;

use anyhow::Result;

use repoqa_core::config::Config;
use repoqa_core::types::RepoRef;
use repoqa_github::GithubClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <dirs|extensions> [owner repo [branch]]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);

    let config = Config::load()?;
    let owner = args.first().cloned().unwrap_or_else(|| {
        config
            .get("github.owner")
            .unwrap_or_else(|_| "foundry-rs".to_string())
    });
    let repo = args.get(1).cloned().unwrap_or_else(|| {
        config
            .get("github.repo")
            .unwrap_or_else(|_| "foundry".to_string())
    });
    let branch = args.get(2).cloned().unwrap_or_else(|| {
        config
            .get("github.branch")
            .unwrap_or_else(|_| "master".to_string())
    });

    let client = GithubClient::from_env()?;
    match cmd.as_str() {
        "dirs" => {
            for dir in client.top_level_directories(&owner, &repo).await? {
                println!("{dir}");
            }
        }
        "extensions" => {
            for ext in client
                .file_extensions(&RepoRef::new(owner, repo, branch))
                .await?
            {
                println!("{ext}");
            }
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}
