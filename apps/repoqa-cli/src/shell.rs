//! Interactive question loop over the persisted index.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

use repoqa_index::IndexSearcher;

use crate::answer::Answerer;

const TOP_K: usize = 5;

/// Collapses internal whitespace runs to single spaces and trims the ends.
pub fn normalize_question(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("exit")
}

/// Reads the next line unless the session is interrupted first.
/// `Ok(None)` means the session is over, by interrupt or end of input.
async fn read_input<R>(lines: &mut Lines<R>, cancel: &CancellationToken) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(None),
        line = lines.next_line() => Ok(line?),
    }
}

pub async fn run(
    searcher: &IndexSearcher,
    answerer: &Answerer,
    cancel: &CancellationToken,
) -> Result<()> {
    println!("Welcome to the repoqa CLI tool!");
    println!("Enter your question and press Enter to get an answer.");
    println!("Type 'exit' to quit the program.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Your question: ");
        std::io::stdout().flush()?;
        let Some(line) = read_input(&mut lines, cancel).await? else {
            if cancel.is_cancelled() {
                println!("\nExiting program...");
            }
            break;
        };
        if is_exit(&line) {
            break;
        }
        let question = normalize_question(&line);
        if question.is_empty() {
            println!("Error: Please enter a valid question.\n");
            continue;
        }
        match answer_one(searcher, answerer, &question).await {
            Ok(answer) => println!("\nAnswer: {answer}\n"),
            Err(e) => {
                println!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn answer_one(
    searcher: &IndexSearcher,
    answerer: &Answerer,
    question: &str,
) -> Result<String> {
    let hits = searcher.search(question, TOP_K).await?;
    answerer.answer(question, &hits).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_spaces_collapse_to_one() {
        assert_eq!(normalize_question("what   is   foundry"), "what is foundry");
    }

    #[test]
    fn tabs_and_newlines_normalize_too() {
        assert_eq!(normalize_question("\twhat\nis \t foundry\n"), "what is foundry");
    }

    #[test]
    fn whitespace_only_input_normalizes_to_empty() {
        assert_eq!(normalize_question("   \t  \n"), "");
        assert_eq!(normalize_question(""), "");
    }

    #[test]
    fn exit_is_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("EXIT"));
        assert!(is_exit("Exit\n"));
        assert!(!is_exit("exit now"));
    }

    #[tokio::test]
    async fn interrupt_ends_the_session_before_the_next_read() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut lines = BufReader::new(&b"still waiting\n"[..]).lines();
        let input = read_input(&mut lines, &cancel).await.unwrap();
        assert!(input.is_none(), "an interrupted session must stop reading");
    }

    #[tokio::test]
    async fn uninterrupted_sessions_read_until_end_of_input() {
        let cancel = CancellationToken::new();
        let mut lines = BufReader::new(&b"what is foundry\n"[..]).lines();
        assert_eq!(
            read_input(&mut lines, &cancel).await.unwrap().as_deref(),
            Some("what is foundry")
        );
        assert_eq!(read_input(&mut lines, &cancel).await.unwrap(), None);
    }
}
