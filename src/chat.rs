//! CLI chatbot: one-shot questions and an interactive loop.
//!
//! Both commands run the `merged` strategy and print a short preview of the
//! top hits. The interactive loop keeps going until the `exit` sentinel.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::models::SearchStrategy;
use crate::remote::{HttpKbClient, KbClient};
use crate::search;

const ASK_TOP_K: usize = 3;
const PREVIEW_CHARS: usize = 180;

/// One-shot question: print the top results and return.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let client = HttpKbClient::new(&config.remote)?;
    println!("Asking: {}", question);
    answer(&client, config, question).await;
    Ok(())
}

/// Interactive loop: prompt, search, print, repeat until `exit`.
pub async fn run_chat(config: &Config) -> Result<()> {
    let client = HttpKbClient::new(&config.remote)?;
    println!("Starting chat session. Type 'exit' to end.");

    let stdin = std::io::stdin();
    loop {
        print!("ask> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF ends the session like the sentinel does.
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        answer(&client, config, question).await;
    }

    Ok(())
}

async fn answer(client: &dyn KbClient, config: &Config, question: &str) {
    let mut search_config = config.search.clone();
    search_config.page_size = ASK_TOP_K;

    match search::dispatch(client, &search_config, question, SearchStrategy::Merged).await {
        Ok(results) if results.is_empty() => println!("No results found."),
        Ok(results) => {
            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, preview(&result.text, PREVIEW_CHARS));
            }
        }
        Err(e) => eprintln!("search error: {}", e),
    }
}

/// Char-safe preview: the first `max_chars` characters, whitespace-trimmed,
/// with an ellipsis when the text was cut.
fn preview(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    let truncated = truncated.trim();
    if text.chars().count() > max_chars {
        format!("{}...", truncated)
    } else {
        truncated.to_string()
    }
}
