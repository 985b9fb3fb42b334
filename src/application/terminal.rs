#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use owo_colors::OwoColorize;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;

use crate::domain::models::ChatConsole;
use crate::domain::models::ChatParams;

/// Draws a rounded box around the given lines.
pub fn info_box(text: &str) -> String {
    let lines = text.lines().collect::<Vec<&str>>();
    let width = lines
        .iter()
        .map(|line| return line.chars().count())
        .max()
        .unwrap_or_default();

    let mut res = vec![format!("╭{}╮", "─".repeat(width + 2))];
    for line in lines {
        let padding = " ".repeat(width - line.chars().count());
        res.push(format!("│ {line}{padding} │"));
    }
    res.push(format!("╰{}╯", "─".repeat(width + 2)));

    return res.join("\n");
}

pub fn format_chat_params(params: &ChatParams) -> String {
    return format!(
        "Temperature: {:.2}\nMax Tokens: {}\nStreaming: {}",
        params.temperature, params.max_tokens, params.stream
    );
}

pub fn print_header(text: &str) {
    println!("{}", text.magenta().bold());
}

pub fn print_notice(text: &str) {
    println!("{}", text.dimmed());
}

pub fn print_warning(text: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), text.yellow());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

/// Reads user lines from stdin and writes replies to stdout.
pub struct TerminalConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for TerminalConsole {
    fn default() -> TerminalConsole {
        return TerminalConsole {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        };
    }
}

#[async_trait]
impl ChatConsole for TerminalConsole {
    #[allow(clippy::implicit_return)]
    async fn read_line(&mut self) -> Result<Option<String>> {
        print!("{} ", "You:".cyan().bold());
        std::io::stdout().flush()?;

        let line = self.lines.next_line().await?;
        if line.is_none() {
            println!();
        }

        return Ok(line);
    }

    fn render_reply(&mut self, model: &str, text: &str) -> Result<()> {
        println!("{}", format!("{model}:").green().bold());
        println!("{text}\n");
        return Ok(());
    }

    fn render_notice(&mut self, text: &str) -> Result<()> {
        print_notice(text);
        return Ok(());
    }
}
