//! Confirmation prompt with non-interactive fallback

use super::context::UiContext;
use crate::error::{ForgeError, ForgeResult};
use std::io::{self, Write};

/// Ask a yes/no question. Returns `true` under `--yes` and `default`
/// when stdin is not a terminal.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ForgeResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    let fancy = ctx.use_fancy_output();
    let answer = tokio::task::spawn_blocking(move || {
        if fancy {
            cliclack::confirm(&message).initial_value(default).interact()
        } else {
            confirm_inline(&message, default)
        }
    })
    .await
    .map_err(|e| ForgeError::User(format!("Prompt task failed: {}", e)))?;

    answer.map_err(|e| ForgeError::User(format!("Prompt failed: {}", e)))
}

/// Plain `[y/N]` prompt for `--quiet` terminals
fn confirm_inline(message: &str, default: bool) -> io::Result<bool> {
    print!("{} {} ", message, if default { "[Y/n]" } else { "[y/N]" });
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(parse_answer(&input, default))
}

fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}
