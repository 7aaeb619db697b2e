//! Styled line output shared by the commands

use console::{style, Emoji, Style};

static CHECK: Emoji<'_, '_> = Emoji("✓", "[OK]");
static CROSS: Emoji<'_, '_> = Emoji("✗", "[FAIL]");
static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
static INFO: Emoji<'_, '_> = Emoji("•", "[INFO]");

/// Bold cyan title followed by a blank line
pub fn header(title: &str) {
    println!("{}", style(title).cyan().bold());
    println!();
}

/// Bold section heading preceded by a blank line
pub fn section(title: &str) {
    println!();
    println!("{}", style(title).bold());
}

pub fn step_ok(message: &str) {
    println!("  {} {}", style(CHECK).green(), message);
}

pub fn step_ok_detail(message: &str, detail: &str) {
    println!("  {} {} ({})", style(CHECK).green(), message, style(detail).dim());
}

pub fn step_warn(message: &str) {
    println!("  {} {}", style(WARN).yellow(), message);
}

pub fn step_warn_hint(message: &str, hint: &str) {
    println!("  {} {} - {}", style(WARN).yellow(), message, style(hint).dim());
}

pub fn step_error(message: &str) {
    println!("  {} {}", style(CROSS).red(), message);
}

pub fn step_error_detail(message: &str, detail: &str) {
    println!("  {} {}: {}", style(CROSS).red(), message, style(detail).red());
}

pub fn step_info(message: &str) {
    println!("  {} {}", style(INFO).cyan(), message);
}

/// Dimmed follow-up line
pub fn remark(message: &str) {
    println!("    {}", style(message).dim());
}

pub fn key_value(key: &str, value: &str) {
    println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
}

/// Key-value pair colored by health
pub fn key_value_status(key: &str, value: &str, ok: bool) {
    let value_style = if ok {
        Style::new().green()
    } else {
        Style::new().yellow()
    };
    println!("  {:<14} {}", style(format!("{}:", key)).dim(), value_style.apply_to(value));
}
