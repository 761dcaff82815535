use std::fmt::Display;

use colored::*;
use tracing::info;

use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, "{msg}");
}

pub fn banner() {
    let text = format!("⟦ LOOKOUT v{} ⟧", env!("CARGO_PKG_VERSION"));
    let side = "═".repeat(TOTAL_WIDTH.saturating_sub(text.chars().count()) / 2).bright_black();
    print(&format!("{side}{}{side}", text.bright_green().bold()));
}

pub fn header(msg: &str) {
    let formatted = format!("⟦ {msg} ⟧");
    let dash_count = TOTAL_WIDTH.saturating_sub(formatted.chars().count());
    let left = dash_count / 2;
    let right = dash_count - left;

    let line = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );
    print(&line);
}

pub fn aligned_line<V: Display>(key: &str, value: V, key_width: usize) {
    let dots = ".".repeat((key_width + 1).saturating_sub(key.chars().count()));
    print_status(format!(
        "{}{}{} {}",
        key.color(colors::PRIMARY),
        dots.color(colors::SEPARATOR),
        ":".color(colors::SEPARATOR),
        value
    ));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix = ">".color(colors::SEPARATOR);
    print(&format!("{prefix} {}", msg.as_ref()));
}

pub fn tree_head(idx: usize, name: &str) {
    let idx_str = format!("[{}]", idx.to_string().color(colors::ACCENT));
    print(&format!("{} {}", idx_str.color(colors::SEPARATOR), name.color(colors::PRIMARY)));
}

pub fn as_tree_one_level(pairs: &[(String, ColoredString)]) {
    let key_width = pairs.iter().map(|(key, _)| key.chars().count()).max().unwrap_or(0);
    for (i, (key, value)) in pairs.iter().enumerate() {
        let branch = if i + 1 == pairs.len() { "└─" } else { "├─" };
        print(&format!(
            " {} {}{}{} {}",
            branch.bright_black(),
            key.color(colors::TEXT_DEFAULT),
            ".".repeat(key_width - key.chars().count()).color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
            value
        ));
    }
}

pub fn fat_separator() {
    print(&format!("{}", "═".repeat(TOTAL_WIDTH).bright_black()));
}
