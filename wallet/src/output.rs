//! Terminal output helpers

use colored::Colorize;
use serde::Serialize;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print an indented `label: value` line
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).dimmed(), value);
}

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
