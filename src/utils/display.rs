use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

/// One outbound reply message, numbered from 1.
pub fn print_segment(index: usize, text: &str) {
    println!("{} {}", format!("[{}]", index + 1).yellow().bold(), text);
}
