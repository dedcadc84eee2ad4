//! Small colored-output helpers, mirroring `dashflow-cli::output`'s
//! `print_*` family at a scale that fits a single-binary driver.

use colored::Colorize;

pub fn print_success(msg: &str) {
    println!("{} {msg}", "✓".bright_green().bold());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {msg}", "✗".bright_red().bold());
}

pub fn print_warning(msg: &str) {
    println!("{} {msg}", "⚠".bright_yellow().bold());
}

pub fn print_info(msg: &str) {
    println!("{} {msg}", "ℹ".bright_blue());
}

pub fn section(title: &str) {
    println!("\n{}", title.bold().underline());
}
