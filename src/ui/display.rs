use console::style;

use crate::display_println;

pub fn print_header(title: &str) {
    display_println!("{}", style(title).blue().bold());
    display_println!("{}", "─".repeat(50));
}

pub fn print_success(message: &str) {
    display_println!("{} {}", style("✓").green(), message);
}

pub fn print_warning(message: &str) {
    display_println!("{} {}", style("!").yellow(), message);
}

pub fn print_info(message: &str) {
    display_println!("{} {}", style("i").blue(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", style("✗").red(), message);
}
