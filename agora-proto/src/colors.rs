//! ANSI color codes used by the `show`/`jobs` handlers to highlight
//! open/closed events and full/available jobs.

pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const ORANGE: &str = "\x1b[38;5;208m";
pub const CYAN: &str = "\x1b[36m";
pub const BOLD: &str = "\x1b[1m";

pub fn paint(color: &str, text: &str) -> String {
    format!("{color}{text}{RESET}")
}
