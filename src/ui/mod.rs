use crossterm::style::Stylize;

pub mod input;

pub use input::{detect_input, PipedInput, TerminalInput, UserInput};

/// Colour a line received from the service by its kind
pub fn style_line(line: &str) -> String {
    if line.starts_with("SERVER: ") {
        line.blue().to_string()
    } else if line.starts_with("PRIVATE ") {
        line.cyan().to_string()
    } else if line.ends_with(" has disconnected this chatting room") || line == "PASSWORD CHANGED" {
        line.yellow().to_string()
    } else if let Some((name, message)) = line.split_once(": ") {
        format!("{}: {}", name.magenta(), message)
    } else {
        line.to_string()
    }
}
