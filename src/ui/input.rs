use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Line and masked-password input, independent of where stdin comes from
pub trait UserInput: Send {
    /// Next line without its terminator, `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Next line without echoing it where the source allows
    fn read_password(&mut self) -> io::Result<Option<String>>;
}

/// Pick the input source once at startup
pub fn detect_input() -> Box<dyn UserInput> {
    if io::stdin().is_terminal() {
        Box::new(TerminalInput::new())
    } else {
        Box::new(PipedInput::new(io::BufReader::new(io::stdin())))
    }
}

/// Interactive terminal; passwords are read in raw mode with no echo
pub struct TerminalInput;

impl TerminalInput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInput for TerminalInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_trimmed_line(&mut io::stdin().lock())
    }

    fn read_password(&mut self) -> io::Result<Option<String>> {
        io::stdout().flush()?;
        enable_raw_mode()?;
        let result = read_masked();
        disable_raw_mode()?;
        println!();
        result
    }
}

fn read_masked() -> io::Result<Option<String>> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(Some(password)),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None);
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    }
}

/// Piped or redirected stdin; passwords are plain lines
pub struct PipedInput<R> {
    reader: R,
}

impl<R: BufRead + Send> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> UserInput for PipedInput<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_trimmed_line(&mut self.reader)
    }

    fn read_password(&mut self) -> io::Result<Option<String>> {
        read_trimmed_line(&mut self.reader)
    }
}

fn read_trimmed_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_piped_input_reads_lines_and_passwords() {
        let mut input = PipedInput::new(Cursor::new("alice\r\nhunter2\nlast"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("alice"));
        assert_eq!(input.read_password().unwrap().as_deref(), Some("hunter2"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("last"));
        assert_eq!(input.read_line().unwrap(), None);
    }
}
