//! Operator console commands.

pub const HELP: &str = "Server commands:\n\
\tkick <name>           - disconnect a client\n\
\tbroadcast <message>   - send a message to every client\n\
\tmsg <name> <message>  - send a message to one client\n\
\tclients               - list connected clients\n\
\tkill                  - kick everyone, wipe credentials and stop\n\
\thelp                  - show this list";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Kick(String),
    Clients,
    Broadcast(String),
    Message { to: String, message: String },
    Kill,
    Help,
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }

        let (verb, rest) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match (verb, rest) {
            ("clients", "") => ConsoleCommand::Clients,
            ("kill", "") => ConsoleCommand::Kill,
            ("help", "") => ConsoleCommand::Help,
            ("kick", name) if !name.is_empty() => ConsoleCommand::Kick(name.to_string()),
            ("broadcast", message) if !message.is_empty() => ConsoleCommand::Broadcast(message.to_string()),
            ("msg", rest) => match rest.split_once(' ') {
                Some((to, message)) if !message.trim().is_empty() => ConsoleCommand::Message {
                    to: to.to_string(),
                    message: message.trim().to_string(),
                },
                _ => ConsoleCommand::Unknown(line.to_string()),
            },
            _ => ConsoleCommand::Unknown(line.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_commands() {
        assert_eq!(ConsoleCommand::parse("clients"), ConsoleCommand::Clients);
        assert_eq!(ConsoleCommand::parse("  kill "), ConsoleCommand::Kill);
        assert_eq!(ConsoleCommand::parse("kick bob"), ConsoleCommand::Kick("bob".into()));
        assert_eq!(
            ConsoleCommand::parse("broadcast back in 5"),
            ConsoleCommand::Broadcast("back in 5".into())
        );
        assert_eq!(
            ConsoleCommand::parse("msg alice read the rules"),
            ConsoleCommand::Message { to: "alice".into(), message: "read the rules".into() }
        );
        assert_eq!(ConsoleCommand::parse(""), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("kick"), ConsoleCommand::Unknown("kick".into()));
        assert_eq!(ConsoleCommand::parse("msg alice"), ConsoleCommand::Unknown("msg alice".into()));
        assert_eq!(ConsoleCommand::parse("reboot"), ConsoleCommand::Unknown("reboot".into()));
    }
}
