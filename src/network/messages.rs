use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;

/// Reply tokens sent during authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginResponse {
    LoginAccepted,
    Registered,
    PasswordInvalid,
    AlreadyLoggedIn,
    InvalidUsername,
}

impl LoginResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginResponse::LoginAccepted => "LOGIN_ACCEPTED",
            LoginResponse::Registered => "REGISTERED",
            LoginResponse::PasswordInvalid => "PASSWORD_INVALID",
            LoginResponse::AlreadyLoggedIn => "ALREADY_LOGGED_IN",
            LoginResponse::InvalidUsername => "INVALID_USERNAME",
        }
    }

    /// True if this token ends the credential loop
    pub fn is_accepted(&self) -> bool {
        matches!(self, LoginResponse::LoginAccepted | LoginResponse::Registered)
    }
}

impl fmt::Display for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginResponse {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN_ACCEPTED" => Ok(LoginResponse::LoginAccepted),
            "REGISTERED" => Ok(LoginResponse::Registered),
            "PASSWORD_INVALID" => Ok(LoginResponse::PasswordInvalid),
            "ALREADY_LOGGED_IN" => Ok(LoginResponse::AlreadyLoggedIn),
            "INVALID_USERNAME" => Ok(LoginResponse::InvalidUsername),
            other => Err(ChatError::Protocol(format!("unknown login response {:?}", other))),
        }
    }
}

pub const CLIENTS_COMMAND: &str = ":clients";
pub const CHANGE_PASSWORD_PREFIX: &str = ":changePassword ";

/// A decrypted line from an authenticated peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    ListClients,
    ChangePassword(&'a str),
    Private { to: &'a str, message: &'a str },
    Broadcast(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        if line == CLIENTS_COMMAND {
            return Command::ListClients;
        }
        if let Some(password) = line.strip_prefix(CHANGE_PASSWORD_PREFIX) {
            return Command::ChangePassword(password);
        }
        if let Some((to, message)) = parse_private(line) {
            return Command::Private { to, message };
        }
        Command::Broadcast(line)
    }
}

// `@name message` with name made of word characters and exactly one separating space
fn parse_private(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('@')?;
    let (to, message) = rest.split_once(' ')?;
    if crate::credentials::is_valid_principal_name(to) {
        Some((to, message))
    } else {
        None
    }
}

// Texts delivered to peers

pub const WRONG_NICKNAME: &str = "SERVER: WRONG NICKNAME";
pub const PASSWORD_CHANGED: &str = "PASSWORD CHANGED";
pub const PASSWORD_CHANGE_FAILED: &str = "SERVER: PASSWORD CHANGE FAILED";
pub const KICKED: &str = "SERVER: You have been kicked.";

pub fn join_notice(name: &str) -> String {
    format!("SERVER: {} has joined this chatting room", name)
}

pub fn departure_notice(name: &str) -> String {
    format!("{} has disconnected this chatting room", name)
}

pub fn chat_line(from: &str, message: &str) -> String {
    format!("{}: {}", from, message)
}

pub fn private_line(from: &str, message: &str) -> String {
    format!("PRIVATE {}: {}", from, message)
}

pub fn server_line(message: &str) -> String {
    format!("SERVER: {}", message)
}

pub fn client_list_entry(name: &str) -> String {
    format!("\t{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_round_trip_tokens() {
        for response in [
            LoginResponse::LoginAccepted,
            LoginResponse::Registered,
            LoginResponse::PasswordInvalid,
            LoginResponse::AlreadyLoggedIn,
            LoginResponse::InvalidUsername,
        ] {
            assert_eq!(response.as_str().parse::<LoginResponse>().unwrap(), response);
        }
        assert!("LOGIN ACCEPTED".parse::<LoginResponse>().is_err());
    }

    #[test]
    fn test_accepting_tokens() {
        assert!(LoginResponse::LoginAccepted.is_accepted());
        assert!(LoginResponse::Registered.is_accepted());
        assert!(!LoginResponse::PasswordInvalid.is_accepted());
        assert!(!LoginResponse::AlreadyLoggedIn.is_accepted());
        assert!(!LoginResponse::InvalidUsername.is_accepted());
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse(":clients"), Command::ListClients);
        assert_eq!(Command::parse(":clients now"), Command::Broadcast(":clients now"));
        assert_eq!(Command::parse(":changePassword s3cret pw"), Command::ChangePassword("s3cret pw"));
        assert_eq!(Command::parse(":changePassword"), Command::Broadcast(":changePassword"));
        assert_eq!(
            Command::parse("@bob secret stuff"),
            Command::Private { to: "bob", message: "secret stuff" }
        );
        assert_eq!(Command::parse("@bob "), Command::Private { to: "bob", message: "" });
        assert_eq!(Command::parse("@bob"), Command::Broadcast("@bob"));
        assert_eq!(Command::parse("@b-ob hi"), Command::Broadcast("@b-ob hi"));
        assert_eq!(Command::parse("hello"), Command::Broadcast("hello"));
    }

    #[test]
    fn test_notice_texts() {
        assert_eq!(chat_line("alice", "hi"), "alice: hi");
        assert_eq!(private_line("alice", "psst"), "PRIVATE alice: psst");
        assert_eq!(departure_notice("bob"), "bob has disconnected this chatting room");
        assert_eq!(client_list_entry("bob"), "\tbob");
    }
}
