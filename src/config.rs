use std::path::PathBuf;

use crate::crypto::{DEFAULT_KEY_BITS, MAX_KEY_BITS, MIN_KEY_BITS};
use crate::error::{ChatError, ChatResult};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CREDENTIALS_PATH: &str = "Auth.txt";

pub const ENV_PORT: &str = "CIPHERCHAT_PORT";
pub const ENV_HOST: &str = "CIPHERCHAT_HOST";
pub const ENV_CREDENTIALS: &str = "CIPHERCHAT_CREDENTIALS";
pub const ENV_KEY_BITS: &str = "CIPHERCHAT_KEY_BITS";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub credentials_path: PathBuf,
    pub key_bits: usize,
}

impl ServerConfig {
    pub fn new(port: u16, credentials_path: impl Into<PathBuf>, key_bits: usize) -> Self {
        Self {
            port,
            credentials_path: credentials_path.into(),
            key_bits,
        }
    }

    /// Defaults, overridden by environment variables, overridden by
    /// positional arguments `[CREDENTIALS_PATH] [PORT]`
    pub fn from_sources<F>(env: F, args: &[String]) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = env(ENV_CREDENTIALS) {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(port) = env(ENV_PORT) {
            config.port = parse_port(&port)?;
        }
        if let Some(bits) = env(ENV_KEY_BITS) {
            config.key_bits = parse_key_bits(&bits)?;
        }

        if let Some(path) = args.first() {
            config.credentials_path = PathBuf::from(path);
        }
        if let Some(port) = args.get(1) {
            config.port = parse_port(port)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.port == 0 {
            return Err(ChatError::Config("Port cannot be 0".to_string()));
        }
        validate_key_bits(self.key_bits)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub key_bits: usize,
}

impl ClientConfig {
    /// Same precedence as the server; positional arguments are `[HOST] [PORT]`
    pub fn from_sources<F>(env: F, args: &[String]) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = env(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = env(ENV_PORT) {
            config.port = parse_port(&port)?;
        }
        if let Some(bits) = env(ENV_KEY_BITS) {
            config.key_bits = parse_key_bits(&bits)?;
        }

        if let Some(host) = args.first() {
            config.host = host.clone();
        }
        if let Some(port) = args.get(1) {
            config.port = parse_port(port)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.host.trim().is_empty() {
            return Err(ChatError::Config("Host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ChatError::Config("Port cannot be 0".to_string()));
        }
        validate_key_bits(self.key_bits)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

fn parse_port(value: &str) -> ChatResult<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ChatError::Config(format!("Invalid port: {}", value)))
}

fn parse_key_bits(value: &str) -> ChatResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ChatError::Config(format!("Invalid key size: {}", value)))
}

fn validate_key_bits(bits: usize) -> ChatResult<()> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(ChatError::Config(format!(
            "Key size {} outside [{}, {}]",
            bits, MIN_KEY_BITS, MAX_KEY_BITS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_sources(env_from(&[]), &[]).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_server_precedence() {
        let env = env_from(&[(ENV_PORT, "9000"), (ENV_CREDENTIALS, "env.txt"), (ENV_KEY_BITS, "512")]);
        let config = ServerConfig::from_sources(&env, &[]).unwrap();
        assert_eq!(config, ServerConfig::new(9000, "env.txt", 512));

        let config = ServerConfig::from_sources(&env, &args(&["cli.txt", "7000"])).unwrap();
        assert_eq!(config, ServerConfig::new(7000, "cli.txt", 512));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ServerConfig::from_sources(env_from(&[]), &args(&["a.txt", "0"])).is_err());
        assert!(ServerConfig::from_sources(env_from(&[]), &args(&["a.txt", "port"])).is_err());
        assert!(ServerConfig::from_sources(env_from(&[(ENV_KEY_BITS, "8")]), &[]).is_err());
        assert!(ClientConfig::from_sources(env_from(&[]), &args(&[" ", "8080"])).is_err());
    }

    #[test]
    fn test_client_address() {
        let config = ClientConfig::from_sources(env_from(&[(ENV_HOST, "chat.local")]), &args(&[])).unwrap();
        assert_eq!(config.address(), "chat.local:8080");

        let config = ClientConfig::from_sources(env_from(&[]), &args(&["10.0.0.2", "9999"])).unwrap();
        assert_eq!(config.address(), "10.0.0.2:9999");
    }
}
