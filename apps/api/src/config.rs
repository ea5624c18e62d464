use std::time::Duration;

use anyhow::{Context, Result};

use crate::typeset::compiler::{CompileOptions, DEFAULT_PROGRAM, DEFAULT_TIMEOUT, MAX_CONTENT_CHARS};

/// Application configuration loaded from environment variables.
/// Every variable has a default, so the service starts with no configuration
/// present at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Compiler program name, or an explicit path to the executable.
    pub tectonic_program: String,
    /// Wall-clock budget for one compilation, in seconds.
    pub compile_timeout_secs: u64,
    /// Maximum accepted request content, in Unicode characters.
    pub max_content_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            tectonic_program: std::env::var("TECTONIC_PROGRAM")
                .unwrap_or_else(|_| DEFAULT_PROGRAM.to_string()),
            compile_timeout_secs: std::env::var("COMPILE_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_TIMEOUT.as_secs().to_string())
                .parse::<u64>()
                .context("COMPILE_TIMEOUT_SECS must be a whole number of seconds")?,
            max_content_chars: std::env::var("MAX_CONTENT_CHARS")
                .unwrap_or_else(|_| MAX_CONTENT_CHARS.to_string())
                .parse::<usize>()
                .context("MAX_CONTENT_CHARS must be a number")?,
        })
    }

    /// Invoker options derived from this configuration.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            timeout: Duration::from_secs(self.compile_timeout_secs),
            max_content_chars: self.max_content_chars,
        }
    }
}
