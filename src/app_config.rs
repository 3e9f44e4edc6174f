use crate::config;
use anyhow::{bail, Result};
use colored::Colorize;

/// Runtime modes selectable through `VECTR_MODE`
pub const MODES: &[&str] = &["server", "single"];

/// Application configuration handler
pub struct AppConfig {
    pub mode: String,
    pub port: u16,
    pub ticker: String,
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            mode: config::get_execution_mode(),
            port: config::get_port(),
            ticker: config::get_single_ticker(),
        }
    }

    pub fn print_banner(&self) {
        println!("{} Mode: {}", "→".cyan(), self.mode.yellow());
        match self.mode.as_str() {
            "server" => println!("{} Port: {}", "→".cyan(), self.port.to_string().yellow()),
            _ => println!("{} Ticker: {}", "→".cyan(), self.ticker.yellow()),
        }
        println!();
    }

    pub fn validate(&self) -> Result<()> {
        if !MODES.contains(&self.mode.as_str()) {
            bail!("Invalid mode '{}'. Use one of: {}", self.mode, MODES.join(", "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_mode() {
        let mut app_config = AppConfig {
            mode: "server".to_string(),
            port: 5000,
            ticker: "SPY".to_string(),
        };
        assert!(app_config.validate().is_ok());

        app_config.mode = "batch".to_string();
        assert!(app_config.validate().is_err());
    }
}
