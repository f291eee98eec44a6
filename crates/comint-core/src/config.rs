//! Session configuration.

use crate::ring;
use anyhow::Result;
use comint_types::SpawnSpec;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_shell_command")]
    pub shell_command: String,
    #[serde(default = "default_shell_arguments")]
    pub shell_arguments: Vec<String>,
    /// Pattern marking a trailing shell prompt in rendered output. A
    /// heuristic, not a protocol: arbitrary prompts can and do misfire.
    #[serde(default = "default_prompt_regex")]
    pub prompt_regex: String,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_columns")]
    pub columns: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,
}

fn default_shell_command() -> String {
    "bash".to_string()
}

fn default_shell_arguments() -> Vec<String> {
    vec!["-l".to_string()]
}

fn default_prompt_regex() -> String {
    r"^[^#$%>\n]*[#$%>] *".to_string()
}

fn default_history_capacity() -> usize {
    ring::DEFAULT_CAPACITY
}

fn default_columns() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

fn default_working_directory() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell_command: default_shell_command(),
            shell_arguments: default_shell_arguments(),
            prompt_regex: default_prompt_regex(),
            history_capacity: default_history_capacity(),
            columns: default_columns(),
            rows: default_rows(),
            working_directory: default_working_directory(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from the default location (config/default.toml) or fall
    /// back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Ok(Config::default())
    }

    /// Lower this config into PTY spawn parameters.
    pub fn spawn_spec(&self) -> SpawnSpec {
        SpawnSpec {
            command: self.shell_command.clone(),
            args: self.shell_arguments.clone(),
            working_directory: self.working_directory.clone(),
            columns: self.columns,
            rows: self.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.shell_command, "bash");
        assert_eq!(config.shell_arguments, vec!["-l"]);
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.columns, 80);
        assert!(regex::Regex::new(&config.prompt_regex).is_ok());
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            shell_command = "zsh"
            shell_arguments = []
            "#,
        )
        .unwrap();
        assert_eq!(config.shell_command, "zsh");
        assert!(config.shell_arguments.is_empty());
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.prompt_regex, default_prompt_regex());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prompt_regex = '> $'").unwrap();
        writeln!(file, "history_capacity = 10").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.prompt_regex, "> $");
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.shell_command, "bash");
    }
}
