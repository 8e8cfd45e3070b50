use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

const CONFIG_FILE: &str = "hudless.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Whether the menu-bar icon is shown.
    pub show_indicator: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { show_indicator: true }
    }
}

impl Config {
    fn path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("no config directory"))?;
        let text = toml::to_string(self)?;
        std::fs::write(&path, text)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn load() -> Config {
        let Some(path) = Self::path() else {
            return Config::default();
        };
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Config::default();
        };
        Self::parse(&text)
    }

    fn parse(text: &str) -> Config {
        match toml::from_str(text) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "invalid config; using defaults");
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(Config::parse(""), Config::default());
        assert!(Config::default().show_indicator);
    }

    #[test]
    fn reads_show_indicator() {
        assert!(!Config::parse("show_indicator = false").show_indicator);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::parse("show_indicator = false\nlegacy = 3\n");
        assert!(!config.show_indicator);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        assert_eq!(Config::parse("show_indicator = \"maybe\""), Config::default());
        assert_eq!(Config::parse("[[[["), Config::default());
    }

    #[test]
    fn serialized_form_round_trips() {
        let config = Config { show_indicator: false };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("show_indicator = false"));
        assert_eq!(Config::parse(&text), config);
    }
}
