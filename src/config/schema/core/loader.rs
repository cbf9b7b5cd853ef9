use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    /// Loads `~/.missiond/config.toml`, writing a default file on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let config_path = home.join(".missiond").join("config.toml");
        Self::load_from(&config_path)
    }

    /// Loads the config at `config_path`, creating it (and a sibling
    /// `workspace/` directory) with defaults when missing. Environment
    /// overrides are applied before validation.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let workspace_dir = base_dir.join("workspace");

        if !base_dir.as_os_str().is_empty() && !base_dir.exists() {
            fs::create_dir_all(base_dir)
                .map_err(ConfigError::from)
                .context("Failed to create config directory")?;
        }

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(ConfigError::from)
                .context("Failed to read config file")?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::Load(e.to_string()))
                .context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config.workspace_dir = workspace_dir;
            config
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                workspace_dir,
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        fs::create_dir_all(&config.workspace_dir)
            .map_err(ConfigError::from)
            .context("Failed to create workspace directory")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
