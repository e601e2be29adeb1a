use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use hypo_client::{ClientConfig, ConfigOverrides};

/// Command-line overrides, applied over both config files.
#[derive(Debug, Default, Args)]
pub struct ConfigFlags {
    /// Backend base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Project id
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,
}

impl ConfigFlags {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            project: self.project.clone(),
            request_timeout: self.timeout.map(Duration::from_millis),
            ..Default::default()
        }
    }
}

/// A file the CLI reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub label: &'static str,
    pub path: PathBuf,
}

impl Location {
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + flags)
    pub fn load(flags: &ConfigFlags) -> Result<ClientConfig> {
        let mut raw = ConfigOverrides::default();

        // Layer 1: User config
        raw = raw.overlay(Self::load_from_path(&Self::user_config_path())?);

        // Layer 2: Project config
        raw = raw.overlay(Self::load_from_path(&Self::project_config_path())?);

        // Layer 3: Flags
        raw = raw.overlay(flags.overrides());

        Ok(ClientConfig::default().merge(raw))
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        hypo_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with HYPO_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("HYPO_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".hypo/config.toml")
        }
    }

    /// Config layers in merge order, followed by the state store.
    pub fn locations() -> Vec<Location> {
        vec![
            Location {
                label: "user config",
                path: Self::user_config_path(),
            },
            Location {
                label: "project config",
                path: Self::project_config_path(),
            },
            Location {
                label: "store",
                path: hypo_paths::store_file(),
            },
        ]
    }

    /// Read one config layer; a missing file is an empty layer.
    pub fn load_from_path(path: &Path) -> Result<ConfigOverrides> {
        if !path.exists() {
            return Ok(ConfigOverrides::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }
}
