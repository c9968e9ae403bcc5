//! Daemon settings, read from `config.toml` in the user's config directory.
//!
//! ```toml
//! duration = 3.5
//!
//! [style]
//! fill_color = "#202020c0"
//! text_size = 20.0
//!
//! [style.text_style]
//! weight = "bold"
//! ```

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::Deserialize;

use crate::{error::ConfigError, stack::DEFAULT_DURATION, style::*, types::Lifetime};

const APP_NAME: &str = "keikoku";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Seconds an alert stays up when no duration is given.
	pub duration: Option<f64>,
	pub style: StyleOverride,
}

impl Config {
	pub fn default_style(&self) -> AlertStyle {
		AlertStyle::default().merged(&self.style)
	}

	pub fn default_duration(&self) -> Duration {
		match self.duration.map(Lifetime::from_secs) {
			Some(Lifetime::For(d)) => d,
			Some(Lifetime::Persistent) => {
				log::warn!("duration must be finite, using {:?}", DEFAULT_DURATION);
				DEFAULT_DURATION
			}
			None => DEFAULT_DURATION,
		}
	}
}

pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|mut path| {
		path.push(APP_NAME);
		path.push(CONFIG_FILE);
		path
	})
}

/// A missing file is not an error.
pub fn load() -> Result<Config, ConfigError> {
	match default_path() {
		Some(path) if path.exists() => load_from_path(&path),
		_ => Ok(Config::default()),
	}
}

pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
	let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
	toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
}
