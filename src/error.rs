use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShowError {
	#[error("unexpected argument at position {position} of type '{signature}'")]
	UnexpectedArgument { position: usize, signature: String },
}

impl From<ShowError> for zbus::fdo::Error {
	fn from(e: ShowError) -> Self {
		zbus::fdo::Error::InvalidArgs(e.to_string())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("could not read {path}: {source}")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("could not parse {path}: {source}")]
	Parse { path: PathBuf, source: toml::de::Error },
}
