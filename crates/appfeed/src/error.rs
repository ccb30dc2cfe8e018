use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("watched path set is empty")]
	NoWatchRoots,
	#[error("watched path must not be an empty string")]
	EmptyWatchRoot,

	#[error(transparent)]
	Notify(#[from] notify::Error),

	#[error("metadata query backend unavailable: {0}")]
	QueryBackend(String),
}
