//! Source configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default throttle window between query restarts.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(300);

/// Configuration shared by the change and query sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
	/// Filesystem roots to watch. Immutable once the native stream exists.
	///
	/// Validated only as non-empty strings; whether the paths exist is the
	/// native source's concern.
	pub roots: Vec<PathBuf>,
	/// Coalescing latency handed to the native change stream.
	#[serde(default)]
	pub latency: Duration,
	/// Window within which bursts of change signals collapse into a single
	/// query restart trigger.
	#[serde(default = "default_throttle_window")]
	pub throttle_window: Duration,
}

fn default_throttle_window() -> Duration {
	DEFAULT_THROTTLE_WINDOW
}

impl SourceConfig {
	pub fn new(roots: Vec<PathBuf>) -> Self {
		Self {
			roots,
			latency: Duration::ZERO,
			throttle_window: DEFAULT_THROTTLE_WINDOW,
		}
	}

	pub fn validate(&self) -> Result<()> {
		validate_roots(&self.roots)
	}
}

pub(crate) fn validate_roots(roots: &[PathBuf]) -> Result<()> {
	if roots.is_empty() {
		return Err(Error::NoWatchRoots);
	}
	if roots.iter().any(|root| root.as_os_str().is_empty()) {
		return Err(Error::EmptyWatchRoot);
	}
	Ok(())
}
