//! `notify`-backed change stream.
//!
//! Production implementation of the change-notification boundary: one
//! recursive watcher over the whole root set, collapsed to unit callbacks.
//! Event payloads are deliberately discarded; the adapter layer only models
//! "something under the roots changed".

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, trace};

use crate::error::Result;
use crate::native::{ChangeCallback, ChangeStream, ChangeStreamFactory};

pub struct NotifyChangeStreamFactory;

impl ChangeStreamFactory for NotifyChangeStreamFactory {
	fn create(
		&self,
		roots: &[PathBuf],
		latency: Duration,
		on_change: ChangeCallback,
	) -> Result<Box<dyn ChangeStream>> {
		let watcher = RecommendedWatcher::new(
			move |result: notify::Result<Event>| match result {
				Ok(_) => on_change(),
				Err(e) => error!(?e, "Watcher error;"),
			},
			Config::default().with_poll_interval(latency),
		)?;

		Ok(Box::new(NotifyChangeStream {
			watcher: Some(watcher),
			roots: roots.to_vec(),
			running: false,
		}))
	}
}

pub struct NotifyChangeStream {
	watcher: Option<RecommendedWatcher>,
	roots: Vec<PathBuf>,
	running: bool,
}

impl ChangeStream for NotifyChangeStream {
	fn start(&mut self) -> Result<()> {
		let Some(watcher) = self.watcher.as_mut() else {
			return Ok(());
		};

		for root in &self.roots {
			watcher.watch(root, RecursiveMode::Recursive)?;
		}
		self.running = true;
		trace!(roots = ?self.roots, "Change stream watching roots;");

		Ok(())
	}

	fn stop(&mut self) {
		if !self.running {
			return;
		}

		if let Some(watcher) = self.watcher.as_mut() {
			for root in &self.roots {
				if let Err(e) = watcher.unwatch(root) {
					error!(?e, root = %root.display(), "Unable to unwatch root;");
				}
			}
		}
		self.running = false;
	}

	fn invalidate(&mut self) {
		self.watcher = None;
	}
}
