//! Boundary traits for the native facilities this crate bridges.
//!
//! The change-notification and metadata-search facilities stay opaque event
//! sources with a start/stop/invalidate lifecycle; adapters own the handles
//! and release each one exactly once. Callbacks capture whatever identity
//! they need themselves (no context-pointer round-tripping) and may be
//! invoked from any thread.

pub mod notify;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Invoked by a change stream whenever something under its roots changed.
/// Carries no payload the adapter consumes.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked by a metadata query once a result gathering pass finished.
pub type GatherCallback = Arc<dyn Fn() + Send + Sync>;

/// A native change-notification handle scoped to a fixed set of roots.
pub trait ChangeStream: Send {
	/// Begin delivering change callbacks.
	fn start(&mut self) -> Result<()>;

	/// Stop delivering change callbacks. Safe if never started.
	fn stop(&mut self);

	/// Invalidate the underlying native handle; it must not be used
	/// afterwards. Release itself happens on drop.
	fn invalidate(&mut self);
}

pub trait ChangeStreamFactory: Send + Sync {
	fn create(
		&self,
		roots: &[PathBuf],
		latency: Duration,
		on_change: ChangeCallback,
	) -> Result<Box<dyn ChangeStream>>;
}

/// Search scope understood by the metadata facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
	/// The whole local volume. Scope only prunes by volume; path filtering
	/// against the watched roots happens in the adapter.
	LocalVolume,
}

/// Content type marker identifying application bundles.
pub const APP_BUNDLE_CONTENT_TYPE: &str = "application-bundle";

/// What a metadata query searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
	pub scope: SearchScope,
	pub content_type: String,
}

impl QuerySpec {
	pub fn application_bundles() -> Self {
		Self {
			scope: SearchScope::LocalVolume,
			content_type: APP_BUNDLE_CONTENT_TYPE.to_owned(),
		}
	}
}

/// A native metadata-search handle.
pub trait MetadataQuery: Send {
	fn start(&mut self) -> Result<()>;

	fn stop(&mut self);

	fn is_running(&self) -> bool;

	/// Snapshot of the current result set.
	fn results(&self) -> Vec<RawItem>;
}

pub trait MetadataQueryFactory: Send + Sync {
	/// Create a query. The gather callback is registered directly on the
	/// query object rather than through a process-wide notification bus.
	fn create(&self, spec: QuerySpec, on_gathered: GatherCallback)
		-> Result<Box<dyn MetadataQuery>>;
}

/// Attribute keys the decoder reads from a raw result item.
pub mod attr {
	pub const BUNDLE_IDENTIFIER: &str = "bundle-identifier";
	pub const PATH: &str = "path";
	pub const DISPLAY_NAME: &str = "display-name";
}

/// One loosely typed attribute of a raw result item.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
	Text(String),
	Number(f64),
	Flag(bool),
}

/// One opaque item of a metadata query's result set: a bag of attributes
/// whose presence and types are only checked at decode time.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
	attrs: HashMap<String, AttrValue>,
}

impl RawItem {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
		self.attrs.insert(key.to_owned(), AttrValue::Text(value.into()));
		self
	}

	pub fn with_number(mut self, key: &str, value: f64) -> Self {
		self.attrs.insert(key.to_owned(), AttrValue::Number(value));
		self
	}

	pub fn with_flag(mut self, key: &str, value: bool) -> Self {
		self.attrs.insert(key.to_owned(), AttrValue::Flag(value));
		self
	}

	pub fn get(&self, key: &str) -> Option<&AttrValue> {
		self.attrs.get(key)
	}

	/// The attribute as text, or `None` when absent or not string-typed.
	pub fn text(&self, key: &str) -> Option<&str> {
		match self.attrs.get(key) {
			Some(AttrValue::Text(value)) => Some(value),
			_ => None,
		}
	}
}
