//! Decoded representation of one discovered application bundle.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::native::{attr, RawItem};

/// Marker identifying an application bundle directory within a path.
const BUNDLE_EXTENSION_MARKER: &str = ".app";

/// A validated application bundle discovered by the metadata query.
///
/// Immutable once constructed; equality and ordering go by lower-cased
/// display name. Holds no back-references to the query or event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
	bundle_identifier: String,
	bundle_path: PathBuf,
	display_name: String,
	parent_bundle_path: Option<PathBuf>,
}

impl AppRecord {
	/// Decode a raw metadata item into a validated record.
	///
	/// Returns `None` when the bundle identifier, path, or display name
	/// attribute is absent, not string-typed, or (for the identifier) empty.
	/// The display name is trimmed of surrounding whitespace. Pure string
	/// inspection; never touches disk.
	pub fn decode(item: &RawItem) -> Option<Self> {
		let bundle_identifier = item.text(attr::BUNDLE_IDENTIFIER)?;
		if bundle_identifier.is_empty() {
			return None;
		}
		let bundle_path = PathBuf::from(item.text(attr::PATH)?);
		let display_name = item.text(attr::DISPLAY_NAME)?.trim().to_owned();
		let parent_bundle_path = parent_bundle(&bundle_path);

		Some(Self {
			bundle_identifier: bundle_identifier.to_owned(),
			bundle_path,
			display_name,
			parent_bundle_path,
		})
	}

	pub fn bundle_identifier(&self) -> &str {
		&self.bundle_identifier
	}

	pub fn bundle_path(&self) -> &Path {
		&self.bundle_path
	}

	pub fn display_name(&self) -> &str {
		&self.display_name
	}

	/// The enclosing bundle, for helpers nested inside another application.
	pub fn parent_bundle_path(&self) -> Option<&Path> {
		self.parent_bundle_path.as_deref()
	}

	fn sort_key(&self) -> String {
		self.display_name.to_lowercase()
	}
}

impl PartialEq for AppRecord {
	fn eq(&self, other: &Self) -> bool {
		self.sort_key() == other.sort_key()
	}
}

impl Eq for AppRecord {}

impl Ord for AppRecord {
	fn cmp(&self, other: &Self) -> Ordering {
		self.sort_key().cmp(&other.sort_key())
	}
}

impl PartialOrd for AppRecord {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Derive the bundle enclosing `path`, if any.
///
/// Drops the last component, then scans the remainder from the root for the
/// first component containing the bundle marker and rebuilds the path up to
/// and including it. Best-effort string inspection, not filesystem traversal.
fn parent_bundle(path: &Path) -> Option<PathBuf> {
	let components: Vec<Component<'_>> = path.components().collect();
	let without_last = components.len().checked_sub(1)?;

	let marker = components[..without_last].iter().position(|component| {
		matches!(
			component,
			Component::Normal(name) if name.to_string_lossy().contains(BUNDLE_EXTENSION_MARKER)
		)
	})?;

	Some(components[..=marker].iter().collect())
}
