use std::ops::Range;
use std::sync::Arc;

use ropey::Rope;

use crate::version::{DocumentIdentity, VersionMarker};

/// Something that can hand out an immutable copy of its current text.
///
/// Mutable sources (editor buffers) must copy on [`TextSource::snapshot`];
/// the returned snapshot never changes afterwards.
pub trait TextSource {
	/// Version of the current text, if the source is versioned.
	fn version(&self) -> Option<VersionMarker>;

	/// Takes an immutable snapshot of the current text.
	fn snapshot(&self) -> TextSnapshot;
}

/// Immutable text of a file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
	text: Arc<str>,
	version: Option<VersionMarker>,
}

impl TextSnapshot {
	pub fn new(text: impl Into<Arc<str>>, version: Option<VersionMarker>) -> Self {
		Self { text: text.into(), version }
	}

	/// Snapshot without a version, e.g. content freshly read from disk.
	pub fn unversioned(text: impl Into<Arc<str>>) -> Self {
		Self::new(text, None)
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn version(&self) -> Option<VersionMarker> {
		self.version
	}

	pub fn len(&self) -> usize {
		self.text.len()
	}

	pub fn is_empty(&self) -> bool {
		self.text.is_empty()
	}
}

impl TextSource for TextSnapshot {
	fn version(&self) -> Option<VersionMarker> {
		self.version
	}

	fn snapshot(&self) -> TextSnapshot {
		self.clone()
	}
}

/// Mutable, versioned text backed by a rope.
///
/// Every successful edit advances the version marker.
#[derive(Debug, Clone)]
pub struct TextBuffer {
	rope: Rope,
	version: VersionMarker,
}

impl TextBuffer {
	pub fn new(text: &str) -> Self {
		Self::with_identity(text, DocumentIdentity::fresh())
	}

	pub fn with_identity(text: &str, document: DocumentIdentity) -> Self {
		Self {
			rope: Rope::from_str(text),
			version: VersionMarker::initial(document),
		}
	}

	pub fn rope(&self) -> &Rope {
		&self.rope
	}

	pub fn current_version(&self) -> VersionMarker {
		self.version
	}

	/// Inserts text at a char index and returns the new version.
	pub fn insert(&mut self, char_idx: usize, text: &str) -> Result<VersionMarker, ropey::Error> {
		self.rope.try_insert(char_idx, text)?;
		Ok(self.bump())
	}

	/// Removes a char range and returns the new version.
	pub fn remove(&mut self, range: Range<usize>) -> Result<VersionMarker, ropey::Error> {
		self.rope.try_remove(range)?;
		Ok(self.bump())
	}

	/// Replaces the whole text and returns the new version.
	pub fn replace_all(&mut self, text: &str) -> VersionMarker {
		self.rope = Rope::from_str(text);
		self.bump()
	}

	fn bump(&mut self) -> VersionMarker {
		self.version = self.version.next();
		self.version
	}
}

impl TextSource for TextBuffer {
	fn version(&self) -> Option<VersionMarker> {
		Some(self.version)
	}

	fn snapshot(&self) -> TextSnapshot {
		TextSnapshot::new(self.rope.to_string(), Some(self.version))
	}
}
