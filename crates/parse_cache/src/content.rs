//! Boundary to the file-content provider, plus a workspace-backed default.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use parking_lot::RwLock;
use strata_primitives::{FileId, TextSnapshot, TextSource};
use strata_worker::CancelSignal;

/// Failure to obtain a file's content.
///
/// Transient from the cache's point of view: a parse that hits one yields an
/// empty result instead of an error, except for [`ContentError::Cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
	#[error("file not found: {}", path.display())]
	NotFound { path: PathBuf },
	#[error("access denied: {}", path.display())]
	PermissionDenied { path: PathBuf },
	#[error("I/O error reading {}: {error}", path.display())]
	Io { path: PathBuf, error: io::Error },
	#[error("read of {} was cancelled", path.display())]
	Cancelled { path: PathBuf },
}

impl ContentError {
	pub fn from_io(path: impl Into<PathBuf>, error: io::Error) -> Self {
		let path = path.into();
		match error.kind() {
			io::ErrorKind::NotFound => Self::NotFound { path },
			io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
			_ => Self::Io { path, error },
		}
	}
}

/// Source of file text for parses that were not handed a snapshot.
pub trait ContentProvider: Send + Sync {
	/// Current text of the file if it is open in an editor.
	fn open_document(&self, file: &FileId) -> Option<TextSnapshot>;

	/// Reads the file from disk.
	fn read_from_disk(&self, file: &FileId, cancel: &CancelSignal) -> Result<TextSnapshot, ContentError>;

	/// Open document content, falling back to disk.
	fn content(&self, file: &FileId, cancel: &CancelSignal) -> Result<TextSnapshot, ContentError> {
		match self.open_document(file) {
			Some(snapshot) => Ok(snapshot),
			None => self.read_from_disk(file, cancel),
		}
	}

	/// Returns true when called on the thread that owns editor content.
	///
	/// Async parses resolve open documents eagerly there and defer the lookup
	/// into the background everywhere else.
	fn is_content_thread(&self) -> bool {
		false
	}
}

/// Content provider with an in-memory table of open documents and a
/// filesystem fallback.
///
/// Disk reads produce unversioned snapshots.
#[derive(Debug, Default)]
pub struct WorkspaceContent {
	open: RwLock<HashMap<FileId, TextSnapshot>>,
}

impl WorkspaceContent {
	pub fn new() -> Self {
		Self::default()
	}

	/// Marks a document as open with the given text, replacing any previous text.
	pub fn open(&self, file: FileId, source: &dyn TextSource) {
		self.open.write().insert(file, source.snapshot());
	}

	/// Closes a document. Later reads go to disk.
	pub fn close(&self, file: &FileId) -> bool {
		self.open.write().remove(file).is_some()
	}

	pub fn is_open(&self, file: &FileId) -> bool {
		self.open.read().contains_key(file)
	}
}

impl ContentProvider for WorkspaceContent {
	fn open_document(&self, file: &FileId) -> Option<TextSnapshot> {
		self.open.read().get(file).cloned()
	}

	fn read_from_disk(&self, file: &FileId, cancel: &CancelSignal) -> Result<TextSnapshot, ContentError> {
		if cancel.is_cancelled() {
			return Err(ContentError::Cancelled { path: file.path().to_path_buf() });
		}
		let text = std::fs::read_to_string(file.path()).map_err(|e| ContentError::from_io(file.path(), e))?;
		Ok(TextSnapshot::unversioned(text))
	}
}
