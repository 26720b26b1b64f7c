use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a source file, keyed by its path.
///
/// Cheap to clone; the path is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<Path>);

impl FileId {
	pub fn new(path: impl AsRef<Path>) -> Self {
		Self(Arc::from(path.as_ref()))
	}

	pub fn path(&self) -> &Path {
		&self.0
	}
}

impl fmt::Display for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.display())
	}
}

impl From<&str> for FileId {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}

impl From<&Path> for FileId {
	fn from(path: &Path) -> Self {
		Self::new(path)
	}
}

impl From<PathBuf> for FileId {
	fn from(path: PathBuf) -> Self {
		Self(Arc::from(path.into_boxed_path()))
	}
}

/// Identity of a logical project that can own source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "project#{}", self.0)
	}
}
