use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Identity of one document's edit history.
///
/// Version markers are only comparable when they share a document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentIdentity(u64);

impl DocumentIdentity {
	/// Allocates a process-unique document identity.
	pub fn fresh() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
	}

	pub const fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn raw(self) -> u64 {
		self.0
	}
}

/// Stamp identifying a specific revision of one document's text.
///
/// Markers of the same document are totally ordered by their ordinal. Markers
/// of different documents are incomparable: `partial_cmp` returns `None` and
/// they are never equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionMarker {
	document: DocumentIdentity,
	ordinal: u64,
}

impl VersionMarker {
	pub const fn new(document: DocumentIdentity, ordinal: u64) -> Self {
		Self { document, ordinal }
	}

	/// First revision of a document.
	pub const fn initial(document: DocumentIdentity) -> Self {
		Self::new(document, 0)
	}

	/// Marker for the revision following this one.
	#[must_use]
	pub const fn next(self) -> Self {
		Self {
			document: self.document,
			ordinal: self.ordinal.wrapping_add(1),
		}
	}

	pub const fn document(self) -> DocumentIdentity {
		self.document
	}

	pub const fn ordinal(self) -> u64 {
		self.ordinal
	}

	pub fn belongs_to_same_document(&self, other: &Self) -> bool {
		self.document == other.document
	}

	/// Returns true if both markers name the same revision of the same document.
	pub fn is_same_version(&self, other: &Self) -> bool {
		self.partial_cmp(other) == Some(Ordering::Equal)
	}
}

impl PartialOrd for VersionMarker {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		if self.belongs_to_same_document(other) {
			Some(self.ordinal.cmp(&other.ordinal))
		} else {
			None
		}
	}
}

impl fmt::Display for VersionMarker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "doc{}@{}", self.document.0, self.ordinal)
	}
}
