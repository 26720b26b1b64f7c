//! Core value types shared by the parse cache: file and project identifiers,
//! document version markers, and immutable text snapshots.

/// File and project identifier types.
pub mod ids;
/// Immutable snapshots and mutable rope-backed buffers.
pub mod text;
/// Document identities and per-document version markers.
pub mod version;

pub use ids::{FileId, ProjectId};
pub use text::{TextBuffer, TextSnapshot, TextSource};
pub use version::{DocumentIdentity, VersionMarker};
