//! Boundary to the external parsing engine.

use std::fmt;
use std::sync::Arc;

use strata_primitives::{FileId, TextSnapshot, VersionMarker};
use strata_worker::CancelSignal;

use crate::project::ProjectRef;

/// Error type produced by a parser implementation.
pub type ParserError = dyn std::error::Error + Send + Sync + 'static;

/// Boxed parser error, as returned from [`FileParser::parse`].
pub type BoxParserError = Box<ParserError>;

/// Parsing capability injected into the cache.
///
/// The cache never parses by itself; it calls this once per owning project
/// during a fan-out, or once for a standalone request.
pub trait FileParser: Sized + Send + Sync + 'static {
	/// Lightweight parsed-file summary (declarations, imports).
	type File: Send + Sync + 'static;
	/// Full analysis result (syntax tree); only present in full parse information.
	type Tree: Send + Sync + 'static;

	/// Parses one snapshot for one project.
	///
	/// Must return `Ok(Some(_))` on success, and full information when
	/// `request.full_info` is set. Anything else is a contract violation.
	/// Cancellation is cooperative through `request.cancel`.
	fn parse(&self, request: ParseRequest<'_, Self>) -> Result<Option<ParseInformation<Self>>, BoxParserError>;
}

/// Arguments of one parser invocation.
pub struct ParseRequest<'a, P: FileParser> {
	pub file: &'a FileId,
	pub content: &'a TextSnapshot,
	pub full_info: bool,
	pub project: Option<&'a ProjectRef<P>>,
	pub cancel: &'a CancelSignal,
}

/// Output of a parse: the parsed file, plus the tree when the parse was full.
///
/// Both parts are shared and immutable once constructed.
pub struct ParseInformation<P: FileParser> {
	parsed_file: Arc<P::File>,
	tree: Option<Arc<P::Tree>>,
	version: Option<VersionMarker>,
}

impl<P: FileParser> ParseInformation<P> {
	/// Parse information without a tree.
	pub fn partial(parsed_file: P::File, version: Option<VersionMarker>) -> Self {
		Self {
			parsed_file: Arc::new(parsed_file),
			tree: None,
			version,
		}
	}

	/// Full parse information.
	pub fn full(parsed_file: P::File, tree: P::Tree, version: Option<VersionMarker>) -> Self {
		Self {
			parsed_file: Arc::new(parsed_file),
			tree: Some(Arc::new(tree)),
			version,
		}
	}

	pub(crate) fn from_shared(parsed_file: Arc<P::File>, version: Option<VersionMarker>) -> Self {
		Self {
			parsed_file,
			tree: None,
			version,
		}
	}

	pub fn parsed_file(&self) -> &Arc<P::File> {
		&self.parsed_file
	}

	pub fn tree(&self) -> Option<&Arc<P::Tree>> {
		self.tree.as_ref()
	}

	pub fn version(&self) -> Option<VersionMarker> {
		self.version
	}

	pub fn is_full(&self) -> bool {
		self.tree.is_some()
	}

	/// Returns true if both values share the same published parsed file.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.parsed_file, &other.parsed_file)
	}
}

impl<P: FileParser> Clone for ParseInformation<P> {
	fn clone(&self) -> Self {
		Self {
			parsed_file: Arc::clone(&self.parsed_file),
			tree: self.tree.clone(),
			version: self.version,
		}
	}
}

impl<P: FileParser> fmt::Debug for ParseInformation<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParseInformation")
			.field("version", &self.version)
			.field("full", &self.is_full())
			.finish_non_exhaustive()
	}
}
