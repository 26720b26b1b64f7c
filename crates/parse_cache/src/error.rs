use std::sync::Arc;

use strata_primitives::{FileId, ProjectId};

use crate::parser::ParserError;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by cache entries and the registry.
///
/// Cloneable so one background result can be handed to every caller joined on
/// the same pending parse.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The project already has an ownership record for the file.
	#[error("{project} already owns {file}")]
	AlreadyOwns { file: FileId, project: ProjectId },
	/// The project has no ownership record for the file.
	#[error("{project} does not own {file}")]
	DoesNotOwn { file: FileId, project: ProjectId },
	/// A parsed file was injected for a project that does not own the file.
	#[error("cannot register a parsed file for {file}: {project} is not an owner")]
	UnknownOwner { file: FileId, project: ProjectId },
	/// The parser returned nothing, or partial information when full was requested.
	#[error("parser contract violated for {file}: {reason}")]
	ParserContract { file: FileId, reason: &'static str },
	/// The parser failed for a reason of its own.
	#[error("parser failed for {file}: {source}")]
	Parser {
		file: FileId,
		#[source]
		source: Arc<ParserError>,
	},
	/// The caller's cancellation signal fired.
	#[error("parse of {file} was cancelled")]
	Cancelled { file: FileId },
	/// A background parse ended without publishing a result.
	#[error("background parse of {file} ended without a result")]
	Aborted { file: FileId },
}

impl Error {
	/// Returns true for misuse of the ownership protocol.
	pub fn is_protocol_misuse(&self) -> bool {
		matches!(self, Self::AlreadyOwns { .. } | Self::DoesNotOwn { .. } | Self::UnknownOwner { .. })
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled { .. })
	}
}
