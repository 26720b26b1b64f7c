use std::sync::Arc;

use strata_primitives::ProjectId;

use crate::events::ParseUpdate;
use crate::parser::FileParser;

/// A logical project that can own source files.
pub trait Project<P: FileParser>: Send + Sync {
	fn id(&self) -> ProjectId;

	/// Called after a commit replaced this project's cached result for a file.
	///
	/// Runs while the entry's fan-out gate is held; implementations must not
	/// mutate or parse the same entry from here.
	fn on_parse_information_updated(&self, _update: &ParseUpdate<P>) {}
}

/// Shared handle to a [`Project`].
pub type ProjectRef<P> = Arc<dyn Project<P>>;
