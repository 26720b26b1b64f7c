//! Update notifications and the hooks an entry calls on its registry.

use std::fmt;
use std::sync::Arc;

use strata_primitives::{FileId, ProjectId};
use tokio::sync::mpsc;

use crate::entry::CacheEntry;
use crate::parser::{FileParser, ParseInformation};

/// Notification that one project's cached result for a file was replaced.
pub struct ParseUpdate<P: FileParser> {
	pub file: FileId,
	/// Owning project, or `None` for the ownerless placeholder.
	pub project: Option<ProjectId>,
	pub old_parsed_file: Option<Arc<P::File>>,
	pub new_parsed_file: Option<Arc<P::File>>,
	pub new_info: Option<ParseInformation<P>>,
}

impl<P: FileParser> Clone for ParseUpdate<P> {
	fn clone(&self) -> Self {
		Self {
			file: self.file.clone(),
			project: self.project,
			old_parsed_file: self.old_parsed_file.clone(),
			new_parsed_file: self.new_parsed_file.clone(),
			new_info: self.new_info.clone(),
		}
	}
}

impl<P: FileParser> fmt::Debug for ParseUpdate<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParseUpdate")
			.field("file", &self.file)
			.field("project", &self.project)
			.field("had_old", &self.old_parsed_file.is_some())
			.field("new_info", &self.new_info)
			.finish()
	}
}

/// Sender for global parse update events.
pub type ParseUpdateSender<P> = mpsc::UnboundedSender<ParseUpdate<P>>;

/// Receiver for global parse update events.
pub type ParseUpdateReceiver<P> = mpsc::UnboundedReceiver<ParseUpdate<P>>;

/// Hooks a cache entry calls on the registry that owns it.
pub trait EntryHost<P: FileParser>: Send + Sync {
	/// Global broadcast of a committed update.
	fn parse_information_updated(&self, update: &ParseUpdate<P>);

	/// The entry was parsed or lost its last owner and may be expired later.
	fn register_for_expiry(&self, file: &FileId);

	/// The entry is ownerless and its cache expired; drop it if the registry
	/// still maps its file to this entry.
	fn remove_entry(&self, entry: &CacheEntry<P>);
}

/// Host for entries living outside a registry. Every hook is a no-op.
pub(crate) struct DetachedHost;

impl<P: FileParser> EntryHost<P> for DetachedHost {
	fn parse_information_updated(&self, _update: &ParseUpdate<P>) {}

	fn register_for_expiry(&self, _file: &FileId) {}

	fn remove_entry(&self, _entry: &CacheEntry<P>) {}
}
