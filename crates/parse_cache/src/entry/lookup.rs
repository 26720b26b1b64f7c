use std::cmp::Ordering;

use strata_primitives::{ProjectId, VersionMarker};

use super::EntryState;
use crate::ownership::OwnershipRecord;
use crate::parser::FileParser;
use crate::project::ProjectRef;

/// How a parse request can be answered from the entry's current state.
pub(crate) enum Lookup<P: FileParser> {
	/// The cached record already satisfies the request.
	Hit(OwnershipRecord<P>),
	/// The request must be answered by a parse that leaves the cache untouched:
	/// either the requested text is older than the cached version, or the
	/// requesting project is not an owner. `owner` is the matching record's
	/// project handle, if there is one.
	Standalone { owner: Option<ProjectRef<P>> },
	/// Every owner must be re-parsed and the results committed together.
	FanOut,
}

impl<P: FileParser> EntryState<P> {
	/// Orders the cached version against a requested one.
	///
	/// `None` when either side is absent or the markers belong to different
	/// documents; callers treat that as "stale".
	pub(super) fn compare_version(&self, requested: Option<&VersionMarker>) -> Option<Ordering> {
		match (self.version.as_ref(), requested) {
			(Some(current), Some(requested)) => current.partial_cmp(requested),
			_ => None,
		}
	}

	pub(super) fn lookup(&self, requested: Option<&VersionMarker>, project: Option<ProjectId>, full_info: bool) -> Lookup<P> {
		let Some(index) = self.owners.find(project) else {
			return Lookup::Standalone { owner: None };
		};
		let record = &self.owners.records()[index];
		match self.compare_version(requested) {
			Some(Ordering::Greater) => Lookup::Standalone {
				owner: record.project().cloned(),
			},
			Some(Ordering::Equal) if record.satisfies(full_info) => Lookup::Hit(record.clone()),
			_ => Lookup::FanOut,
		}
	}
}
