//! Per-file parse cache entry.
//!
//! A [`CacheEntry`] keeps one cached result per owning project, all computed
//! against the same text version, and coordinates the parses that refresh
//! them.
//!
//! # Locking
//!
//! * `gate`: the entry's exclusive lock. Held for ownership changes, result
//!   injection, cache expiry and the whole synchronous fan-out, including the
//!   parser calls. Parsing one file is therefore serialised across its owners.
//! * `state`: short-held lock over the owner list, the version marker and the
//!   in-flight async bookkeeping. Taken after `gate` when both are needed.
//!   Queries and async scheduling take only this lock, so they never wait on a
//!   running parser.
//!
//! Hooks on the [`EntryHost`] that may re-enter the registry
//! (`register_for_expiry`, `remove_entry`) run after both locks are released.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strata_primitives::{FileId, ProjectId, VersionMarker};
use strata_worker::TaskClass;

use crate::content::ContentProvider;
use crate::events::{DetachedHost, EntryHost, ParseUpdate};
use crate::ownership::{OwnershipRecord, Owners};
use crate::parser::{FileParser, ParseInformation};
use crate::project::ProjectRef;
use crate::{Error, Result};

mod fan_out;
mod lookup;
mod pending;

pub use pending::PendingParse;

use lookup::Lookup;
use pending::InFlightParse;

/// Cached parse state and parse coordination for one file.
pub struct CacheEntry<P: FileParser> {
	file: FileId,
	parser: Arc<P>,
	content: Arc<dyn ContentProvider>,
	host: Weak<dyn EntryHost<P>>,
	async_class: TaskClass,
	gate: Mutex<()>,
	state: Mutex<EntryState<P>>,
	next_operation: AtomicU64,
}

pub(crate) struct EntryState<P: FileParser> {
	owners: Owners<P>,
	/// Version every cached record was computed against; `None` forces a re-parse.
	version: Option<VersionMarker>,
	in_flight: Option<InFlightParse<P>>,
}

impl<P: FileParser> CacheEntry<P> {
	/// Creates an ownerless entry that is not attached to a registry.
	pub fn new(file: FileId, parser: Arc<P>, content: Arc<dyn ContentProvider>) -> Self {
		Self {
			file,
			parser,
			content,
			host: Weak::<DetachedHost>::new(),
			async_class: TaskClass::CpuBlocking,
			gate: Mutex::new(()),
			state: Mutex::new(EntryState {
				owners: Owners::new(),
				version: None,
				in_flight: None,
			}),
			next_operation: AtomicU64::new(1),
		}
	}

	/// Attaches the registry hooks this entry reports to.
	#[must_use]
	pub fn with_host(mut self, host: Weak<dyn EntryHost<P>>) -> Self {
		self.host = host;
		self
	}

	/// Sets the worker class used for background parses.
	#[must_use]
	pub fn with_async_class(mut self, class: TaskClass) -> Self {
		self.async_class = class;
		self
	}

	pub fn file(&self) -> &FileId {
		&self.file
	}

	/// Adds an owning project.
	///
	/// A non-linked owner becomes the primary owner; a linked owner is appended.
	/// The first owner of an ownerless entry takes the placeholder's slot.
	pub fn add_owner(&self, project: ProjectRef<P>, linked: bool) -> Result<()> {
		let _gate = self.gate.lock();
		let id = project.id();
		if !self.state.lock().owners.add(project, linked) {
			return Err(Error::AlreadyOwns {
				file: self.file.clone(),
				project: id,
			});
		}
		tracing::debug!(file = %self.file, project = %id, linked, "parse_cache.owner.added");
		Ok(())
	}

	/// Removes an owning project.
	///
	/// A project that had a parsed file is notified that it no longer has one.
	/// Removing the last owner leaves the entry ownerless and registers it for
	/// expiry with its host.
	pub fn remove_owner(&self, project: ProjectId) -> Result<()> {
		let became_ownerless = {
			let _gate = self.gate.lock();
			let (removed, became_ownerless) = self.state.lock().owners.remove(project).ok_or_else(|| Error::DoesNotOwn {
				file: self.file.clone(),
				project,
			})?;
			if let Some(old) = removed.parsed_file().cloned() {
				let update = ParseUpdate {
					file: self.file.clone(),
					project: Some(project),
					old_parsed_file: Some(old),
					new_parsed_file: None,
					new_info: None,
				};
				self.publish(&[removed], &[update]);
			}
			became_ownerless
		};
		tracing::debug!(file = %self.file, %project, became_ownerless, "parse_cache.owner.removed");
		if became_ownerless && let Some(host) = self.host.upgrade() {
			host.register_for_expiry(&self.file);
		}
		Ok(())
	}

	/// Owning projects in order; the first one is the primary owner.
	pub fn owners(&self) -> Vec<ProjectId> {
		self.state.lock().owners.records().iter().filter_map(OwnershipRecord::project_id).collect()
	}

	pub fn primary_owner(&self) -> Option<ProjectId> {
		self.state.lock().owners.records()[0].project_id()
	}

	pub fn is_ownerless(&self) -> bool {
		self.state.lock().owners.is_ownerless()
	}

	/// Version the cached records were computed against, if any.
	pub fn current_version(&self) -> Option<VersionMarker> {
		self.state.lock().version
	}

	/// Cached record for a project (`None` = primary), without any version check.
	pub fn record(&self, project: Option<ProjectId>) -> Option<OwnershipRecord<P>> {
		let state = self.state.lock();
		state.owners.find(project).map(|i| state.owners.records()[i].clone())
	}

	/// Cached full parse information, if it matches `version` (when given).
	///
	/// Never triggers a parse.
	pub fn cached_parse_information(&self, version: Option<&VersionMarker>, project: Option<ProjectId>) -> Option<ParseInformation<P>> {
		self.cached_record(version, project)?.parse_info().cloned()
	}

	/// Cached parsed file, if it matches `version` (when given).
	///
	/// Never triggers a parse.
	pub fn existing_parsed_file(&self, version: Option<&VersionMarker>, project: Option<ProjectId>) -> Option<Arc<P::File>> {
		self.cached_record(version, project)?.parsed_file().cloned()
	}

	fn cached_record(&self, version: Option<&VersionMarker>, project: Option<ProjectId>) -> Option<OwnershipRecord<P>> {
		let state = self.state.lock();
		if version.is_some() && state.compare_version(version) != Some(std::cmp::Ordering::Equal) {
			return None;
		}
		state.owners.find(project).map(|i| state.owners.records()[i].clone())
	}

	/// Drops all cached full parse information but keeps ownership and parsed files.
	///
	/// The next parse request re-parses even if the text is unchanged. An
	/// ownerless entry asks its host to remove it instead.
	pub fn expire_cache(&self) {
		let ownerless = {
			let _gate = self.gate.lock();
			let mut state = self.state.lock();
			state.version = None;
			if state.owners.is_ownerless() {
				true
			} else {
				state.owners.drop_parse_info();
				false
			}
		};
		tracing::debug!(file = %self.file, ownerless, "parse_cache.expire");
		if ownerless && let Some(host) = self.host.upgrade() {
			host.remove_entry(self);
		}
	}

	/// Publishes an externally produced parsed file for one owner.
	///
	/// The project's full parse information is cleared and the entry's version
	/// is reset, so the next request from any owner re-parses.
	pub fn register_parsed_file(&self, project: ProjectId, parsed_file: Arc<P::File>) -> Result<()> {
		let _gate = self.gate.lock();
		let (record, update) = {
			let mut state = self.state.lock();
			let index = state.owners.find(Some(project)).ok_or_else(|| Error::UnknownOwner {
				file: self.file.clone(),
				project,
			})?;
			let owner = state.owners.records()[index].project().cloned();
			let record = OwnershipRecord::with_parsed_file(owner, Some(Arc::clone(&parsed_file)));
			let old = state.owners.set(index, record.clone());
			state.version = None;
			let update = ParseUpdate {
				file: self.file.clone(),
				project: Some(project),
				old_parsed_file: old.parsed_file().cloned(),
				new_parsed_file: Some(Arc::clone(&parsed_file)),
				new_info: Some(ParseInformation::from_shared(parsed_file, None)),
			};
			(record, update)
		};
		tracing::debug!(file = %self.file, %project, "parse_cache.inject");
		self.publish(std::slice::from_ref(&record), std::slice::from_ref(&update));
		Ok(())
	}

	/// Delivers updates to each record's project and to the host broadcast.
	fn publish(&self, records: &[OwnershipRecord<P>], updates: &[ParseUpdate<P>]) {
		let host = self.host.upgrade();
		for (record, update) in records.iter().zip(updates) {
			if let Some(project) = record.project() {
				project.on_parse_information_updated(update);
			}
			if let Some(host) = &host {
				host.parse_information_updated(update);
			}
		}
	}
}

#[cfg(test)]
pub(crate) mod tests;
