//! Synchronous parsing: cache lookup, standalone parses and the owner fan-out.

use std::sync::Arc;

use strata_primitives::{ProjectId, TextSnapshot, TextSource};
use strata_worker::CancelSignal;

use super::{CacheEntry, Lookup};
use crate::content::ContentError;
use crate::events::ParseUpdate;
use crate::ownership::OwnershipRecord;
use crate::parser::{FileParser, ParseInformation, ParseRequest};
use crate::project::ProjectRef;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutcomeKind {
	/// Content could not be read; every caller gets an empty record.
	Unavailable,
	/// One record for the requesting project: a cache hit or a standalone parse.
	Single,
	/// The committed records of every owner.
	FanOut,
}

/// Result of one parse operation, shared with joined async callers.
pub(crate) struct ParseOutcome<P: FileParser> {
	kind: OutcomeKind,
	records: Vec<OwnershipRecord<P>>,
	requested: usize,
}

impl<P: FileParser> ParseOutcome<P> {
	fn unavailable() -> Self {
		Self {
			kind: OutcomeKind::Unavailable,
			records: vec![OwnershipRecord::empty()],
			requested: 0,
		}
	}

	fn single(record: OwnershipRecord<P>) -> Self {
		Self {
			kind: OutcomeKind::Single,
			records: vec![record],
			requested: 0,
		}
	}

	/// Record answering the caller that started the operation.
	pub(crate) fn requested(&self) -> OwnershipRecord<P> {
		self.records[self.requested].clone()
	}

	/// Record answering another caller for `project` (`None` = primary), if
	/// this outcome contains one.
	pub(crate) fn record_for(&self, project: Option<ProjectId>) -> Option<OwnershipRecord<P>> {
		match self.kind {
			OutcomeKind::Unavailable => Some(OwnershipRecord::empty()),
			OutcomeKind::Single => self.records.iter().find(|r| project.is_some() && r.project_id() == project).cloned(),
			OutcomeKind::FanOut => match project {
				None => self.records.first().cloned(),
				Some(id) => self.records.iter().find(|r| r.project_id() == Some(id)).cloned(),
			},
		}
	}
}

impl<P: FileParser> CacheEntry<P> {
	/// Parses the file for `project` (`None` = primary owner).
	///
	/// With `content`, that snapshot is parsed; otherwise the content provider
	/// supplies the text. If the file is missing or unreadable the result is an
	/// empty record; a cancelled read is [`Error::Cancelled`]. Returns the record for the requested project; a cache hit
	/// returns without calling the parser.
	///
	/// On a cache miss every owner is re-parsed while the entry's exclusive
	/// lock is held, and all results are committed together. Requests for
	/// text older than the cached version, and requests from non-owners, are
	/// parsed without touching the cache.
	pub fn parse(
		&self,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: &CancelSignal,
	) -> Result<OwnershipRecord<P>> {
		let outcome = self.run_parse(content.map(TextSource::snapshot), project, full_info, cancel)?;
		Ok(outcome.requested())
	}

	/// Full parse information for `project`, parsing if needed.
	pub fn parse_information(
		&self,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: &CancelSignal,
	) -> Result<Option<ParseInformation<P>>> {
		Ok(self.parse(content, project, true, cancel)?.parse_info().cloned())
	}

	/// Parsed file for `project`, parsing if needed.
	pub fn parse_file(&self, content: Option<&dyn TextSource>, project: Option<&ProjectRef<P>>, cancel: &CancelSignal) -> Result<Option<Arc<P::File>>> {
		Ok(self.parse(content, project, false, cancel)?.parsed_file().cloned())
	}

	pub(crate) fn run_parse(
		&self,
		snapshot: Option<TextSnapshot>,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: &CancelSignal,
	) -> Result<ParseOutcome<P>> {
		let snapshot = match snapshot {
			Some(snapshot) => snapshot,
			None => match self.content.content(&self.file, cancel) {
				Ok(snapshot) => snapshot,
				Err(ContentError::Cancelled { .. }) => {
					tracing::debug!(file = %self.file, "parse_cache.content.cancelled");
					return Err(Error::Cancelled { file: self.file.clone() });
				}
				Err(error) => {
					tracing::debug!(file = %self.file, %error, "parse_cache.content.unavailable");
					return Ok(ParseOutcome::unavailable());
				}
			},
		};
		let project_id = project.map(|p| p.id());
		let version = snapshot.version();

		let lookup = self.state.lock().lookup(version.as_ref(), project_id, full_info);
		if let Some(outcome) = self.try_answer(lookup, &snapshot, project, full_info, cancel) {
			return outcome;
		}

		let outcome = {
			let _gate = self.gate.lock();
			// A concurrent fan-out may have committed while we waited for the gate.
			let lookup = self.state.lock().lookup(version.as_ref(), project_id, full_info);
			match self.try_answer(lookup, &snapshot, project, full_info, cancel) {
				Some(answer) => return answer,
				None => self.fan_out(&snapshot, project_id, full_info, cancel)?,
			}
		};
		if let Some(host) = self.host.upgrade() {
			host.register_for_expiry(&self.file);
		}
		Ok(outcome)
	}

	/// Answers a lookup that needs no fan-out; `None` for [`Lookup::FanOut`].
	fn try_answer(
		&self,
		lookup: Lookup<P>,
		snapshot: &TextSnapshot,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: &CancelSignal,
	) -> Option<Result<ParseOutcome<P>>> {
		match lookup {
			Lookup::Hit(record) => {
				tracing::trace!(file = %self.file, project = ?record.project_id(), "parse_cache.lookup.hit");
				Some(Ok(ParseOutcome::single(record)))
			}
			Lookup::Standalone { owner } => {
				let target = project.cloned().or(owner);
				tracing::debug!(file = %self.file, project = ?target.as_ref().map(|p| p.id()), "parse_cache.standalone");
				Some(
					self.invoke_parser(snapshot, target.as_ref(), full_info, cancel)
						.map(|info| ParseOutcome::single(OwnershipRecord::from_parse(target, info))),
				)
			}
			Lookup::FanOut => None,
		}
	}

	/// Parses for every owner and commits the results. Caller holds the gate.
	///
	/// Nothing is committed unless every owner's parse succeeds.
	fn fan_out(&self, snapshot: &TextSnapshot, project: Option<ProjectId>, full_info: bool, cancel: &CancelSignal) -> Result<ParseOutcome<P>> {
		let owners: Vec<_> = self.state.lock().owners.records().to_vec();
		let requested = match project {
			None => 0,
			Some(id) => owners.iter().position(|r| r.project_id() == Some(id)).unwrap_or(0),
		};
		tracing::debug!(
			file = %self.file,
			owners = owners.len(),
			version = ?snapshot.version(),
			full_info,
			"parse_cache.fan_out.begin"
		);

		let mut infos = Vec::with_capacity(owners.len());
		for owner in &owners {
			infos.push(self.invoke_parser(snapshot, owner.project(), full_info, cancel)?);
		}

		let (records, updates) = {
			let mut state = self.state.lock();
			let records: Vec<_> = owners
				.iter()
				.zip(&infos)
				.map(|(owner, info)| {
					// Full info survives a partial request only if the owner already held it.
					let keep_info = full_info || owner.parse_info().is_some();
					OwnershipRecord::committed(owner.project().cloned(), info.clone(), keep_info)
				})
				.collect();
			let previous = state.owners.replace_all(records.clone());
			state.version = snapshot.version();
			let updates: Vec<_> = previous
				.iter()
				.zip(infos)
				.map(|(old, info)| ParseUpdate {
					file: self.file.clone(),
					project: old.project_id(),
					old_parsed_file: old.parsed_file().cloned(),
					new_parsed_file: Some(Arc::clone(info.parsed_file())),
					new_info: Some(info),
				})
				.collect();
			(records, updates)
		};
		tracing::debug!(file = %self.file, version = ?snapshot.version(), "parse_cache.fan_out.commit");
		self.publish(&records, &updates);

		Ok(ParseOutcome {
			kind: OutcomeKind::FanOut,
			records,
			requested,
		})
	}

	/// Calls the parser once and enforces its contract.
	fn invoke_parser(
		&self,
		snapshot: &TextSnapshot,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: &CancelSignal,
	) -> Result<ParseInformation<P>> {
		let request = ParseRequest {
			file: &self.file,
			content: snapshot,
			full_info,
			project,
			cancel,
		};
		let project = project.map(|p| p.id());
		match self.parser.parse(request) {
			Ok(Some(info)) if full_info && !info.is_full() => {
				tracing::error!(file = %self.file, ?project, "parser returned partial information for a full request");
				Err(Error::ParserContract {
					file: self.file.clone(),
					reason: "full parse information was requested but not returned",
				})
			}
			Ok(Some(info)) => Ok(info),
			Ok(None) => {
				tracing::error!(file = %self.file, ?project, "parser returned no result");
				Err(Error::ParserContract {
					file: self.file.clone(),
					reason: "parser returned no result",
				})
			}
			Err(_) if cancel.is_cancelled() => {
				tracing::debug!(file = %self.file, ?project, "parse_cache.parser.cancelled");
				Err(Error::Cancelled { file: self.file.clone() })
			}
			Err(source) => {
				tracing::error!(file = %self.file, ?project, error = %source, "parse_cache.parser.failed");
				Err(Error::Parser {
					file: self.file.clone(),
					source: Arc::from(source),
				})
			}
		}
	}
}
