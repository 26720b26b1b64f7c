//! Background parses and de-duplication of concurrent async requests.

use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::future::BoxFuture;
use strata_primitives::{FileId, TextSnapshot, TextSource, VersionMarker};
use strata_worker::CancelSignal;
use tokio::sync::watch;

use super::fan_out::ParseOutcome;
use super::{CacheEntry, Lookup};
use crate::ownership::OwnershipRecord;
use crate::parser::{FileParser, ParseInformation};
use crate::project::ProjectRef;
use crate::{Error, Result};

type SharedOutcome<P> = Arc<Result<ParseOutcome<P>>>;
type OutcomeReceiver<P> = watch::Receiver<Option<SharedOutcome<P>>>;

/// Bookkeeping for the one background parse later async requests may join.
///
/// Only operations with a known target version and a non-cancellable signal
/// are tracked; a caller-owned signal could abandon work other callers rely on.
pub(crate) struct InFlightParse<P: FileParser> {
	id: u64,
	version: VersionMarker,
	full_info: bool,
	rx: OutcomeReceiver<P>,
}

impl<P: FileParser> InFlightParse<P> {
	fn serves(&self, version: &VersionMarker, full_info: bool) -> bool {
		self.version.is_same_version(version) && (self.full_info || !full_info)
	}
}

/// Handle to an asynchronous parse.
///
/// Scheduling happens when [`CacheEntry::parse_async`] returns; awaiting the
/// handle only waits for the result. Dropping it does not stop the parse.
#[must_use = "the parse runs regardless; await the handle to observe its result"]
pub struct PendingParse<P: FileParser> {
	entry: Arc<CacheEntry<P>>,
	project: Option<ProjectRef<P>>,
	snapshot: Option<TextSnapshot>,
	full_info: bool,
	cancel: CancelSignal,
	state: Pending<P>,
}

enum Pending<P: FileParser> {
	Ready(OwnershipRecord<P>),
	Started { operation: u64, rx: OutcomeReceiver<P> },
	Joined { operation: u64, rx: OutcomeReceiver<P> },
}

impl<P: FileParser> PendingParse<P> {
	/// Id of the background operation this handle waits on, if any.
	///
	/// Handles that joined an existing operation report that operation's id.
	pub fn operation_id(&self) -> Option<u64> {
		match &self.state {
			Pending::Ready(_) => None,
			Pending::Started { operation, .. } | Pending::Joined { operation, .. } => Some(*operation),
		}
	}

	/// Returns true if the request was answered from the cache without scheduling work.
	pub fn is_ready(&self) -> bool {
		matches!(self.state, Pending::Ready(_))
	}

	/// Returns true if the request joined a parse started by another caller.
	pub fn is_joined(&self) -> bool {
		matches!(self.state, Pending::Joined { .. })
	}

	/// Waits for the result.
	///
	/// If this caller's signal fires first, only this wait is abandoned and
	/// [`Error::Cancelled`] is returned; a shared operation keeps running for
	/// the other callers.
	pub async fn wait(self) -> Result<OwnershipRecord<P>> {
		let Self {
			entry,
			project,
			snapshot,
			full_info,
			cancel,
			state,
		} = self;
		let file = entry.file().clone();
		let (rx, joined) = match state {
			Pending::Ready(record) => return Ok(record),
			Pending::Started { rx, .. } => (rx, false),
			Pending::Joined { rx, .. } => (rx, true),
		};

		let shared = tokio::select! {
			biased;
			() = cancel.cancelled() => return Err(Error::Cancelled { file: file.clone() }),
			shared = recv_outcome(rx, &file) => shared?,
		};
		let outcome = match &*shared {
			Ok(outcome) => outcome,
			Err(error) => return Err(error.clone()),
		};
		if !joined {
			return Ok(outcome.requested());
		}
		let project_id = project.as_ref().map(|p| p.id());
		if let Some(record) = outcome.record_for(project_id) {
			return Ok(record);
		}

		tracing::debug!(%file, project = ?project_id, "parse_cache.async.join_fallback");
		let class = entry.async_class;
		let signal = cancel.clone();
		let run = strata_worker::spawn_blocking(class, move || entry.run_parse(snapshot, project.as_ref(), full_info, &signal));
		tokio::select! {
			biased;
			() = cancel.cancelled() => Err(Error::Cancelled { file }),
			joined = run => match joined {
				Ok(result) => result.map(|outcome| outcome.requested()),
				Err(error) => {
					tracing::error!(%file, %error, "parse_cache.async.task_failed");
					Err(Error::Aborted { file })
				}
			},
		}
	}
}

impl<P: FileParser> IntoFuture for PendingParse<P> {
	type Output = Result<OwnershipRecord<P>>;
	type IntoFuture = BoxFuture<'static, Self::Output>;

	fn into_future(self) -> Self::IntoFuture {
		Box::pin(self.wait())
	}
}

async fn recv_outcome<P: FileParser>(mut rx: OutcomeReceiver<P>, file: &FileId) -> Result<SharedOutcome<P>> {
	loop {
		let current = rx.borrow_and_update().clone();
		if let Some(shared) = current {
			return Ok(shared);
		}
		if rx.changed().await.is_err() {
			return Err(Error::Aborted { file: file.clone() });
		}
	}
}

/// Publishes the outcome of a background parse and clears its tracking.
///
/// If dropped without [`InFlightGuard::complete`] (the parse panicked), waiters
/// receive [`Error::Aborted`].
struct InFlightGuard<P: FileParser> {
	entry: Arc<CacheEntry<P>>,
	operation: u64,
	tx: watch::Sender<Option<SharedOutcome<P>>>,
	completed: bool,
}

impl<P: FileParser> InFlightGuard<P> {
	fn complete(mut self, result: Result<ParseOutcome<P>>) {
		self.completed = true;
		self.finish(result);
	}

	fn finish(&self, result: Result<ParseOutcome<P>>) {
		{
			let mut state = self.entry.state.lock();
			if state.in_flight.as_ref().is_some_and(|op| op.id == self.operation) {
				state.in_flight = None;
			}
		}
		self.tx.send_replace(Some(Arc::new(result)));
	}
}

impl<P: FileParser> Drop for InFlightGuard<P> {
	fn drop(&mut self) {
		if !self.completed {
			tracing::warn!(file = %self.entry.file, operation = self.operation, "parse_cache.async.aborted");
			self.finish(Err(Error::Aborted {
				file: self.entry.file.clone(),
			}));
		}
	}
}

impl<P: FileParser> CacheEntry<P> {
	/// Schedules a parse on a worker thread and returns a handle to its result.
	///
	/// With `content`, that text is snapshotted now. Without it, open-document
	/// content is resolved now when called on the content thread, and
	/// everything else is resolved in the background.
	///
	/// A request whose snapshot version is already cached returns a ready
	/// handle. A request matching a tracked background parse of the same
	/// version (whose completeness covers this request) joins it instead of
	/// starting another.
	pub fn parse_async(
		self: &Arc<Self>,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: CancelSignal,
	) -> PendingParse<P> {
		let snapshot = match content {
			Some(source) => Some(source.snapshot()),
			None if self.content.is_content_thread() => self.content.open_document(&self.file),
			None => None,
		};
		let version = snapshot.as_ref().and_then(TextSnapshot::version);
		let project_id = project.map(|p| p.id());
		let handle = |state: Pending<P>| PendingParse {
			entry: Arc::clone(self),
			project: project.cloned(),
			snapshot: snapshot.clone(),
			full_info,
			cancel: cancel.clone(),
			state,
		};

		let mut state = self.state.lock();
		if let Some(version) = version.as_ref() {
			if let Lookup::Hit(record) = state.lookup(Some(version), project_id, full_info) {
				tracing::trace!(file = %self.file, project = ?project_id, "parse_cache.async.hit");
				return handle(Pending::Ready(record));
			}
			if let Some(in_flight) = state.in_flight.as_ref().filter(|op| op.serves(version, full_info)) {
				tracing::debug!(file = %self.file, operation = in_flight.id, "parse_cache.async.join");
				return handle(Pending::Joined {
					operation: in_flight.id,
					rx: in_flight.rx.clone(),
				});
			}
		}

		let operation = self.next_operation.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = watch::channel(None);
		if let Some(version) = version
			&& !cancel.can_be_cancelled()
		{
			state.in_flight = Some(InFlightParse {
				id: operation,
				version,
				full_info,
				rx: rx.clone(),
			});
		}
		drop(state);

		tracing::debug!(file = %self.file, operation, ?version, full_info, "parse_cache.async.schedule");
		let guard = InFlightGuard {
			entry: Arc::clone(self),
			operation,
			tx,
			completed: false,
		};
		let entry = Arc::clone(self);
		let task_snapshot = snapshot.clone();
		let task_project = project.cloned();
		let task_cancel = cancel.clone();
		drop(strata_worker::spawn_blocking(self.async_class, move || {
			let result = entry.run_parse(task_snapshot, task_project.as_ref(), full_info, &task_cancel);
			guard.complete(result);
		}));

		handle(Pending::Started { operation, rx })
	}

	/// Async variant of [`CacheEntry::parse_information`].
	pub fn parse_information_async(
		self: &Arc<Self>,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: CancelSignal,
	) -> BoxFuture<'static, Result<Option<ParseInformation<P>>>> {
		let pending = self.parse_async(content, project, true, cancel);
		Box::pin(async move { Ok(pending.wait().await?.parse_info().cloned()) })
	}

	/// Async variant of [`CacheEntry::parse_file`].
	pub fn parse_file_async(
		self: &Arc<Self>,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: CancelSignal,
	) -> BoxFuture<'static, Result<Option<Arc<P::File>>>> {
		let pending = self.parse_async(content, project, false, cancel);
		Box::pin(async move { Ok(pending.wait().await?.parsed_file().cloned()) })
	}
}
