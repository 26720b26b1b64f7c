//! Cache entry tests and the parser, project, host and content doubles shared
//! with the rest of the crate's tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use strata_primitives::{DocumentIdentity, FileId, ProjectId, TextSnapshot, VersionMarker};
use strata_worker::CancelSignal;
use tokio::sync::Notify;

use super::*;
use crate::content::{ContentError, ContentProvider};
use crate::events::{EntryHost, ParseUpdate};
use crate::parser::{BoxParserError, ParseRequest};
use crate::project::Project;

mod pending;

/// Parsed-file summary produced by [`TestParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestFile {
	pub(crate) text: String,
	pub(crate) project: Option<ProjectId>,
	pub(crate) version: Option<VersionMarker>,
	/// Parser call number that produced this file.
	pub(crate) serial: usize,
}

#[derive(Debug)]
pub(crate) struct TestTree {
	pub(crate) len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
	Error,
	NoResult,
	Partial,
	Panic,
}

/// Parser double that counts calls and can fail or block on demand.
#[derive(Default)]
pub(crate) struct TestParser {
	pub(crate) calls: AtomicUsize,
	pub(crate) seen: Mutex<Vec<(Option<ProjectId>, bool)>>,
	failures: Mutex<Vec<(Option<ProjectId>, Failure)>>,
	hold: Option<Arc<Notify>>,
	always_full: bool,
}

impl TestParser {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Parser whose calls block until [`TestParser::proceed`] is called.
	pub(crate) fn held() -> Self {
		Self {
			hold: Some(Arc::new(Notify::new())),
			..Self::default()
		}
	}

	/// Parser that returns full information even for partial requests.
	pub(crate) fn always_full() -> Self {
		Self {
			always_full: true,
			..Self::default()
		}
	}

	pub(crate) fn fail_for(&self, project: Option<ProjectId>, failure: Failure) {
		self.failures.lock().push((project, failure));
	}

	pub(crate) fn clear_failures(&self) {
		self.failures.lock().clear();
	}

	pub(crate) fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Allows one held parse to proceed.
	pub(crate) fn proceed(&self) {
		if let Some(hold) = &self.hold {
			hold.notify_one();
		}
	}

	/// Waits until at least `n` parser calls have started.
	pub(crate) async fn wait_for_calls(&self, n: usize) {
		let mut iters = 0;
		while self.calls() < n && iters < 500 {
			tokio::time::sleep(Duration::from_millis(2)).await;
			iters += 1;
		}
		assert!(self.calls() >= n, "expected {n} parser calls, saw {}", self.calls());
	}
}

impl FileParser for TestParser {
	type File = TestFile;
	type Tree = TestTree;

	fn parse(&self, request: ParseRequest<'_, Self>) -> Result<Option<ParseInformation<Self>>, BoxParserError> {
		let serial = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let project = request.project.map(|p| p.id());
		self.seen.lock().push((project, request.full_info));
		if let Some(hold) = &self.hold {
			futures::executor::block_on(hold.notified());
		}
		if request.cancel.is_cancelled() {
			return Err("cancelled".into());
		}

		let failure = self.failures.lock().iter().find(|(p, _)| *p == project).map(|(_, f)| *f);
		let version = request.content.version();
		let file = TestFile {
			text: request.content.text().to_owned(),
			project,
			version,
			serial,
		};
		match failure {
			Some(Failure::Error) => Err(format!("syntax error in {}", request.file).into()),
			Some(Failure::NoResult) => Ok(None),
			Some(Failure::Partial) => Ok(Some(ParseInformation::partial(file, version))),
			Some(Failure::Panic) => panic!("parser crashed"),
			None if request.full_info || self.always_full => {
				let len = file.text.len();
				Ok(Some(ParseInformation::full(file, TestTree { len }, version)))
			}
			None => Ok(Some(ParseInformation::partial(file, version))),
		}
	}
}

/// Project double that records the updates it is notified about.
pub(crate) struct TestProject {
	id: ProjectId,
	pub(crate) updates: Mutex<Vec<ParseUpdate<TestParser>>>,
}

impl TestProject {
	pub(crate) fn new(id: u64) -> Arc<Self> {
		Arc::new(Self {
			id: ProjectId(id),
			updates: Mutex::new(Vec::new()),
		})
	}

	pub(crate) fn update_count(&self) -> usize {
		self.updates.lock().len()
	}
}

impl Project<TestParser> for TestProject {
	fn id(&self) -> ProjectId {
		self.id
	}

	fn on_parse_information_updated(&self, update: &ParseUpdate<TestParser>) {
		self.updates.lock().push(update.clone());
	}
}

pub(crate) fn project(id: u64) -> ProjectRef<TestParser> {
	TestProject::new(id)
}

/// Host double recording every hook call.
#[derive(Default)]
pub(crate) struct RecordingHost {
	pub(crate) updates: Mutex<Vec<ParseUpdate<TestParser>>>,
	pub(crate) expiry: Mutex<Vec<FileId>>,
	pub(crate) removed: Mutex<Vec<FileId>>,
}

impl EntryHost<TestParser> for RecordingHost {
	fn parse_information_updated(&self, update: &ParseUpdate<TestParser>) {
		self.updates.lock().push(update.clone());
	}

	fn register_for_expiry(&self, file: &FileId) {
		self.expiry.lock().push(file.clone());
	}

	fn remove_entry(&self, entry: &CacheEntry<TestParser>) {
		self.removed.lock().push(entry.file().clone());
	}
}

/// Content provider serving one fixed snapshot, or failing when it has none.
#[derive(Default)]
pub(crate) struct StaticContent {
	pub(crate) disk: Mutex<Option<TextSnapshot>>,
	pub(crate) open: Mutex<Option<TextSnapshot>>,
	pub(crate) content_thread: bool,
	pub(crate) disk_reads: AtomicUsize,
}

impl StaticContent {
	pub(crate) fn on_disk(text: &str) -> Self {
		Self {
			disk: Mutex::new(Some(TextSnapshot::unversioned(text))),
			..Self::default()
		}
	}
}

impl ContentProvider for StaticContent {
	fn open_document(&self, _file: &FileId) -> Option<TextSnapshot> {
		self.open.lock().clone()
	}

	fn read_from_disk(&self, file: &FileId, cancel: &CancelSignal) -> Result<TextSnapshot, ContentError> {
		self.disk_reads.fetch_add(1, Ordering::SeqCst);
		if cancel.is_cancelled() {
			return Err(ContentError::Cancelled {
				path: file.path().to_path_buf(),
			});
		}
		self.disk.lock().clone().ok_or_else(|| ContentError::NotFound {
			path: file.path().to_path_buf(),
		})
	}

	fn is_content_thread(&self) -> bool {
		self.content_thread
	}
}

pub(crate) struct Fixture {
	pub(crate) parser: Arc<TestParser>,
	pub(crate) host: Arc<RecordingHost>,
	pub(crate) content: Arc<StaticContent>,
	pub(crate) entry: Arc<CacheEntry<TestParser>>,
}

impl Fixture {
	pub(crate) fn new() -> Self {
		Self::with(TestParser::new(), StaticContent::default())
	}

	pub(crate) fn with(parser: TestParser, content: StaticContent) -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let parser = Arc::new(parser);
		let host = Arc::new(RecordingHost::default());
		let content = Arc::new(content);
		let weak = Arc::downgrade(&host);
		let weak: Weak<dyn EntryHost<TestParser>> = weak;
		let entry = CacheEntry::new(FileId::from("src/lib.rs"), Arc::clone(&parser), Arc::clone(&content) as Arc<dyn ContentProvider>).with_host(weak);
		Self {
			parser,
			host,
			content,
			entry: Arc::new(entry),
		}
	}
}

/// Versioned snapshot of `text` at `ordinal` of `doc`.
pub(crate) fn snapshot(doc: DocumentIdentity, ordinal: u64, text: &str) -> TextSnapshot {
	TextSnapshot::new(text, Some(VersionMarker::new(doc, ordinal)))
}

pub(crate) fn doc() -> DocumentIdentity {
	DocumentIdentity::fresh()
}

pub(crate) fn never() -> CancelSignal {
	CancelSignal::never()
}
