//! Per-file incremental parse cache and multi-owner parse coordinator.
//!
//! A source file may belong to several projects at once. Each
//! [`CacheEntry`] keeps one parse result per owning project, all computed
//! against the same text version, so a file is parsed once per owner per
//! edit and every owner observes a consistent snapshot.
//!
//! * [`CacheEntry::parse`] answers from the cache when the requested version
//!   is already parsed, and otherwise fans the parse out to every owner under
//!   the entry's exclusive lock, committing all results together.
//! * [`CacheEntry::parse_async`] runs the same work on a worker thread and
//!   merges concurrent requests for the same version into one operation.
//! * [`ParseCache`] is the registry: it creates entries on demand, broadcasts
//!   committed updates, and expires caches of files that fall out of its LRU
//!   queue.
//!
//! The parser itself is injected through [`FileParser`]; file text comes from
//! a [`ContentProvider`] unless the caller supplies a snapshot.

mod config;
mod content;
mod entry;
mod error;
mod events;
mod ownership;
mod parser;
mod project;
mod registry;

pub use config::{ConfigError, ParseCacheConfig};
pub use content::{ContentError, ContentProvider, WorkspaceContent};
pub use entry::{CacheEntry, PendingParse};
pub use error::{Error, Result};
pub use events::{EntryHost, ParseUpdate, ParseUpdateReceiver, ParseUpdateSender};
pub use ownership::OwnershipRecord;
pub use parser::{BoxParserError, FileParser, ParseInformation, ParseRequest, ParserError};
pub use project::{Project, ProjectRef};
pub use registry::ParseCache;
pub use strata_primitives::{DocumentIdentity, FileId, ProjectId, TextBuffer, TextSnapshot, TextSource, VersionMarker};
pub use strata_worker::{CancelSignal, TaskClass};
