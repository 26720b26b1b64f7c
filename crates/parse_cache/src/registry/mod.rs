//! Process-wide registry of cache entries.
//!
//! [`ParseCache`] maps files to their [`CacheEntry`], fans every committed
//! update out to an optional event channel, and keeps recently parsed files in
//! a bounded LRU queue. Files pushed out of the queue have their caches
//! expired; ownerless files are dropped from the registry entirely.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use strata_primitives::{FileId, ProjectId, TextSource, VersionMarker};
use strata_worker::CancelSignal;
use tokio::sync::mpsc;

use crate::config::{ConfigError, ParseCacheConfig};
use crate::content::ContentProvider;
use crate::entry::{CacheEntry, PendingParse};
use crate::events::{EntryHost, ParseUpdate, ParseUpdateReceiver, ParseUpdateSender};
use crate::ownership::OwnershipRecord;
use crate::parser::{FileParser, ParseInformation};
use crate::project::ProjectRef;
use crate::{Error, Result};

/// Registry of per-file cache entries sharing one parser and content provider.
pub struct ParseCache<P: FileParser> {
	this: Weak<Self>,
	parser: Arc<P>,
	content: Arc<dyn ContentProvider>,
	config: ParseCacheConfig,
	entries: RwLock<HashMap<FileId, Arc<CacheEntry<P>>>>,
	expiry: Mutex<LruCache<FileId, ()>>,
	events: Option<ParseUpdateSender<P>>,
}

impl<P: FileParser> ParseCache<P> {
	pub fn new(parser: Arc<P>, content: Arc<dyn ContentProvider>, config: ParseCacheConfig) -> Result<Arc<Self>, ConfigError> {
		Self::build(parser, content, config, None)
	}

	/// Creates a registry that also publishes every committed update on a channel.
	pub fn with_events(
		parser: Arc<P>,
		content: Arc<dyn ContentProvider>,
		config: ParseCacheConfig,
	) -> Result<(Arc<Self>, ParseUpdateReceiver<P>), ConfigError> {
		let (tx, rx) = mpsc::unbounded_channel();
		Ok((Self::build(parser, content, config, Some(tx))?, rx))
	}

	fn build(
		parser: Arc<P>,
		content: Arc<dyn ContentProvider>,
		config: ParseCacheConfig,
		events: Option<ParseUpdateSender<P>>,
	) -> Result<Arc<Self>, ConfigError> {
		let limit = config.expiry_limit().ok_or(ConfigError::ZeroExpiryCapacity)?;
		Ok(Arc::new_cyclic(|this| Self {
			this: this.clone(),
			parser,
			content,
			config,
			entries: RwLock::new(HashMap::new()),
			expiry: Mutex::new(LruCache::new(limit)),
			events,
		}))
	}

	pub fn config(&self) -> &ParseCacheConfig {
		&self.config
	}

	pub fn entry(&self, file: &FileId) -> Option<Arc<CacheEntry<P>>> {
		self.entries.read().get(file).cloned()
	}

	pub fn get_or_create_entry(&self, file: &FileId) -> Arc<CacheEntry<P>> {
		if let Some(entry) = self.entry(file) {
			return entry;
		}
		let mut entries = self.entries.write();
		Arc::clone(entries.entry(file.clone()).or_insert_with(|| {
			tracing::debug!(%file, "parse_cache.entry.created");
			let host: Weak<dyn EntryHost<P>> = self.this.clone();
			Arc::new(
				CacheEntry::new(file.clone(), Arc::clone(&self.parser), Arc::clone(&self.content))
					.with_host(host)
					.with_async_class(self.config.async_class),
			)
		}))
	}

	pub fn entry_count(&self) -> usize {
		self.entries.read().len()
	}

	pub fn files(&self) -> Vec<FileId> {
		self.entries.read().keys().cloned().collect()
	}

	/// Returns true if the file is currently tracked by the expiry queue.
	pub fn is_queued_for_expiry(&self, file: &FileId) -> bool {
		self.expiry.lock().contains(file)
	}

	/// Adds an owner, retrying on a fresh entry if the one it landed on was
	/// removed from the registry meanwhile.
	pub fn add_owner(&self, file: &FileId, project: ProjectRef<P>, linked: bool) -> Result<()> {
		loop {
			let entry = self.get_or_create_entry(file);
			entry.add_owner(Arc::clone(&project), linked)?;
			if self.entry(file).is_some_and(|current| Arc::ptr_eq(&current, &entry)) {
				return Ok(());
			}
			tracing::debug!(%file, project = %project.id(), "parse_cache.entry.replaced");
		}
	}

	pub fn remove_owner(&self, file: &FileId, project: ProjectId) -> Result<()> {
		match self.entry(file) {
			Some(entry) => entry.remove_owner(project),
			None => Err(Error::DoesNotOwn { file: file.clone(), project }),
		}
	}

	/// See [`CacheEntry::parse`].
	pub fn parse(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: &CancelSignal,
	) -> Result<OwnershipRecord<P>> {
		self.get_or_create_entry(file).parse(content, project, full_info, cancel)
	}

	pub fn parse_information(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: &CancelSignal,
	) -> Result<Option<ParseInformation<P>>> {
		self.get_or_create_entry(file).parse_information(content, project, cancel)
	}

	pub fn parse_file(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: &CancelSignal,
	) -> Result<Option<Arc<P::File>>> {
		self.get_or_create_entry(file).parse_file(content, project, cancel)
	}

	/// See [`CacheEntry::parse_async`].
	pub fn parse_async(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		full_info: bool,
		cancel: CancelSignal,
	) -> PendingParse<P> {
		self.get_or_create_entry(file).parse_async(content, project, full_info, cancel)
	}

	pub fn parse_information_async(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: CancelSignal,
	) -> BoxFuture<'static, Result<Option<ParseInformation<P>>>> {
		self.get_or_create_entry(file).parse_information_async(content, project, cancel)
	}

	pub fn parse_file_async(
		&self,
		file: &FileId,
		content: Option<&dyn TextSource>,
		project: Option<&ProjectRef<P>>,
		cancel: CancelSignal,
	) -> BoxFuture<'static, Result<Option<Arc<P::File>>>> {
		self.get_or_create_entry(file).parse_file_async(content, project, cancel)
	}

	/// See [`CacheEntry::register_parsed_file`].
	pub fn register_parsed_file(&self, file: &FileId, project: ProjectId, parsed_file: Arc<P::File>) -> Result<()> {
		match self.entry(file) {
			Some(entry) => entry.register_parsed_file(project, parsed_file),
			None => Err(Error::UnknownOwner { file: file.clone(), project }),
		}
	}

	pub fn cached_parse_information(&self, file: &FileId, version: Option<&VersionMarker>, project: Option<ProjectId>) -> Option<ParseInformation<P>> {
		self.entry(file)?.cached_parse_information(version, project)
	}

	pub fn existing_parsed_file(&self, file: &FileId, version: Option<&VersionMarker>, project: Option<ProjectId>) -> Option<Arc<P::File>> {
		self.entry(file)?.existing_parsed_file(version, project)
	}

	/// Expires every entry's cache and empties the expiry queue.
	pub fn expire_all(&self) {
		self.expiry.lock().clear();
		let entries: Vec<_> = self.entries.read().values().cloned().collect();
		tracing::debug!(count = entries.len(), "parse_cache.expire_all");
		for entry in entries {
			entry.expire_cache();
		}
	}
}

impl<P: FileParser> EntryHost<P> for ParseCache<P> {
	fn parse_information_updated(&self, update: &ParseUpdate<P>) {
		if let Some(tx) = &self.events
			&& tx.send(update.clone()).is_err()
		{
			tracing::trace!(file = %update.file, "parse_cache.events.closed");
		}
	}

	fn register_for_expiry(&self, file: &FileId) {
		if !self.config.expire_open_documents && self.content.open_document(file).is_some() {
			return;
		}
		let evicted = self.expiry.lock().push(file.clone(), ()).filter(|(key, _)| key != file);
		if let Some((evicted, ())) = evicted {
			tracing::debug!(file = %evicted, "parse_cache.expiry.evict");
			if let Some(entry) = self.entry(&evicted) {
				entry.expire_cache();
			}
		}
	}

	fn remove_entry(&self, entry: &CacheEntry<P>) {
		let file = entry.file();
		let removed = {
			let mut entries = self.entries.write();
			let current = entries
				.get(file)
				.is_some_and(|mapped| std::ptr::eq(Arc::as_ptr(mapped), entry) && mapped.is_ownerless());
			current && entries.remove(file).is_some()
		};
		if removed {
			self.expiry.lock().pop(file);
			tracing::debug!(%file, "parse_cache.entry.removed");
		}
	}
}
