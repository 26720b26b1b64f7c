//! Ownership records and the ordered owner list of one entry.

use std::fmt;
use std::sync::Arc;

use strata_primitives::ProjectId;

use crate::parser::{FileParser, ParseInformation};
use crate::project::ProjectRef;

/// One project's cached view of a file.
///
/// `parsed_file` may be present without `parse_info`: the file's summary is
/// known, but no full parse was kept.
pub struct OwnershipRecord<P: FileParser> {
	project: Option<ProjectRef<P>>,
	parsed_file: Option<Arc<P::File>>,
	parse_info: Option<ParseInformation<P>>,
}

impl<P: FileParser> OwnershipRecord<P> {
	/// Record with no project and no cached data.
	pub fn empty() -> Self {
		Self {
			project: None,
			parsed_file: None,
			parse_info: None,
		}
	}

	pub(crate) fn unparsed(project: ProjectRef<P>) -> Self {
		Self {
			project: Some(project),
			parsed_file: None,
			parse_info: None,
		}
	}

	/// Record built from a fresh parse; the tree is kept only for full results.
	pub(crate) fn from_parse(project: Option<ProjectRef<P>>, info: ParseInformation<P>) -> Self {
		Self {
			project,
			parsed_file: Some(Arc::clone(info.parsed_file())),
			parse_info: info.is_full().then_some(info),
		}
	}

	/// Record committed by a fan-out. The tree is kept only when `keep_info`
	/// holds and the result is full.
	pub(crate) fn committed(project: Option<ProjectRef<P>>, info: ParseInformation<P>, keep_info: bool) -> Self {
		Self {
			project,
			parsed_file: Some(Arc::clone(info.parsed_file())),
			parse_info: (keep_info && info.is_full()).then_some(info),
		}
	}

	pub(crate) fn with_parsed_file(project: Option<ProjectRef<P>>, parsed_file: Option<Arc<P::File>>) -> Self {
		Self {
			project,
			parsed_file,
			parse_info: None,
		}
	}

	pub fn project(&self) -> Option<&ProjectRef<P>> {
		self.project.as_ref()
	}

	pub fn project_id(&self) -> Option<ProjectId> {
		self.project.as_ref().map(|p| p.id())
	}

	pub fn parsed_file(&self) -> Option<&Arc<P::File>> {
		self.parsed_file.as_ref()
	}

	pub fn parse_info(&self) -> Option<&ParseInformation<P>> {
		self.parse_info.as_ref()
	}

	/// Returns true if this record answers a request of the given completeness.
	pub fn satisfies(&self, full_info: bool) -> bool {
		self.parsed_file.is_some() && (!full_info || self.parse_info.is_some())
	}

	pub(crate) fn without_parse_info(&self) -> Self {
		Self::with_parsed_file(self.project.clone(), self.parsed_file.clone())
	}

	fn is_owned_by(&self, project: ProjectId) -> bool {
		self.project_id() == Some(project)
	}
}

impl<P: FileParser> Clone for OwnershipRecord<P> {
	fn clone(&self) -> Self {
		Self {
			project: self.project.clone(),
			parsed_file: self.parsed_file.clone(),
			parse_info: self.parse_info.clone(),
		}
	}
}

impl<P: FileParser> fmt::Debug for OwnershipRecord<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OwnershipRecord")
			.field("project", &self.project_id())
			.field("parsed", &self.parsed_file.is_some())
			.field("parse_info", &self.parse_info)
			.finish()
	}
}

/// Ordered, never-empty list of ownership records.
///
/// Index 0 is the primary owner. An ownerless list holds a single placeholder
/// record with no project.
pub(crate) struct Owners<P: FileParser> {
	records: Vec<OwnershipRecord<P>>,
}

impl<P: FileParser> Owners<P> {
	pub(crate) fn new() -> Self {
		Self {
			records: vec![OwnershipRecord::empty()],
		}
	}

	pub(crate) fn records(&self) -> &[OwnershipRecord<P>] {
		&self.records
	}

	pub(crate) fn is_ownerless(&self) -> bool {
		self.records.len() == 1 && self.records[0].project.is_none()
	}

	/// Index of the record answering for `project`; `None` means the primary.
	pub(crate) fn find(&self, project: Option<ProjectId>) -> Option<usize> {
		match project {
			None => Some(0),
			Some(id) => self.records.iter().position(|r| r.is_owned_by(id)),
		}
	}

	/// Adds an owner. Returns false if the project already owns the file.
	pub(crate) fn add(&mut self, project: ProjectRef<P>, linked: bool) -> bool {
		if self.find(Some(project.id())).is_some() {
			return false;
		}
		let record = OwnershipRecord::unparsed(project);
		if self.is_ownerless() {
			self.records[0] = record;
		} else if linked {
			self.records.push(record);
		} else {
			self.records.insert(0, record);
		}
		true
	}

	/// Removes an owner.
	///
	/// Returns `None` if the project does not own the file, otherwise the
	/// removed record and whether the list became ownerless.
	pub(crate) fn remove(&mut self, project: ProjectId) -> Option<(OwnershipRecord<P>, bool)> {
		let index = self.find(Some(project))?;
		if self.records.len() == 1 {
			Some((std::mem::replace(&mut self.records[0], OwnershipRecord::empty()), true))
		} else {
			Some((self.records.remove(index), false))
		}
	}

	pub(crate) fn set(&mut self, index: usize, record: OwnershipRecord<P>) -> OwnershipRecord<P> {
		std::mem::replace(&mut self.records[index], record)
	}

	/// Swaps in a complete replacement list built by a fan-out.
	pub(crate) fn replace_all(&mut self, records: Vec<OwnershipRecord<P>>) -> Vec<OwnershipRecord<P>> {
		debug_assert_eq!(records.len(), self.records.len(), "fan-out must produce one record per owner");
		std::mem::replace(&mut self.records, records)
	}

	pub(crate) fn drop_parse_info(&mut self) {
		for record in &mut self.records {
			record.parse_info = None;
		}
	}
}
