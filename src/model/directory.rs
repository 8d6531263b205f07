use std::collections::HashSet;

use super::repository::RepositoryRecord;

/// Client-side snapshot of every repository the host knows about.
///
/// The list is only ever replaced as a whole by a host reload; there is no
/// API for editing single records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Directory {
    /// No load has succeeded yet.
    #[default]
    Unloaded,
    Loaded(Vec<RepositoryRecord>),
}

impl Directory {
    /// `None` while unloaded, so "still loading" and "empty" stay distinct.
    pub fn records(&self) -> Option<&[RepositoryRecord]> {
        match self {
            Directory::Unloaded => None,
            Directory::Loaded(records) => Some(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records().map_or(0, <[RepositoryRecord]>::len)
    }

    pub fn get(&self, index: usize) -> Option<&RepositoryRecord> {
        self.records().and_then(|records| records.get(index))
    }

    #[cfg(test)]
    pub fn find(&self, path: &str) -> Option<&RepositoryRecord> {
        self.records()?.iter().find(|record| record.path == path)
    }

    pub fn replace(&mut self, records: Vec<RepositoryRecord>) {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.path.as_str()) {
                tracing::warn!("host snapshot lists {} more than once", record.path);
            }
        }

        *self = Directory::Loaded(records);
    }
}
