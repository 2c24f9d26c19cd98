//! The submission set: the user's ordered, de-duplicated document selection.
//!
//! Duplicates are detected by `(name, size)`. This is a heuristic, not a
//! content hash: two different files that share name and size collapse into
//! one, and the same file under two names is kept twice.

use crate::document::DocumentFile;
use tracing::debug;

/// Ordered collection of documents pending extraction.
#[derive(Debug, Clone, Default)]
pub struct SubmissionSet {
    files: Vec<DocumentFile>,
}

impl SubmissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. Returns `false` when an entry with the same
    /// `(name, size)` is already present; the new one is dropped.
    pub fn add(&mut self, file: DocumentFile) -> bool {
        if self.contains(&file.name, file.size) {
            debug!("Skipping duplicate document '{}' ({} bytes)", file.name, file.size);
            return false;
        }
        self.files.push(file);
        true
    }

    /// Add several documents in order; returns how many were accepted.
    pub fn extend<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = DocumentFile>,
    {
        let mut added = 0;
        for file in files {
            if self.add(file) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, name: &str, size: u64) -> bool {
        self.files.iter().any(|f| f.key() == (name, size))
    }

    /// Remove the document at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<DocumentFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn remove_by_key(&mut self, name: &str, size: u64) -> Option<DocumentFile> {
        let idx = self.files.iter().position(|f| f.key() == (name, size))?;
        Some(self.files.remove(idx))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentFile> {
        self.files.iter()
    }

    /// Immutable copy of the current selection, taken at the start of a run.
    pub fn snapshot(&self) -> Vec<DocumentFile> {
        self.files.clone()
    }

    /// Combined size of the selected documents.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

impl FromIterator<DocumentFile> for SubmissionSet {
    fn from_iter<I: IntoIterator<Item = DocumentFile>>(iter: I) -> Self {
        let mut set = SubmissionSet::new();
        set.extend(iter);
        set
    }
}
