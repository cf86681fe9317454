use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DocumentError;

/// Identity of one loaded document set. Selections are bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

impl BatchId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Position of a document within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(usize);

impl DocumentId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// A candidate document. Content is never modified after the set is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    name: String,
    content: Arc<[u8]>,
}

impl Document {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Ordered, immutable collection of candidate documents.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    batch: BatchId,
    documents: Vec<Arc<Document>>,
}

impl DocumentSet {
    pub fn new<I, N, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<Vec<u8>>,
    {
        let documents = entries
            .into_iter()
            .enumerate()
            .map(|(index, (name, content))| {
                let content: Vec<u8> = content.into();
                Arc::new(Document {
                    id: DocumentId(index),
                    name: name.into(),
                    content: Arc::from(content),
                })
            })
            .collect();
        Self {
            batch: BatchId::next(),
            documents,
        }
    }

    /// Reads every path into memory, keeping argument order. Only files whose
    /// extension matches `suffix` (case-insensitive, e.g. `.pdf`) are accepted.
    pub fn load<P: AsRef<Path>>(paths: &[P], suffix: &str) -> Result<Self, DocumentError> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            if !has_suffix(path, suffix) {
                return Err(DocumentError::UnsupportedType {
                    path: path.to_path_buf(),
                    expected: suffix.to_string(),
                });
            }
            let content = fs::read(path).map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            entries.push((name, content));
        }
        Ok(Self::new(entries))
    }

    pub fn batch(&self) -> BatchId {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: DocumentId) -> Option<&Arc<Document>> {
        self.documents.get(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.documents.iter().map(|doc| doc.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.iter()
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    let wanted = suffix.trim_start_matches('.');
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let set = DocumentSet::new([("a.pdf", b"A".to_vec()), ("b.pdf", b"BB".to_vec())]);
        let ids: Vec<_> = set.ids().map(DocumentId::index).collect();
        assert_eq!(ids, vec![0, 1]);
        let second = set.get(DocumentId(1)).expect("second document");
        assert_eq!(second.name(), "b.pdf");
        assert_eq!(second.content(), b"BB");
    }

    #[test]
    fn every_set_gets_a_fresh_batch_id() {
        let first = DocumentSet::new([("a.pdf", Vec::<u8>::new())]);
        let second = DocumentSet::new([("a.pdf", Vec::<u8>::new())]);
        assert_ne!(first.batch(), second.batch());
        assert_eq!(first.clone().batch(), first.batch());
    }

    #[test]
    fn suffix_match_ignores_case() {
        assert!(has_suffix(Path::new("scan.PDF"), ".pdf"));
        assert!(has_suffix(Path::new("scan.pdf"), "pdf"));
        assert!(!has_suffix(Path::new("scan.pdf.txt"), ".pdf"));
        assert!(!has_suffix(Path::new("README"), ".pdf"));
    }

    #[test]
    fn load_rejects_other_types_and_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let note = dir.path().join("note.txt");
        fs::write(&note, "hello").expect("write note");
        let err = DocumentSet::load(&[&note], ".pdf").unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedType { .. }));

        let missing = dir.path().join("missing.pdf");
        let err = DocumentSet::load(&[&missing], ".pdf").unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
    }

    #[test]
    fn load_keeps_argument_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let second = dir.path().join("b.pdf");
        let first = dir.path().join("a.pdf");
        fs::write(&second, "%PDF-b").expect("write b");
        fs::write(&first, "%PDF-a").expect("write a");

        let set = DocumentSet::load(&[&second, &first], ".pdf").expect("load");
        let names: Vec<_> = set.iter().map(|doc| doc.name().to_string()).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
        assert_eq!(set.iter().next().expect("first").content(), b"%PDF-b");
    }
}
