//! Which documents of a set are going to be printed.

use tracing::debug;

use crate::document::{BatchId, DocumentId, DocumentSet};

/// Inclusion flags for one [`DocumentSet`], all `true` by default.
///
/// The state is bound to the batch it was derived from. Rebinding to another
/// set discards every flag instead of carrying them over by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    batch: BatchId,
    included: Vec<bool>,
}

impl SelectionState {
    pub fn for_set(documents: &DocumentSet) -> Self {
        Self {
            batch: documents.batch(),
            included: vec![true; documents.len()],
        }
    }

    pub fn batch(&self) -> BatchId {
        self.batch
    }

    /// Resets to all-selected when `documents` is a different batch.
    /// Returns `true` if a reset happened.
    pub fn rebind(&mut self, documents: &DocumentSet) -> bool {
        if self.batch == documents.batch() && self.included.len() == documents.len() {
            return false;
        }
        debug!(from = %self.batch, to = %documents.batch(), "selection reset for new batch");
        *self = Self::for_set(documents);
        true
    }

    /// Updates one flag. Ids outside the bound set are ignored.
    pub fn set(&mut self, id: DocumentId, included: bool) -> bool {
        match self.included.get_mut(id.index()) {
            Some(flag) => {
                *flag = included;
                true
            }
            None => false,
        }
    }

    /// Deselects the first still-selected document called `name`; repeated
    /// calls walk through same-named documents in set order. Returns `false`
    /// if no document has that name or `documents` is not the bound batch.
    pub fn deselect_by_name(&mut self, documents: &DocumentSet, name: &str) -> bool {
        if documents.batch() != self.batch {
            return false;
        }
        let mut matched = false;
        for document in documents.iter().filter(|doc| doc.name() == name) {
            matched = true;
            if self.is_included(document.id()) {
                return self.set(document.id(), false);
            }
        }
        matched
    }

    pub fn is_included(&self, id: DocumentId) -> bool {
        self.included.get(id.index()).copied().unwrap_or(false)
    }

    pub fn select_all(&mut self) {
        self.included.iter_mut().for_each(|flag| *flag = true);
    }

    pub fn selected_count(&self) -> usize {
        self.included.iter().filter(|flag| **flag).count()
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Included ids in document-set order.
    pub fn snapshot(&self, documents: &DocumentSet) -> Vec<DocumentId> {
        documents.ids().filter(|id| self.is_included(*id)).collect()
    }
}
