//! In-process session table, lost on restart.

use super::{FeedbackError, FeedbackRecord, FeedbackStore};

/// Session-scoped feedback table backed by a plain vector.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<FeedbackRecord>,
}

impl MemoryStore {
    /// Create an empty session table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collected records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no records have been collected yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FeedbackStore for MemoryStore {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        record.validate()?;
        self.rows.push(record.clone());
        Ok(())
    }

    fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::sample_record;
    use super::*;

    #[test]
    fn appends_in_insertion_order() {
        let mut store = MemoryStore::new();
        store.append(&sample_record("Ada")).unwrap();
        store.append(&sample_record("Grace")).unwrap();
        let names: Vec<String> = store
            .records()
            .unwrap()
            .into_iter()
            .map(|record| record.name)
            .collect();
        assert_eq!(names, vec!["Ada".to_string(), "Grace".to_string()]);
    }

    #[test]
    fn rejects_invalid_record() {
        let mut store = MemoryStore::new();
        let mut record = sample_record("Ada");
        record.name.clear();
        assert!(store.append(&record).is_err());
        assert!(store.is_empty());
    }
}
