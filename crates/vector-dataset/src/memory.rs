//! In-memory data set, used by tests and synthetic workloads.

use crate::error::DataSetError;
use crate::DataSet;

/// Data set backed by a plain vector of records.
pub struct InMemoryDataSet<T> {
    records: Vec<Vec<T>>,
    dimension: usize,
    cursor: u64,
}

impl<T> InMemoryDataSet<T> {
    pub fn new(records: Vec<Vec<T>>) -> Self {
        let dimension = records.first().map(Vec::len).unwrap_or(0);
        Self {
            records,
            dimension,
            cursor: 0,
        }
    }
}

impl<T: Clone> DataSet<T> for InMemoryDataSet<T> {
    fn num_records(&self) -> u64 {
        self.records.len() as u64
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn seek(&mut self, offset: u64) -> Result<(), DataSetError> {
        self.cursor = offset.min(self.records.len() as u64);
        Ok(())
    }

    fn read(&mut self, max_records: usize) -> Result<Vec<Vec<T>>, DataSetError> {
        let start = self.cursor as usize;
        let end = (start + max_records).min(self.records.len());
        self.cursor = end as u64;
        Ok(self.records[start..end].to_vec())
    }
}
