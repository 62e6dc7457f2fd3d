//! Data sets stored as newline-delimited JSON arrays.
//!
//! Each line is a JSON array of record components. The record count and
//! dimension are established by a single scan at open time.

use crate::error::DataSetError;
use crate::DataSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reader over a JSONL record file.
#[derive(Debug)]
pub struct JsonlDataSet<T> {
    path: PathBuf,
    reader: BufReader<File>,
    num_records: u64,
    dimension: usize,
    cursor: u64,
    _element: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlDataSet<T> {
    /// Open a JSONL file, scanning it once for record count and dimension.
    pub fn open(path: &Path) -> Result<Self, DataSetError> {
        if !path.exists() {
            return Err(DataSetError::NotFound(path.to_path_buf()));
        }
        let mut num_records = 0u64;
        let mut dimension = 0usize;
        for line in BufReader::new(File::open(path)?).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if num_records == 0 {
                let first: Vec<serde_json::Value> = serde_json::from_str(&line)?;
                dimension = first.len();
            }
            num_records += 1;
        }
        debug!(
            path = %path.display(),
            num_records,
            dimension,
            "opened jsonl data set"
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(File::open(path)?),
            num_records,
            dimension,
            cursor: 0,
            _element: PhantomData,
        })
    }

    fn next_line(&mut self) -> Result<Option<String>, DataSetError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

impl<T: DeserializeOwned> DataSet<T> for JsonlDataSet<T> {
    fn num_records(&self) -> u64 {
        self.num_records
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn seek(&mut self, offset: u64) -> Result<(), DataSetError> {
        // Line-oriented storage has no fixed record width; rewind and skip.
        self.reader = BufReader::new(File::open(&self.path)?);
        self.cursor = 0;
        while self.cursor < offset {
            if self.next_line()?.is_none() {
                break;
            }
            self.cursor += 1;
        }
        Ok(())
    }

    fn read(&mut self, max_records: usize) -> Result<Vec<Vec<T>>, DataSetError> {
        let mut records = Vec::new();
        while records.len() < max_records {
            let Some(line) = self.next_line()? else {
                break;
            };
            records.push(serde_json::from_str(&line)?);
            self.cursor += 1;
        }
        Ok(records)
    }
}

/// Write records to a JSONL file, one JSON array per line.
pub fn write_data_set<T: Serialize>(path: &Path, records: &[Vec<T>]) -> Result<(), DataSetError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
