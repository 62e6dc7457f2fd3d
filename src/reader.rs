//! Readers that turn raw document lines into bulk request bodies.
//!
//! A reader yields batches; each batch holds one or more ready-to-send bulk
//! bodies together with the number of documents they contain. Two variants
//! exist: one interleaves generated action/meta-data lines with document
//! lines, the other passes through files that already contain them.

use crate::conflicts::{update_body, GenerateActionMetaData};
use crate::error::ParamsError;
use crate::source::Slice;
use tracing::debug;

/// One bulk request body and the number of documents it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBatch {
    pub number_of_docs: u64,
    pub body: String,
}

/// A batch of bulk bodies, all aimed at the same index (or data stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkBatch {
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub bulks: Vec<IndexBatch>,
}

/// Produces batches of bulk bodies from an underlying file slice.
pub trait BulkReader: Send {
    /// Open the underlying source. Called once before the first batch.
    fn open(&mut self) -> Result<(), ParamsError>;

    /// The next batch of bulk bodies, or `None` when the source is
    /// exhausted.
    fn next_batch(&mut self) -> Result<Option<BulkBatch>, ParamsError>;

    /// Release the underlying source.
    fn close(&mut self);
}

/// Reader for sources of bare document lines; action/meta-data lines are
/// generated and interleaved on the fly.
pub struct MetadataIndexDataReader {
    slice: Slice,
    batch_size: u64,
    bulk_size: u64,
    action_metadata: GenerateActionMetaData,
    exhausted: bool,
}

impl MetadataIndexDataReader {
    pub fn new(
        slice: Slice,
        batch_size: u64,
        bulk_size: u64,
        action_metadata: GenerateActionMetaData,
    ) -> Self {
        Self {
            slice,
            batch_size,
            bulk_size,
            action_metadata,
            exhausted: false,
        }
    }

    fn read_bulk(&mut self) -> Result<Option<IndexBatch>, ParamsError> {
        let lines = self.slice.read_batch(self.bulk_size as usize)?;
        if lines.is_empty() {
            return Ok(None);
        }
        let mut body = String::new();
        let mut docs = 0;
        for line in &lines {
            // A finite id pool ends the stream even if lines remain.
            let Some((action, meta)) = self.action_metadata.next_pair() else {
                self.exhausted = true;
                break;
            };
            body.push_str(&meta);
            if action == "update" {
                body.push_str(&update_body(line));
            } else {
                body.push_str(line);
                body.push('\n');
            }
            docs += 1;
        }
        if docs == 0 {
            return Ok(None);
        }
        Ok(Some(IndexBatch {
            number_of_docs: docs,
            body,
        }))
    }
}

impl BulkReader for MetadataIndexDataReader {
    fn open(&mut self) -> Result<(), ParamsError> {
        self.slice.open()
    }

    fn next_batch(&mut self) -> Result<Option<BulkBatch>, ParamsError> {
        if self.exhausted {
            return Ok(None);
        }
        let mut bulks = Vec::new();
        let mut docs_in_batch = 0;
        while docs_in_batch < self.batch_size && !self.exhausted {
            let Some(bulk) = self.read_bulk()? else {
                break;
            };
            docs_in_batch += bulk.number_of_docs;
            bulks.push(bulk);
        }
        if bulks.is_empty() {
            return Ok(None);
        }
        Ok(Some(BulkBatch {
            index: Some(self.action_metadata.index_name().to_string()),
            doc_type: self.action_metadata.type_name().map(str::to_string),
            bulks,
        }))
    }

    fn close(&mut self) {
        self.slice.close();
    }
}

/// Reader for sources that already interleave action/meta-data lines with
/// document lines. Lines are passed through untouched.
pub struct SourceOnlyIndexDataReader {
    slice: Slice,
    batch_size: u64,
    bulk_size: u64,
    index_name: Option<String>,
    type_name: Option<String>,
}

impl SourceOnlyIndexDataReader {
    pub fn new(
        slice: Slice,
        batch_size: u64,
        bulk_size: u64,
        index_name: Option<String>,
        type_name: Option<String>,
    ) -> Self {
        Self {
            slice,
            batch_size,
            bulk_size,
            index_name,
            type_name,
        }
    }

    fn read_bulk(&mut self) -> Result<Option<IndexBatch>, ParamsError> {
        // Two source lines per document.
        let lines = self.slice.read_batch(self.bulk_size as usize * 2)?;
        if lines.is_empty() {
            return Ok(None);
        }
        if lines.len() % 2 != 0 {
            return Err(ParamsError::assertion(format!(
                "source [{}] contains a dangling action and meta-data line",
                self.slice.source_name()
            )));
        }
        let mut body = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            body.push_str(line);
            body.push('\n');
        }
        Ok(Some(IndexBatch {
            number_of_docs: (lines.len() / 2) as u64,
            body,
        }))
    }
}

impl BulkReader for SourceOnlyIndexDataReader {
    fn open(&mut self) -> Result<(), ParamsError> {
        self.slice.open()
    }

    fn next_batch(&mut self) -> Result<Option<BulkBatch>, ParamsError> {
        let mut bulks = Vec::new();
        let mut docs_in_batch = 0;
        while docs_in_batch < self.batch_size {
            let Some(bulk) = self.read_bulk()? else {
                break;
            };
            docs_in_batch += bulk.number_of_docs;
            bulks.push(bulk);
        }
        if bulks.is_empty() {
            return Ok(None);
        }
        Ok(Some(BulkBatch {
            index: self.index_name.clone(),
            doc_type: self.type_name.clone(),
            bulks,
        }))
    }

    fn close(&mut self) {
        self.slice.close();
    }
}

/// Consumes a sequence of readers back to back, opening each one lazily and
/// closing it as soon as it is drained.
pub struct ReaderChain {
    readers: Vec<Box<dyn BulkReader>>,
    current: usize,
    opened: bool,
}

impl ReaderChain {
    pub fn new(readers: Vec<Box<dyn BulkReader>>) -> Self {
        Self {
            readers,
            current: 0,
            opened: false,
        }
    }

    /// The next batch from the chain, or `None` when every reader is
    /// drained.
    pub fn next_batch(&mut self) -> Result<Option<BulkBatch>, ParamsError> {
        while self.current < self.readers.len() {
            let reader = &mut self.readers[self.current];
            if !self.opened {
                reader.open()?;
                self.opened = true;
            }
            if let Some(batch) = reader.next_batch()? {
                return Ok(Some(batch));
            }
            reader.close();
            debug!(reader = self.current, "reader drained, advancing chain");
            self.opened = false;
            self.current += 1;
        }
        Ok(None)
    }
}

impl Drop for ReaderChain {
    fn drop(&mut self) {
        // Release the file handle of a reader abandoned mid-stream.
        if self.opened && self.current < self.readers.len() {
            self.readers[self.current].close();
        }
    }
}
