//! Assembly of per-bulk request parameters from document corpora.
//!
//! `bulk_data_based` wires the partitioning, conflict generation and reader
//! layers together into a stream of ready-to-send parameter maps, one per
//! bulk request:
//!
//! ```text
//!  corpora ──> bounds ──> Slice ──> reader ──> ReaderChain ──> Params
//!                          │          ▲
//!                          │          │ action/meta-data lines
//!                          └── GenerateActionMetaData
//! ```

use crate::conflicts::{
    build_conflicting_ids, GenerateActionMetaData, IndexIdConflict, OnConflict,
};
use crate::error::ParamsError;
use crate::partition::bounds;
use crate::reader::{
    BulkBatch, BulkReader, IndexBatch, MetadataIndexDataReader, ReaderChain,
    SourceOnlyIndexDataReader,
};
use crate::source::{file_source, Slice};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use workload_model::{DocumentCorpus, Documents, SourceFormat};

/// Operation parameters, as a JSON object.
pub type Params = serde_json::Map<String, Value>;

/// Settings shared by every reader of one bulk-ingestion partition.
#[derive(Clone)]
pub struct BulkIngestConfig {
    pub batch_size: u64,
    pub bulk_size: u64,
    pub id_conflicts: Option<IndexIdConflict>,
    /// Conflict probability in percent.
    pub conflict_probability: f64,
    pub on_conflict: OnConflict,
    pub recency: f64,
    pub pipeline: Option<String>,
    /// User-supplied parameters passed through to every bulk.
    pub original_params: Params,
}

impl Default for BulkIngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            bulk_size: 1,
            id_conflicts: None,
            conflict_probability: 25.0,
            on_conflict: OnConflict::Index,
            recency: 0.0,
            pipeline: None,
            original_params: Params::new(),
        }
    }
}

/// Builds one reader for the slice of a document source assigned to a
/// client. Injectable so tests can substitute static readers.
pub type ReaderFactory = Arc<
    dyn Fn(&Documents, u64, u64, u64, &BulkIngestConfig) -> Result<Box<dyn BulkReader>, ParamsError>
        + Send
        + Sync,
>;

/// The default factory: reads the document file from disk, generating
/// action/meta-data lines unless the source already contains them.
pub fn default_reader_factory() -> ReaderFactory {
    Arc::new(|docs, offset, num_lines, num_docs, config| {
        let Some(file) = &docs.document_file else {
            return Err(ParamsError::assertion(format!(
                "Document source [{}] is not materialized on disk",
                docs.source_name()
            )));
        };
        let slice = Slice::new(file_source(file), offset, num_lines);
        if docs.includes_action_and_meta_data {
            let index_name = docs
                .target_data_stream
                .clone()
                .or_else(|| docs.target_index.clone());
            Ok(Box::new(SourceOnlyIndexDataReader::new(
                slice,
                config.batch_size,
                config.bulk_size,
                index_name,
                docs.target_type.clone(),
            )) as Box<dyn BulkReader>)
        } else {
            let am_handler = action_meta_data_for(docs, offset, num_docs, config)?;
            Ok(Box::new(MetadataIndexDataReader::new(
                slice,
                config.batch_size,
                config.bulk_size,
                am_handler,
            )) as Box<dyn BulkReader>)
        }
    })
}

fn action_meta_data_for(
    docs: &Documents,
    offset: u64,
    num_docs: u64,
    config: &BulkIngestConfig,
) -> Result<GenerateActionMetaData, ParamsError> {
    // Data streams only accept the create action and carry no type.
    if let Some(stream) = &docs.target_data_stream {
        if docs.target_type.is_some() {
            return Err(ParamsError::invalid(format!(
                "Target data stream [{stream}] cannot be used together with a target type"
            )));
        }
        return GenerateActionMetaData::new(stream, None).with_create_action();
    }
    let index_name = docs.target_index.as_deref().unwrap_or_default();
    let mut handler = GenerateActionMetaData::new(index_name, docs.target_type.as_deref())
        .with_on_conflict(config.on_conflict)
        .with_conflict_probability(config.conflict_probability)
        .with_recency(config.recency);
    if let Some(ids) = build_conflicting_ids(config.id_conflicts, num_docs, offset) {
        handler = handler.with_conflicting_ids(ids)?;
    }
    Ok(handler)
}

/// Build the bulk parameter stream for the clients
/// `start_client_index..=end_client_index` out of `num_clients`.
pub fn bulk_data_based(
    num_clients: u64,
    start_client_index: u64,
    end_client_index: u64,
    corpora: &[DocumentCorpus],
    config: BulkIngestConfig,
    create_reader: ReaderFactory,
) -> Result<BulkParamStream, ParamsError> {
    let mut readers: Vec<Box<dyn BulkReader>> = Vec::new();
    for corpus in corpora {
        for docs in corpus
            .documents
            .iter()
            .filter(|d| d.source_format == SourceFormat::Bulk)
        {
            let b = bounds(
                docs.number_of_documents,
                start_client_index,
                end_client_index,
                num_clients,
                docs.includes_action_and_meta_data,
            );
            debug!(
                corpus = %corpus.name,
                source = %docs.source_name(),
                offset = b.offset,
                number_of_docs = b.number_of_docs,
                "assigning file slice to clients [{start_client_index}-{end_client_index}]"
            );
            readers.push(create_reader(
                docs,
                b.offset,
                b.number_of_lines,
                b.number_of_docs,
                &config,
            )?);
        }
    }
    Ok(BulkParamStream {
        chain: ReaderChain::new(readers),
        queued: VecDeque::new(),
        pipeline: config.pipeline,
        original_params: config.original_params,
    })
}

/// Stream of per-bulk parameter maps.
pub struct BulkParamStream {
    chain: ReaderChain,
    queued: VecDeque<(Option<String>, Option<String>, IndexBatch)>,
    pipeline: Option<String>,
    original_params: Params,
}

impl BulkParamStream {
    /// The parameters of the next bulk request, or `None` once all corpora
    /// are exhausted.
    pub fn next_params(&mut self) -> Result<Option<Params>, ParamsError> {
        if self.queued.is_empty() {
            let Some(BulkBatch {
                index,
                doc_type,
                bulks,
            }) = self.chain.next_batch()?
            else {
                return Ok(None);
            };
            for bulk in bulks {
                self.queued.push_back((index.clone(), doc_type.clone(), bulk));
            }
        }
        let Some((index, doc_type, bulk)) = self.queued.pop_front() else {
            return Ok(None);
        };

        // Pipeline-owned keys take precedence over user-supplied ones.
        let mut params = self.original_params.clone();
        params.insert("action-metadata-present".to_string(), Value::Bool(true));
        params.insert("body".to_string(), Value::String(bulk.body));
        params.insert("bulk-size".to_string(), Value::from(bulk.number_of_docs));
        params.insert("unit".to_string(), Value::String("docs".to_string()));
        params.insert(
            "index".to_string(),
            index.map(Value::String).unwrap_or(Value::Null),
        );
        params.insert(
            "type".to_string(),
            doc_type.map(Value::String).unwrap_or(Value::Null),
        );
        if let Some(pipeline) = &self.pipeline {
            params.insert("pipeline".to_string(), Value::String(pipeline.clone()));
        }
        Ok(Some(params))
    }
}
