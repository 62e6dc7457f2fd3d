//! Workload, corpus and document source declarations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk encoding of a document source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Newline-delimited JSON documents for bulk ingestion.
    Bulk,
    /// Binary vector records in the big-ann benchmark layout.
    BigAnn,
    /// Newline-delimited JSON arrays of vector components.
    Jsonl,
}

/// One physical file/record-set within a corpus.
///
/// `number_of_documents` is declared, not measured; the generator trusts it
/// when computing client partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Documents {
    /// Source encoding of this record-set.
    pub source_format: SourceFormat,
    /// Declared document count.
    pub number_of_documents: u64,
    /// Uncompressed document file, if materialized on disk.
    #[serde(default)]
    pub document_file: Option<PathBuf>,
    /// Name of the archive the file was unpacked from, for diagnostics.
    #[serde(default)]
    pub document_archive: Option<String>,
    /// Whether the raw source already interleaves action/meta-data lines
    /// with document lines.
    #[serde(default)]
    pub includes_action_and_meta_data: bool,
    /// Target index for ingestion.
    #[serde(default)]
    pub target_index: Option<String>,
    /// Target mapping type; omitted for typeless indices.
    #[serde(default)]
    pub target_type: Option<String>,
    /// Target data stream; mutually exclusive with index/type targeting.
    #[serde(default)]
    pub target_data_stream: Option<String>,
}

impl Documents {
    /// Create a document source declaration.
    pub fn new(source_format: SourceFormat, number_of_documents: u64) -> Self {
        Self {
            source_format,
            number_of_documents,
            document_file: None,
            document_archive: None,
            includes_action_and_meta_data: false,
            target_index: None,
            target_type: None,
            target_data_stream: None,
        }
    }

    /// Set the on-disk document file.
    pub fn with_document_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_file = Some(path.into());
        self
    }

    /// Set the archive name the file came from.
    pub fn with_document_archive(mut self, archive: impl Into<String>) -> Self {
        self.document_archive = Some(archive.into());
        self
    }

    /// Mark the source as already containing action/meta-data lines.
    pub fn with_action_and_meta_data(mut self) -> Self {
        self.includes_action_and_meta_data = true;
        self
    }

    /// Set the target index.
    pub fn with_target_index(mut self, index: impl Into<String>) -> Self {
        self.target_index = Some(index.into());
        self
    }

    /// Set the target mapping type.
    pub fn with_target_type(mut self, type_name: impl Into<String>) -> Self {
        self.target_type = Some(type_name.into());
        self
    }

    /// Set the target data stream.
    pub fn with_target_data_stream(mut self, stream: impl Into<String>) -> Self {
        self.target_data_stream = Some(stream.into());
        self
    }

    /// Human-readable name of the underlying source, for error messages.
    pub fn source_name(&self) -> String {
        if let Some(archive) = &self.document_archive {
            archive.clone()
        } else if let Some(file) = &self.document_file {
            file.display().to_string()
        } else {
            "<unmaterialized>".to_string()
        }
    }
}

/// A named, ordered collection of document sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCorpus {
    /// Corpus name, unique within a workload.
    pub name: String,
    /// Document sources in declared order.
    #[serde(default)]
    pub documents: Vec<Documents>,
}

impl DocumentCorpus {
    /// Create a corpus from its document sources.
    pub fn new(name: impl Into<String>, documents: Vec<Documents>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }

    /// A copy of this corpus restricted to sources matching the given
    /// format and, if provided, one of the given target data streams.
    pub fn filter(
        &self,
        source_format: Option<SourceFormat>,
        target_data_streams: Option<&[String]>,
    ) -> DocumentCorpus {
        let documents = self
            .documents
            .iter()
            .filter(|docs| source_format.is_none_or(|format| docs.source_format == format))
            .filter(|docs| {
                target_data_streams.is_none_or(|streams| {
                    docs.target_data_stream
                        .as_ref()
                        .is_some_and(|stream| streams.contains(stream))
                })
            })
            .cloned()
            .collect();
        DocumentCorpus {
            name: self.name.clone(),
            documents,
        }
    }
}

/// A resolved benchmark workload, consumed read-only by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Workload name.
    pub name: String,
    /// Declared document corpora.
    #[serde(default)]
    pub corpora: Vec<DocumentCorpus>,
}

impl Workload {
    /// Create a workload without corpora.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            corpora: Vec::new(),
        }
    }

    /// Set the workload's corpora.
    pub fn with_corpora(mut self, corpora: Vec<DocumentCorpus>) -> Self {
        self.corpora = corpora;
        self
    }

    /// Names of all declared corpora, in declared order.
    pub fn corpus_names(&self) -> Vec<&str> {
        self.corpora.iter().map(|c| c.name.as_str()).collect()
    }
}
