//! Partitioning of document corpora across clients.
//!
//! Each client is assigned a contiguous slice of every corpus file. Slices
//! are computed from fractional per-client document counts with ties rounded
//! to even, so the assignments add up to the corpus total without any client
//! drifting by more than one document.

use workload_model::{DocumentCorpus, SourceFormat};

/// The slice of a document file assigned to one client (or one worker
/// responsible for a contiguous range of clients).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Line offset at which the client starts reading.
    pub offset: u64,
    /// Number of documents in the slice.
    pub number_of_docs: u64,
    /// Number of lines in the slice. Twice the document count when the file
    /// carries action-and-meta-data lines.
    pub number_of_lines: u64,
}

/// Compute the file slice for the clients `start_client..=end_client` out of
/// `total_clients` readers sharing `total_docs` documents.
pub fn bounds(
    total_docs: u64,
    start_client: u64,
    end_client: u64,
    total_clients: u64,
    includes_action_and_meta_data: bool,
) -> Bounds {
    let source_lines_per_doc = if includes_action_and_meta_data { 2 } else { 1 };
    let docs_per_client = total_docs as f64 / total_clients as f64;
    let start_offset_docs = (docs_per_client * start_client as f64).round_ties_even() as u64;
    let end_offset_docs = (docs_per_client * (end_client + 1) as f64).round_ties_even() as u64;
    let number_of_docs = end_offset_docs - start_offset_docs;
    Bounds {
        offset: start_offset_docs * source_lines_per_doc,
        number_of_docs,
        number_of_lines: number_of_docs * source_lines_per_doc,
    }
}

/// Number of bulk requests the given clients will issue across all bulk
/// corpora.
pub fn number_of_bulks(
    corpora: &[DocumentCorpus],
    start_client: u64,
    end_client: u64,
    total_clients: u64,
    bulk_size: u64,
) -> u64 {
    let mut bulks = 0;
    for corpus in corpora {
        for docs in corpus
            .documents
            .iter()
            .filter(|d| d.source_format == SourceFormat::Bulk)
        {
            let b = bounds(
                docs.number_of_documents,
                start_client,
                end_client,
                total_clients,
                docs.includes_action_and_meta_data,
            );
            let complete = b.number_of_docs / bulk_size;
            let rest = b.number_of_docs % bulk_size;
            bulks += complete + u64::from(rest > 0);
        }
    }
    bulks
}
