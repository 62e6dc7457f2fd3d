//! The bulk-ingestion parameter source.
//!
//! Validates the operation parameters against the workload up front, then
//! hands out one partition per client. Each partition lazily assembles its
//! reader pipeline on first use and emits per-bulk parameter maps until its
//! share of the corpus, scaled by `ingest-percentage`, is delivered.

use crate::conflicts::{IndexIdConflict, OnConflict};
use crate::error::ParamsError;
use crate::partition::number_of_bulks;
use crate::pipeline::{
    bulk_data_based, default_reader_factory, BulkIngestConfig, BulkParamStream, Params,
    ReaderFactory,
};
use crate::registry::{ParamSource, ParamSourcePartition};
use serde_json::Value;
use tracing::debug;
use workload_model::{DocumentCorpus, SourceFormat, Workload};

fn get_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn quoted_list(names: &[String]) -> String {
    let inner = names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{inner}]")
}

fn mandatory_positive_int(params: &Params, key: &str) -> Result<u64, ParamsError> {
    let Some(value) = params.get(key) else {
        return Err(ParamsError::invalid(format!(
            "Mandatory parameter '{key}' is missing"
        )));
    };
    positive_int(value, key)
}

fn positive_int(value: &Value, key: &str) -> Result<u64, ParamsError> {
    let Some(number) = value.as_i64() else {
        return Err(ParamsError::invalid(format!("'{key}' must be numeric")));
    };
    if number <= 0 {
        return Err(ParamsError::invalid(format!(
            "'{key}' must be positive but was {number}"
        )));
    }
    Ok(number as u64)
}

fn optional_float(params: &Params, key: &str, default: f64) -> Result<f64, ParamsError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| ParamsError::invalid(format!("'{key}' must be numeric"))),
    }
}

fn string_list(params: &Params, key: &str) -> Result<Option<Vec<String>>, ParamsError> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(values)) => {
            let mut names = Vec::with_capacity(values.len());
            for value in values {
                let Some(name) = value.as_str() else {
                    return Err(ParamsError::invalid(format!(
                        "'{key}' must be a list of strings"
                    )));
                };
                names.push(name.to_string());
            }
            Ok(Some(names))
        }
        Some(_) => Err(ParamsError::invalid(format!(
            "'{key}' must be a list of strings"
        ))),
    }
}

/// Parameter source for bulk-ingestion operations.
pub struct BulkIndexParamSource {
    corpora: Vec<DocumentCorpus>,
    bulk_size: u64,
    batch_size: u64,
    ingest_percentage: f64,
    id_conflicts: Option<IndexIdConflict>,
    conflict_probability: f64,
    on_conflict: OnConflict,
    recency: f64,
    pipeline: Option<String>,
    original_params: Params,
    create_reader: ReaderFactory,
}

impl BulkIndexParamSource {
    /// Validate the operation parameters against the workload.
    pub fn new(workload: &Workload, params: &Params) -> Result<Self, ParamsError> {
        Self::with_reader_factory(workload, params, default_reader_factory())
    }

    /// Like [`BulkIndexParamSource::new`], but with an injectable reader
    /// factory.
    pub fn with_reader_factory(
        workload: &Workload,
        params: &Params,
        create_reader: ReaderFactory,
    ) -> Result<Self, ParamsError> {
        let id_conflicts = IndexIdConflict::parse(get_str(params, "conflicts"))?;

        let (conflict_probability, on_conflict, recency) = if id_conflicts.is_some() {
            let probability = optional_float(params, "conflict-probability", 25.0)?;
            if !(0.0..=100.0).contains(&probability) {
                return Err(ParamsError::invalid(format!(
                    "'conflict-probability' must be in the range [0.0, 100.0] but was {probability:?}"
                )));
            }
            let on_conflict = OnConflict::parse(get_str(params, "on-conflict"))?;
            let recency = optional_float(params, "recency", 0.0)?;
            (probability, on_conflict, recency)
        } else {
            (25.0, OnConflict::Index, 0.0)
        };

        let data_streams = string_list(params, "data-streams")?;
        if id_conflicts.is_some() && data_streams.is_some() {
            return Err(ParamsError::invalid(
                "'conflicts' cannot be used with 'data-streams'",
            ));
        }

        let corpora = used_corpora(workload, params, data_streams.as_deref())?;

        if let Some(conflict) = id_conflicts {
            for corpus in &corpora {
                for docs in &corpus.documents {
                    if docs.includes_action_and_meta_data {
                        return Err(ParamsError::invalid(format!(
                            "Cannot generate id conflicts [{}] as [{}] in document corpus [{}] \
                             already contains an action and meta-data line.",
                            conflict_name(conflict),
                            docs.source_name(),
                            corpus.name
                        )));
                    }
                }
            }
        }

        let bulk_size = mandatory_positive_int(params, "bulk-size")?;
        let batch_size = match params.get("batch-size") {
            None => bulk_size,
            Some(value) => positive_int(value, "batch-size")?,
        };
        if batch_size < bulk_size {
            return Err(ParamsError::invalid(
                "'batch-size' must be greater than or equal to 'bulk-size'",
            ));
        }
        if batch_size % bulk_size != 0 {
            return Err(ParamsError::invalid(
                "'batch-size' must be a multiple of 'bulk-size'",
            ));
        }

        let ingest_percentage = optional_float(params, "ingest-percentage", 100.0)?;
        if !(ingest_percentage > 0.0 && ingest_percentage <= 100.0) {
            return Err(ParamsError::invalid(format!(
                "'ingest-percentage' must be in the range (0.0, 100.0] but was {ingest_percentage:?}"
            )));
        }

        Ok(Self {
            corpora,
            bulk_size,
            batch_size,
            ingest_percentage,
            id_conflicts,
            conflict_probability,
            on_conflict,
            recency,
            pipeline: get_str(params, "pipeline").map(str::to_string),
            original_params: params.clone(),
            create_reader,
        })
    }

    /// The corpora this source will ingest, after filtering.
    pub fn corpora(&self) -> &[DocumentCorpus] {
        &self.corpora
    }

    /// The partition for one client.
    pub fn partition(&self, client_index: u64, num_clients: u64) -> BulkIndexParamSourcePartition {
        self.partition_range(client_index, client_index, num_clients)
    }

    /// The partition for a worker driving the contiguous client range
    /// `start_client..=end_client`.
    pub fn partition_range(
        &self,
        start_client: u64,
        end_client: u64,
        num_clients: u64,
    ) -> BulkIndexParamSourcePartition {
        BulkIndexParamSourcePartition {
            corpora: self.corpora.clone(),
            config: BulkIngestConfig {
                batch_size: self.batch_size,
                bulk_size: self.bulk_size,
                id_conflicts: self.id_conflicts,
                conflict_probability: self.conflict_probability,
                on_conflict: self.on_conflict,
                recency: self.recency,
                pipeline: self.pipeline.clone(),
                original_params: self.original_params.clone(),
            },
            ingest_percentage: self.ingest_percentage,
            start_client,
            end_client,
            num_clients,
            create_reader: self.create_reader.clone(),
            state: None,
            emitted: 0,
        }
    }
}

impl ParamSource for BulkIndexParamSource {
    fn partition(
        &self,
        partition_index: u64,
        total_partitions: u64,
    ) -> Result<Box<dyn ParamSourcePartition>, ParamsError> {
        Ok(Box::new(BulkIndexParamSource::partition(
            self,
            partition_index,
            total_partitions,
        )))
    }
}

fn conflict_name(conflict: IndexIdConflict) -> &'static str {
    match conflict {
        IndexIdConflict::Sequential => "sequential",
        IndexIdConflict::Random => "random",
    }
}

fn used_corpora(
    workload: &Workload,
    params: &Params,
    data_streams: Option<&[String]>,
) -> Result<Vec<DocumentCorpus>, ParamsError> {
    if workload.corpora.is_empty() {
        return Err(ParamsError::invalid(format!(
            "There is no document corpus definition for workload {}. \
             You must add at least one before making bulk requests to OpenSearch.",
            workload.name
        )));
    }
    let requested = string_list(params, "corpora")?;

    let mut corpora = Vec::new();
    for corpus in &workload.corpora {
        if let Some(requested) = &requested {
            if !requested.iter().any(|name| name == &corpus.name) {
                continue;
            }
        }
        let filtered = corpus.filter(Some(SourceFormat::Bulk), data_streams);
        if !filtered.documents.is_empty() {
            corpora.push(filtered);
        }
    }

    // An empty match means every bulk would be a silent no-op.
    if corpora.is_empty() {
        let known: Vec<String> = workload
            .corpus_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        if let Some(requested) = requested {
            return Err(ParamsError::assertion(format!(
                "The provided corpus {} does not match any of the corpora {}.",
                quoted_list(&requested),
                quoted_list(&known)
            )));
        }
        if let Some(streams) = data_streams {
            return Err(ParamsError::assertion(format!(
                "The provided data stream {} does not match any of the corpora {}.",
                quoted_list(streams),
                quoted_list(&known)
            )));
        }
        return Err(ParamsError::assertion(format!(
            "There are no bulk documents in any of the corpora {}.",
            quoted_list(&known)
        )));
    }
    Ok(corpora)
}

struct PartitionState {
    total_bulks: u64,
    stream: BulkParamStream,
}

/// One client's share of the bulk-ingestion workload.
pub struct BulkIndexParamSourcePartition {
    corpora: Vec<DocumentCorpus>,
    config: BulkIngestConfig,
    ingest_percentage: f64,
    start_client: u64,
    end_client: u64,
    num_clients: u64,
    create_reader: ReaderFactory,
    state: Option<PartitionState>,
    emitted: u64,
}

impl BulkIndexParamSourcePartition {
    fn init(&mut self) -> Result<(), ParamsError> {
        if self.state.is_some() {
            return Ok(());
        }
        let all_bulks = number_of_bulks(
            &self.corpora,
            self.start_client,
            self.end_client,
            self.num_clients,
            self.config.bulk_size,
        );
        let total_bulks = (all_bulks as f64 * self.ingest_percentage / 100.0).ceil() as u64;
        debug!(
            start_client = self.start_client,
            end_client = self.end_client,
            all_bulks,
            total_bulks,
            "initialized bulk partition"
        );
        let stream = bulk_data_based(
            self.num_clients,
            self.start_client,
            self.end_client,
            &self.corpora,
            self.config.clone(),
            self.create_reader.clone(),
        )?;
        self.state = Some(PartitionState {
            total_bulks,
            stream,
        });
        Ok(())
    }

    /// The corpora backing this partition.
    pub fn corpora(&self) -> &[DocumentCorpus] {
        &self.corpora
    }

    /// Total number of bulk requests this partition will emit.
    pub fn total_bulks(&mut self) -> Result<u64, ParamsError> {
        self.init()?;
        Ok(self.state.as_ref().map(|s| s.total_bulks).unwrap_or(0))
    }

    /// Fraction of this partition's bulks emitted so far.
    pub fn percent_completed(&self) -> f64 {
        match &self.state {
            Some(state) if state.total_bulks > 0 => self.emitted as f64 / state.total_bulks as f64,
            _ => 0.0,
        }
    }

    /// The parameters of the next bulk request, or `None` once this
    /// partition's share is delivered.
    pub fn next_params(&mut self) -> Result<Option<Params>, ParamsError> {
        self.init()?;
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        if self.emitted >= state.total_bulks {
            return Ok(None);
        }
        match state.stream.next_params()? {
            Some(params) => {
                self.emitted += 1;
                Ok(Some(params))
            }
            None => Ok(None),
        }
    }
}

impl ParamSourcePartition for BulkIndexParamSourcePartition {
    fn size(&mut self) -> Result<Option<u64>, ParamsError> {
        Ok(Some(self.total_bulks()?))
    }

    fn params(&mut self) -> Result<Option<Params>, ParamsError> {
        self.next_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests_support::static_reader_factory;
    use serde_json::json;
    use workload_model::Documents;

    fn bulk_corpus(name: &str, docs: u64, index: &str, doc_type: &str) -> DocumentCorpus {
        DocumentCorpus::new(
            name,
            vec![Documents::new(SourceFormat::Bulk, docs)
                .with_target_index(index)
                .with_target_type(doc_type)],
        )
    }

    fn test_workload(corpora: Vec<DocumentCorpus>) -> Workload {
        Workload::new("unit-test").with_corpora(corpora)
    }

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn expect_error(workload: &Workload, p: Params) -> String {
        BulkIndexParamSource::new(workload, &p)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error".to_string())
    }

    #[test]
    fn test_create_without_params() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(&workload, Params::new()),
            "Mandatory parameter 'bulk-size' is missing"
        );
    }

    #[test]
    fn test_create_without_corpora_definition() {
        let workload = test_workload(vec![]);
        assert_eq!(
            expect_error(&workload, Params::new()),
            "There is no document corpus definition for workload unit-test. \
             You must add at least one before making bulk requests to OpenSearch."
        );
    }

    #[test]
    fn test_create_with_non_numeric_bulk_size() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(&workload, params(&[("bulk-size", json!("Three"))])),
            "'bulk-size' must be numeric"
        );
    }

    #[test]
    fn test_create_with_negative_bulk_size() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(&workload, params(&[("bulk-size", json!(-5))])),
            "'bulk-size' must be positive but was -5"
        );
    }

    #[test]
    fn test_create_with_smaller_batch_size() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[("bulk-size", json!(5)), ("batch-size", json!(3))])
            ),
            "'batch-size' must be greater than or equal to 'bulk-size'"
        );
    }

    #[test]
    fn test_create_with_non_multiple_batch_size() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[("bulk-size", json!(5)), ("batch-size", json!(8))])
            ),
            "'batch-size' must be a multiple of 'bulk-size'"
        );
    }

    #[test]
    fn test_create_with_metadata_in_source_file_but_conflicts() {
        let corpus = DocumentCorpus::new(
            "default",
            vec![Documents::new(SourceFormat::Bulk, 10)
                .with_document_file("docs.json")
                .with_document_archive("docs.json.bz2")
                .with_action_and_meta_data()],
        );
        let workload = test_workload(vec![corpus]);
        assert_eq!(
            expect_error(&workload, params(&[("conflicts", json!("random"))])),
            "Cannot generate id conflicts [random] as [docs.json.bz2] in document corpus \
             [default] already contains an action and meta-data line."
        );
    }

    #[test]
    fn test_create_with_unknown_id_conflicts() {
        let workload = test_workload(vec![]);
        assert_eq!(
            expect_error(&workload, params(&[("conflicts", json!("crazy"))])),
            "Unknown 'conflicts' setting [crazy]"
        );
    }

    #[test]
    fn test_create_with_unknown_on_conflict_setting() {
        let workload = test_workload(vec![]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("conflicts", json!("sequential")),
                    ("on-conflict", json!("delete"))
                ])
            ),
            "Unknown 'on-conflict' setting [delete]"
        );
    }

    #[test]
    fn test_create_with_conflicts_and_data_streams() {
        let workload = test_workload(vec![]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    (
                        "data-streams",
                        json!(["test-data-stream-1", "test-data-stream-2"])
                    ),
                    ("conflicts", json!("sequential"))
                ])
            ),
            "'conflicts' cannot be used with 'data-streams'"
        );
    }

    #[test]
    fn test_create_with_conflict_probability_out_of_range() {
        let workload = test_workload(vec![]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("bulk-size", json!(5000)),
                    ("conflicts", json!("sequential")),
                    ("conflict-probability", json!(-0.1))
                ])
            ),
            "'conflict-probability' must be in the range [0.0, 100.0] but was -0.1"
        );
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("bulk-size", json!(5000)),
                    ("conflicts", json!("sequential")),
                    ("conflict-probability", json!(100.1))
                ])
            ),
            "'conflict-probability' must be in the range [0.0, 100.0] but was 100.1"
        );
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("bulk-size", json!(5000)),
                    ("conflicts", json!("sequential")),
                    ("conflict-probability", json!("something"))
                ])
            ),
            "'conflict-probability' must be numeric"
        );
    }

    #[test]
    fn test_create_with_conflict_probability_zero() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        let p = params(&[
            ("bulk-size", json!(5000)),
            ("conflicts", json!("sequential")),
            ("conflict-probability", json!(0)),
        ]);
        assert!(BulkIndexParamSource::new(&workload, &p).is_ok());
    }

    #[test]
    fn test_create_with_ingest_percentage_out_of_range() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[("bulk-size", json!(5000)), ("ingest-percentage", json!(0.0))])
            ),
            "'ingest-percentage' must be in the range (0.0, 100.0] but was 0.0"
        );
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("bulk-size", json!(5000)),
                    ("ingest-percentage", json!(100.1))
                ])
            ),
            "'ingest-percentage' must be in the range (0.0, 100.0] but was 100.1"
        );
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("bulk-size", json!(5000)),
                    ("ingest-percentage", json!("100 percent"))
                ])
            ),
            "'ingest-percentage' must be numeric"
        );
    }

    #[test]
    fn test_create_valid_param_source() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        let p = params(&[
            ("conflicts", json!("random")),
            ("bulk-size", json!(5000)),
            ("batch-size", json!(20000)),
            ("ingest-percentage", json!(20.5)),
            ("pipeline", json!("test-pipeline")),
        ]);
        assert!(BulkIndexParamSource::new(&workload, &p).is_ok());
    }

    #[test]
    fn test_passes_all_corpora_by_default() {
        let corpora = vec![
            bulk_corpus("default", 10, "test-idx", "test-type"),
            bulk_corpus("special", 100, "test-idx2", "type"),
        ];
        let workload = test_workload(corpora.clone());
        let source = BulkIndexParamSource::new(
            &workload,
            &params(&[("conflicts", json!("random")), ("bulk-size", json!(5000))]),
        )
        .unwrap();
        assert_eq!(source.corpora(), corpora.as_slice());
    }

    #[test]
    fn test_filters_corpora() {
        let corpora = vec![
            bulk_corpus("default", 10, "test-idx", "test-type"),
            bulk_corpus("special", 100, "test-idx2", "type"),
        ];
        let workload = test_workload(corpora.clone());
        let source = BulkIndexParamSource::new(
            &workload,
            &params(&[("corpora", json!(["special"])), ("bulk-size", json!(5000))]),
        )
        .unwrap();
        assert_eq!(source.corpora(), &corpora[1..]);
    }

    #[test]
    fn test_filters_corpora_by_data_stream() {
        let corpora = vec![
            DocumentCorpus::new(
                "default",
                vec![Documents::new(SourceFormat::Bulk, 10)
                    .with_target_data_stream("test-data-stream-1")],
            ),
            bulk_corpus("special", 100, "test-idx2", "type"),
            DocumentCorpus::new(
                "special-2",
                vec![Documents::new(SourceFormat::Bulk, 10)
                    .with_target_data_stream("test-data-stream-2")],
            ),
        ];
        let workload = test_workload(corpora.clone());
        let source = BulkIndexParamSource::new(
            &workload,
            &params(&[
                (
                    "data-streams",
                    json!(["test-data-stream-1", "test-data-stream-2"])
                ),
                ("bulk-size", json!(5000)),
            ]),
        )
        .unwrap();
        assert_eq!(
            source.corpora(),
            &[corpora[0].clone(), corpora[2].clone()]
        );
    }

    #[test]
    fn test_raises_exception_if_no_corpus_matches() {
        let workload = test_workload(vec![bulk_corpus("default", 10, "test-idx", "test-type")]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("corpora", json!("does_not_exist")),
                    ("conflicts", json!("random")),
                    ("bulk-size", json!(5000))
                ])
            ),
            "The provided corpus ['does_not_exist'] does not match any of the corpora ['default']."
        );
    }

    #[test]
    fn test_raises_exception_if_no_data_stream_matches() {
        let workload = test_workload(vec![DocumentCorpus::new(
            "default",
            vec![Documents::new(SourceFormat::Bulk, 10).with_target_data_stream("logs-1")],
        )]);
        assert_eq!(
            expect_error(
                &workload,
                params(&[
                    ("data-streams", json!(["no-such-stream"])),
                    ("bulk-size", json!(3))
                ])
            ),
            "The provided data stream ['no-such-stream'] does not match any of the corpora \
             ['default']."
        );
    }

    #[test]
    fn test_raises_exception_if_no_corpus_holds_bulk_documents() {
        let workload = test_workload(vec![DocumentCorpus::new(
            "default",
            vec![Documents::new(SourceFormat::BigAnn, 100)],
        )]);
        assert_eq!(
            expect_error(&workload, params(&[("bulk-size", json!(3))])),
            "There are no bulk documents in any of the corpora ['default']."
        );
    }

    #[test]
    fn test_ingests_all_documents_by_default() {
        let corpora = vec![
            bulk_corpus("default", 300_000, "test-idx", "test-type"),
            bulk_corpus("special", 700_000, "test-idx2", "type"),
        ];
        let workload = test_workload(corpora);
        let source =
            BulkIndexParamSource::new(&workload, &params(&[("bulk-size", json!(10_000))])).unwrap();
        let mut partition = source.partition(0, 1);
        assert_eq!(partition.total_bulks().unwrap(), 100);
    }

    #[test]
    fn test_restricts_number_of_bulks_if_required() {
        let corpora = vec![
            bulk_corpus("default", 300_000, "test-idx", "test-type"),
            bulk_corpus("special", 700_000, "test-idx2", "type"),
        ];
        let workload = test_workload(corpora);
        let bulks: Vec<Vec<&str>> = (0..10)
            .map(|_| vec!["{\"location\" : [-0.1485188, 51.5250666]}"])
            .collect();
        let source = BulkIndexParamSource::with_reader_factory(
            &workload,
            &params(&[
                ("bulk-size", json!(10_000)),
                ("ingest-percentage", json!(2.5)),
            ]),
            static_reader_factory(bulks),
        )
        .unwrap();

        let mut partition = source.partition(0, 1);
        assert_eq!(partition.total_bulks().unwrap(), 3);

        let mut emitted = 0;
        while partition.next_params().unwrap().is_some() {
            emitted += 1;
        }
        assert_eq!(emitted, 3);
        assert!((partition.percent_completed() - 1.0).abs() < f64::EPSILON);
    }
}
