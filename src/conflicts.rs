//! Id-conflict simulation for bulk ingestion.
//!
//! A bulk workload can be asked to revisit previously indexed document ids
//! with a configurable probability, optionally biased towards recently
//! indexed ids, to exercise update-heavy ingestion paths.

use crate::error::ParamsError;
use rand::seq::SliceRandom;
use rand::Rng;

/// Steepness of the exponential recency bias.
const RECENCY_SLOPE: f64 = 30.0;

/// How conflicting document ids are laid out before ingestion starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexIdConflict {
    Sequential,
    Random,
}

impl IndexIdConflict {
    /// Parse the `conflicts` operation parameter.
    pub fn parse(value: Option<&str>) -> Result<Option<IndexIdConflict>, ParamsError> {
        match value {
            None => Ok(None),
            Some("sequential") => Ok(Some(IndexIdConflict::Sequential)),
            Some("random") => Ok(Some(IndexIdConflict::Random)),
            Some(other) => Err(ParamsError::invalid(format!(
                "Unknown 'conflicts' setting [{other}]"
            ))),
        }
    }
}

/// The bulk action emitted when an id conflict occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Index,
    Update,
}

impl OnConflict {
    /// Parse the `on-conflict` operation parameter. Defaults to `index`.
    pub fn parse(value: Option<&str>) -> Result<OnConflict, ParamsError> {
        match value {
            None | Some("index") => Ok(OnConflict::Index),
            Some("update") => Ok(OnConflict::Update),
            Some(other) => Err(ParamsError::invalid(format!(
                "Unknown 'on-conflict' setting [{other}]"
            ))),
        }
    }

    /// The name of the bulk action to emit.
    pub fn action(self) -> &'static str {
        match self {
            OnConflict::Index => "index",
            OnConflict::Update => "update",
        }
    }
}

/// Build the pool of conflicting ids for one client, starting at `offset`.
///
/// Ids are zero-padded to a fixed width so they sort and compare uniformly
/// on the server side.
pub fn build_conflicting_ids(
    conflict: Option<IndexIdConflict>,
    count: u64,
    offset: u64,
) -> Option<Vec<String>> {
    build_conflicting_ids_with_shuffle(conflict, count, offset, |ids| {
        ids.shuffle(&mut rand::thread_rng())
    })
}

/// Same as [`build_conflicting_ids`] but with an injectable shuffle, so
/// tests can make the random layout deterministic.
pub fn build_conflicting_ids_with_shuffle(
    conflict: Option<IndexIdConflict>,
    count: u64,
    offset: u64,
    shuffle: impl FnOnce(&mut [String]),
) -> Option<Vec<String>> {
    let conflict = conflict?;
    let mut ids: Vec<String> = (offset..offset + count).map(|i| format!("{i:010}")).collect();
    if conflict == IndexIdConflict::Random {
        shuffle(&mut ids);
    }
    Some(ids)
}

/// One action/meta-data line together with the bulk action it announces.
pub type ActionMetaData = (&'static str, String);

/// Generates action/meta-data lines for bulk requests.
///
/// Without conflicting ids this is an endless generator of identical lines.
/// With conflicting ids it walks the id pool sequentially, interleaving
/// conflicting re-index/update actions with the configured probability, and
/// ends once the pool is exhausted.
pub struct GenerateActionMetaData {
    index_name: String,
    type_name: Option<String>,
    conflicting_ids: Option<Vec<String>>,
    on_conflict: OnConflict,
    /// Probability of a conflict, scaled to `[0.0, 1.0]`.
    conflict_probability: f64,
    recency: f64,
    use_create: bool,
    id_up_to: usize,
    rand: Box<dyn FnMut() -> f64 + Send>,
    randint: Box<dyn FnMut(usize, usize) -> usize + Send>,
    randexp: Box<dyn FnMut(f64) -> f64 + Send>,
    meta_data_index_with_id: String,
    meta_data_update_with_id: String,
    meta_data_index_no_id: String,
    meta_data_create_no_id: String,
}

impl std::fmt::Debug for GenerateActionMetaData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateActionMetaData")
            .field("index_name", &self.index_name)
            .field("type_name", &self.type_name)
            .field("conflicting_ids", &self.conflicting_ids)
            .field("on_conflict", &self.on_conflict)
            .field("conflict_probability", &self.conflict_probability)
            .field("recency", &self.recency)
            .field("use_create", &self.use_create)
            .field("id_up_to", &self.id_up_to)
            .finish_non_exhaustive()
    }
}

impl GenerateActionMetaData {
    pub fn new(index_name: &str, type_name: Option<&str>) -> Self {
        let type_part = type_name
            .map(|t| format!(", \"_type\": \"{t}\""))
            .unwrap_or_default();
        Self {
            index_name: index_name.to_string(),
            type_name: type_name.map(str::to_string),
            conflicting_ids: None,
            on_conflict: OnConflict::Index,
            conflict_probability: 0.25,
            recency: 0.0,
            use_create: false,
            id_up_to: 0,
            rand: Box::new(|| rand::thread_rng().gen::<f64>()),
            randint: Box::new(|low, high| rand::thread_rng().gen_range(low..=high)),
            randexp: Box::new(|lambda| {
                let u: f64 = rand::thread_rng().gen::<f64>();
                -(1.0 - u).ln() / lambda
            }),
            meta_data_index_with_id: format!(
                "{{\"index\": {{\"_index\": \"{index_name}\"{type_part}, \"_id\": \"%s\"}}}}\n"
            ),
            meta_data_update_with_id: format!(
                "{{\"update\": {{\"_index\": \"{index_name}\"{type_part}, \"_id\": \"%s\"}}}}\n"
            ),
            meta_data_index_no_id: format!(
                "{{\"index\": {{\"_index\": \"{index_name}\"{type_part}}}}}\n"
            ),
            meta_data_create_no_id: format!(
                "{{\"create\": {{\"_index\": \"{index_name}\"{type_part}}}}}\n"
            ),
        }
    }

    /// Use `create` instead of `index` actions. Incompatible with
    /// conflicting ids.
    pub fn with_create_action(mut self) -> Result<Self, ParamsError> {
        if self.conflicting_ids.is_some() {
            return Err(ParamsError::assertion(
                "Index mode '_create' cannot be used with conflicting ids".to_string(),
            ));
        }
        self.use_create = true;
        Ok(self)
    }

    /// Set the pool of conflicting ids. Incompatible with `create` actions.
    pub fn with_conflicting_ids(mut self, ids: Vec<String>) -> Result<Self, ParamsError> {
        if self.use_create {
            return Err(ParamsError::assertion(
                "Index mode '_create' cannot be used with conflicting ids".to_string(),
            ));
        }
        self.conflicting_ids = Some(ids);
        Ok(self)
    }

    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    /// Set the conflict probability in percent.
    pub fn with_conflict_probability(mut self, percent: f64) -> Self {
        self.conflict_probability = percent / 100.0;
        self
    }

    pub fn with_recency(mut self, recency: f64) -> Self {
        self.recency = recency;
        self
    }

    pub fn with_rand(mut self, rand: impl FnMut() -> f64 + Send + 'static) -> Self {
        self.rand = Box::new(rand);
        self
    }

    pub fn with_randint(
        mut self,
        randint: impl FnMut(usize, usize) -> usize + Send + 'static,
    ) -> Self {
        self.randint = Box::new(randint);
        self
    }

    pub fn with_randexp(mut self, randexp: impl FnMut(f64) -> f64 + Send + 'static) -> Self {
        self.randexp = Box::new(randexp);
        self
    }

    /// Restart the sequential walk through the id pool.
    pub fn reset(&mut self) {
        self.id_up_to = 0;
    }

    fn next_conflicting_index(&mut self) -> usize {
        if self.recency == 0.0 {
            (self.randint)(0, self.id_up_to - 1)
        } else {
            // Bias towards recently indexed ids with an exponential draw.
            let idx_range = ((self.randexp)(RECENCY_SLOPE * self.recency)).min(1.0);
            ((self.id_up_to - 1) as f64 * (1.0 - idx_range)).round_ties_even() as usize
        }
    }

    /// The next action and meta-data line, or `None` once a finite id pool
    /// is exhausted.
    pub fn next_pair(&mut self) -> Option<ActionMetaData> {
        if self.conflicting_ids.is_none() {
            return Some(if self.use_create {
                ("create", self.meta_data_create_no_id.clone())
            } else {
                ("index", self.meta_data_index_no_id.clone())
            });
        }

        let conflict = self.id_up_to > 0 && {
            let draw = (self.rand)();
            self.conflict_probability > 0.0 && draw <= self.conflict_probability
        };

        if conflict {
            let idx = self.next_conflicting_index();
            let doc_id = self
                .conflicting_ids
                .as_ref()
                .and_then(|ids| ids.get(idx))
                .cloned()?;
            let template = match self.on_conflict {
                OnConflict::Index => &self.meta_data_index_with_id,
                OnConflict::Update => &self.meta_data_update_with_id,
            };
            Some((self.on_conflict.action(), template.replace("%s", &doc_id)))
        } else {
            let ids = self.conflicting_ids.as_ref()?;
            if self.id_up_to >= ids.len() {
                return None;
            }
            let doc_id = ids[self.id_up_to].clone();
            self.id_up_to += 1;
            Some((
                "index",
                self.meta_data_index_with_id.replace("%s", &doc_id),
            ))
        }
    }

    /// Whether this generator announces documents with explicit ids.
    pub fn has_conflicting_ids(&self) -> bool {
        self.conflicting_ids.is_some()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

/// Wrap a document line as the partial-document body of an `update` action.
pub fn update_body(line: &str) -> String {
    format!("{{\"doc\":{line}}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(values: Vec<f64>) -> impl FnMut() -> f64 + Send {
        let mut iter = values.into_iter();
        move || iter.next().unwrap()
    }

    #[test]
    fn test_no_conflicts_builds_no_ids() {
        assert!(build_conflicting_ids(None, 100, 0).is_none());
    }

    #[test]
    fn test_sequential_conflicting_ids() {
        let ids = build_conflicting_ids(Some(IndexIdConflict::Sequential), 11, 0).unwrap();
        assert_eq!(ids[0], "0000000000");
        assert_eq!(ids[10], "0000000010");
        assert_eq!(ids.len(), 11);

        let ids = build_conflicting_ids(Some(IndexIdConflict::Sequential), 11, 5).unwrap();
        assert_eq!(ids[0], "0000000005");
        assert_eq!(ids[10], "0000000015");
    }

    #[test]
    fn test_random_conflicting_ids_with_injected_shuffle() {
        let ids = build_conflicting_ids_with_shuffle(
            Some(IndexIdConflict::Random),
            3,
            5,
            |ids| ids.reverse(),
        )
        .unwrap();
        assert_eq!(ids, vec!["0000000007", "0000000006", "0000000005"]);
    }

    #[test]
    fn test_parse_conflicts_setting() {
        assert_eq!(IndexIdConflict::parse(None).unwrap(), None);
        assert_eq!(
            IndexIdConflict::parse(Some("sequential")).unwrap(),
            Some(IndexIdConflict::Sequential)
        );
        let err = IndexIdConflict::parse(Some("crazy")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown 'conflicts' setting [crazy]");
    }

    #[test]
    fn test_parse_on_conflict_setting() {
        assert_eq!(OnConflict::parse(None).unwrap(), OnConflict::Index);
        assert_eq!(OnConflict::parse(Some("update")).unwrap(), OnConflict::Update);
        let err = OnConflict::parse(Some("delete")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown 'on-conflict' setting [delete]");
    }

    #[test]
    fn test_action_meta_data_without_id_conflicts() {
        let mut generator = GenerateActionMetaData::new("test_index", Some("test_type"));
        assert_eq!(
            generator.next_pair(),
            Some((
                "index",
                "{\"index\": {\"_index\": \"test_index\", \"_type\": \"test_type\"}}\n".to_string()
            ))
        );
    }

    #[test]
    fn test_action_meta_data_typeless() {
        let mut generator = GenerateActionMetaData::new("test_index", None);
        assert_eq!(
            generator.next_pair(),
            Some(("index", "{\"index\": {\"_index\": \"test_index\"}}\n".to_string()))
        );
    }

    #[test]
    fn test_action_meta_data_create() {
        let mut generator = GenerateActionMetaData::new("test_index", None)
            .with_create_action()
            .unwrap();
        assert_eq!(
            generator.next_pair(),
            Some(("create", "{\"create\": {\"_index\": \"test_index\"}}\n".to_string()))
        );
    }

    #[test]
    fn test_create_rejects_conflicting_ids() {
        let err = GenerateActionMetaData::new("test_index", None)
            .with_conflicting_ids(vec!["100".to_string()])
            .unwrap()
            .with_create_action()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Index mode '_create' cannot be used with conflicting ids"
        );
    }

    fn idx(id: &str) -> ActionMetaData {
        (
            "index",
            format!(
                "{{\"index\": {{\"_index\": \"test_index\", \"_type\": \"test_type\", \"_id\": \"{id}\"}}}}\n"
            ),
        )
    }

    fn update(id: &str) -> ActionMetaData {
        (
            "update",
            format!(
                "{{\"update\": {{\"_index\": \"test_index\", \"_type\": \"test_type\", \"_id\": \"{id}\"}}}}\n"
            ),
        )
    }

    #[test]
    fn test_action_meta_data_with_id_conflicts() {
        let ids: Vec<String> = ["100", "200", "300", "400"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // Values <= 0.25 produce a conflict.
        let draws = vec![0.2, 0.25, 0.2, 0.3, 0.0];
        let mut picks = vec![1usize, 3, 2, 0].into_iter();

        let mut generator = GenerateActionMetaData::new("test_index", Some("test_type"))
            .with_conflicting_ids(ids)
            .unwrap()
            .with_on_conflict(OnConflict::Update)
            .with_conflict_probability(25.0)
            .with_rand(seq(draws))
            .with_randint(move |_, _| picks.next().unwrap());

        // The first document is always indexed sequentially.
        assert_eq!(generator.next_pair(), Some(idx("100")));
        assert_eq!(generator.next_pair(), Some(update("200")));
        assert_eq!(generator.next_pair(), Some(update("400")));
        assert_eq!(generator.next_pair(), Some(update("300")));
        // No conflict: the next sequential id is drawn.
        assert_eq!(generator.next_pair(), Some(idx("200")));
        assert_eq!(generator.next_pair(), Some(update("100")));
    }

    #[test]
    fn test_action_meta_data_with_recency_bias() {
        let ids: Vec<String> = ["100", "200", "300", "400", "500", "600"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let draws = vec![0.2, 0.25, 0.2, 0.3, 0.4, 0.35, 0.0, 0.2, 0.15];
        let exps = vec![
            0.013375248172714948,
            0.042495604491024914,
            0.005491072642023834,
            0.028557879547255083,
            0.209771474243926352,
        ];

        let mut generator = GenerateActionMetaData::new("test_index", Some("test_type"))
            .with_conflicting_ids(ids)
            .unwrap()
            .with_on_conflict(OnConflict::Update)
            .with_conflict_probability(25.0)
            .with_recency(1.0)
            .with_rand(seq(draws))
            .with_randexp({
                let mut iter = exps.into_iter();
                move |_| iter.next().unwrap()
            });

        assert_eq!(generator.next_pair(), Some(idx("100")));
        // Conflicts are heavily biased towards the most recent id.
        assert_eq!(generator.next_pair(), Some(update("100")));
        assert_eq!(generator.next_pair(), Some(update("100")));
        assert_eq!(generator.next_pair(), Some(update("100")));
        assert_eq!(generator.next_pair(), Some(idx("200")));
        assert_eq!(generator.next_pair(), Some(idx("300")));
        assert_eq!(generator.next_pair(), Some(idx("400")));
        assert_eq!(generator.next_pair(), Some(update("400")));
        assert_eq!(generator.next_pair(), Some(update("300")));
    }

    #[test]
    fn test_zero_conflict_probability_stays_sequential() {
        let ids: Vec<String> = ["100", "200", "300", "400"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut generator = GenerateActionMetaData::new("test_index", Some("test_type"))
            .with_conflicting_ids(ids)
            .unwrap()
            .with_conflict_probability(0.0);

        for id in ["100", "200", "300", "400"] {
            assert_eq!(generator.next_pair(), Some(idx(id)));
        }
        assert_eq!(generator.next_pair(), None);
    }

    #[test]
    fn test_reset_restarts_sequential_walk() {
        let ids: Vec<String> = ["100", "200"].iter().map(|s| s.to_string()).collect();
        let mut generator = GenerateActionMetaData::new("test_index", Some("test_type"))
            .with_conflicting_ids(ids)
            .unwrap()
            .with_conflict_probability(0.0);
        assert_eq!(generator.next_pair(), Some(idx("100")));
        generator.reset();
        assert_eq!(generator.next_pair(), Some(idx("100")));
    }

    #[test]
    fn test_update_body_wraps_document_line() {
        assert_eq!(update_body("{\"key\": \"v\"}"), "{\"doc\":{\"key\": \"v\"}}\n");
    }
}
