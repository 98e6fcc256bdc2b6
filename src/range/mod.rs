use std::collections::HashMap;
use std::fmt;

/// One detected throw-site: a message observed in a file at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub filename: String,
    pub message: String,
    pub revision: String,
    pub revision_index: i64,
}

impl Observation {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            filename: self.filename.clone(),
            message: self.message.clone(),
        }
    }
}

/// The identity of an exception across revisions: its file and exact message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub filename: String,
    pub message: String,
}

/// First and last revision at which a key was observed. Bounds only ever
/// widen; a key seen at indices 3 and 7 spans [3, 7] even if absent between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRange {
    pub start_revision_index: i64,
    pub start_revision: String,
    pub end_revision_index: i64,
    pub end_revision: String,
}

impl RevisionRange {
    pub fn new(revision: &str, revision_index: i64) -> Self {
        Self {
            start_revision_index: revision_index,
            start_revision: revision.to_string(),
            end_revision_index: revision_index,
            end_revision: revision.to_string(),
        }
    }

    pub fn update(&mut self, revision: &str, revision_index: i64) {
        if revision_index < self.start_revision_index {
            self.start_revision_index = revision_index;
            self.start_revision = revision.to_string();
        }
        if revision_index > self.end_revision_index {
            self.end_revision_index = revision_index;
            self.end_revision = revision.to_string();
        }
    }
}

impl fmt::Display for RevisionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.start_revision, self.end_revision)
    }
}

/// Folds an observation stream into one `RevisionRange` per key, remembering
/// the order in which each key was first seen. The order vector is explicit
/// state, not map iteration order, so rebuilds over the same stream always
/// iterate identically.
#[derive(Debug, Default)]
pub struct RangeBuilder {
    ranges: HashMap<ObservationKey, RevisionRange>,
    order: Vec<ObservationKey>,
}

impl RangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Self {
        let mut builder = Self::new();
        for observation in observations {
            builder.observe(observation);
        }
        builder
    }

    pub fn observe(&mut self, observation: &Observation) {
        let key = observation.key();
        if let Some(range) = self.ranges.get_mut(&key) {
            range.update(&observation.revision, observation.revision_index);
        } else {
            let range = RevisionRange::new(&observation.revision, observation.revision_index);
            self.order.push(key.clone());
            self.ranges.insert(key, range);
        }
    }

    pub fn get(&self, key: &ObservationKey) -> Option<&RevisionRange> {
        self.ranges.get(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObservationKey, &RevisionRange)> {
        self.order.iter().map(|key| (key, &self.ranges[key]))
    }

    /// Keys sorted by (filename, message), the order the range report uses.
    pub fn sorted_keys(&self) -> Vec<&ObservationKey> {
        let mut keys: Vec<&ObservationKey> = self.order.iter().collect();
        keys.sort();
        keys
    }
}
