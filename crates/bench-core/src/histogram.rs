use std::collections::BTreeMap;

/// Longest abort message kept verbatim; longer ones are truncated to
/// this many characters plus an ellipsis to bound histogram
/// cardinality.
pub const ABORT_MESSAGE_LIMIT: usize = 20;

/// Counter map keyed by transaction type, abort message, or anything
/// orderable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> Default for Histogram<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> Histogram<K> {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, key: K) {
        self.add_n(key, 1);
    }

    pub fn add_n(&mut self, key: K, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.counts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn merge(&mut self, other: &Self)
    where
        K: Clone,
    {
        for (key, count) in &other.counts {
            self.add_n(key.clone(), *count);
        }
    }
}

/// Truncate an abort message to at most [`ABORT_MESSAGE_LIMIT`]
/// characters, marking the cut with an ellipsis.
pub fn truncate_abort_message(message: &str) -> String {
    if message.chars().count() <= ABORT_MESSAGE_LIMIT {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(ABORT_MESSAGE_LIMIT).collect();
    truncated.push('…');
    truncated
}
