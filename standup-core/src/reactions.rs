//! Team-wide reaction totals.
//!
//! Every writer stores only their own flags inside their own record, so the
//! totals are recomputed from scratch on each sync: the count for
//! `(target, emoji)` is the number of distinct writer records that have the flag
//! set. No running total is ever persisted.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::types::{RecordKey, StatusRecord};

/// `target record key -> emoji -> number of writers`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ReactionTotals(pub BTreeMap<String, BTreeMap<String, usize>>);

impl ReactionTotals {
    pub fn count(&self, target: &str, emoji: &str) -> usize {
        self.0
            .get(target)
            .and_then(|per_emoji| per_emoji.get(emoji))
            .copied()
            .unwrap_or(0)
    }

    /// All emoji counts for one target, in emoji order.
    pub fn for_target(&self, target: &str) -> Vec<(&str, usize)> {
        self.0
            .get(target)
            .map(|per_emoji| {
                per_emoji
                    .iter()
                    .map(|(emoji, count)| (emoji.as_str(), *count))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sum reaction flags across records. If the same record key appears twice the
/// later copy is the one counted.
pub fn aggregate(records: &[StatusRecord]) -> ReactionTotals {
    let mut owners: HashMap<RecordKey, &StatusRecord> = HashMap::new();
    for record in records {
        owners.insert(record.key(), record);
    }

    let mut totals: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for record in owners.values() {
        for (target, emojis) in &record.reactions.flags {
            let per_emoji = totals.entry(target.clone()).or_default();
            for emoji in emojis {
                *per_emoji.entry(emoji.clone()).or_insert(0) += 1;
            }
        }
    }
    ReactionTotals(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKey;

    fn reacting(writer: &str, target: &str, emoji: &str) -> StatusRecord {
        let mut record = StatusRecord::empty(&RecordKey::new("core", writer, "s1"));
        record.reactions.set(target, emoji, true);
        record
    }

    #[test]
    fn duplicate_record_counts_once() {
        let a = reacting("Ada", "t", "👍");
        let totals = aggregate(&[a.clone(), a]);
        assert_eq!(totals.count("t", "👍"), 1);
    }

    #[test]
    fn later_duplicate_wins() {
        let on = reacting("Ada", "t", "👍");
        let mut off = on.clone();
        off.reactions.set("t", "👍", false);
        assert_eq!(aggregate(&[on, off]).count("t", "👍"), 0);
    }

    #[test]
    fn empty_input_empty_totals() {
        assert!(aggregate(&[]).is_empty());
        assert_eq!(aggregate(&[]).count("t", "👍"), 0);
    }

    #[test]
    fn for_target_lists_all_emoji() {
        let mut a = reacting("Ada", "t", "👍");
        a.reactions.set("t", "🎉", true);
        let b = reacting("Bob", "t", "👍");
        let totals = aggregate(&[a, b]);
        assert_eq!(totals.for_target("t"), vec![("🎉", 1), ("👍", 2)]);
    }
}
