//! Speaker queue for one (team, session), owned by the facilitator's device.
//!
//! The queue is a local projection and is never written to the remote store.
//! The writer roster may change between calls; [`SpeakerQueue::resequence`]
//! keeps everyone's relative order and only [`SpeakerQueue::advance`] reshuffles.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::WriterName;

/// `Default` is the not-started state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeakerQueue {
    #[serde(default)]
    pub spoken: Vec<WriterName>,
    #[serde(default)]
    pub speaking_now: Option<WriterName>,
    /// Not-yet-spoken writers; the current speaker, if any, is at the head.
    #[serde(default)]
    pub ready_order: Vec<WriterName>,
}

impl SpeakerQueue {
    pub fn is_started(&self) -> bool {
        self.speaking_now.is_some() || !self.ready_order.is_empty() || !self.spoken.is_empty()
    }

    /// Everyone in `roster` has spoken and nobody is speaking.
    pub fn is_exhausted(&self, roster: &[WriterName]) -> bool {
        self.speaking_now.is_none() && roster.iter().all(|w| self.spoken.contains(w))
    }

    /// Pick the next speaker when nobody is speaking.
    ///
    /// Draws a fresh permutation of the roster members who have not spoken yet
    /// and puts its head on stage. With nobody left the speaker is cleared and
    /// the ready order is empty. While someone is speaking this only resequences.
    pub fn advance<R: Rng + ?Sized>(&mut self, roster: &[WriterName], rng: &mut R) {
        if self.speaking_now.is_some() {
            self.resequence(roster);
            return;
        }
        let mut pending: Vec<WriterName> = Vec::new();
        for writer in roster {
            if !self.spoken.contains(writer) && !pending.contains(writer) {
                pending.push(writer.clone());
            }
        }
        pending.shuffle(rng);
        self.speaking_now = pending.first().cloned();
        self.ready_order = pending;
    }

    /// Move the current speaker to `spoken`. Calling it again is a no-op.
    pub fn finish_current(&mut self) {
        let Some(writer) = self.speaking_now.take() else {
            return;
        };
        self.ready_order.retain(|w| *w != writer);
        if !self.spoken.contains(&writer) {
            self.spoken.push(writer);
        }
    }

    /// `finish_current` followed by `advance`.
    pub fn next_speaker<R: Rng + ?Sized>(&mut self, roster: &[WriterName], rng: &mut R) {
        self.finish_current();
        self.advance(roster, rng);
    }

    pub fn reset(&mut self) {
        self.spoken.clear();
        self.speaking_now = None;
        self.ready_order.clear();
    }

    /// Reconcile the ready order with a changed roster without reshuffling.
    ///
    /// Entries for writers no longer present are dropped; writers who appear in
    /// neither `spoken` nor the ready order are appended in roster order. A queue
    /// that has not started stays not started.
    pub fn resequence(&mut self, roster: &[WriterName]) {
        if !self.is_started() {
            return;
        }
        let spoken = &self.spoken;
        self.ready_order
            .retain(|w| roster.contains(w) && !spoken.contains(w));
        for writer in roster {
            if !self.spoken.contains(writer) && !self.ready_order.contains(writer) {
                self.ready_order.push(writer.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(raw: &[&str]) -> Vec<WriterName> {
        raw.iter().map(|n| WriterName::from(*n)).collect()
    }

    #[test]
    fn advance_on_fresh_queue_uses_everyone_once() {
        let roster = names(&["A", "B", "C"]);
        let mut queue = SpeakerQueue::default();
        queue.advance(&roster, &mut StdRng::seed_from_u64(7));

        let speaking = queue.speaking_now.clone().expect("someone speaks");
        assert!(roster.contains(&speaking));
        assert_eq!(queue.ready_order.first(), Some(&speaking));
        let mut order = queue.ready_order.clone();
        order.sort();
        assert_eq!(order, roster);
    }

    #[test]
    fn finish_current_is_idempotent() {
        let roster = names(&["A", "B", "C"]);
        let mut queue = SpeakerQueue::default();
        queue.advance(&roster, &mut StdRng::seed_from_u64(1));
        let speaking = queue.speaking_now.clone().expect("speaking");

        queue.finish_current();
        queue.finish_current();
        assert_eq!(queue.spoken, vec![speaking.clone()]);
        assert!(queue.speaking_now.is_none());
        assert!(!queue.ready_order.contains(&speaking));
    }

    #[test]
    fn same_seed_same_order() {
        let roster = names(&["A", "B", "C", "D", "E"]);
        let mut first = SpeakerQueue::default();
        let mut second = SpeakerQueue::default();
        first.advance(&roster, &mut StdRng::seed_from_u64(42));
        second.advance(&roster, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn exhausting_the_roster_clears_speaker() {
        let roster = names(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = SpeakerQueue::default();
        queue.advance(&roster, &mut rng);
        queue.next_speaker(&roster, &mut rng);
        queue.next_speaker(&roster, &mut rng);

        assert!(queue.speaking_now.is_none());
        assert!(queue.ready_order.is_empty());
        assert_eq!(queue.spoken.len(), 2);
        assert!(queue.is_exhausted(&roster));
    }

    #[test]
    fn advance_while_speaking_keeps_speaker() {
        let roster = names(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(9);
        let mut queue = SpeakerQueue::default();
        queue.advance(&roster, &mut rng);
        let before = queue.clone();
        queue.advance(&roster, &mut rng);
        assert_eq!(queue, before);
    }

    #[test]
    fn resequence_is_stable() {
        let mut queue = SpeakerQueue {
            spoken: names(&["A"]),
            speaking_now: Some(WriterName::from("C")),
            ready_order: names(&["C", "B", "D"]),
        };
        queue.resequence(&names(&["A", "B", "C", "E"]));
        assert_eq!(queue.ready_order, names(&["C", "B", "E"]));
        assert_eq!(queue.speaking_now, Some(WriterName::from("C")));
    }

    #[test]
    fn resequence_leaves_unstarted_queue_alone() {
        let mut queue = SpeakerQueue::default();
        queue.resequence(&names(&["A", "B"]));
        assert!(!queue.is_started());
    }

    #[test]
    fn reset_returns_to_not_started() {
        let roster = names(&["A", "B"]);
        let mut queue = SpeakerQueue::default();
        queue.next_speaker(&roster, &mut StdRng::seed_from_u64(5));
        queue.reset();
        assert_eq!(queue, SpeakerQueue::default());
    }
}
