//! Per-channel message timeline.
//!
//! Two sources feed a timeline: bulk history snapshots, which replace the
//! history part wholesale, and live pushes, which are appended one at a time.
//! Presentation only ever sees the merge of both, ordered by
//! `(timestamp, arrival sequence)` and unique by [`DedupKey`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use kiu_shared::error::Result;
use kiu_shared::message::{DedupKey, Message, TimestampSource};
use kiu_shared::normalize::MessageNormalizer;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    message: Message,
}

impl Entry {
    fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.message.timestamp, self.seq)
    }
}

/// Outcome of a history load. Counts are diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryLoad {
    pub accepted: usize,
    pub duplicates: usize,
    pub malformed: usize,
}

/// Outcome of a live append that normalized successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveAppend {
    /// The message is new and now part of the timeline.
    Inserted,
    /// The same message is already present; the existing entry was kept.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct ChannelTimeline {
    history: Vec<Entry>,
    /// Every accepted push, kept for the life of the channel. Entries covered
    /// by the current history stay too: a later, shorter snapshot must not
    /// drop them.
    live: Vec<Entry>,
    merged: Vec<Entry>,
    keys: HashSet<DedupKey>,
    /// Observation times handed out to untimestamped history records, keyed
    /// by fingerprint and occurrence index within the snapshot.
    pinned: HashMap<(String, usize), DateTime<Utc>>,
    next_seq: u64,
    malformed: u64,
}

impl ChannelTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history part with a freshly fetched snapshot.
    ///
    /// Idempotent: loading an equivalent snapshot twice yields the same
    /// merged timeline. Live messages are never discarded, even when newer
    /// than anything in the snapshot.
    pub fn load_history(&mut self, records: &[Value], observed_at: DateTime<Utc>) -> HistoryLoad {
        let mut outcome = HistoryLoad::default();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut pinned = HashMap::new();
        let mut batch_keys = HashSet::new();
        // A message keeps the sequence it first arrived with, whichever path
        // delivered it, so equal-timestamp ties never reorder on reload.
        let previous_seqs: HashMap<DedupKey, u64> = self
            .merged
            .iter()
            .map(|e| (e.message.dedup_key(), e.seq))
            .collect();

        let mut history = Vec::with_capacity(records.len());
        for raw in records {
            let message = match MessageNormalizer::normalize(raw, observed_at) {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed history record");
                    outcome.malformed += 1;
                    continue;
                }
            };

            let message = if message.timestamp_source == TimestampSource::Observed {
                let fingerprint = message.fingerprint();
                let slot = occurrences.entry(fingerprint.clone()).or_insert(0);
                let key = (fingerprint, *slot);
                *slot += 1;
                let ts = self.pinned.get(&key).copied().unwrap_or(message.timestamp);
                pinned.insert(key, ts);
                message.with_timestamp(ts)
            } else {
                message
            };

            let key = message.dedup_key();
            if !batch_keys.insert(key.clone()) {
                outcome.duplicates += 1;
                continue;
            }

            let seq = match previous_seqs.get(&key) {
                Some(seq) => *seq,
                None => self.bump_seq(),
            };
            history.push(Entry { seq, message });
            outcome.accepted += 1;
        }

        self.pinned = pinned;
        self.malformed += outcome.malformed as u64;
        self.history = history;
        self.rebuild();
        outcome
    }

    /// Normalize and insert one pushed record.
    ///
    /// Fails with `MalformedRecord` without touching the timeline.
    pub fn append_live(&mut self, raw: &Value, observed_at: DateTime<Utc>) -> Result<LiveAppend> {
        let message = match MessageNormalizer::normalize(raw, observed_at) {
            Ok(message) => message,
            Err(e) => {
                self.malformed += 1;
                return Err(e);
            }
        };

        let key = message.dedup_key();
        if self.keys.contains(&key) {
            return Ok(LiveAppend::Duplicate);
        }

        let entry = Entry {
            seq: self.bump_seq(),
            message,
        };
        let order = entry.order_key();
        let pos = self.merged.partition_point(|e| e.order_key() <= order);
        self.merged.insert(pos, entry.clone());
        self.live.push(entry);
        self.keys.insert(key);
        Ok(LiveAppend::Inserted)
    }

    /// The merged, ordered, de-duplicated timeline.
    pub fn snapshot(&self) -> Vec<Message> {
        self.merged.iter().map(|e| e.message.clone()).collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.merged.last().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Records dropped because they could not be normalized.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn rebuild(&mut self) {
        let mut keys: HashSet<DedupKey> = self
            .history
            .iter()
            .map(|e| e.message.dedup_key())
            .collect();

        let mut merged = self.history.clone();
        for entry in &self.live {
            if keys.insert(entry.message.dedup_key()) {
                merged.push(entry.clone());
            }
        }
        merged.sort_by_key(Entry::order_key);

        self.merged = merged;
        self.keys = keys;
    }
}
