//! Per-topic event batching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which topics batch, and when a batch flushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Topics that accumulate into batches.
    pub topics: BTreeSet<String>,
    /// Flush as soon as a buffer holds this many events.
    pub max_batch_size: usize,
    /// Flush once the oldest buffered event is this old (milliseconds).
    pub max_batch_time_ms: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            topics: BTreeSet::new(),
            max_batch_size: 10,
            max_batch_time_ms: 16.0,
        }
    }
}

impl BatchConfig {
    pub fn for_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn batches(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }
}

/// A flushed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch<E> {
    pub topic: &'static str,
    pub events: Vec<E>,
    pub batch_start_time: f64,
    pub batch_end_time: f64,
}

impl<E> EventBatch<E> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Buffer for one topic.
#[derive(Debug)]
pub(crate) struct BatchBuffer<E> {
    events: Vec<E>,
    started_at: Option<f64>,
}

impl<E> Default for BatchBuffer<E> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            started_at: None,
        }
    }
}

impl<E> BatchBuffer<E> {
    pub(crate) fn push(&mut self, event: E, now: f64) -> usize {
        self.started_at.get_or_insert(now);
        self.events.push(event);
        self.events.len()
    }

    pub(crate) fn is_due(&self, now: f64, max_age_ms: f64) -> bool {
        self.started_at
            .is_some_and(|start| now - start >= max_age_ms)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn take(&mut self, topic: &'static str, now: f64) -> Option<EventBatch<E>> {
        let start = self.started_at.take()?;
        Some(EventBatch {
            topic,
            events: std::mem::take(&mut self.events),
            batch_start_time: start,
            batch_end_time: now,
        })
    }
}
