//! Profiling
//!
//! Handlers of libraries flagged for profiling record how long every call
//! took. Stats are keyed by the handler's fully qualified label and can be
//! read from any thread through [crate::SessionHandle::profile_snapshot]

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use itertools::Itertools;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileBlock {
    pub calls: u64,
    pub total: Duration,
    pub max: Duration,
}

impl ProfileBlock {
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profiler {
    blocks: Arc<DashMap<String, ProfileBlock>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str, elapsed: Duration) {
        let mut block = match self.blocks.get_mut(label) {
            Some(block) => block,
            None => self.blocks.entry(label.to_owned()).or_default(),
        };
        block.calls += 1;
        block.total += elapsed;
        block.max = block.max.max(elapsed);
    }

    pub fn get(&self, label: &str) -> Option<ProfileBlock> {
        self.blocks.get(label).map(|block| *block)
    }

    /// All recorded blocks, most expensive first
    pub fn snapshot(&self) -> Vec<(String, ProfileBlock)> {
        self.blocks
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .sorted_by(|(a_label, a), (b_label, b)| {
                b.total.cmp(&a.total).then_with(|| a_label.cmp(b_label))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.blocks.clear();
    }
}
