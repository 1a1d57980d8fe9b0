//! Cached block template with time-based staleness.
//!
//! The cache moves `Empty -> Fresh -> Stale -> Fresh ...`. A template is
//! re-fetched once it is older than the refresh interval or after an explicit
//! [`TemplateCache::invalidate`]. When a fetch fails the previous template
//! keeps being served, and further fetches wait out an exponential cooldown
//! so an unreachable node is not hammered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use miner_core::BlockTemplate;
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::rpc::NodeRpc;

/// A template together with the fetch that produced it.
#[derive(Debug, Clone)]
pub struct TemplateSnapshot {
    /// Increments on every successful fetch.
    pub generation: u64,
    pub template: Arc<BlockTemplate>,
}

/// Cache lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing fetched yet.
    Empty,
    /// Template within the refresh interval.
    Fresh,
    /// Template past the refresh interval or invalidated.
    Stale,
}

/// Holds the most recently fetched template.
pub struct TemplateCache {
    refresh_interval: Duration,
    current: Option<TemplateSnapshot>,
    last_update: Option<Instant>,
    generation: u64,
    backoff: Backoff,
}

impl TemplateCache {
    pub fn new(refresh_interval: Duration, backoff: Backoff) -> Self {
        TemplateCache {
            refresh_interval,
            current: None,
            last_update: None,
            generation: 0,
            backoff,
        }
    }

    /// Return the current template, fetching a new one if it is stale.
    pub fn get<R: NodeRpc>(&mut self, rpc: &R) -> Option<TemplateSnapshot> {
        self.get_at(rpc, Instant::now())
    }

    /// [`get`](Self::get) with an explicit clock reading.
    pub fn get_at<R: NodeRpc>(&mut self, rpc: &R, now: Instant) -> Option<TemplateSnapshot> {
        if self.state(now) != CacheState::Fresh && self.backoff.ready(now) {
            self.refresh(rpc, now);
        }
        self.current.clone()
    }

    fn refresh<R: NodeRpc>(&mut self, rpc: &R, now: Instant) {
        match rpc.get_block_template() {
            Ok(template) => {
                self.generation += 1;
                debug!(
                    generation = self.generation,
                    height = template.height,
                    "Fetched block template"
                );
                self.current = Some(TemplateSnapshot {
                    generation: self.generation,
                    template: Arc::new(template),
                });
                self.last_update = Some(now);
                self.backoff.record_success();
            }
            Err(err) => {
                let delay = self.backoff.record_failure(now);
                warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    serving_stale = self.current.is_some(),
                    "getblocktemplate failed"
                );
            }
        }
    }

    /// Force the next `get` to re-fetch regardless of age.
    pub fn invalidate(&mut self) {
        self.last_update = None;
    }

    /// Lifecycle state at `now`.
    pub fn state(&self, now: Instant) -> CacheState {
        match (&self.current, self.last_update) {
            (None, _) => CacheState::Empty,
            (Some(_), Some(at)) if now.saturating_duration_since(at) <= self.refresh_interval => {
                CacheState::Fresh
            }
            (Some(_), _) => CacheState::Stale,
        }
    }
}
