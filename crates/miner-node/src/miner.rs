//! The mining coordinator.
//!
//! A single thread drives everything: it pulls the current template from the
//! cache, rebuilds the coinbase and header preimage whenever the template
//! changes, hands one nonce range to each worker, and waits for the whole
//! wave to finish. The first winning report observed is submitted; the rest
//! of the wave is discarded. After a win the allocator is rewound and the
//! cache invalidated so the next wave mines on the node's new tip.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use miner_core::difficulty::format_difficulty;
use miner_core::{bits_to_target, CoinbaseBuilder, HeaderPreimage};
use tracing::{debug, info, warn};

use crate::allocator::NonceAllocator;
use crate::backoff::Backoff;
use crate::config::MinerConfig;
use crate::payout::PayoutScript;
use crate::pool::{Work, WorkerPool};
use crate::rpc::{NodeRpc, SubmitOutcome};
use crate::submit::submit_solution;
use crate::template_cache::{TemplateCache, TemplateSnapshot};

/// How often the hash rate summary is logged.
const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// What a single wave did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveOutcome {
    /// No template available; nothing was mined.
    NoTemplate,
    /// Every range was searched without a winner.
    Searched { hashes: u64 },
    /// The nonce space of the current template is used up.
    Exhausted,
    /// A worker found a block. `submission` is `None` if the RPC call failed.
    Found {
        nonce: u32,
        submission: Option<SubmitOutcome>,
    },
}

/// Running totals for the hash rate summary.
#[derive(Debug, Clone)]
pub struct MiningStats {
    pub total_hashes: u64,
    pub blocks_found: u64,
    pub blocks_accepted: u64,
    started: Instant,
}

impl MiningStats {
    fn new() -> Self {
        MiningStats {
            total_hashes: 0,
            blocks_found: 0,
            blocks_accepted: 0,
            started: Instant::now(),
        }
    }

    /// Average hashes per second since start.
    pub fn hash_rate(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total_hashes as f64 / secs
        } else {
            0.0
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        format_rate(self.hash_rate())
    }
}

fn format_rate(rate: f64) -> String {
    if rate >= 1_000_000_000.0 {
        format!("{:.2} GH/s", rate / 1_000_000_000.0)
    } else if rate >= 1_000_000.0 {
        format!("{:.2} MH/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.2} KH/s", rate / 1_000.0)
    } else {
        format!("{:.2} H/s", rate)
    }
}

/// Coordinates the cache, allocator, worker pool and submissions.
pub struct Miner<R: NodeRpc> {
    rpc: R,
    config: MinerConfig,
    payout: PayoutScript,
    cache: TemplateCache,
    allocator: NonceAllocator,
    pool: WorkerPool,
    work: Option<Arc<Work>>,
    stats: MiningStats,
    last_report: Instant,
}

impl<R: NodeRpc> Miner<R> {
    /// Spawn the worker pool and set up an empty template cache.
    pub fn new(rpc: R, config: MinerConfig, payout: PayoutScript) -> io::Result<Self> {
        let pool = WorkerPool::new(config.threads)?;
        let cache = TemplateCache::new(
            config.template_refresh,
            Backoff::new(config.backoff_base, config.backoff_max),
        );
        let allocator = NonceAllocator::new(config.nonce_range_size);

        Ok(Miner {
            rpc,
            config,
            payout,
            cache,
            allocator,
            pool,
            work: None,
            stats: MiningStats::new(),
            last_report: Instant::now(),
        })
    }

    /// Mine forever.
    pub fn run(&mut self) {
        info!(
            threads = self.pool.size(),
            range_size = self.allocator.range_size(),
            placeholder_payout = self.payout.is_placeholder(),
            "Mining started"
        );

        loop {
            let pause = match self.run_wave() {
                WaveOutcome::NoTemplate => self.config.idle_pause,
                _ => self.config.wave_pause,
            };
            self.maybe_report();
            thread::sleep(pause);
        }
    }

    /// Run one dispatch wave: at most one range per worker.
    pub fn run_wave(&mut self) -> WaveOutcome {
        let Some(snapshot) = self.cache.get(&self.rpc) else {
            return WaveOutcome::NoTemplate;
        };
        let work = self.work_for(&snapshot);

        let mut dispatched = 0;
        for _ in 0..self.pool.size() {
            let Some(range) = self.allocator.allocate() else {
                break;
            };
            if self.pool.dispatch(range, &work) {
                dispatched += 1;
            }
        }

        if dispatched == 0 {
            warn!(height = work.height, "Nonce space exhausted, forcing template refresh");
            self.cache.invalidate();
            self.allocator.reset();
            return WaveOutcome::Exhausted;
        }

        let reports = self.pool.collect(dispatched);
        let hashes: u64 = reports.iter().map(|r| r.result.hashes_computed).sum();
        self.stats.total_hashes += hashes;

        let winner = reports
            .into_iter()
            .find_map(|report| match (report.result.nonce, report.result.hash) {
                (Some(nonce), Some(hash)) if report.result.found => Some((report, nonce, hash)),
                _ => None,
            });

        let Some((report, nonce, hash)) = winner else {
            return WaveOutcome::Searched { hashes };
        };
        debug!(
            worker = report.worker,
            range_start = report.range.start(),
            range_end = report.range.end(),
            nonce,
            "Winning range"
        );

        self.stats.blocks_found += 1;
        let submission = submit_solution(&self.rpc, &work, nonce, &hash).ok();
        if submission == Some(SubmitOutcome::Accepted) {
            self.stats.blocks_accepted += 1;
        }

        self.allocator.reset();
        self.cache.invalidate();

        WaveOutcome::Found { nonce, submission }
    }

    /// Work for the snapshot, rebuilt only when the template generation changes.
    fn work_for(&mut self, snapshot: &TemplateSnapshot) -> Arc<Work> {
        if let Some(work) = &self.work {
            if work.generation == snapshot.generation {
                return Arc::clone(work);
            }
        }

        let work = Arc::new(build_work(snapshot, &self.config.coinbase_tag, &self.payout));
        self.allocator.reset();

        let template = &snapshot.template;
        if bits_to_target(template.compact_bits()) != template.target {
            warn!(
                height = template.height,
                bits = %hex::encode(template.bits),
                "Template target does not match its compact bits; mining against target"
            );
        }
        info!(
            height = template.height,
            difficulty = %format_difficulty(template.difficulty()),
            prev = %hex::encode(template.previous_block_hash),
            "New work"
        );

        self.work = Some(Arc::clone(&work));
        work
    }

    fn maybe_report(&mut self) {
        if self.last_report.elapsed() < REPORT_INTERVAL {
            return;
        }
        self.last_report = Instant::now();
        info!(
            hashrate = %self.stats.format_hash_rate(),
            total_hashes = self.stats.total_hashes,
            blocks_found = self.stats.blocks_found,
            blocks_accepted = self.stats.blocks_accepted,
            "Mining status"
        );
    }

    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }
}

/// Build the coinbase and header preimage for a template.
pub fn build_work(snapshot: &TemplateSnapshot, tag: &[u8], payout: &PayoutScript) -> Work {
    let template = &snapshot.template;
    let coinbase = CoinbaseBuilder::new(template.height, tag, payout.as_bytes()).build();
    let preimage = HeaderPreimage::assemble(template, &coinbase);

    Work {
        generation: snapshot.generation,
        height: template.height,
        preimage,
        target: template.target,
        coinbase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::rpc::AddressInfo;
    use miner_core::BlockTemplate;
    use std::cell::Cell;

    /// Serves an unsolvable template and counts fetches.
    #[derive(Default)]
    struct StaticNode {
        fetches: Cell<u32>,
    }

    impl NodeRpc for StaticNode {
        fn get_new_address(&self) -> Result<String, RpcError> {
            unreachable!()
        }

        fn validate_address(&self, _address: &str) -> Result<AddressInfo, RpcError> {
            unreachable!()
        }

        fn get_block_template(&self) -> Result<BlockTemplate, RpcError> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(BlockTemplate {
                version: 0x20000000,
                previous_block_hash: [0u8; 32],
                curtime: 1_700_000_000 + self.fetches.get(),
                bits: [0x20, 0x7f, 0xff, 0xff],
                target: [0u8; 32],
                height: 200,
            })
        }

        fn submit_block(&self, _block_hex: &str) -> Result<SubmitOutcome, RpcError> {
            unreachable!("nothing can be found against a zero target")
        }
    }

    #[test]
    fn test_exhausted_nonce_space_forces_refresh() {
        let config = MinerConfig {
            threads: 1,
            nonce_range_size: 1000,
            ..MinerConfig::default()
        };
        let payout = PayoutScript::new(vec![0x51]);
        let mut miner = Miner::new(StaticNode::default(), config, payout).unwrap();

        assert_eq!(miner.run_wave(), WaveOutcome::Searched { hashes: 1000 });
        assert_eq!(miner.rpc().fetches.get(), 1);

        // Use up the rest of the 32-bit nonce space.
        while miner.allocator.allocate().is_some() {}

        assert_eq!(miner.run_wave(), WaveOutcome::Exhausted);
        assert_eq!(miner.rpc().fetches.get(), 1);

        // The cache was invalidated, so the next wave mines a fresh template
        // from nonce 0 again.
        assert_eq!(miner.run_wave(), WaveOutcome::Searched { hashes: 1000 });
        assert_eq!(miner.rpc().fetches.get(), 2);
        assert_eq!(miner.allocator.allocate().map(|range| range.start()), Some(1000));
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(12.0), "12.00 H/s");
        assert_eq!(format_rate(2_500.0), "2.50 KH/s");
        assert_eq!(format_rate(3_000_000.0), "3.00 MH/s");
        assert_eq!(format_rate(1_200_000_000.0), "1.20 GH/s");
    }

    #[test]
    fn test_build_work_matches_template() {
        let template = BlockTemplate::from_hex_fields(
            0x20000000,
            "0000000000000000000000000000000000000000000000000000000000000001",
            1_690_000_000,
            "1d00ffff",
            "00000000ffff0000000000000000000000000000000000000000000000000000",
            100,
        )
        .unwrap();
        let snapshot = TemplateSnapshot {
            generation: 3,
            template: Arc::new(template.clone()),
        };
        let payout = PayoutScript::new(vec![0u8; 20]);

        let work = build_work(&snapshot, b"TEST", &payout);
        let coinbase = CoinbaseBuilder::new(100, b"TEST", &[0u8; 20]).build();

        assert_eq!(work.generation, 3);
        assert_eq!(work.height, 100);
        assert_eq!(work.target, template.target);
        assert_eq!(work.coinbase, coinbase);
        assert_eq!(work.preimage, HeaderPreimage::assemble(&template, &coinbase));
    }
}
