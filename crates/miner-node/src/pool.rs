//! Fixed pool of hashing threads.
//!
//! Workers pull `(range, work)` jobs from a shared channel, run
//! [`miner_core::search`] over the range to completion and report back on a
//! result channel. Results arrive in completion order, not dispatch order.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use miner_core::{search, CoinbaseTransaction, HeaderPreimage, MiningResult, NonceRange};
use tracing::{debug, error};

/// Everything derived from one template; read-only once built.
#[derive(Debug)]
pub struct Work {
    /// Template generation this work was built from.
    pub generation: u64,
    pub height: u32,
    pub preimage: HeaderPreimage,
    /// Big-endian 256-bit target.
    pub target: [u8; 32],
    pub coinbase: CoinbaseTransaction,
}

struct Job {
    range: NonceRange,
    work: Arc<Work>,
}

/// One worker's answer for one range.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub range: NonceRange,
    pub generation: u64,
    pub result: MiningResult,
}

/// N OS threads, each searching one range at a time.
pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    result_rx: Receiver<WorkerReport>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<WorkerReport>();

        let mut handles = Vec::with_capacity(threads);
        for worker in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("gbt-worker-{}", worker))
                .spawn(move || run_worker(worker, job_rx, result_tx))?;
            handles.push(handle);
        }

        Ok(WorkerPool {
            job_tx: Some(job_tx),
            result_rx,
            handles,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Queue one range for the next idle worker.
    ///
    /// Returns `false` if the workers are gone.
    pub fn dispatch(&self, range: NonceRange, work: &Arc<Work>) -> bool {
        let job = Job {
            range,
            work: Arc::clone(work),
        };
        self.job_tx
            .as_ref()
            .is_some_and(|tx| tx.send(job).is_ok())
    }

    /// Block until `count` reports have arrived, in completion order.
    ///
    /// Returns fewer if every worker has exited.
    pub fn collect(&self, count: usize) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(count);
        while reports.len() < count {
            match self.result_rx.recv() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    error!(expected = count, got = reports.len(), "Worker pool disconnected");
                    break;
                }
            }
        }
        reports
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop.
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_worker(worker: usize, jobs: Receiver<Job>, results: Sender<WorkerReport>) {
    debug!(worker, "Worker started");
    for job in jobs.iter() {
        let result = search(job.range, &job.work.preimage, &job.work.target);
        let report = WorkerReport {
            worker,
            range: job.range,
            generation: job.work.generation,
            result,
        };
        if results.send(report).is_err() {
            break;
        }
    }
    debug!(worker, "Worker stopped");
}
