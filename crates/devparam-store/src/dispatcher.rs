//! Transfer dispatcher
//!
//! All backing-store I/O runs on one dedicated worker thread. Callers hand
//! a [`TransferRequest`] over a capacity-1 channel together with a private
//! completion channel, then block until the worker answers. The worker
//! answers every request exactly once, whether the transfer worked or not.
//!
//! With a single worker at most one transfer is ever in flight. Callers
//! that need a load/modify/flush sequence to be atomic still have to hold
//! their own lock across the whole sequence (see [`crate::cache`]).

use crate::raw_io::{self, BackingStore, TransferRequest};
use crossbeam_channel::{Receiver, Sender};
use devparam_common::{Direction, Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

struct Job {
    request: TransferRequest,
    done: Sender<Result<TransferRequest>>,
}

/// Transfer statistics
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub failures: AtomicU64,
}

impl DispatcherStats {
    /// Transfers attempted so far (successful or not)
    pub fn transfers(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
            + self.writes.load(Ordering::Relaxed)
            + self.failures.load(Ordering::Relaxed)
    }

    fn record(&self, direction: Direction, size: usize, ok: bool) {
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let (count, bytes) = match direction {
            Direction::Read => (&self.reads, &self.bytes_read),
            Direction::Write => (&self.writes, &self.bytes_written),
        };
        count.fetch_add(1, Ordering::Relaxed);
        bytes.fetch_add(size as u64, Ordering::Relaxed);
    }
}

/// Hands transfers to the I/O worker and waits for them
pub struct Dispatcher {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    /// Start the I/O worker for `store`
    pub fn new(store: Arc<dyn BackingStore>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(1);
        let stats = Arc::new(DispatcherStats::default());

        let worker_stats = Arc::clone(&stats);
        let worker = std::thread::Builder::new()
            .name("devparam-io".to_string())
            .spawn(move || run_worker(&*store, &receiver, &worker_stats))
            .map_err(|e| Error::internal(format!("failed to spawn I/O worker: {e}")))?;

        info!("param I/O worker started");

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            stats,
        })
    }

    /// Get statistics
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Submit one transfer and block until the worker has finished it
    ///
    /// There is no timeout: a stalled device blocks the caller.
    pub fn submit(&self, request: TransferRequest) -> Result<TransferRequest> {
        let sender = self.sender.as_ref().ok_or(Error::DispatcherClosed)?;
        let (done, completion) = crossbeam_channel::bounded(1);

        sender
            .send(Job { request, done })
            .map_err(|_| Error::DispatcherClosed)?;

        completion.recv().map_err(|_| Error::DispatcherClosed)?
    }

    /// Stop accepting work and wait for the worker to drain
    pub fn shutdown(&mut self) {
        // Closing the channel ends the worker loop once queued jobs are done
        drop(self.sender.take());

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("param I/O worker panicked");
            } else {
                info!("param I/O worker stopped");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(store: &dyn BackingStore, jobs: &Receiver<Job>, stats: &DispatcherStats) {
    for Job { mut request, done } in jobs {
        let result = raw_io::execute(store, &mut request);
        stats.record(request.direction, request.size(), result.is_ok());

        if done.send(result.map(|()| request)).is_err() {
            debug!("param transfer submitter went away");
        }
    }
}
