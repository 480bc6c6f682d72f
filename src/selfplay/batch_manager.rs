//! Broker between worker threads and the evaluator driver
//!
//! Request batches from every worker share one channel; each worker owns a
//! private inbox channel for its results. The driver polls `size` and
//! `next_pending`, evaluates, and posts results back with `deliver`, which
//! routes them by worker id.

use log::{error, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::data::TrainingExampleHistory;
use crate::game::Game;
use crate::mcts::SelfPlayConfig;
use crate::selfplay::batch::{RequestBatch, ResponseBatch};
use crate::selfplay::worker::{Worker, WorkerSummary};
use crate::{Result, SelfPlayError};

/// Game counters shared by every worker of a run
#[derive(Debug, Default)]
pub struct GameCounters {
    ongoing: AtomicUsize,
    completed: AtomicUsize,
}

/// Decrements the live-worker count when a worker thread ends, even by panic
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A worker's end of the broker: submit requests, wait for its own results
#[derive(Debug)]
pub struct WorkerLink {
    worker_id: usize,
    requests: Sender<RequestBatch>,
    inbox: Receiver<ResponseBatch>,
    pending: Arc<AtomicUsize>,
    counters: Arc<GameCounters>,
    timeout: Duration,
}

impl WorkerLink {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn submit(&self, batch: RequestBatch) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.requests.send(batch).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            SelfPlayError::Disconnected
        })
    }

    /// Blocks until this worker's next result arrives.
    ///
    /// # Errors
    /// - `EvaluationTimeout` if nothing arrives within the configured timeout
    /// - `Disconnected` if the broker is gone
    pub fn await_result(&self) -> Result<ResponseBatch> {
        self.inbox.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => SelfPlayError::EvaluationTimeout {
                worker_id: self.worker_id,
                waited: self.timeout,
            },
            RecvTimeoutError::Disconnected => SelfPlayError::Disconnected,
        })
    }

    pub fn games_started(&self, count: usize) {
        self.counters.ongoing.fetch_add(count, Ordering::SeqCst);
    }

    pub fn game_finished(&self) {
        self.counters.ongoing.fetch_sub(1, Ordering::SeqCst);
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Drops `count` unfinished games from the ongoing count without
    /// marking them completed
    pub fn games_abandoned(&self, count: usize) {
        self.counters.ongoing.fetch_sub(count, Ordering::SeqCst);
    }
}

pub struct BatchManager {
    requests_tx: Sender<RequestBatch>,
    requests_rx: Mutex<Receiver<RequestBatch>>,
    inboxes: Vec<Sender<ResponseBatch>>,
    /// Inbox receivers not yet handed to a worker
    unclaimed: Mutex<Vec<Option<Receiver<ResponseBatch>>>>,
    pending: Arc<AtomicUsize>,
    counters: Arc<GameCounters>,
    running: Arc<AtomicUsize>,
    handles: Mutex<Vec<(usize, JoinHandle<Result<WorkerSummary>>)>>,
    timeout: Duration,
}

impl BatchManager {
    /// Creates the request queue and one inbox per worker id in `0..num_workers`.
    pub fn new(num_workers: usize, timeout: Duration) -> Self {
        let (requests_tx, requests_rx) = mpsc::channel();
        let (inboxes, receivers): (Vec<_>, Vec<_>) = (0..num_workers)
            .map(|_| {
                let (tx, rx) = mpsc::channel();
                (tx, Some(rx))
            })
            .unzip();

        BatchManager {
            requests_tx,
            requests_rx: Mutex::new(requests_rx),
            inboxes,
            unclaimed: Mutex::new(receivers),
            pending: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(GameCounters::default()),
            running: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
            timeout,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.inboxes.len()
    }

    /// Hands out the link for `worker_id`; each inbox can be claimed once.
    pub fn worker_link(&self, worker_id: usize) -> Result<WorkerLink> {
        let mut unclaimed = self.unclaimed.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = unclaimed
            .get_mut(worker_id)
            .ok_or(SelfPlayError::UnknownWorker(worker_id))?;
        let inbox = slot.take().ok_or(SelfPlayError::InboxTaken(worker_id))?;

        Ok(WorkerLink {
            worker_id,
            requests: self.requests_tx.clone(),
            inbox,
            pending: Arc::clone(&self.pending),
            counters: Arc::clone(&self.counters),
            timeout: self.timeout,
        })
    }

    /// Starts one worker thread per inbox, each playing `config.batch_size` games.
    pub fn spawn_workers<G: Game>(
        &self,
        config: &SelfPlayConfig,
        history: Arc<TrainingExampleHistory>,
    ) -> Result<()> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);

        for worker_id in 0..self.num_workers() {
            let link = self.worker_link(worker_id)?;
            let config = config.clone();
            let history = Arc::clone(&history);
            let running = Arc::clone(&self.running);
            running.fetch_add(1, Ordering::SeqCst);

            let spawned = thread::Builder::new()
                .name(format!("selfplay-worker-{}", worker_id))
                .spawn(move || {
                    let _guard = RunningGuard(running);
                    Worker::<G>::new(link, &config, history).run()
                });
            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(e) => {
                    self.running.fetch_sub(1, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
        }

        info!("spawned {} self-play workers", self.num_workers());
        Ok(())
    }

    /// Queues a request batch; callable from any thread.
    pub fn submit(&self, batch: RequestBatch) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.requests_tx.send(batch).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            SelfPlayError::Disconnected
        })
    }

    /// Request batches waiting for the evaluator
    pub fn size(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Oldest pending request batch.
    ///
    /// # Errors
    /// `NoBatchAvailable` when the queue is empty.
    pub fn next_pending(&self) -> Result<RequestBatch> {
        let rx = self.requests_rx.lock().unwrap_or_else(PoisonError::into_inner);
        match rx.try_recv() {
            Ok(batch) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Ok(batch)
            }
            Err(TryRecvError::Empty) => Err(SelfPlayError::NoBatchAvailable),
            Err(TryRecvError::Disconnected) => Err(SelfPlayError::Disconnected),
        }
    }

    /// Waits up to `wait` for a request batch; `None` if none arrived.
    pub fn next_pending_timeout(&self, wait: Duration) -> Result<Option<RequestBatch>> {
        let rx = self.requests_rx.lock().unwrap_or_else(PoisonError::into_inner);
        match rx.recv_timeout(wait) {
            Ok(batch) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(batch))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SelfPlayError::Disconnected),
        }
    }

    /// Posts `batch` to the inbox of `batch.worker_id` only.
    ///
    /// # Errors
    /// - `UnknownWorker` for an id this manager never created
    /// - `Disconnected` if that worker has already exited
    pub fn deliver(&self, batch: ResponseBatch) -> Result<()> {
        let inbox = self
            .inboxes
            .get(batch.worker_id)
            .ok_or(SelfPlayError::UnknownWorker(batch.worker_id))?;
        inbox.send(batch).map_err(|_| SelfPlayError::Disconnected)
    }

    /// Games not yet finished across all workers
    pub fn ongoing_games(&self) -> usize {
        self.counters.ongoing.load(Ordering::SeqCst)
    }

    pub fn completed_games(&self) -> usize {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// True once every spawned worker thread has returned
    pub fn workers_finished(&self) -> bool {
        self.running.load(Ordering::SeqCst) == 0
    }

    /// Joins every spawned worker.
    ///
    /// All threads are joined even if one failed; the first failure is returned.
    pub fn join(&self) -> Result<Vec<WorkerSummary>> {
        let handles = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *handles)
        };

        let mut summaries = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (worker_id, handle) in handles {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(SelfPlayError::WorkerPanicked(worker_id)),
            };
            match outcome {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!("worker {} failed: {}", worker_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summaries),
        }
    }
}
