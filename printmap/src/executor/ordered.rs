//! The ordered fetch executor.

use std::any::Any;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, OnceCell, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::buffer::CompletionBuffer;
use super::config::{ExecutorConfig, StopPolicy};
use super::error::ExecutorError;
use super::task::{FetchResult, FetchTask};
use crate::fetcher::{Fetch, FetchRequest};
use crate::http::FetchError;
use crate::update_peak;

/// A finished task on its way to the orderer.
///
/// The window permit stays attached until the result is released.
struct Completed {
    result: FetchResult,
    permit: OwnedSemaphorePermit,
}

struct SubmitState {
    sender: Option<mpsc::UnboundedSender<FetchTask>>,
    next_seq: u64,
}

struct Handles {
    workers: Vec<JoinHandle<()>>,
    orderer: Option<JoinHandle<()>>,
}

impl Handles {
    /// Waits for the workers, then the orderer. Finished handles are dropped
    /// as they complete, so an interrupted wait resumes where it left off.
    async fn join(&mut self) {
        while let Some(worker) = self.workers.last_mut() {
            let _ = worker.await;
            self.workers.pop();
        }
        if let Some(orderer) = self.orderer.as_mut() {
            let _ = orderer.await;
            self.orderer = None;
        }
    }
}

#[derive(Debug, Default)]
struct ExecutorStats {
    submitted: AtomicU64,
    released: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    buffered: AtomicUsize,
    peak_buffered: AtomicUsize,
}

/// Runs fetches on a fixed worker pool and releases results in submission
/// order.
///
/// # Example
///
/// ```ignore
/// let executor = OrderedFetchExecutor::start(ExecutorConfig::default(), fetcher)?;
/// let mut results = executor.results().unwrap();
///
/// for url in urls {
///     executor.submit(FetchRequest::get(url))?;
/// }
/// executor.stop().await?;
///
/// while let Some(result) = results.next().await {
///     // result.seq is 0, 1, 2, ...
/// }
/// ```
pub struct OrderedFetchExecutor {
    config: ExecutorConfig,
    submit: Mutex<SubmitState>,
    results: Mutex<Option<ResultStream>>,
    handles: tokio::sync::Mutex<Handles>,
    stop_outcome: OnceCell<Result<(), ExecutorError>>,
    cancel: CancellationToken,
    stats: Arc<ExecutorStats>,
}

impl OrderedFetchExecutor {
    /// Spawns the workers and the orderer on the current tokio runtime.
    pub fn start<F: Fetch>(config: ExecutorConfig, fetcher: Arc<F>) -> Result<Self, ExecutorError> {
        let workers = config.max_concurrency();
        if workers == 0 {
            return Err(ExecutorError::NoWorkers);
        }
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;

        let (task_tx, task_rx) = mpsc::unbounded_channel::<FetchTask>();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel::<Completed>();
        let (output_tx, output_rx) = mpsc::unbounded_channel::<FetchResult>();

        let queue = Arc::new(tokio::sync::Mutex::new(task_rx));
        let window = Arc::new(Semaphore::new(workers));
        let cancel = CancellationToken::new();
        let stats = Arc::new(ExecutorStats::default());

        let worker_handles = (0..workers)
            .map(|id| {
                runtime.spawn(run_worker(
                    id,
                    Arc::clone(&queue),
                    Arc::clone(&window),
                    Arc::clone(&fetcher),
                    completed_tx.clone(),
                    cancel.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();
        // Only workers hold senders, so the orderer ends once they all exit
        drop(completed_tx);

        let orderer = runtime.spawn(run_orderer(completed_rx, output_tx, Arc::clone(&stats)));

        info!(workers = workers, policy = ?config.stop_policy(), "Ordered fetch executor started");

        Ok(Self {
            config,
            submit: Mutex::new(SubmitState {
                sender: Some(task_tx),
                next_seq: 0,
            }),
            results: Mutex::new(Some(ResultStream {
                receiver: output_rx,
            })),
            handles: tokio::sync::Mutex::new(Handles {
                workers: worker_handles,
                orderer: Some(orderer),
            }),
            stop_outcome: OnceCell::new(),
            cancel,
            stats,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Queues a request and returns its sequence number.
    ///
    /// Sequence numbers start at 0 and increase by one per accepted request.
    pub fn submit(&self, request: FetchRequest) -> Result<u64, ExecutorError> {
        let mut state = self.submit.lock().map_err(|_| ExecutorError::Stopped)?;
        let seq = state.next_seq;
        let sender = state.sender.as_ref().ok_or(ExecutorError::Stopped)?;
        sender
            .send(FetchTask { seq, request })
            .map_err(|_| ExecutorError::Stopped)?;
        state.next_seq += 1;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(seq)
    }

    /// The ordered result stream. Available once; later calls return `None`.
    pub fn results(&self) -> Option<ResultStream> {
        self.results.lock().ok()?.take()
    }

    /// Stops with the configured policy.
    pub async fn stop(&self) -> Result<(), ExecutorError> {
        self.stop_with(self.config.stop_policy()).await
    }

    /// Closes submission and waits for the workers and the orderer.
    ///
    /// With [`StopPolicy::Cancel`] every unfinished task is released as a
    /// `Cancelled` failure. If the deadline passes, remaining work is
    /// cancelled and [`ExecutorError::StopTimeout`] is returned.
    ///
    /// Every call returns the outcome of the first stop to finish. A call made
    /// while another stop is waiting waits with it; a `Cancel` call still
    /// cancels the running work first.
    pub async fn stop_with(&self, policy: StopPolicy) -> Result<(), ExecutorError> {
        if let Ok(mut state) = self.submit.lock() {
            state.sender.take();
        }
        if policy == StopPolicy::Cancel {
            self.cancel.cancel();
        }

        self.stop_outcome
            .get_or_init(|| self.join_within_timeout())
            .await
            .clone()
    }

    async fn join_within_timeout(&self) -> Result<(), ExecutorError> {
        let timeout = self.config.stop_timeout();
        let mut handles = self.handles.lock().await;

        match tokio::time::timeout(timeout, handles.join()).await {
            Ok(()) => {
                info!(
                    submitted = self.submitted(),
                    released = self.released(),
                    peak_in_flight = self.peak_in_flight(),
                    peak_buffered = self.peak_buffered(),
                    "Ordered fetch executor stopped"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    in_flight = self.in_flight(),
                    "Executor stop timed out, cancelling remaining work"
                );
                self.cancel.cancel();
                Err(ExecutorError::StopTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Whether submission has been closed.
    pub fn is_stopped(&self) -> bool {
        self.submit
            .lock()
            .map(|state| state.sender.is_none())
            .unwrap_or(true)
    }

    pub fn submitted(&self) -> u64 {
        self.stats.submitted.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.stats.released.load(Ordering::Relaxed)
    }

    /// Fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Completed results waiting for an earlier sequence number.
    pub fn buffered(&self) -> usize {
        self.stats.buffered.load(Ordering::Relaxed)
    }

    pub fn peak_buffered(&self) -> usize {
        self.stats.peak_buffered.load(Ordering::Relaxed)
    }
}

impl Drop for OrderedFetchExecutor {
    fn drop(&mut self) {
        // Workers would otherwise keep fetching for nobody
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for OrderedFetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedFetchExecutor")
            .field("config", &self.config)
            .field("submitted", &self.submitted())
            .field("released", &self.released())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Results in ascending sequence order.
///
/// Ends once the executor has stopped and every submitted task has been
/// released.
#[derive(Debug)]
pub struct ResultStream {
    receiver: mpsc::UnboundedReceiver<FetchResult>,
}

impl ResultStream {
    /// Next released result, or `None` when the stream is finished.
    pub async fn next_result(&mut self) -> Option<FetchResult> {
        self.receiver.recv().await
    }
}

impl Stream for ResultStream {
    type Item = FetchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn run_worker<F: Fetch>(
    id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<FetchTask>>>,
    window: Arc<Semaphore>,
    fetcher: Arc<F>,
    completed: mpsc::UnboundedSender<Completed>,
    cancel: CancellationToken,
    stats: Arc<ExecutorStats>,
) {
    loop {
        // Dequeue and take a window permit under one lock so permits are
        // handed out in sequence order.
        let (task, permit) = {
            let mut queue = queue.lock().await;
            let Some(task) = queue.recv().await else {
                break;
            };
            let Ok(permit) = Arc::clone(&window).acquire_owned().await else {
                break;
            };
            (task, permit)
        };

        let outcome = if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            execute(&fetcher, &task, &cancel, &stats).await
        };

        if let Err(ref e) = outcome {
            debug!(worker = id, seq = task.seq, url = %task.request.url, error = %e, "Fetch failed");
        }

        let result = FetchResult::new(&task, outcome);
        if completed.send(Completed { result, permit }).is_err() {
            break;
        }
    }
    debug!(worker = id, "Worker exiting");
}

/// Runs one fetch in its own task so a panic becomes a failure value.
async fn execute<F: Fetch>(
    fetcher: &Arc<F>,
    task: &FetchTask,
    cancel: &CancellationToken,
    stats: &ExecutorStats,
) -> Result<bytes::Bytes, FetchError> {
    let current = stats.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
    update_peak(&stats.peak_in_flight, current);

    let fetcher = Arc::clone(fetcher);
    let request = task.request.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            outcome = fetcher.fetch(&request) => outcome,
        }
    });

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            warn!(seq = task.seq, url = %task.request.url, panic = %message, "Fetch panicked");
            Err(FetchError::Panicked(message))
        }
        Err(_) => Err(FetchError::Cancelled),
    };

    stats.in_flight.fetch_sub(1, Ordering::Relaxed);
    outcome
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_orderer(
    mut completed: mpsc::UnboundedReceiver<Completed>,
    output: mpsc::UnboundedSender<FetchResult>,
    stats: Arc<ExecutorStats>,
) {
    let mut buffer = CompletionBuffer::new();

    while let Some(Completed { result, permit }) = completed.recv().await {
        let seq = result.seq;
        if !buffer.insert(seq, (result, permit)) {
            warn!(seq = seq, "Dropping duplicate completion");
            continue;
        }
        update_peak(&stats.peak_buffered, buffer.len());

        while let Some((result, permit)) = buffer.pop_next() {
            // Receiver gone means nobody wants results; keep draining so the
            // window keeps moving.
            let _ = output.send(result);
            drop(permit);
            stats.released.fetch_add(1, Ordering::Relaxed);
        }
        stats.buffered.store(buffer.len(), Ordering::Relaxed);
    }

    if !buffer.is_empty() {
        warn!(
            buffered = buffer.len(),
            next_expected = buffer.next_expected(),
            "Orderer finished with unreleased results"
        );
    }
}
