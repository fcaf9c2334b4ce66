//! Background worker pool for generation and meshing closures.
//!
//! Jobs are submitted with a [`Ticket`] and run on OS threads fed by a bounded
//! crossbeam channel. Completions come back on an unbounded channel and are
//! drained by the single-threaded owner once per update. There is no
//! cancellation: a job runs to completion and its ticket decides on the main
//! thread whether the result is still wanted. A job that panics comes back as
//! [`StreamingError::JobPanicked`] and its worker keeps serving the queue.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use dashmap::DashMap;

use crate::error::StreamingError;
use crate::ticket::{ChunkCoord, Ticket};

/// A unit of background work.
pub type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

struct Task<T> {
    ticket: Ticket,
    job: Job<T>,
}

/// A finished job.
#[derive(Debug)]
pub struct Completion<T> {
    pub ticket: Ticket,
    pub output: Result<T, StreamingError>,
    /// Wall time spent running the job, in microseconds.
    pub elapsed_us: u64,
}

/// A submission the pool could not accept. The job is handed back so the
/// caller can retry it.
pub struct Rejected<T> {
    pub ticket: Ticket,
    pub job: Job<T>,
    pub error: StreamingError,
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("ticket", &self.ticket)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

pub struct WorkerPool<T: Send + 'static> {
    task_sender: Option<Sender<Task<T>>>,
    result_receiver: Receiver<Completion<T>>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Outstanding requests per chunk, for diagnostics.
    pending: Arc<DashMap<ChunkCoord, usize>>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `thread_count` workers accepting at most `capacity` queued or
    /// running jobs.
    pub fn new(thread_count: usize, capacity: usize) -> Result<Self, StreamingError> {
        let capacity = capacity.max(1);
        let (task_sender, task_receiver) = bounded::<Task<T>>(capacity);
        let (result_sender, result_receiver) = unbounded::<Completion<T>>();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut worker_handles = Vec::with_capacity(thread_count.max(1));
        for i in 0..thread_count.max(1) {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);

            let handle = std::thread::Builder::new()
                .name(format!("horizon-worker-{i}"))
                .spawn(move || {
                    while let Ok(Task { ticket, job }) = receiver.recv() {
                        let start = Instant::now();
                        let result = panic::catch_unwind(AssertUnwindSafe(job));
                        let output = result.map_err(|payload| {
                            let message = panic_message(payload.as_ref());
                            tracing::error!(
                                coord = %ticket.coord,
                                kind = ?ticket.kind,
                                %message,
                                "job panicked"
                            );
                            StreamingError::JobPanicked { message }
                        });
                        let elapsed_us = start.elapsed().as_micros() as u64;

                        // Decrement first so a drained result is never still counted.
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                        let _ = sender.send(Completion {
                            ticket,
                            output,
                            elapsed_us,
                        });
                    }
                })?;
            worker_handles.push(handle);
        }

        tracing::debug!(threads = worker_handles.len(), capacity, "worker pool started");

        Ok(Self {
            task_sender: Some(task_sender),
            result_receiver,
            worker_handles,
            pending: Arc::new(DashMap::new()),
            in_flight,
            capacity,
        })
    }

    /// Create a pool sized from the CPU count, leaving headroom for the
    /// update thread.
    pub fn with_defaults(capacity: usize) -> Result<Self, StreamingError> {
        Self::new(Self::default_thread_count(), capacity)
    }

    pub fn default_thread_count() -> usize {
        let cpus = num_cpus::get().max(2);
        (cpus - 1).max(1)
    }

    /// Queue a job. Fails without blocking when the pool is at capacity or
    /// shut down.
    pub fn submit(&self, ticket: Ticket, job: Job<T>) -> Result<(), Rejected<T>> {
        let Some(sender) = &self.task_sender else {
            return Err(Rejected {
                ticket,
                job,
                error: StreamingError::PoolClosed,
            });
        };

        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(Task { ticket, job }) {
            Ok(()) => {
                *self.pending.entry(ticket.coord).or_insert(0) += 1;
                Ok(())
            }
            Err(err) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                let error = match &err {
                    TrySendError::Full(_) => StreamingError::Saturated { in_flight },
                    TrySendError::Disconnected(_) => StreamingError::PoolClosed,
                };
                let task = err.into_inner();
                Err(Rejected {
                    ticket: task.ticket,
                    job: task.job,
                    error,
                })
            }
        }
    }

    /// Drain all completed jobs. Call once per update on the owning thread.
    pub fn drain_results(&self) -> Vec<Completion<T>> {
        let mut results = Vec::new();
        while let Ok(completion) = self.result_receiver.try_recv() {
            let coord = completion.ticket.coord;
            let now_empty = match self.pending.get_mut(&coord) {
                Some(mut count) => {
                    *count = count.saturating_sub(1);
                    *count == 0
                }
                None => false,
            };
            if now_empty {
                self.pending.remove_if(&coord, |_, count| *count == 0);
            }
            results.push(completion);
        }
        results
    }

    /// Jobs queued or running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Requests submitted for `coord` whose results have not been drained.
    pub fn pending_for(&self, coord: &ChunkCoord) -> usize {
        self.pending.get(coord).map(|c| *c).unwrap_or(0)
    }

    /// Number of chunks with outstanding requests.
    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn thread_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Close the queue and join every worker. Jobs already queued still run.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
