//! Single-worker task scheduler that owns context-affined state.
//!
//! [`Scheduler::spawn`] starts one named worker thread and builds the state
//! `S` on it, so `S` never has to be `Send` and never leaves that thread.
//! Tasks are closures over `&mut S` sent through a bounded channel and run
//! strictly in submission order. Each task gets its own one-slot result
//! channel, wrapped in a [`TaskHandle`].
//!
//! A task that returns an error or panics does not stop the worker: the
//! failure is delivered to whoever waits on that task's handle.
//!
//! Submitters blocked on a full queue wait on a condition variable guarded by
//! the same lock that shutdown takes, so a task is never accepted once
//! shutdown has begun.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::error::RenderError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The pending result of a submitted task.
#[derive(Debug)]
#[must_use = "a task's result is only observed through its handle"]
pub struct TaskHandle<R> {
    rx: Receiver<Result<R, RenderError>>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task has run and returns its result.
    ///
    /// # Errors
    ///
    /// The task's own error, `RenderError::TaskPanicked` if it panicked, or
    /// `RenderError::SchedulerClosed` if the worker went away without
    /// running it.
    pub fn wait(self) -> Result<R, RenderError> {
        self.rx.recv().unwrap_or(Err(RenderError::SchedulerClosed))
    }

    /// Whether the result is ready, without blocking.
    pub fn is_finished(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// The submitting side of the queue, shared with the worker so it can wake
/// submitters when a slot frees up.
struct Intake<S> {
    sender: Mutex<Option<Sender<Job<S>>>>,
    space: Condvar,
}

impl<S> Intake<S> {
    fn notify_space(&self) {
        // Taking the lock orders this wakeup after any submitter that saw
        // a full queue has started waiting.
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner));
        self.space.notify_all();
    }
}

/// A FIFO queue serviced by exactly one worker thread that owns `S`.
pub struct Scheduler<S: 'static> {
    intake: Arc<Intake<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    name: String,
}

impl<S: 'static> Scheduler<S> {
    /// Spawns the worker thread and builds the state on it with `factory`.
    ///
    /// Returns once the state exists, so the first submitted task always
    /// sees it.
    ///
    /// # Errors
    ///
    /// `RenderError::WorkerSpawn` if the thread cannot be started, or the
    /// factory's own error (`RenderError::TaskPanicked` if it panicked);
    /// the worker has exited in either case.
    pub fn spawn<F>(name: &str, capacity: usize, factory: F) -> Result<Self, RenderError>
    where
        F: FnOnce() -> Result<S, RenderError> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded::<Job<S>>(capacity.max(1));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), RenderError>>(1);
        let thread_name = name.to_owned();
        let intake = Arc::new(Intake {
            sender: Mutex::new(Some(tx)),
            space: Condvar::new(),
        });
        let worker_intake = Arc::clone(&intake);

        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let built = panic::catch_unwind(AssertUnwindSafe(factory))
                    .unwrap_or_else(|payload| Err(RenderError::TaskPanicked(panic_message(&*payload))));
                let mut state = match built {
                    Ok(state) => state,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                info!(worker = %thread_name, "worker started");
                run_worker_loop(&rx, &worker_intake, &mut state);
                drop(state);
                info!(worker = %thread_name, "worker stopped");
            })
            .map_err(|e| RenderError::WorkerSpawn(e.to_string()))?;

        let worker_id = worker.thread().id();
        let ready = ready_rx.recv().unwrap_or(Err(RenderError::SchedulerClosed));
        if let Err(e) = ready {
            if worker.join().is_err() {
                warn!(worker = name, "worker panicked while exiting");
            }
            return Err(e);
        }

        Ok(Self {
            intake,
            worker: Mutex::new(Some(worker)),
            worker_id,
            name: name.to_owned(),
        })
    }

    /// Enqueues `task`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// `RenderError::SchedulerClosed` once shutdown has begun, including when
    /// it begins while this call is waiting for space.
    pub fn submit<R, F>(&self, task: F) -> Result<TaskHandle<R>, RenderError>
    where
        F: FnOnce(&mut S) -> Result<R, RenderError> + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let mut job: Job<S> = Box::new(move |state: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(state)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(&*payload);
                    error!("task panicked: {message}");
                    Err(RenderError::TaskPanicked(message))
                });
            // The submitter may have dropped its handle.
            let _ = result_tx.send(outcome);
        });

        let mut guard = self
            .intake
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            let Some(sender) = guard.as_ref() else {
                return Err(RenderError::SchedulerClosed);
            };
            match sender.try_send(job) {
                Ok(()) => return Ok(TaskHandle { rx: result_rx }),
                Err(TrySendError::Full(returned)) => {
                    job = returned;
                    guard = self
                        .intake
                        .space
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Err(TrySendError::Disconnected(_)) => return Err(RenderError::SchedulerClosed),
            }
        }
    }

    /// Stops accepting tasks, lets the worker finish everything already
    /// queued, then joins it. Later calls do nothing.
    pub fn shutdown(&self) {
        let sender = self
            .intake
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        self.intake.space.notify_all();
        debug!(worker = %self.name, "scheduler closed, draining");

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if thread::current().id() == self.worker_id {
                warn!(worker = %self.name, "shutdown requested from the worker itself, not joining");
                return;
            }
            if worker.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }

    /// Whether shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.intake
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Identity of the worker thread, fixed at construction.
    pub fn worker_thread_id(&self) -> ThreadId {
        self.worker_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: 'static> Drop for Scheduler<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker_loop<S>(rx: &Receiver<Job<S>>, intake: &Intake<S>, state: &mut S) {
    // recv fails once every sender is gone and the queue is empty.
    while let Ok(job) = rx.recv() {
        intake.notify_space();
        job(state);
    }
}
