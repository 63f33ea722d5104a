//! # Task Management System
//!
//! A cross-platform pool of worker threads (native) or web workers (WASM) that runs
//! `Task`s away from the main loop.
//!
//! ## Architecture Overview
//! - `TaskManager`: owns the workers, distributes tasks and collects outputs
//! - `Task`: a unit of work producing an `Output`
//! - `TaskChannel`: task and result channels of one worker
//!
//! ## Platform-Specific Behavior
//!
//! ### Native (Desktop) Implementation
//! - Uses `std::thread` for true multi-threading
//! - Each worker has a dedicated channel for task distribution
//!
//! ### Web (WASM) Implementation
//! - Uses the `wasm_thread` crate to run workers as Web Workers
//! - Tasks are processed asynchronously but may not run in parallel
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The manager hands each task to the next worker with spare capacity,
//!    round-robin, or queues it when every worker is busy
//! 3. Workers process tasks and send the outputs back
//! 4. The main loop collects outputs with `process_completed_tasks()`, which
//!    never blocks, and refills idle workers with `process_queued_tasks()`
//!
//! There is no ordering guarantee between workers and no cancellation.

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use log::{info, warn};
pub use task::Task;

#[cfg(target_family = "wasm")]
mod wasm_imports {
    pub use wasm_thread as thread;
    pub use wasm_thread::JoinHandle;
}

#[cfg(target_family = "wasm")]
use self::wasm_imports::*;

#[cfg(not(target_family = "wasm"))]
use std::thread::{self, JoinHandle};

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives task outputs from worker
/// - `num_tasks_in_flight`: Tasks sent to the worker and not yet answered
/// - `_worker`: Handle to the worker thread (kept alive by this struct)
///
/// Dropping the channel closes `task_sender`, which ends the worker loop.
#[derive(Debug)]
pub struct TaskChannel<T: Task> {
    task_sender: Sender<T>,
    result_receiver: Receiver<T::Output>,
    num_tasks_in_flight: usize,
    _worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Further tasks wait in the manager's queue, so a slow worker does not
/// accumulate a backlog while others sit idle.
pub const MAX_TASKS_IN_FLIGHT: usize = 2;

impl<T: Task> TaskManager<T> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. On web targets, this
    ///   is typically 1-2 due to browser limitations.
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new(num_workers: usize) -> Self {
        info!(
            "Starting {num_workers} workers, available parallelism: {:?}",
            thread::available_parallelism()
        );

        let mut channels = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (task_tx, task_rx) = channel::<T>();
            let (result_tx, result_rx) = channel::<T::Output>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    if result_tx.send(task.process()).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::spawn(task_closure);

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                _worker: worker,
            });
        }

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Tasks sent to workers and not yet collected.
    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum()
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether every published task has been collected.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.in_flight() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent
    /// - `Err(task)` if the worker is gone, handing the task back for requeueing
    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds the next channel, round-robin from `current_channel`, that can
    /// accept a task.
    ///
    /// # Returns
    /// - `Some(usize)` index of an available channel
    /// - `None` if all channels are busy or there are no channels
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&idx| self.channels[idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately sent to a worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: T) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    warn!("Worker {channel_idx} is gone, queueing task");
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Sends queued tasks, oldest first, while workers have spare capacity.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Collects every output that has arrived, without blocking.
    ///
    /// # Returns
    /// Outputs grouped by worker, in arrival order per worker.
    pub fn process_completed_tasks(&mut self) -> Vec<T::Output> {
        let mut outputs = Vec::new();
        for channel in &mut self.channels {
            while let Ok(output) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                outputs.push(output);
            }
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Square(u64);

    impl Task for Square {
        type Output = u64;

        fn process(self) -> u64 {
            self.0 * self.0
        }
    }

    fn drain(manager: &mut TaskManager<Square>) -> Vec<u64> {
        let deadline = web_time::Instant::now() + Duration::from_secs(10);
        let mut outputs = Vec::new();
        while !manager.is_idle() && web_time::Instant::now() < deadline {
            outputs.extend(manager.process_completed_tasks());
            manager.process_queued_tasks();
            std::thread::sleep(Duration::from_millis(1));
        }
        outputs
    }

    #[test]
    fn every_task_is_answered_once() {
        let mut manager = TaskManager::new(3);
        for i in 0..50 {
            manager.publish_task(Square(i));
        }
        assert!(manager.queued() > 0);

        let mut outputs = drain(&mut manager);
        outputs.sort_unstable();
        let expected: Vec<u64> = (0..50).map(|i| i * i).collect();
        assert_eq!(outputs, expected);
        assert!(manager.is_idle());
    }

    #[test]
    fn dispatch_is_round_robin() {
        let mut manager = TaskManager::new(3);
        for i in 0..3 {
            assert!(manager.publish_task(Square(i)));
        }
        assert!(manager.channels.iter().all(|c| c.num_tasks_in_flight == 1));
        drain(&mut manager);
    }

    #[test]
    fn without_workers_tasks_stay_queued() {
        let mut manager = TaskManager::new(0);
        assert!(!manager.publish_task(Square(2)));
        manager.process_queued_tasks();
        assert_eq!(manager.queued(), 1);
        assert!(manager.process_completed_tasks().is_empty());
    }
}
