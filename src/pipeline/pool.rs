//! Fixed-size pool of transform threads fed from a shared work queue.

use crate::error::{panic_message, GrayscaleError};
use smol::channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Job>,
}

impl PoolHandle {
    /// Queue a job. Fails once the pool has been shut down; the job is dropped.
    pub fn execute<F>(&self, job: F) -> Result<(), GrayscaleError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .try_send(Box::new(job))
            .map_err(|_| GrayscaleError::PoolClosed)
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

pub struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one).
    pub fn new(size: usize) -> Result<Self, GrayscaleError> {
        let size = size.max(1);
        let (sender, receiver) = smol::channel::unbounded::<Job>();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("graybatch-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))
                .map_err(GrayscaleError::Spawn)?;
            workers.push(worker);
        }

        log::info!("Started worker pool with {} threads", size);

        Ok(Self {
            handle: PoolHandle { sender },
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    pub fn execute<F>(&self, job: F) -> Result<(), GrayscaleError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.execute(job)
    }

    /// Stop accepting jobs, let the workers drain the queue, and join them.
    pub fn shutdown(&mut self) {
        self.handle.sender.close();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().map(str::to_string);
            if worker.join().is_err() {
                log::error!("Worker {:?} terminated abnormally", name);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv_blocking() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            log::error!("Worker {} job panicked: {}", id, panic_message(payload.as_ref()));
        }
    }
    log::debug!("Worker {} shutting down", id);
}
