use super::pool::{PoolHandle, WorkerPool};
use super::worker::{self, TransformFn};
use super::{BatchReport, Countdown, DispatcherOptions, GrayscaleOutput, ItemResult, Task};
use crate::error::{panic_message, GrayscaleError, ItemFailure};
use crate::source::ImageSource;
use smol::channel::Sender;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Called once per eligible item, in completion order.
pub type OnItem<'a> = Box<dyn FnMut(ItemResult) + 'a>;
/// Called once per batch, after the last item, with the batch length.
pub type OnComplete<'a> = Box<dyn FnOnce(usize) + 'a>;

/// Message from a pool job back to the batch that submitted it.
struct WorkerReply {
    index: usize,
    outcome: Result<GrayscaleOutput, GrayscaleError>,
}

enum Wake {
    Reply(Result<WorkerReply, smol::channel::RecvError>),
    Deadline(Duration),
}

/// Fans a batch of images out to the worker pool and collects the results.
pub struct Dispatcher {
    pool: WorkerPool,
    options: DispatcherOptions,
    transform: TransformFn,
}

impl Dispatcher {
    pub fn new(options: DispatcherOptions) -> Result<Self, GrayscaleError> {
        let pool = WorkerPool::new(options.workers)?;
        Ok(Self {
            pool,
            options,
            transform: worker::grayscale,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_transform(mut self, transform: TransformFn) -> Self {
        self.transform = transform;
        self
    }

    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Grayscale every image in `batch`, blocking until the batch is done.
    ///
    /// Items that are not images are skipped. Every other item produces
    /// exactly one call to `on_item`, either with the processed image or with
    /// the reason it failed; calls happen on this thread, in completion order.
    /// `on_complete` then runs exactly once with the batch length, skipped
    /// items included.
    pub fn process<'a>(
        &self,
        batch: impl IntoIterator<Item = ImageSource>,
        on_item: Option<OnItem<'a>>,
        on_complete: Option<OnComplete<'a>>,
    ) -> BatchReport {
        smol::block_on(self.process_async(batch, on_item, on_complete))
    }

    /// Async form of [`Dispatcher::process`]. Loading and transforming run on
    /// background threads; this future only waits for their replies.
    pub async fn process_async<'a>(
        &self,
        batch: impl IntoIterator<Item = ImageSource>,
        mut on_item: Option<OnItem<'a>>,
        on_complete: Option<OnComplete<'a>>,
    ) -> BatchReport {
        let start = Instant::now();
        let (reply_tx, reply_rx) = smol::channel::unbounded::<WorkerReply>();

        let mut report = BatchReport::default();
        let mut pending = BTreeSet::new();

        for (index, source) in batch.into_iter().enumerate() {
            report.total += 1;
            if !source.is_image() {
                log::debug!("Skipping item {}: {:?}", index, source);
                report.skipped.push(index);
                continue;
            }
            pending.insert(index);
            self.submit(index, source, reply_tx.clone());
        }
        // Only the submitted jobs hold senders now, so the channel closes
        // once every one of them has replied or been dropped.
        drop(reply_tx);

        let total = report.total;
        report.eligible = pending.len();
        log::info!(
            "Dispatched {} of {} item(s) to {} worker(s) ({} skipped)",
            report.eligible,
            total,
            self.pool.size(),
            report.skipped.len()
        );

        let mut countdown = Countdown::new(report.eligible);
        let deadline = self
            .options
            .batch_timeout
            .map(|timeout| (start + timeout, timeout));

        while !countdown.is_done() {
            let wake = match deadline {
                Some((at, timeout)) => {
                    smol::future::or(async { Wake::Reply(reply_rx.recv().await) }, async {
                        smol::Timer::at(at).await;
                        Wake::Deadline(timeout)
                    })
                    .await
                }
                None => Wake::Reply(reply_rx.recv().await),
            };

            match wake {
                Wake::Reply(Ok(WorkerReply { index, outcome })) => {
                    if !pending.remove(&index) {
                        log::warn!("Ignoring duplicate reply for item {}", index);
                        continue;
                    }
                    let result = outcome.map_err(|error| ItemFailure::new(index, error));
                    deliver(&mut report, &mut on_item, result);
                    countdown.tick();
                }
                Wake::Reply(Err(_)) => {
                    log::error!(
                        "Reply channel closed with {} item(s) outstanding",
                        countdown.remaining()
                    );
                    for index in std::mem::take(&mut pending) {
                        let failure = ItemFailure::new(index, GrayscaleError::WorkerLost);
                        deliver(&mut report, &mut on_item, Err(failure));
                        countdown.tick();
                    }
                }
                Wake::Deadline(timeout) => {
                    log::warn!(
                        "Batch timed out after {:?} with {} item(s) outstanding",
                        timeout,
                        countdown.remaining()
                    );
                    for index in std::mem::take(&mut pending) {
                        let failure = ItemFailure::new(index, GrayscaleError::TimedOut(timeout));
                        deliver(&mut report, &mut on_item, Err(failure));
                        countdown.tick();
                    }
                }
            }
        }

        log::info!(
            "Batch complete in {:?}: {} delivered, {} failed, {} skipped",
            start.elapsed(),
            report.delivered,
            report.failed.len(),
            report.skipped.len()
        );

        if let Some(on_complete) = on_complete {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || on_complete(total))) {
                log::error!("Completion callback panicked: {}", panic_message(payload.as_ref()));
            }
        }

        report
    }

    /// Load `source` off-thread, snapshot its pixels into a task and queue it.
    fn submit(&self, index: usize, source: ImageSource, reply: Sender<WorkerReply>) {
        let pool: PoolHandle = self.pool.handle();
        let transform = self.transform;

        smol::unblock(move || {
            let image = match source.load() {
                Ok(image) => image,
                Err(error) => {
                    let _ = reply.try_send(WorkerReply {
                        index,
                        outcome: Err(error),
                    });
                    return;
                }
            };

            let task = Task::from_image(index, image);
            log::debug!(
                "Queueing item {} ({}x{}), {} job(s) ahead",
                index,
                task.width,
                task.height,
                pool.queued()
            );

            let queued = pool.execute(move || {
                let outcome = worker::run_task(task, transform);
                let _ = reply.try_send(WorkerReply { index, outcome });
            });
            if let Err(e) = queued {
                log::error!("Could not queue item {}: {}", index, e);
            }
        })
        .detach();
    }
}

fn deliver(report: &mut BatchReport, on_item: &mut Option<OnItem<'_>>, result: ItemResult) {
    let index = match &result {
        Ok(output) => {
            report.delivered += 1;
            output.index
        }
        Err(failure) => {
            log::warn!("{}", failure);
            report.failed.push(failure.index);
            failure.index
        }
    };

    if let Some(callback) = on_item.as_mut() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(result))) {
            log::error!(
                "Item callback panicked on item {}: {}",
                index,
                panic_message(payload.as_ref())
            );
        }
    }
}
