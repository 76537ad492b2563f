use log::{debug, info};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::DrainSettings;
use crate::formatter::BatchFormatter;
use crate::queue::EventDrain;
use crate::writer::RemoteWriter;

/// Decides when to empty the queue and ships what it drains.
///
/// A drain happens on a tick when the queue is not empty and either
/// `threshold_time` has passed since the previous drain or at least
/// `max_batch_size` events are waiting. Writes run inline, so at most one
/// batch is in flight.
pub struct DrainScheduler {
    drain: EventDrain,
    formatter: BatchFormatter,
    writer: RemoteWriter,
    settings: DrainSettings,
    last_drain: Instant,
}

impl DrainScheduler {
    pub fn new(drain: EventDrain, formatter: BatchFormatter, writer: RemoteWriter, settings: DrainSettings) -> Self {
        DrainScheduler {
            drain,
            formatter,
            writer,
            settings: settings.sanitized(),
            last_drain: Instant::now(),
        }
    }

    pub fn writer(&self) -> &RemoteWriter {
        &self.writer
    }

    pub fn should_drain(&self, now: Instant) -> bool {
        if self.drain.is_empty() {
            return false;
        }
        now.duration_since(self.last_drain) >= self.settings.threshold_time
            || self.drain.len() >= self.settings.max_batch_size
    }

    /// Ships everything currently queued. Returns the number of events taken.
    pub async fn drain_once(&mut self) -> usize {
        let events = self.drain.drain_all();
        let count = events.len();
        if count > 0 {
            debug!("Draining {} queued event(s)", count);
            let batch = self.formatter.format(events);
            self.writer.write(&batch).await;
        }
        self.last_drain = Instant::now();
        count
    }

    /// Runs until `cancel` fires, then hands the queue back.
    ///
    /// A pass that drained checks again at once; an idle pass waits for the
    /// next tick. Cancellation only interrupts that wait, so a write in
    /// progress finishes first. Events still queued are not flushed.
    pub async fn run(mut self, cancel: CancellationToken) -> EventDrain {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.should_drain(Instant::now()) {
                self.drain_once().await;
                ticker.reset_immediately();
            }
        }

        info!("Queue processing stopped for {}", self.writer.identity());
        self.drain
    }
}
