use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use log::{error, info, warn, Metadata, Record};
use tokio_util::sync::CancellationToken;

use crate::aws::CloudWatchLogsService;
use crate::config::AppenderConfig;
use crate::error::AppenderError;
use crate::formatter::BatchFormatter;
use crate::models::LogEvent;
use crate::queue::{self, EventDrain, EventQueue, Rejected};
use crate::worker::DrainScheduler;
use crate::writer::{LogsService, RemoteWriter};

const WORKER_THREAD_NAME: &str = "cloudwatch-appender-worker";

/// Buffers log events and ships them to CloudWatch Logs from a background
/// thread.
///
/// Cloning is cheap and every clone feeds the same queue, so one clone can be
/// installed as a [`log::Log`] (directly or chained into `fern`) while another
/// is kept around to call [`stop`](CloudWatchAppender::stop).
///
/// Events still queued when the appender stops are discarded.
#[derive(Clone)]
pub struct CloudWatchAppender {
    inner: Arc<Inner>,
}

struct Inner {
    config: AppenderConfig,
    service: Option<Arc<dyn LogsService>>,
    queue: EventQueue,
    started: AtomicBool,
    dropped: AtomicU64,
    state: Mutex<State>,
}

struct State {
    drain: Option<EventDrain>,
    running: Option<Running>,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<EventDrain>,
}

impl CloudWatchAppender {
    /// Ships through the AWS SDK, configured from `config.cloudwatch`.
    pub fn new(config: AppenderConfig) -> Self {
        Self::build(config, None)
    }

    /// Ships through `service` instead of the AWS SDK.
    pub fn with_service(config: AppenderConfig, service: Arc<dyn LogsService>) -> Self {
        Self::build(config, Some(service))
    }

    fn build(config: AppenderConfig, service: Option<Arc<dyn LogsService>>) -> Self {
        let (queue, drain) = queue::bounded(config.drain.queue_capacity);
        CloudWatchAppender {
            inner: Arc::new(Inner {
                config,
                service,
                queue,
                started: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
                state: Mutex::new(State {
                    drain: Some(drain),
                    running: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &AppenderConfig {
        &self.inner.config
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Queues `event` for shipping. Never blocks; returns false when the
    /// event was dropped.
    pub fn append(&self, event: LogEvent) -> bool {
        if !self.is_started() {
            return false;
        }
        match self.inner.queue.try_offer(event) {
            Ok(()) => true,
            Err(Rejected::Full(event)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Log queue is full, discarding log event: {:?}", event);
                false
            }
            Err(Rejected::Closed(_)) => false,
        }
    }

    /// Spawns the worker thread. The worker resolves the stream identity,
    /// creates the group and stream if needed, then starts draining.
    pub fn start(&self) -> Result<(), AppenderError> {
        let mut state = self.inner.lock_state();
        if state.running.is_some() {
            return Err(AppenderError::AlreadyStarted);
        }
        let drain = state.drain.take().ok_or(AppenderError::QueueUnavailable)?;

        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                state.drain = Some(drain);
                return Err(AppenderError::Runtime(err));
            }
        };

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let config = self.inner.config.clone();
        let service = self.inner.service.clone();

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(run_worker(config, service, drain, worker_cancel)))
            .map_err(AppenderError::Spawn)?;

        state.running = Some(Running { cancel, handle });
        self.inner.started.store(true, Ordering::Release);
        info!("CloudWatch appender started");
        Ok(())
    }

    /// Stops the worker and waits for it. A write in progress completes;
    /// anything still queued is discarded.
    pub fn stop(&self) {
        self.inner.stop();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&self) {
        let mut state = self.lock_state();
        let Some(running) = state.running.take() else {
            return;
        };

        self.started.store(false, Ordering::Release);
        running.cancel.cancel();

        match running.handle.join() {
            Ok(mut drain) => {
                let discarded = drain.clear();
                if discarded > 0 {
                    warn!("Discarded {} queued log event(s) on stop", discarded);
                }
                state.drain = Some(drain);
                info!("CloudWatch appender stopped");
            }
            Err(_) => error!("CloudWatch appender worker panicked, queue is lost"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_worker(
    config: AppenderConfig,
    service: Option<Arc<dyn LogsService>>,
    drain: EventDrain,
    cancel: CancellationToken,
) -> EventDrain {
    let cloudwatch = config.cloudwatch;
    let setup = async {
        let identity = cloudwatch.resolve_identity().await;
        info!("Shipping logs to {}", identity);
        let service: Arc<dyn LogsService> = match service {
            Some(service) => service,
            None => Arc::new(CloudWatchLogsService::connect(&cloudwatch).await),
        };
        RemoteWriter::connect(service, identity, cloudwatch.retention_in_days).await
    };

    let writer = tokio::select! {
        _ = cancel.cancelled() => return drain,
        writer = setup => writer,
    };

    let formatter = BatchFormatter::new(config.renderer);
    DrainScheduler::new(drain, formatter, writer, config.drain)
        .run(cancel)
        .await
}

impl log::Log for CloudWatchAppender {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.inner.config.level && self.inner.config.accepts_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.append(LogEvent::from_record(record));
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    use crate::config::{CloudWatchConfig, DrainSettings};

    fn appender() -> CloudWatchAppender {
        let config = AppenderConfig::new(CloudWatchConfig::new().log_stream_name("unit"))
            .drain(DrainSettings {
                queue_capacity: 2,
                ..Default::default()
            })
            .level(log::LevelFilter::Warn);
        CloudWatchAppender::new(config)
    }

    fn event() -> LogEvent {
        LogEvent::new(log::Level::Error, "app", "boom")
    }

    #[test]
    fn append_before_start_is_dropped() {
        let appender = appender();
        assert!(!appender.append(event()));
        assert_eq!(appender.pending(), 0);
    }

    #[test]
    fn enabled_respects_level_and_targets() {
        let appender = appender();
        let warn = Metadata::builder().level(log::Level::Warn).target("app").build();
        let info = Metadata::builder().level(log::Level::Info).target("app").build();
        let own = Metadata::builder()
            .level(log::Level::Error)
            .target("cloudwatch_appender::writer")
            .build();

        assert!(appender.enabled(&warn));
        assert!(!appender.enabled(&info));
        assert!(!appender.enabled(&own));
    }

    #[test]
    fn stop_without_start_is_noop() {
        let appender = appender();
        appender.stop();
        assert!(!appender.is_started());
    }
}
