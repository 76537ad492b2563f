//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudwatch_appender::formatter::{BatchFormatter, Layout};
use cloudwatch_appender::queue::{self, EventQueue};
use cloudwatch_appender::worker::DrainScheduler;
use cloudwatch_appender::writer::RemoteWriter;
use cloudwatch_appender::{DrainSettings, LogEvent, Renderer, StreamIdentity};

use super::mocks::MockLogsService;

/// Renders only the message so tests can assert on it directly.
pub struct MessageLayout;

impl Layout for MessageLayout {
    fn do_layout(&self, event: &LogEvent) -> String {
        event.message.clone()
    }
}

pub fn message_renderer() -> Arc<Renderer> {
    Arc::new(Renderer::select(None, Some(Box::new(MessageLayout))))
}

pub fn event(timestamp: i64) -> LogEvent {
    LogEvent::new(log::Level::Info, "app", format!("event {timestamp}")).with_timestamp(timestamp)
}

pub async fn scheduler(service: Arc<MockLogsService>, settings: DrainSettings) -> (EventQueue, DrainScheduler) {
    let (queue, drain) = queue::bounded(settings.queue_capacity);
    let writer = RemoteWriter::connect(service, StreamIdentity::new("group", "stream"), 0).await;
    let formatter = BatchFormatter::new(message_renderer());
    (queue, DrainScheduler::new(drain, formatter, writer, settings))
}

/// Polls `condition` in real time until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
