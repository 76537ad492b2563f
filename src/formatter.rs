use std::sync::Arc;

use chrono::SecondsFormat;

use crate::models::{LogEvent, LogRecord};
use crate::utilities::millis_to_datetime;

/// Maximum size of a single CloudWatch event message, in UTF-8 bytes.
/// See <https://docs.aws.amazon.com/AmazonCloudWatchLogs/latest/APIReference/API_InputLogEvent.html>.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;
const ELLIPSIS: &str = "...";
const PADDING: usize = 42;

/// Turns an event into raw bytes. Output is read back as UTF-8.
pub trait Encoder: Send + Sync {
    fn encode(&self, event: &LogEvent) -> Vec<u8>;
}

/// Turns an event into a line of text.
pub trait Layout: Send + Sync {
    fn do_layout(&self, event: &LogEvent) -> String;
}

/// The rendering capability picked once when the appender is configured.
pub enum Renderer {
    Encoder(Box<dyn Encoder>),
    Layout(Box<dyn Layout>),
}

impl Renderer {
    /// An encoder wins over a layout; with neither, [`PatternLayout`] is used.
    pub fn select(encoder: Option<Box<dyn Encoder>>, layout: Option<Box<dyn Layout>>) -> Self {
        match (encoder, layout) {
            (Some(encoder), _) => Renderer::Encoder(encoder),
            (None, Some(layout)) => Renderer::Layout(layout),
            (None, None) => Renderer::Layout(Box::new(PatternLayout)),
        }
    }

    pub fn render(&self, event: &LogEvent) -> String {
        match self {
            Renderer::Encoder(encoder) => String::from_utf8_lossy(&encoder.encode(event)).into_owned(),
            Renderer::Layout(layout) => layout.do_layout(event),
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::select(None, None)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Renderer::Encoder(_) => f.write_str("Renderer::Encoder"),
            Renderer::Layout(_) => f.write_str("Renderer::Layout"),
        }
    }
}

/// `[2024-01-01T00:00:00.000Z INFO target] message`
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternLayout;

impl Layout for PatternLayout {
    fn do_layout(&self, event: &LogEvent) -> String {
        format!(
            "[{} {} {}] {}",
            millis_to_datetime(event.timestamp_millis).to_rfc3339_opts(SecondsFormat::Millis, true),
            event.level,
            event.target,
            event.message
        )
    }
}

/// Renders drained events into a batch ready for the writer.
#[derive(Debug, Clone)]
pub struct BatchFormatter {
    renderer: Arc<Renderer>,
}

impl BatchFormatter {
    pub fn new(renderer: Arc<Renderer>) -> Self {
        BatchFormatter { renderer }
    }

    /// Output is ordered by timestamp; events with equal timestamps keep
    /// their drain order.
    pub fn format(&self, events: Vec<LogEvent>) -> Vec<LogRecord> {
        let mut records: Vec<LogRecord> = events
            .iter()
            .map(|event| {
                let message = ensure_not_larger_than_limit(self.renderer.render(event));
                LogRecord::new(message, event.timestamp_millis)
            })
            .collect();
        records.sort_by_key(|record| record.timestamp_millis);
        records
    }
}

/// Cuts `input` so its UTF-8 encoding fits in [`MAX_MESSAGE_SIZE`] bytes,
/// marking the cut with a trailing `...`.
///
/// The cut keeps `PADDING` bytes of headroom below the input length. Inputs
/// too large for that to land under the limit are cut relative to the limit.
pub(crate) fn ensure_not_larger_than_limit(input: String) -> String {
    let byte_length = input.len();
    if byte_length <= MAX_MESSAGE_SIZE {
        return input;
    }

    let mut cut_size = byte_length - PADDING - ELLIPSIS.len();
    if cut_size + ELLIPSIS.len() > MAX_MESSAGE_SIZE {
        cut_size = MAX_MESSAGE_SIZE - PADDING - ELLIPSIS.len();
    }
    // The byte after the cut may start or split a multi-byte char; whatever
    // decodes last is dropped.
    let mut trimmed = String::from_utf8_lossy(&input.as_bytes()[..cut_size + 1]).into_owned();
    trimmed.pop();
    trimmed.push_str(ELLIPSIS);
    trimmed
}
