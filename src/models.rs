use crate::utilities::now_millis;

pub type SendableError = Box<dyn std::error::Error + Send + Sync>;

/// A log call captured by the appender, owned so it can cross into the
/// worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_millis: i64,
    pub level: log::Level,
    pub target: String,
    pub message: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl LogEvent {
    pub fn new(level: log::Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp_millis: now_millis(),
            level,
            target: target.into(),
            message: message.into(),
            module_path: None,
            file: None,
            line: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }

    pub fn from_record(record: &log::Record) -> Self {
        LogEvent {
            timestamp_millis: now_millis(),
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            module_path: record.module_path().map(str::to_string),
            file: record.file().map(str::to_string),
            line: record.line(),
        }
    }
}

/// A rendered event ready to be sent as a CloudWatch `InputLogEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub timestamp_millis: i64,
}

impl LogRecord {
    pub fn new(message: impl Into<String>, timestamp_millis: i64) -> Self {
        LogRecord {
            message: message.into(),
            timestamp_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_record_copies_metadata() {
        let event = LogEvent::from_record(
            &log::Record::builder()
                .level(log::Level::Warn)
                .target("billing")
                .args(format_args!("charge {} failed", 42))
                .module_path(Some("billing::charge"))
                .file(Some("src/charge.rs"))
                .line(Some(17))
                .build(),
        );

        assert_eq!(event.level, log::Level::Warn);
        assert_eq!(event.target, "billing");
        assert_eq!(event.message, "charge 42 failed");
        assert_eq!(event.module_path.as_deref(), Some("billing::charge"));
        assert_eq!(event.file.as_deref(), Some("src/charge.rs"));
        assert_eq!(event.line, Some(17));
        assert!(event.timestamp_millis > 0);
    }
}
