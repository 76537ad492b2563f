//! Buffers `log` records in memory and ships them in batches to an AWS
//! CloudWatch Logs stream from a background thread.
//!
//! ```no_run
//! use cloudwatch_appender::{AppenderConfig, CloudWatchAppender, CloudWatchConfig};
//!
//! let config = AppenderConfig::new(
//!     CloudWatchConfig::new()
//!         .log_group_name("my-service")
//!         .log_stream_name("${env:HOSTNAME}")
//!         .log_region("eu-west-1"),
//! );
//! let appender = CloudWatchAppender::new(config);
//! appender.start().expect("appender starts");
//! log::set_boxed_logger(Box::new(appender.clone())).expect("no other logger");
//! log::set_max_level(log::LevelFilter::Info);
//!
//! log::info!("hello from the app");
//!
//! appender.stop();
//! ```

#[macro_use]
extern crate lazy_static;

pub mod appender;
pub mod aws;
pub mod config;
pub mod error;
pub mod formatter;
pub mod models;
pub mod queue;
pub mod utilities;
pub mod worker;
pub mod writer;

pub use appender::CloudWatchAppender;
pub use config::{AppenderConfig, CloudWatchConfig, DrainSettings, StreamIdentity};
pub use error::{AppenderError, PutEventsError, ServiceError};
pub use formatter::{Encoder, Layout, PatternLayout, Renderer};
pub use models::{LogEvent, LogRecord, SendableError};
pub use writer::{CreateOutcome, LogsService};
