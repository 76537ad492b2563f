use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use cloudwatch_appender::{CloudWatchConfig, DrainSettings, SendableError};
use log::LevelFilter;
use parse_duration::parse;

#[derive(Parser)]
#[command(
    name = "cwship",
    version,
    about = "Ship lines from stdin or a file to AWS CloudWatch Logs."
)]
pub struct AppConfig {
    /// File to read; stdin when omitted.
    pub input: Option<PathBuf>,

    #[arg(long, default_value = "logback")]
    pub log_group: String,

    /// Defaults to the EC2 instance id, else a UTC timestamp.
    #[arg(long)]
    pub log_stream: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long, requires = "secret_access_key")]
    pub access_key_id: Option<String>,

    #[arg(long, requires = "access_key_id")]
    pub secret_access_key: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub retention_days: i32,

    #[arg(long, default_value = "1s")]
    pub flush_interval: String,

    #[arg(long, default_value = "100ms")]
    pub poll_interval: String,

    #[arg(long, default_value_t = 100)]
    pub max_batch_size: usize,

    #[arg(long, default_value_t = 10_000)]
    pub queue_capacity: usize,

    /// How long to wait for queued lines to ship after the input ends.
    #[arg(long, default_value = "10s")]
    pub drain_timeout: String,

    #[arg(long)]
    pub no_instance_id: bool,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("input", &self.input)
            .field("log_group", &self.log_group)
            .field("log_stream", &self.log_stream)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("static_credentials", &self.access_key_id.is_some())
            .field("retention_days", &self.retention_days)
            .field("flush_interval", &self.flush_interval)
            .field("poll_interval", &self.poll_interval)
            .field("max_batch_size", &self.max_batch_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn parse_flag(flag: &str, value: &str) -> Result<Duration, SendableError> {
    parse(value).map_err(|e| format!("Failed to parse --{} '{}': {}", flag, value, e).into())
}

impl AppConfig {
    pub fn cloudwatch_config(&self) -> CloudWatchConfig {
        let mut config = CloudWatchConfig::new()
            .log_group_name(self.log_group.clone())
            .retention_in_days(self.retention_days)
            .lookup_instance_id(!self.no_instance_id);

        config.log_stream_name = self.log_stream.clone();
        config.log_region = self.region.clone();
        config.cloudwatch_endpoint = self.endpoint.clone();
        if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            config = config.credentials(key.clone(), secret.clone());
        }
        config
    }

    pub fn drain_settings(&self) -> Result<DrainSettings, SendableError> {
        Ok(DrainSettings {
            queue_capacity: self.queue_capacity,
            max_batch_size: self.max_batch_size,
            threshold_time: parse_flag("flush-interval", &self.flush_interval)?,
            poll_interval: parse_flag("poll-interval", &self.poll_interval)?,
        })
    }

    pub fn drain_timeout(&self) -> Result<Duration, SendableError> {
        parse_flag("drain-timeout", &self.drain_timeout)
    }
}
