use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn, LevelFilter};

use crate::aws;
use crate::formatter::{Encoder, Layout, Renderer};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::utilities::resolve_env_placeholder;

pub const DEFAULT_LOG_GROUP_NAME: &str = "logback";
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_THRESHOLD_TIME: Duration = Duration::from_millis(1000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Targets never shipped by default: the appender's own diagnostics and the
/// crates it calls while shipping.
pub const DEFAULT_EXCLUDED_TARGETS: &[&str] = &["cloudwatch_appender", "aws", "hyper", "h2", "rustls", "tokio"];

/// Where the appender writes and how it reaches CloudWatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudWatchConfig {
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
    pub log_region: Option<String>,
    pub cloudwatch_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// 0 leaves the group's retention untouched.
    pub retention_in_days: i32,
    /// Use the EC2 instance id as stream name when none is configured.
    pub lookup_instance_id: bool,
}

impl CloudWatchConfig {
    pub fn new() -> Self {
        CloudWatchConfig {
            lookup_instance_id: true,
            ..Default::default()
        }
    }

    pub fn log_group_name(mut self, name: impl Into<String>) -> Self {
        self.log_group_name = Some(name.into());
        self
    }

    pub fn log_stream_name(mut self, name: impl Into<String>) -> Self {
        self.log_stream_name = Some(name.into());
        self
    }

    pub fn log_region(mut self, region: impl Into<String>) -> Self {
        self.log_region = Some(region.into());
        self
    }

    pub fn cloudwatch_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cloudwatch_endpoint = Some(endpoint.into());
        self
    }

    pub fn credentials(mut self, access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn retention_in_days(mut self, days: i32) -> Self {
        self.retention_in_days = days;
        self
    }

    pub fn lookup_instance_id(mut self, enabled: bool) -> Self {
        self.lookup_instance_id = enabled;
        self
    }

    /// True when everything needed without ambient AWS configuration is set.
    pub fn is_configured(&self) -> bool {
        self.log_group_name.is_some()
            && self.log_stream_name.is_some()
            && self.log_region.is_some()
            && self.static_credentials().is_some()
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Group and stream names with placeholders resolved and defaults filled.
    pub async fn resolve_identity(&self) -> StreamIdentity {
        let group_name = self.resolved_group_name();
        let stream_name = match self.log_stream_name.as_deref() {
            Some(name) => resolve_env_placeholder(name),
            None => self.default_stream_name().await,
        };
        StreamIdentity::new(group_name, stream_name)
    }

    fn resolved_group_name(&self) -> String {
        resolve_env_placeholder(self.log_group_name.as_deref().unwrap_or(DEFAULT_LOG_GROUP_NAME))
    }

    async fn default_stream_name(&self) -> String {
        if self.lookup_instance_id {
            if let Some(instance_id) = aws::fetch_instance_id().await {
                info!("Using EC2 instance id as log stream name: {}", instance_id);
                return instance_id;
            }
        }
        timestamp_stream_name()
    }
}

/// Fallback stream name, e.g. `20240131T235959` (UTC).
pub fn timestamp_stream_name() -> String {
    Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamIdentity {
    pub group_name: String,
    pub stream_name: String,
}

impl StreamIdentity {
    pub fn new(group_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        StreamIdentity {
            group_name: group_name.into(),
            stream_name: stream_name.into(),
        }
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_name, self.stream_name)
    }
}

/// When the worker drains the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    pub queue_capacity: usize,
    pub max_batch_size: usize,
    pub threshold_time: Duration,
    pub poll_interval: Duration,
}

impl Default for DrainSettings {
    fn default() -> Self {
        DrainSettings {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            threshold_time: DEFAULT_THRESHOLD_TIME,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl DrainSettings {
    pub(crate) fn sanitized(mut self) -> Self {
        if self.poll_interval.is_zero() {
            warn!("Poll interval must be positive, using {:?}", DEFAULT_POLL_INTERVAL);
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        if self.max_batch_size == 0 {
            warn!("Max batch size must be positive, using {}", DEFAULT_MAX_BATCH_SIZE);
            self.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        }
        self
    }
}

/// Everything the appender needs, assembled once before `start`.
#[derive(Debug, Clone)]
pub struct AppenderConfig {
    pub cloudwatch: CloudWatchConfig,
    pub drain: DrainSettings,
    pub level: LevelFilter,
    pub excluded_targets: Vec<String>,
    pub renderer: Arc<Renderer>,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        AppenderConfig {
            cloudwatch: CloudWatchConfig::new(),
            drain: DrainSettings::default(),
            level: LevelFilter::Info,
            excluded_targets: DEFAULT_EXCLUDED_TARGETS.iter().map(|t| t.to_string()).collect(),
            renderer: Arc::new(Renderer::default()),
        }
    }
}

impl AppenderConfig {
    pub fn new(cloudwatch: CloudWatchConfig) -> Self {
        AppenderConfig {
            cloudwatch,
            ..Default::default()
        }
    }

    pub fn drain(mut self, drain: DrainSettings) -> Self {
        self.drain = drain;
        self
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn exclude_target(mut self, target: impl Into<String>) -> Self {
        self.excluded_targets.push(target.into());
        self
    }

    /// Picks the renderer; an encoder takes precedence over a layout.
    pub fn render_with(mut self, encoder: Option<Box<dyn Encoder>>, layout: Option<Box<dyn Layout>>) -> Self {
        self.renderer = Arc::new(Renderer::select(encoder, layout));
        self
    }

    /// Whether records from `target` may be shipped.
    pub fn accepts_target(&self, target: &str) -> bool {
        !self.excluded_targets.iter().any(|excluded| {
            target == excluded
                || target
                    .strip_prefix(excluded.as_str())
                    .is_some_and(|rest| rest.starts_with("::") || rest.starts_with('_') || rest.starts_with('-'))
        })
    }
}
