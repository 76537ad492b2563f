use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::config::StreamIdentity;
use crate::error::{PutEventsError, ServiceError};
use crate::models::LogRecord;

pub const MAX_ATTEMPTS: u32 = 3;

/// Result of creating a log group or stream.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    Failed(ServiceError),
}

/// The operations of the remote log service the appender relies on.
#[async_trait]
pub trait LogsService: Send + Sync {
    async fn create_log_group(&self, group: &str) -> CreateOutcome;

    async fn put_retention_policy(&self, group: &str, days: i32) -> Result<(), ServiceError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> CreateOutcome;

    /// Returns the token to send with the next write to the same stream.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, PutEventsError>;
}

/// Writes batches to one log stream.
///
/// The sequence token lives here and is only touched through `&mut self`, so
/// whoever owns the writer is the only one able to write.
pub struct RemoteWriter {
    service: Arc<dyn LogsService>,
    identity: StreamIdentity,
    sequence_token: Option<String>,
}

impl RemoteWriter {
    /// Creates the writer and makes sure the group and stream exist.
    pub async fn connect(service: Arc<dyn LogsService>, identity: StreamIdentity, retention_in_days: i32) -> Self {
        let writer = RemoteWriter {
            service,
            identity,
            sequence_token: None,
        };
        writer.bootstrap(retention_in_days).await;
        writer
    }

    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    pub fn sequence_token(&self) -> Option<&str> {
        self.sequence_token.as_deref()
    }

    async fn bootstrap(&self, retention_in_days: i32) {
        let group = &self.identity.group_name;
        let stream = &self.identity.stream_name;

        match self.service.create_log_group(group).await {
            CreateOutcome::Created => {
                info!("Created log group: {}", group);
                if retention_in_days > 0 {
                    if let Err(err) = self.service.put_retention_policy(group, retention_in_days).await {
                        error!("Failed to set retention of {} day(s) on log group '{}': {}", retention_in_days, group, err);
                    }
                }
            }
            CreateOutcome::AlreadyExists => debug!("Log group already exists: {}", group),
            CreateOutcome::Failed(err) => error!("Failed to create log group '{}': {}", group, err),
        }

        match self.service.create_log_stream(group, stream).await {
            CreateOutcome::Created => info!("Created log stream: {}/{}", group, stream),
            CreateOutcome::AlreadyExists => debug!("Log stream already exists: {}/{}", group, stream),
            CreateOutcome::Failed(err) => error!("Failed to create log stream '{}/{}': {}", group, stream, err),
        }
    }

    /// Sends one batch. Failures are logged and the batch is dropped.
    pub async fn write(&mut self, batch: &[LogRecord]) {
        if batch.is_empty() {
            return;
        }
        self.write_with_retry(batch, MAX_ATTEMPTS).await;
    }

    async fn write_with_retry(&mut self, batch: &[LogRecord], max_attempts: u32) {
        for attempt in 1..=max_attempts {
            let result = self
                .service
                .put_log_events(
                    &self.identity.group_name,
                    &self.identity.stream_name,
                    batch,
                    self.sequence_token.as_deref(),
                )
                .await;

            match result {
                Ok(next_token) => {
                    debug!("Wrote {} event(s) to {}", batch.len(), self.identity);
                    self.sequence_token = next_token;
                    return;
                }
                Err(PutEventsError::InvalidSequenceToken { expected }) => {
                    self.sequence_token = expected;
                    let retries_left = max_attempts - attempt;
                    if retries_left > 0 {
                        warn!("Invalid sequence token, retrying... Retries left: {}", retries_left);
                    }
                }
                Err(PutEventsError::DataAlreadyAccepted { expected }) => {
                    debug!("Batch of {} event(s) was already accepted by {}", batch.len(), self.identity);
                    self.sequence_token = expected;
                    return;
                }
                Err(PutEventsError::Service(err)) => {
                    error!("Dropping {} event(s) for {}: {}", batch.len(), self.identity, err);
                    return;
                }
            }
        }

        error!(
            "Failed to write {} event(s) to {} after {} attempts.",
            batch.len(),
            self.identity,
            max_attempts
        );
    }
}
