//! In-memory stand-in for CloudWatch Logs

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use cloudwatch_appender::{CreateOutcome, LogRecord, LogsService, PutEventsError, ServiceError};

/// One `put_log_events` call as the service saw it.
#[derive(Debug, Clone)]
pub struct PutCall {
    pub group: String,
    pub stream: String,
    pub records: Vec<LogRecord>,
    pub sequence_token: Option<String>,
}

/// Records every call and answers `put_log_events` from a script. Once the
/// script runs out, writes succeed and hand out tokens `N1`, `N2`, ...
#[derive(Default)]
pub struct MockLogsService {
    responses: Mutex<VecDeque<Result<Option<String>, PutEventsError>>>,
    puts: Mutex<Vec<PutCall>>,
    created: Mutex<Vec<String>>,
}

impl MockLogsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, responses: impl IntoIterator<Item = Result<Option<String>, PutEventsError>>) {
        self.responses.lock().unwrap().extend(responses);
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().unwrap().clone()
    }

    pub fn shipped(&self) -> Vec<LogRecord> {
        self.puts().into_iter().flat_map(|put| put.records).collect()
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

pub fn conflict(expected: &str) -> Result<Option<String>, PutEventsError> {
    Err(PutEventsError::InvalidSequenceToken {
        expected: Some(expected.to_string()),
    })
}

pub fn accepted(token: &str) -> Result<Option<String>, PutEventsError> {
    Ok(Some(token.to_string()))
}

#[async_trait]
impl LogsService for MockLogsService {
    async fn create_log_group(&self, group: &str) -> CreateOutcome {
        self.created.lock().unwrap().push(group.to_string());
        CreateOutcome::Created
    }

    async fn put_retention_policy(&self, _group: &str, _days: i32) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> CreateOutcome {
        self.created.lock().unwrap().push(format!("{group}/{stream}"));
        CreateOutcome::Created
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, PutEventsError> {
        let mut puts = self.puts.lock().unwrap();
        puts.push(PutCall {
            group: group.to_string(),
            stream: stream.to_string(),
            records: records.to_vec(),
            sequence_token: sequence_token.map(str::to_string),
        });
        let call = puts.len();
        drop(puts);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(format!("N{call}"))))
    }
}
