mod common;

use std::sync::Arc;

use cloudwatch_appender::writer::{RemoteWriter, MAX_ATTEMPTS};
use cloudwatch_appender::{LogRecord, PutEventsError, ServiceError, StreamIdentity};
use common::mocks::{accepted, conflict, MockLogsService};

fn batch() -> Vec<LogRecord> {
    vec![LogRecord::new("first", 1), LogRecord::new("second", 2)]
}

async fn writer(service: &Arc<MockLogsService>) -> RemoteWriter {
    RemoteWriter::connect(service.clone(), StreamIdentity::new("orders", "api-1"), 30).await
}

#[tokio::test]
async fn bootstrap_creates_group_then_stream() {
    let service = Arc::new(MockLogsService::new());
    writer(&service).await;
    assert_eq!(service.created(), vec!["orders", "orders/api-1"]);
}

#[tokio::test]
async fn conflicting_tokens_converge_on_third_attempt() {
    let service = Arc::new(MockLogsService::new());
    service.script([conflict("T2"), conflict("T3"), accepted("T4")]);
    let mut writer = writer(&service).await;

    writer.write(&batch()).await;

    let puts = service.puts();
    let tokens: Vec<Option<&str>> = puts.iter().map(|p| p.sequence_token.as_deref()).collect();
    assert_eq!(tokens, vec![None, Some("T2"), Some("T3")]);
    assert!(puts.iter().all(|p| p.records == batch()));
    assert!(puts.iter().all(|p| p.group == "orders" && p.stream == "api-1"));
    assert_eq!(writer.sequence_token(), Some("T4"));
}

#[tokio::test]
async fn persistent_conflict_abandons_batch_after_three_attempts() {
    let service = Arc::new(MockLogsService::new());
    service.script((0..10).map(|n| conflict(&format!("C{n}"))));
    let mut writer = writer(&service).await;

    writer.write(&batch()).await;
    assert_eq!(service.puts().len(), MAX_ATTEMPTS as usize);
    assert_eq!(MAX_ATTEMPTS, 3);

    // The next batch starts from the last token the service disclosed.
    writer.write(&batch()).await;
    assert_eq!(service.puts()[3].sequence_token.as_deref(), Some("C2"));
}

#[tokio::test]
async fn transport_failure_drops_batch_without_retry() {
    let service = Arc::new(MockLogsService::new());
    service.script([Err(PutEventsError::Service(ServiceError::new(
        "PutLogEvents",
        "connection reset",
    )))]);
    let mut writer = writer(&service).await;

    writer.write(&batch()).await;
    assert_eq!(service.puts().len(), 1);
    assert_eq!(writer.sequence_token(), None);

    writer.write(&[LogRecord::new("later", 3)]).await;
    assert_eq!(service.puts().len(), 2);
    assert_eq!(writer.sequence_token(), Some("N2"));
}
