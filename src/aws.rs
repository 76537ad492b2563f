use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{imds, Region, SdkConfig};
use aws_sdk_cloudwatchlogs::config::Credentials;
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::operation::put_log_events::PutLogEventsError;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use log::{debug, error, info, warn};

use crate::config::CloudWatchConfig;
use crate::error::{PutEventsError, ServiceError};
use crate::models::LogRecord;
use crate::writer::{CreateOutcome, LogsService};

const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const IMDS_TIMEOUT: Duration = Duration::from_millis(500);
const CREDENTIALS_PROVIDER_NAME: &str = "cloudwatch-appender";

lazy_static! {
    static ref KNOWN_REGIONS: HashSet<&'static str> = [
        // Americas
        "us-east-1", "us-east-2", "us-west-1", "us-west-2",
        "ca-central-1", "ca-west-1", "mx-central-1", "sa-east-1",
        // Europe, Middle East, Africa
        "eu-central-1", "eu-central-2", "eu-west-1", "eu-west-2", "eu-west-3",
        "eu-south-1", "eu-south-2", "eu-north-1",
        "il-central-1", "me-central-1", "me-south-1", "af-south-1",
        // Asia Pacific
        "ap-east-1", "ap-south-1", "ap-south-2",
        "ap-southeast-1", "ap-southeast-2", "ap-southeast-3",
        "ap-southeast-4", "ap-southeast-5", "ap-southeast-7",
        "ap-northeast-1", "ap-northeast-2", "ap-northeast-3",
        // Isolated partitions
        "us-gov-east-1", "us-gov-west-1", "cn-north-1", "cn-northwest-1",
    ]
    .into_iter()
    .collect();
}

fn is_known_region(region: &str) -> bool {
    KNOWN_REGIONS.contains(region)
}

/// Endpoint overrides must be absolute URLs, e.g. `http://localhost:4566`.
pub fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    let uri = http::Uri::from_str(endpoint).map_err(|e| e.to_string())?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err("scheme and host are required".to_string());
    }
    Ok(())
}

pub async fn build_config(config: &CloudWatchConfig) -> SdkConfig {
    let mut loader = aws_config::from_env();

    if let Some(region) = config.log_region.clone() {
        if !is_known_region(&region) {
            warn!("Region '{}' is not a known AWS region, using it as given", region);
        }
        loader = loader.region(Region::new(region));
    }

    if let Some(endpoint) = &config.cloudwatch_endpoint {
        match validate_endpoint(endpoint) {
            Ok(()) => loader = loader.endpoint_url(endpoint.as_str()),
            Err(err) => error!("Invalid endpoint URL: {}. Error: {}", endpoint, err),
        }
    }

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );
        loader = loader.credentials_provider(credentials);
    }

    loader.load().await
}

/// Looks up the EC2 instance id. `None` when not running on EC2.
pub async fn fetch_instance_id() -> Option<String> {
    let client = imds::Client::builder()
        .max_attempts(1)
        .connect_timeout(IMDS_TIMEOUT)
        .read_timeout(IMDS_TIMEOUT)
        .build();

    match client.get(INSTANCE_ID_PATH).await {
        Ok(instance_id) => {
            let instance_id: &str = instance_id.as_ref();
            Some(instance_id.to_string())
        }
        Err(err) => {
            debug!("No EC2 instance id available: {}", DisplayErrorContext(&err));
            None
        }
    }
}

/// [`LogsService`] backed by the CloudWatch Logs SDK client.
#[derive(Debug, Clone)]
pub struct CloudWatchLogsService {
    client: Client,
}

impl CloudWatchLogsService {
    pub fn new(client: Client) -> Self {
        CloudWatchLogsService { client }
    }

    pub async fn connect(config: &CloudWatchConfig) -> Self {
        info!("Creating CloudWatch Logs client");
        let sdk_config = build_config(config).await;
        CloudWatchLogsService::new(Client::new(&sdk_config))
    }
}

fn to_input_events(records: &[LogRecord]) -> Result<Vec<InputLogEvent>, ServiceError> {
    records
        .iter()
        .map(|record| {
            InputLogEvent::builder()
                .message(record.message.as_str())
                .timestamp(record.timestamp_millis)
                .build()
                .map_err(|e| ServiceError::new("PutLogEvents", e.to_string()))
        })
        .collect()
}

#[async_trait]
impl LogsService for CloudWatchLogsService {
    async fn create_log_group(&self, group: &str) -> CreateOutcome {
        match self.client.create_log_group().log_group_name(group).send().await {
            Ok(_) => CreateOutcome::Created,
            Err(err) => match err.as_service_error() {
                Some(e) if e.is_resource_already_exists_exception() => CreateOutcome::AlreadyExists,
                _ => CreateOutcome::Failed(ServiceError::new(
                    "CreateLogGroup",
                    DisplayErrorContext(&err).to_string(),
                )),
            },
        }
    }

    async fn put_retention_policy(&self, group: &str, days: i32) -> Result<(), ServiceError> {
        self.client
            .put_retention_policy()
            .log_group_name(group)
            .retention_in_days(days)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| ServiceError::new("PutRetentionPolicy", DisplayErrorContext(&err).to_string()))
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> CreateOutcome {
        let result = self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await;

        match result {
            Ok(_) => CreateOutcome::Created,
            Err(err) => match err.as_service_error() {
                Some(e) if e.is_resource_already_exists_exception() => CreateOutcome::AlreadyExists,
                _ => CreateOutcome::Failed(ServiceError::new(
                    "CreateLogStream",
                    DisplayErrorContext(&err).to_string(),
                )),
            },
        }
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        sequence_token: Option<&str>,
    ) -> Result<Option<String>, PutEventsError> {
        let events = to_input_events(records)?;

        let resp = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_log_events(Some(events))
            .set_sequence_token(sequence_token.map(str::to_string))
            .send()
            .await;

        match resp {
            Ok(output) => {
                if let Some(rejected) = output.rejected_log_events_info() {
                    warn!("CloudWatch rejected part of the batch: {:?}", rejected);
                }
                Ok(output.next_sequence_token().map(str::to_string))
            }
            Err(err) => Err(match err.into_service_error() {
                PutLogEventsError::InvalidSequenceTokenException(e) => PutEventsError::InvalidSequenceToken {
                    expected: e.expected_sequence_token().map(str::to_string),
                },
                PutLogEventsError::DataAlreadyAcceptedException(e) => PutEventsError::DataAlreadyAccepted {
                    expected: e.expected_sequence_token().map(str::to_string),
                },
                other => PutEventsError::Service(ServiceError::new(
                    "PutLogEvents",
                    DisplayErrorContext(&other).to_string(),
                )),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_regions_are_recognised() {
        for region in ["eu-west-1", "il-central-1", "ca-west-1", "ap-southeast-4", "us-gov-west-1"] {
            assert!(is_known_region(region), "{region}");
        }
        assert!(!is_known_region("mars-north-1"));
        assert!(!is_known_region(""));
    }

    #[test]
    fn endpoint_must_be_absolute() {
        assert!(validate_endpoint("http://localhost:4566").is_ok());
        assert!(validate_endpoint("https://logs.eu-west-1.amazonaws.com").is_ok());
        assert!(validate_endpoint("localhost:4566/path").is_err());
        assert!(validate_endpoint("not a url").is_err());
        assert!(validate_endpoint("").is_err());
    }

    #[test]
    fn records_map_to_input_events() {
        let events = to_input_events(&[LogRecord::new("hello", 42)]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), "hello");
        assert_eq!(events[0].timestamp(), 42);
    }
}
