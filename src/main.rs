mod cli;

use std::path::Path;
use std::time::{Duration, SystemTime};

use clap::Parser;
use cli::AppConfig;
use cloudwatch_appender::{AppenderConfig, CloudWatchAppender, LogEvent, SendableError};
use colored::{ColoredString, Colorize};
use log::{info, warn, Level, LevelFilter};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

const INPUT_TARGET: &str = "cwship::input";

fn colored_level(level: Level) -> ColoredString {
    match level {
        Level::Error => level.as_str().red(),
        Level::Warn => level.as_str().yellow(),
        Level::Info => level.as_str().green(),
        Level::Debug => level.as_str().blue(),
        Level::Trace => level.as_str().normal(),
    }
}

pub fn setup_logger(appender: &CloudWatchAppender, level: LevelFilter) -> Result<(), SendableError> {
    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                colored_level(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .chain(console)
        .chain(Box::new(appender.clone()) as Box<dyn log::Log>)
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SendableError> {
    let app_config = AppConfig::parse();
    let drain_settings = app_config.drain_settings()?;
    let drain_timeout = app_config.drain_timeout()?;

    let config = AppenderConfig::new(app_config.cloudwatch_config())
        .drain(drain_settings)
        .level(app_config.log_level);
    let appender = CloudWatchAppender::new(config);

    setup_logger(&appender, app_config.log_level)?;
    info!("Starting cwship with args: {:?}", app_config);

    appender.start()?;

    let shipped = match &app_config.input {
        Some(path) => ship_lines(&appender, open(path).await?, drain_settings.poll_interval).await?,
        None => ship_lines(&appender, Box::new(tokio::io::stdin()), drain_settings.poll_interval).await?,
    };
    info!("Queued {} line(s), {} dropped", shipped, appender.dropped_events());

    wait_for_drain(&appender, drain_timeout, drain_settings.poll_interval).await;
    appender.stop();

    info!("Done!");
    Ok(())
}

async fn open(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>, SendableError> {
    let file = tokio::fs::File::open(path).await?;
    Ok(Box::new(file))
}

/// Queues every line of `input`, waiting for room instead of dropping lines.
async fn ship_lines(
    appender: &CloudWatchAppender,
    input: Box<dyn AsyncRead + Unpin + Send>,
    poll_interval: Duration,
) -> Result<usize, SendableError> {
    let capacity = appender.config().drain.queue_capacity.max(1);
    let mut lines = BufReader::new(input).lines();
    let mut shipped = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        while appender.pending() >= capacity {
            tokio::time::sleep(poll_interval).await;
        }
        if appender.append(LogEvent::new(Level::Info, INPUT_TARGET, line)) {
            shipped += 1;
        }
    }
    Ok(shipped)
}

async fn wait_for_drain(appender: &CloudWatchAppender, timeout: Duration, poll_interval: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while appender.pending() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(poll_interval).await;
    }
    if appender.pending() > 0 {
        warn!("{} line(s) still queued after {:?}, they will be discarded", appender.pending(), timeout);
    }
}
