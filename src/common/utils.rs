//! Utility functions for minidfs

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = match s.strip_suffix("ms") {
        Some(num) => (num, "ms"),
        None => s.split_at(s.len() - s.chars().last().map_or(0, char::len_utf8)),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let scaled = |factor: u64| {
        num.checked_mul(factor)
            .map(std::time::Duration::from_secs)
            .ok_or_else(|| crate::Error::InvalidConfig(format!("duration too large: {}", s)))
    };

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => scaled(60)?,
        "h" => scaled(3600)?,
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Convert a duration to whole seconds for second-granularity settings.
///
/// Zero and fractional values (e.g. `1500ms`) are rejected instead of
/// being truncated.
pub fn whole_seconds(name: &str, duration: std::time::Duration) -> crate::Result<u64> {
    if duration.subsec_nanos() != 0 {
        return Err(crate::Error::InvalidConfig(format!(
            "{} must be a whole number of seconds, got {:?}",
            name, duration
        )));
    }
    if duration.as_secs() == 0 {
        return Err(crate::Error::InvalidConfig(format!(
            "{} must be at least 1s",
            name
        )));
    }
    Ok(duration.as_secs())
}

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Worker liveness as seen by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Active,
    Inactive,
}

impl WorkerState {
    /// Should placement consider this worker?
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Active)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Active => write!(f, "active"),
            WorkerState::Inactive => write!(f, "inactive"),
        }
    }
}

/// Retry with exponential backoff
///
/// Only transport failures are retried; anything else is returned as-is.
pub async fn retry_with_backoff<F, Fut, T>(
    mut f: F,
    max_retries: usize,
    initial_delay: std::time::Duration,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::Result<T>>,
{
    let mut delay = initial_delay;

    for attempt in 0..max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(crate::Error::Transport(msg)) if attempt + 1 < max_retries => {
                tracing::warn!(
                    "Retry attempt {} failed: {}, retrying in {:?}",
                    attempt + 1,
                    msg,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    Err(crate::Error::Internal("Max retries exceeded".into()))
}

/// Validate a file name (non-empty, reasonable length, no control chars)
pub fn validate_file_name(name: &str) -> crate::Result<()> {
    if name.trim().is_empty() {
        return Err(crate::Error::MissingField("file_name".into()));
    }

    if name.len() > 1024 {
        return Err(crate::Error::InvalidArgument(
            "file_name too long (max 1024 bytes)".into(),
        ));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidArgument(
            "file_name contains invalid characters".into(),
        ));
    }

    Ok(())
}

/// Validate a block id before it is turned into a path on a worker
pub fn validate_block_id(block_id: &str) -> crate::Result<()> {
    if block_id.is_empty() {
        return Err(crate::Error::MissingField("block_id".into()));
    }

    if block_id.contains(['/', '\\']) || block_id.contains("..") {
        return Err(crate::Error::InvalidArgument(format!(
            "block_id must not contain path components: {}",
            block_id
        )));
    }

    if block_id.len() > 128 || block_id.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidArgument(format!(
            "invalid block_id: {:?}",
            block_id
        )));
    }

    Ok(())
}

/// Resolves on Ctrl-C; servers pass it to `with_graceful_shutdown`
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("500ms").unwrap(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(
            parse_duration("30s").unwrap(),
            std::time::Duration::from_secs(30)
        );
        assert_eq!(
            parse_duration("5m").unwrap(),
            std::time::Duration::from_secs(300)
        );
        assert_eq!(
            parse_duration("1h").unwrap(),
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_parse_duration_overflow_is_an_error() {
        let huge = format!("{}h", u64::MAX);
        assert!(matches!(
            parse_duration(&huge),
            Err(crate::Error::InvalidConfig(_))
        ));
        let huge = format!("{}m", u64::MAX / 2);
        assert!(matches!(
            parse_duration(&huge),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_whole_seconds() {
        use std::time::Duration;

        assert_eq!(whole_seconds("timeout", Duration::from_secs(30)).unwrap(), 30);
        assert_eq!(whole_seconds("timeout", Duration::from_millis(2000)).unwrap(), 2);
        assert!(matches!(
            whole_seconds("timeout", Duration::from_millis(1500)),
            Err(crate::Error::InvalidConfig(_))
        ));
        assert!(matches!(
            whole_seconds("timeout", Duration::from_millis(250)),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn test_worker_state() {
        assert!(WorkerState::Active.is_active());
        assert!(!WorkerState::Inactive.is_active());
        assert_eq!(WorkerState::Inactive.to_string(), "inactive");
        assert_eq!(
            serde_json::to_string(&WorkerState::Active).unwrap(),
            "\"active\""
        );
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("a.txt").is_ok());
        assert!(validate_file_name("dir/a.txt").is_ok());
        assert!(matches!(
            validate_file_name(""),
            Err(crate::Error::MissingField(_))
        ));
        assert!(validate_file_name(&"x".repeat(2000)).is_err());
        assert!(validate_file_name("bad\nname").is_err());
    }

    #[test]
    fn test_validate_block_id() {
        assert!(validate_block_id("0f8e5c2a-8d0b-4d7e-9a55-0d8e0b1f2a3c").is_ok());
        assert!(validate_block_id("").is_err());
        assert!(validate_block_id("../etc/passwd").is_err());
        assert!(validate_block_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_non_transport_errors() {
        let mut calls = 0;
        let res: crate::Result<()> = retry_with_backoff(
            || {
                calls += 1;
                async { Err(crate::Error::UnknownWorker("w1".into())) }
            },
            3,
            std::time::Duration::from_millis(1),
        )
        .await;
        assert!(matches!(res, Err(crate::Error::UnknownWorker(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transport_errors() {
        let mut calls = 0;
        let res = retry_with_backoff(
            || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(crate::Error::Transport("refused".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            5,
            std::time::Duration::from_millis(1),
        )
        .await;
        assert_eq!(res.unwrap(), 3);
    }
}
