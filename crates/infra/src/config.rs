use booking_notifier_domain::{ExpansionOptions, RetryPolicy};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    /// Seconds between two runs of the notification worker
    pub notification_worker_interval_secs: u64,
    /// Maximum number of jobs claimed by a single worker run
    pub notification_batch_size: i64,
    /// Attempts before a job is moved to the dead letters
    pub notification_max_attempts: i64,
    /// First retry delay in millis, doubled for every failed attempt
    pub notification_backoff_base_millis: i64,
    /// A job claimed longer ago than this is considered abandoned by a
    /// crashed worker and becomes eligible again.
    pub notification_processing_timeout_millis: i64,
    /// Whether recurring bookings may land on saturdays and sundays
    pub booking_weekends_enabled: bool,
    /// Optional cap on the number of bookings a single recurrence rule may
    /// materialize
    pub booking_max_instances: Option<usize>,
    /// Http endpoint of the mail relay. Messages are only logged when this
    /// is not set.
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
}

fn env_or_default<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default: {}.",
                    name, value, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn new() -> Self {
        let port = env_or_default("PORT", 5000_usize);
        let notification_worker_interval_secs =
            env_or_default("NOTIFICATION_WORKER_INTERVAL_SECS", 30_u64).max(1);
        let notification_batch_size = env_or_default("NOTIFICATION_BATCH_SIZE", 5_i64).max(1);
        let notification_max_attempts = env_or_default("NOTIFICATION_MAX_ATTEMPTS", 5_i64).max(1);
        let notification_backoff_base_secs =
            env_or_default("NOTIFICATION_BACKOFF_BASE_SECS", 120_i64).max(0);
        let notification_processing_timeout_secs =
            env_or_default("NOTIFICATION_PROCESSING_TIMEOUT_SECS", 600_i64).max(1);
        let booking_weekends_enabled = env_or_default("BOOKING_WEEKENDS_ENABLED", false);
        let booking_max_instances = match std::env::var("BOOKING_MAX_INSTANCES") {
            Ok(value) => match value.parse::<usize>() {
                Ok(max) if max > 0 => Some(max),
                _ => {
                    warn!(
                        "The given BOOKING_MAX_INSTANCES: {} is not valid, recurring bookings are not capped.",
                        value
                    );
                    None
                }
            },
            Err(_) => None,
        };

        let mail_relay_url = std::env::var("MAIL_RELAY_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        if mail_relay_url.is_none() {
            info!("Did not find MAIL_RELAY_URL environment variable. Notifications will only be logged.");
        }
        let mail_from =
            std::env::var("MAIL_FROM").unwrap_or_else(|_| "bookings@localhost".to_string());

        Self {
            port,
            notification_worker_interval_secs,
            notification_batch_size,
            notification_max_attempts,
            notification_backoff_base_millis: notification_backoff_base_secs * 1000,
            notification_processing_timeout_millis: notification_processing_timeout_secs * 1000,
            booking_weekends_enabled,
            booking_max_instances,
            mail_relay_url,
            mail_from,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.notification_max_attempts,
            backoff_base_millis: self.notification_backoff_base_millis,
        }
    }

    pub fn expansion_options(&self) -> ExpansionOptions {
        ExpansionOptions {
            weekends_enabled: self.booking_weekends_enabled,
            max_instances: self.booking_max_instances,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn falls_back_to_defaults() {
        std::env::set_var("NOTIFICATION_BATCH_SIZE", "many");
        std::env::remove_var("NOTIFICATION_MAX_ATTEMPTS");
        std::env::remove_var("BOOKING_WEEKENDS_ENABLED");
        std::env::set_var("BOOKING_MAX_INSTANCES", "0");
        let config = Config::new();
        std::env::remove_var("NOTIFICATION_BATCH_SIZE");
        std::env::remove_var("BOOKING_MAX_INSTANCES");

        assert_eq!(config.notification_batch_size, 5);
        assert_eq!(config.notification_max_attempts, 5);
        assert!(!config.booking_weekends_enabled);
        assert_eq!(config.expansion_options().max_instances, None);
        assert_eq!(config.retry_policy().backoff_base_millis, 1000 * 60 * 2);
    }

    #[test]
    #[serial]
    fn reads_environment() {
        std::env::set_var("NOTIFICATION_MAX_ATTEMPTS", "3");
        std::env::set_var("BOOKING_WEEKENDS_ENABLED", "true");
        std::env::set_var("BOOKING_MAX_INSTANCES", "730");
        let config = Config::new();
        std::env::remove_var("NOTIFICATION_MAX_ATTEMPTS");
        std::env::remove_var("BOOKING_WEEKENDS_ENABLED");
        std::env::remove_var("BOOKING_MAX_INSTANCES");

        assert_eq!(config.retry_policy().max_attempts, 3);
        assert!(config.expansion_options().weekends_enabled);
        assert_eq!(config.expansion_options().max_instances, Some(730));
    }
}
