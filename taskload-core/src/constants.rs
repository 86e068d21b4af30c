use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://maintenance-api:8080";

/// Password shared by the freshly registered technician and the manager account.
pub const DEFAULT_PASSWORD: &str = "password";

/// Pre-existing manager account used for deletes.
pub const DEFAULT_MANAGER_EMAIL: &str = "luther@gmail.com";

pub const DEFAULT_CREATE_SUMMARY_LEN: usize = 200;
pub const DEFAULT_UPDATE_SUMMARY_LEN: usize = 2500;
pub const DEFAULT_CREATE_DATE: &str = "2011-10-05T14:48:00Z";
pub const DEFAULT_UPDATE_DATE: &str = "2012-10-05T14:48:00Z";

pub const LOWERCASE_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

pub const NICKNAME_LEN: usize = 15;
pub const EMAIL_LOCAL_LEN: usize = 10;
pub const EMAIL_DOMAIN: &str = "example.com";

pub const DEFAULT_ITERATION_SLEEP: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// How often the scheduler re-evaluates the target VU count.
pub const SCHEDULER_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on how much of a response body ends up in a log line.
pub const LOG_BODY_LIMIT: usize = 512;
