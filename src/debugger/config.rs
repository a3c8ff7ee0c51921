use log::warn;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6000;
pub const DEFAULT_AUTHKEY: &str = "secret password";

pub const HOST_ENV: &str = "QDB_HOST";
pub const PORT_ENV: &str = "QDB_PORT";
pub const AUTHKEY_ENV: &str = "QDB_AUTHKEY";

/// Where the agent listens and the secret shared with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub authkey: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            authkey: DEFAULT_AUTHKEY.to_string(),
        }
    }
}

impl ConnectConfig {
    /// Defaults overridden by `QDB_HOST`, `QDB_PORT` and `QDB_AUTHKEY`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(host) = std::env::var(HOST_ENV) {
            cfg.host = host;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            match port.parse() {
                Ok(port) => cfg.port = port,
                Err(e) => warn!(target: "session", "ignore {PORT_ENV}={port}: {e}"),
            }
        }
        if let Ok(authkey) = std::env::var(AUTHKEY_ENV) {
            cfg.authkey = authkey;
        }
        cfg
    }

    pub fn address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    /// True if the agent runs on another host.
    pub fn is_remote(&self) -> bool {
        if self.host.eq_ignore_ascii_case("localhost") {
            return false;
        }
        match self.host.parse::<IpAddr>() {
            Ok(ip) => !ip.is_loopback(),
            Err(_) => true,
        }
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of tries, the first one included.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Pauses to take between consecutive tries.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = self.max_delay;
        std::iter::successors(Some(self.initial_delay.min(max)), move |d| {
            Some(d.saturating_mul(2).min(max))
        })
        .take(self.attempts.saturating_sub(1) as usize)
    }
}

/// What the agent attaches to each interaction notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InteractionParams {
    pub call_stack: bool,
    pub environment: bool,
    pub postmortem: bool,
}

impl Default for InteractionParams {
    fn default() -> Self {
        Self {
            call_stack: true,
            environment: true,
            postmortem: true,
        }
    }
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connection tries made by [`crate::debugger::Session::attach_with_retry`].
    pub attach_retry: RetryPolicy,
    /// How long a forced command waits for the program to stop after an interrupt.
    pub force_wait: RetryPolicy,
    /// Upper bound for a single request round trip.
    pub response_timeout: Duration,
    /// Sleep between two polls of the background loop.
    pub poll_interval: Duration,
    pub params: InteractionParams,
    /// Continue silently over the first interaction after startup.
    pub run_without_pausing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attach_retry: RetryPolicy::new(
                10,
                Duration::from_millis(500),
                Duration::from_millis(500),
            ),
            force_wait: RetryPolicy::new(50, Duration::from_millis(1), Duration::from_millis(100)),
            response_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            params: InteractionParams::default(),
            run_without_pausing: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_delays_are_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_millis(30));
        let delays: Vec<_> = policy.delays().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 30, 30]);
        assert_eq!(policy.delays().sum::<Duration>(), Duration::from_millis(90));

        let once = RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(30));
        assert_eq!(once.delays().count(), 0);
    }

    #[test]
    fn test_interaction_params_shape() {
        let params = InteractionParams {
            postmortem: false,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(params).unwrap(),
            serde_json::json!({"call_stack": true, "environment": true, "postmortem": false})
        );
    }

    #[test]
    fn test_is_remote() {
        let mut cfg = ConnectConfig::default();
        assert!(!cfg.is_remote());
        cfg.host = "127.0.0.1".to_string();
        assert!(!cfg.is_remote());
        cfg.host = "::1".to_string();
        assert!(!cfg.is_remote());
        cfg.host = "10.1.2.3".to_string();
        assert!(cfg.is_remote());
        cfg.host = "build-box".to_string();
        assert!(cfg.is_remote());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::remove_var(HOST_ENV);
        std::env::remove_var(AUTHKEY_ENV);
        std::env::set_var(PORT_ENV, "6123");
        let cfg = ConnectConfig::from_env();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, 6123);
        assert_eq!(cfg.authkey, DEFAULT_AUTHKEY);

        std::env::set_var(HOST_ENV, "10.0.0.7");
        std::env::set_var(PORT_ENV, "not a port");
        std::env::set_var(AUTHKEY_ENV, "s3cr3t");
        let cfg = ConnectConfig::from_env();
        assert_eq!(cfg.host, "10.0.0.7");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.authkey, "s3cr3t");

        std::env::remove_var(HOST_ENV);
        std::env::remove_var(PORT_ENV);
        std::env::remove_var(AUTHKEY_ENV);
    }
}
