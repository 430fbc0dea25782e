use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub poller: PollerSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
    pub demo: DemoSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the WebSocket listener binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// How each poll task talks to the queue service.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollerSettings {
    pub interval_secs: u64,
    pub max_messages: usize,
    pub wait_time_secs: u64,
}

impl PollerSettings {
    /// Upper bound the queue service accepts for a single fetch.
    pub const MAX_BATCH: usize = 10;

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    /// `max_messages` clamped into `1..=MAX_BATCH`.
    pub fn batch_size(&self) -> usize {
        self.max_messages.clamp(1, Self::MAX_BATCH)
    }
}

/// Keepalive cycle of a connection session.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionSettings {
    pub ping_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

impl SessionSettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Settings for the in-memory queue service and its synthetic feed.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DemoSettings {
    pub queues: Vec<String>,
    pub publish_interval_secs: u64,
    pub visibility_timeout_secs: u64,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub poller: Option<PartialPollerSettings>,
    pub session: Option<PartialSessionSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub demo: Option<PartialDemoSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPollerSettings {
    pub interval_secs: Option<u64>,
    pub max_messages: Option<usize>,
    pub wait_time_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSessionSettings {
    pub ping_interval_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialDemoSettings {
    pub queues: Option<Vec<String>>,
    pub publish_interval_secs: Option<u64>,
    pub visibility_timeout_secs: Option<u64>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let poller = self.poller.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();
        let demo = self.demo.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
            },
            poller: PollerSettings {
                interval_secs: poller
                    .interval_secs
                    .unwrap_or(defaults.poller.interval_secs),
                max_messages: poller.max_messages.unwrap_or(defaults.poller.max_messages),
                wait_time_secs: poller
                    .wait_time_secs
                    .unwrap_or(defaults.poller.wait_time_secs),
            },
            session: SessionSettings {
                ping_interval_secs: session
                    .ping_interval_secs
                    .unwrap_or(defaults.session.ping_interval_secs),
                idle_timeout_secs: session
                    .idle_timeout_secs
                    .unwrap_or(defaults.session.idle_timeout_secs),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
            demo: DemoSettings {
                queues: demo.queues.unwrap_or(defaults.demo.queues),
                publish_interval_secs: demo
                    .publish_interval_secs
                    .unwrap_or(defaults.demo.publish_interval_secs),
                visibility_timeout_secs: demo
                    .visibility_timeout_secs
                    .unwrap_or(defaults.demo.visibility_timeout_secs),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            poller: PollerSettings {
                interval_secs: 5,
                max_messages: 10,
                wait_time_secs: 1,
            },
            session: SessionSettings {
                ping_interval_secs: 30,
                idle_timeout_secs: 60,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            demo: DemoSettings {
                queues: vec![
                    "orders".to_string(),
                    "payments".to_string(),
                    "notifications".to_string(),
                ],
                publish_interval_secs: 3,
                visibility_timeout_secs: 30,
            },
        }
    }
}
