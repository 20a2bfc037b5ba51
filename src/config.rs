//! Coordinator configuration.
//!
//! Every option can be given on the command line or through a `COORDINATOR_*`
//! environment variable. Durations are in milliseconds.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "coordinator", about = "Distributes computation work units across worker nodes")]
pub struct CoordinatorConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "COORDINATOR_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Pin the active domain at start-up instead of taking the first node's.
    #[arg(long, env = "COORDINATOR_DOMAIN")]
    pub domain: Option<String>,

    /// Attempts made to reserve a node for a client request.
    #[arg(long, env = "COORDINATOR_RETRY_COUNT", default_value_t = 5)]
    pub retry_count: u32,

    /// Pause between two reservation attempts.
    #[arg(long, env = "COORDINATOR_RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    #[arg(long, env = "COORDINATOR_DISTRIBUTION_DELAY_MS", default_value_t = 5000)]
    pub distribution_startup_delay_ms: u64,

    #[arg(long, env = "COORDINATOR_DISTRIBUTION_INTERVAL_MS", default_value_t = 1000)]
    pub distribution_interval_ms: u64,

    #[arg(long, env = "COORDINATOR_PING_DELAY_MS", default_value_t = 10000)]
    pub ping_startup_delay_ms: u64,

    #[arg(long, env = "COORDINATOR_PING_INTERVAL_MS", default_value_t = 30000)]
    pub ping_interval_ms: u64,

    /// Timeout applied to every outbound worker call.
    #[arg(long, env = "COORDINATOR_REQUEST_TIMEOUT_MS", default_value_t = 60000)]
    pub request_timeout_ms: u64,
}

impl CoordinatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn distribution_startup_delay(&self) -> Duration {
        Duration::from_millis(self.distribution_startup_delay_ms)
    }

    pub fn distribution_interval(&self) -> Duration {
        Duration::from_millis(self.distribution_interval_ms.max(1))
    }

    pub fn ping_startup_delay(&self) -> Duration {
        Duration::from_millis(self.ping_startup_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            domain: None,
            retry_count: 5,
            retry_delay_ms: 1000,
            distribution_startup_delay_ms: 5000,
            distribution_interval_ms: 1000,
            ping_startup_delay_ms: 10000,
            ping_interval_ms: 30000,
            request_timeout_ms: 60000,
        }
    }
}
