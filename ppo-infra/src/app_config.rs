use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 25 }

/// Which gateway implementations to wire in at start.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    #[default]
    Stub,
    Live,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: GatewayMode,
    pub loan_ledger_url: String,
    pub payment_url: String,
    pub inventory_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 10 }

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// UTC wall-clock time, "HH:MM"
    #[serde(default = "default_reminder_time")]
    pub reminder_time: String,
    #[serde(default = "default_auto_charge_time")]
    pub auto_charge_time: String,
    #[serde(default = "default_reminder_deadline")]
    pub reminder_deadline_secs: u64,
    #[serde(default = "default_auto_charge_deadline")]
    pub auto_charge_deadline_secs: u64,
}

fn default_enabled() -> bool { true }
fn default_reminder_time() -> String { "09:00".to_string() }
fn default_auto_charge_time() -> String { "02:00".to_string() }
fn default_reminder_deadline() -> u64 { 120 }
fn default_auto_charge_deadline() -> u64 { 300 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reminder_time: default_reminder_time(),
            auto_charge_time: default_auto_charge_time(),
            reminder_deadline_secs: default_reminder_deadline(),
            auto_charge_deadline_secs: default_auto_charge_deadline(),
        }
    }
}

impl SchedulerConfig {
    pub fn reminder_deadline(&self) -> Duration {
        Duration::from_secs(self.reminder_deadline_secs)
    }

    pub fn auto_charge_deadline(&self) -> Duration {
        Duration::from_secs(self.auto_charge_deadline_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// A `running` run with no checkpoint for this long is treated as abandoned and may be
    /// resumed. Keep it well above `gateways.timeout_secs`.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

fn default_stale_after() -> u64 { 900 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
        }
    }
}

impl WorkflowConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `PPO__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("PPO").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
