use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::api::ApiConfig;
use crate::storage::schema::OperatorContact;
use crate::util::{
    API_TOKEN, PUSH_GATEWAY_TOKEN, PUSH_GATEWAY_URL, RESEND_API_KEY, RESEND_FROM,
    TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_FROM_NUMBER, VAPID_PUBLIC_KEY, get_secret,
};

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Operator contacts, upserted into the store at startup
    #[serde(default)]
    pub operators: Vec<OperatorContact>,
}

/// SQLite storage configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./citywatch.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Trailing window in which a repeat (metric, severity) breach is suppressed
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,

    /// Push a notification for every newly recorded breach
    #[serde(default)]
    pub notify_on_breach: bool,
}

impl EvaluatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_secs as i64)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            dedup_window_secs: default_dedup_window_secs(),
            notify_on_breach: false,
        }
    }
}

fn default_interval_secs() -> u64 {
    15
}

fn default_dedup_window_secs() -> u64 {
    300
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_url")]
    pub url: String,

    /// Sent as `X-MONITORING-SECRET` when set
    pub token: Option<String>,

    #[serde(default = "default_telemetry_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: default_telemetry_url(),
            token: None,
            timeout_secs: default_telemetry_timeout_secs(),
        }
    }
}

fn default_telemetry_url() -> String {
    "http://127.0.0.1:9100/metrics".to_string()
}

fn default_telemetry_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChannelsConfig {
    /// Upper bound for a single send to a single endpoint
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub sms: SmsConfig,
}

impl ChannelsConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            push: PushConfig::default(),
            email: EmailConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

/// Web Push delivery through a gateway that holds the VAPID private key
///
/// Push is only available once both `gateway_url` and `vapid_public_key`
/// are set.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub gateway_url: Option<String>,

    #[serde(default)]
    pub gateway_token: Option<String>,

    /// Application server key handed to browsers when they subscribe
    #[serde(default)]
    pub vapid_public_key: Option<String>,

    /// How long the push service may hold an undelivered message
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            gateway_token: None,
            vapid_public_key: None,
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u32 {
    3600
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub from: Option<String>,
    #[serde(default = "default_email_base_url")]
    pub base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from: None,
            base_url: default_email_base_url(),
        }
    }
}

fn default_email_base_url() -> String {
    "https://api.resend.com".to_string()
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    #[serde(default = "default_sms_base_url")]
    pub base_url: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            base_url: default_sms_base_url(),
        }
    }
}

fn default_sms_base_url() -> String {
    "https://api.twilio.com".to_string()
}

impl Config {
    /// Fill provider secrets and the API token from the environment.
    ///
    /// Environment values win over the file so secrets can stay out of it.
    pub fn apply_env_overrides(&mut self) {
        let push = &mut self.channels.push;
        push.gateway_url = get_secret(PUSH_GATEWAY_URL).or(push.gateway_url.take());
        push.gateway_token = get_secret(PUSH_GATEWAY_TOKEN).or(push.gateway_token.take());
        push.vapid_public_key = get_secret(VAPID_PUBLIC_KEY).or(push.vapid_public_key.take());

        let email = &mut self.channels.email;
        email.api_key = get_secret(RESEND_API_KEY).or(email.api_key.take());
        email.from = get_secret(RESEND_FROM).or(email.from.take());

        let sms = &mut self.channels.sms;
        sms.account_sid = get_secret(TWILIO_ACCOUNT_SID).or(sms.account_sid.take());
        sms.auth_token = get_secret(TWILIO_AUTH_TOKEN).or(sms.auth_token.take());
        sms.from_number = get_secret(TWILIO_FROM_NUMBER).or(sms.from_number.take());

        self.api.auth_token = get_secret(API_TOKEN).or(self.api.auth_token.take());
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
