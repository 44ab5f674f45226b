use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use domain::services::{DispatchSettings, IntakeSettings, RetryPolicy, WebhookSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Email service configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Event bus configuration
    #[serde(default)]
    pub event_bus: EventBusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Per-client requests per minute on the public form routes. Zero disables limiting.
    #[serde(default = "default_form_rate_limit")]
    pub form_rate_limit_per_minute: u32,

    /// Adds `Strict-Transport-Security`; enable only behind HTTPS termination.
    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Courses accepting registrations. Empty allows any course id.
    #[serde(default)]
    pub allowed_course_ids: Vec<String>,

    #[serde(default = "default_livestream_course_id")]
    pub livestream_course_id: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allowed_course_ids: Vec::new(),
            livestream_course_id: default_livestream_course_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Webhook signing secret (`whsec_...`)
    #[serde(default)]
    pub webhook_secret: String,

    /// Maximum signature age in seconds; 0 disables the check
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Admin recipient for payment, livestream and contact notices
    #[serde(default)]
    pub admin_email: Option<String>,

    /// Upper bound for each email send or event publish
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            timeout_ms: default_notification_timeout_ms(),
        }
    }
}

/// Email service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: sendgrid or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_event_bus_enabled")]
    pub enabled: bool,

    /// Event bus provider: log or http
    #[serde(default = "default_event_bus_provider")]
    pub provider: String,

    /// Endpoint for the http provider
    #[serde(default)]
    pub url: String,

    /// Shared secret for `X-Event-Signature`; unsigned when empty
    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_event_source")]
    pub source: String,

    #[serde(default = "default_event_bus_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: default_event_bus_enabled(),
            provider: default_event_bus_provider(),
            url: String::new(),
            secret: String::new(),
            source: default_event_source(),
            timeout_ms: default_event_bus_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_form_rate_limit() -> u32 {
    30
}
fn default_livestream_course_id() -> String {
    "tax-livestream-01".to_string()
}
fn default_signature_tolerance() -> i64 {
    shared::crypto::DEFAULT_SIGNATURE_TOLERANCE_SECS
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    2000
}
fn default_notification_timeout_ms() -> u64 {
    3000
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_sender_email() -> String {
    "noreply@example.com".to_string()
}
fn default_sender_name() -> String {
    "Course Registrations".to_string()
}
fn default_event_bus_enabled() -> bool {
    true
}
fn default_event_bus_provider() -> String {
    "log".to_string()
}
fn default_event_source() -> String {
    domain::models::event::DEFAULT_EVENT_SOURCE.to_string()
}
fn default_event_bus_timeout_ms() -> u64 {
    3000
}

/// Defaults used by [`Config::load_with_overrides`], mirroring `config/default.toml`.
const EMBEDDED_DEFAULTS: &str = r#"
    [server]
    host = "0.0.0.0"
    port = 8080
    request_timeout_secs = 30

    [database]
    url = ""
    max_connections = 20
    min_connections = 2
    connect_timeout_secs = 10
    idle_timeout_secs = 600

    [logging]
    level = "info"
    format = "json"

    [security]
    cors_origins = []
    form_rate_limit_per_minute = 30
    hsts_enabled = false

    [registration]
    allowed_course_ids = []
    livestream_course_id = "tax-livestream-01"

    [stripe]
    webhook_secret = ""
    signature_tolerance_secs = 300

    [reconciliation]
    max_retries = 3
    initial_backoff_ms = 100
    max_backoff_ms = 2000

    [notifications]
    timeout_ms = 3000

    [email]
    enabled = false
    provider = "console"
    sender_email = "test@example.com"
    sender_name = "Test"

    [event_bus]
    enabled = true
    provider = "log"
    source = "course.registration"
    timeout_ms = 3000
"#;

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CF__ prefix; list values are comma separated
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CF")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("registration.allowed_course_ids")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Builds a configuration from embedded defaults plus overrides.
    ///
    /// Does not touch the file system or environment and skips validation, so tests can
    /// build partial configs.
    pub fn load_with_overrides(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            EMBEDDED_DEFAULTS,
            config::FileFormat::Toml,
        ));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CF__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        // Without a secret no webhook could ever be verified
        if self.stripe.webhook_secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CF__STRIPE__WEBHOOK_SECRET environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.stripe.signature_tolerance_secs < 0 {
            return Err(ConfigValidationError::InvalidValue(
                "signature_tolerance_secs cannot be negative".to_string(),
            ));
        }

        if self.event_bus.enabled && self.event_bus.provider == "http" && self.event_bus.url.is_empty()
        {
            return Err(ConfigValidationError::MissingRequired(
                "event_bus.url is required for the http provider".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn database_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }

    pub fn intake_settings(&self) -> IntakeSettings {
        IntakeSettings {
            allowed_course_ids: self.registration.allowed_course_ids.clone(),
            livestream_course_id: self.registration.livestream_course_id.clone(),
        }
    }

    pub fn webhook_settings(&self) -> WebhookSettings {
        WebhookSettings {
            signing_secret: self.stripe.webhook_secret.clone(),
            tolerance_secs: self.stripe.signature_tolerance_secs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconciliation.max_retries,
            Duration::from_millis(self.reconciliation.initial_backoff_ms),
            Duration::from_millis(self.reconciliation.max_backoff_ms),
        )
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            admin_email: self
                .notifications
                .admin_email
                .as_ref()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            event_source: self.event_bus.source.clone(),
            timeout: Duration::from_millis(self.notifications.timeout_ms),
        }
    }
}
