use std::{env, fmt, fs, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

pub const DEFAULT_INVITE_TTL_HOURS: i64 = 24 * 7;
/// Ten years.
pub const MAX_INVITE_TTL_HOURS: i64 = 24 * 365 * 10;
pub const DEFAULT_MAIL_TIMEOUT_MS: u64 = 10_000;

/// How a second invitation for an email that already has a live pending
/// invitation in the same workspace is treated.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateInvitePolicy {
    #[default]
    Reject,
    Reuse,
}

/// Whether redeeming an invitation requires the caller's email to match the
/// invitee email.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionPolicy {
    #[default]
    MatchEmail,
    TokenOnly,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MailProvider {
    #[default]
    Log,
    Resend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvitationConfig {
    pub duplicate_policy: DuplicateInvitePolicy,
    pub redemption_policy: RedemptionPolicy,
    /// Lifetime of a fresh invitation. `0` disables expiry.
    pub ttl_hours: i64,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicateInvitePolicy::default(),
            redemption_policy: RedemptionPolicy::default(),
            ttl_hours: DEFAULT_INVITE_TTL_HOURS,
        }
    }
}

impl InvitationConfig {
    pub fn ttl_seconds(&self) -> Option<i64> {
        (self.ttl_hours > 0).then(|| self.ttl_hours.saturating_mul(60 * 60))
    }

    fn validate(&self) -> Result<()> {
        if !(0..=MAX_INVITE_TTL_HOURS).contains(&self.ttl_hours) {
            return Err(anyhow!(
                "invitation ttl_hours must be between 0 and {MAX_INVITE_TTL_HOURS}, got {}",
                self.ttl_hours
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub api_key: Option<String>,
    pub from: String,
    /// Upper bound on a single delivery attempt.
    pub timeout_ms: u64,
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: MailProvider::default(),
            api_key: None,
            from: default_mail_from(),
            timeout_ms: DEFAULT_MAIL_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub invitations: InvitationConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            base_url: default_base_url(),
            invitations: InvitationConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "TASKDECK_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "TASKDECK_BIND_ADDRESS";
    const DATABASE_PATH_ENV: &'static str = "TASKDECK_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str = "TASKDECK_DATABASE_MAX_CONNECTIONS";
    const BASE_URL_ENV: &'static str = "TASKDECK_BASE_URL";
    const INVITE_DUPLICATE_POLICY_ENV: &'static str = "TASKDECK_INVITE_DUPLICATE_POLICY";
    const INVITE_REDEMPTION_POLICY_ENV: &'static str = "TASKDECK_INVITE_REDEMPTION_POLICY";
    const INVITE_TTL_HOURS_ENV: &'static str = "TASKDECK_INVITE_TTL_HOURS";
    const MAIL_PROVIDER_ENV: &'static str = "TASKDECK_MAIL_PROVIDER";
    const MAIL_API_KEY_ENV: &'static str = "TASKDECK_MAIL_API_KEY";
    const MAIL_FROM_ENV: &'static str = "TASKDECK_MAIL_FROM";
    const MAIL_TIMEOUT_MS_ENV: &'static str = "TASKDECK_MAIL_TIMEOUT_MS";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = Self::from_toml(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env_overrides()?;
        config.invitations.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.invitations.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            self.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            self.database_max_connections = value.trim().parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(url) = env::var(Self::BASE_URL_ENV) {
            self.base_url = url;
        }

        if let Ok(value) = env::var(Self::INVITE_DUPLICATE_POLICY_ENV) {
            self.invitations.duplicate_policy = value.parse()?;
        }

        if let Ok(value) = env::var(Self::INVITE_REDEMPTION_POLICY_ENV) {
            self.invitations.redemption_policy = value.parse()?;
        }

        if let Ok(value) = env::var(Self::INVITE_TTL_HOURS_ENV) {
            self.invitations.ttl_hours = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::INVITE_TTL_HOURS_ENV))?;
        }

        if let Ok(value) = env::var(Self::MAIL_PROVIDER_ENV) {
            self.mail.provider = value.parse()?;
        }

        if let Ok(key) = env::var(Self::MAIL_API_KEY_ENV) {
            let key = key.trim();
            self.mail.api_key = (!key.is_empty()).then(|| key.to_owned());
        }

        if let Ok(from) = env::var(Self::MAIL_FROM_ENV) {
            self.mail.from = from;
        }

        if let Ok(value) = env::var(Self::MAIL_TIMEOUT_MS_ENV) {
            self.mail.timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::MAIL_TIMEOUT_MS_ENV))?;
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("taskdeck.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        Ok(candidates.into_iter().find(|candidate| candidate.exists()))
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".taskdeck"))
    }
}

impl FromStr for DuplicateInvitePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "reuse" => Ok(Self::Reuse),
            other => Err(anyhow!("unknown duplicate invite policy: {other}")),
        }
    }
}

impl FromStr for RedemptionPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "match_email" | "match-email" => Ok(Self::MatchEmail),
            "token_only" | "token-only" => Ok(Self::TokenOnly),
            other => Err(anyhow!("unknown redemption policy: {other}")),
        }
    }
}

impl FromStr for MailProvider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" | "" => Ok(Self::Log),
            "resend" => Ok(Self::Resend),
            other => Err(anyhow!("unknown mail provider: {other}")),
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_database_path() -> String {
    "./data/taskdeck.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    4
}

fn default_base_url() -> String {
    "http://localhost:3000".to_owned()
}

fn default_mail_from() -> String {
    "Productivity App <onboarding@resend.dev>".to_owned()
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reject_duplicates_and_match_email() {
        let config = AppConfig::default();
        assert_eq!(
            config.invitations.duplicate_policy,
            DuplicateInvitePolicy::Reject
        );
        assert_eq!(
            config.invitations.redemption_policy,
            RedemptionPolicy::MatchEmail
        );
        assert_eq!(config.invitations.ttl_seconds(), Some(7 * 24 * 60 * 60));
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            base_url = "https://deck.example.com"

            [invitations]
            duplicate_policy = "reuse"
            redemption_policy = "token_only"
            ttl_hours = 0

            [mail]
            provider = "resend"
            api_key = "re_test"
            "#,
        )
        .expect("parse config");

        assert_eq!(config.base_url, "https://deck.example.com");
        assert_eq!(config.database_path, "./data/taskdeck.db");
        assert_eq!(
            config.invitations.duplicate_policy,
            DuplicateInvitePolicy::Reuse
        );
        assert_eq!(
            config.invitations.redemption_policy,
            RedemptionPolicy::TokenOnly
        );
        assert_eq!(config.invitations.ttl_seconds(), None);
        assert_eq!(config.mail.provider, MailProvider::Resend);
        assert!(!format!("{:?}", config.mail).contains("re_test"));
    }

    #[test]
    fn policy_names_parse_case_insensitively() {
        assert_eq!(
            "Token-Only".parse::<RedemptionPolicy>().unwrap(),
            RedemptionPolicy::TokenOnly
        );
        assert!("sometimes".parse::<DuplicateInvitePolicy>().is_err());
    }

    #[test]
    fn out_of_range_invitation_ttl_is_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [invitations]
            ttl_hours = 9223372036854775807
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ttl_hours"));

        assert!(
            AppConfig::from_toml("[invitations]\nttl_hours = -1\n").is_err()
        );

        let huge = InvitationConfig {
            ttl_hours: i64::MAX,
            ..InvitationConfig::default()
        };
        assert_eq!(huge.ttl_seconds(), Some(i64::MAX));
    }

    #[test]
    fn mail_timeout_defaults_and_overrides() {
        assert_eq!(
            AppConfig::default().mail.timeout(),
            Duration::from_millis(DEFAULT_MAIL_TIMEOUT_MS)
        );
        let config = AppConfig::from_toml("[mail]\ntimeout_ms = 250\n").expect("parse config");
        assert_eq!(config.mail.timeout(), Duration::from_millis(250));
    }
}
