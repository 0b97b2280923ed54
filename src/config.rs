//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Assistant configuration: dialogue pacing, paging, and runtime settings.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Assistant name shown in greetings.
    pub assistant_name: String,
    /// Delay before the first bot reply to a user message.
    pub typing_delay: Duration,
    /// Delay between the sign-in card and its follow-up explanation.
    pub sign_in_follow_up_delay: Duration,
    /// Delay between the amount confirmation and the payment-method card.
    pub amount_confirm_delay: Duration,
    /// Delay before the bill analysis card appears.
    pub analysis_delay: Duration,
    /// Delay before a prepared download is delivered.
    pub download_delay: Duration,
    /// Simulated payment processing time.
    pub payment_processing_delay: Duration,
    /// Delay between the signed-in notice and replaying the pending action.
    pub resume_delay: Duration,
    /// Delay before the chat reopens after returning from sign-in.
    pub reopen_delay: Duration,
    /// Simulated latency of the mock login call.
    pub login_delay: Duration,
    /// Accounts per page in the BAN picker.
    pub page_size: usize,
    /// Failed BAN entries before escalating to support.
    pub max_ban_attempts: u32,
    /// Directory holding the bill PDF asset.
    pub assets_dir: PathBuf,
    /// File name of the bill PDF inside `assets_dir`.
    pub bill_pdf_name: String,
    /// Support phone number offered on escalation.
    pub support_phone: String,
    /// HTTP / WebSocket port.
    pub port: u16,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            assistant_name: "EVA".to_string(),
            typing_delay: Duration::from_millis(500),
            sign_in_follow_up_delay: Duration::from_millis(1000),
            amount_confirm_delay: Duration::from_millis(500),
            analysis_delay: Duration::from_millis(1500),
            download_delay: Duration::from_millis(1500),
            payment_processing_delay: Duration::from_millis(2000),
            resume_delay: Duration::from_millis(800),
            reopen_delay: Duration::from_millis(1200),
            login_delay: Duration::from_millis(1000),
            page_size: 10,
            max_ban_attempts: 3,
            assets_dir: PathBuf::from("./assets"),
            bill_pdf_name: "bill.pdf".to_string(),
            support_phone: "1-800-331-0500".to_string(),
            port: 8080,
        }
    }
}

impl AssistantConfig {
    /// Build a config from `EVA_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            assistant_name: std::env::var("EVA_ASSISTANT_NAME")
                .unwrap_or(defaults.assistant_name),
            typing_delay: env_millis("EVA_TYPING_DELAY_MS", defaults.typing_delay),
            sign_in_follow_up_delay: env_millis(
                "EVA_SIGN_IN_FOLLOW_UP_MS",
                defaults.sign_in_follow_up_delay,
            ),
            amount_confirm_delay: env_millis(
                "EVA_AMOUNT_CONFIRM_MS",
                defaults.amount_confirm_delay,
            ),
            analysis_delay: env_millis("EVA_ANALYSIS_DELAY_MS", defaults.analysis_delay),
            download_delay: env_millis("EVA_DOWNLOAD_DELAY_MS", defaults.download_delay),
            payment_processing_delay: env_millis(
                "EVA_PAYMENT_PROCESSING_MS",
                defaults.payment_processing_delay,
            ),
            resume_delay: env_millis("EVA_RESUME_DELAY_MS", defaults.resume_delay),
            reopen_delay: env_millis("EVA_REOPEN_DELAY_MS", defaults.reopen_delay),
            login_delay: env_millis("EVA_LOGIN_DELAY_MS", defaults.login_delay),
            page_size: env_parse("EVA_PAGE_SIZE", defaults.page_size),
            max_ban_attempts: env_parse("EVA_MAX_BAN_ATTEMPTS", defaults.max_ban_attempts),
            assets_dir: std::env::var("EVA_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            bill_pdf_name: std::env::var("EVA_BILL_PDF").unwrap_or(defaults.bill_pdf_name),
            support_phone: std::env::var("EVA_SUPPORT_PHONE").unwrap_or(defaults.support_phone),
            port: env_parse("EVA_PORT", defaults.port),
        }
    }

    /// Reject values the dialogue cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "page_size".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.max_ban_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_ban_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.bill_pdf_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "bill_pdf_name".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Path of the bill PDF asset.
    pub fn bill_pdf_path(&self) -> PathBuf {
        self.assets_dir.join(&self.bill_pdf_name)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
