use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use once_cell::sync::Lazy;
use receipt_common::token::TOKEN_SIGNING_KEY_SIZE;
use receipt_common::vision::PollSettings;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "RECEIPTS_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "RECEIPTS_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "RECEIPTS_DB_HOSTNAME";
const DB_PORT_VAR: &str = "RECEIPTS_DB_PORT";
const DB_NAME_VAR: &str = "RECEIPTS_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "RECEIPTS_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "RECEIPTS_DB_IDLE_TIMEOUT_SECS";

const TOKEN_SIGNING_KEY_VAR: &str = "RECEIPTS_TOKEN_SIGNING_KEY_B64";
const ACCESS_TOKEN_LIFETIME_MINS_VAR: &str = "RECEIPTS_ACCESS_TOKEN_LIFETIME_MINS";

const HEALTH_ENDPOINT_KEY_VAR: &str = "RECEIPTS_HEALTH_ENDPOINT_KEY";

const VISION_ENABLED_VAR: &str = "RECEIPTS_VISION_ENABLED";
const CLASSIFIER_PREDICTION_URL_VAR: &str = "RECEIPTS_CLASSIFIER_PREDICTION_URL";
const CLASSIFIER_PREDICTION_KEY_VAR: &str = "RECEIPTS_CLASSIFIER_PREDICTION_KEY";
const CLASSIFIER_CONFIDENCE_THRESHOLD_VAR: &str = "RECEIPTS_CLASSIFIER_CONFIDENCE_THRESHOLD";
const ANALYSIS_ENDPOINT_VAR: &str = "RECEIPTS_ANALYSIS_ENDPOINT";
const ANALYSIS_KEY_VAR: &str = "RECEIPTS_ANALYSIS_KEY";
const ANALYSIS_POLL_INITIAL_MS_VAR: &str = "RECEIPTS_ANALYSIS_POLL_INITIAL_MS";
const ANALYSIS_POLL_MAX_MS_VAR: &str = "RECEIPTS_ANALYSIS_POLL_MAX_MS";
const ANALYSIS_POLL_DEADLINE_SECS_VAR: &str = "RECEIPTS_ANALYSIS_POLL_DEADLINE_SECS";

const MAX_UPLOAD_BYTES_VAR: &str = "RECEIPTS_MAX_UPLOAD_BYTES";

const ACTIX_WORKER_COUNT_VAR: &str = "RECEIPTS_ACTIX_WORKER_COUNT";
const LOG_LEVEL_VAR: &str = "RECEIPTS_LOG_LEVEL";

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    pub token_signing_key: [u8; TOKEN_SIGNING_KEY_SIZE],
    #[zeroize(skip)]
    pub access_token_lifetime: Duration,

    pub health_endpoint_key: String,

    #[zeroize(skip)]
    pub vision_enabled: bool,
    #[zeroize(skip)]
    pub classifier_prediction_url: String,
    pub classifier_prediction_key: String,
    #[zeroize(skip)]
    pub classifier_confidence_threshold: f64,
    #[zeroize(skip)]
    pub analysis_endpoint: String,
    pub analysis_key: String,
    #[zeroize(skip)]
    pub analysis_poll: PollSettings,

    #[zeroize(skip)]
    pub max_upload_bytes: usize,

    #[zeroize(skip)]
    pub actix_worker_count: usize,

    #[zeroize(skip)]
    pub log_level: String,
}

impl ConfigInner {
    pub fn database_uri(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_hostname, self.db_port, self.db_name
        )
    }
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let token_signing_key = Zeroizing::new(
            b64.decode(env_var::<String>(TOKEN_SIGNING_KEY_VAR)?.as_bytes())
                .map_err(|_| ConfigError::invalid(TOKEN_SIGNING_KEY_VAR))?,
        );
        let token_signing_key = token_signing_key
            .get(..TOKEN_SIGNING_KEY_SIZE)
            .and_then(|key| key.try_into().ok())
            .ok_or(ConfigError::invalid(TOKEN_SIGNING_KEY_VAR))?;

        let vision_enabled = if cfg!(test) {
            false
        } else {
            env_var(VISION_ENABLED_VAR)?
        };

        // The service endpoints and credentials are only required when the
        // real vision services are in play
        let (classifier_prediction_url, classifier_prediction_key, analysis_endpoint, analysis_key) =
            if vision_enabled {
                (
                    env_var(CLASSIFIER_PREDICTION_URL_VAR)?,
                    env_var(CLASSIFIER_PREDICTION_KEY_VAR)?,
                    env_var(ANALYSIS_ENDPOINT_VAR)?,
                    env_var(ANALYSIS_KEY_VAR)?,
                )
            } else {
                Default::default()
            };

        let analysis_poll = PollSettings {
            initial_interval: Duration::from_millis(env_var_or(ANALYSIS_POLL_INITIAL_MS_VAR, 500)),
            max_interval: Duration::from_millis(env_var_or(ANALYSIS_POLL_MAX_MS_VAR, 5_000)),
            deadline: Duration::from_secs(env_var_or(ANALYSIS_POLL_DEADLINE_SECS_VAR, 60)),
        };

        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            token_signing_key,
            access_token_lifetime: Duration::from_secs(
                env_var_or(ACCESS_TOKEN_LIFETIME_MINS_VAR, 15) * 60,
            ),

            health_endpoint_key: env_var(HEALTH_ENDPOINT_KEY_VAR)?,

            vision_enabled,
            classifier_prediction_url,
            classifier_prediction_key,
            classifier_confidence_threshold: env_var_or(CLASSIFIER_CONFIDENCE_THRESHOLD_VAR, 0.7),
            analysis_endpoint,
            analysis_key,
            analysis_poll,

            max_upload_bytes: env_var_or(MAX_UPLOAD_BYTES_VAR, 10 * 1024 * 1024),

            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),

            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::missing(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::invalid(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl ConfigError {
    fn missing(var_name: &'static str) -> Self {
        Self::MissingVar(var_name)
    }

    fn invalid(var_name: &'static str) -> Self {
        Self::InvalidVar(var_name)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}
