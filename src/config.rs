use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::{MAX_SLOT_MINUTES, MAX_SUGGESTIONS};
use crate::model::{OperatingHours, Rounding, SuggestionPolicy};

const PREFIX: &str = "STUDYROOM_";
const MIN_SECRET_LEN: usize = 16;

#[derive(Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub policy: SuggestionPolicy,
    pub compact_threshold: u64,
    /// Username of an admin account created at startup if missing.
    pub admin_username: Option<String>,
    pub seed_rooms: bool,
    /// HS256 key for session tokens.
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("data_dir", &self.data_dir)
            .field("metrics_port", &self.metrics_port)
            .field("policy", &self.policy)
            .field("compact_threshold", &self.compact_threshold)
            .field("admin_username", &self.admin_username)
            .field("seed_rooms", &self.seed_rooms)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Config {
    /// Load from `STUDYROOM_*` environment variables.
    pub fn load() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable source (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(&format!("{PREFIX}{key}")).filter(|v| !v.trim().is_empty());

        let day_start_hour = parse_or(&get, "DAY_START_HOUR", 9u32)?;
        let day_end_hour = parse_or(&get, "DAY_END_HOUR", 21u32)?;
        let hours = OperatingHours::new(day_start_hour, day_end_hour)
            .map_err(|e| format!("invalid operating hours {day_start_hour}-{day_end_hour}: {e}"))?;

        let slot_duration = parse_or(&get, "SLOT_MINUTES", 60u32)?;
        if slot_duration == 0 || slot_duration > MAX_SLOT_MINUTES {
            return Err(format!("{PREFIX}SLOT_MINUTES must be in 1..={MAX_SLOT_MINUTES}"));
        }
        let max_suggestions = parse_or(&get, "MAX_SUGGESTIONS", 3usize)?;
        if max_suggestions > MAX_SUGGESTIONS {
            return Err(format!("{PREFIX}MAX_SUGGESTIONS must be at most {MAX_SUGGESTIONS}"));
        }
        let rounding = parse_or(&get, "ROUNDING", Rounding::HalfHour)?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(format!("{PREFIX}JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"));
            }
            Some(secret) => secret,
            None => {
                warn!("{PREFIX}JWT_SECRET not set, using an ephemeral secret; tokens will not survive a restart");
                format!("{}{}", Ulid::new(), Ulid::new())
            }
        };
        let token_ttl_secs = parse_or(&get, "TOKEN_TTL_SECS", 3600u64)?;
        if token_ttl_secs == 0 {
            return Err(format!("{PREFIX}TOKEN_TTL_SECS must be positive"));
        }

        Ok(Self {
            bind: get("BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PORT", 5000u16)?,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "./data".into())),
            metrics_port: get("METRICS_PORT")
                .map(|v| parse_value("METRICS_PORT", &v))
                .transpose()?,
            policy: SuggestionPolicy {
                slot_duration,
                max_suggestions,
                hours,
                rounding,
            },
            compact_threshold: parse_or(&get, "COMPACT_THRESHOLD", 1000u64)?,
            admin_username: get("ADMIN_USERNAME").map(|v| v.trim().to_string()),
            seed_rooms: parse_or(&get, "SEED_ROOMS", false)?,
            jwt_secret,
            token_ttl_secs,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, String>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {PREFIX}{key} value {raw:?}: {e}");
        format!("invalid {PREFIX}{key}: {e}")
    })
}

fn parse_or<T: FromStr + Display>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String>
where
    T::Err: Display,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => {
            info!("{PREFIX}{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
