use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::booking::CycleSettings;
use crate::gateway::PlatformSettings;
use crate::model::REFERENCE_TZ;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Process configuration, read from `COURTRUSH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub platform: PlatformSettings,
    pub space_id: String,
    pub sport_type: String,
    pub window: String,
    /// Day to book; `None` means tomorrow in the reference zone.
    pub date: Option<NaiveDate>,
    /// `None` skips the release gate and claims right away.
    pub release_at: Option<NaiveTime>,
    pub phone: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub open_id: String,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = PlatformSettings::default();

        let request_timeout = match get("COURTRUSH_REQUEST_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse("COURTRUSH_REQUEST_TIMEOUT_MS", &v)?),
            None => defaults.request_timeout,
        };
        let platform = PlatformSettings {
            base_url: get("COURTRUSH_BASE_URL").unwrap_or(defaults.base_url),
            api_version: get("COURTRUSH_API_VERSION").unwrap_or(defaults.api_version),
            order_page_url: get("COURTRUSH_ORDER_PAGE_URL").unwrap_or(defaults.order_page_url),
            request_timeout,
        };

        let date = get("COURTRUSH_DATE")
            .map(|v| {
                NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|e| invalid("COURTRUSH_DATE", &v, e))
            })
            .transpose()?;

        let release_at = match get("COURTRUSH_RELEASE_AT") {
            None => Some(default_release_time()),
            Some(v) if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("now") => None,
            Some(v) => Some(parse_time("COURTRUSH_RELEASE_AT", &v)?),
        };

        let metrics_port = get("COURTRUSH_METRICS_PORT")
            .map(|v| parse("COURTRUSH_METRICS_PORT", &v))
            .transpose()?;

        Ok(Self {
            platform,
            space_id: get("COURTRUSH_SPACE_ID").unwrap_or_else(|| "111162".into()),
            sport_type: get("COURTRUSH_SPORT_TYPE").unwrap_or_else(|| "2".into()),
            window: get("COURTRUSH_WINDOW").unwrap_or_else(|| "16:30--18:30".into()),
            date,
            release_at,
            phone: get("COURTRUSH_PHONE"),
            token: get("COURTRUSH_TOKEN"),
            user_id: get("COURTRUSH_USER_ID"),
            open_id: get("COURTRUSH_OPEN_ID").unwrap_or_default(),
            metrics_port,
        })
    }

    /// The configured date, or the day after `now` in the reference zone.
    pub fn booking_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.date.unwrap_or_else(|| {
            let today = now.with_timezone(&REFERENCE_TZ).date_naive();
            today.succ_opt().unwrap_or(today)
        })
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            space_id: self.space_id.clone(),
            sport_type: self.sport_type.clone(),
            release_at: self.release_at,
            exchange_timeout: self.platform.request_timeout,
        }
    }
}

pub fn default_release_time() -> NaiveTime {
    NaiveTime::MIN + chrono::TimeDelta::hours(10)
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| invalid(var, value, e))
}

fn parse_time(var: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| invalid(var, value, e))
}

fn invalid(var: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
