use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_token: Option<String>,
    pub queue: QueueConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_token: env::var("SUPABASE_SERVICE_TOKEN").ok(),
            queue: QueueConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid peak window {0}: start must be before end and both within 0..=24")]
    InvalidPeakWindow(PeakWindow),

    #[error("Peak multiplier must be a finite, non-negative number, got {0}")]
    InvalidPeakMultiplier(f64),

    #[error("Blend weight must be within [0, 1], got {0}")]
    InvalidBlendWeight(f64),

    #[error("Could not parse peak window '{0}', expected START-END")]
    MalformedPeakWindow(String),

    #[error("Lookback must be at most {max} days, got {0}", max = MAX_LOOKBACK_DAYS)]
    InvalidLookbackDays(u32),
}

/// Upper bound on `QueueConfig::lookback_days`.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Half-open hour range `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl PeakWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }

    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24
    }
}

impl fmt::Display for PeakWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

impl FromStr for PeakWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedPeakWindow(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let window = PeakWindow::new(
            start.trim().parse().map_err(|_| malformed())?,
            end.trim().parse().map_err(|_| malformed())?,
        );

        if !window.is_valid() {
            return Err(ConfigError::InvalidPeakWindow(window));
        }
        Ok(window)
    }
}

/// Tuning knobs for wait-time estimation and statistics aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub peak_windows: Vec<PeakWindow>,
    /// Gap added after each appointment ahead in the queue.
    pub buffer_minutes: u32,
    pub peak_multiplier: f64,
    /// Days before the candidate date searched for historical statistics.
    pub lookback_days: u32,
    /// Share of the final estimate taken from the historical average.
    pub blend_weight: f64,
    /// Used when a service is unknown or has no recorded durations.
    pub default_service_minutes: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            peak_windows: vec![PeakWindow::new(12, 14), PeakWindow::new(18, 20)],
            buffer_minutes: 5,
            peak_multiplier: 1.5,
            lookback_days: 30,
            blend_weight: 0.25,
            default_service_minutes: 30,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, keeping the default for
    /// every key that is absent or fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let peak_windows = match lookup("QUEUE_PEAK_WINDOWS") {
            Some(raw) => match parse_peak_windows(&raw) {
                Ok(windows) => windows,
                Err(e) => {
                    warn!("QUEUE_PEAK_WINDOWS invalid ({}), using defaults", e);
                    defaults.peak_windows.clone()
                }
            },
            None => defaults.peak_windows.clone(),
        };

        let config = Self {
            peak_windows,
            buffer_minutes: parse_or(&lookup, "QUEUE_BUFFER_MINUTES", defaults.buffer_minutes),
            peak_multiplier: parse_or(&lookup, "QUEUE_PEAK_MULTIPLIER", defaults.peak_multiplier),
            lookback_days: parse_or(&lookup, "QUEUE_LOOKBACK_DAYS", defaults.lookback_days),
            blend_weight: parse_or(&lookup, "QUEUE_BLEND_WEIGHT", defaults.blend_weight),
            default_service_minutes: parse_or(
                &lookup,
                "QUEUE_DEFAULT_SERVICE_MINUTES",
                defaults.default_service_minutes,
            ),
        };

        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("Queue configuration rejected ({}), using defaults", e);
                defaults
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(window) = self.peak_windows.iter().find(|w| !w.is_valid()) {
            return Err(ConfigError::InvalidPeakWindow(*window));
        }
        if !self.peak_multiplier.is_finite() || self.peak_multiplier < 0.0 {
            return Err(ConfigError::InvalidPeakMultiplier(self.peak_multiplier));
        }
        if !(0.0..=1.0).contains(&self.blend_weight) {
            return Err(ConfigError::InvalidBlendWeight(self.blend_weight));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::InvalidLookbackDays(self.lookback_days));
        }
        Ok(())
    }

    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_windows.iter().any(|window| window.contains(hour))
    }
}

/// Parses `"12-14,18-20"`. An empty string disables peak windows.
pub fn parse_peak_windows(raw: &str) -> Result<Vec<PeakWindow>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}
