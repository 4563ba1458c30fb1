use std::sync::OnceLock;

use regex::Regex;

/// Minutes assumed when a duration cannot be read.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

const HOUR_MARKERS: [&str; 2] = ["hour", "ساع"];
const MINUTE_MARKERS: [&str; 3] = ["min", "دقيق", "دقائق"];

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9٠-٩۰-۹]+(?:[.٫][0-9٠-٩۰-۹]+)?|[.٫][0-9٠-٩۰-۹]+")
            .expect("duration pattern is a valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Hours,
    Minutes,
    Unspecified,
}

impl DurationUnit {
    /// An hour marker wins when both appear ("1 hour 30 min" reads as 60).
    pub fn detect(text: &str) -> Self {
        let text = text.to_lowercase();
        if HOUR_MARKERS.iter().any(|m| text.contains(m)) {
            DurationUnit::Hours
        } else if MINUTE_MARKERS.iter().any(|m| text.contains(m)) {
            DurationUnit::Minutes
        } else {
            DurationUnit::Unspecified
        }
    }
}

/// Reads a service duration such as "45 minutes", "1.5 hours" or "2 ساعات".
///
/// Returns `None` when the text holds no number.
pub fn parse_duration(text: &str) -> Option<u32> {
    let normalized = text.trim().to_lowercase();
    let token = number_pattern().find(&normalized)?;
    let value: f64 = to_ascii_number(token.as_str()).parse().ok()?;

    let minutes = match DurationUnit::detect(&normalized) {
        DurationUnit::Hours => value * 60.0,
        DurationUnit::Minutes | DurationUnit::Unspecified => value,
    };

    Some(minutes.round() as u32)
}

/// Like [`parse_duration`], falling back to [`DEFAULT_DURATION_MINUTES`].
pub fn parse_duration_minutes(text: &str) -> u32 {
    parse_duration(text).unwrap_or(DEFAULT_DURATION_MINUTES)
}

fn to_ascii_number(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٫' => '.',
            other => other,
        })
        .collect()
}
