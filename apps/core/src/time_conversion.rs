use chrono::{DateTime, FixedOffset, Local, Utc};
use thiserror::Error;

use crate::clipboard_backend::SharedClipboard;
use crate::model::{ResultItem, TAG_TIME};
use crate::provider::{Provider, ProviderError};

const MIN_QUERY_CHARS: usize = 5;
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeErrorCode {
    #[error("not a time expression")]
    Unrecognized,
    #[error("invalid utc offset")]
    InvalidOffset,
    #[error("timestamp out of range")]
    OutOfRange,
}

pub trait TimeEngine: Send {
    fn convert(&self, input: &str) -> Result<String, TimeErrorCode>;
}

/// Understands `time now`, `now in`/`time in utc[±H[:MM]]`, `unix now` and
/// `unix <seconds>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChronoTimeEngine;

impl ChronoTimeEngine {
    fn convert_at(&self, input: &str, now: DateTime<Utc>) -> Result<String, TimeErrorCode> {
        let input = input.trim().to_lowercase();
        let words: Vec<&str> = input.split_whitespace().collect();

        match words.as_slice() {
            ["time", "now"] => Ok(now
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %:z")
                .to_string()),
            ["time", "in", zone] | ["now", "in", zone] => {
                let offset = parse_utc_offset(zone)?;
                Ok(format!(
                    "{} {}",
                    now.with_timezone(&offset).format(DISPLAY_FORMAT),
                    zone.to_uppercase()
                ))
            }
            ["unix", "now"] => Ok(now.timestamp().to_string()),
            ["unix", seconds] => {
                let seconds: i64 = seconds.parse().map_err(|_| TimeErrorCode::Unrecognized)?;
                let at =
                    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(TimeErrorCode::OutOfRange)?;
                Ok(format!("{} UTC", at.format(DISPLAY_FORMAT)))
            }
            _ => Err(TimeErrorCode::Unrecognized),
        }
    }
}

impl TimeEngine for ChronoTimeEngine {
    fn convert(&self, input: &str) -> Result<String, TimeErrorCode> {
        self.convert_at(input, Utc::now())
    }
}

/// `utc`, `gmt`, `utc+2`, `utc-03:30`.
fn parse_utc_offset(zone: &str) -> Result<FixedOffset, TimeErrorCode> {
    let rest = zone
        .strip_prefix("utc")
        .or_else(|| zone.strip_prefix("gmt"))
        .ok_or(TimeErrorCode::Unrecognized)?;
    if rest.is_empty() {
        return FixedOffset::east_opt(0).ok_or(TimeErrorCode::InvalidOffset);
    }

    let (sign, digits) = if let Some(digits) = rest.strip_prefix('+') {
        (1, digits)
    } else if let Some(digits) = rest.strip_prefix('-') {
        (-1, digits)
    } else {
        return Err(TimeErrorCode::InvalidOffset);
    };
    let (hours, minutes) = digits.split_once(':').unwrap_or((digits, "0"));
    let hours: i32 = hours.parse().map_err(|_| TimeErrorCode::InvalidOffset)?;
    let minutes: i32 = minutes.parse().map_err(|_| TimeErrorCode::InvalidOffset)?;
    if hours > 14 || minutes >= 60 {
        return Err(TimeErrorCode::InvalidOffset);
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or(TimeErrorCode::InvalidOffset)
}

pub struct TimeProvider {
    engine: Box<dyn TimeEngine>,
    clipboard: SharedClipboard,
}

impl TimeProvider {
    pub fn new(clipboard: SharedClipboard) -> Self {
        Self::with_engine(Box::new(ChronoTimeEngine), clipboard)
    }

    pub fn with_engine(engine: Box<dyn TimeEngine>, clipboard: SharedClipboard) -> Self {
        Self { engine, clipboard }
    }
}

impl Provider for TimeProvider {
    fn name(&self) -> &str {
        "Time"
    }

    fn icon(&self) -> &str {
        "accessories-clock"
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        if query.trim().chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }
        match self.engine.convert(query) {
            Ok(result) => Ok(vec![ResultItem::new(
                &result,
                "Press Enter to copy",
                "accessories-clock",
                &result,
                TAG_TIME,
            )]),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        self.clipboard
            .write_text(&item.payload)
            .map_err(|error| ProviderError::Clipboard(error.to_string()))
    }
}
