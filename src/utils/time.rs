use std::fmt::Display;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};
use chrono_english::parse_date_string;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses user input like "yesterday", "1 hour ago" or "12:00 16/03/2025" relative to `now`.
pub fn parse_moment(input: &str, now: DateTime<Local>, style: DateStyle) -> Result<DateTime<Utc>> {
    parse_date_string(input, now, style.into())
        .map(|v| v.to_utc())
        .map_err(|e| anyhow!("Failed to parse date '{input}': {e}"))
}
