use crate::date::{add_months_rollover, is_weekend, parse_date, parse_wall_clock};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid start datetime: `{0}`")]
    InvalidStart(String),
    #[error("Invalid end datetime: `{0}`")]
    InvalidEnd(String),
    #[error("Invalid until date: `{0}`")]
    InvalidUntil(String),
    #[error("Invalid frequency: `{0}`. Expected one of daily, weekly or monthly")]
    InvalidFrequency(String),
    #[error("The end: {end} must be after the start: {start}")]
    EndNotAfterStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("The recurrence expands into more than {0} instances")]
    TooManyInstances(usize),
}

/// How far the cursor moves between two occurrences. A two week cadence
/// is `Weekly` with an interval of 2, there is no separate frequency for it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceFrequency {
    fn advance(&self, cursor: NaiveDateTime, interval: u32) -> Option<NaiveDateTime> {
        match self {
            Self::Daily => cursor.checked_add_signed(Duration::days(interval as i64)),
            Self::Weekly => cursor.checked_add_signed(Duration::days(interval as i64 * 7)),
            Self::Monthly => add_months_rollover(cursor, interval),
        }
    }
}

impl Display for RecurrenceFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let freq = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        write!(f, "{}", freq)
    }
}

impl FromStr for RecurrenceFrequency {
    type Err = ValidationError;

    fn from_str(freq: &str) -> Result<Self, Self::Err> {
        match freq.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(ValidationError::InvalidFrequency(freq.to_string())),
        }
    }
}

/// A recurrence rule as it arrives with a booking request, before any
/// validation has happened.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRuleInput {
    pub start: String,
    pub end: String,
    pub frequency: String,
    #[serde(default)]
    pub interval: Option<i64>,
    pub until: String,
    #[serde(default)]
    pub exclude_dates: Vec<String>,
}

impl RecurrenceRuleInput {
    pub fn parse(&self) -> Result<RecurrenceRule, ValidationError> {
        let start = parse_wall_clock(&self.start)
            .ok_or_else(|| ValidationError::InvalidStart(self.start.clone()))?;
        let end = parse_wall_clock(&self.end)
            .ok_or_else(|| ValidationError::InvalidEnd(self.end.clone()))?;
        let until =
            parse_date(&self.until).ok_or_else(|| ValidationError::InvalidUntil(self.until.clone()))?;
        let frequency = self.frequency.parse::<RecurrenceFrequency>()?;

        // A malformed exclude date can never match an occurrence
        let exclude_dates = self.exclude_dates.iter().filter_map(|d| parse_date(d));

        Ok(RecurrenceRule::new(
            start,
            end,
            frequency,
            self.interval.unwrap_or(1),
            until,
        )?
        .exclude(exclude_dates))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub frequency: RecurrenceFrequency,
    pub interval: u32,
    pub until: NaiveDate,
    pub exclude_dates: BTreeSet<NaiveDate>,
}

impl RecurrenceRule {
    /// `interval` values below 1 are treated as 1.
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: RecurrenceFrequency,
        interval: i64,
        until: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EndNotAfterStart { start, end });
        }
        let interval = if interval >= 1 && interval <= u32::MAX as i64 {
            interval as u32
        } else {
            1
        };

        Ok(Self {
            start,
            end,
            frequency,
            interval,
            until,
            exclude_dates: BTreeSet::new(),
        })
    }

    pub fn exclude<I: IntoIterator<Item = NaiveDate>>(mut self, dates: I) -> Self {
        self.exclude_dates.extend(dates);
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Clone, Debug)]
pub struct ExpansionOptions {
    /// When false, occurrences falling on a Saturday or Sunday are skipped
    pub weekends_enabled: bool,
    /// Optional upper bound on the number of instances a single rule may
    /// produce. Unbounded when `None`.
    pub max_instances: Option<usize>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            weekends_enabled: false,
            max_instances: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInstance {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Expands a `RecurrenceRule` into its concrete occurrences, ordered by start.
///
/// The last calendar day is inclusive: every occurrence starting on or before
/// `until` at 23:59:59.999 is considered. Weekend and excluded dates are
/// decided from the wall-clock date of the occurrence start.
pub fn expand(
    rule: &RecurrenceRule,
    options: &ExpansionOptions,
) -> Result<Vec<TimeInstance>, ValidationError> {
    let last_moment = match rule.until.and_hms_milli_opt(23, 59, 59, 999) {
        Some(moment) => moment,
        None => return Ok(Vec::new()),
    };
    let duration = rule.duration();

    let mut instances = Vec::new();
    let mut cursor = rule.start;
    while cursor <= last_moment {
        let date_key = cursor.date();
        let skipped_weekend = !options.weekends_enabled && is_weekend(date_key);

        if !skipped_weekend && !rule.exclude_dates.contains(&date_key) {
            if let Some(max_instances) = options.max_instances {
                if instances.len() >= max_instances {
                    return Err(ValidationError::TooManyInstances(max_instances));
                }
            }
            instances.push(TimeInstance {
                start: cursor,
                end: cursor + duration,
            });
        }

        cursor = match rule.frequency.advance(cursor, rule.interval) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(instances)
}
