//! Five-field cadence expressions.
//!
//! A cadence is `minute hour day-of-month month day-of-week`, where every
//! field is a literal, `*`, or `*/step`. Parsing is strict: ranges, lists and
//! names are rejected so that what an operator writes in the config is exactly
//! what the scheduler fires on. Next-fire computation is delegated to the
//! `cron` crate; each field is expanded into an explicit value list first so
//! the two grammars never disagree on step origins or weekday numbering.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CadenceError {
    #[error("cadence '{expr}' must have 5 fields, found {found}")]
    FieldCount { expr: String, found: usize },
    #[error("invalid {field} value '{value}' in cadence '{expr}'")]
    InvalidField {
        expr: String,
        field: &'static str,
        value: String,
    },
    #[error("{field} value {value} out of range {min}-{max} in cadence '{expr}'")]
    OutOfRange {
        expr: String,
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("cadence '{expr}' has no upcoming fire time")]
    Unschedulable { expr: String },
}

/// One field of a cadence expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceField {
    /// `*`
    Any,
    /// `*/N`
    Step(u32),
    /// A literal value.
    Value(u32),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
};
// 0 and 7 are both Sunday.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
};

impl CadenceField {
    fn parse(raw: &str, spec: FieldSpec, expr: &str) -> Result<Self, CadenceError> {
        let invalid = || CadenceError::InvalidField {
            expr: expr.to_string(),
            field: spec.name,
            value: raw.to_string(),
        };

        if raw == "*" {
            return Ok(CadenceField::Any);
        }

        if let Some(step) = raw.strip_prefix("*/") {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            return Ok(CadenceField::Step(step));
        }

        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u32 = raw.parse().map_err(|_| invalid())?;
        if value < spec.min || value > spec.max {
            return Err(CadenceError::OutOfRange {
                expr: expr.to_string(),
                field: spec.name,
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        Ok(CadenceField::Value(value))
    }

    /// Render the field for the `cron` crate, expanding steps into lists.
    fn to_cron_field(self, spec: FieldSpec) -> String {
        match self {
            CadenceField::Any => "*".to_string(),
            CadenceField::Value(v) => v.to_string(),
            CadenceField::Step(step) => (spec.min..=spec.max)
                .step_by(step as usize)
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn to_cron_weekday(self) -> String {
        match self {
            CadenceField::Any => "*".to_string(),
            CadenceField::Value(v) => WEEKDAY_NAMES[(v % 7) as usize].to_string(),
            CadenceField::Step(step) => (0..7usize)
                .step_by(step as usize)
                .map(|v| WEEKDAY_NAMES[v])
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// A parsed, validated cadence expression.
#[derive(Debug, Clone)]
pub struct Cadence {
    expr: String,
    pub minute: CadenceField,
    pub hour: CadenceField,
    pub day_of_month: CadenceField,
    pub month: CadenceField,
    pub day_of_week: CadenceField,
    schedule: Schedule,
}

impl Cadence {
    pub fn parse(expr: &str) -> Result<Self, CadenceError> {
        let normalized = expr.split_whitespace().collect::<Vec<_>>();
        if normalized.len() != 5 {
            return Err(CadenceError::FieldCount {
                expr: expr.to_string(),
                found: normalized.len(),
            });
        }
        let expr_owned = normalized.join(" ");

        let minute = CadenceField::parse(normalized[0], MINUTE, &expr_owned)?;
        let hour = CadenceField::parse(normalized[1], HOUR, &expr_owned)?;
        let day_of_month = CadenceField::parse(normalized[2], DAY_OF_MONTH, &expr_owned)?;
        let month = CadenceField::parse(normalized[3], MONTH, &expr_owned)?;
        let day_of_week = CadenceField::parse(normalized[4], DAY_OF_WEEK, &expr_owned)?;

        // The cron crate wants a leading seconds field.
        let cron_expr = format!(
            "0 {} {} {} {} {}",
            minute.to_cron_field(MINUTE),
            hour.to_cron_field(HOUR),
            day_of_month.to_cron_field(DAY_OF_MONTH),
            month.to_cron_field(MONTH),
            day_of_week.to_cron_weekday(),
        );
        let schedule =
            Schedule::from_str(&cron_expr).map_err(|_| CadenceError::Unschedulable {
                expr: expr_owned.clone(),
            })?;

        let cadence = Self {
            expr: expr_owned,
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
            schedule,
        };

        // e.g. "0 0 31 2 *" parses but never fires.
        if cadence.next_after(Utc::now()).is_none() {
            return Err(CadenceError::Unschedulable { expr: cadence.expr });
        }
        Ok(cadence)
    }

    /// The normalized expression (fields separated by single spaces).
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// The first fire time strictly after `after`, truncated to the minute.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

impl FromStr for Cadence {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cadence::parse(s)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl PartialEq for Cadence {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for Cadence {}
