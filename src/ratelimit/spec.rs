//! Rate specification parsing.
//!
//! A rate is written either as `"<N>/<unit>"` (for example `"10/minute"`),
//! which allows a burst of `N` and refills `N` tokens per unit, or as an
//! explicit `(capacity, refill_amount, refill_period_seconds)` triple when the
//! burst size and the refill amount should differ.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigurationError;

/// Time unit accepted by the string grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateUnit {
    /// Get the duration of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            RateUnit::Second => Duration::from_secs(1),
            RateUnit::Minute => Duration::from_secs(60),
            RateUnit::Hour => Duration::from_secs(3600),
            RateUnit::Day => Duration::from_secs(86400),
        }
    }
}

impl FromStr for RateUnit {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "second" | "seconds" => Ok(RateUnit::Second),
            "minute" | "minutes" => Ok(RateUnit::Minute),
            "hour" | "hours" => Ok(RateUnit::Hour),
            "day" | "days" => Ok(RateUnit::Day),
            _ => Err(ConfigurationError::UnknownUnit(s.to_string())),
        }
    }
}

/// Validated parameters for one token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSpec {
    capacity: u64,
    refill_amount: f64,
    refill_period: Duration,
}

impl RateSpec {
    /// Build a spec from its parts, rejecting zero or non-finite values.
    pub fn new(
        capacity: u64,
        refill_amount: f64,
        refill_period: Duration,
    ) -> Result<Self, ConfigurationError> {
        if capacity == 0 {
            return Err(ConfigurationError::NonPositive {
                field: "capacity",
                value: capacity.to_string(),
            });
        }
        if !(refill_amount.is_finite() && refill_amount > 0.0) {
            return Err(ConfigurationError::NonPositive {
                field: "refill_amount",
                value: refill_amount.to_string(),
            });
        }
        if refill_period.is_zero() {
            return Err(ConfigurationError::NonPositive {
                field: "refill_period",
                value: format!("{:?}", refill_period),
            });
        }

        Ok(Self {
            capacity,
            refill_amount,
            refill_period,
        })
    }

    /// Build a spec from the numeric triple form.
    pub fn from_parts(
        capacity: u64,
        refill_amount: f64,
        refill_period_seconds: f64,
    ) -> Result<Self, ConfigurationError> {
        if !(refill_period_seconds.is_finite() && refill_period_seconds > 0.0) {
            return Err(ConfigurationError::NonPositive {
                field: "refill_period_seconds",
                value: refill_period_seconds.to_string(),
            });
        }
        let period = Duration::try_from_secs_f64(refill_period_seconds).map_err(|_| {
            ConfigurationError::Malformed(format!(
                "refill_period_seconds = {}",
                refill_period_seconds
            ))
        })?;
        Self::new(capacity, refill_amount, period)
    }

    /// Parse the `"<N>/<unit>"` grammar.
    ///
    /// Units are case-insensitive and may be plural. Both the capacity and the
    /// refill amount are set to `N`.
    pub fn parse(literal: &str) -> Result<Self, ConfigurationError> {
        let malformed = || ConfigurationError::Malformed(literal.to_string());

        let (count, unit) = literal.split_once('/').ok_or_else(malformed)?;
        let (count, unit) = (count.trim(), unit.trim());
        if count.is_empty() || unit.is_empty() || unit.contains('/') {
            return Err(malformed());
        }

        // Plain decimal digits only; a leading '-' is reported as non-positive.
        let negative = count.starts_with('-');
        let digits = if negative { &count[1..] } else { count };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let n: u64 = digits.parse().map_err(|_| malformed())?;
        if negative || n == 0 {
            return Err(ConfigurationError::NonPositive {
                field: "count",
                value: count.to_string(),
            });
        }
        let unit: RateUnit = unit.parse()?;

        Self::new(n, n as f64, unit.duration())
    }

    /// Maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens granted per refill period.
    pub fn refill_amount(&self) -> f64 {
        self.refill_amount
    }

    /// Interval over which `refill_amount` tokens are granted.
    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }
}

impl FromStr for RateSpec {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RateSpec::parse(s)
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} per {:?} (burst {})",
            self.refill_amount, self.refill_period, self.capacity
        )
    }
}

/// A rate as it appears in configuration, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateDescriptor {
    /// `"<N>/<unit>"`
    Literal(String),
    /// Explicit numeric form
    Explicit {
        capacity: u64,
        refill_amount: f64,
        refill_period_seconds: f64,
    },
}

impl RateDescriptor {
    /// Validate the descriptor into a [`RateSpec`].
    pub fn to_spec(&self) -> Result<RateSpec, ConfigurationError> {
        match self {
            RateDescriptor::Literal(literal) => RateSpec::parse(literal),
            RateDescriptor::Explicit {
                capacity,
                refill_amount,
                refill_period_seconds,
            } => RateSpec::from_parts(*capacity, *refill_amount, *refill_period_seconds),
        }
    }
}

impl From<&str> for RateDescriptor {
    fn from(literal: &str) -> Self {
        RateDescriptor::Literal(literal.to_string())
    }
}

impl TryFrom<&RateDescriptor> for RateSpec {
    type Error = ConfigurationError;

    fn try_from(descriptor: &RateDescriptor) -> Result<Self, Self::Error> {
        descriptor.to_spec()
    }
}
