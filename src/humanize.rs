//! Human-readable duration formatting and parsing utilities

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Duration wrapper with human-readable parsing ("1h", "10s", "500ms")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u128)] = &[
            ("ms", 1),
            ("s", 1000),
            ("m", 60 * 1000),
            ("h", 60 * 60 * 1000),
            ("d", 24 * 60 * 60 * 1000),
        ];

        let millis = self.0.as_millis();
        if millis == 0 {
            return "0s".to_string();
        }

        // Largest unit that divides evenly
        for &(unit, divisor) in UNITS.iter().rev() {
            if millis % divisor == 0 {
                return format!("{}{}", millis / divisor, unit);
            }
        }

        format!("{}ms", millis)
    }
}

impl From<Duration> for HumanDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_human_readable())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HumanDurationVisitor;

        impl<'de> serde::de::Visitor<'de> for HumanDurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as string (e.g., \"10s\", \"1h\") or integer seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration::from_secs(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration::from_secs)
                    .map_err(|_| E::custom(format!("duration must not be negative: {v}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanDuration>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(HumanDurationVisitor)
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        // Bare numbers are seconds
        if let Ok(num) = s.parse::<u64>() {
            return Ok(HumanDuration::from_secs(num));
        }

        let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
            Some(pos) if pos > 0 => (&s[..pos], &s[pos..]),
            _ => return Err(ParseError::InvalidFormat(s.to_string())),
        };

        let num: u64 = num_str.parse()?;

        let duration = match unit.trim() {
            "ms" => Duration::from_millis(num),
            "s" | "sec" | "secs" => Duration::from_secs(num),
            "m" | "min" | "mins" => Duration::from_secs(num * 60),
            "h" | "hr" | "hrs" => Duration::from_secs(num * 60 * 60),
            "d" | "day" | "days" => Duration::from_secs(num * 24 * 60 * 60),
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}
