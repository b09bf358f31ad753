use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Unit suffix of a candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl IntervalUnit {
    pub const fn suffix(self) -> char {
        match self {
            Self::Minute => 'm',
            Self::Hour => 'h',
            Self::Day => 'd',
            Self::Week => 'w',
        }
    }

    pub const fn seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
        }
    }

    fn from_suffix(ch: char) -> Option<Self> {
        match ch {
            'm' => Some(Self::Minute),
            'h' => Some(Self::Hour),
            'd' => Some(Self::Day),
            'w' => Some(Self::Week),
            _ => None,
        }
    }
}

/// Candle time bucket matching `^[1-9][0-9]*(m|h|d|w)$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    count: u32,
    unit: IntervalUnit,
}

impl Interval {
    pub const ONE_MINUTE: Self = Self::new_unchecked(1, IntervalUnit::Minute);
    pub const ONE_HOUR: Self = Self::new_unchecked(1, IntervalUnit::Hour);
    pub const ONE_DAY: Self = Self::new_unchecked(1, IntervalUnit::Day);
    pub const ONE_WEEK: Self = Self::new_unchecked(1, IntervalUnit::Week);

    const fn new_unchecked(count: u32, unit: IntervalUnit) -> Self {
        Self { count, unit }
    }

    pub fn new(count: u32, unit: IntervalUnit) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::InvalidInterval {
                value: format!("0{}", unit.suffix()),
            });
        }
        Ok(Self { count, unit })
    }

    pub const fn count(self) -> u32 {
        self.count
    }

    pub const fn unit(self) -> IntervalUnit {
        self.unit
    }

    /// Bucket width in seconds.
    pub const fn seconds(self) -> i64 {
        self.count as i64 * self.unit.seconds()
    }

    pub const fn millis(self) -> i64 {
        self.seconds() * 1_000
    }

    /// Whether `self` is a coarser-or-equal whole multiple of `finer`.
    pub const fn is_multiple_of(self, finer: Self) -> bool {
        self.seconds() >= finer.seconds() && self.seconds() % finer.seconds() == 0
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidInterval {
            value: value.to_owned(),
        };

        let mut chars = value.chars();
        let unit = chars
            .next_back()
            .and_then(IntervalUnit::from_suffix)
            .ok_or_else(invalid)?;
        let digits = chars.as_str();

        let leading_ok = digits.chars().next().is_some_and(|ch| ('1'..='9').contains(&ch));
        if !leading_ok || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid());
        }

        let count = digits.parse::<u32>().map_err(|_| invalid())?;
        Self::new(count, unit)
    }
}

impl TryFrom<String> for Interval {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}
