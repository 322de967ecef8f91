use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;

/// Identifier of a tracked construct. The same id names the package on every
/// platform, modulo per-platform naming quirks handled by the clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructId(String);

impl ConstructId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConstructId {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && !normalized.starts_with('-')
            && !normalized.ends_with('-')
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');
        if !is_valid {
            return Err(PulseError::InvalidConstructId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// A calendar month, the key of the accumulated download series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, PulseError> {
        if !(1..=12).contains(&month) {
            return Err(PulseError::InvalidMonth(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn one_year_earlier(&self) -> Self {
        Self {
            year: self.year - 1,
            month: self.month,
        }
    }

    pub fn plus_months(&self, count: u32) -> Self {
        let zero_based = self.month - 1 + count;
        Self {
            year: self.year + (zero_based / 12) as i32,
            month: zero_based % 12 + 1,
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = PulseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| PulseError::InvalidMonth(value.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| PulseError::InvalidMonth(value.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| PulseError::InvalidMonth(value.to_string()))?;
        Self::new(year, month).map_err(|_| PulseError::InvalidMonth(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Npm,
    PyPi,
    Maven,
    Nuget,
    Go,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Npm,
        Platform::PyPi,
        Platform::Maven,
        Platform::Nuget,
        Platform::Go,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Platform::Npm => "NPM",
            Platform::PyPi => "PyPI",
            Platform::Maven => "Java",
            Platform::Nuget => "NuGet",
            Platform::Go => "Go",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
