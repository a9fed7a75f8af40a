//! Enumeration types for the House Cup ledger.
//!
//! [`House`] is the fixed set of competing groups. [`Window`] is the
//! trailing time filter applied before aggregation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Houses
// ---------------------------------------------------------------------------

/// One of the four Hogwarts houses competing for the cup.
///
/// The set is closed: houses are reference data seeded once and never
/// created, renamed, or removed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum House {
    /// Red and gold.
    Gryffindor,
    /// Green and silver.
    Slytherin,
    /// Blue and bronze.
    Ravenclaw,
    /// Yellow and black.
    Hufflepuff,
}

impl House {
    /// Every house, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Gryffindor,
        Self::Slytherin,
        Self::Ravenclaw,
        Self::Hufflepuff,
    ];

    /// The house name as stored in the ledger.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gryffindor => "Gryffindor",
            Self::Slytherin => "Slytherin",
            Self::Ravenclaw => "Ravenclaw",
            Self::Hufflepuff => "Hufflepuff",
        }
    }

    /// Display color as a hex string.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Gryffindor => "#740001",
            Self::Slytherin => "#1a472a",
            Self::Ravenclaw => "#0e1a40",
            Self::Hufflepuff => "#ecb939",
        }
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name one of the four houses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown house: {0}")]
pub struct UnknownHouse(pub String);

impl FromStr for House {
    type Err = UnknownHouse;

    /// Parse a house from its exact, case-sensitive name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|house| house.name() == s)
            .ok_or_else(|| UnknownHouse(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Time windows
// ---------------------------------------------------------------------------

/// Trailing time window applied to entries before they are aggregated.
///
/// Serialized as the tokens accepted at the API boundary: `5min`, `1hour`,
/// `24hours`, `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Window {
    /// The last 5 minutes.
    #[serde(rename = "5min")]
    FiveMinutes,
    /// The last 60 minutes.
    #[serde(rename = "1hour")]
    OneHour,
    /// The last 1440 minutes.
    #[serde(rename = "24hours")]
    OneDay,
    /// No time filter.
    #[default]
    #[serde(rename = "all")]
    AllTime,
}

impl Window {
    /// Every window, narrowest first.
    pub const ALL: [Self; 4] = [Self::FiveMinutes, Self::OneHour, Self::OneDay, Self::AllTime];

    /// Normalize an optional boundary token into a window.
    ///
    /// Missing and unrecognized tokens fall back to [`Window::AllTime`];
    /// this never fails.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("5min") => Self::FiveMinutes,
            Some("1hour") => Self::OneHour,
            Some("24hours") => Self::OneDay,
            _ => Self::AllTime,
        }
    }

    /// The boundary token for this window.
    pub const fn token(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5min",
            Self::OneHour => "1hour",
            Self::OneDay => "24hours",
            Self::AllTime => "all",
        }
    }

    /// Trailing duration in minutes, or `None` for no filter.
    pub const fn minutes(self) -> Option<u32> {
        match self {
            Self::FiveMinutes => Some(5),
            Self::OneHour => Some(60),
            Self::OneDay => Some(1440),
            Self::AllTime => None,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
