//! Filter type selector
//!
//! The set of filter constructions is closed and known at compile time.
//! Raw integers from callers are parsed into `FilterType` at the boundary;
//! everything past that point works with the enum only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Golomb-Rice parameter for basic filters
pub const BASIC_FILTER_P: u8 = 20;

/// Golomb-Rice parameter for extended filters
pub const EXTENDED_FILTER_P: u8 = 20;

/// A filter construction variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FilterType {
    /// Txids, spent outpoints, and output scripts.
    Basic = 0,
    /// Input scripts and witness items.
    Extended = 1,
}

impl FilterType {
    /// Every defined filter type, in wire order.
    pub const ALL: [FilterType; 2] = [FilterType::Basic, FilterType::Extended];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterType::Basic => "basic",
            FilterType::Extended => "extended",
        }
    }

    /// Golomb-Rice parameter P for this type.
    pub fn golomb_p(self) -> u8 {
        match self {
            FilterType::Basic => BASIC_FILTER_P,
            FilterType::Extended => EXTENDED_FILTER_P,
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw value that names no defined filter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownFilterType(pub i64);

impl TryFrom<i64> for FilterType {
    type Error = UnknownFilterType;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FilterType::Basic),
            1 => Ok(FilterType::Extended),
            other => Err(UnknownFilterType(other)),
        }
    }
}

impl TryFrom<u8> for FilterType {
    type Error = UnknownFilterType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FilterType::try_from(i64::from(value))
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown filter type name: {}", s))
    }
}
