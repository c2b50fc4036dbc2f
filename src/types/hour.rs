//! The hour index used to address one snapshot in the 24-hour balloon history window.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of hourly snapshots in the history window.
pub const HOURS_IN_WINDOW: u8 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HourError {
    #[error("Hour {0} is outside the 00-23 window")]
    OutOfRange(u8),

    #[error("Invalid hour format '{0}'. Use 00-23.")]
    InvalidFormat(String),
}

/// One snapshot in the history window, `00` being the most recent published hour.
///
/// The value is always in `0..=23`; construction through [`HourIndex::new`] or
/// [`str::parse`] rejects anything else, so a malformed hour never reaches the network.
///
/// # Examples
///
/// ```
/// use balloon_history::HourIndex;
///
/// let hour: HourIndex = "07".parse().unwrap();
/// assert_eq!(hour.get(), 7);
/// assert_eq!(hour.to_string(), "07");
/// assert!("7".parse::<HourIndex>().is_err());
/// assert!(HourIndex::new(24).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourIndex(u8);

impl HourIndex {
    pub fn new(hour: u8) -> Result<Self, HourError> {
        if hour < HOURS_IN_WINDOW {
            Ok(Self(hour))
        } else {
            Err(HourError::OutOfRange(hour))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All hours of the window in ascending order, `00` first.
    pub fn all() -> impl Iterator<Item = HourIndex> {
        (0..HOURS_IN_WINDOW).map(HourIndex)
    }
}

impl FromStr for HourIndex {
    type Err = HourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(HourError::InvalidFormat(s.to_string()));
        }
        let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        HourIndex::new(hour)
    }
}

impl TryFrom<u8> for HourIndex {
    type Error = HourError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        HourIndex::new(value)
    }
}

impl fmt::Display for HourIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for HourIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}
