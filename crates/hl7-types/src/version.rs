//! HL7 v2 version tags.
//!
//! This module provides the `Version` enum identifying which release of the
//! v2 standard a message (and the schema data describing it) belongs to.

use std::fmt;
use std::str::FromStr;

/// An HL7 v2 version, as carried in MSH-12.
///
/// # Examples
///
/// ```
/// use hl7_types::Version;
///
/// let version: Version = "2.8.1".parse().unwrap();
/// assert_eq!(version, Version::V2_8_1);
/// assert_eq!(version.as_str(), "2.8.1");
/// assert!(version.has_truncation_character());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(non_camel_case_types)]
pub enum Version {
    /// Version 2.1.
    V2_1,
    /// Version 2.2.
    V2_2,
    /// Version 2.3.
    V2_3,
    /// Version 2.3.1.
    V2_3_1,
    /// Version 2.4.
    V2_4,
    /// Version 2.5.
    V2_5,
    /// Version 2.5.1.
    V2_5_1,
    /// Version 2.6.
    V2_6,
    /// Version 2.7.
    V2_7,
    /// Version 2.7.1.
    V2_7_1,
    /// Version 2.8.
    V2_8,
    /// Version 2.8.1.
    V2_8_1,
}

impl Version {
    /// All supported versions, oldest first.
    pub const ALL: [Version; 12] = [
        Self::V2_1,
        Self::V2_2,
        Self::V2_3,
        Self::V2_3_1,
        Self::V2_4,
        Self::V2_5,
        Self::V2_5_1,
        Self::V2_6,
        Self::V2_7,
        Self::V2_7_1,
        Self::V2_8,
        Self::V2_8_1,
    ];

    /// Creates a Version from its dotted wire form (e.g. `"2.5.1"`).
    ///
    /// Returns `None` if the text doesn't name a supported version.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|version| version.as_str() == code.trim())
    }

    /// Returns the dotted wire form of this version.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2_1 => "2.1",
            Self::V2_2 => "2.2",
            Self::V2_3 => "2.3",
            Self::V2_3_1 => "2.3.1",
            Self::V2_4 => "2.4",
            Self::V2_5 => "2.5",
            Self::V2_5_1 => "2.5.1",
            Self::V2_6 => "2.6",
            Self::V2_7 => "2.7",
            Self::V2_7_1 => "2.7.1",
            Self::V2_8 => "2.8",
            Self::V2_8_1 => "2.8.1",
        }
    }

    /// Returns true if MSH-2 may carry a fifth (truncation) character.
    ///
    /// The truncation character was introduced in version 2.7.
    pub fn has_truncation_character(self) -> bool {
        self >= Self::V2_7
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a supported version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVersion(pub String);

impl fmt::Display for UnknownVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HL7 version: '{}'", self.0)
    }
}

impl std::error::Error for UnknownVersion {}

impl FromStr for Version {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownVersion(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_codes() {
        assert_eq!(Version::from_code("2.5.1"), Some(Version::V2_5_1));
        assert_eq!(Version::from_code("2.8"), Some(Version::V2_8));
        assert_eq!(Version::from_code(" 2.3 "), Some(Version::V2_3));
        assert_eq!(Version::from_code("3.0"), None);
        assert_eq!(Version::V2_3_1.to_string(), "2.3.1");
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::V2_5 < Version::V2_5_1);
        assert!(Version::V2_8_1 > Version::V2_7);
        assert!(!Version::V2_6.has_truncation_character());
        assert!(Version::V2_7.has_truncation_character());
    }

    #[test]
    fn test_version_from_str_error() {
        let err = "9.9".parse::<Version>().unwrap_err();
        assert_eq!(err, UnknownVersion("9.9".to_string()));
        assert_eq!(err.to_string(), "unknown HL7 version: '9.9'");
    }
}
