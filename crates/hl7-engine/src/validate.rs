//! Optional format checks keyed by datatype tag.
//!
//! Nothing here runs during parse or encode. Callers that want to check a
//! value against its field definition do so explicitly.

use hl7_types::{DataType, FieldDef};
use thiserror::Error;

use crate::segment::Segment;

/// A value that does not fit the shape its datatype requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Longer than the field's maximum length.
    #[error("value is {length} characters, maximum is {max}")]
    TooLong {
        /// Length of the value in characters.
        length: usize,
        /// The field's maximum length.
        max: u32,
    },

    /// Not a number (NM).
    #[error("'{value}' is not numeric")]
    NotNumeric {
        /// The rejected text.
        value: String,
    },

    /// Not a non-negative integer (SI).
    #[error("'{value}' is not a sequence id")]
    NotSequenceId {
        /// The rejected text.
        value: String,
    },

    /// Not shaped like a date, time or timestamp.
    #[error("'{value}' is not a valid {data_type:?}")]
    BadTemporal {
        /// The datatype checked against.
        data_type: DataType,
        /// The rejected text.
        value: String,
    },
}

/// A format problem found in one field repetition of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// 1-based field number.
    pub field: usize,
    /// 0-based repetition.
    pub rep: usize,
    /// What was wrong.
    pub error: FormatError,
}

/// Checks `value` (unescaped text) against a datatype and maximum length.
///
/// An empty value always passes. A `max_length` of 0 means unlimited.
/// Composite types only get the length check.
///
/// # Examples
///
/// ```
/// use hl7_engine::validate_format;
/// use hl7_types::DataType;
///
/// assert!(validate_format(DataType::Nm, "-12.5", 0).is_ok());
/// assert!(validate_format(DataType::Dt, "20240131", 8).is_ok());
/// assert!(validate_format(DataType::Si, "x", 4).is_err());
/// ```
pub fn validate_format(data_type: DataType, value: &str, max_length: u32) -> Result<(), FormatError> {
    if value.is_empty() {
        return Ok(());
    }

    let length = value.chars().count();
    if max_length > 0 && length > max_length as usize {
        return Err(FormatError::TooLong {
            length,
            max: max_length,
        });
    }

    let valid = match data_type {
        DataType::Nm => {
            if !is_numeric(value) {
                return Err(FormatError::NotNumeric {
                    value: value.to_string(),
                });
            }
            true
        }
        DataType::Si => {
            if !all_digits(value) {
                return Err(FormatError::NotSequenceId {
                    value: value.to_string(),
                });
            }
            true
        }
        DataType::Dt => matches!(value.len(), 4 | 6 | 8) && all_digits(value),
        DataType::Tm => is_temporal(value, &[2, 4, 6], 6),
        DataType::Dtm => is_temporal(value, &[4, 6, 8, 10, 12, 14], 14),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(FormatError::BadTemporal {
            data_type,
            value: value.to_string(),
        })
    }
}

/// Checks a field definition's datatype and length against a value.
pub fn validate_field(def: &FieldDef, value: &str) -> Result<(), FormatError> {
    validate_format(def.data_type, value, def.max_length)
}

impl Segment {
    /// Runs [`validate_format`] over every field repetition present.
    ///
    /// Header delimiter fields are skipped.
    pub fn validate(&self) -> Vec<FieldIssue> {
        let first = if self.is_header() { 3 } else { 1 };
        let mut issues = Vec::new();
        for number in first..=self.field_count() {
            let def = self.field_def(number);
            let Some(field) = self.field(number) else {
                continue;
            };
            for (rep, value) in field.repetitions().iter().enumerate() {
                if let Err(error) = validate_field(def, &value.text()) {
                    issues.push(FieldIssue {
                        field: number,
                        rep,
                        error,
                    });
                }
            }
        }
        issues
    }
}

fn all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_numeric(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    (!whole.is_empty() || !fraction.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

/// Digits of an allowed length, then an optional fraction (only after
/// `fraction_after` digits) and an optional `+HHMM`/`-HHMM` offset.
fn is_temporal(text: &str, lengths: &[usize], fraction_after: usize) -> bool {
    let (body, zone) = match text.find(['+', '-']) {
        Some(index) => text.split_at(index),
        None => (text, ""),
    };
    if !zone.is_empty() && !(zone.len() == 5 && all_digits(&zone[1..])) {
        return false;
    }

    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };
    if !all_digits(digits) || !lengths.contains(&digits.len()) {
        return false;
    }
    match fraction {
        None => true,
        Some(fraction) => {
            digits.len() == fraction_after && (1..=4).contains(&fraction.len()) && all_digits(fraction)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncodingCharacters;
    use hl7_types::{Cardinality, SegmentDef};
    use std::sync::Arc;

    #[test]
    fn test_empty_always_passes() {
        for data_type in [DataType::Nm, DataType::Si, DataType::Dt, DataType::Dtm] {
            assert!(validate_format(data_type, "", 1).is_ok());
        }
    }

    #[test]
    fn test_numeric() {
        for good in ["0", "12", "-3", "+4.5", ".5", "10."] {
            assert!(validate_format(DataType::Nm, good, 0).is_ok(), "{good}");
        }
        for bad in ["abc", "1.2.3", "-", ".", "1e5"] {
            assert!(
                matches!(validate_format(DataType::Nm, bad, 0), Err(FormatError::NotNumeric { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_sequence_id() {
        assert!(validate_format(DataType::Si, "17", 4).is_ok());
        assert!(matches!(
            validate_format(DataType::Si, "-1", 4),
            Err(FormatError::NotSequenceId { .. })
        ));
    }

    #[test]
    fn test_dates_and_times() {
        assert!(validate_format(DataType::Dt, "2024", 0).is_ok());
        assert!(validate_format(DataType::Dt, "202401", 0).is_ok());
        assert!(validate_format(DataType::Dt, "2024013", 0).is_err());

        assert!(validate_format(DataType::Tm, "1230", 0).is_ok());
        assert!(validate_format(DataType::Tm, "123045.12+0100", 0).is_ok());
        assert!(validate_format(DataType::Tm, "1230.5", 0).is_err());

        assert!(validate_format(DataType::Dtm, "20240131123045.1234-0500", 0).is_ok());
        assert!(validate_format(DataType::Dtm, "202401311230", 0).is_ok());
        assert!(validate_format(DataType::Dtm, "2024013112304", 0).is_err());
        assert!(validate_format(DataType::Dtm, "20240131+05", 0).is_err());
    }

    #[test]
    fn test_length_limit() {
        assert!(matches!(
            validate_format(DataType::St, "abcdef", 5),
            Err(FormatError::TooLong { length: 6, max: 5 })
        ));
        assert!(validate_format(DataType::Cwe, "a^b^c", 0).is_ok());
    }

    #[test]
    fn test_segment_validate() {
        let def = SegmentDef::new("OBX")
            .field(FieldDef::new("Set ID", DataType::Si, Cardinality::optional(), 4))
            .field(FieldDef::new("Value", DataType::Nm, Cardinality::unbounded(), 0));
        let segment = Segment::parse(Arc::new(def), "OBX|1|5~x|anything", EncodingCharacters::default());

        let issues = segment.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, 2);
        assert_eq!(issues[0].rep, 1);
    }
}
