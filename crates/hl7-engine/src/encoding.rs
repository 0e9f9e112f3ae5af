//! Delimiter characters in effect for a message.

use std::fmt;

use hl7_types::Version;

use crate::types::{Hl7Error, Hl7Result};

/// Segment names whose first two fields carry the delimiters themselves.
pub const HEADER_SEGMENTS: &[&str] = &["MSH", "BHS", "FHS"];

/// Returns true if the segment is a message, batch or file header.
pub fn is_header_segment(name: &str) -> bool {
    HEADER_SEGMENTS.contains(&name)
}

/// The delimiter set of one message, captured from its header line.
///
/// # Examples
///
/// ```
/// use hl7_engine::EncodingCharacters;
///
/// let enc = EncodingCharacters::parse_delimiters("MSH|^~\\&|APP").unwrap();
/// assert_eq!(enc.field, '|');
/// assert_eq!(enc.component, '^');
/// assert_eq!(enc.encoding_field(), "^~\\&");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodingCharacters {
    /// Separates fields (MSH-1).
    pub field: char,
    /// Separates components within a field.
    pub component: char,
    /// Separates repetitions of a field.
    pub repetition: char,
    /// Opens and closes escape sequences.
    pub escape: char,
    /// Separates sub-components within a component.
    pub subcomponent: char,
    /// Optional truncation character (version 2.7 and later).
    pub truncation: Option<char>,
}

impl Default for EncodingCharacters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
            truncation: None,
        }
    }
}

impl EncodingCharacters {
    /// The standard delimiters for new messages of `version`, with the `#`
    /// truncation character from version 2.7 on.
    pub fn for_version(version: Version) -> Self {
        Self {
            truncation: version.has_truncation_character().then_some('#'),
            ..Self::default()
        }
    }

    /// Builds a delimiter set from the field separator and the MSH-2 text.
    ///
    /// MSH-2 lists component, repetition, escape and sub-component
    /// separators in that order, optionally followed by the truncation
    /// character.
    pub fn new(field: char, encoding_field: &str) -> Hl7Result<Self> {
        let chars: Vec<char> = encoding_field.chars().collect();
        if chars.len() < 4 || chars.len() > 5 {
            return Err(malformed(format!(
                "expected 4 or 5 encoding characters, found {}",
                chars.len()
            )));
        }

        let enc = Self {
            field,
            component: chars[0],
            repetition: chars[1],
            escape: chars[2],
            subcomponent: chars[3],
            truncation: chars.get(4).copied(),
        };
        enc.validate()?;
        Ok(enc)
    }

    /// Extracts the delimiter set from the first line of a message.
    ///
    /// The line must start with a header segment name (`MSH`, `BHS` or
    /// `FHS`); the next character is the field separator and the characters
    /// up to the following field separator are the encoding characters.
    pub fn parse_delimiters(first_line: &str) -> Hl7Result<Self> {
        let mut chars = first_line.char_indices();
        let name_end = chars
            .nth(3)
            .map(|(index, _)| index)
            .ok_or_else(|| malformed("header line is shorter than 4 characters".to_string()))?;

        let name = &first_line[..name_end];
        if !is_header_segment(name) {
            return Err(malformed(format!(
                "first segment is '{}', expected one of {}",
                name,
                HEADER_SEGMENTS.join(", ")
            )));
        }

        let rest = &first_line[name_end..];
        let field = rest
            .chars()
            .next()
            .ok_or_else(|| malformed("missing field separator".to_string()))?;
        let after_field = &rest[field.len_utf8()..];
        let encoding_field = after_field.split(field).next().unwrap_or("");

        Self::new(field, encoding_field)
    }

    /// Returns the MSH-2 text for this delimiter set.
    pub fn encoding_field(&self) -> String {
        let mut out = String::with_capacity(5);
        out.push(self.component);
        out.push(self.repetition);
        out.push(self.escape);
        out.push(self.subcomponent);
        if let Some(truncation) = self.truncation {
            out.push(truncation);
        }
        out
    }

    /// Returns true if `c` is one of the structural delimiters.
    pub fn is_delimiter(&self, c: char) -> bool {
        c == self.field
            || c == self.component
            || c == self.repetition
            || c == self.escape
            || c == self.subcomponent
            || Some(c) == self.truncation
    }

    fn validate(&self) -> Hl7Result<()> {
        let mut seen: Vec<char> = Vec::with_capacity(6);
        let all = [
            Some(self.field),
            Some(self.component),
            Some(self.repetition),
            Some(self.escape),
            Some(self.subcomponent),
            self.truncation,
        ];

        for c in all.into_iter().flatten() {
            if c.is_control() || c.is_whitespace() || c.is_alphanumeric() {
                return Err(malformed(format!("'{}' cannot be used as a delimiter", c.escape_default())));
            }
            if seen.contains(&c) {
                return Err(malformed(format!("delimiter '{}' is used twice", c)));
            }
            seen.push(c);
        }

        Ok(())
    }
}

impl fmt::Display for EncodingCharacters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.field, self.encoding_field())
    }
}

fn malformed(reason: String) -> Hl7Error {
    Hl7Error::MalformedHeader { line: 1, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_delimiters() {
        let enc = EncodingCharacters::parse_delimiters("MSH|^~\\&|SENDER|FAC").unwrap();
        assert_eq!(enc, EncodingCharacters::default());
        assert_eq!(enc.to_string(), "|^~\\&");
    }

    #[test]
    fn test_parse_truncation_character() {
        let enc = EncodingCharacters::parse_delimiters("MSH|^~\\&#|A").unwrap();
        assert_eq!(enc.truncation, Some('#'));
        assert_eq!(enc.encoding_field(), "^~\\&#");
    }

    #[test]
    fn test_defaults_for_version() {
        assert_eq!(EncodingCharacters::for_version(Version::V2_5), EncodingCharacters::default());
        assert_eq!(EncodingCharacters::for_version(Version::V2_6).truncation, None);

        let enc = EncodingCharacters::for_version(Version::V2_7);
        assert_eq!(enc.truncation, Some('#'));
        assert_eq!(enc.encoding_field(), "^~\\&#");
        assert_eq!(EncodingCharacters::for_version(Version::V2_8), enc);
    }

    #[test]
    fn test_parse_custom_delimiters() {
        let enc = EncodingCharacters::parse_delimiters("MSH*:!$%*A").unwrap();
        assert_eq!(enc.field, '*');
        assert_eq!(enc.component, ':');
        assert_eq!(enc.repetition, '!');
        assert_eq!(enc.escape, '$');
        assert_eq!(enc.subcomponent, '%');
    }

    #[test]
    fn test_header_at_end_of_line() {
        let enc = EncodingCharacters::parse_delimiters("BHS|^~\\&").unwrap();
        assert_eq!(enc.subcomponent, '&');
    }

    #[test]
    fn test_malformed_headers() {
        for line in ["MSH", "MSH|^~", "PID|^~\\&|", "MSH|^~\\&#!|", "MSH|^^\\&|", "MSH|^~ &|"] {
            let err = EncodingCharacters::parse_delimiters(line).unwrap_err();
            assert!(
                matches!(err, Hl7Error::MalformedHeader { line: 1, .. }),
                "{line}: {err}"
            );
        }
    }

    #[test]
    fn test_is_delimiter() {
        let enc = EncodingCharacters::default();
        assert!(enc.is_delimiter('|'));
        assert!(enc.is_delimiter('&'));
        assert!(!enc.is_delimiter('#'));
        assert!(!enc.is_delimiter('A'));
    }
}
