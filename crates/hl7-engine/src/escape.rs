//! Escape sequence encoding and decoding.
//!
//! Reserved characters inside a value are written as an escape character,
//! a code, and a closing escape character:
//!
//! | text              | sequence |
//! |-------------------|----------|
//! | field separator   | `\F\`    |
//! | component sep.    | `\S\`    |
//! | sub-component sep.| `\T\`    |
//! | repetition sep.   | `\R\`    |
//! | escape character  | `\E\`    |
//! | truncation char.  | `\P\`    |
//! | line feed         | `\.br\`  |
//! | carriage return   | `\X0D\`  |
//!
//! Decoding also understands hexadecimal `\Xhh..\` sequences and passes
//! formatting commands (`\H\`, `\N\`, `\.sp\`, `\Cxxyy\`, ...) through
//! untouched. A malformed sequence is never dropped: it is kept literally
//! and reported as an [`EscapeWarning`].

use std::borrow::Cow;
use std::fmt;

use crate::encoding::EncodingCharacters;

/// A malformed escape sequence met while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeWarning {
    /// Byte offset of the opening escape character in the decoded input.
    pub offset: usize,
    /// The offending text, kept literally in the output.
    pub sequence: String,
    /// Why the sequence was not decoded.
    pub reason: &'static str,
}

impl fmt::Display for EscapeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "escape sequence '{}' at offset {}: {}",
            self.sequence, self.offset, self.reason
        )
    }
}

/// Replaces every reserved character in `text` with its escape sequence.
pub fn escape<'a>(text: &'a str, enc: &EncodingCharacters) -> Cow<'a, str> {
    if !text.chars().any(|c| needs_escape(c, enc)) {
        return Cow::Borrowed(text);
    }

    let e = enc.escape;
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        let code = if c == enc.field {
            "F"
        } else if c == enc.component {
            "S"
        } else if c == enc.subcomponent {
            "T"
        } else if c == enc.repetition {
            "R"
        } else if c == e {
            "E"
        } else if Some(c) == enc.truncation {
            "P"
        } else if c == '\n' {
            ".br"
        } else if c == '\r' {
            "X0D"
        } else {
            out.push(c);
            continue;
        };
        out.push(e);
        out.push_str(code);
        out.push(e);
    }
    Cow::Owned(out)
}

fn needs_escape(c: char, enc: &EncodingCharacters) -> bool {
    enc.is_delimiter(c) || c == '\n' || c == '\r'
}

/// Decodes escape sequences, logging any malformed ones.
///
/// Malformed sequences are kept literally; see [`unescape_checked`] to
/// receive them as values instead.
pub fn unescape<'a>(text: &'a str, enc: &EncodingCharacters) -> Cow<'a, str> {
    if !text.contains(enc.escape) {
        return Cow::Borrowed(text);
    }

    let (decoded, warnings) = decode(text, enc);
    for warning in &warnings {
        tracing::warn!(%warning, "passing malformed escape sequence through");
    }
    Cow::Owned(decoded)
}

/// Decodes escape sequences and returns the malformed ones alongside.
pub fn unescape_checked(text: &str, enc: &EncodingCharacters) -> (String, Vec<EscapeWarning>) {
    if !text.contains(enc.escape) {
        return (text.to_string(), Vec::new());
    }
    decode(text, enc)
}

fn decode(text: &str, enc: &EncodingCharacters) -> (String, Vec<EscapeWarning>) {
    let e = enc.escape;
    let mut out = String::with_capacity(text.len());
    let mut warnings = Vec::new();
    let mut rest = text;
    let mut consumed = 0;

    while let Some(open) = rest.find(e) {
        out.push_str(&rest[..open]);
        let body_start = open + e.len_utf8();

        let Some(close) = rest[body_start..].find(e) else {
            let literal = &rest[open..];
            warnings.push(EscapeWarning {
                offset: consumed + open,
                sequence: literal.to_string(),
                reason: "unterminated escape sequence",
            });
            out.push_str(literal);
            return (out, warnings);
        };

        let body = &rest[body_start..body_start + close];
        let end = body_start + close + e.len_utf8();
        let literal = &rest[open..end];

        match decode_body(body, enc) {
            Decoded::Char(c) => out.push(c),
            Decoded::Text(s) => out.push_str(&s),
            Decoded::Formatting => out.push_str(literal),
            Decoded::Invalid(reason) => {
                warnings.push(EscapeWarning {
                    offset: consumed + open,
                    sequence: literal.to_string(),
                    reason,
                });
                out.push_str(literal);
            }
        }

        consumed += end;
        rest = &rest[end..];
    }

    out.push_str(rest);
    (out, warnings)
}

enum Decoded {
    Char(char),
    Text(String),
    Formatting,
    Invalid(&'static str),
}

fn decode_body(body: &str, enc: &EncodingCharacters) -> Decoded {
    match body {
        "F" => Decoded::Char(enc.field),
        "S" => Decoded::Char(enc.component),
        "T" => Decoded::Char(enc.subcomponent),
        "R" => Decoded::Char(enc.repetition),
        "E" => Decoded::Char(enc.escape),
        "P" => match enc.truncation {
            Some(c) => Decoded::Char(c),
            None => Decoded::Invalid("no truncation character is defined"),
        },
        ".br" => Decoded::Char('\n'),
        "" => Decoded::Invalid("empty escape sequence"),
        "H" | "N" => Decoded::Formatting,
        _ if body.starts_with('.') => Decoded::Formatting,
        _ if body.starts_with('X') => decode_hex(&body[1..]),
        _ if body.starts_with(['C', 'M', 'Z']) => Decoded::Formatting,
        _ => Decoded::Invalid("unknown escape code"),
    }
}

fn decode_hex(digits: &str) -> Decoded {
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Decoded::Invalid("hexadecimal escape needs an even number of digits");
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.as_bytes().chunks(2) {
        let Ok(pair) = std::str::from_utf8(pair) else {
            return Decoded::Invalid("hexadecimal escape contains non-ASCII text");
        };
        match u8::from_str_radix(pair, 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => return Decoded::Invalid("invalid hexadecimal digit"),
        }
    }

    match String::from_utf8(bytes) {
        Ok(text) => Decoded::Text(text),
        Err(_) => Decoded::Invalid("hexadecimal escape is not valid UTF-8"),
    }
}
