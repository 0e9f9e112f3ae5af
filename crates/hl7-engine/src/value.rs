//! The leaf data unit: one repetition of one field.
//!
//! A `Value` keeps its wire form (escaped, with component and sub-component
//! separators in place) and splits it only when a component is read or
//! written. Keeping the wire form means a parsed value re-encodes exactly as
//! it arrived, including escape sequences the engine does not interpret.

use std::borrow::Cow;

use hl7_types::DataType;

use crate::encoding::EncodingCharacters;
use crate::escape::{escape, unescape};
use crate::types::{Hl7Error, Hl7Result};

/// One field repetition, decomposable into components and sub-components.
///
/// Component and sub-component numbers are 1-based. Reading a position that
/// does not exist yields an empty string; writing one extends the value.
///
/// # Examples
///
/// ```
/// use hl7_engine::{EncodingCharacters, Value};
///
/// let mut value = Value::from_raw("123^^MR", EncodingCharacters::default());
/// assert_eq!(value.component(1), "123");
/// assert_eq!(value.component(3), "MR");
/// assert_eq!(value.component(7), "");
///
/// value.set_component(2, "A^B").unwrap();
/// assert_eq!(value.raw(), "123^A\\S\\B^MR");
/// assert_eq!(value.component(2), "A^B");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    raw: String,
    encoding: EncodingCharacters,
    verbatim: bool,
}

impl Value {
    /// Creates an empty value.
    pub fn new(encoding: EncodingCharacters) -> Self {
        Self::from_raw(String::new(), encoding)
    }

    /// Creates a value from wire text (already escaped).
    pub fn from_raw(raw: impl Into<String>, encoding: EncodingCharacters) -> Self {
        Self {
            raw: raw.into(),
            encoding,
            verbatim: false,
        }
    }

    /// Creates a value from plain text, escaping reserved characters.
    pub fn from_text(text: &str, encoding: EncodingCharacters) -> Self {
        Self::from_raw(escape(text, &encoding).into_owned(), encoding)
    }

    /// Creates a value that is never split or unescaped (MSH-1, MSH-2).
    pub(crate) fn verbatim(raw: impl Into<String>, encoding: EncodingCharacters) -> Self {
        Self {
            raw: raw.into(),
            encoding,
            verbatim: true,
        }
    }

    /// Returns the wire form of the value.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Replaces the wire form of the value. The text must already be escaped.
    pub fn set_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
    }

    /// Returns the delimiters this value is split with.
    pub fn encoding(&self) -> EncodingCharacters {
        self.encoding
    }

    /// Returns true if the value holds no text.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns true if the value is a header delimiter field.
    pub fn is_verbatim(&self) -> bool {
        self.verbatim
    }

    /// Returns the whole value with escape sequences decoded.
    ///
    /// Separators inside the value are kept, so for composite values this is
    /// a display form; use [`Value::component`] for exact access.
    pub fn text(&self) -> Cow<'_, str> {
        if self.verbatim {
            Cow::Borrowed(&self.raw)
        } else {
            unescape(&self.raw, &self.encoding)
        }
    }

    /// Replaces the whole value with `text`, escaping reserved characters.
    pub fn set_text(&mut self, text: &str) {
        self.raw = if self.verbatim {
            text.to_string()
        } else {
            escape(text, &self.encoding).into_owned()
        };
    }

    /// Returns the number of components present (0 for an empty value).
    pub fn component_count(&self) -> usize {
        if self.raw.is_empty() {
            0
        } else if self.verbatim {
            1
        } else {
            self.raw.split(self.encoding.component).count()
        }
    }

    /// Returns the wire form of component `n`, or `""` if absent.
    pub fn component_raw(&self, n: usize) -> &str {
        if n == 0 {
            return "";
        }
        if self.verbatim {
            return if n == 1 { &self.raw } else { "" };
        }
        self.raw.split(self.encoding.component).nth(n - 1).unwrap_or("")
    }

    /// Returns component `n` with escape sequences decoded.
    pub fn component(&self, n: usize) -> String {
        self.decode(self.component_raw(n))
    }

    /// Returns every component with escape sequences decoded.
    pub fn components(&self) -> Vec<String> {
        (1..=self.component_count()).map(|n| self.component(n)).collect()
    }

    /// Returns the number of sub-components in component `n`.
    pub fn sub_component_count(&self, n: usize) -> usize {
        let component = self.component_raw(n);
        if component.is_empty() {
            0
        } else if self.verbatim {
            1
        } else {
            component.split(self.encoding.subcomponent).count()
        }
    }

    /// Returns the wire form of sub-component `m` of component `n`.
    pub fn sub_component_raw(&self, n: usize, m: usize) -> &str {
        if m == 0 {
            return "";
        }
        let component = self.component_raw(n);
        if self.verbatim {
            return if m == 1 { component } else { "" };
        }
        component
            .split(self.encoding.subcomponent)
            .nth(m - 1)
            .unwrap_or("")
    }

    /// Returns sub-component `m` of component `n` with escape sequences decoded.
    pub fn sub_component(&self, n: usize, m: usize) -> String {
        self.decode(self.sub_component_raw(n, m))
    }

    /// Returns the component called `name` by the datatype's component list.
    ///
    /// Returns `None` if the datatype has no component of that name.
    pub fn component_named(&self, data_type: DataType, name: &str) -> Option<String> {
        data_type
            .component_index(name)
            .map(|index| self.component(index))
    }

    /// Sets component `n` to `text`, escaping reserved characters.
    ///
    /// Missing components before `n` are created empty; trailing empty
    /// components are dropped.
    pub fn set_component(&mut self, n: usize, text: &str) -> Hl7Result<()> {
        if n == 0 {
            return Err(Hl7Error::InvalidComponentNumber { number: n });
        }
        let escaped = escape(text, &self.encoding).into_owned();
        let mut components = self.split_components();
        if components.len() < n {
            components.resize(n, String::new());
        }
        components[n - 1] = escaped;
        self.join_components(components);
        Ok(())
    }

    /// Sets sub-component `m` of component `n` to `text`, escaping reserved characters.
    pub fn set_sub_component(&mut self, n: usize, m: usize, text: &str) -> Hl7Result<()> {
        if n == 0 || m == 0 {
            return Err(Hl7Error::InvalidComponentNumber { number: 0 });
        }
        let escaped = escape(text, &self.encoding).into_owned();
        let sub = self.encoding.subcomponent;

        let mut components = self.split_components();
        if components.len() < n {
            components.resize(n, String::new());
        }

        let mut subs: Vec<String> = if components[n - 1].is_empty() {
            Vec::new()
        } else {
            components[n - 1].split(sub).map(str::to_string).collect()
        };
        if subs.len() < m {
            subs.resize(m, String::new());
        }
        subs[m - 1] = escaped;
        trim_trailing_empty(&mut subs);
        components[n - 1] = subs.join(&sub.to_string());

        self.join_components(components);
        Ok(())
    }

    /// Empties the value.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    fn decode(&self, raw: &str) -> String {
        if self.verbatim {
            raw.to_string()
        } else {
            unescape(raw, &self.encoding).into_owned()
        }
    }

    fn split_components(&self) -> Vec<String> {
        if self.raw.is_empty() {
            return Vec::new();
        }
        if self.verbatim {
            return vec![self.raw.clone()];
        }
        self.raw
            .split(self.encoding.component)
            .map(str::to_string)
            .collect()
    }

    fn join_components(&mut self, mut components: Vec<String>) {
        trim_trailing_empty(&mut components);
        self.raw = components.join(&self.encoding.component.to_string());
        self.verbatim = false;
    }
}

fn trim_trailing_empty(parts: &mut Vec<String>) {
    while parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
}
