//! One field position of a segment: an ordered list of repetitions.

use crate::encoding::EncodingCharacters;
use crate::value::Value;

/// A field slot holding zero or more repetitions.
///
/// An empty field on the wire is kept as one empty repetition so that a
/// parsed segment keeps its index alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    repetitions: Vec<Value>,
}

impl Field {
    /// Creates a field with no repetitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits wire text on the repetition separator.
    pub fn from_raw(raw: &str, encoding: EncodingCharacters) -> Self {
        let repetitions = raw
            .split(encoding.repetition)
            .map(|rep| Value::from_raw(rep, encoding))
            .collect();
        Self { repetitions }
    }

    /// Wraps one value that must not be split (header delimiter fields).
    pub(crate) fn verbatim(raw: impl Into<String>, encoding: EncodingCharacters) -> Self {
        Self {
            repetitions: vec![Value::verbatim(raw, encoding)],
        }
    }

    /// Returns the number of repetitions present.
    pub fn len(&self) -> usize {
        self.repetitions.len()
    }

    /// Returns true if the field would encode to nothing.
    pub fn is_empty(&self) -> bool {
        self.repetitions.len() <= 1 && self.repetitions.iter().all(Value::is_empty)
    }

    /// Returns all repetitions.
    pub fn repetitions(&self) -> &[Value] {
        &self.repetitions
    }

    /// Returns repetition `rep` (0-based), if present.
    pub fn repetition(&self, rep: usize) -> Option<&Value> {
        self.repetitions.get(rep)
    }

    pub(crate) fn repetition_mut(&mut self, rep: usize) -> Option<&mut Value> {
        self.repetitions.get_mut(rep)
    }

    /// Appends an empty repetition and returns it.
    pub(crate) fn push(&mut self, encoding: EncodingCharacters) -> &mut Value {
        self.repetitions.push(Value::new(encoding));
        let last = self.repetitions.len() - 1;
        &mut self.repetitions[last]
    }

    pub(crate) fn remove(&mut self, rep: usize) -> Value {
        self.repetitions.remove(rep)
    }

    /// Writes the field's wire form into `out`.
    pub fn encode_into(&self, out: &mut String, encoding: &EncodingCharacters) {
        for (index, rep) in self.repetitions.iter().enumerate() {
            if index > 0 {
                out.push(encoding.repetition);
            }
            out.push_str(rep.raw());
        }
    }

    /// Returns the field's wire form.
    pub fn encode(&self, encoding: &EncodingCharacters) -> String {
        let mut out = String::new();
        self.encode_into(&mut out, encoding);
        out
    }
}
