//! Segment nodes: one wire line of numbered field slots.

use std::sync::Arc;

use hl7_types::{Cardinality, DataType, FieldDef, SegmentDef};

use crate::encoding::{is_header_segment, EncodingCharacters};
use crate::field::Field;
use crate::structure::Navigate;
use crate::types::{EncodeOptions, Hl7Error, Hl7Result};
use crate::value::Value;

/// Highest field number a write may create past the fields already present.
pub const MAX_FIELD_NUMBER: usize = 999;

static EXTRA_FIELD: FieldDef = FieldDef {
    description: String::new(),
    data_type: DataType::Varies,
    cardinality: Cardinality::unbounded(),
    max_length: 0,
};

/// Returns the segment name of a wire line: the text before the first field separator.
pub fn segment_name<'a>(line: &'a str, encoding: &EncodingCharacters) -> &'a str {
    line.split(encoding.field).next().unwrap_or("")
}

/// A segment instance.
///
/// Fields are addressed 1-based. For header segments (`MSH`, `BHS`, `FHS`)
/// field 1 is the field separator and field 2 the encoding characters;
/// both are held verbatim and never split or unescaped.
///
/// Field positions past the end of the definition are accepted and treated
/// as optional, repeating and untyped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    def: Arc<SegmentDef>,
    fields: Vec<Field>,
    encoding: EncodingCharacters,
}

impl Segment {
    /// Creates an empty segment. Header segments get their delimiter fields filled in.
    pub fn new(def: Arc<SegmentDef>, encoding: EncodingCharacters) -> Self {
        let fields = if is_header_segment(&def.name) {
            vec![
                Field::verbatim(encoding.field.to_string(), encoding),
                Field::verbatim(encoding.encoding_field(), encoding),
            ]
        } else {
            Vec::new()
        };
        Self {
            def,
            fields,
            encoding,
        }
    }

    /// Builds a segment from one wire line.
    ///
    /// Every field between separators is kept, including empty ones, so field
    /// numbers line up with the wire.
    pub fn parse(def: Arc<SegmentDef>, line: &str, encoding: EncodingCharacters) -> Self {
        let mut segment = Self::new(def, encoding);
        let sep = encoding.field;

        let Some(rest) = line
            .find(sep)
            .map(|index| &line[index + sep.len_utf8()..])
        else {
            return segment;
        };

        let rest = if segment.is_header() {
            // Field 2 is already set from the message delimiters
            match rest.split_once(sep) {
                Some((_, after)) => after,
                None => return segment,
            }
        } else {
            rest
        };

        segment
            .fields
            .extend(rest.split(sep).map(|raw| Field::from_raw(raw, encoding)));
        segment
    }

    /// Returns the segment name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Returns the segment definition.
    pub fn def(&self) -> &Arc<SegmentDef> {
        &self.def
    }

    /// Returns the delimiters in effect.
    pub fn encoding(&self) -> EncodingCharacters {
        self.encoding
    }

    /// Returns true for `MSH`, `BHS` and `FHS`.
    pub fn is_header(&self) -> bool {
        is_header_segment(&self.def.name)
    }

    /// Returns the definition of field `number`.
    ///
    /// Positions past the end of the definition get an untyped, optional,
    /// repeating definition.
    pub fn field_def(&self, number: usize) -> &FieldDef {
        self.def.field_def(number).unwrap_or(&EXTRA_FIELD)
    }

    /// Returns the number of the field with the given description.
    pub fn field_by_description(&self, description: &str) -> Option<usize> {
        self.def.field_number(description)
    }

    /// Returns the number of field slots present.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns field `number`, if present.
    pub fn field(&self, number: usize) -> Option<&Field> {
        number.checked_sub(1).and_then(|index| self.fields.get(index))
    }

    /// Returns repetition `rep` of field `number`, if present.
    pub fn value(&self, number: usize, rep: usize) -> Option<&Value> {
        self.field(number).and_then(|field| field.repetition(rep))
    }

    /// Returns true if no field carries data (header delimiter fields excluded).
    pub fn is_empty(&self) -> bool {
        let skip = if self.is_header() { 2 } else { 0 };
        self.fields.iter().skip(skip).all(Field::is_empty)
    }

    /// Returns true if field `number` may repeat.
    pub fn is_repeating(&self, number: usize) -> bool {
        if self.is_header() && number <= 2 {
            return false;
        }
        self.field_def(number).is_repeating()
    }

    /// Returns true if field `number` must be present.
    pub fn is_required(&self, number: usize) -> bool {
        self.field_def(number).is_required()
    }

    /// Writes the segment's wire line (without terminator) into `out`.
    pub fn encode_into(&self, out: &mut String, options: &EncodeOptions) {
        let enc = &self.encoding;
        out.push_str(self.name());

        let first = if self.is_header() {
            out.push(enc.field);
            out.push_str(&enc.encoding_field());
            2
        } else {
            0
        };

        let end = if options.trim_trailing_fields {
            self.fields
                .iter()
                .rposition(|field| !field.is_empty())
                .map_or(first, |index| (index + 1).max(first))
        } else {
            self.fields.len()
        };

        for field in self.fields.iter().take(end).skip(first) {
            out.push(enc.field);
            field.encode_into(out, enc);
        }
    }

    /// Returns the segment's wire line (without terminator).
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out, &EncodeOptions::default());
        out
    }

    fn label(&self, number: usize) -> String {
        format!("{}-{}", self.name(), number)
    }

    fn check_number(&self, number: usize) -> Hl7Result<()> {
        if number == 0 {
            return Err(Hl7Error::InvalidFieldNumber {
                segment: self.name().to_string(),
                number,
            });
        }
        Ok(())
    }

    fn check_growth(&self, number: usize) -> Hl7Result<()> {
        if number > MAX_FIELD_NUMBER && number > self.fields.len() {
            return Err(Hl7Error::InvalidFieldNumber {
                segment: self.name().to_string(),
                number,
            });
        }
        Ok(())
    }

    fn field_mut(&mut self, number: usize) -> &mut Field {
        if self.fields.len() < number {
            self.fields.resize_with(number, Field::new);
        }
        &mut self.fields[number - 1]
    }
}

impl Navigate<usize> for Segment {
    type Node = Value;

    fn get(&mut self, number: usize) -> Hl7Result<&mut Value> {
        self.check_number(number)?;
        if self.is_repeating(number) {
            return Err(Hl7Error::NotRepeatable {
                name: self.label(number),
                repeating: true,
            });
        }
        self.get_rep(number, 0)
    }

    fn get_rep(&mut self, number: usize, rep: usize) -> Hl7Result<&mut Value> {
        self.check_number(number)?;
        let count = self.repetitions(number)?;
        if rep > count {
            return Err(Hl7Error::RepetitionOutOfRange {
                name: self.label(number),
                rep,
                count,
            });
        }
        if rep == count && rep > 0 && !self.is_repeating(number) {
            return Err(Hl7Error::NotRepeatable {
                name: self.label(number),
                repeating: false,
            });
        }

        if rep == count {
            self.check_growth(number)?;
        }

        let encoding = self.encoding;
        let field = self.field_mut(number);
        if rep == count {
            return Ok(field.push(encoding));
        }
        field
            .repetition_mut(rep)
            .ok_or_else(|| Hl7Error::InternalInvariant(format!("repetition {rep} vanished")))
    }

    fn get_all(&self, number: usize) -> Hl7Result<&[Value]> {
        self.check_number(number)?;
        Ok(self.field(number).map(Field::repetitions).unwrap_or(&[]))
    }

    fn add(&mut self, number: usize) -> Hl7Result<&mut Value> {
        self.check_number(number)?;
        if !self.is_repeating(number) {
            return Err(Hl7Error::NotRepeatable {
                name: self.label(number),
                repeating: false,
            });
        }
        self.check_growth(number)?;
        let encoding = self.encoding;
        Ok(self.field_mut(number).push(encoding))
    }

    fn remove(&mut self, number: usize, rep: usize) -> Hl7Result<Value> {
        self.check_number(number)?;
        let count = self.repetitions(number)?;
        if rep >= count {
            return Err(Hl7Error::RepetitionOutOfRange {
                name: self.label(number),
                rep,
                count,
            });
        }
        Ok(self.field_mut(number).remove(rep))
    }

    fn repetitions(&self, number: usize) -> Hl7Result<usize> {
        self.check_number(number)?;
        Ok(self.field(number).map_or(0, Field::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rol_def() -> Arc<SegmentDef> {
        Arc::new(
            SegmentDef::new("ROL")
                .field(FieldDef::new("Role Instance ID", DataType::Ei, Cardinality::optional(), 60))
                .field(FieldDef::new("Action Code", DataType::Id, Cardinality::required(), 2))
                .field(FieldDef::new("Role-ROL", DataType::Cwe, Cardinality::required(), 250))
                .field(FieldDef::new("Role Person", DataType::Xcn, Cardinality::one_or_more(), 250)),
        )
    }

    fn msh_def() -> Arc<SegmentDef> {
        Arc::new(
            SegmentDef::new("MSH")
                .field(FieldDef::new("Field Separator", DataType::St, Cardinality::required(), 1))
                .field(FieldDef::new("Encoding Characters", DataType::St, Cardinality::required(), 5))
                .field(FieldDef::new("Sending Application", DataType::Hd, Cardinality::optional(), 227)),
        )
    }

    #[test]
    fn test_segment_name() {
        let enc = EncodingCharacters::default();
        assert_eq!(segment_name("PID|1||123", &enc), "PID");
        assert_eq!(segment_name("ZZZ", &enc), "ZZZ");

        // the name borrows from the line only
        let line = String::from("OBX#1#NM");
        let name = {
            let hashed = EncodingCharacters::new('#', "^~\\&").unwrap();
            segment_name(&line, &hashed)
        };
        assert_eq!(name, "OBX");
    }

    #[test]
    fn test_parse_rol_fields() {
        let enc = EncodingCharacters::default();
        let mut rol = Segment::parse(rol_def(), "ROL|1|UP|AD^Admitting|Smith^John~Doe^Jane", enc);
        assert_eq!(rol.get(1).unwrap().text(), "1");
        assert_eq!(rol.get(2).unwrap().text(), "UP");
        assert_eq!(rol.get(3).unwrap().component(2), "Admitting");

        let people = rol.get_all(4).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].component(1), "Smith");
        assert_eq!(people[1].component(2), "Jane");
    }

    #[test]
    fn test_parse_header_segment() {
        let enc = EncodingCharacters::default();
        let msh = Segment::parse(msh_def(), "MSH|^~\\&|APP^FAC||", enc);
        assert_eq!(msh.value(1, 0).unwrap().text(), "|");
        assert_eq!(msh.value(2, 0).unwrap().text(), "^~\\&");
        assert_eq!(msh.value(3, 0).unwrap().component(2), "FAC");
        assert_eq!(msh.field_count(), 5);
        assert_eq!(msh.encode(), "MSH|^~\\&|APP^FAC");
    }

    #[test]
    fn test_header_delimiter_fields_do_not_repeat() {
        let enc = EncodingCharacters::default();
        let mut msh = Segment::new(Arc::new(SegmentDef::new("MSH")), enc);
        assert_eq!(msh.get(2).unwrap().text(), "^~\\&");
        assert!(msh.is_empty());
        assert_eq!(msh.encode(), "MSH|^~\\&");
    }

    #[test]
    fn test_empty_fields_keep_alignment() {
        let enc = EncodingCharacters::default();
        let rol = Segment::parse(rol_def(), "ROL||UP", enc);
        assert_eq!(rol.field_count(), 2);
        assert!(rol.value(1, 0).unwrap().is_empty());
        assert_eq!(rol.encode(), "ROL||UP");
    }

    #[test]
    fn test_bare_segment_has_no_fields() {
        let enc = EncodingCharacters::default();
        let rol = Segment::parse(rol_def(), "ROL", enc);
        assert_eq!(rol.field_count(), 0);
        assert!(rol.is_empty());
    }

    #[test]
    fn test_get_on_repeating_field_is_rejected() {
        let mut rol = Segment::new(rol_def(), EncodingCharacters::default());
        assert!(matches!(
            rol.get(4),
            Err(Hl7Error::NotRepeatable { repeating: true, .. })
        ));
    }

    #[test]
    fn test_repetition_create_on_demand() {
        let mut rol = Segment::new(rol_def(), EncodingCharacters::default());
        assert_eq!(rol.repetitions(4).unwrap(), 0);

        rol.get_rep(4, 0).unwrap().set_component(1, "Smith").unwrap();
        assert_eq!(rol.repetitions(4).unwrap(), 1);
        assert!(matches!(
            rol.get_rep(4, 2),
            Err(Hl7Error::RepetitionOutOfRange { rep: 2, count: 1, .. })
        ));
        assert_eq!(rol.repetitions(4).unwrap(), 1);

        rol.get_rep(4, 1).unwrap().set_text("Doe");
        assert_eq!(rol.encode(), "ROL||||Smith~Doe");
    }

    #[test]
    fn test_non_repeating_field_has_one_repetition() {
        let mut rol = Segment::new(rol_def(), EncodingCharacters::default());
        rol.get_rep(2, 0).unwrap().set_text("UP");
        assert!(matches!(rol.get_rep(2, 1), Err(Hl7Error::NotRepeatable { .. })));
        assert!(matches!(rol.add(2), Err(Hl7Error::NotRepeatable { .. })));
    }

    #[test]
    fn test_add_and_remove() {
        let mut rol = Segment::new(rol_def(), EncodingCharacters::default());
        for name in ["A", "B", "C"] {
            rol.add(4).unwrap().set_text(name);
        }
        assert_eq!(rol.get_all(4).unwrap().len(), 3);
        assert_eq!(rol.get_rep(4, 2).unwrap().text(), "C");

        let removed = rol.remove(4, 0).unwrap();
        assert_eq!(removed.text(), "A");
        assert_eq!(rol.get_all(4).unwrap()[0].text(), "B");
        assert!(matches!(
            rol.remove(4, 5),
            Err(Hl7Error::RepetitionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_field_zero_is_invalid() {
        let mut rol = Segment::new(rol_def(), EncodingCharacters::default());
        assert!(matches!(
            rol.get(0),
            Err(Hl7Error::InvalidFieldNumber { number: 0, .. })
        ));
        assert!(rol.get_all(0).is_err());
    }

    #[test]
    fn test_fields_past_definition() {
        let enc = EncodingCharacters::default();
        let mut rol = Segment::parse(rol_def(), "ROL|1|UP||||||X~Y", enc);
        assert_eq!(rol.field_def(8).data_type, DataType::Varies);
        assert!(rol.is_repeating(8));
        assert_eq!(rol.get_all(8).unwrap().len(), 2);
        rol.add(9).unwrap().set_text("Z");
        assert_eq!(rol.encode(), "ROL|1|UP||||||X~Y|Z");
    }

    #[test]
    fn test_field_number_ceiling() {
        let mut rol = Segment::parse(rol_def(), "ROL|1|UP", EncodingCharacters::default());
        assert!(matches!(
            rol.get_rep(999_999_999, 0),
            Err(Hl7Error::InvalidFieldNumber { number: 999_999_999, .. })
        ));
        assert!(matches!(
            rol.add(MAX_FIELD_NUMBER + 1),
            Err(Hl7Error::InvalidFieldNumber { .. })
        ));
        assert_eq!(rol.field_count(), 2);
        assert_eq!(rol.repetitions(999_999_999).unwrap(), 0);

        rol.get_rep(MAX_FIELD_NUMBER, 0).unwrap().set_text("end");
        assert_eq!(rol.field_count(), MAX_FIELD_NUMBER);
    }

    #[test]
    fn test_field_by_description() {
        let rol = Segment::new(rol_def(), EncodingCharacters::default());
        assert_eq!(rol.field_by_description("role person"), Some(4));
        assert_eq!(rol.field_by_description("nothing"), None);
    }
}
