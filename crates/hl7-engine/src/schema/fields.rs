//! Segment field table parser.
//!
//! Parses files matching pattern: `hl7_SegmentFields_<version>.txt`

use std::path::Path;

use csv::StringRecord;
use hl7_types::{Cardinality, FieldDef};

use super::table::{parse, TableParser, TableRecord};
use crate::types::Hl7Result;

/// Order: segment, sequence, name, dataType, cardinality, maxLength
const FIELD_COLUMNS: &[&str] = &[
    "segment",
    "sequence",
    "name",
    "dataType",
    "cardinality",
    "maxLength",
];

/// One row of a segment field table: field `sequence` of `segment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    /// Segment name.
    pub segment: String,
    /// 1-based field number.
    pub sequence: usize,
    /// The field definition.
    pub field: FieldDef,
}

impl TableRecord for FieldRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = FIELD_COLUMNS;

    fn from_record(record: &StringRecord) -> Hl7Result<Self> {
        let segment = parse::column(record, 0, "segment")?.to_string();
        let sequence = parse::integer(parse::column(record, 1, "sequence")?)?;
        let name = parse::column(record, 2, "name")?;
        let data_type = parse::data_type(parse::column(record, 3, "dataType")?)?;

        let cardinality_str = parse::column(record, 4, "cardinality")?;
        let cardinality = if cardinality_str.is_empty() {
            Cardinality::optional()
        } else {
            parse::cardinality(cardinality_str)?
        };

        // maxLength is the last column and is often left off entirely
        let max_length = match record.get(5) {
            Some(value) => parse::max_length(value)?,
            None => 0,
        };

        Ok(Self {
            segment,
            sequence,
            field: FieldDef::new(name, data_type, cardinality, max_length),
        })
    }
}

/// Parses a segment field table.
///
/// # Returns
/// Iterator over parsed `FieldRow` records.
pub fn parse_fields_file<P: AsRef<Path>>(
    path: P,
    batch_size: usize,
) -> Hl7Result<TableParser<std::io::BufReader<std::fs::File>, FieldRow>> {
    TableParser::from_path(path, batch_size)
}
