//! Structure children table parser.
//!
//! Parses files matching pattern: `hl7_StructureChildren_<version>.txt`

use std::path::Path;

use csv::StringRecord;
use hl7_types::GroupChild;

use super::table::{parse, TableParser, TableRecord};
use crate::types::Hl7Result;

/// Order: structure, sequence, child, target, cardinality
const CHILD_COLUMNS: &[&str] = &["structure", "sequence", "child", "target", "cardinality"];

/// One row of a structure children table: child `sequence` of a group or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRow {
    /// Group or message structure name.
    pub structure: String,
    /// 1-based position among the structure's children.
    pub sequence: usize,
    /// The child definition.
    pub child: GroupChild,
}

impl TableRecord for ChildRow {
    const EXPECTED_COLUMNS: &'static [&'static str] = CHILD_COLUMNS;

    fn from_record(record: &StringRecord) -> Hl7Result<Self> {
        let structure = parse::column(record, 0, "structure")?.to_string();
        let sequence = parse::integer(parse::column(record, 1, "sequence")?)?;
        let name = parse::column(record, 2, "child")?;
        let target = parse::column(record, 3, "target")?;
        let cardinality = parse::cardinality(parse::column(record, 4, "cardinality")?)?;

        let child = if target.is_empty() || target == name {
            GroupChild::new(name, cardinality)
        } else {
            GroupChild::aliased(name, target, cardinality)
        };

        Ok(Self {
            structure,
            sequence,
            child,
        })
    }
}

/// Parses a structure children table.
pub fn parse_children_file<P: AsRef<Path>>(
    path: P,
    batch_size: usize,
) -> Hl7Result<TableParser<std::io::BufReader<std::fs::File>, ChildRow>> {
    TableParser::from_path(path, batch_size)
}
