//! Engine-wide error, configuration and statistics types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hl7_types::{StructureKind, Version};
use thiserror::Error;

/// Errors raised by parsing, encoding, tree access and schema loading.
#[derive(Error, Debug)]
pub enum Hl7Error {
    /// The first line does not carry a usable delimiter header.
    #[error("line {line}: malformed header: {reason}")]
    MalformedHeader {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the header.
        reason: String,
    },

    /// A segment could not be placed at any reachable schema position.
    #[error("line {line}: unexpected segment '{name}' in {structure}")]
    UnexpectedSegment {
        /// 1-based line number.
        line: usize,
        /// The segment name found on the wire.
        name: String,
        /// The message structure being parsed.
        structure: String,
    },

    /// A schema-required child was never matched.
    #[error("line {line}: required structure '{name}' missing from {parent}")]
    MissingRequiredStructure {
        /// Line at which the omission was detected (end of input).
        line: usize,
        /// The missing child.
        name: String,
        /// The group that should contain it.
        parent: String,
    },

    /// Single-instance access to a repeating child, or a second instance of
    /// a non-repeating one.
    #[error("'{name}' {}", repeat_hint(.repeating))]
    NotRepeatable {
        /// The child or field that was accessed.
        name: String,
        /// Whether the schema marks it repeating.
        repeating: bool,
    },

    /// Repetition index more than one past the end.
    #[error("repetition {rep} of '{name}' is out of range ({count} present)")]
    RepetitionOutOfRange {
        /// The child or field that was accessed.
        name: String,
        /// The requested repetition (0-based).
        rep: usize,
        /// The current repetition count.
        count: usize,
    },

    /// A group has no child of the given name.
    #[error("'{name}' is not a child of {parent}")]
    NoSuchChild {
        /// The requested child name.
        name: String,
        /// The group that was searched.
        parent: String,
    },

    /// Field numbers are 1-based.
    #[error("invalid field number {number} for segment {segment}")]
    InvalidFieldNumber {
        /// The segment accessed.
        segment: String,
        /// The rejected field number.
        number: usize,
    },

    /// Component and sub-component numbers are 1-based.
    #[error("invalid component number {number}")]
    InvalidComponentNumber {
        /// The rejected number.
        number: usize,
    },

    /// A navigation path could not be interpreted.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The path as given.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The schema provider has no definition for a name.
    #[error("unknown structure '{name}' for version {version}")]
    UnknownStructure {
        /// The structure name.
        name: String,
        /// The version searched.
        version: Version,
    },

    /// A definition exists but has the wrong kind.
    #[error("structure '{name}' is not a {expected:?}")]
    SchemaKindMismatch {
        /// The structure name.
        name: String,
        /// The kind that was required.
        expected: StructureKind,
    },

    /// An engine invariant was violated; this indicates a bug, not bad data.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// I/O error reading a schema table.
    #[error("IO error reading schema table: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error in a schema table.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing required column in a schema table row.
    #[error("Missing required column: {column}")]
    MissingColumn {
        /// The name of the missing column.
        column: String,
    },

    /// Invalid header - column count mismatch.
    #[error("Invalid header: expected {expected} columns, found {found}")]
    InvalidHeader {
        /// Expected column count.
        expected: usize,
        /// Found column count.
        found: usize,
    },

    /// Unexpected column name.
    #[error("Unexpected column '{found}' at position {position}, expected '{expected}'")]
    UnexpectedColumn {
        /// The column position.
        position: usize,
        /// Expected column name.
        expected: String,
        /// Found column name.
        found: String,
    },

    /// Invalid cardinality text.
    #[error("Invalid cardinality: {value}")]
    InvalidCardinality {
        /// The invalid value.
        value: String,
    },

    /// Invalid integer value.
    #[error("Invalid integer value: {value}")]
    InvalidInteger {
        /// The invalid value.
        value: String,
    },

    /// Unknown datatype code.
    #[error("Unknown datatype: {value}")]
    UnknownDataType {
        /// The unrecognized code.
        value: String,
    },

    /// Unknown version text.
    #[error("Unknown version: {value}")]
    UnknownVersion {
        /// The unrecognized version.
        value: String,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Directory not found.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The path that was not found.
        path: String,
    },
}

fn repeat_hint(repeating: &bool) -> &'static str {
    if *repeating {
        "repeats and must be addressed by repetition"
    } else {
        "is not repeatable"
    }
}

/// Result type for engine operations.
pub type Hl7Result<T> = Result<T, Hl7Error>;

/// What the parser does with a segment that fits nowhere in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedSegmentPolicy {
    /// Fail the parse with [`Hl7Error::UnexpectedSegment`].
    #[default]
    Reject,
    /// Keep the segment in the innermost open group and continue.
    Retain,
}

/// Configuration for message parsing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Handling of segments no schema position accepts.
    pub unexpected_segments: UnexpectedSegmentPolicy,
    /// Whether a never-matched required child fails the parse.
    pub enforce_required: bool,
    /// Root structure to use instead of the one named by MSH-9.
    pub structure: Option<String>,
    /// Version to use instead of the one named by MSH-12.
    pub version: Option<Version>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            unexpected_segments: UnexpectedSegmentPolicy::Reject,
            enforce_required: true,
            structure: None,
            version: None,
        }
    }
}

impl ParseOptions {
    /// Rejects unexpected segments and missing required structures.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Retains unexpected segments instead of failing.
    pub fn lenient() -> Self {
        Self {
            unexpected_segments: UnexpectedSegmentPolicy::Retain,
            ..Self::default()
        }
    }

    /// Sets the version (builder style).
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the root structure (builder style).
    pub fn with_structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = Some(structure.into());
        self
    }
}

/// Configuration for message encoding.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Text written after every segment.
    pub segment_terminator: String,
    /// Whether empty fields at the end of a segment are dropped.
    pub trim_trailing_fields: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            segment_terminator: "\r".to_string(),
            trim_trailing_fields: true,
        }
    }
}

/// Configuration for schema table loading.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    /// Versions to load (empty = all discovered versions).
    pub versions: Vec<Version>,
    /// Rows handed to the store per batch.
    pub batch_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
            batch_size: 10_000,
        }
    }
}

impl SchemaConfig {
    /// Returns true if the given version should be loaded.
    pub fn includes(&self, version: Version) -> bool {
        self.versions.is_empty() || self.versions.contains(&version)
    }
}

/// Statistics from parsing one message.
#[derive(Debug, Clone, Default)]
pub struct ParseStats {
    /// Segment lines read from the input.
    pub total_segments: usize,
    /// Segments placed at a schema position.
    pub placed_segments: usize,
    /// Segments kept as unrecognized (lenient mode only).
    pub unrecognized_segments: usize,
    /// Segments accepted beyond their schema cardinality.
    pub overflow_segments: usize,
    /// Time taken to parse in milliseconds.
    pub parse_time_ms: u64,
}

impl ParseStats {
    /// Returns the percentage of segments placed at a schema position.
    pub fn placement_rate(&self) -> f64 {
        if self.total_segments == 0 {
            0.0
        } else {
            (self.placed_segments as f64 / self.total_segments as f64) * 100.0
        }
    }
}

/// The two tables describing one version.
#[derive(Debug, Clone, Default)]
pub struct SchemaTables {
    /// Path to the segment field table.
    pub fields_file: Option<PathBuf>,
    /// Path to the structure children table.
    pub children_file: Option<PathBuf>,
}

impl SchemaTables {
    /// Returns true if both tables are present.
    pub fn is_complete(&self) -> bool {
        self.fields_file.is_some() && self.children_file.is_some()
    }

    /// Returns a list of missing tables.
    pub fn missing_files(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.fields_file.is_none() {
            missing.push("SegmentFields");
        }
        if self.children_file.is_none() {
            missing.push("StructureChildren");
        }
        missing
    }
}

/// Discovered schema tables in a directory, per version.
#[derive(Debug, Clone, Default)]
pub struct SchemaFiles {
    /// Tables keyed by the version extracted from their file names.
    pub versions: BTreeMap<Version, SchemaTables>,
}

impl SchemaFiles {
    /// Creates a new empty SchemaFiles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no tables were found.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_default_is_strict() {
        let options = ParseOptions::default();
        assert_eq!(options.unexpected_segments, UnexpectedSegmentPolicy::Reject);
        assert!(options.enforce_required);
        assert!(options.structure.is_none());
    }

    #[test]
    fn test_parse_options_lenient() {
        let options = ParseOptions::lenient()
            .with_version(Version::V2_5)
            .with_structure("ADT_A01");
        assert_eq!(options.unexpected_segments, UnexpectedSegmentPolicy::Retain);
        assert_eq!(options.version, Some(Version::V2_5));
        assert_eq!(options.structure.as_deref(), Some("ADT_A01"));
    }

    #[test]
    fn test_encode_options_default() {
        let options = EncodeOptions::default();
        assert_eq!(options.segment_terminator, "\r");
        assert!(options.trim_trailing_fields);
    }

    #[test]
    fn test_schema_config_includes() {
        let all = SchemaConfig::default();
        assert!(all.includes(Version::V2_3));

        let only = SchemaConfig {
            versions: vec![Version::V2_8],
            ..Default::default()
        };
        assert!(only.includes(Version::V2_8));
        assert!(!only.includes(Version::V2_3));
    }

    #[test]
    fn test_parse_stats_placement_rate() {
        let stats = ParseStats {
            total_segments: 4,
            placed_segments: 3,
            unrecognized_segments: 1,
            ..Default::default()
        };
        assert!((stats.placement_rate() - 75.0).abs() < 0.01);
        assert_eq!(ParseStats::default().placement_rate(), 0.0);
    }

    #[test]
    fn test_schema_tables_missing() {
        let tables = SchemaTables {
            fields_file: Some(PathBuf::from("hl7_SegmentFields_2.8.txt")),
            children_file: None,
        };
        assert!(!tables.is_complete());
        assert_eq!(tables.missing_files(), vec!["StructureChildren"]);
    }

    #[test]
    fn test_not_repeatable_message() {
        let single = Hl7Error::NotRepeatable {
            name: "MSH".to_string(),
            repeating: false,
        };
        assert_eq!(single.to_string(), "'MSH' is not repeatable");

        let many = Hl7Error::NotRepeatable {
            name: "PID-3".to_string(),
            repeating: true,
        };
        assert_eq!(many.to_string(), "'PID-3' repeats and must be addressed by repetition");
    }

    #[test]
    fn test_error_messages_carry_location() {
        let err = Hl7Error::UnexpectedSegment {
            line: 3,
            name: "ZZZ".to_string(),
            structure: "ADT_A01".to_string(),
        };
        assert_eq!(err.to_string(), "line 3: unexpected segment 'ZZZ' in ADT_A01");
    }
}
