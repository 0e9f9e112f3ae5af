//! # hl7-engine
//!
//! Schema-driven parser, encoder and message tree for HL7 v2 messages.
//!
//! A message is parsed into a tree of groups and segments laid out by a
//! [`SchemaProvider`]. Every value is kept as the delimiter-aware wire
//! string, so a parse followed by an encode reproduces the input.
//!
//! ## Features
//!
//! - `parallel` (default): batch parsing and schema table loading with `rayon`.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use hl7_engine::{parse, Navigate, SchemaProvider, SchemaStore};
//! use hl7_types::{Cardinality, DataType, FieldDef, GroupChild, GroupDef, SegmentDef, Version};
//!
//! let store = SchemaStore::new()
//!     .with_segment(Version::V2_5, SegmentDef::new("MSH"))
//!     .with_segment(
//!         Version::V2_5,
//!         SegmentDef::new("PID")
//!             .field(FieldDef::new("Set ID", DataType::Si, Cardinality::optional(), 4))
//!             .field(FieldDef::new("Patient ID", DataType::Cx, Cardinality::optional(), 0))
//!             .field(FieldDef::new("Identifiers", DataType::Cx, Cardinality::one_or_more(), 0)),
//!     )
//!     .with_group(
//!         Version::V2_5,
//!         GroupDef::new("ADT_A01")
//!             .child(GroupChild::new("MSH", Cardinality::required()))
//!             .child(GroupChild::new("PID", Cardinality::required())),
//!     );
//! let provider: Arc<dyn SchemaProvider> = Arc::new(store);
//!
//! let text = "MSH|^~\\&|||||||ADT^A01|||2.5\rPID|1||123^^MR\r";
//! let mut msg = parse(text, provider, Version::V2_5).unwrap();
//!
//! let pid = msg.root_mut().get("PID").unwrap().segment_mut().unwrap();
//! assert_eq!(pid.get_rep(3, 0).unwrap().component(1), "123");
//!
//! msg.set("PID-3(1)-1", "456").unwrap();
//! assert_eq!(msg.get("PID-3(1)-1").unwrap().as_deref(), Some("456"));
//! assert_eq!(msg.encode(), "MSH|^~\\&|||||||ADT^A01|||2.5\rPID|1||123^^MR~456\r");
//! ```

#![warn(missing_docs)]

mod encoder;
mod encoding;
mod escape;
mod field;
mod group;
mod loader;
mod location;
mod message;
mod parser;
pub mod schema;
mod segment;
mod structure;
pub mod types;
mod validate;
mod value;

pub use encoder::Encoder;
pub use encoding::{is_header_segment, EncodingCharacters, HEADER_SEGMENTS};
pub use escape::{escape, unescape, unescape_checked, EscapeWarning};
pub use field::Field;
pub use group::{Group, Unrecognized};
pub use loader::discover_schema_files;
pub use location::Location;
pub use message::Message;
pub use parser::{parse, parse_auto, parse_batch, Parser};
pub use schema::{Definition, SchemaContext, SchemaProvider, SchemaStore};
pub use segment::{segment_name, Segment, MAX_FIELD_NUMBER};
pub use structure::{Navigate, Structure};
pub use types::{
    EncodeOptions, Hl7Error, Hl7Result, ParseOptions, ParseStats, SchemaConfig, SchemaFiles,
    SchemaTables, UnexpectedSegmentPolicy,
};
pub use validate::{validate_field, validate_format, FieldIssue, FormatError};
pub use value::Value;

// Re-export hl7-types for convenience
pub use hl7_types;
