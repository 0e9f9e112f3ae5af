//! # hl7-types
//!
//! Schema metadata types for HL7 v2 message structures.
//!
//! This crate holds the vocabulary the message engine consumes: version tags,
//! datatype tags, cardinalities, and the segment/group definitions that a
//! schema provider hands out. It contains no parsing or encoding logic.
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!   Disable this feature for zero-dependency usage.
//!
//! ## Usage
//!
//! ```rust
//! use hl7_types::{Cardinality, DataType, FieldDef, SegmentDef, StructureDef, Version};
//!
//! let pid = SegmentDef::new("PID")
//!     .field(FieldDef::new("Set ID - PID", DataType::Si, Cardinality::optional(), 4))
//!     .field(FieldDef::new("Patient ID", DataType::Cx, Cardinality::optional(), 0))
//!     .field(FieldDef::new("Patient Identifier List", DataType::Cx, Cardinality::one_or_more(), 0));
//!
//! let def: StructureDef = pid.into();
//! assert_eq!(def.name(), "PID");
//! assert_eq!(Version::from_code("2.5.1"), Some(Version::V2_5_1));
//! ```

#![warn(missing_docs)]

mod datatype;
pub mod schema;
mod version;

// Re-export all public types at crate root
pub use datatype::DataType;
pub use schema::{
    Cardinality, CardinalityParseError, FieldDef, GroupChild, GroupDef, SegmentDef, StructureDef,
    StructureKind,
};
pub use version::{UnknownVersion, Version};
