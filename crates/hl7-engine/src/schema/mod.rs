//! Schema lookup: where the engine gets structure definitions from.
//!
//! The engine never hardcodes a message layout. Parsing, encoding and
//! create-on-demand access all ask a [`SchemaProvider`] for the definition
//! of a structure by name and version.
//!
//! - **Provider** - the lookup interface; implement it over any data source
//! - **Store** - an in-memory provider, filled in code or from tables
//! - **Tables** - tab-delimited schema files read with the `csv` crate
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use hl7_engine::schema::{SchemaProvider, SchemaStore};
//! use hl7_types::{Cardinality, DataType, FieldDef, GroupChild, GroupDef, SegmentDef, Version};
//!
//! let mut store = SchemaStore::new();
//! store.insert(
//!     Version::V2_5,
//!     SegmentDef::new("PID")
//!         .field(FieldDef::new("Set ID", DataType::Si, Cardinality::optional(), 4)),
//! );
//! store.insert(
//!     Version::V2_5,
//!     GroupDef::new("ADT_A01").child(GroupChild::new("PID", Cardinality::required())),
//! );
//!
//! let provider: Arc<dyn SchemaProvider> = Arc::new(store);
//! assert!(provider.lookup_structure("PID", Version::V2_5).is_some());
//! assert!(provider.lookup_structure("PID", Version::V2_3).is_none());
//! ```
//!
//! # Table Files
//!
//! ```text
//! schema/
//! ├── hl7_SegmentFields_2.5.txt
//! ├── hl7_StructureChildren_2.5.txt
//! ├── hl7_SegmentFields_2.8.txt
//! └── hl7_StructureChildren_2.8.txt
//! ```

mod children;
mod fields;
mod store;
pub mod table;

use std::fmt;
use std::sync::Arc;

use hl7_types::{GroupChild, GroupDef, SegmentDef, StructureDef, StructureKind, Version};

use crate::encoding::EncodingCharacters;
use crate::group::Group;
use crate::segment::Segment;
use crate::structure::Structure;
use crate::types::{Hl7Error, Hl7Result};

pub use children::{parse_children_file, ChildRow};
pub use fields::{parse_fields_file, FieldRow};
pub use store::SchemaStore;

/// A shared, immutable structure definition handed out by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// Segment definition.
    Segment(Arc<SegmentDef>),
    /// Group (or message) definition.
    Group(Arc<GroupDef>),
}

impl Definition {
    /// Returns the structure name.
    pub fn name(&self) -> &str {
        match self {
            Self::Segment(def) => &def.name,
            Self::Group(def) => &def.name,
        }
    }

    /// Returns whether this is a segment or a group.
    pub fn kind(&self) -> StructureKind {
        match self {
            Self::Segment(_) => StructureKind::Segment,
            Self::Group(_) => StructureKind::Group,
        }
    }
}

impl From<StructureDef> for Definition {
    fn from(def: StructureDef) -> Self {
        match def {
            StructureDef::Segment(def) => Self::Segment(Arc::new(def)),
            StructureDef::Group(def) => Self::Group(Arc::new(def)),
        }
    }
}

/// Source of per-version structure definitions.
///
/// Implementations must be deterministic and safe to share between threads:
/// one provider is typically initialized once and read by many parsers.
pub trait SchemaProvider: Send + Sync {
    /// Returns the definition of `name` at `version`, if known.
    fn lookup_structure(&self, name: &str, version: Version) -> Option<Definition>;

    /// Returns the segment definition of `name`, failing if unknown or a group.
    fn lookup_segment(&self, name: &str, version: Version) -> Hl7Result<Arc<SegmentDef>> {
        match self.lookup_structure(name, version) {
            Some(Definition::Segment(def)) => Ok(def),
            Some(Definition::Group(_)) => Err(Hl7Error::SchemaKindMismatch {
                name: name.to_string(),
                expected: StructureKind::Segment,
            }),
            None => Err(Hl7Error::UnknownStructure {
                name: name.to_string(),
                version,
            }),
        }
    }

    /// Returns the group definition of `name`, failing if unknown or a segment.
    fn lookup_group(&self, name: &str, version: Version) -> Hl7Result<Arc<GroupDef>> {
        match self.lookup_structure(name, version) {
            Some(Definition::Group(def)) => Ok(def),
            Some(Definition::Segment(_)) => Err(Hl7Error::SchemaKindMismatch {
                name: name.to_string(),
                expected: StructureKind::Group,
            }),
            None => Err(Hl7Error::UnknownStructure {
                name: name.to_string(),
                version,
            }),
        }
    }
}

/// The schema handle every group carries so it can create children on demand.
#[derive(Clone)]
pub struct SchemaContext {
    provider: Arc<dyn SchemaProvider>,
    version: Version,
    encoding: EncodingCharacters,
}

impl fmt::Debug for SchemaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaContext")
            .field("version", &self.version)
            .field("encoding", &self.encoding.to_string())
            .finish_non_exhaustive()
    }
}

impl SchemaContext {
    /// Creates a handle over a provider for one version and delimiter set.
    pub fn new(
        provider: Arc<dyn SchemaProvider>,
        version: Version,
        encoding: EncodingCharacters,
    ) -> Self {
        Self {
            provider,
            version,
            encoding,
        }
    }

    /// Returns the provider.
    pub fn provider(&self) -> &Arc<dyn SchemaProvider> {
        &self.provider
    }

    /// Returns the schema version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the message delimiters.
    pub fn encoding(&self) -> EncodingCharacters {
        self.encoding
    }

    /// Looks up a definition, failing if the provider does not know it.
    pub fn lookup(&self, name: &str) -> Hl7Result<Definition> {
        self.provider
            .lookup_structure(name, self.version)
            .ok_or_else(|| Hl7Error::UnknownStructure {
                name: name.to_string(),
                version: self.version,
            })
    }

    /// Builds an empty instance of a group child.
    ///
    /// With `skeleton` set, a group instance is populated with its required,
    /// non-repeating children (recursively); otherwise it starts empty.
    pub(crate) fn instantiate(&self, child: &GroupChild, skeleton: bool) -> Hl7Result<Structure> {
        match self.lookup(&child.structure)? {
            Definition::Segment(def) => Ok(Structure::Segment(Segment::new(def, self.encoding))),
            Definition::Group(def) => {
                let group = if skeleton {
                    Group::skeleton(def, self.clone())?
                } else {
                    Group::new(def, self.clone())
                };
                Ok(Structure::Group(group))
            }
        }
    }
}
