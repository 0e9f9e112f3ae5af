//! Structure definitions consumed by the message engine.
//!
//! A schema describes, per version, every segment (its ordered fields) and
//! every group or message (its ordered children). The engine never hardcodes
//! a message layout; it reads these definitions through a schema provider.
//!
//! # Examples
//!
//! ```
//! use hl7_types::schema::{Cardinality, FieldDef, GroupChild, GroupDef, SegmentDef};
//! use hl7_types::DataType;
//!
//! let rol = SegmentDef::new("ROL")
//!     .field(FieldDef::new("Role Instance ID", DataType::Ei, Cardinality::optional(), 0))
//!     .field(FieldDef::new("Action Code", DataType::Id, Cardinality::required(), 2));
//! assert_eq!(rol.field_def(2).unwrap().description, "Action Code");
//!
//! let msg = GroupDef::new("DRC_O47")
//!     .child(GroupChild::new("MSH", Cardinality::required()))
//!     .child(GroupChild::new("SFT", Cardinality::unbounded()));
//! assert!(msg.child_named("SFT").unwrap().is_repeating());
//! ```

use std::fmt;

use crate::DataType;

/// Error type for cardinality parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardinalityParseError {
    /// Invalid format - expected "min..max"
    InvalidFormat(String),
    /// Invalid minimum value
    InvalidMin(String),
    /// Invalid maximum value
    InvalidMax(String),
}

impl fmt::Display for CardinalityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(s) => {
                write!(f, "invalid cardinality format: '{}' (expected min..max)", s)
            }
            Self::InvalidMin(s) => write!(f, "invalid cardinality minimum: '{}'", s),
            Self::InvalidMax(s) => write!(f, "invalid cardinality maximum: '{}'", s),
        }
    }
}

impl std::error::Error for CardinalityParseError {}

/// Occurrence constraint for a field or a group child.
///
/// Represents constraints like "0..1", "1..1", "0..*", "1..*".
///
/// # Examples
///
/// ```
/// use hl7_types::Cardinality;
///
/// let card = Cardinality::parse("0..*").unwrap();
/// assert!(!card.is_required());
/// assert!(card.is_repeating());
///
/// let card = Cardinality::parse("1..1").unwrap();
/// assert!(card.is_required());
/// assert!(!card.is_repeating());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cardinality {
    /// Minimum occurrences (inclusive).
    pub min: u32,
    /// Maximum occurrences (inclusive). None means unbounded (*).
    pub max: Option<u32>,
}

impl Cardinality {
    /// Creates a new cardinality with explicit min and max.
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Optional and repeating (0..*).
    pub const fn unbounded() -> Self {
        Self { min: 0, max: None }
    }

    /// Optional and single (0..1).
    pub const fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Required and single (1..1).
    pub const fn required() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Required and repeating (1..*).
    pub const fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Builds a cardinality from the required/repeating flag pair.
    pub const fn from_flags(required: bool, repeating: bool) -> Self {
        match (required, repeating) {
            (true, true) => Self::one_or_more(),
            (true, false) => Self::required(),
            (false, true) => Self::unbounded(),
            (false, false) => Self::optional(),
        }
    }

    /// Parses a cardinality from a string like "0..*", "0..1", "1..1".
    ///
    /// # Examples
    ///
    /// ```
    /// use hl7_types::Cardinality;
    ///
    /// assert_eq!(Cardinality::parse("0..*").unwrap(), Cardinality::unbounded());
    /// assert_eq!(Cardinality::parse("1..*").unwrap(), Cardinality::one_or_more());
    /// assert_eq!(Cardinality::parse("0..5").unwrap(), Cardinality::new(0, Some(5)));
    /// ```
    pub fn parse(s: &str) -> Result<Self, CardinalityParseError> {
        let parts: Vec<&str> = s.trim().split("..").collect();
        if parts.len() != 2 {
            return Err(CardinalityParseError::InvalidFormat(s.to_string()));
        }

        let min = parts[0]
            .parse::<u32>()
            .map_err(|_| CardinalityParseError::InvalidMin(parts[0].to_string()))?;

        let max = if parts[1] == "*" {
            None
        } else {
            Some(
                parts[1]
                    .parse::<u32>()
                    .map_err(|_| CardinalityParseError::InvalidMax(parts[1].to_string()))?,
            )
        };

        if max.is_some_and(|max| max == 0 || max < min) {
            return Err(CardinalityParseError::InvalidMax(parts[1].to_string()));
        }

        Ok(Self { min, max })
    }

    /// Returns true if the given count satisfies this cardinality constraint.
    pub fn allows(&self, count: u32) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Returns true if at least one occurrence is required.
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }

    /// Returns true if more than one occurrence is allowed.
    pub fn is_repeating(&self) -> bool {
        self.max != Some(1)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// Whether a structure is a leaf segment or a group of structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureKind {
    /// A single wire line with ordered fields.
    Segment,
    /// A named, ordered composite of segments and groups.
    Group,
}

/// Definition of one field position within a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDef {
    /// Human-readable field name (e.g. "Role Instance ID").
    pub description: String,
    /// Datatype tag of each repetition.
    pub data_type: DataType,
    /// How many repetitions the field may carry.
    pub cardinality: Cardinality,
    /// Maximum length of one repetition; 0 means no limit.
    pub max_length: u32,
}

impl FieldDef {
    /// Creates a field definition.
    pub fn new(
        description: impl Into<String>,
        data_type: DataType,
        cardinality: Cardinality,
        max_length: u32,
    ) -> Self {
        Self {
            description: description.into(),
            data_type,
            cardinality,
            max_length,
        }
    }

    /// Definition used for field positions beyond the end of a segment definition.
    pub fn extra() -> Self {
        Self::new("", DataType::Varies, Cardinality::unbounded(), 0)
    }

    /// Returns true if the field must be present.
    pub fn is_required(&self) -> bool {
        self.cardinality.is_required()
    }

    /// Returns true if the field may repeat.
    pub fn is_repeating(&self) -> bool {
        self.cardinality.is_repeating()
    }
}

/// Definition of a segment: its name and ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentDef {
    /// Three-character segment name (e.g. "PID").
    pub name: String,
    /// Fields in wire order; index 0 is field 1.
    pub fields: Vec<FieldDef>,
}

impl SegmentDef {
    /// Creates a segment definition with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field definition (builder style).
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the definition of field `number` (1-based).
    pub fn field_def(&self, number: usize) -> Option<&FieldDef> {
        number.checked_sub(1).and_then(|index| self.fields.get(index))
    }

    /// Returns the 1-based number of the field with the given description.
    pub fn field_number(&self, description: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.description.eq_ignore_ascii_case(description))
            .map(|index| index + 1)
    }
}

/// One child position inside a group definition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupChild {
    /// Name of the child within its group (unique per group).
    pub name: String,
    /// Name of the structure definition the child refers to.
    ///
    /// Usually equal to `name`; differs when one segment occupies two
    /// positions of a group (e.g. child `NTE2` referring to segment `NTE`).
    pub structure: String,
    /// Occurrence constraint for the child.
    pub cardinality: Cardinality,
}

impl GroupChild {
    /// Creates a child that refers to the structure of the same name.
    pub fn new(name: impl Into<String>, cardinality: Cardinality) -> Self {
        let name = name.into();
        Self {
            structure: name.clone(),
            name,
            cardinality,
        }
    }

    /// Creates a child whose name differs from the structure it refers to.
    pub fn aliased(
        name: impl Into<String>,
        structure: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            structure: structure.into(),
            cardinality,
        }
    }

    /// Returns true if the child must be present.
    pub fn is_required(&self) -> bool {
        self.cardinality.is_required()
    }

    /// Returns true if the child may repeat.
    pub fn is_repeating(&self) -> bool {
        self.cardinality.is_repeating()
    }
}

/// Definition of a group or message: its name and ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupDef {
    /// Group name (e.g. "DRC_O47_DONOR"), or the message structure name.
    pub name: String,
    /// Children in schema order.
    pub children: Vec<GroupChild>,
}

impl GroupDef {
    /// Creates a group definition with no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Appends a child (builder style).
    pub fn child(mut self, child: GroupChild) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the index of the named child.
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }

    /// Returns the named child.
    pub fn child_named(&self, name: &str) -> Option<&GroupChild> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// A structure definition: either a segment or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureDef {
    /// Segment definition.
    Segment(SegmentDef),
    /// Group (or message) definition.
    Group(GroupDef),
}

impl StructureDef {
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

    /// Returns the segment definition, if this is a segment.
    pub fn as_segment(&self) -> Option<&SegmentDef> {
        match self {
            Self::Segment(def) => Some(def),
            Self::Group(_) => None,
        }
    }

    /// Returns the group definition, if this is a group.
    pub fn as_group(&self) -> Option<&GroupDef> {
        match self {
            Self::Group(def) => Some(def),
            Self::Segment(_) => None,
        }
    }
}

impl From<SegmentDef> for StructureDef {
    fn from(def: SegmentDef) -> Self {
        Self::Segment(def)
    }
}

impl From<GroupDef> for StructureDef {
    fn from(def: GroupDef) -> Self {
        Self::Group(def)
    }
}
