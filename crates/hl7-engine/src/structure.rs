//! Structural nodes and the accessor contract shared by segments and groups.

use hl7_types::StructureKind;

use crate::group::Group;
use crate::segment::Segment;
use crate::types::{Hl7Error, Hl7Result};

/// Named or numbered access to the children of a node.
///
/// Segments implement it with 1-based field numbers and yield [`Value`]s;
/// groups implement it with child names and yield [`Structure`]s. The rules
/// are the same for both:
///
/// - `get` returns the sole instance of a non-repeating child, creating it
///   if absent. It fails with [`Hl7Error::NotRepeatable`] on a repeating child.
/// - `get_rep` returns repetition `rep`. Asking for exactly one past the end
///   creates it; anything further fails with
///   [`Hl7Error::RepetitionOutOfRange`].
/// - `add` appends a repetition of a repeating child.
/// - `remove` deletes one repetition and shifts the later ones down.
///
/// A failed call never changes the tree.
///
/// [`Value`]: crate::Value
pub trait Navigate<K> {
    /// The node type at each position.
    type Node;

    /// Returns the sole instance of a non-repeating child, creating it if absent.
    fn get(&mut self, key: K) -> Hl7Result<&mut Self::Node>;

    /// Returns repetition `rep` (0-based), creating it if `rep` equals the current count.
    fn get_rep(&mut self, key: K, rep: usize) -> Hl7Result<&mut Self::Node>;

    /// Returns every current repetition.
    fn get_all(&self, key: K) -> Hl7Result<&[Self::Node]>;

    /// Appends a new repetition and returns it.
    fn add(&mut self, key: K) -> Hl7Result<&mut Self::Node>;

    /// Removes repetition `rep` and returns it.
    fn remove(&mut self, key: K, rep: usize) -> Hl7Result<Self::Node>;

    /// Returns the current repetition count.
    fn repetitions(&self, key: K) -> Hl7Result<usize>;
}

/// A node of the message tree: a segment or a group.
#[derive(Debug, Clone)]
pub enum Structure {
    /// A segment (leaf).
    Segment(Segment),
    /// A group (branch).
    Group(Group),
}

impl Structure {
    /// Returns the structure name.
    pub fn name(&self) -> &str {
        match self {
            Self::Segment(segment) => segment.name(),
            Self::Group(group) => group.name(),
        }
    }

    /// Returns whether this is a segment or a group.
    pub fn kind(&self) -> StructureKind {
        match self {
            Self::Segment(_) => StructureKind::Segment,
            Self::Group(_) => StructureKind::Group,
        }
    }

    /// Returns true if nothing below this node carries data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Segment(segment) => segment.is_empty(),
            Self::Group(group) => group.is_empty(),
        }
    }

    /// Returns the segment, if this is one.
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Self::Segment(segment) => Some(segment),
            Self::Group(_) => None,
        }
    }

    /// Returns the group, if this is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::Segment(_) => None,
        }
    }

    /// Returns the segment mutably, failing if this is a group.
    pub fn segment_mut(&mut self) -> Hl7Result<&mut Segment> {
        match self {
            Self::Segment(segment) => Ok(segment),
            Self::Group(group) => Err(Hl7Error::SchemaKindMismatch {
                name: group.name().to_string(),
                expected: StructureKind::Segment,
            }),
        }
    }

    /// Returns the group mutably, failing if this is a segment.
    pub fn group_mut(&mut self) -> Hl7Result<&mut Group> {
        match self {
            Self::Group(group) => Ok(group),
            Self::Segment(segment) => Err(Hl7Error::SchemaKindMismatch {
                name: segment.name().to_string(),
                expected: StructureKind::Group,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncodingCharacters;
    use hl7_types::SegmentDef;
    use std::sync::Arc;

    #[test]
    fn test_structure_kind_accessors() {
        let segment = Segment::new(Arc::new(SegmentDef::new("NTE")), EncodingCharacters::default());
        let mut node = Structure::Segment(segment);
        assert_eq!(node.name(), "NTE");
        assert_eq!(node.kind(), StructureKind::Segment);
        assert!(node.is_empty());
        assert!(node.as_group().is_none());
        assert!(node.segment_mut().is_ok());
        assert!(matches!(
            node.group_mut(),
            Err(Hl7Error::SchemaKindMismatch { expected: StructureKind::Group, .. })
        ));
    }
}
