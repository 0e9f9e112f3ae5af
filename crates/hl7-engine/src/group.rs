//! Group nodes: named, ordered children, each possibly repeating.

use std::sync::Arc;

use hl7_types::{GroupChild, GroupDef};

use crate::schema::SchemaContext;
use crate::segment::Segment;
use crate::structure::{Navigate, Structure};
use crate::types::{Hl7Error, Hl7Result};

/// A segment the schema had no position for, kept in lenient parsing.
#[derive(Debug, Clone)]
pub struct Unrecognized {
    /// Schema index of the last child placed before it (0 when none was).
    pub position: usize,
    /// Instances of the child at `position` that precede it.
    pub preceding: usize,
    /// 1-based input line it came from.
    pub line: usize,
    /// The segment, with every field kept as untyped.
    pub segment: Segment,
}

impl Unrecognized {
    /// Returns true if it is encoded before instance `rep` of schema child `index`.
    pub fn is_before(&self, index: usize, rep: usize) -> bool {
        self.position < index || (self.position == index && self.preceding <= rep)
    }
}

/// A group instance (or a whole message, for the root).
///
/// Children are stored per schema position, so they always encode in
/// schema order whatever order they were created in. Each position holds
/// the instances of that child in repetition order.
#[derive(Debug, Clone)]
pub struct Group {
    def: Arc<GroupDef>,
    context: SchemaContext,
    children: Vec<Vec<Structure>>,
    unrecognized: Vec<Unrecognized>,
}

impl Group {
    /// Creates a group with no child instances.
    pub fn new(def: Arc<GroupDef>, context: SchemaContext) -> Self {
        let children = vec![Vec::new(); def.children.len()];
        Self {
            def,
            context,
            children,
            unrecognized: Vec::new(),
        }
    }

    /// Creates a group holding one instance of every required, non-repeating
    /// child, built the same way recursively.
    pub fn skeleton(def: Arc<GroupDef>, context: SchemaContext) -> Hl7Result<Self> {
        let mut group = Self::new(def, context);
        for index in 0..group.def.children.len() {
            let child = &group.def.children[index];
            if child.is_required() && !child.is_repeating() {
                let instance = group.context.instantiate(child, true)?;
                group.children[index].push(instance);
            }
        }
        Ok(group)
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Returns the group definition.
    pub fn def(&self) -> &Arc<GroupDef> {
        &self.def
    }

    /// Returns the schema handle.
    pub fn context(&self) -> &SchemaContext {
        &self.context
    }

    /// Returns the child names in schema order.
    pub fn child_names(&self) -> Vec<&str> {
        self.def.children.iter().map(|child| child.name.as_str()).collect()
    }

    /// Returns true if the named child must be present.
    pub fn is_required(&self, name: &str) -> Hl7Result<bool> {
        Ok(self.child_def(name)?.1.is_required())
    }

    /// Returns true if the named child may repeat.
    pub fn is_repeating(&self, name: &str) -> Hl7Result<bool> {
        Ok(self.child_def(name)?.1.is_repeating())
    }

    /// Returns repetition `rep` of the named child, if present.
    pub fn child(&self, name: &str, rep: usize) -> Option<&Structure> {
        let index = self.def.child_index(name)?;
        self.children[index].get(rep)
    }

    /// Returns the number of instances at schema position `index`.
    pub fn repetitions_of(&self, index: usize) -> usize {
        self.children.get(index).map_or(0, Vec::len)
    }

    /// Returns the instances at schema position `index`.
    pub fn instances(&self, index: usize) -> &[Structure] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the segments kept without a schema position.
    pub fn unrecognized(&self) -> &[Unrecognized] {
        &self.unrecognized
    }

    /// Returns true if no instance below this group carries data.
    pub fn is_empty(&self) -> bool {
        self.unrecognized.is_empty()
            && self
                .children
                .iter()
                .flatten()
                .all(Structure::is_empty)
    }

    /// Returns the first segment named `name` in depth-first schema order.
    pub fn find_segment(&self, name: &str) -> Option<&Segment> {
        self.children.iter().flatten().find_map(|node| match node {
            Structure::Segment(segment) if segment.name() == name => Some(segment),
            Structure::Segment(_) => None,
            Structure::Group(group) => group.find_segment(name),
        })
    }

    /// Mutable form of [`Group::find_segment`].
    pub fn find_segment_mut(&mut self, name: &str) -> Option<&mut Segment> {
        self.children.iter_mut().flatten().find_map(|node| match node {
            Structure::Segment(segment) if segment.name() == name => Some(segment),
            Structure::Segment(_) => None,
            Structure::Group(group) => group.find_segment_mut(name),
        })
    }

    pub(crate) fn instances_mut(&mut self, index: usize) -> Option<&mut Vec<Structure>> {
        self.children.get_mut(index)
    }

    pub(crate) fn push_unrecognized(&mut self, entry: Unrecognized) {
        self.unrecognized.push(entry);
    }

    fn child_def(&self, name: &str) -> Hl7Result<(usize, &GroupChild)> {
        self.def
            .children
            .iter()
            .enumerate()
            .find(|(_, child)| child.name == name)
            .ok_or_else(|| Hl7Error::NoSuchChild {
                name: name.to_string(),
                parent: self.def.name.clone(),
            })
    }

    /// Returns a copy of instance `rep` of `name`, or a fresh instance when
    /// `rep` is one past the end. Fails the same way `get_rep` does.
    pub(crate) fn staged(&self, name: &str, rep: usize) -> Hl7Result<Structure> {
        let index = self.check_rep(name, rep)?;
        match self.children[index].get(rep) {
            Some(node) => Ok(node.clone()),
            None => self.context.instantiate(&self.def.children[index], true),
        }
    }

    /// Stores `node` as instance `rep` of `name`, appending it when `rep` is
    /// one past the end.
    pub(crate) fn commit(&mut self, name: &str, rep: usize, node: Structure) -> Hl7Result<()> {
        let index = self.check_rep(name, rep)?;
        let slot = &mut self.children[index];
        if rep == slot.len() {
            slot.push(node);
        } else {
            slot[rep] = node;
        }
        Ok(())
    }

    /// Checks that instance `rep` of `name` exists or may be created next.
    fn check_rep(&self, name: &str, rep: usize) -> Hl7Result<usize> {
        let (index, child) = self.child_def(name)?;
        let count = self.children[index].len();
        if rep > count {
            return Err(Hl7Error::RepetitionOutOfRange {
                name: name.to_string(),
                rep,
                count,
            });
        }
        if rep == count && rep > 0 && !child.is_repeating() {
            return Err(Hl7Error::NotRepeatable {
                name: name.to_string(),
                repeating: false,
            });
        }
        Ok(index)
    }

    fn create(&mut self, index: usize) -> Hl7Result<&mut Structure> {
        let instance = self.context.instantiate(&self.def.children[index], true)?;
        let slot = &mut self.children[index];
        slot.push(instance);
        let last = slot.len() - 1;
        Ok(&mut slot[last])
    }
}

impl<'k> Navigate<&'k str> for Group {
    type Node = Structure;

    fn get(&mut self, name: &'k str) -> Hl7Result<&mut Structure> {
        let (_, child) = self.child_def(name)?;
        if child.is_repeating() {
            return Err(Hl7Error::NotRepeatable {
                name: name.to_string(),
                repeating: true,
            });
        }
        self.get_rep(name, 0)
    }

    fn get_rep(&mut self, name: &'k str, rep: usize) -> Hl7Result<&mut Structure> {
        let index = self.check_rep(name, rep)?;
        if rep == self.children[index].len() {
            return self.create(index);
        }
        Ok(&mut self.children[index][rep])
    }

    fn get_all(&self, name: &'k str) -> Hl7Result<&[Structure]> {
        let (index, _) = self.child_def(name)?;
        Ok(&self.children[index])
    }

    fn add(&mut self, name: &'k str) -> Hl7Result<&mut Structure> {
        let (index, child) = self.child_def(name)?;
        if !child.is_repeating() {
            return Err(Hl7Error::NotRepeatable {
                name: name.to_string(),
                repeating: false,
            });
        }
        self.create(index)
    }

    fn remove(&mut self, name: &'k str, rep: usize) -> Hl7Result<Structure> {
        let (index, _) = self.child_def(name)?;
        let count = self.children[index].len();
        if rep >= count {
            return Err(Hl7Error::RepetitionOutOfRange {
                name: name.to_string(),
                rep,
                count,
            });
        }
        Ok(self.children[index].remove(rep))
    }

    fn repetitions(&self, name: &'k str) -> Hl7Result<usize> {
        let (index, _) = self.child_def(name)?;
        Ok(self.children[index].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncodingCharacters;
    use crate::schema::SchemaStore;
    use hl7_types::{Cardinality, DataType, FieldDef, SegmentDef, Version};

    fn context() -> SchemaContext {
        let store = SchemaStore::new()
            .with_segment(Version::V2_8, SegmentDef::new("MSH"))
            .with_segment(
                Version::V2_8,
                SegmentDef::new("NTE")
                    .field(FieldDef::new("Set ID", DataType::Si, Cardinality::optional(), 4)),
            )
            .with_segment(Version::V2_8, SegmentDef::new("ORC"))
            .with_segment(Version::V2_8, SegmentDef::new("OBR"))
            .with_group(
                Version::V2_8,
                GroupDef::new("ORM_ORDER")
                    .child(GroupChild::new("ORC", Cardinality::required()))
                    .child(GroupChild::new("OBR", Cardinality::optional()))
                    .child(GroupChild::new("NTE", Cardinality::unbounded())),
            );
        SchemaContext::new(Arc::new(store), Version::V2_8, EncodingCharacters::default())
    }

    fn message_def() -> Arc<GroupDef> {
        Arc::new(
            GroupDef::new("ORM")
                .child(GroupChild::new("MSH", Cardinality::required()))
                .child(GroupChild::aliased("ORDER", "ORM_ORDER", Cardinality::one_or_more()))
                .child(GroupChild::new("NTE", Cardinality::unbounded())),
        )
    }

    #[test]
    fn test_skeleton_holds_required_single_children() {
        let group = Group::skeleton(message_def(), context()).unwrap();
        assert_eq!(group.repetitions_of(0), 1);
        // ORDER is required but repeating
        assert_eq!(group.repetitions_of(1), 0);
        assert_eq!(group.repetitions_of(2), 0);
        assert_eq!(group.child_names(), vec!["MSH", "ORDER", "NTE"]);
    }

    #[test]
    fn test_get_creates_single_child() {
        let mut group = Group::new(message_def(), context());
        assert_eq!(group.repetitions("MSH").unwrap(), 0);
        let msh = group.get("MSH").unwrap();
        assert_eq!(msh.name(), "MSH");
        assert_eq!(group.repetitions("MSH").unwrap(), 1);
        // second get returns the same instance
        group.get("MSH").unwrap();
        assert_eq!(group.repetitions("MSH").unwrap(), 1);
    }

    #[test]
    fn test_get_on_repeating_child_fails() {
        let mut group = Group::new(message_def(), context());
        assert!(matches!(
            group.get("ORDER"),
            Err(Hl7Error::NotRepeatable { repeating: true, .. })
        ));
    }

    #[test]
    fn test_unknown_child() {
        let mut group = Group::new(message_def(), context());
        assert!(matches!(
            group.get("PID"),
            Err(Hl7Error::NoSuchChild { .. })
        ));
        assert!(group.is_required("PID").is_err());
    }

    #[test]
    fn test_repetition_monotonicity() {
        let mut group = Group::new(message_def(), context());
        for n in 1..=3 {
            let nte = group.add("NTE").unwrap().segment_mut().unwrap();
            nte.get(1).unwrap().set_text(&n.to_string());
        }
        let all = group.get_all("NTE").unwrap();
        assert_eq!(all.len(), 3);
        let last = group.get_rep("NTE", 2).unwrap().segment_mut().unwrap();
        assert_eq!(last.get(1).unwrap().text(), "3");
    }

    #[test]
    fn test_out_of_range_rejection() {
        let mut group = Group::new(message_def(), context());
        assert!(matches!(
            group.get_rep("NTE", 1),
            Err(Hl7Error::RepetitionOutOfRange { rep: 1, count: 0, .. })
        ));
        assert_eq!(group.repetitions("NTE").unwrap(), 0);

        group.get_rep("NTE", 0).unwrap();
        assert_eq!(group.repetitions("NTE").unwrap(), 1);
        group.get_rep("NTE", 1).unwrap();
        assert_eq!(group.repetitions("NTE").unwrap(), 2);
    }

    #[test]
    fn test_new_group_repetition_is_skeleton() {
        let mut group = Group::new(message_def(), context());
        let order = group.add("ORDER").unwrap();
        let order = order.group_mut().unwrap();
        assert_eq!(order.name(), "ORM_ORDER");
        assert_eq!(order.repetitions("ORC").unwrap(), 1);
        assert_eq!(order.repetitions("OBR").unwrap(), 0);
    }

    #[test]
    fn test_add_non_repeating_fails() {
        let mut group = Group::new(message_def(), context());
        assert!(matches!(
            group.add("MSH"),
            Err(Hl7Error::NotRepeatable { repeating: false, .. })
        ));
        group.get("MSH").unwrap();
        assert!(matches!(
            group.get_rep("MSH", 1),
            Err(Hl7Error::NotRepeatable { .. })
        ));
    }

    #[test]
    fn test_remove_shifts_left() {
        let mut group = Group::new(message_def(), context());
        for n in 1..=3 {
            let nte = group.add("NTE").unwrap().segment_mut().unwrap();
            nte.get(1).unwrap().set_text(&n.to_string());
        }
        group.remove("NTE", 0).unwrap();
        let first = group.get_rep("NTE", 0).unwrap().segment_mut().unwrap();
        assert_eq!(first.get(1).unwrap().text(), "2");
        assert!(matches!(
            group.remove("NTE", 2),
            Err(Hl7Error::RepetitionOutOfRange { rep: 2, count: 2, .. })
        ));
    }

    #[test]
    fn test_find_segment_depth_first() {
        let mut group = Group::new(message_def(), context());
        group
            .add("ORDER")
            .unwrap()
            .group_mut()
            .unwrap()
            .get("OBR")
            .unwrap();
        assert!(group.find_segment("OBR").is_some());
        assert!(group.find_segment("PID").is_none());
        assert!(group.find_segment_mut("ORC").is_some());
    }

    #[test]
    fn test_required_and_repeating_flags() {
        let group = Group::new(message_def(), context());
        assert!(group.is_required("MSH").unwrap());
        assert!(!group.is_repeating("MSH").unwrap());
        assert!(group.is_repeating("ORDER").unwrap());
        assert!(!group.is_required("NTE").unwrap());
    }
}
