//! Location paths: addressing a value from the message root in one string.
//!
//! ```text
//! /DONATION_ORDER(1)/ORC-2(0)-1-2
//! └─ group(rep) ...  └─ SEGMENT(rep)-FIELD(rep)-COMPONENT-SUBCOMPONENT
//! ```
//!
//! Repetitions are 0-based and default to 0; field, component and
//! sub-component numbers are 1-based. A path without groups names a
//! segment anywhere in the message: a direct child of the root first,
//! then the first one found depth-first.

use std::fmt;
use std::sync::Arc;

use hl7_types::{GroupDef, StructureKind};

use crate::group::Group;
use crate::schema::{Definition, SchemaContext};
use crate::segment::Segment;
use crate::structure::{Navigate, Structure};
use crate::types::{Hl7Error, Hl7Result};

const MAX_DEPTH: usize = 32;

/// A parsed location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Groups to descend through, with the repetition of each.
    pub groups: Vec<(String, usize)>,
    /// Segment name.
    pub segment: String,
    /// Segment repetition.
    pub segment_rep: usize,
    /// 1-based field number.
    pub field: usize,
    /// Field repetition.
    pub field_rep: usize,
    /// 1-based component number; `None` addresses the whole repetition.
    pub component: Option<usize>,
    /// 1-based sub-component number.
    pub sub_component: Option<usize>,
}

impl Location {
    /// Parses a path such as `PID-3(1)-1` or `/ORDER(2)/OBR-4-1-2`.
    pub fn parse(text: &str) -> Hl7Result<Self> {
        let invalid = |reason: &str| Hl7Error::InvalidPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim().trim_start_matches(['/', '.']);
        let mut steps: Vec<&str> = trimmed.split('/').collect();
        let last = steps
            .pop()
            .filter(|step| !step.is_empty())
            .ok_or_else(|| invalid("missing segment"))?;

        let mut groups = Vec::with_capacity(steps.len());
        for step in steps {
            let (name, rep) = split_rep(step).ok_or_else(|| invalid("bad group step"))?;
            if name.is_empty() {
                return Err(invalid("empty group name"));
            }
            groups.push((name.to_string(), rep));
        }

        let mut parts = last.split('-');
        let (segment, segment_rep) = parts
            .next()
            .and_then(split_rep)
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| invalid("bad segment"))?;

        let (field, field_rep) = parts
            .next()
            .and_then(split_rep)
            .and_then(|(number, rep)| positive(number).map(|n| (n, rep)))
            .ok_or_else(|| invalid("missing or bad field number"))?;

        let component = match parts.next() {
            Some(part) => Some(positive(part).ok_or_else(|| invalid("bad component number"))?),
            None => None,
        };
        let sub_component = match parts.next() {
            Some(part) => Some(positive(part).ok_or_else(|| invalid("bad sub-component number"))?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid("too many parts"));
        }

        Ok(Self {
            groups,
            segment: segment.to_string(),
            segment_rep,
            field,
            field_rep,
            component,
            sub_component,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, rep) in &self.groups {
            write!(f, "/{name}({rep})")?;
        }
        if !self.groups.is_empty() {
            f.write_str("/")?;
        }
        write!(
            f,
            "{}({})-{}({})",
            self.segment, self.segment_rep, self.field, self.field_rep
        )?;
        if let Some(component) = self.component {
            write!(f, "-{component}")?;
        }
        if let Some(sub) = self.sub_component {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

fn split_rep(step: &str) -> Option<(&str, usize)> {
    match step.split_once('(') {
        Some((name, rest)) => {
            let rep = rest.strip_suffix(')')?.trim().parse().ok()?;
            Some((name.trim(), rep))
        }
        None => Some((step.trim(), 0)),
    }
}

fn positive(text: &str) -> Option<usize> {
    text.trim().parse().ok().filter(|n: &usize| *n > 0)
}

/// Finds a child by name, falling back to its structure name or a `_NAME` suffix.
fn resolve_child<'a>(def: &'a GroupDef, name: &str) -> Option<&'a str> {
    let suffix = format!("_{name}");
    def.children
        .iter()
        .find(|child| child.name == name)
        .or_else(|| def.children.iter().find(|child| child.structure == name))
        .or_else(|| {
            def.children
                .iter()
                .find(|child| child.name.ends_with(&suffix) || child.structure.ends_with(&suffix))
        })
        .map(|child| child.name.as_str())
}

/// Route through existing group instances to a group holding `segment`.
fn existing_route(group: &Group, segment: &str, depth: usize) -> Option<Vec<(String, usize)>> {
    if depth > MAX_DEPTH {
        return None;
    }
    for (index, child) in group.def().children.iter().enumerate() {
        let instances = group.instances(index);
        match instances.first() {
            Some(Structure::Segment(_)) if child.name == segment || child.structure == segment => {
                return Some(Vec::new());
            }
            Some(Structure::Group(_)) => {
                for (rep, node) in instances.iter().enumerate() {
                    if let Some(inner) = node.as_group() {
                        if let Some(mut route) = existing_route(inner, segment, depth + 1) {
                            route.insert(0, (child.name.clone(), rep));
                            return Some(route);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Route through the schema (first repetitions) to a group holding `segment`.
fn schema_route(group: &Group, def: &GroupDef, segment: &str, depth: usize) -> Hl7Result<Option<Vec<(String, usize)>>> {
    if depth > MAX_DEPTH {
        return Err(Hl7Error::InternalInvariant(format!(
            "group nesting deeper than {MAX_DEPTH} below {}",
            def.name
        )));
    }
    for child in &def.children {
        match group.context().lookup(&child.structure)? {
            Definition::Segment(_) => {
                if child.name == segment || child.structure == segment {
                    return Ok(Some(Vec::new()));
                }
            }
            Definition::Group(inner) => {
                if let Some(mut route) = schema_route(group, &inner, segment, depth + 1)? {
                    route.insert(0, (child.name.clone(), 0));
                    return Ok(Some(route));
                }
            }
        }
    }
    Ok(None)
}

fn find_segment<'g>(root: &'g Group, location: &Location) -> Hl7Result<Option<&'g Segment>> {
    let mut group = root;
    for (name, rep) in &location.groups {
        let Some(child) = resolve_child(group.def(), name) else {
            return Err(no_such_child(name, group.name()));
        };
        match group.child(child, *rep) {
            Some(node) => {
                group = node.as_group().ok_or_else(|| Hl7Error::InvalidPath {
                    path: location.to_string(),
                    reason: format!("{name} is a segment"),
                })?;
            }
            None => return Ok(None),
        }
    }

    if let Some(child) = resolve_child(group.def(), &location.segment) {
        return Ok(group
            .child(child, location.segment_rep)
            .and_then(Structure::as_segment));
    }
    if !location.groups.is_empty() {
        return Err(no_such_child(&location.segment, group.name()));
    }

    let Some(route) = existing_route(group, &location.segment, 0) else {
        return Ok(None);
    };
    for (name, rep) in &route {
        match group.child(name, *rep).and_then(Structure::as_group) {
            Some(inner) => group = inner,
            None => return Ok(None),
        }
    }
    let child = resolve_child(group.def(), &location.segment).unwrap_or(&location.segment);
    Ok(group
        .child(child, location.segment_rep)
        .and_then(Structure::as_segment))
}

/// Reads the text at `location` without creating anything.
pub(crate) fn read(root: &Group, location: &Location) -> Hl7Result<Option<String>> {
    let Some(segment) = find_segment(root, location)? else {
        return Ok(None);
    };
    let Some(value) = segment.value(location.field, location.field_rep) else {
        return Ok(Some(String::new()));
    };
    let text = match (location.component, location.sub_component) {
        (None, _) => value.text().into_owned(),
        (Some(component), None) => value.component(component),
        (Some(component), Some(sub)) => value.sub_component(component, sub),
    };
    Ok(Some(text))
}

/// Writes `text` at `location`, creating groups, segments and repetitions as needed.
///
/// The write is made on a copy of the top-level child it lands in, which
/// replaces the original only once every step has succeeded.
pub(crate) fn write(root: &mut Group, location: &Location, text: &str) -> Hl7Result<()> {
    let steps = plan_write(root, location)?;
    let Some(((first, rep), rest)) = steps.split_first() else {
        return Err(Hl7Error::InternalInvariant(format!("empty route for {location}")));
    };

    let mut staged = root.staged(first, *rep)?;
    write_below(&mut staged, rest, location, text)?;
    root.commit(first, *rep, staged)
}

/// Resolves every `(child, rep)` step from the root down to the segment,
/// without touching the tree.
fn plan_write(root: &Group, location: &Location) -> Hl7Result<Vec<(String, usize)>> {
    let context = root.context();
    let mut steps = Vec::new();
    let mut def = root.def().clone();
    for (name, rep) in &location.groups {
        let (child, inner) = child_group(context, &def, name)?;
        steps.push((child, *rep));
        def = inner;
    }

    if let Some(child) = resolve_child(&def, &location.segment) {
        steps.push((child.to_string(), location.segment_rep));
        return Ok(steps);
    }
    if !location.groups.is_empty() {
        return Err(no_such_child(&location.segment, &def.name));
    }

    let route = match existing_route(root, &location.segment, 0) {
        Some(route) => route,
        None => schema_route(root, root.def(), &location.segment, 0)?
            .ok_or_else(|| no_such_child(&location.segment, root.name()))?,
    };
    for (name, rep) in route {
        def = child_group(context, &def, &name)?.1;
        steps.push((name, rep));
    }
    let child = resolve_child(&def, &location.segment)
        .ok_or_else(|| no_such_child(&location.segment, &def.name))?;
    steps.push((child.to_string(), location.segment_rep));
    Ok(steps)
}

/// Resolves a group child of `def` to its name and definition.
fn child_group(context: &SchemaContext, def: &GroupDef, name: &str) -> Hl7Result<(String, Arc<GroupDef>)> {
    let child = resolve_child(def, name).ok_or_else(|| no_such_child(name, &def.name))?;
    let structure = def
        .child_named(child)
        .map(|entry| entry.structure.as_str())
        .unwrap_or(child);
    match context.lookup(structure)? {
        Definition::Group(inner) => Ok((child.to_string(), inner)),
        Definition::Segment(_) => Err(Hl7Error::SchemaKindMismatch {
            name: child.to_string(),
            expected: StructureKind::Group,
        }),
    }
}

fn write_below(node: &mut Structure, steps: &[(String, usize)], location: &Location, text: &str) -> Hl7Result<()> {
    let mut node = node;
    for (name, rep) in steps {
        node = node.group_mut()?.get_rep(name, *rep)?;
    }

    let segment = node.segment_mut()?;
    if segment.is_header() && location.field <= 2 {
        return Err(Hl7Error::InvalidPath {
            path: location.to_string(),
            reason: "delimiter fields are fixed by the message encoding".to_string(),
        });
    }

    let value = segment.get_rep(location.field, location.field_rep)?;
    match (location.component, location.sub_component) {
        (None, _) => value.set_text(text),
        (Some(component), None) => value.set_component(component, text)?,
        (Some(component), Some(sub)) => value.set_sub_component(component, sub, text)?,
    }
    Ok(())
}

fn no_such_child(name: &str, parent: &str) -> Hl7Error {
    Hl7Error::NoSuchChild {
        name: name.to_string(),
        parent: parent.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let location = Location::parse("/DONATION_ORDER(1)/ORC-2(0)-1-2").unwrap();
        assert_eq!(location.groups, vec![("DONATION_ORDER".to_string(), 1)]);
        assert_eq!(location.segment, "ORC");
        assert_eq!(location.segment_rep, 0);
        assert_eq!(location.field, 2);
        assert_eq!(location.field_rep, 0);
        assert_eq!(location.component, Some(1));
        assert_eq!(location.sub_component, Some(2));
    }

    #[test]
    fn test_parse_short_path() {
        let location = Location::parse("PID-3(1)").unwrap();
        assert!(location.groups.is_empty());
        assert_eq!(location.segment, "PID");
        assert_eq!(location.field, 3);
        assert_eq!(location.field_rep, 1);
        assert_eq!(location.component, None);

        let relative = Location::parse("./NTE(2)-3-1").unwrap();
        assert_eq!(relative.segment_rep, 2);
        assert_eq!(relative.component, Some(1));
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        for bad in ["", "/", "PID", "PID-0", "PID-x", "PID-3-0", "PID-3(-1)", "PID-1-2-3-4", "PID(1-1", "A//PID-1"] {
            assert!(
                matches!(Location::parse(bad), Err(Hl7Error::InvalidPath { .. })),
                "path {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        let location = Location::parse("/ORDER/OBR-4-1").unwrap();
        assert_eq!(location.to_string(), "/ORDER(0)/OBR(0)-4(0)-1");
    }
}
