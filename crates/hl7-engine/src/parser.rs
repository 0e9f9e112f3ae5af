//! Message parser.
//!
//! Turns wire text into a [`Message`] by matching each segment line to a
//! schema position. Matching only looks at segment names:
//!
//! 1. The parser keeps a stack of the groups currently open, innermost last,
//!    each with the schema position it last filled.
//! 2. A segment is offered to each open group from the innermost outwards,
//!    at that group's current position (if the child there repeats) and the
//!    positions after it.
//! 3. A child accepts the segment if the segment name is in the child's
//!    first-segment set: its own name for a segment, or for a group the
//!    names that can start it (its children up to and including the first
//!    required one).
//! 4. Accepting at an outer group closes every group inside it. Accepting
//!    a group child opens a new instance of it and repeats the match inside.
//!
//! A segment that fits nowhere is either an error or, in lenient mode, kept
//! as an unrecognized segment of the innermost open group.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use hl7_types::{GroupDef, SegmentDef, Version};

use crate::encoding::EncodingCharacters;
use crate::group::{Group, Unrecognized};
use crate::message::Message;
use crate::schema::{Definition, SchemaContext, SchemaProvider};
use crate::segment::{segment_name, Segment};
use crate::structure::Structure;
use crate::types::{Hl7Error, Hl7Result, ParseOptions, ParseStats, UnexpectedSegmentPolicy};

const MAX_DEPTH: usize = 32;

/// Parses `text` against the schema for `version`.
///
/// The message structure is taken from MSH-9.
pub fn parse(text: &str, provider: Arc<dyn SchemaProvider>, version: Version) -> Hl7Result<Message> {
    Parser::with_options(provider, ParseOptions::default().with_version(version)).parse(text)
}

/// Parses `text`, taking the version from MSH-12 and the structure from MSH-9.
pub fn parse_auto(text: &str, provider: Arc<dyn SchemaProvider>) -> Hl7Result<Message> {
    Parser::new(provider).parse(text)
}

/// Parses many messages, in parallel when the `parallel` feature is enabled.
pub fn parse_batch<S>(
    texts: &[S],
    provider: Arc<dyn SchemaProvider>,
    options: ParseOptions,
) -> Vec<Hl7Result<Message>>
where
    S: AsRef<str> + Sync,
{
    Parser::with_options(provider, options).parse_batch(texts)
}

/// A reusable parser bound to one schema provider and option set.
#[derive(Clone)]
pub struct Parser {
    provider: Arc<dyn SchemaProvider>,
    options: ParseOptions,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Creates a strict parser.
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self::with_options(provider, ParseOptions::default())
    }

    /// Creates a parser with explicit options.
    pub fn with_options(provider: Arc<dyn SchemaProvider>, options: ParseOptions) -> Self {
        Self { provider, options }
    }

    /// Returns the parse options.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses one message.
    pub fn parse(&self, text: &str) -> Hl7Result<Message> {
        self.parse_with_stats(text).map(|(message, _)| message)
    }

    /// Parses one message and reports how its segments were placed.
    pub fn parse_with_stats(&self, text: &str) -> Hl7Result<(Message, ParseStats)> {
        let start = Instant::now();
        let lines = split_lines(text);

        let &(first_line, header) = lines.first().ok_or_else(|| Hl7Error::MalformedHeader {
            line: 1,
            reason: "message is empty".to_string(),
        })?;

        let encoding = EncodingCharacters::parse_delimiters(header).map_err(|err| match err {
            Hl7Error::MalformedHeader { reason, .. } => Hl7Error::MalformedHeader {
                line: first_line,
                reason,
            },
            other => other,
        })?;

        let version = self.resolve_version(first_line, header, &encoding)?;
        let def = self.resolve_structure(first_line, header, &encoding, version)?;
        let context = SchemaContext::new(self.provider.clone(), version, encoding);

        let mut state = ParseState::new(def, context);
        for &(line_no, line) in &lines {
            state.accept(line_no, line, &self.options)?;
        }

        let last_line = lines.last().map_or(first_line, |&(line_no, _)| line_no);
        let ParseState {
            root, mut stats, ..
        } = state;

        if self.options.enforce_required {
            check_required(&root, last_line)?;
        }

        stats.parse_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            structure = %root.name(),
            %version,
            segments = stats.total_segments,
            unrecognized = stats.unrecognized_segments,
            "parsed message"
        );

        Ok((Message::from_root(root), stats))
    }

    /// Parses many messages, in parallel when the `parallel` feature is enabled.
    ///
    /// Results are returned in input order; one failure does not affect the others.
    pub fn parse_batch<S>(&self, texts: &[S]) -> Vec<Hl7Result<Message>>
    where
        S: AsRef<str> + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            texts.par_iter().map(|text| self.parse(text.as_ref())).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            texts.iter().map(|text| self.parse(text.as_ref())).collect()
        }
    }

    fn resolve_version(
        &self,
        line_no: usize,
        header: &str,
        encoding: &EncodingCharacters,
    ) -> Hl7Result<Version> {
        if let Some(version) = self.options.version {
            return Ok(version);
        }
        if segment_name(header, encoding) != "MSH" {
            return Err(Hl7Error::MalformedHeader {
                line: line_no,
                reason: "no MSH header to read the version from".to_string(),
            });
        }

        let code = header_component(header, encoding, 12, 1);
        Version::from_code(code).ok_or_else(|| Hl7Error::UnknownVersion {
            value: code.to_string(),
        })
    }

    fn resolve_structure(
        &self,
        line_no: usize,
        header: &str,
        encoding: &EncodingCharacters,
        version: Version,
    ) -> Hl7Result<Arc<GroupDef>> {
        if let Some(structure) = &self.options.structure {
            return self.provider.lookup_group(structure, version);
        }
        if segment_name(header, encoding) != "MSH" {
            return Err(Hl7Error::MalformedHeader {
                line: line_no,
                reason: "no MSH header to read the message type from".to_string(),
            });
        }

        let code = header_component(header, encoding, 9, 1);
        let trigger = header_component(header, encoding, 9, 2);
        let structure = header_component(header, encoding, 9, 3);
        if code.is_empty() {
            return Err(Hl7Error::MalformedHeader {
                line: line_no,
                reason: "message type (MSH-9) is empty".to_string(),
            });
        }

        let mut candidates = Vec::with_capacity(3);
        if !structure.is_empty() {
            candidates.push(structure.to_string());
        }
        if !trigger.is_empty() {
            candidates.push(format!("{code}_{trigger}"));
        }
        candidates.push(code.to_string());

        for candidate in &candidates {
            if let Some(Definition::Group(def)) = self.provider.lookup_structure(candidate, version) {
                return Ok(def);
            }
        }
        Err(Hl7Error::UnknownStructure {
            name: candidates.swap_remove(0),
            version,
        })
    }
}

/// Splits on carriage returns, or line feeds when there are none.
///
/// Returns `(line number, text)` pairs for the non-blank lines.
fn split_lines(text: &str) -> Vec<(usize, &str)> {
    let terminator = if text.contains('\r') { '\r' } else { '\n' };
    text.split(terminator)
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim_matches('\n')))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect()
}

/// Reads component `component` of header field `field` straight from the line.
fn header_component<'a>(
    header: &'a str,
    encoding: &EncodingCharacters,
    field: usize,
    component: usize,
) -> &'a str {
    // The split yields the name, then MSH-2, MSH-3, ...
    header
        .split(encoding.field)
        .nth(field - 1)
        .and_then(|value| value.split(encoding.repetition).next())
        .and_then(|value| value.split(encoding.component).nth(component - 1))
        .unwrap_or("")
        .trim()
}

/// One open group instance during matching.
struct Frame {
    def: Arc<GroupDef>,
    /// Last schema position filled in this instance.
    pos: Option<usize>,
    /// Instances created so far at each position.
    counts: Vec<usize>,
    /// `(position, repetition)` of this instance in its parent.
    entry: (usize, usize),
}

impl Frame {
    fn new(def: Arc<GroupDef>, entry: (usize, usize)) -> Self {
        let counts = vec![0; def.children.len()];
        Self {
            def,
            pos: None,
            counts,
            entry,
        }
    }
}

/// Caches the set of segment names that can start each structure.
struct FirstSets {
    context: SchemaContext,
    cache: HashMap<String, Arc<HashSet<String>>>,
}

impl FirstSets {
    fn get(&mut self, structure: &str) -> Hl7Result<Arc<HashSet<String>>> {
        self.compute(structure, 0)
    }

    fn compute(&mut self, structure: &str, depth: usize) -> Hl7Result<Arc<HashSet<String>>> {
        if let Some(set) = self.cache.get(structure) {
            return Ok(set.clone());
        }
        if depth > MAX_DEPTH {
            return Err(Hl7Error::InternalInvariant(format!(
                "structure {structure} nests deeper than {MAX_DEPTH} levels"
            )));
        }

        let mut set = HashSet::new();
        match self.context.lookup(structure)? {
            Definition::Segment(def) => {
                set.insert(def.name.clone());
            }
            Definition::Group(def) => {
                for child in &def.children {
                    set.extend(self.compute(&child.structure, depth + 1)?.iter().cloned());
                    if child.is_required() {
                        break;
                    }
                }
            }
        }

        let set = Arc::new(set);
        self.cache.insert(structure.to_string(), set.clone());
        Ok(set)
    }
}

struct ParseState {
    root: Group,
    stack: Vec<Frame>,
    first_sets: FirstSets,
    stats: ParseStats,
}

impl ParseState {
    fn new(def: Arc<GroupDef>, context: SchemaContext) -> Self {
        let root = Group::new(def.clone(), context.clone());
        Self {
            root,
            stack: vec![Frame::new(def, (0, 0))],
            first_sets: FirstSets {
                context,
                cache: HashMap::new(),
            },
            stats: ParseStats::default(),
        }
    }

    fn context(&self) -> &SchemaContext {
        &self.first_sets.context
    }

    fn accept(&mut self, line_no: usize, line: &str, options: &ParseOptions) -> Hl7Result<()> {
        self.stats.total_segments += 1;
        let encoding = self.context().encoding();
        let name = segment_name(line, &encoding);

        if let Some((level, index)) = self.find_position(name)? {
            self.descend(level, index, name, line)?;
            self.stats.placed_segments += 1;
            return Ok(());
        }

        if self.overflow(name, line)? {
            self.stats.placed_segments += 1;
            self.stats.overflow_segments += 1;
            return Ok(());
        }

        match options.unexpected_segments {
            UnexpectedSegmentPolicy::Reject => Err(Hl7Error::UnexpectedSegment {
                line: line_no,
                name: name.to_string(),
                structure: self.root.name().to_string(),
            }),
            UnexpectedSegmentPolicy::Retain => {
                let top = self.top()?;
                let (position, preceding) = match top.pos {
                    Some(pos) => (pos, top.counts[pos]),
                    None => (0, 0),
                };
                let parent = top.def.name.clone();
                let segment = Segment::parse(Arc::new(SegmentDef::new(name)), line, encoding);

                group_at_mut(&mut self.root, &self.stack)?.push_unrecognized(Unrecognized {
                    position,
                    preceding,
                    line: line_no,
                    segment,
                });
                self.stats.unrecognized_segments += 1;
                tracing::warn!(line = line_no, segment = %name, group = %parent, "keeping unrecognized segment");
                Ok(())
            }
        }
    }

    /// Finds the innermost open group and position that accept `name`.
    fn find_position(&mut self, name: &str) -> Hl7Result<Option<(usize, usize)>> {
        for level in (0..self.stack.len()).rev() {
            let frame = &self.stack[level];
            let start = match frame.pos {
                None => 0,
                Some(pos) if frame.def.children[pos].is_repeating() => pos,
                Some(pos) => pos + 1,
            };
            for index in start..frame.def.children.len() {
                let structure = &frame.def.children[index].structure;
                if self.first_sets.get(structure)?.contains(name) {
                    return Ok(Some((level, index)));
                }
            }
        }
        Ok(None)
    }

    /// Closes groups above `level`, then fills `index` there, opening groups down to the segment.
    fn descend(&mut self, level: usize, mut index: usize, name: &str, line: &str) -> Hl7Result<()> {
        self.stack.truncate(level + 1);

        for _ in 0..=MAX_DEPTH {
            let frame = self.top_mut()?;
            frame.pos = Some(index);
            frame.counts[index] += 1;
            let rep = frame.counts[index] - 1;
            let structure = frame.def.children[index].structure.clone();

            match self.context().lookup(&structure)? {
                Definition::Segment(def) => {
                    let segment = Segment::parse(def, line, self.context().encoding());
                    self.insert(index, rep, Structure::Segment(segment))?;
                    return Ok(());
                }
                Definition::Group(def) => {
                    let group = Group::new(def.clone(), self.context().clone());
                    self.insert(index, rep, Structure::Group(group))?;
                    self.stack.push(Frame::new(def.clone(), (index, rep)));

                    let mut next = None;
                    for (position, child) in def.children.iter().enumerate() {
                        if self.first_sets.get(&child.structure)?.contains(name) {
                            next = Some(position);
                            break;
                        }
                    }
                    index = next.ok_or_else(|| {
                        Hl7Error::InternalInvariant(format!(
                            "group {} was entered for {name} but has no child starting with it",
                            def.name
                        ))
                    })?;
                }
            }
        }

        Err(Hl7Error::InternalInvariant(format!(
            "descent for {name} exceeded {MAX_DEPTH} levels"
        )))
    }

    /// Accepts a second instance of the segment just placed even though it does not repeat.
    fn overflow(&mut self, name: &str, line: &str) -> Hl7Result<bool> {
        let frame = self.top()?;
        let Some(pos) = frame.pos else {
            return Ok(false);
        };
        let child = &frame.def.children[pos];
        if child.structure != name {
            return Ok(false);
        }
        let Definition::Segment(def) = self.context().lookup(&child.structure)? else {
            return Ok(false);
        };

        tracing::debug!(segment = %name, group = %frame.def.name, "segment repeats beyond its cardinality");
        let frame = self.top_mut()?;
        frame.counts[pos] += 1;
        let rep = frame.counts[pos] - 1;
        let segment = Segment::parse(def, line, self.context().encoding());
        self.insert(pos, rep, Structure::Segment(segment))?;
        Ok(true)
    }

    fn insert(&mut self, index: usize, rep: usize, node: Structure) -> Hl7Result<()> {
        let group = group_at_mut(&mut self.root, &self.stack)?;
        let instances = group.instances_mut(index).ok_or_else(|| {
            Hl7Error::InternalInvariant(format!("{} has no position {index}", group_name(&self.stack)))
        })?;
        if instances.len() != rep {
            return Err(Hl7Error::InternalInvariant(format!(
                "position {index} of {} holds {} instances, expected {rep}",
                group_name(&self.stack),
                instances.len()
            )));
        }
        instances.push(node);
        Ok(())
    }

    fn top(&self) -> Hl7Result<&Frame> {
        self.stack
            .last()
            .ok_or_else(|| Hl7Error::InternalInvariant("parse stack is empty".to_string()))
    }

    fn top_mut(&mut self) -> Hl7Result<&mut Frame> {
        self.stack
            .last_mut()
            .ok_or_else(|| Hl7Error::InternalInvariant("parse stack is empty".to_string()))
    }
}

fn group_name(stack: &[Frame]) -> &str {
    stack.last().map_or("", |frame| frame.def.name.as_str())
}

/// Follows the stack's entries from the root to the innermost open group instance.
fn group_at_mut<'g>(root: &'g mut Group, stack: &[Frame]) -> Hl7Result<&'g mut Group> {
    let mut group = root;
    for frame in stack.iter().skip(1) {
        let (index, rep) = frame.entry;
        group = group
            .instances_mut(index)
            .and_then(|instances| instances.get_mut(rep))
            .ok_or_else(|| {
                Hl7Error::InternalInvariant(format!("open group {} is missing from the tree", frame.def.name))
            })?
            .group_mut()?;
    }
    Ok(group)
}

fn check_required(group: &Group, line: usize) -> Hl7Result<()> {
    for (index, child) in group.def().children.iter().enumerate() {
        let instances = group.instances(index);
        if child.is_required() && instances.is_empty() {
            return Err(Hl7Error::MissingRequiredStructure {
                line,
                name: child.name.clone(),
                parent: group.name().to_string(),
            });
        }
        for node in instances {
            if let Structure::Group(inner) = node {
                check_required(inner, line)?;
            }
        }
    }
    Ok(())
}
