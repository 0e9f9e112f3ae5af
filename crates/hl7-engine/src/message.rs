//! The message root.

use std::fmt;
use std::sync::Arc;

use hl7_types::Version;

use crate::encoder::Encoder;
use crate::encoding::{is_header_segment, EncodingCharacters};
use crate::group::{Group, Unrecognized};
use crate::location::{self, Location};
use crate::schema::{SchemaContext, SchemaProvider};
use crate::segment::Segment;
use crate::structure::{Navigate, Structure};
use crate::types::{EncodeOptions, Hl7Result};

/// A parsed or constructed message: the root group plus its delimiters and version.
///
/// # Examples
///
/// ```ignore
/// use hl7_engine::{parse, Message, Navigate};
///
/// let mut msg = parse(text, provider.clone(), Version::V2_8)?;
/// let pid = msg.root_mut().get_rep("PID", 0)?.segment_mut()?;
/// assert_eq!(pid.get_rep(3, 0)?.component(1), "123");
///
/// assert_eq!(msg.get("PID-3-1")?, Some("123".to_string()));
/// assert_eq!(msg.encode(), text);
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    root: Group,
}

impl Message {
    /// Creates an empty message of the given structure with the standard
    /// delimiters for `version` (see [`EncodingCharacters::for_version`]).
    ///
    /// The message holds the schema skeleton: one instance of every
    /// required, non-repeating child. When the skeleton has an `MSH`, its
    /// message type (MSH-9) and version (MSH-12) are filled in.
    pub fn new(
        structure: &str,
        version: Version,
        provider: Arc<dyn SchemaProvider>,
    ) -> Hl7Result<Self> {
        Self::with_encoding(structure, version, provider, EncodingCharacters::for_version(version))
    }

    /// Creates an empty message using the given delimiters.
    pub fn with_encoding(
        structure: &str,
        version: Version,
        provider: Arc<dyn SchemaProvider>,
        encoding: EncodingCharacters,
    ) -> Hl7Result<Self> {
        let def = provider.lookup_group(structure, version)?;
        let context = SchemaContext::new(provider, version, encoding);
        let mut root = Group::skeleton(def, context)?;

        if let Some(msh) = root.find_segment_mut("MSH") {
            let message_type = msh.get_rep(9, 0)?;
            let mut parts = structure.splitn(2, '_');
            if let Some(code) = parts.next() {
                message_type.set_component(1, code)?;
            }
            if let Some(trigger) = parts.next() {
                message_type.set_component(2, trigger)?;
                message_type.set_component(3, structure)?;
            }
            msh.get_rep(12, 0)?.set_component(1, version.as_str())?;
        }

        tracing::debug!(structure, %version, "created message skeleton");
        Ok(Self { root })
    }

    pub(crate) fn from_root(root: Group) -> Self {
        Self { root }
    }

    /// Returns the root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Returns the root group mutably.
    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    /// Returns the message structure name (e.g. `DRC_O47`).
    pub fn structure(&self) -> &str {
        self.root.name()
    }

    /// Returns the schema version.
    pub fn version(&self) -> Version {
        self.root.context().version()
    }

    /// Returns the delimiters in effect.
    pub fn encoding(&self) -> EncodingCharacters {
        self.root.context().encoding()
    }

    /// Returns the header segment (`MSH`, `BHS` or `FHS`), if present.
    pub fn header(&self) -> Option<&Segment> {
        self.root
            .instances(0)
            .first()
            .and_then(Structure::as_segment)
            .filter(|segment| is_header_segment(segment.name()))
    }

    /// Returns every segment kept without a schema position, in tree order.
    pub fn unrecognized_segments(&self) -> Vec<&Unrecognized> {
        let mut out = Vec::new();
        collect_unrecognized(&self.root, &mut out);
        out
    }

    /// Encodes the message with the default options.
    pub fn encode(&self) -> String {
        Encoder::new().encode(self)
    }

    /// Encodes the message with the given options.
    pub fn encode_with(&self, options: EncodeOptions) -> String {
        Encoder::with_options(options).encode(self)
    }

    /// Reads the text at a location path such as `PID-3(1)-1`.
    ///
    /// Returns `Ok(None)` when a structure along the path does not exist;
    /// nothing is created.
    pub fn get(&self, location: &str) -> Hl7Result<Option<String>> {
        let parsed = Location::parse(location)?;
        location::read(&self.root, &parsed)
    }

    /// Writes text at a location path, creating structures along the way.
    ///
    /// On error the message is left exactly as it was.
    pub fn set(&mut self, location: &str, value: &str) -> Hl7Result<()> {
        let parsed = Location::parse(location)?;
        location::write(&mut self.root, &parsed, value)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn collect_unrecognized<'a>(group: &'a Group, out: &mut Vec<&'a Unrecognized>) {
    let mut pending = group.unrecognized().iter().peekable();
    for index in 0..group.def().children.len() {
        for (rep, node) in group.instances(index).iter().enumerate() {
            while let Some(entry) = pending.next_if(|entry| entry.is_before(index, rep)) {
                out.push(entry);
            }
            if let Structure::Group(child) = node {
                collect_unrecognized(child, out);
            }
        }
    }
    out.extend(pending);
}
