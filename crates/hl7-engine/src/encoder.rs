//! Message encoder: message tree to wire text.

use crate::group::Group;
use crate::message::Message;
use crate::structure::Structure;
use crate::types::EncodeOptions;

/// Writes messages in schema order, depth first.
///
/// Unrecognized segments kept by a lenient parse are written back at the
/// position they were found, so a lenient parse followed by an encode
/// reproduces the input segment order.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncodeOptions,
}

impl Encoder {
    /// Creates an encoder with `\r` terminators and trailing-field trimming.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with explicit options.
    pub fn with_options(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Returns the encode options.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encodes a whole message.
    pub fn encode(&self, message: &Message) -> String {
        let mut out = String::with_capacity(256);
        self.encode_group(message.root(), &mut out);
        out
    }

    /// Encodes one group and everything below it.
    pub fn encode_group(&self, group: &Group, out: &mut String) {
        let mut pending = group.unrecognized().iter().peekable();
        for index in 0..group.def().children.len() {
            for (rep, node) in group.instances(index).iter().enumerate() {
                while let Some(entry) = pending.next_if(|entry| entry.is_before(index, rep)) {
                    entry.segment.encode_into(out, &self.options);
                    out.push_str(&self.options.segment_terminator);
                }
                match node {
                    Structure::Segment(segment) => {
                        segment.encode_into(out, &self.options);
                        out.push_str(&self.options.segment_terminator);
                    }
                    Structure::Group(inner) => self.encode_group(inner, out),
                }
            }
        }
        for entry in pending {
            entry.segment.encode_into(out, &self.options);
            out.push_str(&self.options.segment_terminator);
        }
    }
}
