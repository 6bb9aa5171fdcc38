//! Vorbis-comment metadata block parsing
//!
//! Both codecs carry user metadata in the same length-prefixed
//! sub-format: a vendor string followed by `KEY=value` entries, all
//! with little-endian 32-bit length prefixes. Vorbis terminates the
//! block with a framing bit; Opus comment headers omit it.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

/// Parsed comment header: vendor string plus tag map
#[derive(Debug, Clone, Default)]
pub struct CommentHeader {
    /// Encoder vendor string
    pub vendor: String,
    /// Tag map; keys are upper-cased (comment keys are case-insensitive)
    pub tags: HashMap<String, String>,
}

/// Parse a comment block.
///
/// `data` starts at the vendor length field (any codec-specific
/// prefix already skipped). `require_framing` enforces the trailing
/// framing bit that Vorbis comment headers carry.
pub fn parse_comments(data: &[u8], require_framing: bool) -> Result<CommentHeader> {
    let mut cursor = 0usize;

    let vendor = read_prefixed(data, &mut cursor)?;
    let vendor = String::from_utf8_lossy(vendor).into_owned();

    if data.len() < cursor + 4 {
        return Err(Error::malformed("comment header truncated"));
    }
    let count = LittleEndian::read_u32(&data[cursor..cursor + 4]) as usize;
    cursor += 4;

    let mut tags = HashMap::new();
    for _ in 0..count {
        let entry = read_prefixed(data, &mut cursor)?;
        let entry = String::from_utf8_lossy(entry);
        // Entries without '=' are tolerated but carry no tag
        if let Some((key, value)) = entry.split_once('=') {
            tags.insert(key.to_ascii_uppercase(), value.to_string());
        }
    }

    if require_framing {
        if cursor >= data.len() || data[cursor] & 1 == 0 {
            return Err(Error::malformed("comment header framing bit missing"));
        }
    }

    Ok(CommentHeader { vendor, tags })
}

fn read_prefixed<'a>(data: &'a [u8], cursor: &mut usize) -> Result<&'a [u8]> {
    if data.len() < *cursor + 4 {
        return Err(Error::malformed("comment header truncated"));
    }
    let len = LittleEndian::read_u32(&data[*cursor..*cursor + 4]) as usize;
    *cursor += 4;
    if data.len() < *cursor + len {
        return Err(Error::malformed("comment entry overruns header"));
    }
    let slice = &data[*cursor..*cursor + len];
    *cursor += len;
    Ok(slice)
}
