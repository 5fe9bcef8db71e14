use super::types::*;

/// Encodes information about the file header.
#[derive(Debug)]
pub struct Header {
    /// The byte offset of the `%PDF` marker from start of file data. All cross-reference
    /// offsets, including those of an appended revision, are relative to this point.
    pub start: Offset,
    /// Version (major, minor).
    pub version: (u8, u8),
}
