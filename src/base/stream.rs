use super::dict::Dict;
use super::types::*;

/// A PDF stream object.
///
/// Stream data is never copied into memory at parse time; only the offset of the first data
/// byte is recorded. Use the reader's stream facilities to get at the decoded contents.
#[derive(Debug, PartialEq, Clone)]
pub struct Stream {
    /// The stream dictionary.
    pub dict: Dict,
    /// Offset of the data in the file (relative to `%PDF`).
    pub offset: Offset
}
