use thiserror::Error;

use super::object::ObjRef;

/// Failures encountered while reading an existing document.
///
/// Any of these aborts processing of the affected document; no update is ever appended to a
/// file that failed to parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// No `startxref` anchor was found near the end of the file.
    #[error("startxref not found")]
    MissingTrailer,
    /// The trailer's `/Root` entry is absent or does not resolve to a dictionary.
    #[error("document catalog not found")]
    MissingRoot,
    /// A reference pointed at a free or unknown object number, or at an object whose header
    /// does not match the requested id.
    #[error("unresolvable reference: {0} R")]
    DanglingReference(ObjRef),
    /// The page tree references one of its own ancestors.
    #[error("page tree cycle at {0} R")]
    CyclicPageTree(ObjRef),
    #[error("malformed object ({0})")]
    Malformed(&'static str),
}
