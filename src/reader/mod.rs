mod base;
mod document;

pub(crate) use base::BaseReader;
pub use document::Document;
