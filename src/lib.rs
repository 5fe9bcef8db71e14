//! Crop PDF pages by appending an incremental update instead of rewriting the file.
//!
//! The pipeline per document: [`reader::Document`] parses the trailer and cross-reference
//! chain, [`pages::enumerate_pages`] walks the page tree with attribute inheritance, an
//! external [`bbox::BoundsProvider`] supplies a content bounding box per page,
//! [`crop::plan_crop`] turns it into the `/CropBox` to store, and [`writer::Update`]
//! appends the replacement page objects together with a new cross-reference section and
//! trailer. Everything before the append point stays byte-for-byte intact, so bookmarks,
//! annotations, metadata and forms survive untouched.

pub mod base;
pub mod bbox;
pub mod codecs;
pub mod crop;
pub mod pages;
pub mod parser;
pub mod reader;
pub mod writer;

mod utils;

#[cfg(test)]
mod testpdf;

pub use base::*;
