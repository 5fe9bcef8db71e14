use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, Seek, Write};
use std::path::Path;

use thiserror::Error;

use crate::base::*;
use crate::base::types::*;
use crate::crop::Rect;
use crate::pages::Page;
use crate::reader::Document;

/// Failures while emitting an appended revision. Both are fatal for the document; the
/// original file keeps its prior length in either case.
#[derive(Debug, Error)]
pub enum WriterError {
    /// An object number picked for the revision already denotes a different live object.
    /// This cannot happen while replacement objects reuse their original numbers, so it is
    /// checked rather than assumed.
    #[error("object number conflict on {0}")]
    ObjectNumberConflict(ObjNum),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Collects replacement objects for one document and serializes them as an incremental
/// update: the objects in ascending number order, a cross-reference section covering exactly
/// the touched numbers, and a trailer chaining to the document's last revision via `/Prev`.
/// The section takes whichever form (classic table or xref stream) the document's final
/// revision used.
///
/// The revision is built completely in memory before a single byte goes out, so a file is
/// only ever extended by one whole revision or not at all.
pub struct Update<'a, T: BufRead + Seek> {
    doc: &'a Document<T>,
    replacements: BTreeMap<ObjNum, (ObjGen, Object)>,
}

impl<'a, T: BufRead + Seek> Update<'a, T> {
    pub fn new(doc: &'a Document<T>) -> Self {
        Self { doc, replacements: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Queues a replacement page dictionary with `/CropBox` set to `crop`, keeping the
    /// page's object number and generation.
    ///
    /// Returns `false`, queueing nothing, when the page's own stored `/CropBox` already
    /// equals the planned one. A page displaying the right box only by inheritance still
    /// gets an own entry, so the result no longer depends on the tree above it.
    pub fn set_page_crop(&mut self, page: &Page, crop: Rect) -> bool {
        if let Object::Array(arr) = page.dict.lookup(b"CropBox") {
            if Rect::from_array(arr).is_some_and(|own| own.approx_eq(&crop)) {
                return false;
            }
        }
        let mut dict = page.dict.clone();
        dict.set(Name::from(b"CropBox"), crop.to_object());
        self.replace(page.oref, Object::Dict(dict));
        true
    }

    /// Queues an arbitrary object replacement under its original number and generation.
    pub fn replace(&mut self, oref: ObjRef, obj: Object) {
        self.replacements.insert(oref.num, (oref.gen, obj));
    }

    /// Serializes the complete revision as the bytes to append to a document currently
    /// ending at `base` (relative to its `%PDF` marker).
    ///
    /// Every queued number is first checked against the document's merged table: replacing
    /// an object the document does not hold live, or holds under another generation, fails
    /// with [`WriterError::ObjectNumberConflict`] before any output exists.
    pub fn build_revision(&self, base: Offset) -> Result<Vec<u8>, WriterError> {
        let xref = self.doc.xref();
        for (&num, &(gen, _)) in &self.replacements {
            match xref.locate(&ObjRef { num, gen }) {
                Some(Record::Used { .. } | Record::Compr { .. }) => (),
                _ => return Err(WriterError::ObjectNumberConflict(num))
            }
        }

        // separate from whatever the original file ends with
        let mut out = vec![b'\n'];
        let mut entries = Vec::with_capacity(self.replacements.len());
        for (&num, &(gen, ref obj)) in &self.replacements {
            entries.push((num, gen, base + out.len() as Offset));
            write!(out, "{num} {gen} obj\n{obj}\nendobj\n")?;
        }

        let xref_offset = base + out.len() as Offset;
        match xref.tpe {
            XRefType::Table => self.write_xref_table(&mut out, &entries)?,
            XRefType::Stream(_) => self.write_xref_stream(&mut out, entries, xref_offset)?,
        }
        write!(out, "startxref\n{xref_offset}\n%%EOF\n")?;
        Ok(out)
    }

    /// Appends the revision to `path` as a single write.
    ///
    /// The file must be the one the [`Document`] was loaded from, or a byte-identical copy.
    /// If the write fails partway, the file is truncated back to its prior length, honoring
    /// the all-or-nothing contract.
    pub fn append_to_file(&self, path: impl AsRef<Path>) -> Result<(), WriterError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.seek(std::io::SeekFrom::End(0))?;
        if len != self.doc.source_len() {
            return Err(WriterError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData,
                "file length does not match the loaded document")));
        }
        let revision = self.build_revision(self.doc.append_base())?;
        file.write_all(&revision)
            .and_then(|()| file.sync_all())
            .map_err(|err| {
                let _ = file.set_len(len);
                err.into()
            })
    }

    fn write_xref_table(&self, out: &mut Vec<u8>, entries: &[(ObjNum, ObjGen, Offset)])
            -> Result<(), WriterError> {
        out.extend_from_slice(b"xref\n");
        for run in consecutive_runs(entries) {
            writeln!(out, "{} {}", run[0].0, run.len())?;
            for &(_, gen, offset) in run {
                // fixed 20-byte entries, two-byte EOL included
                write!(out, "{offset:010} {gen:05} n \n")?;
            }
        }
        let trailer = self.revision_dict(entries.iter().map(|&(num, ..)| num).max(), None);
        write!(out, "trailer\n{trailer}\n")?;
        Ok(())
    }

    fn write_xref_stream(&self, out: &mut Vec<u8>, mut entries: Vec<(ObjNum, ObjGen, Offset)>,
            xref_offset: Offset) -> Result<(), WriterError> {
        // the section is itself an object and needs a number of its own
        let stm_num = self.doc.xref().next_free_number();
        if matches!(self.doc.xref().map.get(&stm_num), Some(Record::Used { .. } | Record::Compr { .. })) {
            return Err(WriterError::ObjectNumberConflict(stm_num));
        }
        entries.push((stm_num, 0, xref_offset));
        entries.sort_by_key(|&(num, ..)| num);

        let max_offset = entries.iter().map(|&(.., offset)| offset).max().unwrap_or(0);
        let w2 = offset_width(max_offset);
        let mut data = Vec::new();
        for &(_, gen, offset) in &entries {
            data.push(1u8);
            data.extend_from_slice(&offset.to_be_bytes()[8 - w2..]);
            data.extend_from_slice(&gen.to_be_bytes());
        }

        let index = consecutive_runs(&entries)
            .flat_map(|run| [
                Object::Number(Number::Int(run[0].0 as i64)),
                Object::Number(Number::Int(run.len() as i64)),
            ])
            .collect::<Vec<_>>();
        let mut dict = self.revision_dict(Some(stm_num), Some(Object::Array(index)));
        dict.set(Name::from(b"W"), Object::Array(vec![
            Object::Number(Number::Int(1)),
            Object::Number(Number::Int(w2 as i64)),
            Object::Number(Number::Int(2)),
        ]));
        dict.set(Name::from(b"Length"), Object::Number(Number::Int(data.len() as i64)));

        write!(out, "{stm_num} 0 obj\n{}\nstream\n", Object::Dict(dict))?;
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    /// The dictionary shared by both revision forms: `/Size`, `/Prev`, and the carried-over
    /// trailer entries (`/Root`, `/Info`, `/ID`).
    fn revision_dict(&self, max_touched: Option<ObjNum>, index: Option<Object>) -> Dict {
        let old = self.doc.trailer();
        let size = std::cmp::max(self.doc.xref().size,
            max_touched.map(|num| num + 1).unwrap_or(0));
        let mut dict = Dict::default();
        if index.is_some() {
            dict.set(Name::from(b"Type"), Object::new_name(b"XRef"));
        }
        dict.set(Name::from(b"Size"), Object::Number(Number::Int(size as i64)));
        if let Some(index) = index {
            dict.set(Name::from(b"Index"), index);
        }
        dict.set(Name::from(b"Prev"), Object::Number(Number::Int(self.doc.entrypoint() as i64)));
        for key in [&b"Root"[..], &b"Info"[..], &b"ID"[..]] {
            match old.lookup(key) {
                Object::Null => (),
                obj => dict.set(Name::from(key), obj.clone())
            }
        }
        dict
    }
}

/// Splits entries (sorted by object number) into maximal runs of consecutive numbers, the
/// granularity of xref subsections and of an xref stream's `/Index`.
fn consecutive_runs<T>(entries: &[(ObjNum, ObjGen, T)])
        -> impl Iterator<Item = &[(ObjNum, ObjGen, T)]> {
    let mut rest = entries;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut len = 1;
        while len < rest.len() && rest[len].0 == rest[len - 1].0 + 1 {
            len += 1;
        }
        let (run, tail) = rest.split_at(len);
        rest = tail;
        Some(run)
    })
}

/// Smallest number of big-endian bytes holding `offset`.
fn offset_width(offset: Offset) -> usize {
    (8 - offset.leading_zeros() as usize / 8).max(1)
}
