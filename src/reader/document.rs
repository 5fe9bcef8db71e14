use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use crate::base::*;
use crate::base::types::*;
use crate::parser::FileParser;

use super::base::BaseReader;

/// A loaded PDF document: the merged cross-reference mapping plus lazy object access.
///
/// Construction parses only the trailer chain; individual objects are parsed on demand, so
/// the cost is bounded by what is actually touched. The source is consumed read-only — a
/// `Document` never modifies the bytes it was loaded from, which is what makes appending a
/// revision to the same file safe.
pub struct Document<T: BufRead + Seek> {
    base: BaseReader<T>,
    xref: XRef,
    entry: Offset,
}

impl Document<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Self::load(BufReader::new(File::open(path)?))
    }
}

impl<T: BufRead + Seek> Document<T> {
    /// Parses the cross-reference chain of the document in `source`.
    ///
    /// Fails with [`ParseError::MissingTrailer`] if no `startxref` anchor is found, and with
    /// the underlying error if the section it points at cannot be parsed. Later sections of a
    /// broken chain are skipped with a warning, as are the duplicate tails of a looping one.
    pub fn load(source: T) -> Result<Self, ParseError> {
        let parser = FileParser::new(source)?;
        let entry = parser.entrypoint()?;
        let xref = Self::build_xref(&parser, entry)?;
        Ok(Self { base: BaseReader::new(parser), xref, entry })
    }

    fn build_xref(parser: &FileParser<T>, entry: Offset) -> Result<XRef, ParseError> {
        let mut iter = BaseReader::read_xref_chain(parser, entry);
        let mut order = vec![entry];
        let mut xref = iter.next()
            .ok_or(ParseError::Malformed("could not parse xref table"))?.1;
        for (offset, next_xref) in iter {
            if order.contains(&offset) {
                log::warn!("Breaking xref chain detected at {offset}.");
                break;
            }
            xref.merge_prev(next_xref);
            order.push(offset);
        }
        Ok(xref)
    }

    /// The merged cross-reference mapping, newest entries winning.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    /// The trailer dictionary of the document's final revision.
    pub fn trailer(&self) -> &Dict {
        &self.xref.dict
    }

    /// The `startxref` value of the final revision, i.e. what an appended revision's `/Prev`
    /// must point at.
    pub fn entrypoint(&self) -> Offset {
        self.entry
    }

    /// The offset (relative to `%PDF`) at which an appended revision will land.
    pub fn append_base(&self) -> Offset {
        self.base.parser.append_base()
    }

    /// Total length of the byte source the document was loaded from.
    pub fn source_len(&self) -> Offset {
        self.base.parser.len()
    }

    /// Resolves the document catalog through the trailer's `/Root`.
    pub fn catalog(&self) -> Result<Dict, ParseError> {
        let objref = self.trailer().lookup(b"Root").as_objref()
            .ok_or(ParseError::MissingRoot)?;
        self.resolve_ref(objref)
            .map_err(|_| ParseError::MissingRoot)?
            .into_dict()
            .ok_or(ParseError::MissingRoot)
    }

    /// Iterates over all object numbers marked as used, in increasing number.
    ///
    /// Each object is parsed at the moment of retrieval, which can result in a `ParseError`.
    /// Such errors usually have no consequences for the subsequent objects, so the iterator
    /// can be used further.
    pub fn objects(&self) -> impl Iterator<Item = (ObjRef, Result<Object, ParseError>)> + '_ {
        self.xref.map.iter()
            .flat_map(move |(&num, rec)| match *rec {
                Record::Used { gen, offset } => {
                    let objref = ObjRef { num, gen };
                    Some((objref, self.base.read_uncompressed(offset, &objref)))
                },
                Record::Compr { num_within, index } => {
                    let objref = ObjRef { num, gen: 0 };
                    Some((objref, self.base.read_compressed(num_within, index, &self.xref, &objref)))
                },
                Record::Free { .. } => None
            })
    }

    /// Creates a `BufRead` over a [`Stream`]'s decoded data.
    ///
    /// Note that this is a mutable borrow of an internal `RefCell`, so you may need to
    /// `drop()` the returned reader prior to calling any other methods of this `Document`.
    pub fn read_stream_data(&self, stm: &Stream) -> Result<Box<dyn BufRead + '_>, ParseError> {
        self.base.read_stream_data(stm, &self.xref)
    }
}

impl<T: BufRead + Seek> Resolver for Document<T> {
    fn resolve_ref(&self, objref: &ObjRef) -> Result<Object, ParseError> {
        self.base.resolve(objref, &self.xref)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testpdf;
    use std::io::{Cursor, Read};

    #[test]
    fn test_load_minimal() {
        let doc = Document::load(Cursor::new(testpdf::minimal())).unwrap();
        assert_eq!(doc.xref().size, 5);
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.lookup(b"Type"), &Object::new_name(b"Catalog"));
        assert_eq!(doc.objects().count(), 4);

        let pages = doc.resolve_ref(&ObjRef { num: 2, gen: 0 }).unwrap().into_dict().unwrap();
        assert_eq!(pages.lookup(b"Count"), &Object::Number(Number::Int(1)));
    }

    #[test]
    fn test_read_stream_data() {
        let doc = Document::load(Cursor::new(testpdf::minimal())).unwrap();
        let stm = doc.resolve_ref(&ObjRef { num: 4, gen: 0 }).unwrap().into_stream().unwrap();
        let mut data = Vec::new();
        doc.read_stream_data(&stm).unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, testpdf::CONTENT);
    }

    #[test]
    fn test_missing_trailer() {
        let res = Document::load(Cursor::new(b"%PDF-1.4\njust some bytes".to_vec()));
        assert!(matches!(res, Err(ParseError::MissingTrailer)));
    }

    #[test]
    fn test_dangling_reference() {
        let doc = Document::load(Cursor::new(testpdf::minimal())).unwrap();
        let objref = ObjRef { num: 9, gen: 0 };
        assert!(matches!(doc.resolve_ref(&objref), Err(ParseError::DanglingReference(r)) if r == objref));
        // generation mismatch counts as dangling too
        let objref = ObjRef { num: 3, gen: 1 };
        assert!(matches!(doc.resolve_ref(&objref), Err(ParseError::DanglingReference(_))));
    }

    #[test]
    fn test_update_chain() {
        let base = testpdf::minimal();
        let updated = testpdf::append_revision(base,
            &[(3, 0, "<< /Type /Page /Parent 2 0 R /CropBox [ 10 10 200 200 ] >>")], 1, 5);
        let doc = Document::load(Cursor::new(updated)).unwrap();
        // same object population, only the touched object replaced
        assert_eq!(doc.objects().count(), 4);
        let page = doc.resolve_ref(&ObjRef { num: 3, gen: 0 }).unwrap().into_dict().unwrap();
        assert_ne!(page.lookup(b"CropBox"), &Object::Null);
        assert_eq!(doc.trailer().lookup(b"Root"), &Object::Ref(ObjRef { num: 1, gen: 0 }));
    }

    #[test]
    fn test_circular_chain() {
        // the sole xref section lists itself as /Prev; the loop must break, not hang
        let data = b"%PDF-1.4\nxref\n0 1\n0000000000 65535 f \n\
            trailer\n<< /Size 1 /Prev 9 >>\nstartxref\n9\n%%EOF\n".to_vec();
        let doc = Document::load(Cursor::new(data)).unwrap();
        assert_eq!(doc.objects().count(), 0);
    }

    #[test]
    fn test_xref_stream_document() {
        let doc = Document::load(Cursor::new(testpdf::xref_stream())).unwrap();
        assert!(matches!(doc.xref().tpe, XRefType::Stream(_)));
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.lookup(b"Type"), &Object::new_name(b"Catalog"));
    }

    #[test]
    fn test_object_stream_document() {
        let doc = Document::load(Cursor::new(testpdf::object_stream())).unwrap();
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.lookup(b"Type"), &Object::new_name(b"Catalog"));
        // catalog and pages both live compressed in the object stream
        let pages = doc.resolve_ref(&ObjRef { num: 2, gen: 0 }).unwrap().into_dict().unwrap();
        assert_eq!(pages.lookup(b"Type"), &Object::new_name(b"Pages"));
    }
}
