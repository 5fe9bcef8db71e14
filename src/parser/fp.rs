use std::io::{Cursor, Seek, Read, BufRead};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::cell::RefCell;
use std::ops::DerefMut;

use crate::base::*;
use crate::base::types::*;
use crate::utils;
use crate::codecs;

use super::bp::ByteProvider;
use super::op::ObjParser;
use super::tk::Tokenizer;

/// The main interface to file-level PDF parsing.
///
/// Object and cross-reference offsets handed to [`FileParser::read_obj_at`] and
/// [`FileParser::read_xref_at`] are relative to the `%PDF` marker; stream data offsets are
/// absolute within the byte source.
pub struct FileParser<T: BufRead + Seek> {
    reader: RefCell<T>,
    header: Result<Header, ParseError>,
    len: Offset,
}

enum Structural {
    Object(ObjRef, Object),
    XRefSec(XRef)
}

impl<T: BufRead + Seek> FileParser<T> {
    /// Creates a `FileParser` over the provided byte source.
    ///
    /// Locates the PDF header, determining the version and its byte offset within the stream.
    /// A missing header is tolerated (all offsets are then absolute), but logged.
    pub fn new(mut reader: T) -> std::io::Result<Self> {
        let len = reader.seek(std::io::SeekFrom::End(0))?;
        let header = Self::find_header(&mut reader, len);
        match &header {
            Ok(Header { start, version }) => {
                log::info!("PDF version {}.{}", version.0, version.1);
                if *start != 0 {
                    log::info!("Offset start @ {start}");
                }
            },
            Err(err) => log::warn!("{err}")
        }
        Ok(Self { reader: RefCell::new(reader), header, len })
    }

    fn start(&self) -> Offset {
        match self.header {
            Ok(Header { start, .. }) => start,
            _ => 0
        }
    }

    /// Returns a reference to the `Result` of locating the PDF file header.
    pub fn header(&self) -> &Result<Header, ParseError> {
        &self.header
    }

    /// Total length of the byte source.
    pub fn len(&self) -> Offset {
        self.len
    }

    /// The offset at which an appended revision will land, relative to `%PDF`.
    pub fn append_base(&self) -> Offset {
        self.len - self.start()
    }

    fn find_header(reader: &mut T, len: Offset) -> Result<Header, ParseError> {
        const CHUNK: usize = 1024;
        const MARKER: &[u8] = b"%PDF-";
        // marker + "M.m"
        const FULL: usize = MARKER.len() + 3;

        let len: usize = len.try_into()
            .map_err(|_| ParseError::Malformed("file too large"))?;
        reader.seek(std::io::SeekFrom::Start(0))?;

        let mut data = Vec::new();
        let mut from = 0;
        loop {
            let upto = std::cmp::min(from + data.len() + CHUNK, len);
            data.resize(upto - from, 0u8);
            let fresh = upto - from - (if from == 0 { 0 } else { FULL - 1 });
            let keep = data.len() - fresh;
            reader.read_exact(&mut data[keep..])?;
            for (ix, w) in data.windows(FULL).enumerate() {
                if &w[..MARKER.len()] != MARKER { continue; }
                if let &[maj @ b'0'..=b'9', b'.', min @ b'0'..=b'9'] = &w[MARKER.len()..] {
                    return Ok(Header {
                        start: (from + ix) as Offset,
                        version: (maj - b'0', min - b'0')
                    });
                }
            }
            if upto == len {
                return Err(ParseError::Malformed("header not found"));
            }
            from = upto - (FULL - 1);
            data.drain(..data.len() - (FULL - 1));
        }
    }

    /// Opens a raw data reader starting at the specified absolute offset.
    ///
    /// Note that this is a mutable borrow of an internal `RefCell`, so you may need to
    /// `drop()` the instance prior to calling any other methods of this `FileParser`. No
    /// length limit is imposed; use [`std::io::Read::take()`].
    pub fn read_raw(&self, pos: Offset) -> Result<impl BufRead + use<'_, T>, ParseError> {
        let mut reader = self.reader.borrow_mut();
        reader.seek(std::io::SeekFrom::Start(pos))?;
        Ok(RawReader(reader))
    }

    /// Tries to locate the cross-reference entry point (`startxref`) within the last 1024
    /// bytes of the source. The returned offset is relative to `%PDF`.
    pub fn entrypoint(&self) -> Result<Offset, ParseError> {
        let mut reader = self.reader.borrow_mut();
        let buf_size = std::cmp::min(self.len, 1024);

        reader.seek(std::io::SeekFrom::End(-(buf_size as i64)))?;
        let mut data = vec![0; buf_size as usize];
        reader.read_exact(&mut data)?;

        const SXREF: &[u8] = b"startxref";
        let sxref = data.windows(SXREF.len())
            .rposition(|w| w == SXREF)
            .ok_or(ParseError::MissingTrailer)?;
        let mut cur = Cursor::new(&data[(sxref + SXREF.len())..]);
        (|| -> Result<Offset, ParseError> {
            cur.read_eol()?;
            utils::parse_num(&cur.read_line_excl()?).ok_or(ParseError::MissingTrailer)
        })().map_err(|_| ParseError::MissingTrailer)
    }

    fn read_at(&self, pos: Offset) -> Result<Structural, ParseError> {
        let mut reader = self.reader.borrow_mut();
        reader.seek(std::io::SeekFrom::Start(pos + self.start()))?;
        let tk = reader.read_token_nonempty()?;
        if tk == b"xref" {
            reader.read_eol()?;
            let xref = self.read_xref_table(&mut *reader)?;
            return Ok(Structural::XRefSec(xref));
        }
        let num = utils::parse_int_strict(&tk)
            .ok_or(ParseError::Malformed("invalid object number"))?;
        let gen = utils::parse_int_strict(&reader.read_token_nonempty()?)
            .ok_or(ParseError::Malformed("invalid generation number"))?;
        let oref = ObjRef { num, gen };
        if reader.read_token_nonempty()? != b"obj" {
            return Err(ParseError::Malformed("obj keyword not found"));
        }
        let obj = ObjParser::read_obj(&mut *reader)?;
        match &reader.read_token_nonempty()?[..] {
            b"endobj" =>
                Ok(Structural::Object(oref, obj)),
            b"stream" => {
                let Object::Dict(dict) = obj else {
                    return Err(ParseError::Malformed("endobj not found"))
                };
                match reader.next_or_eof()? {
                    b'\n' => (),
                    b'\r' => {
                        if reader.next_or_eof()? != b'\n' {
                            return Err(ParseError::Malformed("stream keyword not followed by proper EOL"));
                        }
                    },
                    _ => return Err(ParseError::Malformed("stream keyword not followed by proper EOL"))
                };
                let offset = reader.stream_position()?;
                Ok(Structural::Object(oref, Object::Stream(Stream { dict, offset })))
            },
            _ => Err(ParseError::Malformed("endobj not found"))
        }
    }

    /// Attempts to read an indirect object at the specified location (relative to `%PDF`).
    pub fn read_obj_at(&self, pos: Offset) -> Result<(ObjRef, Object), ParseError> {
        match self.read_at(pos)? {
            Structural::Object(oref, obj) => Ok((oref, obj)),
            _ => Err(ParseError::Malformed("expected object, found xref section"))
        }
    }

    /// Attempts to read a cross-reference table section or a cross-reference stream object at
    /// the specified location (relative to `%PDF`).
    pub fn read_xref_at(&self, pos: Offset) -> Result<XRef, ParseError> {
        match self.read_at(pos)? {
            Structural::XRefSec(xref) => Ok(xref),
            Structural::Object(oref, obj) => self.read_xref_stream(oref, obj)
        }
    }

    fn read_xref_table(&self, reader: &mut T) -> Result<XRef, ParseError> {
        let mut map = BTreeMap::new();
        let err = || ParseError::Malformed("malformed xref table");
        loop {
            let tk = reader.read_token_nonempty()?;
            if tk == b"trailer" { break; }
            let start = utils::parse_num::<u64>(&tk).ok_or_else(err)?;
            let count = utils::parse_num::<u64>(&reader.read_token_nonempty()?).ok_or_else(err)?;
            reader.skip_ws()?;
            let mut line = [0u8; 20];
            for num in start..(start + count) {
                reader.read_exact(&mut line)?;
                if line[10] != b' ' || line[16] != b' ' {
                    return Err(err());
                }
                let v = utils::parse_num::<u64>(&line[0..10]).ok_or_else(err)?;
                let gen = utils::parse_num::<u16>(&line[11..16]).ok_or_else(err)?;
                let rec = match line[17] {
                    b'n' => Record::Used { gen, offset: v },
                    b'f' => Record::Free { gen, next: v },
                    _ => return Err(err())
                };
                match map.entry(num) {
                    Entry::Vacant(entry) => { entry.insert(rec); },
                    Entry::Occupied(_) => log::warn!("Duplicate object number {num} in xref table")
                };
            }
        }
        let trailer = match ObjParser::read_obj(reader)? {
            Object::Dict(dict) => dict,
            _ => return Err(ParseError::Malformed("malformed trailer"))
        };
        let size = trailer.lookup(b"Size")
            .num_value()
            .ok_or(ParseError::Malformed("malformed trailer (missing /Size)"))?;
        Ok(XRef { tpe: XRefType::Table, map, dict: trailer, size })
    }

    fn read_xref_stream(&self, oref: ObjRef, obj: Object) -> Result<XRef, ParseError> {
        let Object::Stream(Stream { dict, offset }) = obj else {
            return Err(ParseError::Malformed("malformed xref"))
        };
        if dict.lookup(b"Type") != &Object::new_name(b"XRef") {
            return Err(ParseError::Malformed("malformed xref stream (/Type)"))
        }
        let size = dict.lookup(b"Size").num_value()
            .ok_or(ParseError::Malformed("malformed xref stream (/Size)"))?;
        let index = match dict.lookup(b"Index") {
            Object::Array(arr) =>
                arr.iter()
                    .map(|obj| obj.num_value().ok_or(ParseError::Malformed("malformed xref stream (/Index)")))
                    .collect::<Result<Vec<_>, _>>()?,
            Object::Null => vec![0, size],
            _ => return Err(ParseError::Malformed("malformed xref stream (/Index)"))
        };
        if index.len() % 2 != 0 {
            return Err(ParseError::Malformed("malformed xref stream (/Index)"));
        }

        let [w1, w2, w3] = match dict.lookup(b"W") {
            Object::Array(arr) =>
                arr.iter()
                    .map(|obj| match obj {
                        &Object::Number(Number::Int(num)) if (0..=8).contains(&num) => Ok(num as usize),
                        _ => Err(ParseError::Malformed("malformed xref stream (/W)"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(ParseError::Malformed("malformed xref stream (/W)"))
        }.try_into().map_err(|_| ParseError::Malformed("malformed xref stream (/W)"))?;
        if w2 == 0 {
            return Err(ParseError::Malformed("malformed xref stream (/W)"))
        }

        // the /Length of a cross-reference stream must be direct
        let len = dict.lookup(b"Length")
            .num_value()
            .ok_or(ParseError::Malformed("malformed xref stream (/Length)"))?;
        let filters = codecs::to_filters(dict.lookup(b"Filter"))?;
        let params = match dict.lookup(b"DecodeParms") {
            Object::Dict(dict) => Some(dict),
            &Object::Null => None,
            _ => return Err(ParseError::Malformed("malformed xref stream (/DecodeParms)"))
        };

        let mut reader = self.reader.borrow_mut();
        reader.seek(std::io::SeekFrom::Start(offset))?;
        let codec_in = reader.deref_mut().take(len);
        let mut codec_out = codecs::decode(codec_in, &filters, params)?;
        let mut read = |w| -> Result<u64, ParseError> {
            let mut dec_buf = [0; 8];
            codec_out.read_exact(&mut dec_buf[(8 - w)..8])?;
            Ok(u64::from_be_bytes(dec_buf))
        };

        let mut map = BTreeMap::new();
        for ch in index.chunks_exact(2) {
            let &[start, count] = ch else { unreachable!() };
            for num in start..(start + count) {
                let tpe = if w1 > 0 { read(w1)? } else { 1 };
                let f2 = read(w2)?;
                let f3 = read(w3)?.try_into()
                    .map_err(|_| ParseError::Malformed("generation field larger than 16 bits"))?;
                let rec = match tpe {
                    0 => Record::Free { gen: f3, next: f2 },
                    1 => Record::Used { gen: f3, offset: f2 },
                    2 => Record::Compr { num_within: f2, index: f3 },
                    _ => return Err(ParseError::Malformed("unknown xref stream entry type"))
                };
                match map.entry(num) {
                    Entry::Vacant(entry) => { entry.insert(rec); },
                    Entry::Occupied(_) => log::warn!("Duplicate object number {num} in xref stream")
                };
            }
        }
        if !codec_out.fill_buf()?.is_empty() {
            return Err(ParseError::Malformed("excess data in xref stream"));
        }
        Ok(XRef { tpe: XRefType::Stream(oref), map, dict, size })
    }
}


struct RawReader<'a, T: BufRead>(std::cell::RefMut<'a, T>);

impl<T: BufRead> Read for RawReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T: BufRead> BufRead for RawReader<'_, T> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.0.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testpdf;
    use std::io::Cursor;

    #[test]
    fn test_header_entrypoint() {
        let data = testpdf::minimal();
        let fp = FileParser::new(Cursor::new(&data)).unwrap();
        let header = fp.header().as_ref().unwrap();
        assert_eq!(header.start, 0);
        assert_eq!(header.version, (1, 4));
        let entry = fp.entrypoint().unwrap();
        let mut r = fp.read_raw(entry).unwrap().take(4);
        let mut s = Vec::new();
        r.read_to_end(&mut s).unwrap();
        assert_eq!(s, b"xref");
    }

    #[test]
    fn test_offset_header() {
        let mut data = b"garbage bytes\n".to_vec();
        let ofs = data.len() as Offset;
        data.extend_from_slice(&testpdf::minimal());
        let fp = FileParser::new(Cursor::new(&data)).unwrap();
        assert_eq!(fp.header().as_ref().unwrap().start, ofs);
        // entrypoint stays relative to %PDF
        let entry = fp.entrypoint().unwrap();
        let mut r = fp.read_raw(entry + ofs).unwrap().take(4);
        let mut s = Vec::new();
        r.read_to_end(&mut s).unwrap();
        assert_eq!(s, b"xref");
        drop(r); // release the RefCell borrow held by read_raw before reusing fp
        let xref = fp.read_xref_at(entry).unwrap();
        assert_eq!(xref.tpe, XRefType::Table);
    }

    #[test]
    fn test_missing_startxref() {
        let fp = FileParser::new(Cursor::new(b"%PDF-1.4\nnothing to see here".to_vec())).unwrap();
        assert!(matches!(fp.entrypoint(), Err(ParseError::MissingTrailer)));
    }

    #[test]
    fn test_read_xref_table() {
        let data = testpdf::minimal();
        let fp = FileParser::new(Cursor::new(&data)).unwrap();
        let xref = fp.read_xref_at(fp.entrypoint().unwrap()).unwrap();
        assert_eq!(xref.tpe, XRefType::Table);
        assert_eq!(xref.size, 5);
        assert_eq!(xref.map.get(&0), Some(&Record::Free { gen: 65535, next: 0 }));
        assert!(matches!(xref.map.get(&1), Some(&Record::Used { gen: 0, .. })));
        assert_eq!(xref.dict.lookup(b"Root"), &Object::Ref(ObjRef { num: 1, gen: 0 }));

        // object where an xref was expected
        let Some(&Record::Used { offset, .. }) = xref.map.get(&1) else { panic!() };
        assert!(fp.read_xref_at(offset).is_err());
        assert!(fp.read_obj_at(offset).is_ok());
    }

    #[test]
    fn test_read_obj_at() {
        let data = testpdf::minimal();
        let fp = FileParser::new(Cursor::new(&data)).unwrap();
        let xref = fp.read_xref_at(fp.entrypoint().unwrap()).unwrap();
        let Some(&Record::Used { offset, .. }) = xref.map.get(&2) else { panic!() };
        let (oref, obj) = fp.read_obj_at(offset).unwrap();
        assert_eq!(oref, ObjRef { num: 2, gen: 0 });
        let dict = obj.into_dict().unwrap();
        assert_eq!(dict.lookup(b"Type"), &Object::new_name(b"Pages"));
    }

    #[test]
    fn test_read_xref_stream() {
        let data = testpdf::xref_stream();
        let fp = FileParser::new(Cursor::new(&data)).unwrap();
        let entry = fp.entrypoint().unwrap();
        let xref = fp.read_xref_at(entry).unwrap();
        let XRefType::Stream(oref) = xref.tpe else { panic!() };
        assert_eq!(oref.gen, 0);
        assert_eq!(xref.dict.lookup(b"Type"), &Object::new_name(b"XRef"));
        assert!(matches!(xref.map.get(&1), Some(&Record::Used { gen: 0, .. })));
    }
}
