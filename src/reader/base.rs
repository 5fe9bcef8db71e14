use std::io::{BufRead, Seek, Read};
use std::collections::{BTreeMap, VecDeque};
use std::cell::{RefCell, Ref};

use crate::base::*;
use crate::base::types::*;
use crate::parser::{FileParser, ObjParser, Tokenizer};
use crate::codecs;
use crate::utils;

/// Object-level reading on top of [`FileParser`], independent of any particular
/// cross-reference mapping: every lookup goes through a caller-supplied [`Locator`].
///
/// Object streams are decompressed at most once and cached for the lifetime of the reader.
/// The cache belongs to this instance; concurrently processed documents do not share state.
pub struct BaseReader<T: BufRead + Seek> {
    pub parser: FileParser<T>,
    objstms: RefCell<BTreeMap<ObjNum, ObjStm>>,
}

struct ObjStm {
    entries: Vec<(ObjNum, Offset)>,
    source: Vec<u8>,
}

impl<T: BufRead + Seek> BaseReader<T> {
    pub fn new(parser: FileParser<T>) -> Self {
        Self { parser, objstms: Default::default() }
    }

    /// Iterates over the chain of cross-reference sections starting at `entry`, newest first,
    /// following `/Prev` links and classic tables' `/XRefStm` asides.
    ///
    /// The iterator itself performs no loop detection; callers deduplicate by the yielded
    /// offsets.
    pub fn read_xref_chain(parser: &FileParser<T>, entry: Offset) -> impl Iterator<Item = (Offset, XRef)> + use<'_, T> {
        XRefIterator { parser, queue: VecDeque::from([(entry, false)]) }
    }

    pub fn resolve(&self, objref: &ObjRef, locator: &dyn Locator) -> Result<Object, ParseError> {
        match locator.locate(objref) {
            Some(Record::Used { offset, .. }) => self.read_uncompressed(offset, objref),
            Some(Record::Compr { num_within, index }) => self.read_compressed(num_within, index, locator, objref),
            _ => Err(ParseError::DanglingReference(*objref))
        }
    }

    pub fn read_uncompressed(&self, offset: Offset, oref_expd: &ObjRef) -> Result<Object, ParseError> {
        let (oref, obj) = self.parser.read_obj_at(offset)?;
        if &oref == oref_expd {
            Ok(obj)
        } else {
            Err(ParseError::DanglingReference(*oref_expd))
        }
    }

    pub fn read_compressed(&self, num_within: ObjNum, index: ObjIndex, locator: &dyn Locator, oref_expd: &ObjRef)
            -> Result<Object, ParseError> {
        let index = index as usize;
        let objstm = self.cached_objstm(num_within, locator)?;
        let Some(&(num, start)) = objstm.entries.get(index) else {
            return Err(ParseError::Malformed("out of bounds index requested from object stream"));
        };
        if (ObjRef { num, gen: 0 }) != *oref_expd {
            return Err(ParseError::DanglingReference(*oref_expd));
        }
        let start: usize = start.try_into()
            .map_err(|_| ParseError::Malformed("malformed object stream header"))?;
        let end = match objstm.entries.get(index + 1) {
            Some(&(_, next)) => next.try_into()
                .map_err(|_| ParseError::Malformed("malformed object stream header"))?,
            None => objstm.source.len()
        };
        let mut source = objstm.source.get(start..end)
            .ok_or(ParseError::Malformed("malformed object stream header"))?;
        ObjParser::read_obj(&mut source)
    }

    fn cached_objstm(&self, ostm_num: ObjNum, locator: &dyn Locator) -> Result<Ref<'_, ObjStm>, ParseError> {
        if !self.objstms.borrow().contains_key(&ostm_num) {
            let objstm = self.read_objstm(ostm_num, locator)?;
            self.objstms.borrow_mut().insert(ostm_num, objstm);
        }
        Ok(Ref::map(self.objstms.borrow(), |objstms| objstms.get(&ostm_num).unwrap()))
    }

    fn read_objstm(&self, ostm_num: ObjNum, locator: &dyn Locator) -> Result<ObjStm, ParseError> {
        let ostm_oref = ObjRef { num: ostm_num, gen: 0 };
        let Some(Record::Used { offset: ostm_offset, gen: 0 }) = locator.locate(&ostm_oref) else {
            return Err(ParseError::Malformed("object stream not located"));
        };
        let stm = self.read_uncompressed(ostm_offset, &ostm_oref)?
            .into_stream()
            .ok_or(ParseError::Malformed("object stream not found"))?;
        let count = stm.dict.lookup(b"N").num_value()
            .ok_or(ParseError::Malformed("malformed object stream (/N)"))?;
        let first = stm.dict.lookup(b"First").num_value()
            .ok_or(ParseError::Malformed("malformed object stream (/First)"))?;
        let mut reader = self.read_stream_data(&stm, locator)?;
        let mut header = (&mut reader).take(first);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let num = utils::parse_num::<ObjNum>(&header.read_token_nonempty()?)
                .ok_or(ParseError::Malformed("malformed object stream header"))?;
            let offset = utils::parse_num::<Offset>(&header.read_token_nonempty()?)
                .ok_or(ParseError::Malformed("malformed object stream header"))?;
            entries.push((num, offset));
        }
        std::io::copy(&mut header, &mut std::io::sink())?;
        let mut source = Vec::new();
        std::io::copy(&mut reader, &mut source)?;
        source.shrink_to_fit();
        Ok(ObjStm { entries, source })
    }

    /// Creates a `BufRead` over a [`Stream`]'s data, decoded according to `/Filter` and
    /// `/DecodeParms`.
    ///
    /// Note that this is a mutable borrow of an internal `RefCell`, so you may need to
    /// `drop()` the returned reader prior to calling any other methods.
    pub fn read_stream_data(&self, stm: &Stream, locator: &dyn Locator) -> Result<Box<dyn BufRead + '_>, ParseError> {
        let res = BorrowedResolver { reader: self, locator };
        let len: u64 = res.resolve_obj(stm.dict.lookup(b"Length").to_owned())?
            .num_value()
            .ok_or(ParseError::Malformed("stream with invalid or missing /Length"))?;
        let (filters, params) = codecs::parse_filters(&stm.dict, &res)?;
        let reader = self.parser.read_raw(stm.offset)?;
        codecs::decode(Box::new(reader.take(len)), &filters, params.as_ref())
    }
}


struct XRefIterator<'a, T: BufRead + Seek> {
    parser: &'a FileParser<T>,
    queue: VecDeque<(Offset, bool)>,
}

impl<T: BufRead + Seek> Iterator for XRefIterator<'_, T> {
    type Item = (Offset, XRef);

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, is_aside) = self.queue.pop_front()?;
        let xref = match self.parser.read_xref_at(offset) {
            Ok(xref) => xref,
            Err(err) => {
                log::error!("Error reading xref at {offset}: {err}");
                return None;
            }
        };
        if matches!(xref.tpe, XRefType::Table) {
            if let Some(offset) = xref.dict.lookup(b"XRefStm").num_value() {
                if !is_aside {
                    self.queue.push_back((offset, true));
                } else {
                    log::warn!("/XRefStm pointed to a classical section.");
                }
            }
        }
        if let Some(offset) = xref.dict.lookup(b"Prev").num_value() {
            if !is_aside {
                self.queue.push_back((offset, false));
            } else {
                log::warn!("Ignoring /Prev in a /XRefStm.");
            }
        }
        Some((offset, xref))
    }
}


pub(crate) struct BorrowedResolver<'a, T: BufRead + Seek> {
    pub reader: &'a BaseReader<T>,
    pub locator: &'a dyn Locator,
}

impl<T: BufRead + Seek> Resolver for BorrowedResolver<'_, T> {
    fn resolve_ref(&self, objref: &ObjRef) -> Result<Object, ParseError> {
        self.reader.resolve(objref, self.locator)
    }
}
