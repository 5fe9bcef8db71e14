mod flate;
mod asciihex;

use std::io::BufRead;

use crate::base::*;

/// Supported stream filters.
#[derive(Debug, PartialEq)]
pub enum Filter {
    /// `/FlateDecode`
    Flate,
    /// `/ASCIIHexDecode`
    AsciiHex,
}

impl TryFrom<&Name> for Filter {
    type Error = ParseError;

    fn try_from(name: &Name) -> Result<Filter, ParseError> {
        if name == b"FlateDecode" {
            Ok(Filter::Flate)
        } else if name == b"ASCIIHexDecode" {
            Ok(Filter::AsciiHex)
        } else {
            Err(ParseError::Malformed("unimplemented filter"))
        }
    }
}

/// Resolves a PDF `Object` value of the `/Filter` key into the format expected by [`decode()`].
pub fn to_filters(obj: &Object) -> Result<Vec<Filter>, ParseError> {
    match obj {
        Object::Name(name) => Ok(vec![name.try_into()?]),
        Object::Array(vec) => vec.iter()
            .map(|obj| match obj {
                Object::Name(name) => name.try_into(),
                _ => Err(ParseError::Malformed("malformed /Filter"))
            })
            .collect::<Result<Vec<_>, _>>(),
        Object::Null => Ok(vec![]),
        _ => Err(ParseError::Malformed("malformed /Filter"))
    }
}

/// Reads `/Filter` and `/DecodeParms` out of a stream dictionary, resolving indirect values
/// through `resolver`.
pub fn parse_filters(dict: &Dict, resolver: &impl Resolver) -> Result<(Vec<Filter>, Option<Dict>), ParseError> {
    let filters = to_filters(&resolver.resolve_deep(dict.lookup(b"Filter").to_owned())?)?;
    let params = match resolver.resolve_obj(dict.lookup(b"DecodeParms").to_owned())? {
        Object::Dict(dict) => Some(dict),
        Object::Null => None,
        _ => return Err(ParseError::Malformed("malformed /DecodeParms"))
    };
    Ok((filters, params))
}

/// Wraps a `BufRead` in adapters decoding the data according to the provided `/Filter` chain.
/// `params` applies to the `/FlateDecode` stage, if there is one.
pub fn decode<'a, R: BufRead + 'a>(input: R, filters: &[Filter], params: Option<&Dict>)
        -> Result<Box<dyn BufRead + 'a>, ParseError> {
    let mut out: Box<dyn BufRead + 'a> = Box::new(input);
    for filter in filters {
        out = match filter {
            Filter::Flate => flate::decode(out, params)?,
            Filter::AsciiHex => Box::new(std::io::BufReader::new(asciihex::decode(out))),
        };
    }
    Ok(out)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_to_filters() {
        assert_eq!(to_filters(&Object::Null).unwrap(), vec![]);
        assert_eq!(to_filters(&Object::new_name(b"FlateDecode")).unwrap(), vec![Filter::Flate]);
        assert_eq!(to_filters(&Object::Array(vec![
            Object::new_name(b"ASCIIHexDecode"),
            Object::new_name(b"FlateDecode"),
        ])).unwrap(), vec![Filter::AsciiHex, Filter::Flate]);
        assert!(to_filters(&Object::new_name(b"LZWDecode")).is_err());
        assert!(to_filters(&Object::Bool(true)).is_err());
    }

    #[test]
    fn test_decode_chain() {
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"chained").unwrap();
        let compressed = enc.finish().unwrap();
        let mut hex = compressed.iter()
            .map(|c| format!("{c:02X}"))
            .collect::<String>();
        hex.push('>');

        let mut out = Vec::new();
        decode(hex.as_bytes(), &[Filter::AsciiHex, Filter::Flate], None)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"chained");
    }
}
