use std::io::BufRead;

use crate::base::*;
use crate::utils;

use super::bp::ByteProvider;
use super::cc::CharClass;
use super::tk::*;

/// Parses a single PDF object from a token stream.
pub struct ObjParser<T: BufRead> {
    reader: T,
    stack: Vec<Token>
}

impl<T: BufRead> ObjParser<T> {
    pub fn new(reader: T) -> Self {
        Self { reader, stack: Default::default() }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        match self.stack.pop() {
            Some(tk) => Ok(tk),
            None => self.reader.read_token_nonempty()
                .map_err(ParseError::from)
        }
    }

    /// Reads a single object, leaving the reader right behind its final token.
    ///
    /// A top-level number is returned as such without looking ahead for a reference; the
    /// lookahead would otherwise swallow a following keyword (`endobj`, `stream`).
    pub fn read_obj(reader: &mut T) -> Result<Object, ParseError> {
        let tk = reader.read_token_nonempty()?;
        if matches!(tk[..], [b'0'..=b'9' | b'+' | b'-' | b'.', ..]) {
            tk.try_into().map(Object::Number)
        } else {
            let mut op = ObjParser::new(reader);
            op.stack.push(tk);
            op.read_obj_inner()
        }
    }

    fn read_obj_inner(&mut self) -> Result<Object, ParseError> {
        let tk = self.next_token()?;
        match &tk[..] {
            b"true" => Ok(Object::Bool(true)),
            b"false" => Ok(Object::Bool(false)),
            b"null" => Ok(Object::Null),
            [b'1'..=b'9', ..] => {
                self.stack.push(tk);
                self.read_number_or_indirect()
            },
            [b'+' | b'-' | b'0' | b'.', ..]
                => tk.try_into().map(Object::Number),
            b"(" => self.read_lit_string(),
            b"<" => self.read_hex_string(),
            b"/" => self.read_name().map(Object::Name),
            b"[" => self.read_array(),
            b"<<" => self.read_dict(),
            _ => Err(ParseError::Malformed("unexpected token")),
        }
    }

    fn read_number_or_indirect(&mut self) -> Result<Object, ParseError> {
        let num = self.next_token()?.try_into()?;
        let Number::Int(num) = num else {
            return Ok(Object::Number(num))
        };
        let gen_tk = self.next_token()?;
        match utils::parse_int_strict(&gen_tk) {
            Some(gen) => {
                let r_tk = self.next_token()?;
                if r_tk == b"R" {
                    // num already checked to start with 1..=9 and fit into i64
                    let num = num.try_into().map_err(|_| ParseError::Malformed("invalid object number"))?;
                    return Ok(Object::Ref(ObjRef { num, gen }));
                } else {
                    self.stack.push(r_tk);
                    self.stack.push(gen_tk);
                }
            },
            None => self.stack.push(gen_tk)
        }
        Ok(Object::Number(Number::Int(num)))
    }

    fn read_lit_string(&mut self) -> Result<Object, ParseError> {
        let mut ret = Vec::new();
        let mut parens = 0;
        loop {
            match self.reader.next_or_eof()? {
                b'\\' => {
                    let c = match self.reader.next_or_eof()? {
                        b'n' => b'\x0a',
                        b'r' => b'\x0d',
                        b't' => b'\x09',
                        b'b' => b'\x08',
                        b'f' => b'\x0c',
                        c @ (b'(' | b')' | b'\\') => c,
                        c @ (b'0'..=b'7') => {
                            let d1 = c - b'0';
                            let d2 = self.reader.next_if(|c| (b'0'..=b'7').contains(&c)).map(|c| c - b'0');
                            let d3 = self.reader.next_if(|c| (b'0'..=b'7').contains(&c)).map(|c| c - b'0');
                            match (d2, d3) {
                                (Some(d2), Some(d3)) => (d1 << 6) + (d2 << 3) + d3,
                                (Some(d2), None) => (d1 << 3) + d2,
                                _ => d1
                            }
                        },
                        b'\r' => {
                            // backslash-EOL: line continuation
                            self.reader.next_if(|c| c == b'\n');
                            continue
                        },
                        b'\n' => continue,
                        _ => continue
                    };
                    ret.push(c);
                },
                b'\r' => {
                    self.reader.next_if(|c| c == b'\n');
                    ret.push(b'\n');
                },
                c => {
                    if c == b'(' { parens += 1; }
                    if c == b')' {
                        if parens == 0 { break; } else { parens -= 1; }
                    }
                    ret.push(c);
                }
            }
        }
        Ok(Object::String(ret))
    }

    fn read_hex_string(&mut self) -> Result<Object, ParseError> {
        let mut msd = None;
        let mut ret = Vec::new();
        loop {
            let tk = self.next_token()?;
            if tk == b">" { break; }
            for c in tk {
                let dig = utils::hex_value(c).ok_or(ParseError::Malformed("malformed hex string"))?;
                match msd {
                    None => msd = Some(dig),
                    Some(d) => { ret.push((d << 4) | dig); msd = None; }
                }
            }
        }
        if let Some(d) = msd { ret.push(d << 4); }
        Ok(Object::String(ret))
    }

    fn read_name(&mut self) -> Result<Name, ParseError> {
        match self.reader.peek() {
            Some(c) if CharClass::of(c) != CharClass::Reg => return Ok(Name(Vec::new())),
            None => return Ok(Name(Vec::new())),
            _ => ()
        };
        let tk = self.next_token()?;
        if !tk.contains(&b'#') {
            return Ok(Name(tk));
        }
        let mut parts = tk.split(|c| *c == b'#');
        let mut ret: Vec<u8> = parts.next().unwrap_or(&[]).into();
        for part in parts {
            if part.len() < 2 {
                return Err(ParseError::Malformed("malformed name"));
            }
            if &part[0..=1] == b"00" {
                return Err(ParseError::Malformed("illegal name (contains #00)"));
            }
            let d1 = utils::hex_value(part[0]).ok_or(ParseError::Malformed("malformed name"))?;
            let d2 = utils::hex_value(part[1]).ok_or(ParseError::Malformed("malformed name"))?;
            ret.push((d1 << 4) + d2);
            ret.extend_from_slice(&part[2..]);
        }
        Ok(Name(ret))
    }

    fn read_array(&mut self) -> Result<Object, ParseError> {
        let mut vec = Vec::new();
        loop {
            let tk = self.next_token()?;
            if tk == b"]" { break; }
            self.stack.push(tk);
            vec.push(self.read_obj_inner()?);
        }
        Ok(Object::Array(vec))
    }

    fn read_dict(&mut self) -> Result<Object, ParseError> {
        let mut dict = Vec::new();
        loop {
            let key = match &self.next_token()?[..] {
                b">>" => break,
                b"/" => self.read_name()?,
                _ => return Err(ParseError::Malformed("malformed dictionary"))
            };
            let value = self.read_obj_inner()?;
            dict.push((key, value));
        }
        Ok(Object::Dict(Dict::from(dict)))
    }
}

impl TryFrom<Token> for Number {
    type Error = ParseError;

    fn try_from(tk: Token) -> Result<Number, ParseError> {
        let err = ParseError::Malformed("malformed number");
        if tk.contains(&b'e') || tk.contains(&b'E') {
            return Err(err)
        }
        if tk.contains(&b'.') {
            Ok(Number::Real(utils::parse_num(&tk).ok_or(err)?))
        } else {
            Ok(Number::Int(utils::parse_num(&tk).ok_or(err)?))
        }
    }
}
