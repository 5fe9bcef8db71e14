use std::io::{BufRead, Read};

use crate::parser::bp::ByteProvider;
use crate::parser::cc::CharClass;
use crate::utils;

pub fn decode<R: BufRead>(input: R) -> AsciiHexDecode<R> {
    AsciiHexDecode { input, done: false }
}

/// Decodes pairs of hexadecimal digits. Whitespace is skipped, `>` ends the data, and a
/// trailing odd digit acts as if followed by `0`.
pub struct AsciiHexDecode<R: BufRead> {
    input: R,
    done: bool
}

impl<R: BufRead> AsciiHexDecode<R> {
    fn next_digit(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            let c = match self.input.next_or_eof() {
                Ok(c) => c,
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.done = true;
                    return Ok(None);
                },
                Err(err) => return Err(err)
            };
            if c == b'>' {
                self.done = true;
                return Ok(None);
            }
            if CharClass::of(c) == CharClass::Space {
                continue;
            }
            return match utils::hex_value(c) {
                Some(dig) => Ok(Some(dig)),
                None => Err(std::io::Error::new(std::io::ErrorKind::InvalidData,
                    "invalid character in hex stream"))
            };
        }
    }
}

impl<R: BufRead> Read for AsciiHexDecode<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut done = 0;
        while done < buf.len() && !self.done {
            let Some(msd) = self.next_digit()? else { break };
            let lsd = self.next_digit()?.unwrap_or(0);
            buf[done] = (msd << 4) | lsd;
            done += 1;
        }
        Ok(done)
    }
}
