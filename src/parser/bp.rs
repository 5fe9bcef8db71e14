use std::io::BufRead;

use super::cc::CharClass;

fn eof() -> std::io::Error {
    std::io::Error::from(std::io::ErrorKind::UnexpectedEof)
}

/// Byte-level access on top of `BufRead`: single-byte peeking and the line conventions used
/// by PDF file structure (EOL is `\n`, `\r`, or `\r\n`).
pub trait ByteProvider: BufRead {
    fn peek(&mut self) -> Option<u8> {
        match self.fill_buf() {
            Ok([c, ..]) => Some(*c),
            _ => None
        }
    }

    fn next_or_eof(&mut self) -> std::io::Result<u8> {
        let buf = self.fill_buf()?;
        match buf.first() {
            Some(&c) => {
                self.consume(1);
                Ok(c)
            },
            None => Err(eof())
        }
    }

    fn next_if(&mut self, cond: impl FnOnce(u8) -> bool) -> Option<u8> {
        let buf = self.fill_buf().ok()?;
        match buf.first() {
            Some(&c) if cond(c) => {
                self.consume(1);
                Some(c)
            },
            _ => None
        }
    }

    /// Consumes whitespace-class bytes, if any.
    fn skip_ws(&mut self) -> std::io::Result<()> {
        while self.next_if(|c| CharClass::of(c) == CharClass::Space).is_some() { }
        Ok(())
    }

    /// Consumes one end-of-line sequence, optionally preceded by spaces or tabs.
    fn read_eol(&mut self) -> std::io::Result<()> {
        while self.next_if(|c| c == b' ' || c == b'\t').is_some() { }
        match self.next_or_eof()? {
            b'\n' => Ok(()),
            b'\r' => {
                self.next_if(|c| c == b'\n');
                Ok(())
            },
            _ => Err(std::io::Error::from(std::io::ErrorKind::InvalidData))
        }
    }

    /// Reads up to, and consumes, the next end-of-line sequence. The EOL itself is not part
    /// of the returned line.
    fn read_line_excl(&mut self) -> std::io::Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let buf = match self.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err)
            };
            if buf.is_empty() {
                if line.is_empty() {
                    return Err(eof());
                }
                break;
            }
            match buf.iter().position(|c| *c == b'\n' || *c == b'\r') {
                Some(pos) => {
                    line.extend_from_slice(&buf[..pos]);
                    let crlf = buf[pos] == b'\r' && buf.len() > pos + 1 && buf[pos + 1] == b'\n';
                    self.consume(pos + if crlf { 2 } else { 1 });
                    break;
                },
                None => {
                    line.extend_from_slice(buf);
                    let len = buf.len();
                    self.consume(len);
                }
            }
        }
        Ok(line)
    }
}

impl<T: BufRead> ByteProvider for T { }
