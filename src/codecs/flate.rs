use std::io::{Read, BufRead, BufReader};

use flate2::bufread::ZlibDecoder;

use crate::base::{Dict, ParseError};

pub fn decode<'a, R: BufRead + 'a>(input: R, params: Option<&Dict>)
        -> Result<Box<dyn BufRead + 'a>, ParseError> {
    let params = params.cloned().unwrap_or_default();
    match params.lookup(b"Predictor").num_value() {
        None | Some(1) => Ok(Box::new(BufReader::new(ZlibDecoder::new(input)))),
        Some(10..=15) => Ok(Box::new(PngDecode::new(
            ZlibDecoder::new(input),
            params.lookup(b"Columns").num_value().unwrap_or(1),
        ))),
        _ => Err(ParseError::Malformed("unimplemented predictor"))
    }
}

/// Undoes PNG row predictors (the kind cross-reference streams are routinely written with).
/// Rows are `cols` bytes wide, each preceded by a one-byte predictor tag.
struct PngDecode<R: Read> {
    input: R,
    cols: usize,
    prev_row: Vec<u8>,
    index: usize
}

impl<R: Read> PngDecode<R> {
    fn new(input: R, cols: usize) -> Self {
        PngDecode { input, cols, prev_row: Vec::new(), index: 0 }
    }

    fn read_row(&mut self) -> std::io::Result<&[u8]> {
        let mut enc_row = vec![0; 1 + self.cols];
        if let Err(err) = self.input.read_exact(&mut enc_row) {
            return match err.kind() {
                std::io::ErrorKind::UnexpectedEof => Ok(&[]),
                _ => Err(err)
            };
        }
        let (&tag, in_row) = enc_row.split_first()
            .unwrap_or((&0, &[])); // size >= 1 always
        let mut prev_row = std::mem::take(&mut self.prev_row);
        if prev_row.is_empty() {
            prev_row.resize(self.cols, 0);
        }
        let new_row = &mut self.prev_row;
        match tag {
            0 => new_row.extend_from_slice(in_row),
            1 => {
                let mut out_val = 0u8;
                for in_val in in_row {
                    out_val = out_val.wrapping_add(*in_val);
                    new_row.push(out_val);
                }
            },
            2 => {
                for (up_val, in_val) in std::iter::zip(prev_row, in_row) {
                    new_row.push(up_val.wrapping_add(*in_val));
                }
            },
            _ => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData,
                format!("PNG predictor tag {tag} not supported")))
        }
        self.index = 0;
        Ok(&self.prev_row)
    }
}

impl<R: Read> BufRead for PngDecode<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.index < self.prev_row.len() {
            Ok(&self.prev_row[self.index..])
        } else {
            self.read_row()
        }
    }

    fn consume(&mut self, amt: usize) {
        self.index += amt;
    }
}

impl<R: Read> Read for PngDecode<R> {
    fn read(&mut self, out_buf: &mut [u8]) -> std::io::Result<usize> {
        let mut done = 0;
        while done < out_buf.len() {
            let in_buf = match self.fill_buf() {
                Ok([]) => break,
                Ok(buf) => buf,
                Err(err) if done == 0 => return Err(err),
                Err(_) => break
            };
            let chunk = std::cmp::min(in_buf.len(), out_buf.len() - done);
            out_buf[done..done + chunk].copy_from_slice(&in_buf[..chunk]);
            self.consume(chunk);
            done += chunk;
        }
        Ok(done)
    }
}
