//! In-memory PDF fixtures for unit tests. Offsets are computed while building, so the
//! fixtures stay valid when their object bodies are edited.

use std::io::Write;

use crate::base::types::*;

pub const CONTENT: &[u8] = b"BT /F1 24 Tf 72 720 Td (Hello) Tj ET";

struct Builder {
    out: Vec<u8>,
    entries: Vec<(ObjNum, ObjGen, Offset)>,
}

impl Builder {
    fn new() -> Self {
        Self { out: b"%PDF-1.4\n".to_vec(), entries: Vec::new() }
    }

    fn obj(&mut self, num: ObjNum, gen: ObjGen, body: &str) {
        self.entries.push((num, gen, self.out.len() as Offset));
        write!(self.out, "{num} {gen} obj\n{body}\nendobj\n").unwrap();
    }

    fn stream_obj(&mut self, num: ObjNum, dict: &str, data: &[u8]) {
        self.entries.push((num, 0, self.out.len() as Offset));
        write!(self.out, "{num} 0 obj\n{dict}\nstream\n").unwrap();
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish_table(mut self, root: ObjNum, size: ObjNum, prev: Option<Offset>) -> Vec<u8> {
        let xoff = self.out.len();
        let mut rows: Vec<(ObjNum, ObjGen, Offset, u8)> = self.entries.iter()
            .map(|&(num, gen, off)| (num, gen, off, b'n'))
            .collect();
        if prev.is_none() {
            rows.push((0, 65535, 0, b'f'));
        }
        rows.sort_by_key(|row| row.0);

        self.out.extend_from_slice(b"xref\n");
        let mut ix = 0;
        while ix < rows.len() {
            let mut end = ix + 1;
            while end < rows.len() && rows[end].0 == rows[end - 1].0 + 1 {
                end += 1;
            }
            writeln!(self.out, "{} {}", rows[ix].0, end - ix).unwrap();
            for &(_, gen, off, kind) in &rows[ix..end] {
                write!(self.out, "{off:010} {gen:05} {} \n", kind as char).unwrap();
            }
            ix = end;
        }
        let prev = prev.map(|off| format!(" /Prev {off}")).unwrap_or_default();
        write!(self.out, "trailer\n<< /Size {size} /Root {root} 0 R{prev} >>\n\
            startxref\n{xoff}\n%%EOF\n").unwrap();
        self.out
    }
}

/// A classic-table PDF built from the given `(num, gen, body)` objects.
pub fn build(objects: &[(ObjNum, ObjGen, &str)], root: ObjNum, size: ObjNum) -> Vec<u8> {
    let mut builder = Builder::new();
    for &(num, gen, body) in objects {
        builder.obj(num, gen, body);
    }
    builder.finish_table(root, size, None)
}

/// Appends an incremental revision (in the classic table form) to an existing fixture.
pub fn append_revision(existing: Vec<u8>, objects: &[(ObjNum, ObjGen, &str)],
        root: ObjNum, size: ObjNum) -> Vec<u8> {
    let prev = find_startxref(&existing);
    let mut builder = Builder { out: existing, entries: Vec::new() };
    for &(num, gen, body) in objects {
        builder.obj(num, gen, body);
    }
    builder.finish_table(root, size, Some(prev))
}

/// The `startxref` value of the (last) revision of `data`.
pub fn find_startxref(data: &[u8]) -> Offset {
    const SXREF: &[u8] = b"startxref";
    let pos = data.windows(SXREF.len())
        .rposition(|w| w == SXREF)
        .expect("startxref in fixture");
    std::str::from_utf8(&data[pos + SXREF.len()..])
        .expect("ASCII tail")
        .split_whitespace()
        .next()
        .expect("startxref value")
        .parse()
        .expect("numeric startxref value")
}

/// One Letter-sized page with a content stream, classic xref table.
pub fn minimal() -> Vec<u8> {
    let mut builder = Builder::new();
    builder.obj(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.obj(2, 0, "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>");
    builder.obj(3, 0, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
    builder.stream_obj(4, &format!("<< /Length {} >>", CONTENT.len()), CONTENT);
    builder.finish_table(1, 5, None)
}

fn xrow(data: &mut Vec<u8>, tpe: u8, f2: u64, f3: u16) {
    data.push(tpe);
    data.extend_from_slice(&u16::try_from(f2).unwrap().to_be_bytes());
    data.extend_from_slice(&f3.to_be_bytes());
}

/// The same single-page document, indexed by an uncompressed cross-reference stream
/// (`/W [1 2 2]`, no `/Index`).
pub fn xref_stream() -> Vec<u8> {
    let mut builder = Builder::new();
    builder.obj(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.obj(2, 0, "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>");
    builder.obj(3, 0, "<< /Type /Page /Parent 2 0 R >>");

    let xoff = builder.out.len() as Offset;
    let mut data = Vec::new();
    xrow(&mut data, 0, 0, 65535);
    for &(_, gen, off) in &builder.entries {
        xrow(&mut data, 1, off, gen);
    }
    xrow(&mut data, 1, xoff, 0);
    let dict = format!("<< /Type /XRef /Size 5 /W [ 1 2 2 ] /Root 1 0 R /Length {} >>", data.len());
    builder.stream_obj(4, &dict, &data);
    write!(builder.out, "startxref\n{xoff}\n%%EOF\n").unwrap();
    builder.out
}

/// A document whose catalog and page tree root live compressed in an object stream.
pub fn object_stream() -> Vec<u8> {
    let mut builder = Builder::new();
    builder.obj(3, 0, "<< /Type /Page /Parent 2 0 R >>");

    let first_obj = "<< /Type /Catalog /Pages 2 0 R >>";
    let second_obj = "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>";
    let header = format!("1 0 2 {} ", first_obj.len() + 1);
    let data = format!("{header}{first_obj} {second_obj}");
    let dict = format!("<< /Type /ObjStm /N 2 /First {} /Length {} >>", header.len(), data.len());
    builder.stream_obj(4, &dict, data.as_bytes());

    let page_off = builder.entries[0].2;
    let objstm_off = builder.entries[1].2;
    let xoff = builder.out.len() as Offset;
    let mut data = Vec::new();
    xrow(&mut data, 0, 0, 65535);
    xrow(&mut data, 2, 4, 0);
    xrow(&mut data, 2, 4, 1);
    xrow(&mut data, 1, page_off, 0);
    xrow(&mut data, 1, objstm_off, 0);
    xrow(&mut data, 1, xoff, 0);
    let dict = format!("<< /Type /XRef /Size 6 /W [ 1 2 2 ] /Root 1 0 R /Length {} >>", data.len());
    builder.stream_obj(5, &dict, &data);
    write!(builder.out, "startxref\n{xoff}\n%%EOF\n").unwrap();
    builder.out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref() {
        let data = minimal();
        let off = find_startxref(&data) as usize;
        assert_eq!(&data[off..off + 4], b"xref");
    }
}
