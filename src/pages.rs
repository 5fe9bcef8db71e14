use std::collections::HashSet;
use std::io::{BufRead, Seek};

use crate::base::*;
use crate::crop::{Rect, LETTER};
use crate::reader::Document;

/// A leaf of the page tree with its effective (inherited) display attributes.
///
/// `media_box` and `rotate` always carry a value: the nearest ancestor's, or the
/// specification's default where the whole ancestry is silent. `crop_box` stays `None` when
/// neither the page nor any ancestor sets one.
#[derive(Debug)]
pub struct Page {
    pub oref: ObjRef,
    /// The page's own dictionary, as stored in the file.
    pub dict: Dict,
    pub media_box: Rect,
    pub crop_box: Option<Rect>,
    /// Display rotation, normalized into {0, 90, 180, 270}.
    pub rotate: i32,
}

impl Page {
    /// The box the page currently displays.
    pub fn effective_box(&self) -> Rect {
        self.crop_box.unwrap_or(self.media_box)
    }
}

/// Walks `/Root → /Pages` depth-first and returns the document's pages in display order.
///
/// Attribute inheritance follows the page tree: a node's own `/MediaBox`, `/CropBox` and
/// `/Rotate` override the inherited values for its whole subtree. A node referring back to a
/// visited one fails with [`ParseError::CyclicPageTree`] instead of looping.
pub fn enumerate_pages<T: BufRead + Seek>(doc: &Document<T>) -> Result<Vec<Page>, ParseError> {
    let catalog = doc.catalog()?;
    let root = catalog.lookup(b"Pages").as_objref()
        .ok_or(ParseError::Malformed("catalog has no /Pages"))?;
    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    walk(doc, root, Inherited::default(), &mut visited, &mut pages)?;
    Ok(pages)
}

#[derive(Clone, Copy, Default)]
struct Inherited {
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    rotate: Option<i64>,
}

fn walk<T: BufRead + Seek>(doc: &Document<T>, oref: &ObjRef, mut inherited: Inherited,
        visited: &mut HashSet<ObjRef>, pages: &mut Vec<Page>) -> Result<(), ParseError> {
    if !visited.insert(*oref) {
        return Err(ParseError::CyclicPageTree(*oref));
    }
    let dict = doc.resolve_ref(oref)?
        .into_dict()
        .ok_or(ParseError::Malformed("page tree node is not a dictionary"))?;

    if let Some(rect) = box_entry(doc, &dict, b"MediaBox")? {
        inherited.media_box = Some(rect);
    }
    if let Some(rect) = box_entry(doc, &dict, b"CropBox")? {
        inherited.crop_box = Some(rect);
    }
    if let Some(rot) = doc.resolve_obj(dict.lookup(b"Rotate").to_owned())?.num_value() {
        inherited.rotate = Some(rot);
    }

    let node_type = dict.lookup(b"Type").as_name().map(|name| name.as_slice().to_owned());
    match node_type.as_deref() {
        Some(b"Pages") | None => {
            let kids = doc.resolve_obj(dict.lookup(b"Kids").to_owned())?
                .into_array()
                .ok_or(ParseError::Malformed("/Kids is not an array"))?;
            for kid in &kids {
                let kid = kid.as_objref()
                    .ok_or(ParseError::Malformed("/Kids entry is not a reference"))?;
                walk(doc, kid, inherited, visited, pages)?;
            }
        },
        Some(b"Page") => pages.push(Page {
            oref: *oref,
            dict,
            media_box: inherited.media_box.unwrap_or(LETTER),
            crop_box: inherited.crop_box,
            rotate: normalize_rotation(inherited.rotate.unwrap_or(0)),
        }),
        Some(_) => return Err(ParseError::Malformed("unexpected page tree node type"))
    }
    Ok(())
}

fn box_entry<T: BufRead + Seek>(doc: &Document<T>, dict: &Dict, key: &[u8])
        -> Result<Option<Rect>, ParseError> {
    match doc.resolve_deep(dict.lookup(key).to_owned())? {
        Object::Array(arr) => Rect::from_array(&arr)
            .map(Some)
            .ok_or(ParseError::Malformed("malformed box array")),
        Object::Null => Ok(None),
        _ => Err(ParseError::Malformed("box entry is not an array"))
    }
}

fn normalize_rotation(rot: i64) -> i32 {
    let rot = rot.rem_euclid(360) as i32;
    if rot % 90 == 0 {
        rot
    } else {
        log::warn!("Ignoring /Rotate {rot}, not a multiple of 90.");
        0
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testpdf;
    use std::io::Cursor;

    fn load(data: Vec<u8>) -> Document<Cursor<Vec<u8>>> {
        Document::load(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_single_page() {
        let doc = load(testpdf::minimal());
        let pages = enumerate_pages(&doc).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].oref, ObjRef { num: 3, gen: 0 });
        // inherited from the root /Pages node
        assert_eq!(pages[0].media_box, Rect::new(0., 0., 612., 792.));
        assert_eq!(pages[0].crop_box, None);
        assert_eq!(pages[0].rotate, 0);
    }

    #[test]
    fn test_inheritance_and_overrides() {
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, 0, "<< /Type /Pages /Kids [ 3 0 R 4 0 R 6 0 R ] /Count 3 \
                /MediaBox [ 0 0 100 200 ] /Rotate 90 >>"),
            // inherits everything
            (3, 0, "<< /Type /Page /Parent 2 0 R >>"),
            // an intermediate node overriding the rotation
            (4, 0, "<< /Type /Pages /Parent 2 0 R /Kids [ 5 0 R ] /Count 1 /Rotate 180 >>"),
            (5, 0, "<< /Type /Page /Parent 4 0 R /CropBox [ 5 5 95 195 ] >>"),
            // overrides the box, coordinates via an indirect number
            (6, 0, "<< /Type /Page /Parent 2 0 R /MediaBox [ 0 0 7 0 R 400 ] >>"),
            (7, 0, "300"),
        ], 1, 8));
        let pages = enumerate_pages(&doc).unwrap();
        assert_eq!(pages.len(), 3);

        assert_eq!(pages[0].media_box, Rect::new(0., 0., 100., 200.));
        assert_eq!(pages[0].rotate, 90);
        assert_eq!(pages[0].effective_box(), Rect::new(0., 0., 100., 200.));

        assert_eq!(pages[1].oref, ObjRef { num: 5, gen: 0 });
        assert_eq!(pages[1].rotate, 180);
        assert_eq!(pages[1].crop_box, Some(Rect::new(5., 5., 95., 195.)));
        assert_eq!(pages[1].effective_box(), Rect::new(5., 5., 95., 195.));

        assert_eq!(pages[2].media_box, Rect::new(0., 0., 300., 400.));
        assert_eq!(pages[2].rotate, 90);
    }

    #[test]
    fn test_default_letter() {
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, 0, "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>"),
            (3, 0, "<< /Type /Page /Parent 2 0 R >>"),
        ], 1, 4));
        let pages = enumerate_pages(&doc).unwrap();
        assert_eq!(pages[0].media_box, LETTER);
        assert_eq!(pages[0].rotate, 0);
    }

    #[test]
    fn test_odd_rotation() {
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, 0, "<< /Type /Pages /Kids [ 3 0 R 4 0 R ] /Count 2 >>"),
            (3, 0, "<< /Type /Page /Parent 2 0 R /Rotate 45 >>"),
            (4, 0, "<< /Type /Page /Parent 2 0 R /Rotate -90 >>"),
        ], 1, 5));
        let pages = enumerate_pages(&doc).unwrap();
        assert_eq!(pages[0].rotate, 0);
        assert_eq!(pages[1].rotate, 270);
    }

    #[test]
    fn test_cyclic_tree() {
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, 0, "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 >>"),
            (3, 0, "<< /Type /Pages /Parent 2 0 R /Kids [ 2 0 R ] /Count 1 >>"),
        ], 1, 4));
        assert!(matches!(enumerate_pages(&doc), Err(ParseError::CyclicPageTree(_))));
    }

    #[test]
    fn test_missing_root() {
        // trailer /Root pointing at a number that was never written
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 2 0 R >>"),
        ], 5, 6));
        assert!(matches!(enumerate_pages(&doc), Err(ParseError::MissingRoot)));
    }

    #[test]
    fn test_dangling_pages() {
        let doc = load(testpdf::build(&[
            (1, 0, "<< /Type /Catalog /Pages 9 0 R >>"),
        ], 1, 2));
        assert!(matches!(enumerate_pages(&doc), Err(ParseError::DanglingReference(_))));
    }
}
