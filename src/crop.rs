use std::str::FromStr;

use crate::base::*;

/// The default page size mandated when no `/MediaBox` is found anywhere in a page's
/// ancestry: US Letter.
pub const LETTER: Rect = Rect { llx: 0., lly: 0., urx: 612., ury: 792. };

/// An axis-aligned rectangle in PDF user-space units (1/72 inch).
///
/// Always kept normalized: `llx <= urx`, `lly <= ury`. Sources producing corners in the
/// opposite order are accepted and swapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
        Rect {
            llx: x1.min(x2),
            lly: y1.min(y2),
            urx: x1.max(x2),
            ury: y1.max(y2)
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// True for rectangles of zero area, the convention for "nothing detected on this page".
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0. || self.height() <= 0.
    }

    /// Comparison up to a tolerance well below anything visible (10⁻⁴ pt).
    pub fn approx_eq(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-4;
        (self.llx - other.llx).abs() < EPS
            && (self.lly - other.lly).abs() < EPS
            && (self.urx - other.urx).abs() < EPS
            && (self.ury - other.ury).abs() < EPS
    }

    /// Reads a rectangle from the four numbers of a (fully resolved) PDF box array.
    pub fn from_array(arr: &[Object]) -> Option<Rect> {
        match arr {
            [a, b, c, d] => Some(Rect::new(
                a.real_value()?,
                b.real_value()?,
                c.real_value()?,
                d.real_value()?
            )),
            _ => None
        }
    }

    /// Serializes into a PDF box array, using integers where exact.
    pub fn to_object(&self) -> Object {
        Object::Array([self.llx, self.lly, self.urx, self.ury]
            .map(|v| Object::Number(Number::from_f64(v)))
            .to_vec())
    }

    /// Rotates this rectangle's corners about the center of `bounds` by the page rotation
    /// (a multiple of 90°) and re-normalizes. For axis-aligned rectangles the direction of
    /// the turn does not matter: both give the same normalized result.
    pub fn rotate_within(&self, bounds: &Rect, rotate: i32) -> Rect {
        let cx = (bounds.llx + bounds.urx) / 2.;
        let cy = (bounds.lly + bounds.ury) / 2.;
        let turn = |x: f64, y: f64| match rotate.rem_euclid(360) {
            90 => (cx + (y - cy), cy - (x - cx)),
            180 => (2. * cx - x, 2. * cy - y),
            270 => (cx - (y - cy), cy + (x - cx)),
            _ => (x, y)
        };
        let (x1, y1) = turn(self.llx, self.lly);
        let (x2, y2) = turn(self.urx, self.ury);
        Rect::new(x1, y1, x2, y2)
    }

    /// Grows each edge outwards by the given margins.
    pub fn expand(&self, margins: &Margins) -> Rect {
        Rect::new(
            self.llx - margins.left,
            self.lly - margins.bottom,
            self.urx + margins.right,
            self.ury + margins.top
        )
    }

    /// Clips to `bounds`. May come out degenerate if the two do not overlap.
    pub fn clamp_to(&self, bounds: &Rect) -> Rect {
        Rect {
            llx: self.llx.clamp(bounds.llx, bounds.urx),
            lly: self.lly.clamp(bounds.lly, bounds.ury),
            urx: self.urx.clamp(bounds.llx, bounds.urx),
            ury: self.ury.clamp(bounds.lly, bounds.ury)
        }
    }
}

/// Padding added around a detected bounding box, one value per edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64
}

impl Margins {
    pub fn uniform(pts: f64) -> Margins {
        Margins { left: pts, bottom: pts, right: pts, top: pts }
    }

    pub fn none() -> Margins {
        Margins::uniform(0.)
    }
}

impl FromStr for Margins {
    type Err = String;

    /// Accepts one to four space-separated values. Missing values are filled in by
    /// mirroring the opposite edge: `"a"` → (a,a,a,a), `"a b"` → (a,b,a,b),
    /// `"a b c"` → (a,b,c,b).
    fn from_str(s: &str) -> Result<Margins, String> {
        let mut vals = s.split_whitespace()
            .map(|part| part.parse::<f64>()
                .map_err(|_| format!("invalid margin value: {part}")))
            .collect::<Result<Vec<_>, _>>()?;
        if vals.is_empty() || vals.len() > 4 {
            return Err("expected 1 to 4 margin values".to_owned());
        }
        if vals.iter().any(|v| *v < 0.) {
            return Err("margins must be non-negative".to_owned());
        }
        while vals.len() < 4 {
            vals.push(vals[vals.len().saturating_sub(2)]);
        }
        let &[left, bottom, right, top] = &vals[..] else { unreachable!() };
        Ok(Margins { left, bottom, right, top })
    }
}

/// Turns a raw detected bounding box into the `/CropBox` to write for one page.
///
/// `effective` is the box the page currently displays (its effective CropBox, falling back
/// to the MediaBox); `raw` is the detector's output in the unrotated rendering's point
/// space. The result is padded by `margins` and clipped so the crop never grows the page.
/// A degenerate `raw` (blank page, failed detection) leaves the geometry as it is.
pub fn plan_crop(effective: Rect, rotate: i32, raw: Rect, margins: &Margins) -> Rect {
    if raw.is_degenerate() {
        return effective;
    }
    let mapped = raw.rotate_within(&effective, rotate);
    let clamped = mapped.expand(margins).clamp_to(&effective);
    if clamped.is_degenerate() {
        log::warn!("Bounding box {raw:?} lies outside the page, keeping {effective:?}.");
        return effective;
    }
    clamped
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let rect = Rect::new(90., 190., 10., 10.);
        assert_eq!(rect, Rect { llx: 10., lly: 10., urx: 90., ury: 190. });
        assert_eq!(rect.width(), 80.);
        assert_eq!(rect.height(), 180.);
        assert!(!rect.is_degenerate());
        assert!(Rect::new(5., 5., 5., 80.).is_degenerate());
    }

    #[test]
    fn test_from_array() {
        let arr = vec![
            Object::Number(Number::Int(0)),
            Object::Number(Number::Real(0.5)),
            Object::Number(Number::Int(612)),
            Object::Number(Number::Int(792)),
        ];
        assert_eq!(Rect::from_array(&arr), Some(Rect::new(0., 0.5, 612., 792.)));
        assert_eq!(Rect::from_array(&arr[..3]), None);
        assert_eq!(Rect::from_array(&[arr[0].clone(), arr[1].clone(), arr[2].clone(), Object::Null]), None);
    }

    #[test]
    fn test_to_object() {
        assert_eq!(format!("{}", Rect::new(0., 10.5, 612., 792.).to_object()),
            "[ 0 10.5 612 792 ]");
    }

    #[test]
    fn test_rotation_mapping() {
        // the worked example: (10,10,90,190) on a (0,0,100,200) page turned 90°
        let page = Rect::new(0., 0., 100., 200.);
        let raw = Rect::new(10., 10., 90., 190.);
        let mapped = raw.rotate_within(&page, 90);
        assert!(mapped.approx_eq(&Rect::new(-40., 60., 140., 140.)));
        assert_eq!(plan_crop(page, 90, raw, &Margins::none()), Rect::new(0., 60., 100., 140.));

        // 180° stays within the page
        let mapped = raw.rotate_within(&page, 180);
        assert!(mapped.approx_eq(&Rect::new(10., 10., 90., 190.)));
        // 270° matches 90° after normalization
        assert!(raw.rotate_within(&page, 270).approx_eq(&raw.rotate_within(&page, 90)));
        // rotation values wrap
        assert!(raw.rotate_within(&page, 450).approx_eq(&raw.rotate_within(&page, 90)));
        assert!(raw.rotate_within(&page, -90).approx_eq(&raw.rotate_within(&page, 270)));
    }

    #[test]
    fn test_plan_margins_and_clamp() {
        let page = Rect::new(0., 0., 612., 792.);
        let raw = Rect::new(100., 100., 500., 700.);
        let planned = plan_crop(page, 0, raw, &Margins::uniform(10.));
        assert_eq!(planned, Rect::new(90., 90., 510., 710.));
        // margins never push past the page
        let planned = plan_crop(page, 0, Rect::new(2., 2., 610., 790.), &Margins::uniform(36.));
        assert_eq!(planned, page);
    }

    #[test]
    fn test_plan_degenerate() {
        let page = Rect::new(0., 0., 612., 792.);
        let empty = Rect::new(0., 0., 0., 0.);
        assert_eq!(plan_crop(page, 0, empty, &Margins::uniform(10.)), page);
        // a box entirely off the page also keeps the old geometry
        assert_eq!(plan_crop(page, 0, Rect::new(-50., -50., -10., -10.), &Margins::none()), page);
    }

    #[test]
    fn test_margins_parse() {
        assert_eq!("12".parse::<Margins>().unwrap(), Margins::uniform(12.));
        assert_eq!("1 2".parse::<Margins>().unwrap(),
            Margins { left: 1., bottom: 2., right: 1., top: 2. });
        assert_eq!("1 2 3".parse::<Margins>().unwrap(),
            Margins { left: 1., bottom: 2., right: 3., top: 2. });
        assert_eq!("1 2 3 4".parse::<Margins>().unwrap(),
            Margins { left: 1., bottom: 2., right: 3., top: 4. });
        assert!("".parse::<Margins>().is_err());
        assert!("1 2 3 4 5".parse::<Margins>().is_err());
        assert!("-3".parse::<Margins>().is_err());
        assert!("abc".parse::<Margins>().is_err());
    }
}
