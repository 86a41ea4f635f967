use fixed::types::I32F32;

/// Fixed-point length quantized to thousandths of a millimetre. Every coordinate
/// that reaches a writer passes through `Pt`, so output text is identical on
/// every platform for the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f64(value: f64) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_f32(value: f32) -> Pt {
        Pt::from_f64(value as f64)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_f64(self) -> f64 {
        self.to_milli_i64() as f64 / 1000.0
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let milli = milli as i128;
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_add(rhs.to_milli_i64()))
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i64(self.to_milli_i64().saturating_sub(rhs.to_milli_i64()))
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli_i64(-self.to_milli_i64())
    }
}

/// Shortest decimal form of a value in thousandths: `1500` is `1.5`.
pub(crate) fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let (int_part, frac_part) = (abs / 1000, abs % 1000);
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:03}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

/// Formats through the same milli grid as [`Pt`], so `-0.0001` prints `0`.
pub(crate) fn fmt_num(value: f64) -> String {
    fmt_pt(Pt::from_f64(value))
}

/// Page dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn from_mm(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width: Pt::from_f64(width_mm),
            height: Pt::from_f64(height_mm),
        }
    }

    pub fn width_pt(self) -> f64 {
        self.width.to_f64() * MM_TO_PT
    }

    pub fn height_pt(self) -> f64 {
        self.height.to_f64() * MM_TO_PT
    }
}

pub const MM_TO_PT: f64 = 72.0 / 25.4;

/// A point in millimetres. Page space has its origin at the bottom-left corner
/// and y grows upward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle anchored at its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point, tolerance: f64) -> bool {
        point.x >= self.x - tolerance
            && point.x <= self.right() + tolerance
            && point.y >= self.y - tolerance
            && point.y <= self.top() + tolerance
    }

    pub fn contains_rect(&self, other: &Rect, tolerance: f64) -> bool {
        other.x >= self.x - tolerance
            && other.y >= self.y - tolerance
            && other.right() <= self.right() + tolerance
            && other.top() <= self.top() + tolerance
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on the
    /// top and bottom.
    pub fn expand(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    pub fn inset(&self, amount: f64) -> Rect {
        self.expand(-amount, -amount)
    }
}

/// Running bounding box over points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn include(&mut self, point: Point) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn within(&self, rect: &Rect, tolerance: f64) -> bool {
        self.is_empty()
            || (self.min_x >= rect.x - tolerance
                && self.min_y >= rect.y - tolerance
                && self.max_x <= rect.right() + tolerance
                && self.max_y <= rect.top() + tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
    };
    // X11 named colors, matching the overlay palette of the printed sheet.
    pub const LIGHT_PINK: Color = Color::rgb8(0xFF, 0xB6, 0xC1);
    pub const LIGHT_BLUE: Color = Color::rgb8(0xAD, 0xD8, 0xE6);
    pub const LIGHT_GRAY: Color = Color::rgb8(0xD3, 0xD3, 0xD3);
    pub const DARK_CYAN: Color = Color::rgb8(0x00, 0x8B, 0x8B);

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (channel(self.r), channel(self.g), channel(self.b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_quantizes_to_thousandths() {
        assert_eq!(Pt::from_f64(23.333333).to_milli_i64(), 23333);
        assert_eq!(Pt::from_f64(-179.25).to_milli_i64(), -179250);
        assert_eq!(Pt::from_f64(f64::NAN), Pt::ZERO);
        assert!((Pt::from_f64(43.5).to_f64() - 43.5).abs() < 1e-9);
    }

    #[test]
    fn pt_arithmetic_stays_on_the_milli_grid() {
        let a = Pt::from_f64(1.0005);
        let b = Pt::from_f64(2.25);
        assert_eq!((a + b).to_milli_i64(), a.to_milli_i64() + 2250);
        assert_eq!((b - a).to_milli_i64(), 2250 - a.to_milli_i64());
        assert_eq!((-b).to_milli_i64(), -2250);
    }

    #[test]
    fn milli_formatting_trims_zeros() {
        assert_eq!(format_milli(1500), "1.5");
        assert_eq!(format_milli(-179250), "-179.25");
        assert_eq!(format_milli(2000), "2");
        assert_eq!(format_milli(5), "0.005");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(0.2), "0.2");
    }

    #[test]
    fn rect_expand_and_contains() {
        let rect = Rect::new(10.0, 20.0, 5.0, 4.0);
        assert!(rect.contains(Point::new(15.0, 24.0), 0.0));
        assert!(!rect.contains(Point::new(15.5, 24.0), 0.0));
        let grown = rect.expand(0.5, 1.0);
        assert!(grown.contains(Point::new(15.5, 25.0), 0.0));
        assert!(grown.contains_rect(&rect, 0.0));
    }

    #[test]
    fn bounds_tracks_extremes() {
        let mut bounds = Bounds::empty();
        assert!(bounds.is_empty());
        bounds.include(Point::new(3.0, -1.0));
        bounds.include(Point::new(-2.0, 7.0));
        assert_eq!(bounds.min_x, -2.0);
        assert_eq!(bounds.max_y, 7.0);
        assert!(!bounds.within(&Rect::new(0.0, 0.0, 10.0, 10.0), 0.0));
    }

    #[test]
    fn named_colors_round_trip_to_bytes() {
        assert_eq!(Color::LIGHT_PINK.to_rgb8(), (0xFF, 0xB6, 0xC1));
        assert_eq!(Color::DARK_CYAN.to_rgb8(), (0x00, 0x8B, 0x8B));
        assert_eq!(Color::BLUE.to_rgb8(), (0, 0, 255));
    }
}
