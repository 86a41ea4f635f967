use crate::encode::{Bitmap, Symbology};
use crate::text::{TextAlign, TextMeasure, layout_text_box};
use crate::types::{Bounds, Color, Point, Pt, Rect, Size};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotGroup {
    Barcode,
    Text,
    Qr,
    Logo,
    Cut,
    Helper,
    Grid,
}

impl SlotGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotGroup::Barcode => "barcode",
            SlotGroup::Text => "text",
            SlotGroup::Qr => "qr",
            SlotGroup::Logo => "logo",
            SlotGroup::Cut => "cut",
            SlotGroup::Helper => "helper",
            SlotGroup::Grid => "grid",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    SaveState,
    RestoreState,
    Translate(Pt, Pt),
    Rotate(f32),
    // Brackets the commands of one slot. Writers turn it into a group or a
    // marked-content section.
    BeginSlot {
        group: SlotGroup,
        id: String,
    },
    EndSlot,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    FillStroke,
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    // One laid-out line; `x`/`y` is the left end of the baseline.
    DrawString {
        x: Pt,
        y: Pt,
        width: Pt,
        text: String,
    },
    DrawBitmap {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        symbology: Symbology,
        bitmap: Arc<Bitmap>,
        background: Option<Color>,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Fill,
    Stroke,
    FillStroke,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathShape {
    Polyline { points: Vec<Point>, closed: bool },
    Rectangle { width: f64, height: f64 },
    RoundedRectangle { width: f64, height: f64, radius: f64 },
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f64(1.0),
            font_size: Pt::from_f64(12.0),
        }
    }
}

// Bezier handle length for a quarter circle.
const KAPPA: f64 = 0.552_284_749_8;

/// Records drawing commands in millimetre page space (y up). Rotated frames
/// and slot groups are only reachable through the scoped helpers, so every
/// page the canvas produces has balanced state and slot brackets.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Vec<Command>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    slot_depth: usize,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Vec::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            slot_depth: 0,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.push(Command::SaveState);
    }

    fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.push(Command::RestoreState);
        }
    }

    /// Runs `body` in a frame rotated by `degrees` around `pivot`. The frame is
    /// closed again whether `body` succeeds or fails.
    pub fn with_rotation<T, E>(
        &mut self,
        degrees: f64,
        pivot: Point,
        body: impl FnOnce(&mut Canvas) -> Result<T, E>,
    ) -> Result<T, E> {
        self.save_state();
        if degrees != 0.0 {
            let (px, py) = (Pt::from_f64(pivot.x), Pt::from_f64(pivot.y));
            self.current.push(Command::Translate(px, py));
            self.current
                .push(Command::Rotate(degrees.to_radians() as f32));
            self.current.push(Command::Translate(-px, -py));
        }
        let result = body(self);
        self.restore_state();
        result
    }

    pub fn with_slot<T, E>(
        &mut self,
        group: SlotGroup,
        id: impl Into<String>,
        body: impl FnOnce(&mut Canvas) -> Result<T, E>,
    ) -> Result<T, E> {
        self.current.push(Command::BeginSlot {
            group,
            id: id.into(),
        });
        self.slot_depth += 1;
        let result = body(self);
        self.slot_depth -= 1;
        self.current.push(Command::EndSlot);
        result
    }

    pub fn slot_depth(&self) -> usize {
        self.slot_depth
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: f64) {
        let width = Pt::from_f64(width.max(0.0));
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.push(Command::SetLineWidth(width));
    }

    pub fn set_font_size(&mut self, size: f64) {
        let size = Pt::from_f64(size);
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.push(Command::SetFontSize(size));
    }

    pub fn font_size(&self) -> f64 {
        self.current_state.font_size.to_f64()
    }

    fn move_to(&mut self, p: Point) {
        self.current.push(Command::MoveTo {
            x: Pt::from_f64(p.x),
            y: Pt::from_f64(p.y),
        });
    }

    fn line_to(&mut self, p: Point) {
        self.current.push(Command::LineTo {
            x: Pt::from_f64(p.x),
            y: Pt::from_f64(p.y),
        });
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.current.push(Command::CurveTo {
            x1: Pt::from_f64(c1.x),
            y1: Pt::from_f64(c1.y),
            x2: Pt::from_f64(c2.x),
            y2: Pt::from_f64(c2.y),
            x: Pt::from_f64(p.x),
            y: Pt::from_f64(p.y),
        });
    }

    /// Builds `shape` with its bottom-left corner (or first point offset) at
    /// `origin` and paints it.
    pub fn draw_path(&mut self, origin: Point, shape: &PathShape, paint: Paint) {
        match shape {
            PathShape::Polyline { points, closed } => {
                let mut iter = points.iter();
                let Some(first) = iter.next() else {
                    return;
                };
                self.move_to(first.offset(origin.x, origin.y));
                for p in iter {
                    self.line_to(p.offset(origin.x, origin.y));
                }
                if *closed {
                    self.current.push(Command::ClosePath);
                }
            }
            PathShape::Rectangle { width, height } => {
                if paint == Paint::Fill {
                    self.fill_rect(Rect::new(origin.x, origin.y, *width, *height));
                    return;
                }
                let (x0, y0) = (origin.x, origin.y);
                let (x1, y1) = (x0 + width, y0 + height);
                self.move_to(Point::new(x0, y0));
                self.line_to(Point::new(x1, y0));
                self.line_to(Point::new(x1, y1));
                self.line_to(Point::new(x0, y1));
                self.current.push(Command::ClosePath);
            }
            PathShape::RoundedRectangle {
                width,
                height,
                radius,
            } => {
                let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);
                let k = r * KAPPA;
                let (x0, y0) = (origin.x, origin.y);
                let (x1, y1) = (x0 + width, y0 + height);
                self.move_to(Point::new(x0 + r, y0));
                self.line_to(Point::new(x1 - r, y0));
                self.curve_to(
                    Point::new(x1 - r + k, y0),
                    Point::new(x1, y0 + r - k),
                    Point::new(x1, y0 + r),
                );
                self.line_to(Point::new(x1, y1 - r));
                self.curve_to(
                    Point::new(x1, y1 - r + k),
                    Point::new(x1 - r + k, y1),
                    Point::new(x1 - r, y1),
                );
                self.line_to(Point::new(x0 + r, y1));
                self.curve_to(
                    Point::new(x0 + r - k, y1),
                    Point::new(x0, y1 - r + k),
                    Point::new(x0, y1 - r),
                );
                self.line_to(Point::new(x0, y0 + r));
                self.curve_to(
                    Point::new(x0, y0 + r - k),
                    Point::new(x0 + r - k, y0),
                    Point::new(x0 + r, y0),
                );
                self.current.push(Command::ClosePath);
            }
        }
        self.current.push(match paint {
            Paint::Fill => Command::Fill,
            Paint::Stroke => Command::Stroke,
            Paint::FillStroke => Command::FillStroke,
        });
    }

    pub fn fill_rect(&mut self, rect: Rect) {
        self.current.push(Command::DrawRect {
            x: Pt::from_f64(rect.x),
            y: Pt::from_f64(rect.y),
            width: Pt::from_f64(rect.width),
            height: Pt::from_f64(rect.height),
        });
    }

    /// Wraps and aligns `text` inside `rect` at the current font size.
    /// Returns the number of lines that did not fit.
    pub fn draw_text_box(
        &mut self,
        rect: Rect,
        text: &str,
        align: TextAlign,
        padding: f64,
        measure: &dyn TextMeasure,
    ) -> usize {
        let layout = layout_text_box(&rect, text, align, self.font_size(), padding, measure);
        for line in layout.lines {
            self.current.push(Command::DrawString {
                x: Pt::from_f64(line.x),
                y: Pt::from_f64(line.baseline),
                width: Pt::from_f64(line.width),
                text: line.text,
            });
        }
        layout.truncated
    }

    pub fn draw_bitmap(
        &mut self,
        rect: Rect,
        symbology: Symbology,
        bitmap: Bitmap,
        background: Option<Color>,
    ) {
        self.current.push(Command::DrawBitmap {
            x: Pt::from_f64(rect.x),
            y: Pt::from_f64(rect.y),
            width: Pt::from_f64(rect.width),
            height: Pt::from_f64(rect.height),
            symbology,
            bitmap: Arc::new(bitmap),
            background,
        });
    }

    pub fn command_count(&self) -> usize {
        self.current.len()
    }

    pub fn show_page(&mut self) {
        let commands = std::mem::take(&mut self.current);
        self.pages.push(Page { commands });
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

/// Affine transform `[a b c d e f]` in PDF order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(x: f64, y: f64) -> Self {
        Matrix {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    /// Counter-clockwise rotation. Values within 1e-6 of 0, 1 or -1 snap to
    /// that value so quarter turns stay exact.
    pub fn rotate(radians: f32) -> Self {
        let angle = radians as f64;
        let snap = |v: f64| {
            let nearest = v.round();
            if (v - nearest).abs() < 1e-6 { nearest + 0.0 } else { v }
        };
        let (sin, cos) = (snap(libm::sin(angle)), snap(libm::cos(angle)));
        Matrix {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `local` applied first, then `self`.
    pub fn then_local(&self, local: &Matrix) -> Matrix {
        Matrix {
            a: local.a * self.a + local.b * self.c,
            b: local.a * self.b + local.b * self.d,
            c: local.c * self.a + local.d * self.c,
            d: local.c * self.b + local.d * self.d,
            e: local.e * self.a + local.f * self.c + self.e,
            f: local.e * self.b + local.f * self.d + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

impl Document {
    pub fn command_count(&self) -> usize {
        self.pages.iter().map(|p| p.commands.len()).sum()
    }

    /// `(group, id)` of every slot bracket in drawing order.
    pub fn slot_groups(&self) -> Vec<(SlotGroup, String)> {
        self.pages
            .iter()
            .flat_map(|p| p.commands.iter())
            .filter_map(|cmd| match cmd {
                Command::BeginSlot { group, id } => Some((*group, id.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count_slots(&self, group: SlotGroup) -> usize {
        self.slot_groups()
            .iter()
            .filter(|(g, _)| *g == group)
            .count()
    }

    /// Page-space box of all geometry on page `index`, with rotated frames
    /// undone.
    pub fn page_bounds(&self, index: usize) -> Bounds {
        let mut bounds = Bounds::empty();
        let Some(page) = self.pages.get(index) else {
            return bounds;
        };
        let mut ctm = Matrix::IDENTITY;
        let mut stack = Vec::new();
        let mut font_size = 12.0;
        let mut include = |ctm: &Matrix, x: Pt, y: Pt| {
            bounds.include(ctm.apply(Point::new(x.to_f64(), y.to_f64())));
        };
        for cmd in &page.commands {
            match cmd {
                Command::SaveState => stack.push((ctm, font_size)),
                Command::RestoreState => {
                    if let Some((saved, size)) = stack.pop() {
                        ctm = saved;
                        font_size = size;
                    }
                }
                Command::Translate(x, y) => {
                    ctm = ctm.then_local(&Matrix::translate(x.to_f64(), y.to_f64()));
                }
                Command::Rotate(angle) => ctm = ctm.then_local(&Matrix::rotate(*angle)),
                Command::SetFontSize(size) => font_size = size.to_f64(),
                Command::MoveTo { x, y } | Command::LineTo { x, y } => include(&ctm, *x, *y),
                Command::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => {
                    include(&ctm, *x1, *y1);
                    include(&ctm, *x2, *y2);
                    include(&ctm, *x, *y);
                }
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                }
                | Command::DrawBitmap {
                    x,
                    y,
                    width,
                    height,
                    ..
                } => {
                    include(&ctm, *x, *y);
                    include(&ctm, *x + *width, *y + *height);
                    include(&ctm, *x + *width, *y);
                    include(&ctm, *x, *y + *height);
                }
                Command::DrawString { x, y, width, .. } => {
                    let top = *y + Pt::from_f64(font_size * 0.75);
                    include(&ctm, *x, *y);
                    include(&ctm, *x + *width, top);
                    include(&ctm, *x + *width, *y);
                    include(&ctm, *x, top);
                }
                _ => {}
            }
        }
        bounds
    }

    pub fn fingerprint(&self) -> String {
        self.fingerprint_filtered(false)
    }

    /// Fingerprint that ignores everything inside `Cut` slots. Two sheets of
    /// the same certificate agree on it even when their cut lines differ.
    pub fn fingerprint_without_cuts(&self) -> String {
        self.fingerprint_filtered(true)
    }

    fn fingerprint_filtered(&self, skip_cuts: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}\n", self.page_size));
        for (index, page) in self.pages.iter().enumerate() {
            hasher.update(format!("page {index}\n"));
            let mut cut_depth = 0usize;
            for cmd in &page.commands {
                match cmd {
                    Command::BeginSlot {
                        group: SlotGroup::Cut,
                        ..
                    } if skip_cuts => {
                        cut_depth += 1;
                        continue;
                    }
                    Command::EndSlot if cut_depth > 0 => {
                        cut_depth -= 1;
                        continue;
                    }
                    _ if cut_depth > 0 => continue,
                    _ => {}
                }
                hash_command(&mut hasher, cmd);
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn hash_command(hasher: &mut Sha256, cmd: &Command) {
    match cmd {
        Command::DrawBitmap {
            x,
            y,
            width,
            height,
            symbology,
            bitmap,
            background,
        } => {
            hasher.update(format!(
                "bitmap {} {} {} {} {} {}x{} {:?}\n",
                x.to_milli_i64(),
                y.to_milli_i64(),
                width.to_milli_i64(),
                height.to_milli_i64(),
                symbology.as_str(),
                bitmap.columns(),
                bitmap.rows(),
                background.map(Color::to_rgb8)
            ));
            for row in 0..bitmap.rows() {
                let bits: Vec<u8> = (0..bitmap.columns())
                    .map(|col| bitmap.is_dark(col, row) as u8)
                    .collect();
                hasher.update(&bits);
            }
        }
        other => hasher.update(format!("{other:?}\n")),
    }
}

/// Concatenates the pages of several documents. All documents must share one
/// page size; the size of the first is kept.
pub fn merge_documents(documents: Vec<Document>) -> Option<Document> {
    let mut iter = documents.into_iter();
    let mut merged = iter.next()?;
    for doc in iter {
        merged.pages.extend(doc.pages);
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> Size {
        Size::from_mm(297.0, 210.0)
    }

    #[test]
    fn state_setters_skip_redundant_commands() {
        let mut canvas = Canvas::new(a4());
        canvas.set_fill_color(Color::BLUE);
        canvas.set_fill_color(Color::BLUE);
        canvas.set_line_width(0.2);
        canvas.set_line_width(0.2);
        assert_eq!(canvas.command_count(), 2);
    }

    #[test]
    fn rotation_restores_state_after_errors() {
        let mut canvas = Canvas::new(a4());
        let result: Result<(), &str> = canvas.with_rotation(-90.0, Point::ORIGIN, |c| {
            c.set_fill_color(Color::WHITE);
            Err("encoder failed")
        });
        assert!(result.is_err());
        let doc = canvas.finish();
        let commands = &doc.pages[0].commands;
        assert!(matches!(commands.first(), Some(Command::SaveState)));
        assert!(matches!(commands.last(), Some(Command::RestoreState)));
    }

    #[test]
    fn restored_state_is_deduplicated_against_the_saved_one() {
        let mut canvas = Canvas::new(a4());
        canvas.set_fill_color(Color::BLUE);
        canvas
            .with_rotation::<_, ()>(0.0, Point::ORIGIN, |c| {
                c.set_fill_color(Color::WHITE);
                Ok(())
            })
            .unwrap();
        let before = canvas.command_count();
        canvas.set_fill_color(Color::BLUE);
        assert_eq!(canvas.command_count(), before);
    }

    #[test]
    fn portrait_frame_bounds_map_back_to_the_page() {
        let mut canvas = Canvas::new(a4());
        canvas
            .with_rotation::<_, ()>(-90.0, Point::ORIGIN, |c| {
                c.fill_rect(Rect::new(-179.25, 43.5, 10.0, 20.0));
                Ok(())
            })
            .unwrap();
        let bounds = canvas.finish().page_bounds(0);
        assert!((bounds.min_x - 43.5).abs() < 1e-6);
        assert!((bounds.max_x - 63.5).abs() < 1e-6);
        assert!((bounds.min_y - 169.25).abs() < 1e-6);
        assert!((bounds.max_y - 179.25).abs() < 1e-6);
    }

    #[test]
    fn rounded_rectangle_stays_inside_its_box() {
        let mut canvas = Canvas::new(a4());
        canvas.draw_path(
            Point::new(10.0, 10.0),
            &PathShape::RoundedRectangle {
                width: 20.0,
                height: 5.0,
                radius: 1.0,
            },
            Paint::FillStroke,
        );
        let doc = canvas.finish();
        let bounds = doc.page_bounds(0);
        assert!(bounds.within(&Rect::new(10.0, 10.0, 20.0, 5.0), 1e-6));
        assert_eq!(
            doc.pages[0]
                .commands
                .iter()
                .filter(|c| matches!(c, Command::CurveTo { .. }))
                .count(),
            4
        );
    }

    #[test]
    fn slot_groups_are_listed_in_order() {
        let mut canvas = Canvas::new(a4());
        canvas
            .with_slot::<_, ()>(SlotGroup::Qr, "qr.a", |c| {
                assert_eq!(c.slot_depth(), 1);
                Ok(())
            })
            .unwrap();
        canvas
            .with_slot::<_, ()>(SlotGroup::Cut, "cut.left", |_| Ok(()))
            .unwrap();
        let doc = canvas.finish();
        assert_eq!(
            doc.slot_groups(),
            vec![
                (SlotGroup::Qr, "qr.a".to_string()),
                (SlotGroup::Cut, "cut.left".to_string())
            ]
        );
        assert_eq!(doc.count_slots(SlotGroup::Cut), 1);
    }

    #[test]
    fn fingerprint_without_cuts_ignores_cut_geometry() {
        let build = |offset: f64| {
            let mut canvas = Canvas::new(a4());
            canvas.fill_rect(Rect::new(1.0, 1.0, 2.0, 2.0));
            canvas
                .with_slot::<_, ()>(SlotGroup::Cut, "cut.left", |c| {
                    c.draw_path(
                        Point::ORIGIN,
                        &PathShape::Polyline {
                            points: vec![Point::new(offset, 0.0), Point::new(5.0, 5.0)],
                            closed: false,
                        },
                        Paint::Stroke,
                    );
                    Ok(())
                })
                .unwrap();
            canvas.finish()
        };
        let a = build(1.0);
        let b = build(2.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint_without_cuts(), b.fingerprint_without_cuts());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn merge_keeps_page_order() {
        let mut first = Canvas::new(a4());
        first.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        let mut second = Canvas::new(a4());
        second.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0));
        let merged = merge_documents(vec![first.finish(), second.finish()]).unwrap();
        assert_eq!(merged.pages.len(), 2);
        assert!(merge_documents(Vec::new()).is_none());
    }

    #[test]
    fn quarter_turn_matrix_is_exact() {
        let m = Matrix::rotate((-90.0f64).to_radians() as f32);
        let p = m.apply(Point::new(-120.0, 50.0));
        assert_eq!((p.x, p.y), (50.0, 120.0));
    }

    #[test]
    fn every_quarter_turn_has_unit_entries() {
        for (degrees, expected) in [
            (90.0f64, (0.0, 1.0, -1.0, 0.0)),
            (180.0, (-1.0, 0.0, 0.0, -1.0)),
            (270.0, (0.0, -1.0, 1.0, 0.0)),
            (-90.0, (0.0, -1.0, 1.0, 0.0)),
        ] {
            let m = Matrix::rotate(degrees.to_radians() as f32);
            assert_eq!((m.a, m.b, m.c, m.d), expected, "rotation by {degrees}");
        }
        let m = Matrix::rotate(30.0f64.to_radians() as f32);
        assert!((m.a - 3.0f64.sqrt() / 2.0).abs() < 1e-6);
        assert!(m.a < 1.0 && m.b > 0.49 && m.b < 0.51);
    }

    #[test]
    fn rotated_frame_bounds_land_on_whole_millimetres() {
        let mut canvas = Canvas::new(a4());
        canvas
            .with_rotation::<_, ()>(-90.0, Point::ORIGIN, |c| {
                c.fill_rect(Rect::new(-120.0, 50.0, 20.0, 10.0));
                Ok(())
            })
            .unwrap();
        let bounds = canvas.finish().page_bounds(0);
        assert!(bounds.within(&Rect::new(50.0, 100.0, 10.0, 20.0), 0.0));
        assert!(!bounds.within(&Rect::new(50.0, 100.0, 10.0, 19.999), 0.0));
    }
}
