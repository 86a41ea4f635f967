use crate::canvas::{Command, Document, Matrix};
use crate::error::ChirographError;
use crate::font::FontRegistry;
use crate::pdf::module_rects;
use crate::svg::single_page;
use crate::types::{Color, Pt};
use tiny_skia::{
    FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform,
};
use ttf_parser::OutlineBuilder;

pub const DEFAULT_DPI: u32 = 150;

#[derive(Clone)]
struct RasterState {
    transform: Transform,
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f64(1.0),
            font_size: Pt::from_f64(12.0),
        }
    }
}

/// Rasterizes a single-page document to PNG on a white background. Text is
/// filled from the outlines of the primary registered font; without one it is
/// left out.
pub fn document_to_png(
    document: &Document,
    fonts: &FontRegistry,
    dpi: u32,
) -> Result<Vec<u8>, ChirographError> {
    let page = single_page(document, "png")
        .map_err(|err| ChirographError::RenderBackend(err.to_string()))?;
    let dpi = if dpi == 0 { DEFAULT_DPI } else { dpi };
    let width_px = mm_milli_to_px_u32(document.page_size.width.to_milli_i64(), dpi)?;
    let height_px = mm_milli_to_px_u32(document.page_size.height.to_milli_i64(), dpi)?;
    let scale = dpi as f32 / 25.4;
    let base_transform = Transform::from_row(scale, 0.0, 0.0, -scale, 0.0, height_px as f32);

    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        ChirographError::RenderBackend(format!(
            "invalid raster size {width_px}x{height_px} at {dpi} DPI"
        ))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let face = fonts.primary().and_then(|font| font.face());
    let mut state = RasterState::default();
    let mut stack: Vec<RasterState> = Vec::new();
    let mut path_builder = PathBuilder::new();
    let mut has_path = false;
    let mut skipped_text = 0usize;

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => stack.push(state.clone()),
            Command::RestoreState => {
                if let Some(prev) = stack.pop() {
                    state = prev;
                }
            }
            Command::Translate(x, y) => {
                state.transform = state
                    .transform
                    .pre_concat(Transform::from_translate(x.to_f32(), y.to_f32()));
            }
            Command::Rotate(angle) => {
                let m = Matrix::rotate(*angle);
                state.transform = state.transform.pre_concat(Transform::from_row(
                    m.a as f32, m.b as f32, m.c as f32, m.d as f32, 0.0, 0.0,
                ));
            }
            Command::BeginSlot { .. } | Command::EndSlot => {}
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetStrokeColor(color) => state.stroke_color = *color,
            Command::SetLineWidth(width) => state.line_width = *width,
            Command::SetFontSize(size) => state.font_size = *size,
            Command::MoveTo { x, y } => {
                path_builder.move_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::LineTo { x, y } => {
                path_builder.line_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                path_builder.cubic_to(
                    x1.to_f32(),
                    y1.to_f32(),
                    x2.to_f32(),
                    y2.to_f32(),
                    x.to_f32(),
                    y.to_f32(),
                );
                has_path = true;
            }
            Command::ClosePath => path_builder.close(),
            Command::Fill | Command::Stroke | Command::FillStroke => {
                let Some(path) = take_path(&mut path_builder, &mut has_path) else {
                    continue;
                };
                let transform = base_transform.pre_concat(state.transform);
                if !matches!(cmd, Command::Stroke) {
                    pixmap.fill_path(
                        &path,
                        &paint_for(state.fill_color),
                        FillRule::Winding,
                        transform,
                        None,
                    );
                }
                if !matches!(cmd, Command::Fill) {
                    pixmap.stroke_path(
                        &path,
                        &paint_for(state.stroke_color),
                        &build_stroke(&state),
                        transform,
                        None,
                    );
                }
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                if let Some(rect) =
                    Rect::from_xywh(x.to_f32(), y.to_f32(), width.to_f32(), height.to_f32())
                {
                    pixmap.fill_rect(
                        rect,
                        &paint_for(state.fill_color),
                        base_transform.pre_concat(state.transform),
                        None,
                    );
                }
            }
            Command::DrawString { x, y, text, .. } => {
                let Some(face) = face.as_ref() else {
                    skipped_text += 1;
                    continue;
                };
                if let Some(path) = glyph_run_path(face, text, x.to_f32(), y.to_f32(), state.font_size.to_f32()) {
                    pixmap.fill_path(
                        &path,
                        &paint_for(state.fill_color),
                        FillRule::Winding,
                        base_transform.pre_concat(state.transform),
                        None,
                    );
                }
            }
            Command::DrawBitmap {
                x,
                y,
                width,
                height,
                bitmap,
                background,
                ..
            } => {
                let transform = base_transform.pre_concat(state.transform);
                if let Some(color) = background {
                    if let Some(rect) =
                        Rect::from_xywh(x.to_f32(), y.to_f32(), width.to_f32(), height.to_f32())
                    {
                        pixmap.fill_rect(rect, &paint_for(*color), transform, None);
                    }
                }
                let mut modules = PathBuilder::new();
                for (mx, my, mw, mh) in
                    module_rects(bitmap, x.to_f64(), y.to_f64(), width.to_f64(), height.to_f64())
                {
                    if let Some(rect) = Rect::from_xywh(mx as f32, my as f32, mw as f32, mh as f32) {
                        modules.push_rect(rect);
                    }
                }
                if let Some(path) = modules.finish() {
                    let mut paint = paint_for(Color::BLACK);
                    // Anti-aliased module edges leave gray seams between runs.
                    paint.anti_alias = false;
                    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                }
            }
        }
    }
    if skipped_text > 0 {
        tracing::debug!(skipped_text, "png: no registered font, text left out");
    }

    pixmap
        .encode_png()
        .map_err(|err| ChirographError::RenderBackend(format!("png encode failed: {err}")))
}

// Builds one path for all glyphs of `text` with the pen starting at `(x, y)`
// on the baseline, in the same millimetre units as the other commands.
fn glyph_run_path(
    face: &ttf_parser::Face<'_>,
    text: &str,
    x: f32,
    y: f32,
    font_size: f32,
) -> Option<Path> {
    let scale = font_size / face.units_per_em().max(1) as f32;
    let mut builder = GlyphPathBuilder::new(x, y, scale);
    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            builder.origin_x += font_size * 0.5;
            continue;
        };
        face.outline_glyph(gid, &mut builder);
        let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32;
        builder.origin_x += advance * scale;
    }
    builder.finish()
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y + y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn take_path(path_builder: &mut PathBuilder, has_path: &mut bool) -> Option<Path> {
    if !*has_path {
        return None;
    }
    *has_path = false;
    let builder = std::mem::replace(path_builder, PathBuilder::new());
    builder.finish()
}

fn build_stroke(state: &RasterState) -> Stroke {
    Stroke {
        width: state.line_width.to_f32().max(0.0),
        line_cap: LineCap::Butt,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    let (r, g, b) = color.to_rgb8();
    tiny_skia::Color::from_rgba8(r, g, b, 255)
}

fn mm_milli_to_px_u32(mm_milli: i64, dpi: u32) -> Result<u32, ChirographError> {
    let px = mm_milli_to_px_i64(mm_milli, dpi);
    if px <= 0 {
        return Err(ChirographError::RenderBackend(format!(
            "invalid non-positive pixel dimension {px} for mm_milli={mm_milli} dpi={dpi}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        ChirographError::RenderBackend(format!(
            "pixel dimension out of range: {px} for mm_milli={mm_milli} dpi={dpi}"
        ))
    })
}

// Rounds half away from zero.
fn mm_milli_to_px_i64(mm_milli: i64, dpi: u32) -> i64 {
    let num = (mm_milli as i128).saturating_mul(dpi as i128);
    let den = 25_400_i128;
    let px = if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    };
    px.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, SlotGroup};
    use crate::encode::{Bitmap, Symbology};
    use crate::types::{Point, Rect as MmRect, Size};

    fn decode(png: &[u8]) -> image::RgbaImage {
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    #[test]
    fn pixel_size_follows_dpi() {
        assert_eq!(mm_milli_to_px_i64(297_000, 150), 1754);
        assert_eq!(mm_milli_to_px_i64(210_000, 150), 1240);
        assert_eq!(mm_milli_to_px_i64(25_400, 72), 72);
        assert_eq!(mm_milli_to_px_i64(-25_400, 72), -72);
        let doc = Canvas::new(Size::from_mm(297.0, 210.0)).finish();
        let img = decode(&document_to_png(&doc, &FontRegistry::new(), 72).unwrap());
        assert_eq!((img.width(), img.height()), (842, 595));
    }

    #[test]
    fn y_axis_points_up() {
        let mut canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        canvas.set_fill_color(Color::BLUE);
        canvas.fill_rect(MmRect::new(0.0, 0.0, 50.0, 50.0));
        let img = decode(&document_to_png(&canvas.finish(), &FontRegistry::new(), 50).unwrap());
        let bottom_left = img.get_pixel(5, img.height() - 5).0;
        let top_left = img.get_pixel(5, 5).0;
        assert_eq!(bottom_left, [0, 0, 255, 255]);
        assert_eq!(top_left, [255, 255, 255, 255]);
    }

    #[test]
    fn rotated_bitmaps_land_on_the_page() {
        let mut canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        canvas
            .with_slot::<_, ()>(SlotGroup::Qr, "qr.test", |c| {
                c.with_rotation(-90.0, Point::ORIGIN, |c| {
                    let bitmap = Bitmap::new(1, 1, vec![true]).unwrap();
                    // Portrait frame rect that maps to page (100..140, 60..100).
                    c.draw_bitmap(MmRect::new(-100.0, 100.0, 40.0, 40.0), Symbology::Qr, bitmap, None);
                    Ok(())
                })
            })
            .unwrap();
        let dpi = 50;
        let img = decode(&document_to_png(&canvas.finish(), &FontRegistry::new(), dpi).unwrap());
        let px = |mm: f64| (mm * dpi as f64 / 25.4).round() as u32;
        let inside = img.get_pixel(px(120.0), img.height() - px(80.0)).0;
        let outside = img.get_pixel(px(60.0), img.height() - px(80.0)).0;
        assert_eq!(inside, [0, 0, 0, 255]);
        assert_eq!(outside, [255, 255, 255, 255]);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        canvas.set_font_size(10.0);
        canvas.draw_text_box(
            MmRect::new(10.0, 10.0, 200.0, 50.0),
            "hello",
            crate::text::TextAlign::Left,
            0.0,
            &crate::text::FallbackMetrics,
        );
        let img = decode(&document_to_png(&canvas.finish(), &FontRegistry::new(), 30).unwrap());
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }
}
