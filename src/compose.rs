//! Turns a certificate into draw commands.
//!
//! Slots are drawn in table order, each inside its own slot group and, for
//! side-strip slots, inside a rotated portrait frame. Margin helpers follow,
//! and the five cut lines are drawn last so nothing covers them.

use crate::canvas::{Canvas, Document, Paint, PathShape, SlotGroup};
use crate::certificate::CertificateSpec;
use crate::cutline::{CutlineGenerator, CutlineSet, JitterSpec};
use crate::debug::DebugLogger;
use crate::encode::{BarcodeEncoder, EncodeError, QrEncoder, Symbology};
use crate::error::ChirographError;
use crate::grid::{BlockIndex, GridSpec, Orientation};
use crate::perf::PerfLogger;
use crate::random::RandomSource;
use crate::text::{TextAlign, TextMeasure};
use crate::types::{Color, Point, Rect};
use chirograph_slot_contract::{SlotDef, SlotKind, SlotPayload, slot_defs_v1};
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    /// Text size in millimetres. The default is 8 pt.
    pub font_size: f64,
    pub draw_grid: bool,
    pub colorize: bool,
    /// Share of the block's shorter side left around a QR code.
    pub qr_margin: f64,
    pub corner_radius: f64,
    pub cut_line_width: f64,
    pub cut_color: Color,
    pub text_padding: f64,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            font_size: 8.0 * 25.4 / 72.0,
            draw_grid: false,
            colorize: false,
            qr_margin: 0.1,
            corner_radius: 1.0,
            cut_line_width: 0.2,
            cut_color: Color::BLUE,
            text_padding: 1.0,
        }
    }
}

/// Placement of one slot, resolved from the slot table and the options.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub slot_id: &'static str,
    pub kind: SlotKind,
    pub payload: SlotPayload,
    pub index: BlockIndex,
    pub span: u8,
    pub orientation: Orientation,
    pub align: TextAlign,
    pub fill: Color,
    pub font_scale: f64,
    pub height_ratio: f64,
    pub row_shift: f64,
}

impl ContentBlock {
    pub fn from_slot(def: &SlotDef, options: &ComposeOptions) -> Self {
        let (align, fill, font_scale) = match def.kind {
            SlotKind::Text if options.colorize => (TextAlign::Center, Color::LIGHT_BLUE, 1.0),
            SlotKind::Logo if options.colorize => (TextAlign::Center, Color::LIGHT_PINK, 1.0),
            SlotKind::Reference => (TextAlign::Left, Color::WHITE, 0.75),
            _ => (TextAlign::Center, Color::WHITE, 1.0),
        };
        Self {
            slot_id: def.id,
            kind: def.kind,
            payload: def.payload,
            index: BlockIndex::new(def.row, def.column),
            span: def.span,
            orientation: if def.rotated {
                Orientation::Portrait
            } else {
                Orientation::Landscape
            },
            align,
            fill,
            font_scale,
            height_ratio: def.height_ratio(),
            row_shift: def.row_shift(),
        }
    }

    pub fn group(&self) -> SlotGroup {
        match self.kind {
            SlotKind::Barcode => SlotGroup::Barcode,
            SlotKind::Qr => SlotGroup::Qr,
            SlotKind::Logo => SlotGroup::Logo,
            SlotKind::Text | SlotKind::Reference => SlotGroup::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComposedCertificate {
    pub document: Document,
    pub cutlines: CutlineSet,
}

pub struct DocumentComposer<'a> {
    pub grid: &'a GridSpec,
    pub jitter: JitterSpec,
    pub options: &'a ComposeOptions,
    pub qr: &'a dyn QrEncoder,
    pub barcode: &'a dyn BarcodeEncoder,
    pub measure: &'a dyn TextMeasure,
    pub debug: Option<&'a DebugLogger>,
    pub perf: Option<&'a PerfLogger>,
    /// Position in a batch, carried into perf records.
    pub doc_id: Option<usize>,
}

impl<'a> DocumentComposer<'a> {
    pub fn compose(
        &self,
        spec: &CertificateSpec,
        random: &mut dyn RandomSource,
    ) -> Result<ComposedCertificate, ChirographError> {
        spec.validate()?;
        let blocks = self.resolve_blocks()?;
        let started = Instant::now();
        let cutlines = CutlineGenerator::new(self.grid, self.jitter).generate(random)?;
        if let Some(perf) = self.perf {
            perf.log_span_ms("cutline", self.doc_id, started.elapsed().as_secs_f64() * 1000.0);
        }
        if let Some(debug) = self.debug {
            for (role, point) in cutlines.anchors.iter() {
                debug.event(
                    "cutline.anchor",
                    json!({"role": role.as_str(), "x": point.x, "y": point.y}),
                );
            }
        }

        let mut canvas = Canvas::new(self.grid.page().size());
        canvas.set_font_size(self.options.font_size);
        if self.options.draw_grid {
            self.draw_grid_overlay(&mut canvas)?;
        }
        for block in &blocks {
            let payload = spec.payload(block.payload);
            canvas.with_slot(block.group(), block.slot_id, |canvas| {
                self.draw_block(canvas, block, payload)
            })?;
            if let Some(debug) = self.debug {
                debug.event(
                    "compose.slot",
                    json!({
                        "slot": block.slot_id,
                        "kind": block.kind.as_str(),
                        "row": block.index.row,
                        "column": block.index.column,
                        "rotated": block.orientation == Orientation::Portrait,
                    }),
                );
                debug.increment(self.doc_id, &format!("slots.{}", block.kind.as_str()), 1);
            }
        }
        self.draw_helpers(&mut canvas, spec)?;
        self.draw_cutlines(&mut canvas, &cutlines)?;
        if let Some(debug) = self.debug {
            debug.increment(self.doc_id, "cutlines", cutlines.paths().len() as u64);
            debug.emit_summary("compose", self.doc_id);
        }
        tracing::debug!(commands = canvas.command_count(), "certificate composed");
        Ok(ComposedCertificate {
            document: canvas.finish(),
            cutlines,
        })
    }

    /// Checks every slot against the grid before anything is drawn.
    fn resolve_blocks(&self) -> Result<Vec<ContentBlock>, ChirographError> {
        slot_defs_v1()
            .iter()
            .map(|def| {
                let block = ContentBlock::from_slot(def, self.options);
                self.grid.check_block(block.index)?;
                Ok(block)
            })
            .collect()
    }

    fn draw_block(
        &self,
        canvas: &mut Canvas,
        block: &ContentBlock,
        payload: &str,
    ) -> Result<(), ChirographError> {
        tracing::debug!(slot = block.slot_id, kind = block.kind.as_str(), "drawing slot");
        let rect = self.grid.span_rect(
            block.index,
            block.span,
            block.height_ratio,
            block.row_shift,
            block.orientation,
        );
        let degrees = self.grid.frame_rotation_degrees(block.orientation);
        canvas.with_rotation(degrees, Point::ORIGIN, |canvas| match block.kind {
            SlotKind::Barcode => self.draw_barcode(canvas, block, rect, payload),
            SlotKind::Qr => self.draw_qr(canvas, block, rect, payload),
            SlotKind::Text | SlotKind::Reference | SlotKind::Logo => {
                self.draw_text(canvas, block, rect, payload);
                Ok(())
            }
        })
    }

    fn draw_barcode(
        &self,
        canvas: &mut Canvas,
        block: &ContentBlock,
        rect: Rect,
        payload: &str,
    ) -> Result<(), ChirographError> {
        let bitmap = self
            .barcode
            .encode(payload)
            .map_err(|err| encoding_error(block, Symbology::Code128, err))?;
        canvas.draw_bitmap(
            rect,
            Symbology::Code128,
            bitmap,
            Some(Color::WHITE),
        );
        Ok(())
    }

    fn draw_qr(
        &self,
        canvas: &mut Canvas,
        block: &ContentBlock,
        rect: Rect,
        payload: &str,
    ) -> Result<(), ChirographError> {
        let bitmap = self
            .qr
            .encode(payload)
            .map_err(|err| encoding_error(block, Symbology::Qr, err))?;
        let side = rect.width.min(rect.height);
        let inner = side * (1.0 - self.options.qr_margin);
        let square = Rect::new(
            rect.x + (rect.width - inner) / 2.0,
            rect.y + (rect.height - inner) / 2.0,
            inner,
            inner,
        );
        canvas.draw_bitmap(square, Symbology::Qr, bitmap, Some(Color::WHITE));
        Ok(())
    }

    fn draw_text(&self, canvas: &mut Canvas, block: &ContentBlock, rect: Rect, text: &str) {
        canvas.set_fill_color(block.fill);
        canvas.draw_path(
            Point::new(rect.x, rect.y),
            &PathShape::RoundedRectangle {
                width: rect.width,
                height: rect.height,
                radius: self.options.corner_radius,
            },
            Paint::Fill,
        );
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font_size(self.options.font_size * block.font_scale);
        let dropped = canvas.draw_text_box(
            rect,
            text,
            block.align,
            self.options.text_padding,
            self.measure,
        );
        canvas.set_font_size(self.options.font_size);
        if dropped > 0 {
            tracing::warn!(slot = block.slot_id, dropped, "text does not fit its slot");
        }
    }

    fn draw_helpers(
        &self,
        canvas: &mut Canvas,
        spec: &CertificateSpec,
    ) -> Result<(), ChirographError> {
        let page = self.grid.page().rect();
        let tally = self.grid.tally_rect();
        let inset = 2.0;
        let helpers = [
            (
                "helper.top",
                spec.helpers.top.as_deref(),
                Rect::new(tally.x, tally.top(), tally.width, page.top() - tally.top()),
                Orientation::Landscape,
            ),
            (
                "helper.bottom",
                spec.helpers.bottom.as_deref(),
                Rect::new(tally.x, page.y, tally.width, tally.y - page.y),
                Orientation::Landscape,
            ),
            (
                "helper.left",
                spec.helpers.left.as_deref(),
                Rect::new(page.x, tally.y, tally.x - page.x, tally.height),
                Orientation::Portrait,
            ),
            (
                "helper.right",
                spec.helpers.right.as_deref(),
                Rect::new(tally.right(), tally.y, page.right() - tally.right(), tally.height),
                Orientation::Portrait,
            ),
        ];
        for (id, text, margin, orientation) in helpers {
            let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            let frame = self
                .grid
                .page_rect_to_frame(&margin.inset(inset), orientation);
            let degrees = self.grid.frame_rotation_degrees(orientation);
            canvas.with_slot(SlotGroup::Helper, id, |canvas| {
                canvas.with_rotation::<_, ChirographError>(degrees, Point::ORIGIN, |canvas| {
                    canvas.set_fill_color(Color::BLACK);
                    let dropped =
                        canvas.draw_text_box(frame, text, TextAlign::Center, 0.0, self.measure);
                    if dropped > 0 {
                        tracing::warn!(helper = id, dropped, "helper text truncated");
                    }
                    Ok(())
                })
            })?;
        }
        Ok(())
    }

    fn draw_grid_overlay(&self, canvas: &mut Canvas) -> Result<(), ChirographError> {
        let grid = self.grid;
        canvas.with_slot(SlotGroup::Grid, "grid.overlay", |canvas| {
            canvas.set_fill_color(Color::LIGHT_GRAY);
            for row in 1..grid.h_blocks() - 1 {
                for column in (0..grid.v_blocks()).filter(|c| (row + c) % 2 == 0) {
                    canvas.fill_rect(grid.block_rect(row, column).inset(1.0));
                }
            }
            let degrees = grid.frame_rotation_degrees(Orientation::Portrait);
            canvas.with_rotation::<_, ChirographError>(degrees, Point::ORIGIN, |canvas| {
                canvas.set_fill_color(Color::DARK_CYAN);
                let (width, height) = grid.block_size(Orientation::Portrait);
                for row in [0, grid.h_blocks() - 1] {
                    for column in (0..grid.v_blocks()).filter(|c| (row + c) % 2 == 0) {
                        let origin =
                            grid.block_origin(BlockIndex::new(row, column), Orientation::Portrait);
                        canvas.fill_rect(Rect::new(origin.x, origin.y, width, height).inset(1.0));
                    }
                }
                Ok(())
            })
        })
    }

    fn draw_cutlines(
        &self,
        canvas: &mut Canvas,
        cutlines: &CutlineSet,
    ) -> Result<(), ChirographError> {
        for path in cutlines.paths() {
            let id = format!("cut.{}", path.role.as_str());
            canvas.with_slot::<_, ChirographError>(SlotGroup::Cut, id, |canvas| {
                canvas.set_stroke_color(self.options.cut_color);
                canvas.set_line_width(self.options.cut_line_width);
                canvas.draw_path(
                    Point::ORIGIN,
                    &PathShape::Polyline {
                        points: path.points(),
                        closed: path.closed,
                    },
                    Paint::Stroke,
                );
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn encoding_error(block: &ContentBlock, symbology: Symbology, err: EncodeError) -> ChirographError {
    ChirographError::Encoding {
        slot: block.slot_id.to_string(),
        symbology: symbology.as_str().to_string(),
        message: err.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::encode::{Bitmap, Code128Encoder, QrCodeEncoder};
    use crate::grid::PageSpec;
    use crate::random::{ReplaySource, SeededSource};
    use crate::text::FallbackMetrics;
    use crate::types::Bounds;

    struct RejectingQr;

    impl QrEncoder for RejectingQr {
        fn encode(&self, payload: &str) -> Result<Bitmap, EncodeError> {
            if payload.contains("reject") {
                Err(EncodeError::new("payload too long"))
            } else {
                Bitmap::new(1, 1, vec![true])
            }
        }
    }

    fn worked_example() -> CertificateSpec {
        let mut spec = CertificateSpec::placeholder("hello world");
        spec.primary_link = "http://a".to_string();
        spec.secondary_link = "http://b".to_string();
        spec.issuer_token = "http://c".to_string();
        spec.owner_token = "http://d".to_string();
        spec.primary_asset_verifier = "http://e".to_string();
        spec.secondary_asset_verifier = "http://f".to_string();
        spec.primary_owner_verifier = "http://g".to_string();
        spec.secondary_owner_verifier = "http://h".to_string();
        spec.primary_issuer_verifier = "http://i".to_string();
        spec.secondary_issuer_verifier = "http://j".to_string();
        spec.mail_to_left = "x".to_string();
        spec.mail_to_right = "y".to_string();
        spec
    }

    fn compose_with(
        spec: &CertificateSpec,
        options: &ComposeOptions,
        qr: &dyn QrEncoder,
        random: &mut dyn RandomSource,
    ) -> Result<ComposedCertificate, ChirographError> {
        let grid = GridSpec::new(PageSpec::A4_LANDSCAPE).unwrap();
        let composer = DocumentComposer {
            grid: &grid,
            jitter: JitterSpec::default(),
            options,
            qr,
            barcode: &Code128Encoder,
            measure: &FallbackMetrics,
            debug: None,
            perf: None,
            doc_id: None,
        };
        composer.compose(spec, random)
    }

    #[test]
    fn worked_example_has_every_slot_group() {
        let composed = compose_with(
            &worked_example(),
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut SeededSource::new(7),
        )
        .unwrap();
        let doc = &composed.document;
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.count_slots(SlotGroup::Qr), 16);
        assert_eq!(doc.count_slots(SlotGroup::Barcode), 6);
        assert_eq!(doc.count_slots(SlotGroup::Text), 7);
        assert_eq!(doc.count_slots(SlotGroup::Logo), 4);
        assert_eq!(doc.count_slots(SlotGroup::Cut), 5);
        assert_eq!(doc.count_slots(SlotGroup::Helper), 0);
        assert_eq!(doc.count_slots(SlotGroup::Grid), 0);

        let bounds: Bounds = doc.page_bounds(0);
        assert!(!bounds.is_empty());
        assert!(bounds.within(&Rect::new(0.0, 0.0, 297.0, 210.0), 1e-6));
    }

    #[test]
    fn cut_groups_come_last_in_role_order() {
        let composed = compose_with(
            &worked_example(),
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut SeededSource::new(3),
        )
        .unwrap();
        let groups = composed.document.slot_groups();
        let tail: Vec<&str> = groups[groups.len() - 5..]
            .iter()
            .map(|(_, id)| id.as_str())
            .collect();
        assert_eq!(
            tail,
            vec![
                "cut.perimeter",
                "cut.left",
                "cut.right",
                "cut.bottom_lower",
                "cut.bottom_upper"
            ]
        );
        assert_eq!(groups[0].1, "barcode.side.left");
    }

    #[test]
    fn every_slot_lands_inside_the_tally_region() {
        let grid = GridSpec::new(PageSpec::A4_LANDSCAPE).unwrap();
        let tally = grid.tally_rect();
        let options = ComposeOptions::default();
        for def in slot_defs_v1() {
            let block = ContentBlock::from_slot(def, &options);
            let frame = grid.span_rect(
                block.index,
                block.span,
                block.height_ratio,
                block.row_shift,
                block.orientation,
            );
            let page = grid.frame_rect_to_page(&frame, block.orientation);
            assert!(tally.contains_rect(&page, 1e-9), "{} escapes the tally", def.id);
        }
    }

    #[test]
    fn rejected_payload_names_the_slot() {
        let mut spec = worked_example();
        spec.owner_token = "reject me".to_string();
        let err = compose_with(
            &spec,
            &ComposeOptions::default(),
            &RejectingQr,
            &mut SeededSource::new(1),
        )
        .unwrap_err();
        match err {
            ChirographError::Encoding {
                slot, symbology, ..
            } => {
                assert_eq!(slot, "qr.center.owner_token");
                assert_eq!(symbology, "qr");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn blank_certificate_fields_fail_before_drawing() {
        let mut spec = worked_example();
        spec.label = String::new();
        let mut random = ReplaySource::constant(0.5);
        let err = compose_with(
            &spec,
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut random,
        )
        .unwrap_err();
        assert!(matches!(err, ChirographError::Config(_)));
        assert_eq!(random.drawn(), 0);
    }

    #[test]
    fn failing_randomness_aborts_composition() {
        let err = compose_with(
            &worked_example(),
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut ReplaySource::new(Vec::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ChirographError::Randomness(_)));
    }

    #[test]
    fn overlays_and_helpers_are_optional_groups() {
        let options = ComposeOptions {
            draw_grid: true,
            colorize: true,
            ..ComposeOptions::default()
        };
        let spec = worked_example().with_default_helpers();
        let composed = compose_with(
            &spec,
            &options,
            &QrCodeEncoder::default(),
            &mut SeededSource::new(11),
        )
        .unwrap();
        let doc = &composed.document;
        assert_eq!(doc.count_slots(SlotGroup::Grid), 1);
        assert_eq!(doc.count_slots(SlotGroup::Helper), 4);
        assert_eq!(doc.slot_groups()[0].1, "grid.overlay");
        assert!(doc.page_bounds(0).within(&Rect::new(0.0, 0.0, 297.0, 210.0), 1e-6));
    }

    #[test]
    fn colorize_changes_backdrops_only_for_labels_and_logos() {
        let options = ComposeOptions {
            colorize: true,
            ..ComposeOptions::default()
        };
        let label = ContentBlock::from_slot(
            chirograph_slot_contract::slot_def("label.center.1").unwrap(),
            &options,
        );
        let logo = ContentBlock::from_slot(
            chirograph_slot_contract::slot_def("logo.left.flat").unwrap(),
            &options,
        );
        let reference = ContentBlock::from_slot(
            chirograph_slot_contract::slot_def("reference.left").unwrap(),
            &options,
        );
        assert_eq!(label.fill, Color::LIGHT_BLUE);
        assert_eq!(logo.fill, Color::LIGHT_PINK);
        assert_eq!(reference.fill, Color::WHITE);
        assert_eq!(reference.group(), SlotGroup::Text);
    }

    fn bitmap_sizes(doc: &Document) -> Vec<(String, f64, f64)> {
        let mut slot = String::new();
        let mut sizes = Vec::new();
        for cmd in &doc.pages[0].commands {
            match cmd {
                Command::BeginSlot { id, .. } => slot = id.clone(),
                Command::DrawBitmap { width, height, .. } => {
                    sizes.push((slot.clone(), width.to_f64(), height.to_f64()))
                }
                _ => {}
            }
        }
        sizes
    }

    #[test]
    fn codes_fill_their_blocks_at_the_versioned_size() {
        let composed = compose_with(
            &worked_example(),
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut SeededSource::new(5),
        )
        .unwrap();
        let sizes = bitmap_sizes(&composed.document);
        assert_eq!(sizes.len(), 22);
        let close = |a: f64, b: f64| (a - b).abs() < 2e-3;
        // 90% of the shorter block side, 148.5 / 7.
        let qr_side = 148.5 / 7.0 * 0.9;
        for (slot, width, height) in &sizes {
            if slot.starts_with("qr.") {
                assert!(close(*width, qr_side) && close(*height, qr_side), "{slot}: {width}x{height}");
            } else if slot.starts_with("barcode.side.") {
                assert!(close(*width, 148.5) && close(*height, 210.0 / 9.0 * 1.9), "{slot}: {width}x{height}");
            } else {
                assert!(slot.starts_with("barcode.center."), "unexpected bitmap in {slot}");
                assert!(close(*width, 210.0 / 9.0 * 5.0) && close(*height, 148.5 / 7.0), "{slot}: {width}x{height}");
            }
        }
    }

    #[test]
    fn label_backdrop_covers_the_whole_span() {
        let composed = compose_with(
            &worked_example(),
            &ComposeOptions::default(),
            &QrCodeEncoder::default(),
            &mut SeededSource::new(5),
        )
        .unwrap();
        let doc = &composed.document;
        let grid = GridSpec::new(PageSpec::A4_LANDSCAPE).unwrap();
        let span = grid.span_rect(BlockIndex::new(3, 1), 3, 1.0, 0.0, Orientation::Landscape);
        let mut in_label = false;
        let mut first_move = None;
        for cmd in &doc.pages[0].commands {
            match cmd {
                Command::BeginSlot { id, .. } => in_label = id == "label.center.1",
                Command::MoveTo { x, y } if in_label && first_move.is_none() => {
                    first_move = Some((x.to_f64(), y.to_f64()));
                }
                _ => {}
            }
        }
        let (x, y) = first_move.unwrap();
        // The rounded rectangle starts one corner radius along the bottom edge.
        assert!((x - (span.x + 1.0)).abs() < 2e-3, "backdrop starts at {x}");
        assert!((y - span.y).abs() < 2e-3, "backdrop bottom at {y}");
    }
}
