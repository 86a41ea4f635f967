mod canvas;
mod certificate;
mod compose;
mod cutline;
mod debug;
mod encode;
mod eps;
mod error;
mod font;
mod grid;
mod metrics;
mod output;
mod pdf;
mod perf;
mod random;
mod raster;
mod svg;
mod text;
mod types;

pub use canvas::{
    Canvas, Command, Document, Matrix, Page, Paint, PathShape, SlotGroup, merge_documents,
};
pub use certificate::{CertificateSpec, HelperTexts};
pub use chirograph_slot_contract::{SLOTS_V1, SlotDef, SlotKind, SlotPayload, UrlRole};
pub use compose::{ComposeOptions, ComposedCertificate, ContentBlock, DocumentComposer};
pub use cutline::{
    AnchorMap, AnchorRole, CutRole, CutVertex, CutlineGenerator, CutlinePath, CutlineSet,
    JitterSpec, jitter_envelope,
};
pub use debug::DebugLogger;
pub use encode::{
    BarcodeEncoder, Bitmap, Code128Encoder, EncodeError, QrCodeEncoder, QrEncoder, Symbology,
};
pub use eps::document_to_eps;
pub use error::ChirographError;
pub use font::{FontMetrics, FontRegistry, RegisteredFont};
pub use grid::{BlockIndex, GridSpec, Orientation, PageSpec};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use output::{OutputFormat, write_output_atomic};
pub use pdf::document_to_pdf;
pub use perf::PerfLogger;
pub use random::{EntropySource, RandomSource, ReplaySource, SeededSource};
pub use raster::{DEFAULT_DPI, document_to_png};
pub use svg::document_to_svg;
pub use text::{FallbackMetrics, TextAlign, TextMeasure};
pub use types::{Bounds, Color, Point, Pt, Rect, Size};

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Certificate renderer. Holds the immutable grid, options, fonts and
/// encoders; every generation brings its own random source, so one engine can
/// be shared across threads.
pub struct Chirograph {
    grid: GridSpec,
    jitter: JitterSpec,
    options: ComposeOptions,
    font_registry: Arc<FontRegistry>,
    qr: Arc<dyn QrEncoder>,
    barcode: Arc<dyn BarcodeEncoder>,
    raster_dpi: u32,
    document_title: Option<String>,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

#[derive(Clone)]
pub struct ChirographBuilder {
    page: PageSpec,
    jitter: JitterSpec,
    options: ComposeOptions,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, String)>,
    raster_dpi: u32,
    document_title: Option<String>,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
    qr: Option<Arc<dyn QrEncoder>>,
    barcode: Option<Arc<dyn BarcodeEncoder>>,
}

impl Chirograph {
    pub fn builder() -> ChirographBuilder {
        ChirographBuilder::new()
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    pub fn fonts(&self) -> &FontRegistry {
        self.font_registry.as_ref()
    }

    pub fn compose(
        &self,
        spec: &CertificateSpec,
        random: &mut dyn RandomSource,
    ) -> Result<ComposedCertificate, ChirographError> {
        self.compose_at(None, spec, random)
    }

    /// Composes with a generator seeded from the operating system.
    pub fn compose_with_entropy(
        &self,
        spec: &CertificateSpec,
    ) -> Result<ComposedCertificate, ChirographError> {
        let mut random = EntropySource::new()?;
        self.compose(spec, &mut random)
    }

    fn compose_at(
        &self,
        doc_id: Option<usize>,
        spec: &CertificateSpec,
        random: &mut dyn RandomSource,
    ) -> Result<ComposedCertificate, ChirographError> {
        let started = Instant::now();
        let composer = DocumentComposer {
            grid: &self.grid,
            jitter: self.jitter,
            options: &self.options,
            qr: self.qr.as_ref(),
            barcode: self.barcode.as_ref(),
            measure: self.font_registry.as_ref(),
            debug: self.debug.as_ref(),
            perf: self.perf.as_ref(),
            doc_id,
        };
        let composed = composer.compose(spec, random);
        if let Some(perf) = &self.perf {
            perf.log_span_ms("compose", doc_id, started.elapsed().as_secs_f64() * 1000.0);
        }
        if let Err(err) = &composed {
            tracing::warn!(kind = err.kind(), error = %err, "composition failed");
        }
        composed
    }

    /// Serializes an already composed document.
    pub fn render(
        &self,
        document: &Document,
        format: OutputFormat,
    ) -> Result<Vec<u8>, ChirographError> {
        self.render_at(None, document, format)
    }

    fn render_at(
        &self,
        doc_id: Option<usize>,
        document: &Document,
        format: OutputFormat,
    ) -> Result<Vec<u8>, ChirographError> {
        let started = Instant::now();
        let title = self.document_title.as_deref();
        let backend =
            |err: std::io::Error| ChirographError::RenderBackend(format!("{format}: {err}"));
        let bytes = match format {
            OutputFormat::Svg => document_to_svg(document).map_err(backend)?,
            OutputFormat::Pdf => {
                document_to_pdf(document, self.font_registry.as_ref(), title).map_err(backend)?
            }
            OutputFormat::Eps => document_to_eps(document, title).map_err(backend)?,
            OutputFormat::Png => {
                document_to_png(document, self.font_registry.as_ref(), self.raster_dpi)?
            }
        };
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Some(perf) = &self.perf {
            perf.log_span_ms(&format!("render.{format}"), doc_id, ms);
            perf.log_counts(
                "render",
                doc_id,
                &[
                    ("pages", document.pages.len() as u64),
                    ("commands", document.command_count() as u64),
                    ("bytes", bytes.len() as u64),
                ],
            );
        }
        if let Some(debug) = &self.debug {
            debug.event(
                "render.output",
                json!({
                    "format": format.as_str(),
                    "doc_id": doc_id,
                    "pages": document.pages.len(),
                    "bytes": bytes.len(),
                }),
            );
        }
        tracing::debug!(%format, bytes = bytes.len(), "document rendered");
        Ok(bytes)
    }

    pub fn render_certificate(
        &self,
        spec: &CertificateSpec,
        format: OutputFormat,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<u8>, ChirographError> {
        let composed = self.compose(spec, random)?;
        self.render(&composed.document, format)
    }

    /// Composes, serializes and atomically writes one certificate. The
    /// composed sheet is returned so callers can inspect or fingerprint it.
    pub fn render_to_file(
        &self,
        spec: &CertificateSpec,
        format: OutputFormat,
        random: &mut dyn RandomSource,
        path: impl AsRef<Path>,
    ) -> Result<ComposedCertificate, ChirographError> {
        let composed = self.compose(spec, random)?;
        let bytes = self.render(&composed.document, format)?;
        write_output_atomic(path, &bytes)?;
        self.flush_logs();
        Ok(composed)
    }

    pub fn render_with_metrics(
        &self,
        spec: &CertificateSpec,
        format: OutputFormat,
        random: &mut dyn RandomSource,
    ) -> Result<(Vec<u8>, DocumentMetrics), ChirographError> {
        let started = Instant::now();
        let composed = self.compose(spec, random)?;
        let compose_ms = started.elapsed().as_secs_f64() * 1000.0;
        let started = Instant::now();
        let bytes = self.render(&composed.document, format)?;
        let mut metrics = DocumentMetrics::for_document(&composed.document, format.as_str());
        metrics.compose_ms = compose_ms;
        metrics.render_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics.total_bytes = bytes.len();
        Ok((bytes, metrics))
    }

    /// Renders one buffer per certificate, in input order. With `seed`, the
    /// certificate at index `i` is cut from `SeededSource::new(seed + i)`;
    /// without it every certificate gets its own entropy source.
    pub fn render_many(
        &self,
        specs: &[CertificateSpec],
        format: OutputFormat,
        seed: Option<u64>,
    ) -> Result<Vec<Vec<u8>>, ChirographError> {
        let documents = self.compose_many(specs, seed)?;
        documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| self.render_at(Some(idx), doc, format))
            .collect()
    }

    /// Renders every certificate as one page of a single PDF.
    pub fn render_many_pdf(
        &self,
        specs: &[CertificateSpec],
        seed: Option<u64>,
    ) -> Result<Vec<u8>, ChirographError> {
        let documents = self.compose_many(specs, seed)?;
        let merged = merge_documents(documents).ok_or_else(|| {
            ChirographError::Config("render_many_pdf needs at least one certificate".to_string())
        })?;
        self.render_at(None, &merged, OutputFormat::Pdf)
    }

    fn compose_many(
        &self,
        specs: &[CertificateSpec],
        seed: Option<u64>,
    ) -> Result<Vec<Document>, ChirographError> {
        use rayon::prelude::*;

        let mut results: Vec<(usize, Result<Document, ChirographError>)> = specs
            .par_iter()
            .enumerate()
            .map(|(idx, spec)| {
                let res = match seed {
                    Some(base) => {
                        let mut random = SeededSource::new(base.wrapping_add(idx as u64));
                        self.compose_at(Some(idx), spec, &mut random)
                    }
                    None => EntropySource::new().and_then(|mut random| {
                        self.compose_at(Some(idx), spec, &mut random)
                    }),
                };
                (idx, res.map(|composed| composed.document))
            })
            .collect();
        results.sort_by_key(|(idx, _)| *idx);

        let mut documents = Vec::with_capacity(results.len());
        for (_, res) in results {
            documents.push(res?);
        }
        Ok(documents)
    }

    pub fn flush_logs(&self) {
        if let Some(debug) = &self.debug {
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
    }
}

impl ChirographBuilder {
    pub fn new() -> Self {
        Self {
            page: PageSpec::A4_LANDSCAPE,
            jitter: JitterSpec::default(),
            options: ComposeOptions::default(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            raster_dpi: DEFAULT_DPI,
            document_title: None,
            debug_path: None,
            perf_path: None,
            qr: None,
            barcode: None,
        }
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.page = page;
        self
    }

    pub fn jitter(mut self, jitter: JitterSpec) -> Self {
        self.jitter = jitter;
        self
    }

    /// Text size in millimetres.
    pub fn font_size(mut self, size: f64) -> Self {
        self.options.font_size = size;
        self
    }

    pub fn draw_grid(mut self, enabled: bool) -> Self {
        self.options.draw_grid = enabled;
        self
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.options.colorize = enabled;
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, data: Vec<u8>, name: impl Into<String>) -> Self {
        self.font_bytes.push((data, name.into()));
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.raster_dpi = dpi;
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.document_title = Some(title.into());
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn qr_encoder(mut self, encoder: impl QrEncoder + 'static) -> Self {
        self.qr = Some(Arc::new(encoder));
        self
    }

    pub fn barcode_encoder(mut self, encoder: impl BarcodeEncoder + 'static) -> Self {
        self.barcode = Some(Arc::new(encoder));
        self
    }

    pub fn build(self) -> Result<Chirograph, ChirographError> {
        let grid = GridSpec::new(self.page)?;
        self.jitter.validate()?;
        if !self.options.font_size.is_finite() || self.options.font_size <= 0.0 {
            return Err(ChirographError::Config(format!(
                "font_size must be > 0, got {}",
                self.options.font_size
            )));
        }
        if self.raster_dpi == 0 {
            return Err(ChirographError::Config(
                "raster_dpi must be > 0".to_string(),
            ));
        }
        let mut registry = FontRegistry::new();
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, name) in self.font_bytes {
            registry.register_bytes(data, &name)?;
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(&path).map_err(|err| log_open_error(&path, err))?),
            None => None,
        };
        let perf = match self.perf_path {
            Some(path) => Some(PerfLogger::new(&path).map_err(|err| log_open_error(&path, err))?),
            None => None,
        };
        Ok(Chirograph {
            grid,
            jitter: self.jitter,
            options: self.options,
            font_registry: Arc::new(registry),
            qr: self
                .qr
                .unwrap_or_else(|| Arc::new(QrCodeEncoder::default())),
            barcode: self.barcode.unwrap_or_else(|| Arc::new(Code128Encoder)),
            raster_dpi: self.raster_dpi,
            document_title: self.document_title,
            debug,
            perf,
        })
    }
}

impl Default for ChirographBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn log_open_error(path: &Path, err: std::io::Error) -> ChirographError {
    ChirographError::RenderBackend(format!("cannot open log {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Chirograph {
        Chirograph::builder().build().unwrap()
    }

    fn certificate(label: &str) -> CertificateSpec {
        CertificateSpec::placeholder(label)
    }

    #[test]
    fn every_format_renders_the_placeholder() {
        let engine = engine();
        let spec = certificate("hello world!");
        for format in OutputFormat::ALL {
            let bytes = engine
                .render_certificate(&spec, format, &mut SeededSource::new(5))
                .unwrap();
            assert!(!bytes.is_empty(), "{format} produced no bytes");
        }
    }

    #[test]
    fn svg_output_has_all_slot_groups() {
        let bytes = engine()
            .render_certificate(&certificate("x"), OutputFormat::Svg, &mut SeededSource::new(1))
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let doc = roxmltree::Document::parse(&text).unwrap();
        let slots = doc
            .descendants()
            .filter(|n| {
                n.attribute("class")
                    .is_some_and(|class| class.split(' ').next() == Some("slot"))
            })
            .count();
        assert_eq!(slots, 33 + 5);
    }

    #[test]
    fn pdf_and_png_outputs_decode() {
        let engine = Chirograph::builder().raster_dpi(40).build().unwrap();
        let spec = certificate("x");
        let pdf = engine
            .render_certificate(&spec, OutputFormat::Pdf, &mut SeededSource::new(2))
            .unwrap();
        assert_eq!(lopdf::Document::load_mem(&pdf).unwrap().get_pages().len(), 1);
        let png = engine
            .render_certificate(&spec, OutputFormat::Png, &mut SeededSource::new(2))
            .unwrap();
        let img = image::load_from_memory(&png).unwrap();
        let expected = |mm: f64| (mm * 40.0 / 25.4).round() as u32;
        assert_eq!((img.width(), img.height()), (expected(297.0), expected(210.0)));
    }

    #[test]
    fn same_seed_gives_the_same_sheet() {
        let engine = engine();
        let spec = certificate("x");
        let a = engine.compose(&spec, &mut SeededSource::new(9)).unwrap();
        let b = engine.compose(&spec, &mut SeededSource::new(9)).unwrap();
        let c = engine.compose(&spec, &mut SeededSource::new(10)).unwrap();
        assert_eq!(a.document.fingerprint(), b.document.fingerprint());
        assert_ne!(a.document.fingerprint(), c.document.fingerprint());
        assert_eq!(
            a.document.fingerprint_without_cuts(),
            c.document.fingerprint_without_cuts()
        );
    }

    #[test]
    fn batch_rendering_is_ordered_and_reproducible() {
        let engine = engine();
        let specs: Vec<CertificateSpec> = (0..4).map(|i| certificate(&format!("c{i}"))).collect();
        let first = engine.render_many(&specs, OutputFormat::Svg, Some(100)).unwrap();
        let second = engine.render_many(&specs, OutputFormat::Svg, Some(100)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        for (idx, bytes) in first.iter().enumerate() {
            let single = engine
                .render_certificate(
                    &specs[idx],
                    OutputFormat::Svg,
                    &mut SeededSource::new(100 + idx as u64),
                )
                .unwrap();
            assert_eq!(bytes, &single);
        }
    }

    #[test]
    fn batch_pdf_has_one_page_per_certificate() {
        let engine = engine();
        let specs: Vec<CertificateSpec> = (0..3).map(|i| certificate(&format!("c{i}"))).collect();
        let pdf = engine.render_many_pdf(&specs, Some(1)).unwrap();
        assert_eq!(lopdf::Document::load_mem(&pdf).unwrap().get_pages().len(), 3);
        assert!(engine.render_many_pdf(&[], Some(1)).is_err());
    }

    #[test]
    fn batch_errors_surface_after_ordering() {
        let engine = engine();
        let mut bad = certificate("x");
        bad.owner_token = " ".to_string();
        let specs = vec![certificate("a"), bad];
        let err = engine
            .render_many(&specs, OutputFormat::Svg, Some(1))
            .unwrap_err();
        assert!(matches!(err, ChirographError::Config(_)));
    }

    #[test]
    fn metrics_count_slots_cuts_and_bytes() {
        let (bytes, metrics) = engine()
            .render_with_metrics(&certificate("x"), OutputFormat::Eps, &mut SeededSource::new(4))
            .unwrap();
        assert_eq!(metrics.slot_count(), 33);
        assert_eq!(metrics.cut_count(), 5);
        assert_eq!(metrics.total_bytes, bytes.len());
        assert_eq!(metrics.format, "eps");
        assert_eq!(metrics.pages.len(), 1);
    }

    #[test]
    fn builder_rejects_bad_configuration() {
        let err = Chirograph::builder()
            .register_font_file("/definitely/missing/font.ttf")
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), "render_backend");
        assert!(Chirograph::builder().font_size(0.0).build().is_err());
        assert!(Chirograph::builder().raster_dpi(0).build().is_err());
        let jitter = JitterSpec {
            cut_width: 0.5,
            ..JitterSpec::default()
        };
        assert!(matches!(
            Chirograph::builder().jitter(jitter).build().err().unwrap(),
            ChirographError::Config(_)
        ));
    }

    #[test]
    fn logs_record_compose_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let debug_path = dir.path().join("debug.jsonl");
        let perf_path = dir.path().join("perf.jsonl");
        let engine = Chirograph::builder()
            .debug_log(&debug_path)
            .perf_log(&perf_path)
            .build()
            .unwrap();
        let out = dir.path().join("sheet.svg");
        engine
            .render_to_file(&certificate("x"), OutputFormat::Svg, &mut SeededSource::new(1), &out)
            .unwrap();
        assert!(out.exists());
        let debug = std::fs::read_to_string(&debug_path).unwrap();
        assert!(debug.contains("\"type\":\"compose.slot\""));
        assert!(debug.contains("\"type\":\"cutline.anchor\""));
        assert!(debug.contains("\"type\":\"render.output\""));
        let perf = std::fs::read_to_string(&perf_path).unwrap();
        assert!(perf.contains("\"name\":\"compose\""));
        assert!(perf.contains("\"name\":\"cutline\""));
        assert!(perf.contains("\"name\":\"render.svg\""));
    }

    #[test]
    fn unwritable_log_destination_is_a_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = Chirograph::builder()
            .debug_log(missing.join("debug.jsonl"))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), "render_backend");
        let err = Chirograph::builder()
            .perf_log(missing.join("perf.jsonl"))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), "render_backend");
    }

    #[test]
    fn batch_summaries_count_each_document_separately() {
        let dir = tempfile::tempdir().unwrap();
        let debug_path = dir.path().join("debug.jsonl");
        let engine = Chirograph::builder().debug_log(&debug_path).build().unwrap();
        let specs: Vec<CertificateSpec> = (0..4).map(|i| certificate(&format!("n{i}"))).collect();
        engine.render_many(&specs, OutputFormat::Svg, Some(3)).unwrap();
        engine.flush_logs();

        let raw = std::fs::read_to_string(&debug_path).unwrap();
        let mut seen = Vec::new();
        for line in raw.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            if value["type"] != "debug.summary" {
                continue;
            }
            assert_eq!(value["counts"]["slots.qr"], 16);
            assert_eq!(value["counts"]["slots.barcode"], 6);
            assert_eq!(value["counts"]["cutlines"], 5);
            seen.push(value["doc_id"].as_u64().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
