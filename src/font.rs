use crate::error::ChirographError;
use crate::text::TextMeasure;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use ttf_parser::GlyphId;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, f64>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<f64> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: f64) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
    }
}

/// TrueType fonts available to the writers. The first registered font is the
/// one every text on the sheet is set in.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub struct RegisteredFont {
    pub name: String,
    pub data: Vec<u8>,
    pub metrics: FontMetrics,
}

/// Widths and vertical metrics in 1/1000 em, covering codes 32..=255.
#[derive(Debug)]
pub struct FontMetrics {
    pub first_char: u8,
    pub last_char: u8,
    pub widths: Vec<u16>,
    pub glyph_ids: Vec<u16>,
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub cap_height: i16,
    pub italic_angle: i16,
    pub stem_v: i16,
    pub bbox: (i16, i16, i16, i16),
    pub missing_width: u16,
    pub is_fixed_pitch: bool,
    kerning: HashMap<(u16, u16), i16>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            width_cache: Mutex::new(TextWidthCache::new(4_096)),
        }
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String, ChirographError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|err| {
            ChirographError::RenderBackend(format!("font {}: {err}", path.display()))
        })?;
        let source = path
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or("EmbeddedFont");
        self.register_bytes(data, source)
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: &str,
    ) -> Result<String, ChirographError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
            ChirographError::RenderBackend(format!("invalid font data for {source_name}: {err}"))
        })?;
        if face.tables().cff.is_some() || face.tables().glyf.is_none() {
            return Err(ChirographError::RenderBackend(format!(
                "{source_name}: only TrueType outline fonts can be embedded"
            )));
        }
        let (name, aliases) = font_names(&face, source_name);
        let metrics = FontMetrics::from_face(&face);
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
        });
        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if !key.is_empty() {
                self.lookup.entry(key).or_insert(index);
            }
        }
        tracing::debug!(font = %name, "registered font");
        Ok(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn primary(&self) -> Option<&RegisteredFont> {
        self.fonts.first()
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
    }
}

impl TextMeasure for FontRegistry {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let Some(font) = self.primary() else {
            return crate::text::FallbackMetrics.text_width(text, font_size);
        };
        let key = TextWidthKey {
            size_milli: (font_size * 1000.0).round() as i64,
            text: text.to_string(),
        };
        if let Ok(cache) = self.width_cache.lock() {
            if let Some(value) = cache.get(&key) {
                return value;
            }
        }
        let value = if font.metrics.covers(text) {
            font.metrics.text_width(text, font_size)
        } else {
            shaped_text_width(font, text, font_size)
                .unwrap_or_else(|| font.metrics.text_width(text, font_size))
        };
        if let Ok(mut cache) = self.width_cache.lock() {
            cache.insert(key, value);
        }
        value
    }

    fn line_height(&self, font_size: f64) -> f64 {
        match self.primary() {
            Some(font) => font.metrics.line_height(font_size).max(font_size),
            None => font_size * 1.2,
        }
    }
}

impl RegisteredFont {
    pub fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    /// PostScript-safe name for the PDF `/BaseFont` entry.
    pub fn base_font_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
            .collect();
        if cleaned.is_empty() {
            "EmbeddedFont".to_string()
        } else {
            cleaned
        }
    }

    pub fn glyph_id(&self, ch: char) -> u16 {
        self.face()
            .and_then(|face| face.glyph_index(ch))
            .map(|gid| gid.0)
            .unwrap_or(0)
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let scale = 1000.0 / face.units_per_em().max(1) as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let mut glyph_ids = Vec::with_capacity(224);
        let mut widths = Vec::with_capacity(224);
        for code in first_char..=last_char {
            let gid = face.glyph_index(char::from(code));
            glyph_ids.push(gid.map(|g| g.0).unwrap_or(0));
            let advance = gid.and_then(|g| face.glyph_hor_advance(g)).unwrap_or(0);
            widths.push(((advance as f32 * scale).round() as i32).clamp(0, u16::MAX as i32) as u16);
        }
        let missing_width = widths.first().copied().unwrap_or(0);
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        Self {
            first_char,
            last_char,
            kerning: kerning_pairs(face, &glyph_ids, scale),
            widths,
            glyph_ids,
            ascent,
            descent: scale_i16(face.descender(), scale),
            line_gap: scale_i16(face.line_gap(), scale),
            cap_height: face
                .capital_height()
                .map(|v| scale_i16(v, scale))
                .unwrap_or(ascent),
            italic_angle: face.italic_angle().map(|v| v.round() as i16).unwrap_or(0),
            stem_v: 80,
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
        }
    }

    fn covers(&self, text: &str) -> bool {
        text.chars()
            .all(|ch| (self.first_char as u32..=self.last_char as u32).contains(&(ch as u32)))
    }

    fn slot(&self, ch: char) -> Option<usize> {
        let code = ch as u32;
        if code < self.first_char as u32 || code > self.last_char as u32 {
            return None;
        }
        Some((code - self.first_char as u32) as usize)
    }

    pub fn advance(&self, ch: char) -> u16 {
        self.slot(ch)
            .and_then(|i| self.widths.get(i).copied())
            .unwrap_or(self.missing_width)
    }

    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        let mut units: i32 = 0;
        let mut prev: Option<u16> = None;
        for ch in text.chars() {
            let gid = self
                .slot(ch)
                .and_then(|i| self.glyph_ids.get(i).copied())
                .unwrap_or(0);
            units = units.saturating_add(self.advance(ch) as i32);
            if let Some(k) = prev.and_then(|p| self.kerning.get(&(p, gid))) {
                units = units.saturating_add(*k as i32);
            }
            prev = Some(gid);
        }
        font_size * units.max(0) as f64 / 1000.0
    }

    fn line_height(&self, font_size: f64) -> f64 {
        let units = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        font_size * units.max(0) as f64 / 1000.0
    }
}

fn kerning_pairs(
    face: &ttf_parser::Face<'_>,
    glyph_ids: &[u16],
    scale: f32,
) -> HashMap<(u16, u16), i16> {
    let mut out = HashMap::new();
    let Some(kern) = face.tables().kern else {
        return out;
    };
    let subtables: Vec<_> = kern
        .subtables
        .into_iter()
        .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
        .collect();
    if subtables.is_empty() {
        return out;
    }
    let glyphs: Vec<u16> = glyph_ids.iter().copied().filter(|g| *g != 0).collect();
    for &left in &glyphs {
        for &right in &glyphs {
            let total: i32 = subtables
                .iter()
                .filter_map(|s| s.glyphs_kerning(GlyphId(left), GlyphId(right)))
                .map(i32::from)
                .sum();
            if total == 0 {
                continue;
            }
            let scaled = scale_i16(total.clamp(i16::MIN as i32, i16::MAX as i32) as i16, scale);
            if scaled != 0 {
                out.insert((left, right), scaled);
            }
        }
    }
    out
}

// Outside Latin-1 the text is shaped so ligatures and marks get real advances.
fn shaped_text_width(font: &RegisteredFont, text: &str, font_size: f64) -> Option<f64> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as f64;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    let output = rustybuzz::shape(&face, &[], buffer);
    let total: i64 = output
        .glyph_positions()
        .iter()
        .map(|pos| pos.x_advance as i64)
        .sum();
    Some(font_size * total.max(0) as f64 / units_per_em)
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    ((value as f32 * scale).round() as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, source: &str) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let target = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        if target.is_none() {
            *target = Some(name);
        }
    }
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .unwrap_or_else(|| source.to_string());
    let aliases = [family, full, post, Some(source.to_string())]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}
