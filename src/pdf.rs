use crate::canvas::{Command, Document, Matrix, Page};
use crate::encode::Bitmap;
use crate::font::{FontRegistry, RegisteredFont};
use crate::types::{Color, MM_TO_PT, Pt, fmt_num, fmt_pt};
use std::fmt::Write as _;
use std::io;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const RESOURCES_ID: usize = 3;
const FONT_ID: usize = 4;

pub const BASE_FONT: &str = "Helvetica-Bold";

/// Serializes every page of `document` into one PDF. Content is drawn in
/// millimetres under a page-level `cm` that scales to points. Text uses the
/// primary registered font, embedded as a WinAnsi TrueType font, or the
/// base-14 Helvetica-Bold when none is registered.
pub fn document_to_pdf(
    document: &Document,
    fonts: &FontRegistry,
    title: Option<&str>,
) -> io::Result<Vec<u8>> {
    if document.pages.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "document has no pages",
        ));
    }
    // Fixed objects first, then optional font descriptor and program, then
    // one content stream and one page object per page, then the info dict.
    let mut objects: Vec<String> = vec![String::new(); FONT_ID];
    objects[RESOURCES_ID - 1] = format!("<< /Font << /F1 {FONT_ID} 0 R >> >>");
    match fonts.primary() {
        Some(font) => {
            let descriptor_id = objects.len() + 1;
            let file_id = objects.len() + 2;
            objects[FONT_ID - 1] = truetype_font_object(font, descriptor_id);
            objects.push(font_descriptor_object(font, file_id));
            objects.push(font_file_object(&font.data));
        }
        None => {
            objects[FONT_ID - 1] = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{BASE_FONT} /Encoding /WinAnsiEncoding >>"
            );
        }
    }

    let width = fmt_media(document.page_size.width_pt());
    let height = fmt_media(document.page_size.height_pt());
    let mut kids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page);
        objects.push(stream_object(&content));
        let content_id = objects.len();
        objects.push(format!(
            "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {width} {height}] /Resources {RESOURCES_ID} 0 R /Contents {content_id} 0 R >>"
        ));
        kids.push(objects.len());
    }
    objects[CATALOG_ID - 1] = format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>");
    objects[PAGES_ID - 1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" "),
        kids.len()
    );
    objects.push(info_object(title));
    let info_id = objects.len();
    Ok(build_pdf(&objects, info_id))
}

fn fmt_media(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn render_page(page: &Page) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "q {MM_TO_PT:.6} 0 0 {MM_TO_PT:.6} 0 0 cm");
    let mut font_size = Pt::from_f64(12.0);
    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::Translate(x, y) => {
                let _ = writeln!(out, "1 0 0 1 {} {} cm", fmt_pt(*x), fmt_pt(*y));
            }
            Command::Rotate(angle) => {
                let m = Matrix::rotate(*angle);
                let _ = writeln!(
                    out,
                    "{} {} {} {} 0 0 cm",
                    fmt_num(m.a),
                    fmt_num(m.b),
                    fmt_num(m.c),
                    fmt_num(m.d)
                );
            }
            Command::BeginSlot { group, id } => {
                let _ = writeln!(
                    out,
                    "/Slot <</Kind /{} /Id ({})>> BDC",
                    group.as_str(),
                    escape_pdf_string(id)
                );
            }
            Command::EndSlot => out.push_str("EMC\n"),
            Command::SetFillColor(color) => {
                let _ = writeln!(out, "{} rg", color_operands(*color));
            }
            Command::SetStrokeColor(color) => {
                let _ = writeln!(out, "{} RG", color_operands(*color));
            }
            Command::SetLineWidth(width) => {
                let _ = writeln!(out, "{} w", fmt_pt(*width));
            }
            Command::SetFontSize(size) => font_size = *size,
            Command::MoveTo { x, y } => {
                let _ = writeln!(out, "{} {} m", fmt_pt(*x), fmt_pt(*y));
            }
            Command::LineTo { x, y } => {
                let _ = writeln!(out, "{} {} l", fmt_pt(*x), fmt_pt(*y));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {} c",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2),
                    fmt_pt(*x),
                    fmt_pt(*y)
                );
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let _ = writeln!(
                    out,
                    "{} {} {} {} re f",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                );
            }
            Command::DrawString { x, y, text, .. } => {
                let _ = writeln!(
                    out,
                    "BT /F1 {} Tf {} {} Td ({}) Tj ET",
                    fmt_pt(font_size),
                    fmt_pt(*x),
                    fmt_pt(*y),
                    encode_winansi(text)
                );
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
                out.push_str("q\n");
                if let Some(color) = background {
                    let _ = writeln!(
                        out,
                        "{} rg {} {} {} {} re f",
                        color_operands(*color),
                        fmt_pt(*x),
                        fmt_pt(*y),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    );
                }
                out.push_str("0 0 0 rg\n");
                for (mx, my, mw, mh) in module_rects(bitmap, x.to_f64(), y.to_f64(), width.to_f64(), height.to_f64()) {
                    let _ = writeln!(
                        out,
                        "{} {} {} {} re",
                        fmt_num(mx),
                        fmt_num(my),
                        fmt_num(mw),
                        fmt_num(mh)
                    );
                }
                out.push_str("f\nQ\n");
            }
        }
    }
    out.push_str("Q\n");
    out
}

/// Rectangles `(x, y, w, h)` of the dark runs of `bitmap` drawn into the box
/// at `(x, y)`, y up. The quiet zone is kept inside the box.
pub(crate) fn module_rects(
    bitmap: &Bitmap,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> Vec<(f64, f64, f64, f64)> {
    let quiet = bitmap.quiet_zone() as f64;
    let module_w = width / (bitmap.columns() as f64 + 2.0 * quiet);
    let module_h = height / (bitmap.rows() as f64 + 2.0 * quiet);
    let mut rects = Vec::new();
    for row in 0..bitmap.rows() {
        let top = y + height - (quiet + row as f64) * module_h;
        for (start, len) in bitmap.dark_runs(row) {
            rects.push((
                x + (quiet + start as f64) * module_w,
                top - module_h,
                len as f64 * module_w,
                module_h,
            ));
        }
    }
    rects
}

fn color_operands(color: Color) -> String {
    let (r, g, b) = color.to_rgb8();
    let channel = |v: u8| fmt_num(v as f64 / 255.0);
    format!("{} {} {}", channel(r), channel(g), channel(b))
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec!["/Producer (chirograph)".to_string()];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn truetype_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let metrics = &font.metrics;
    let widths = metrics
        .widths
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /TrueType /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        font.base_font_name(),
        metrics.first_char,
        metrics.last_char,
        widths,
        descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, file_id: usize) -> String {
    let m = &font.metrics;
    let flags = if m.is_fixed_pitch { 33 } else { 32 };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /FontFile2 {} 0 R >>",
        font.base_font_name(),
        flags,
        m.bbox.0,
        m.bbox.1,
        m.bbox.2,
        m.bbox.3,
        m.italic_angle,
        m.ascent,
        m.descent,
        m.cap_height,
        m.stem_v,
        m.missing_width,
        file_id
    )
}

fn font_file_object(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push_str(">\n");
    format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode >>\nstream\n{}endstream",
        hex.len(),
        data.len(),
        hex
    )
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

pub(crate) fn escape_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Literal-string body in WinAnsi. Latin-1 maps through unchanged, bytes
/// outside printable ASCII are octal escapes, and anything else becomes `?`.
pub(crate) fn encode_winansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let code = ch as u32;
        match ch {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ if (0xA0..=0xFF).contains(&code) => {
                let _ = write!(out, "\\{code:03o}");
            }
            _ => out.push('?'),
        }
    }
    out
}

fn build_pdf(objects: &[String], info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R /Info {info_id} 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}
