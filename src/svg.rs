use crate::canvas::{Command, Document, Matrix, Page};
use crate::pdf::module_rects;
use crate::types::{Color, Pt, fmt_num, fmt_pt};
use std::fmt::Write as _;
use std::io;

const FONT_FAMILY: &str = "Helvetica, Arial, sans-serif";

#[derive(Debug, Clone, Copy)]
struct Style {
    fill: Color,
    stroke: Color,
    line_width: Pt,
    font_size: Pt,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Color::BLACK,
            stroke: Color::BLACK,
            line_width: Pt::from_f64(1.0),
            font_size: Pt::from_f64(12.0),
        }
    }
}

/// Serializes a single-page document as standalone SVG. The user unit is the
/// millimetre; one outer group flips y so the command coordinates can be
/// written unchanged. Every slot bracket becomes a `<g class="slot ...">`.
pub fn document_to_svg(document: &Document) -> io::Result<Vec<u8>> {
    let page = single_page(document, "svg")?;
    let width = fmt_pt(document.page_size.width);
    let height = fmt_pt(document.page_size.height);
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{width}mm\" height=\"{height}mm\" viewBox=\"0 0 {width} {height}\">"
    );
    let _ = writeln!(
        out,
        "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"#ffffff\"/>"
    );
    let _ = writeln!(out, "<g transform=\"matrix(1 0 0 -1 0 {height})\">");
    write_page(&mut out, page);
    out.push_str("</g>\n</svg>\n");
    Ok(out.into_bytes())
}

pub(crate) fn single_page<'a>(document: &'a Document, format: &str) -> io::Result<&'a Page> {
    match document.pages.as_slice() {
        [page] => Ok(page),
        pages => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{format} output holds exactly one page, got {}", pages.len()),
        )),
    }
}

fn write_page(out: &mut String, page: &Page) {
    let mut style = Style::default();
    // One entry per open SaveState: the style to restore and how many
    // transform groups were opened since.
    let mut saved: Vec<(Style, usize)> = Vec::new();
    let mut path = String::new();
    for cmd in &page.commands {
        match cmd {
            Command::SaveState => saved.push((style, 0)),
            Command::RestoreState => {
                if let Some((prev, open)) = saved.pop() {
                    style = prev;
                    for _ in 0..open {
                        out.push_str("</g>\n");
                    }
                }
            }
            Command::Translate(x, y) => {
                let _ = writeln!(
                    out,
                    "<g transform=\"translate({} {})\">",
                    fmt_pt(*x),
                    fmt_pt(*y)
                );
                bump(&mut saved, out);
            }
            Command::Rotate(angle) => {
                let m = Matrix::rotate(*angle);
                let _ = writeln!(
                    out,
                    "<g transform=\"matrix({} {} {} {} 0 0)\">",
                    fmt_num(m.a),
                    fmt_num(m.b),
                    fmt_num(m.c),
                    fmt_num(m.d)
                );
                bump(&mut saved, out);
            }
            Command::BeginSlot { group, id } => {
                let _ = writeln!(
                    out,
                    "<g id=\"slot-{}\" class=\"slot {}\">",
                    escape_xml(id),
                    group.as_str()
                );
            }
            Command::EndSlot => out.push_str("</g>\n"),
            Command::SetFillColor(color) => style.fill = *color,
            Command::SetStrokeColor(color) => style.stroke = *color,
            Command::SetLineWidth(width) => style.line_width = *width,
            Command::SetFontSize(size) => style.font_size = *size,
            Command::MoveTo { x, y } => {
                let _ = write!(path, "M{} {} ", fmt_pt(*x), fmt_pt(*y));
            }
            Command::LineTo { x, y } => {
                let _ = write!(path, "L{} {} ", fmt_pt(*x), fmt_pt(*y));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                let _ = write!(
                    path,
                    "C{} {} {} {} {} {} ",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2),
                    fmt_pt(*x),
                    fmt_pt(*y)
                );
            }
            Command::ClosePath => path.push_str("Z "),
            Command::Fill | Command::Stroke | Command::FillStroke => {
                let d = std::mem::take(&mut path);
                let fill = match cmd {
                    Command::Stroke => "none".to_string(),
                    _ => hex(style.fill),
                };
                let _ = write!(out, "<path d=\"{}\" fill=\"{fill}\"", d.trim_end());
                if !matches!(cmd, Command::Fill) {
                    let _ = write!(
                        out,
                        " stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"round\"",
                        hex(style.stroke),
                        fmt_pt(style.line_width)
                    );
                }
                out.push_str("/>\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let _ = writeln!(
                    out,
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height),
                    hex(style.fill)
                );
            }
            Command::DrawString { x, y, text, .. } => {
                // Glyphs must be flipped back upright inside the y-up group.
                let _ = writeln!(
                    out,
                    "<text transform=\"translate({} {}) scale(1 -1)\" font-family=\"{FONT_FAMILY}\" font-weight=\"bold\" font-size=\"{}\" fill=\"{}\">{}</text>",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(style.font_size),
                    hex(style.fill),
                    escape_xml(text)
                );
            }
            Command::DrawBitmap {
                x,
                y,
                width,
                height,
                symbology,
                bitmap,
                background,
            } => {
                if let Some(color) = background {
                    let _ = writeln!(
                        out,
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                        fmt_pt(*x),
                        fmt_pt(*y),
                        fmt_pt(*width),
                        fmt_pt(*height),
                        hex(*color)
                    );
                }
                let mut d = String::new();
                for (mx, my, mw, mh) in
                    module_rects(bitmap, x.to_f64(), y.to_f64(), width.to_f64(), height.to_f64())
                {
                    let _ = write!(
                        d,
                        "M{} {}h{}v{}h-{}Z",
                        fmt_num(mx),
                        fmt_num(my),
                        fmt_num(mw),
                        fmt_num(mh),
                        fmt_num(mw)
                    );
                }
                let _ = writeln!(
                    out,
                    "<path class=\"{}\" d=\"{d}\" fill=\"#000000\" shape-rendering=\"crispEdges\"/>",
                    symbology.as_str()
                );
            }
        }
    }
    // Unbalanced pages only come from hand-built documents.
    for (_, open) in saved.into_iter().rev() {
        for _ in 0..open {
            out.push_str("</g>\n");
        }
    }
}

fn bump(saved: &mut [(Style, usize)], out: &mut String) {
    match saved.last_mut() {
        Some((_, open)) => *open += 1,
        // A transform outside any saved state lasts for the rest of the page;
        // close it straight away to keep the markup balanced.
        None => {
            tracing::warn!("svg: transform outside a saved state ignored");
            out.push_str("</g>\n");
        }
    }
}

fn hex(color: Color) -> String {
    let (r, g, b) = color.to_rgb8();
    format!("#{r:02x}{g:02x}{b:02x}")
}

pub(crate) fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, Paint, PathShape, SlotGroup};
    use crate::types::{Point, Rect, Size};

    fn parse(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn root_uses_millimetre_viewbox() {
        let canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        let svg = parse(&document_to_svg(&canvas.finish()).unwrap());
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let root = doc.root_element();
        assert_eq!(root.attribute("width"), Some("297mm"));
        assert_eq!(root.attribute("height"), Some("210mm"));
        assert_eq!(root.attribute("viewBox"), Some("0 0 297 210"));
    }

    #[test]
    fn rotated_slots_nest_cleanly() {
        let mut canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        canvas
            .with_slot::<_, ()>(SlotGroup::Text, "text.a&b", |c| {
                c.with_rotation(-90.0, Point::ORIGIN, |c| {
                    c.set_fill_color(Color::LIGHT_BLUE);
                    c.draw_path(
                        Point::new(-150.0, 60.0),
                        &PathShape::RoundedRectangle {
                            width: 20.0,
                            height: 10.0,
                            radius: 1.0,
                        },
                        Paint::FillStroke,
                    );
                    c.set_fill_color(Color::BLACK);
                    c.set_font_size(3.0);
                    c.draw_text_box(
                        Rect::new(-150.0, 60.0, 20.0, 10.0),
                        "<hi>",
                        crate::text::TextAlign::Center,
                        1.0,
                        &crate::text::FallbackMetrics,
                    );
                    Ok(())
                })
            })
            .unwrap();
        let svg = parse(&document_to_svg(&canvas.finish()).unwrap());
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let slot = doc
            .descendants()
            .find(|n| n.attribute("class") == Some("slot text"))
            .unwrap();
        assert_eq!(slot.attribute("id"), Some("slot-text.a&b"));
        let text = slot.descendants().find(|n| n.has_tag_name("text")).unwrap();
        assert_eq!(text.text(), Some("<hi>"));
        assert!(svg.contains("matrix(0 -1 1 0 0 0)"));
        assert!(svg.contains("fill=\"#add8e6\""));
    }

    #[test]
    fn multi_page_documents_are_rejected() {
        let mut canvas = Canvas::new(Size::from_mm(297.0, 210.0));
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        canvas.show_page();
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        let err = document_to_svg(&canvas.finish()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
