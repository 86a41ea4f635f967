//! Encapsulated PostScript writer. Output is level 2 with the base-14
//! `Helvetica-Bold` for text; registered fonts are not embedded.

use crate::canvas::{Command, Document, Matrix};
use crate::pdf::{BASE_FONT, module_rects};
use crate::svg::single_page;
use crate::types::{Color, MM_TO_PT, Pt, fmt_num, fmt_pt};
use std::fmt::Write as _;
use std::io;

pub fn document_to_eps(document: &Document, title: Option<&str>) -> io::Result<Vec<u8>> {
    let page = single_page(document, "eps")?;
    let width = document.page_size.width_pt();
    let height = document.page_size.height_pt();
    let mut out = String::new();
    out.push_str("%!PS-Adobe-3.0 EPSF-3.0\n");
    let _ = writeln!(
        out,
        "%%BoundingBox: 0 0 {} {}",
        width.ceil() as i64,
        height.ceil() as i64
    );
    let _ = writeln!(out, "%%HiResBoundingBox: 0 0 {width:.2} {height:.2}");
    let _ = writeln!(out, "%%Title: ({})", escape_ps_string(title.unwrap_or("chirograph")));
    out.push_str("%%Creator: chirograph\n%%LanguageLevel: 2\n%%Pages: 1\n%%EndComments\n");
    let _ = writeln!(
        out,
        "%%BeginProlog\n/ps {{ /{BASE_FONT} findfont exch scalefont setfont }} bind def\n%%EndProlog"
    );
    out.push_str("%%Page: 1 1\ngsave\n");
    let _ = writeln!(out, "{MM_TO_PT:.6} {MM_TO_PT:.6} scale");

    let mut fill = Color::BLACK;
    let mut stroke = Color::BLACK;
    let mut font_size = Pt::from_f64(12.0);
    let mut saved: Vec<(Color, Color, Pt)> = Vec::new();
    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved.push((fill, stroke, font_size));
                out.push_str("gsave\n");
            }
            Command::RestoreState => {
                if let Some((f, s, size)) = saved.pop() {
                    fill = f;
                    stroke = s;
                    font_size = size;
                    out.push_str("grestore\n");
                }
            }
            Command::Translate(x, y) => {
                let _ = writeln!(out, "{} {} translate", fmt_pt(*x), fmt_pt(*y));
            }
            Command::Rotate(angle) => {
                let m = Matrix::rotate(*angle);
                let _ = writeln!(
                    out,
                    "[{} {} {} {} 0 0] concat",
                    fmt_num(m.a),
                    fmt_num(m.b),
                    fmt_num(m.c),
                    fmt_num(m.d)
                );
            }
            Command::BeginSlot { group, id } => {
                let _ = writeln!(out, "% slot {} {}", group.as_str(), id.replace(['\n', '\r'], " "));
            }
            Command::EndSlot => {}
            Command::SetFillColor(color) => fill = *color,
            Command::SetStrokeColor(color) => stroke = *color,
            Command::SetLineWidth(width) => {
                let _ = writeln!(out, "{} setlinewidth", fmt_pt(*width));
            }
            Command::SetFontSize(size) => font_size = *size,
            Command::MoveTo { x, y } => {
                let _ = writeln!(out, "{} {} moveto", fmt_pt(*x), fmt_pt(*y));
            }
            Command::LineTo { x, y } => {
                let _ = writeln!(out, "{} {} lineto", fmt_pt(*x), fmt_pt(*y));
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
                    "{} {} {} {} {} {} curveto",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2),
                    fmt_pt(*x),
                    fmt_pt(*y)
                );
            }
            Command::ClosePath => out.push_str("closepath\n"),
            Command::Fill => {
                let _ = writeln!(out, "{} setrgbcolor fill", color_operands(fill));
            }
            Command::Stroke => {
                let _ = writeln!(out, "{} setrgbcolor stroke", color_operands(stroke));
            }
            Command::FillStroke => {
                let _ = writeln!(
                    out,
                    "gsave {} setrgbcolor fill grestore {} setrgbcolor stroke",
                    color_operands(fill),
                    color_operands(stroke)
                );
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let _ = writeln!(
                    out,
                    "{} setrgbcolor {} {} {} {} rectfill",
                    color_operands(fill),
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                );
            }
            Command::DrawString { x, y, text, .. } => {
                let _ = writeln!(
                    out,
                    "{} setrgbcolor {} ps {} {} moveto ({}) show",
                    color_operands(fill),
                    fmt_pt(font_size),
                    fmt_pt(*x),
                    fmt_pt(*y),
                    escape_ps_string(text)
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
                if let Some(color) = background {
                    let _ = writeln!(
                        out,
                        "{} setrgbcolor {} {} {} {} rectfill",
                        color_operands(*color),
                        fmt_pt(*x),
                        fmt_pt(*y),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    );
                }
                out.push_str("0 0 0 setrgbcolor\n");
                let rects = module_rects(bitmap, x.to_f64(), y.to_f64(), width.to_f64(), height.to_f64());
                // rectfill takes an array of quadruples in one call.
                for chunk in rects.chunks(64) {
                    out.push('[');
                    for (mx, my, mw, mh) in chunk {
                        let _ = write!(
                            out,
                            " {} {} {} {}",
                            fmt_num(*mx),
                            fmt_num(*my),
                            fmt_num(*mw),
                            fmt_num(*mh)
                        );
                    }
                    out.push_str(" ] rectfill\n");
                }
            }
        }
    }
    out.push_str("grestore\nshowpage\n%%Trailer\n%%EOF\n");
    Ok(out.into_bytes())
}

fn color_operands(color: Color) -> String {
    let (r, g, b) = color.to_rgb8();
    let channel = |v: u8| fmt_num(v as f64 / 255.0);
    format!("{} {} {}", channel(r), channel(g), channel(b))
}

// Standard encoding only covers ASCII; other characters print as `?`.
fn escape_ps_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}
