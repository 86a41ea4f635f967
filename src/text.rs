//! Greedy word wrapping and box layout for the short texts on the sheet.

use crate::types::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// Text metrics in millimetres for a font size given in millimetres.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f64) -> f64;

    fn line_height(&self, font_size: f64) -> f64 {
        font_size * 1.2
    }
}

/// Fixed-advance metrics used when no font is registered. 0.6 em per
/// character is close to the average advance of the base-14 sans faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackMetrics;

impl TextMeasure for FallbackMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        font_size * 0.6 * text.chars().count() as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    pub text: String,
    pub x: f64,
    pub baseline: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBoxLayout {
    pub lines: Vec<LaidOutLine>,
    /// Wrapped lines that did not fit the box height and were dropped.
    pub truncated: usize,
}

/// Breaks `text` into lines no wider than `max_width`. Words longer than a
/// line are split between characters. Explicit newlines start a new line.
pub fn wrap_text(
    text: &str,
    max_width: f64,
    font_size: f64,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                place_word(word, max_width, font_size, measure, &mut line, &mut lines);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure.text_width(&candidate, font_size) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                place_word(word, max_width, font_size, measure, &mut line, &mut lines);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

// Puts `word` on the empty `line`, spilling full-width chunks into `lines`.
fn place_word(
    word: &str,
    max_width: f64,
    font_size: f64,
    measure: &dyn TextMeasure,
    line: &mut String,
    lines: &mut Vec<String>,
) {
    if measure.text_width(word, font_size) <= max_width {
        line.push_str(word);
        return;
    }
    for ch in word.chars() {
        line.push(ch);
        if line.chars().count() > 1 && measure.text_width(line, font_size) > max_width {
            line.pop();
            lines.push(std::mem::take(line));
            line.push(ch);
        }
    }
}

/// Lays `text` out inside `rect`, centred vertically. At least one line is
/// always kept even when the box is shorter than a line.
pub fn layout_text_box(
    rect: &Rect,
    text: &str,
    align: TextAlign,
    font_size: f64,
    padding: f64,
    measure: &dyn TextMeasure,
) -> TextBoxLayout {
    let inner_width = (rect.width - 2.0 * padding).max(0.0);
    let inner_height = (rect.height - 2.0 * padding).max(0.0);
    let line_height = measure.line_height(font_size);
    let mut wrapped = wrap_text(text, inner_width, font_size, measure);
    let capacity = if line_height > 0.0 {
        ((inner_height / line_height).floor() as usize).max(1)
    } else {
        1
    };
    let truncated = wrapped.len().saturating_sub(capacity);
    wrapped.truncate(capacity);

    let count = wrapped.len();
    let center_y = rect.y + rect.height / 2.0;
    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = measure.text_width(&line, font_size);
            let x = match align {
                TextAlign::Left => rect.x + padding,
                TextAlign::Center => rect.x + (rect.width - width) / 2.0,
                TextAlign::Right => rect.right() - padding - width,
            };
            // 0.35 em puts the middle of the capitals on the line centre.
            let baseline =
                center_y + ((count as f64 - 1.0) / 2.0 - i as f64) * line_height - 0.35 * font_size;
            LaidOutLine {
                text: line,
                x,
                baseline,
                width,
            }
        })
        .collect();
    TextBoxLayout { lines, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_word_boundaries() {
        let measure = FallbackMetrics;
        // 1.0 mm per character at size 1/0.6.
        let size = 1.0 / 0.6;
        let lines = wrap_text("alpha beta gamma delta", 11.5, size, &measure);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn splits_words_longer_than_a_line() {
        let measure = FallbackMetrics;
        let size = 1.0 / 0.6;
        let lines = wrap_text("http://example.org/abc", 8.0, size, &measure);
        assert!(lines.len() >= 3);
        assert!(lines.iter().all(|l| l.chars().count() <= 8));
        assert_eq!(lines.concat(), "http://example.org/abc");
    }

    #[test]
    fn newlines_force_breaks() {
        let lines = wrap_text("one\ntwo", 100.0, 3.0, &FallbackMetrics);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn layout_aligns_and_centres() {
        let rect = Rect::new(10.0, 20.0, 60.0, 20.0);
        let layout = layout_text_box(&rect, "hello", TextAlign::Center, 3.0, 1.0, &FallbackMetrics);
        assert_eq!(layout.lines.len(), 1);
        let line = &layout.lines[0];
        assert!((line.x + line.width / 2.0 - 40.0).abs() < 1e-9);
        assert!(line.baseline < 30.0 && line.baseline > 28.0);

        let right = layout_text_box(&rect, "hello", TextAlign::Right, 3.0, 1.0, &FallbackMetrics);
        assert!((right.lines[0].x + right.lines[0].width - 69.0).abs() < 1e-9);
        let left = layout_text_box(&rect, "hello", TextAlign::Left, 3.0, 1.0, &FallbackMetrics);
        assert_eq!(left.lines[0].x, 11.0);
    }

    #[test]
    fn layout_drops_lines_that_do_not_fit() {
        let rect = Rect::new(0.0, 0.0, 10.0, 8.0);
        let text = "a b c d e f g h i j k l m n o p";
        let layout = layout_text_box(&rect, text, TextAlign::Left, 3.0, 0.0, &FallbackMetrics);
        assert_eq!(layout.lines.len(), 2);
        assert!(layout.truncated > 0);
        assert!(layout.lines[0].baseline > layout.lines[1].baseline);
    }
}
