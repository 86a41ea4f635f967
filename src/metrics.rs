use crate::canvas::{Command, Document, Page, SlotGroup};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub slot_count: usize,
    pub cut_count: usize,
}

/// Counters for one rendered document. Times are wall-clock milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub compose_ms: f64,
    pub render_ms: f64,
    pub total_bytes: usize,
    pub format: String,
}

impl PageMetrics {
    /// Counts commands and slot brackets on one page. Helper and grid
    /// overlays are neither certificate slots nor cuts.
    pub fn from_page(page_number: usize, page: &Page) -> Self {
        let mut metrics = PageMetrics {
            page_number,
            command_count: page.commands.len(),
            ..PageMetrics::default()
        };
        for cmd in &page.commands {
            match cmd {
                Command::BeginSlot {
                    group: SlotGroup::Cut,
                    ..
                } => metrics.cut_count += 1,
                Command::BeginSlot {
                    group: SlotGroup::Helper | SlotGroup::Grid,
                    ..
                } => {}
                Command::BeginSlot { .. } => metrics.slot_count += 1,
                _ => {}
            }
        }
        metrics
    }
}

impl DocumentMetrics {
    pub fn for_document(document: &Document, format: &str) -> Self {
        DocumentMetrics {
            pages: document
                .pages
                .iter()
                .enumerate()
                .map(|(index, page)| PageMetrics::from_page(index + 1, page))
                .collect(),
            format: format.to_string(),
            ..DocumentMetrics::default()
        }
    }

    pub fn command_count(&self) -> usize {
        self.pages.iter().map(|p| p.command_count).sum()
    }

    pub fn slot_count(&self) -> usize {
        self.pages.iter().map(|p| p.slot_count).sum()
    }

    pub fn cut_count(&self) -> usize {
        self.pages.iter().map(|p| p.cut_count).sum()
    }
}
