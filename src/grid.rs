//! Block grid geometry for the tally sheet.
//!
//! The tally region is a `page.height x page.width / 2` rectangle centred on a
//! landscape page and split into 9 rows (along x) by 7 columns (along y). Side
//! strips are drawn in a portrait frame: the canvas is rotated by -90 degrees
//! and the column index is mirrored so a portrait slot lands on the same page
//! cell as the landscape slot with the same index.

use crate::error::ChirographError;
use crate::types::{Point, Rect, Size};
use chirograph_slot_contract::{GRID_H_BLOCKS, GRID_V_BLOCKS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    pub width: f64,
    pub height: f64,
}

impl PageSpec {
    pub const A4_LANDSCAPE: PageSpec = PageSpec {
        width: 297.0,
        height: 210.0,
    };

    pub fn size(&self) -> Size {
        Size::from_mm(self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        PageSpec::A4_LANDSCAPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex {
    pub row: u8,
    pub column: u8,
}

impl BlockIndex {
    pub fn new(row: u8, column: u8) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    page: PageSpec,
    h_blocks: u8,
    v_blocks: u8,
    tally_width: f64,
    tally_height: f64,
    tally_x: f64,
    tally_y: f64,
    block_width: f64,
    block_height: f64,
    tally_x_portrait: f64,
    tally_y_portrait: f64,
    block_width_portrait: f64,
    block_height_portrait: f64,
}

impl GridSpec {
    pub fn new(page: PageSpec) -> Result<Self, ChirographError> {
        if !(page.width.is_finite() && page.height.is_finite())
            || page.width <= 0.0
            || page.height <= 0.0
        {
            return Err(ChirographError::Config(format!(
                "page size must be positive, got {}x{}",
                page.width, page.height
            )));
        }
        let tally_width = page.height;
        let tally_height = page.width / 2.0;
        if tally_width > page.width || tally_height > page.height {
            return Err(ChirographError::Config(format!(
                "tally region {}x{} does not fit a {}x{} page",
                tally_width, tally_height, page.width, page.height
            )));
        }
        let h_blocks = GRID_H_BLOCKS;
        let v_blocks = GRID_V_BLOCKS;
        let tally_x = (page.width - tally_width) / 2.0;
        let tally_y = (page.height - tally_height) / 2.0;
        let block_width = tally_width / h_blocks as f64;
        let block_height = tally_height / v_blocks as f64;
        Ok(Self {
            page,
            h_blocks,
            v_blocks,
            tally_width,
            tally_height,
            tally_x,
            tally_y,
            block_width,
            block_height,
            tally_x_portrait: -page.height + tally_y,
            tally_y_portrait: tally_x,
            block_width_portrait: block_height,
            block_height_portrait: block_width,
        })
    }

    pub fn page(&self) -> PageSpec {
        self.page
    }

    pub fn h_blocks(&self) -> u8 {
        self.h_blocks
    }

    pub fn v_blocks(&self) -> u8 {
        self.v_blocks
    }

    pub fn tally_rect(&self) -> Rect {
        Rect::new(self.tally_x, self.tally_y, self.tally_width, self.tally_height)
    }

    pub fn block_size(&self, orientation: Orientation) -> (f64, f64) {
        match orientation {
            Orientation::Landscape => (self.block_width, self.block_height),
            Orientation::Portrait => (self.block_width_portrait, self.block_height_portrait),
        }
    }

    pub fn check_block(&self, index: BlockIndex) -> Result<(), ChirographError> {
        if index.row >= self.h_blocks || index.column >= self.v_blocks {
            return Err(ChirographError::Config(format!(
                "block ({}, {}) is outside the {}x{} grid",
                index.row, index.column, self.h_blocks, self.v_blocks
            )));
        }
        Ok(())
    }

    /// Bottom-left corner of a block in the frame of `orientation`.
    pub fn block_origin(&self, index: BlockIndex, orientation: Orientation) -> Point {
        let row = index.row as f64;
        let column = index.column as f64;
        match orientation {
            Orientation::Landscape => Point::new(
                self.tally_x + row * self.block_width,
                self.tally_y + column * self.block_height,
            ),
            Orientation::Portrait => {
                let mirrored = (self.v_blocks as f64) - column - 1.0;
                Point::new(
                    self.tally_x_portrait + mirrored * self.block_width_portrait,
                    self.tally_y_portrait + row * self.block_height_portrait,
                )
            }
        }
    }

    /// Frame rectangle of a slot covering `span` blocks. Landscape spans run
    /// toward higher rows; portrait spans run along +x' which is toward lower
    /// columns on the page. `row_shift` moves the slot along the row axis by a
    /// fraction of a block.
    pub fn span_rect(
        &self,
        index: BlockIndex,
        span: u8,
        height_ratio: f64,
        row_shift: f64,
        orientation: Orientation,
    ) -> Rect {
        let origin = self.block_origin(index, orientation);
        let (bw, bh) = self.block_size(orientation);
        let span = span.max(1) as f64;
        match orientation {
            Orientation::Landscape => Rect::new(
                origin.x + row_shift * bw,
                origin.y,
                span * bw,
                height_ratio * bh,
            ),
            Orientation::Portrait => Rect::new(
                origin.x,
                origin.y + row_shift * bh,
                span * bw,
                height_ratio * bh,
            ),
        }
    }

    pub fn frame_rotation_degrees(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Landscape => 0.0,
            Orientation::Portrait => -90.0,
        }
    }

    pub fn to_page(&self, point: Point, orientation: Orientation) -> Point {
        match orientation {
            Orientation::Landscape => point,
            Orientation::Portrait => Point::new(point.y, -point.x),
        }
    }

    pub fn to_frame(&self, point: Point, orientation: Orientation) -> Point {
        match orientation {
            Orientation::Landscape => point,
            Orientation::Portrait => Point::new(-point.y, point.x),
        }
    }

    pub fn frame_rect_to_page(&self, rect: &Rect, orientation: Orientation) -> Rect {
        match orientation {
            Orientation::Landscape => *rect,
            Orientation::Portrait => {
                let a = self.to_page(Point::new(rect.x, rect.y), orientation);
                let b = self.to_page(Point::new(rect.right(), rect.top()), orientation);
                normalized_rect(a, b)
            }
        }
    }

    pub fn page_rect_to_frame(&self, rect: &Rect, orientation: Orientation) -> Rect {
        match orientation {
            Orientation::Landscape => *rect,
            Orientation::Portrait => {
                let a = self.to_frame(Point::new(rect.x, rect.y), orientation);
                let b = self.to_frame(Point::new(rect.right(), rect.top()), orientation);
                normalized_rect(a, b)
            }
        }
    }

    /// Landscape footprint of block (row, band).
    pub fn block_rect(&self, row: u8, band: u8) -> Rect {
        let origin = self.block_origin(BlockIndex::new(row, band), Orientation::Landscape);
        Rect::new(origin.x, origin.y, self.block_width, self.block_height)
    }
}

fn normalized_rect(a: Point, b: Point) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    Rect::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
}
