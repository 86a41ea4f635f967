//! Randomized cut lines.
//!
//! A sheet is cut into five pieces: the perimeter of the tally region, two
//! vertical cuts (rows 1 and 7) and two horizontal connectors (bands 2 and 4)
//! that join the vertical cuts. Vertical cuts alternate zigzag pairs and
//! centred points per band so the line cannot be reproduced with a ruler.
//! Connectors start and end on anchors produced by the vertical cuts; those
//! anchors are handed over by value and never recomputed.

use crate::error::ChirographError;
use crate::grid::GridSpec;
use crate::random::{RandomSource, draw_unit};
use crate::types::{Point, Rect};
use std::collections::BTreeMap;

/// Jitter ratios, expressed as fractions of a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterSpec {
    pub cut_width: f64,
    pub cut_height: f64,
    pub side_step: f64,
}

impl Default for JitterSpec {
    fn default() -> Self {
        Self {
            cut_width: 0.1,
            cut_height: 0.1,
            side_step: 0.1,
        }
    }
}

impl JitterSpec {
    pub fn validate(&self) -> Result<(), ChirographError> {
        for (name, value) in [
            ("cut_width", self.cut_width),
            ("cut_height", self.cut_height),
            ("side_step", self.side_step),
        ] {
            if !value.is_finite() || !(0.0..0.25).contains(&value) {
                return Err(ChirographError::Config(format!(
                    "jitter {name} must be in [0, 0.25), got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CutRole {
    Perimeter,
    Left,
    Right,
    BottomLower,
    BottomUpper,
}

impl CutRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CutRole::Perimeter => "perimeter",
            CutRole::Left => "left",
            CutRole::Right => "right",
            CutRole::BottomLower => "bottom_lower",
            CutRole::BottomUpper => "bottom_upper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnchorRole {
    LeftLower,
    LeftUpper,
    RightLower,
    RightUpper,
}

impl AnchorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorRole::LeftLower => "left_lower",
            AnchorRole::LeftUpper => "left_upper",
            AnchorRole::RightLower => "right_lower",
            AnchorRole::RightUpper => "right_upper",
        }
    }
}

/// Anchors keyed by role. An anchor is written once; a second capture of the
/// same role is an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorMap {
    points: BTreeMap<AnchorRole, Point>,
}

impl AnchorMap {
    fn capture(&mut self, role: AnchorRole, point: Point) -> Result<(), ChirographError> {
        if self.points.contains_key(&role) {
            return Err(ChirographError::Config(format!(
                "anchor {} captured twice",
                role.as_str()
            )));
        }
        self.points.insert(role, point);
        Ok(())
    }

    pub fn get(&self, role: AnchorRole) -> Option<Point> {
        self.points.get(&role).copied()
    }

    fn require(&self, role: AnchorRole) -> Result<Point, ChirographError> {
        self.get(role).ok_or_else(|| {
            ChirographError::Config(format!("anchor {} was never produced", role.as_str()))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnchorRole, Point)> + '_ {
        self.points.iter().map(|(role, point)| (*role, *point))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One vertex of a cut path. `block` is the (row, band) cell the vertex was
/// jittered in, `None` for fixed endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutVertex {
    pub point: Point,
    pub block: Option<(u8, u8)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutlinePath {
    pub role: CutRole,
    pub closed: bool,
    pub vertices: Vec<CutVertex>,
}

impl CutlinePath {
    fn new(role: CutRole) -> Self {
        Self {
            role,
            closed: false,
            vertices: Vec::new(),
        }
    }

    fn push(&mut self, point: Point, block: Option<(u8, u8)>) {
        self.vertices.push(CutVertex { point, block });
    }

    pub fn points(&self) -> Vec<Point> {
        self.vertices.iter().map(|v| v.point).collect()
    }

    pub fn first(&self) -> Option<Point> {
        self.vertices.first().map(|v| v.point)
    }

    pub fn last(&self) -> Option<Point> {
        self.vertices.last().map(|v| v.point)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutlineSet {
    pub perimeter: CutlinePath,
    pub left: CutlinePath,
    pub right: CutlinePath,
    pub bottom_lower: CutlinePath,
    pub bottom_upper: CutlinePath,
    pub anchors: AnchorMap,
}

impl CutlineSet {
    /// Paths in emission order.
    pub fn paths(&self) -> [&CutlinePath; 5] {
        [
            &self.perimeter,
            &self.left,
            &self.right,
            &self.bottom_lower,
            &self.bottom_upper,
        ]
    }
}

const LEFT_CUT_ROW: u8 = 1;
const RIGHT_CUT_ROW: u8 = 7;
const LOWER_BAND: u8 = 2;
const UPPER_BAND: u8 = 4;

pub struct CutlineGenerator<'a> {
    grid: &'a GridSpec,
    jitter: JitterSpec,
}

struct VerticalCut {
    path: CutlinePath,
    lower: Point,
    upper: Point,
}

impl<'a> CutlineGenerator<'a> {
    pub fn new(grid: &'a GridSpec, jitter: JitterSpec) -> Self {
        Self { grid, jitter }
    }

    pub fn generate(&self, random: &mut dyn RandomSource) -> Result<CutlineSet, ChirographError> {
        self.jitter.validate()?;
        let perimeter = self.perimeter();

        let left = self.vertical_cut(CutRole::Left, LEFT_CUT_ROW, random)?;
        let right = self.vertical_cut(CutRole::Right, RIGHT_CUT_ROW, random)?;

        let mut anchors = AnchorMap::default();
        anchors.capture(AnchorRole::LeftLower, left.lower)?;
        anchors.capture(AnchorRole::LeftUpper, left.upper)?;
        anchors.capture(AnchorRole::RightLower, right.lower)?;
        anchors.capture(AnchorRole::RightUpper, right.upper)?;

        let bottom_lower = self.connector(
            CutRole::BottomLower,
            LOWER_BAND,
            anchors.require(AnchorRole::LeftLower)?,
            anchors.require(AnchorRole::RightLower)?,
            random,
        )?;
        let bottom_upper = self.connector(
            CutRole::BottomUpper,
            UPPER_BAND,
            anchors.require(AnchorRole::LeftUpper)?,
            anchors.require(AnchorRole::RightUpper)?,
            random,
        )?;

        Ok(CutlineSet {
            perimeter,
            left: left.path,
            right: right.path,
            bottom_lower,
            bottom_upper,
            anchors,
        })
    }

    fn perimeter(&self) -> CutlinePath {
        let tally = self.grid.tally_rect();
        let mut path = CutlinePath::new(CutRole::Perimeter);
        path.closed = true;
        path.push(Point::new(tally.x, tally.y), None);
        path.push(Point::new(tally.right(), tally.y), None);
        path.push(Point::new(tally.right(), tally.top()), None);
        path.push(Point::new(tally.x, tally.top()), None);
        path.push(Point::new(tally.x, tally.y), None);
        path
    }

    fn vertical_cut(
        &self,
        role: CutRole,
        row: u8,
        random: &mut dyn RandomSource,
    ) -> Result<VerticalCut, ChirographError> {
        let tally = self.grid.tally_rect();
        let block = self.grid.block_rect(row, 0);
        let x = block.x + block.width / 2.0;

        let mut path = CutlinePath::new(role);
        let mut lower = None;
        let mut upper = None;
        path.push(Point::new(x, tally.y), None);
        for band in 0..self.grid.v_blocks() {
            if band % 2 == 0 {
                let (p1, p2) = self.zigzag_pair(row, band, true, random)?;
                path.push(p1, Some((row, band)));
                path.push(p2, Some((row, band)));
                if band == LOWER_BAND {
                    lower = Some(p2);
                } else if band == UPPER_BAND {
                    upper = Some(p2);
                }
            } else {
                let p = self.centered_point(row, band, random)?;
                path.push(p, Some((row, band)));
            }
        }
        path.push(Point::new(x, tally.top()), None);

        match (lower, upper) {
            (Some(lower), Some(upper)) => Ok(VerticalCut { path, lower, upper }),
            _ => Err(ChirographError::Config(format!(
                "{} cut produced no anchors",
                role.as_str()
            ))),
        }
    }

    fn connector(
        &self,
        role: CutRole,
        band: u8,
        start: Point,
        end: Point,
        random: &mut dyn RandomSource,
    ) -> Result<CutlinePath, ChirographError> {
        let mut path = CutlinePath::new(role);
        path.push(start, Some((LEFT_CUT_ROW, band)));
        for row in (LEFT_CUT_ROW + 1)..RIGHT_CUT_ROW {
            if row == 4 {
                let p = self.centered_point(row, band, random)?;
                path.push(p, Some((row, band)));
            } else {
                let (p1, p2) = self.zigzag_pair(row, band, false, random)?;
                path.push(p1, Some((row, band)));
                path.push(p2, Some((row, band)));
            }
        }
        path.push(end, Some((RIGHT_CUT_ROW, band)));
        Ok(path)
    }

    fn centered_point(
        &self,
        row: u8,
        band: u8,
        random: &mut dyn RandomSource,
    ) -> Result<Point, ChirographError> {
        let block = self.grid.block_rect(row, band);
        let rx = draw_unit(random)?;
        let ry = draw_unit(random)?;
        Ok(Point::new(
            block.x + (0.5 - self.jitter.cut_width * rx) * block.width,
            block.y + (0.5 - self.jitter.cut_height * ry) * block.height,
        ))
    }

    /// Two points straddling the block centre. Vertical pairs step sideways
    /// around the cut line; horizontal pairs step up and down.
    fn zigzag_pair(
        &self,
        row: u8,
        band: u8,
        vertical: bool,
        random: &mut dyn RandomSource,
    ) -> Result<(Point, Point), ChirographError> {
        let block = self.grid.block_rect(row, band);
        let JitterSpec {
            cut_width: cw,
            cut_height: ch,
            side_step: ss,
        } = self.jitter;
        let r1x = draw_unit(random)?;
        let r1y = draw_unit(random)?;
        let r2x = draw_unit(random)?;
        let r2y = draw_unit(random)?;
        let (p1, p2) = if vertical {
            (
                (0.5 + ss + cw * cw * r1x, 0.25 - ch * r1y),
                (0.5 - ss - cw * cw * r2x, 0.75 + ch * r2y),
            )
        } else {
            (
                (0.25 - cw * r1x, 0.5 + ss + ch * r1y),
                (0.75 + cw * r2x, 0.5 - ss - ch * r2y),
            )
        };
        Ok((
            Point::new(block.x + p1.0 * block.width, block.y + p1.1 * block.height),
            Point::new(block.x + p2.0 * block.width, block.y + p2.1 * block.height),
        ))
    }
}

/// Footprint a jittered vertex may occupy: its block grown by the jitter
/// ratios on every side.
pub fn jitter_envelope(grid: &GridSpec, jitter: &JitterSpec, row: u8, band: u8) -> Rect {
    let block = grid.block_rect(row, band);
    block.expand(
        block.width * jitter.cut_width.max(jitter.side_step),
        block.height * jitter.cut_height.max(jitter.side_step),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PageSpec;
    use crate::random::{ReplaySource, SeededSource};

    fn grid() -> GridSpec {
        GridSpec::new(PageSpec::A4_LANDSCAPE).unwrap()
    }

    fn generate(seed: u64) -> CutlineSet {
        let grid = grid();
        CutlineGenerator::new(&grid, JitterSpec::default())
            .generate(&mut SeededSource::new(seed))
            .unwrap()
    }

    #[test]
    fn perimeter_is_the_closed_tally_rectangle() {
        let set = generate(1);
        let tally = grid().tally_rect();
        let points = set.perimeter.points();
        assert_eq!(points.len(), 5);
        assert_eq!(points.first(), points.last());
        assert!(set.perimeter.closed);
        assert_eq!(points[0], Point::new(tally.x, tally.y));
        assert_eq!(points[2], Point::new(tally.right(), tally.top()));
    }

    #[test]
    fn vertical_cuts_span_the_tally_height() {
        let set = generate(2);
        let grid = grid();
        let tally = grid.tally_rect();
        let (bw, _) = grid.block_size(crate::grid::Orientation::Landscape);
        for (path, row) in [(&set.left, 1.0), (&set.right, 7.0)] {
            // 2 endpoints, 4 zigzag pairs, 3 centred points.
            assert_eq!(path.vertices.len(), 2 + 8 + 3);
            let first = path.first().unwrap();
            let last = path.last().unwrap();
            assert!((first.x - (tally.x + (row + 0.5) * bw)).abs() < 1e-9);
            assert_eq!(first.y, tally.y);
            assert_eq!(last.y, tally.top());
            assert_eq!(first.x, last.x);
        }
    }

    #[test]
    fn connectors_start_and_end_on_identical_anchor_values() {
        for seed in 0..32 {
            let set = generate(seed);
            let pairs = [
                (&set.bottom_lower, AnchorRole::LeftLower, AnchorRole::RightLower),
                (&set.bottom_upper, AnchorRole::LeftUpper, AnchorRole::RightUpper),
            ];
            for (path, start, end) in pairs {
                let start_point = set.anchors.get(start).unwrap();
                let end_point = set.anchors.get(end).unwrap();
                assert_eq!(path.first().unwrap().x.to_bits(), start_point.x.to_bits());
                assert_eq!(path.first().unwrap().y.to_bits(), start_point.y.to_bits());
                assert_eq!(path.last().unwrap().x.to_bits(), end_point.x.to_bits());
                assert_eq!(path.last().unwrap().y.to_bits(), end_point.y.to_bits());
            }
        }
    }

    #[test]
    fn anchors_are_vertices_of_the_vertical_cuts() {
        let set = generate(7);
        let left = set.left.points();
        let right = set.right.points();
        assert_eq!(set.anchors.len(), 4);
        // Endpoint, band 0 pair, band 1 point, band 2 pair: the second point of
        // the band-2 pair sits at index 5.
        assert_eq!(left[5], set.anchors.get(AnchorRole::LeftLower).unwrap());
        assert_eq!(right[5], set.anchors.get(AnchorRole::RightLower).unwrap());
        assert_eq!(left[8], set.anchors.get(AnchorRole::LeftUpper).unwrap());
        assert_eq!(right[8], set.anchors.get(AnchorRole::RightUpper).unwrap());
    }

    #[test]
    fn jittered_vertices_stay_inside_their_envelope() {
        let grid = grid();
        let jitter = JitterSpec::default();
        for seed in 0..64 {
            let set = CutlineGenerator::new(&grid, jitter)
                .generate(&mut SeededSource::new(seed))
                .unwrap();
            for path in set.paths() {
                for vertex in &path.vertices {
                    if let Some((row, band)) = vertex.block {
                        let envelope = jitter_envelope(&grid, &jitter, row, band);
                        assert!(
                            envelope.contains(vertex.point, 1e-9),
                            "{} vertex escaped block ({row},{band})",
                            path.role.as_str()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn extreme_draws_stay_inside_the_envelope() {
        let grid = grid();
        let jitter = JitterSpec::default();
        for value in [0.0, 0.999_999_999] {
            let set = CutlineGenerator::new(&grid, jitter)
                .generate(&mut ReplaySource::constant(value))
                .unwrap();
            for path in set.paths() {
                for vertex in &path.vertices {
                    let Some((row, band)) = vertex.block else {
                        continue;
                    };
                    assert!(jitter_envelope(&grid, &jitter, row, band).contains(vertex.point, 1e-9));
                }
            }
        }
    }

    #[test]
    fn all_cut_points_stay_on_the_page() {
        let page = PageSpec::A4_LANDSCAPE.rect();
        for seed in 100..132 {
            let set = generate(seed);
            for path in set.paths() {
                for point in path.points() {
                    assert!(page.contains(point, 0.0));
                }
            }
        }
    }

    #[test]
    fn connectors_cross_rows_two_through_six() {
        let set = generate(3);
        // Start anchor, zigzag pairs for rows 2, 3, 5, 6, centred point for row 4, end anchor.
        assert_eq!(set.bottom_lower.vertices.len(), 1 + 8 + 1 + 1);
        let rows: Vec<u8> = set
            .bottom_upper
            .vertices
            .iter()
            .filter_map(|v| v.block.map(|(row, _)| row))
            .collect();
        assert_eq!(rows, vec![1, 2, 2, 3, 3, 4, 5, 5, 6, 6, 7]);
        assert!(set.bottom_upper.vertices.iter().all(|v| v.block.map(|b| b.1) == Some(4)));
    }

    #[test]
    fn draws_happen_in_a_fixed_order() {
        let grid = grid();
        let mut source = ReplaySource::new(vec![0.25, 0.5, 0.75]);
        CutlineGenerator::new(&grid, JitterSpec::default())
            .generate(&mut source)
            .unwrap();
        // 2 * (4 pairs * 4 + 3 points * 2) + 2 * (4 pairs * 4 + 1 point * 2)
        assert_eq!(source.drawn(), 80);
    }

    #[test]
    fn equal_seeds_give_equal_geometry_and_different_seeds_differ() {
        assert_eq!(generate(11), generate(11));
        assert_ne!(generate(11).left, generate(12).left);
    }

    #[test]
    fn random_failure_aborts_generation() {
        let grid = grid();
        let err = CutlineGenerator::new(&grid, JitterSpec::default())
            .generate(&mut ReplaySource::constant(1.5))
            .unwrap_err();
        assert!(matches!(err, ChirographError::Randomness(_)));
    }

    #[test]
    fn invalid_jitter_is_rejected() {
        let grid = grid();
        let jitter = JitterSpec {
            cut_width: 0.5,
            ..JitterSpec::default()
        };
        assert!(matches!(
            CutlineGenerator::new(&grid, jitter).generate(&mut SeededSource::new(0)),
            Err(ChirographError::Config(_))
        ));
    }

    #[test]
    fn anchor_map_refuses_overwrites() {
        let mut anchors = AnchorMap::default();
        anchors.capture(AnchorRole::LeftLower, Point::new(1.0, 2.0)).unwrap();
        assert!(anchors.capture(AnchorRole::LeftLower, Point::new(3.0, 4.0)).is_err());
        assert_eq!(anchors.get(AnchorRole::LeftLower), Some(Point::new(1.0, 2.0)));
    }
}
