//! Spatial substrates: a multi-occupancy cell grid and a bucketed continuous plane.
//!
//! Both own the authoritative agent → location mapping. Every registered agent
//! sits in exactly one cell (or bucket) and a failed move leaves it where it was.

use crate::{AgentId, Result, SetInsertable, SimulationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grid coordinate `(x, y)` with `x < width` and `y < height`.
pub type Cell = (usize, usize);

/// Adjacency used for grid neighborhood queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighborhood {
    /// 4-connected.
    VonNeumann,
    /// 8-connected, diagonals included.
    Moore,
}

impl Neighborhood {
    fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Neighborhood::VonNeumann => &[(0, -1), (-1, 0), (1, 0), (0, 1)],
            Neighborhood::Moore => &[
                (-1, -1),
                (0, -1),
                (1, -1),
                (-1, 0),
                (1, 0),
                (-1, 1),
                (0, 1),
                (1, 1),
            ],
        }
    }
}

impl Default for Neighborhood {
    fn default() -> Self {
        Neighborhood::Moore
    }
}

#[derive(Debug, Clone)]
pub struct MultiGrid {
    width: usize,
    height: usize,
    torus: bool,
    cells: Vec<Vec<AgentId>>,
    positions: BTreeMap<AgentId, Cell>,
}

impl MultiGrid {
    pub fn new(width: usize, height: usize, torus: bool) -> Result<MultiGrid> {
        if width == 0 || height == 0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let capacity = width.checked_mul(height).ok_or_else(|| {
            SimulationError::InvalidConfiguration(format!(
                "grid of {}x{} cells is too large",
                width, height
            ))
        })?;
        Ok(MultiGrid {
            width,
            height,
            torus,
            cells: vec![Vec::new(); capacity],
            positions: BTreeMap::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn is_torus(&self) -> bool {
        self.torus
    }
    /// Number of distinct cells. Cannot overflow, `new` checked it.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    const fn xy_2_idx(&self, xy: Cell) -> usize {
        xy.1 * self.width + xy.0
    }

    /// Maps a signed coordinate onto the grid, wrapping on a torus.
    /// Returns `None` for coordinates off a bounded grid.
    pub fn resolve(&self, x: i64, y: i64) -> Option<Cell> {
        let (w, h) = (self.width as i64, self.height as i64);
        if self.torus {
            Some((x.rem_euclid(w) as usize, y.rem_euclid(h) as usize))
        } else if x >= 0 && x < w && y >= 0 && y < h {
            Some((x as usize, y as usize))
        } else {
            None
        }
    }

    fn normalize(&self, pos: Cell) -> Result<Cell> {
        if self.torus {
            return Ok((pos.0 % self.width, pos.1 % self.height));
        }
        if pos.0 < self.width && pos.1 < self.height {
            Ok(pos)
        } else {
            Err(SimulationError::out_of_bounds(pos, self.width, self.height))
        }
    }

    /// Registers `agent` at `pos`, relocating it if it was already placed.
    pub fn place_agent(&mut self, agent: AgentId, pos: Cell) -> Result<()> {
        if self.positions.contains_key(&agent) {
            return self.move_agent(agent, pos);
        }
        let pos = self.normalize(pos)?;
        let idx = self.xy_2_idx(pos);
        self.cells[idx].binary_insert(agent);
        self.positions.insert(agent, pos);
        Ok(())
    }

    /// Moves an already placed agent. On error nothing changes.
    pub fn move_agent(&mut self, agent: AgentId, pos: Cell) -> Result<()> {
        let pos = self.normalize(pos)?;
        let old = *self
            .positions
            .get(&agent)
            .ok_or(SimulationError::UnknownAgent(agent))?;
        if old == pos {
            return Ok(());
        }
        let old_idx = self.xy_2_idx(old);
        let new_idx = self.xy_2_idx(pos);
        self.cells[old_idx].binary_remove(agent);
        self.cells[new_idx].binary_insert(agent);
        self.positions.insert(agent, pos);
        Ok(())
    }

    pub fn position_of(&self, agent: AgentId) -> Option<Cell> {
        self.positions.get(&agent).copied()
    }

    /// Agents in one cell, in ascending id order. Empty for cells off the grid.
    pub fn cell_occupants(&self, pos: Cell) -> &[AgentId] {
        if pos.0 >= self.width || pos.1 >= self.height {
            return &[];
        }
        &self.cells[self.xy_2_idx(pos)]
    }

    /// In-bounds cells around `pos`. With `include_center` the origin cell comes first.
    /// On a small torus wrapped offsets can coincide; each cell is listed once.
    pub fn neighborhood(&self, pos: Cell, kind: Neighborhood, include_center: bool) -> Vec<Cell> {
        let mut result: Vec<Cell> = Vec::with_capacity(9);
        let (x, y) = (pos.0 as i64, pos.1 as i64);
        if include_center {
            if let Some(c) = self.resolve(x, y) {
                result.push(c);
            }
        }
        for (dx, dy) in kind.offsets() {
            if let Some(c) = self.resolve(x + dx, y + dy) {
                if !result.contains(&c) && (include_center || c != pos) {
                    result.push(c);
                }
            }
        }
        result
    }

    /// Occupants of the neighborhood of `pos`.
    pub fn neighbors(&self, pos: Cell, kind: Neighborhood, include_center: bool) -> Vec<AgentId> {
        self.neighborhood(pos, kind, include_center)
            .into_iter()
            .flat_map(|c| self.cell_occupants(c).iter().copied())
            .collect()
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.positions.len()
    }

    /// Sum of occupant counts over every cell.
    pub fn occupancy(&self) -> usize {
        self.cells.iter().map(|c| c.len()).sum()
    }

    pub fn iter_positions(&self) -> impl Iterator<Item = (AgentId, Cell)> + '_ {
        self.positions.iter().map(|(id, pos)| (*id, *pos))
    }
}

/// A point on the continuous plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn scale(self, s: f64) -> Point {
        Point::new(self.x * s, self.y * s)
    }

    pub fn normalize(self) -> Point {
        let len = self.length();
        if len > 0.0 {
            self.scale(1.0 / len)
        } else {
            self
        }
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from(xy: (f64, f64)) -> Self {
        Point::new(xy.0, xy.1)
    }
}

/// Bounded plane `[0, width) x [0, height)` with agents bucketed for radius queries.
///
/// Buckets are at most `cell_size` on a side and tile the plane exactly, so a
/// bucket index wrapped around a torus names the bucket holding the wrapped
/// coordinate.
#[derive(Debug, Clone)]
pub struct ContinuousSpace {
    width: f64,
    height: f64,
    torus: bool,
    bucket_w: f64,
    bucket_h: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<AgentId>>,
    positions: BTreeMap<AgentId, Point>,
}

impl ContinuousSpace {
    pub fn new(width: f64, height: f64, torus: bool, cell_size: f64) -> Result<ContinuousSpace> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "space dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if !valid(cell_size) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "bucket size must be positive, got {}",
                cell_size
            )));
        }
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);
        let count = cols.checked_mul(rows).ok_or_else(|| {
            SimulationError::InvalidConfiguration(format!(
                "bucket size {} is too small for a {}x{} space",
                cell_size, width, height
            ))
        })?;
        Ok(ContinuousSpace {
            width,
            height,
            torus,
            bucket_w: width / cols as f64,
            bucket_h: height / rows as f64,
            cols,
            rows,
            buckets: vec![Vec::new(); count],
            positions: BTreeMap::new(),
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }
    pub fn height(&self) -> f64 {
        self.height
    }
    pub fn is_torus(&self) -> bool {
        self.torus
    }

    fn normalize(&self, p: Point) -> Result<Point> {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(SimulationError::out_of_bounds(p, self.width, self.height));
        }
        if self.torus {
            // rem_euclid of a tiny negative value can round up to the modulus itself
            let wrap = |v: f64, m: f64| {
                let r = v.rem_euclid(m);
                if r >= m {
                    0.0
                } else {
                    r
                }
            };
            return Ok(Point::new(wrap(p.x, self.width), wrap(p.y, self.height)));
        }
        if p.x >= 0.0 && p.x < self.width && p.y >= 0.0 && p.y < self.height {
            Ok(p)
        } else {
            Err(SimulationError::out_of_bounds(p, self.width, self.height))
        }
    }

    fn bucket_coords(&self, p: Point) -> (i64, i64) {
        (
            (p.x / self.bucket_w).floor() as i64,
            (p.y / self.bucket_h).floor() as i64,
        )
    }

    fn bucket_of(&self, p: Point) -> usize {
        let (c, r) = self.bucket_coords(p);
        let c = (c.max(0) as usize).min(self.cols - 1);
        let r = (r.max(0) as usize).min(self.rows - 1);
        r * self.cols + c
    }

    pub fn place_agent(&mut self, agent: AgentId, pos: Point) -> Result<()> {
        if self.positions.contains_key(&agent) {
            return self.move_agent(agent, pos);
        }
        let pos = self.normalize(pos)?;
        let idx = self.bucket_of(pos);
        self.buckets[idx].binary_insert(agent);
        self.positions.insert(agent, pos);
        Ok(())
    }

    /// Moves an already placed agent. On error nothing changes.
    pub fn move_agent(&mut self, agent: AgentId, pos: Point) -> Result<()> {
        let pos = self.normalize(pos)?;
        let old = *self
            .positions
            .get(&agent)
            .ok_or(SimulationError::UnknownAgent(agent))?;
        let (old_idx, new_idx) = (self.bucket_of(old), self.bucket_of(pos));
        if old_idx != new_idx {
            self.buckets[old_idx].binary_remove(agent);
            self.buckets[new_idx].binary_insert(agent);
        }
        self.positions.insert(agent, pos);
        Ok(())
    }

    pub fn position_of(&self, agent: AgentId) -> Option<Point> {
        self.positions.get(&agent).copied()
    }

    /// Shortest vector from `from` to `to`, wrapped on a torus.
    pub fn heading(&self, from: Point, to: Point) -> Point {
        let mut d = to - from;
        if self.torus {
            if d.x.abs() > self.width / 2.0 {
                d.x -= self.width.copysign(d.x);
            }
            if d.y.abs() > self.height / 2.0 {
                d.y -= self.height.copysign(d.y);
            }
        }
        d
    }

    pub fn distance(&self, a: Point, b: Point) -> f64 {
        self.heading(a, b).length()
    }

    /// Bucket indices along one axis covering `[lo, hi]`, wrapped on a torus.
    fn axis_span(&self, lo: i64, hi: i64, count: usize) -> Vec<usize> {
        let n = count as i64;
        if self.torus {
            // one extra bucket each side absorbs rounding in `bucket_coords`
            let (lo, hi) = (lo - 1, hi + 1);
            if hi - lo + 1 >= n {
                return (0..count).collect();
            }
            (lo..=hi).map(|i| i.rem_euclid(n) as usize).collect()
        } else {
            let lo = lo.max(0);
            let hi = hi.min(n - 1);
            (lo..=hi).map(|i| i as usize).collect()
        }
    }

    /// Agents strictly closer than `radius` to `center`, in ascending id order.
    /// `exclude` is left out of the result, typically the querying agent itself.
    pub fn neighbors_within(
        &self,
        center: Point,
        radius: f64,
        exclude: Option<AgentId>,
    ) -> Vec<AgentId> {
        if !(radius > 0.0) {
            return vec![];
        }
        let (c_lo, r_lo) = self.bucket_coords(Point::new(center.x - radius, center.y - radius));
        let (c_hi, r_hi) = self.bucket_coords(Point::new(center.x + radius, center.y + radius));
        let cols = self.axis_span(c_lo, c_hi, self.cols);
        let rows = self.axis_span(r_lo, r_hi, self.rows);

        let mut found = vec![];
        for r in rows.iter() {
            for c in cols.iter() {
                for agent in self.buckets[r * self.cols + c].iter() {
                    if Some(*agent) == exclude {
                        continue;
                    }
                    if let Some(p) = self.positions.get(agent) {
                        if self.distance(center, *p) < radius {
                            found.push(*agent);
                        }
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    pub fn agent_count(&self) -> usize {
        self.positions.len()
    }

    pub fn occupancy(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    pub fn iter_positions(&self) -> impl Iterator<Item = (AgentId, Point)> + '_ {
        self.positions.iter().map(|(id, pos)| (*id, *pos))
    }
}
