//! Separating curve between the basins of two equilibria.
//!
//! The region is covered by a dense grid. Each evaluated cell is classified
//! by a short RK4 run from its coordinate: the cell belongs to whichever
//! equilibrium the final state is closer to. Columns are processed left to
//! right and each one records at most one boundary point, where two
//! vertically adjacent cells carry opposite labels.
//!
//! Only the first column is scanned in full. Every later column scans a band
//! of rows centred on the previous column's boundary row, so the boundary is
//! assumed to move by less than the band half-width per column. A column in
//! which the band holds no sign flip emits nothing and leaves the band where
//! it was, which means a boundary that moves faster than the band can be
//! lost for the rest of the trace.

use crate::{
    equilibrium::sort_by_y,
    error::PortraitError,
    observer::PortraitObserver,
    params::ParameterSet,
    point::Point,
    solvers::Rk4,
    traits::ScalarField,
};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Ordered boundary points, at most one per grid column, ascending in x.
pub type BoundaryCurve = Vec<Point>;

/// Largest number of grid cells a trace may allocate labels for.
pub const MAX_GRID_CELLS: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinSettings {
    /// One corner of the traced region.
    pub point_start: Point,
    /// The opposite corner.
    pub point_end: Point,
    /// Grid columns.
    pub len_x: usize,
    /// Grid rows.
    pub len_y: usize,
    /// Half-height of the row band scanned after the first column.
    pub window: usize,
    /// RK4 steps used to classify one cell.
    pub steps: usize,
    /// RK4 step size used to classify one cell.
    pub h_step: f64,
}

impl Default for BasinSettings {
    fn default() -> Self {
        Self {
            point_start: Point::new(0.0, 1.0),
            point_end: Point::new(1.0, 8.0),
            len_x: 1500,
            len_y: 1000,
            window: 20,
            steps: 500,
            h_step: 0.0002,
        }
    }
}

impl BasinSettings {
    pub fn validate(&self) -> Result<(), PortraitError> {
        let invalid = |msg: String| Err(PortraitError::InvalidSettings(msg));
        if !self.point_start.is_finite() || !self.point_end.is_finite() {
            return invalid("basin region corners must be finite".into());
        }
        if self.point_start.x == self.point_end.x || self.point_start.y == self.point_end.y {
            return invalid(format!(
                "basin region {} .. {} has zero area",
                self.point_start, self.point_end
            ));
        }
        if self.len_x == 0 || self.len_y < 2 {
            return invalid(format!(
                "basin grid needs at least 1 column and 2 rows, got {}x{}",
                self.len_x, self.len_y
            ));
        }
        let cells = (self.len_x.checked_add(1))
            .zip(self.len_y.checked_add(1))
            .and_then(|(cols, rows)| cols.checked_mul(rows));
        match cells {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return invalid(format!(
                    "basin grid {}x{} exceeds {MAX_GRID_CELLS} cells",
                    self.len_x, self.len_y
                ))
            }
        }
        if self.window == 0 {
            return invalid("basin window must be at least one row".into());
        }
        if !self.h_step.is_finite() || self.h_step == 0.0 {
            return invalid(format!("basin step size must be finite and non-zero, got {}", self.h_step));
        }
        Ok(())
    }
}

/// Shared flag for stopping a long trace from another thread or callback.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Classification of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum BasinLabel {
    /// Not evaluated, or its classification run overflowed.
    #[default]
    Unclassified = 0,
    /// Closer to the lower equilibrium.
    Lower = 1,
    /// Closer to the upper equilibrium.
    Upper = -1,
}

impl BasinLabel {
    /// Opposite non-zero labels.
    pub fn flips_to(self, other: BasinLabel) -> bool {
        matches!(
            (self, other),
            (BasinLabel::Lower, BasinLabel::Upper) | (BasinLabel::Upper, BasinLabel::Lower)
        )
    }
}

/// Dense `(len_y + 1) x (len_x + 1)` grid over a normalized region.
#[derive(Debug, Clone)]
pub struct BoundaryGrid {
    origin: Point,
    step_x: f64,
    step_y: f64,
    rows: usize,
    cols: usize,
    labels: Vec<BasinLabel>,
}

impl BoundaryGrid {
    /// `corner_a` and `corner_b` may be any two opposite corners.
    pub fn new(corner_a: Point, corner_b: Point, len_x: usize, len_y: usize) -> Self {
        let origin = Point::new(corner_a.x.min(corner_b.x), corner_a.y.min(corner_b.y));
        let end = Point::new(corner_a.x.max(corner_b.x), corner_a.y.max(corner_b.y));
        let rows = len_y + 1;
        let cols = len_x + 1;
        Self {
            origin,
            step_x: (end.x - origin.x) / len_x as f64,
            step_y: (end.y - origin.y) / len_y as f64,
            rows,
            cols,
            labels: vec![BasinLabel::Unclassified; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Coordinate of the cell at `row`, `col`.
    pub fn point(&self, row: usize, col: usize) -> Point {
        Point::new(
            self.origin.x + self.step_x * col as f64,
            self.origin.y + self.step_y * row as f64,
        )
    }

    pub fn label(&self, row: usize, col: usize) -> BasinLabel {
        self.labels[row * self.cols + col]
    }

    pub fn set_label(&mut self, row: usize, col: usize, label: BasinLabel) {
        self.labels[row * self.cols + col] = label;
    }
}

/// Resumable basin boundary trace; see the module docs for the algorithm.
pub struct BasinBoundaryTracer<F, G> {
    f_dx: F,
    f_dy: G,
    params: ParameterSet,
    equilibria: [Point; 2],
    settings: BasinSettings,
    grid: BoundaryGrid,
    curve: BoundaryCurve,
    column: usize,
    prev_row: usize,
    cancel: CancellationToken,
    parallel: bool,
}

impl<F, G> BasinBoundaryTracer<F, G>
where
    F: ScalarField,
    G: ScalarField,
{
    /// Fails with [`PortraitError::UnsupportedBasinCount`] unless exactly two
    /// equilibria are supplied. They are ordered by ascending y.
    pub fn new(
        f_dx: F,
        f_dy: G,
        params: ParameterSet,
        equilibria: &[Point],
        settings: BasinSettings,
    ) -> Result<Self, PortraitError> {
        if equilibria.len() != 2 {
            return Err(PortraitError::UnsupportedBasinCount(equilibria.len()));
        }
        settings.validate()?;
        let sorted = sort_by_y(equilibria);

        Ok(Self {
            f_dx,
            f_dy,
            params,
            equilibria: [sorted[0], sorted[1]],
            grid: BoundaryGrid::new(
                settings.point_start,
                settings.point_end,
                settings.len_x,
                settings.len_y,
            ),
            settings,
            curve: Vec::new(),
            column: 0,
            prev_row: 0,
            cancel: CancellationToken::default(),
            parallel: cfg!(feature = "parallel"),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Classifies every cell on the calling thread, even with the
    /// `parallel` feature enabled.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn equilibria(&self) -> [Point; 2] {
        self.equilibria
    }

    pub fn grid(&self) -> &BoundaryGrid {
        &self.grid
    }

    pub fn curve(&self) -> &BoundaryCurve {
        &self.curve
    }

    pub fn columns_done(&self) -> usize {
        self.column
    }

    pub fn columns_total(&self) -> usize {
        self.settings.len_x
    }

    pub fn is_done(&self) -> bool {
        self.column >= self.settings.len_x
    }

    /// Processes up to `batch` further columns and returns how many ran.
    pub fn run_columns(
        &mut self,
        batch: usize,
        observer: &mut dyn PortraitObserver,
    ) -> Result<usize, PortraitError> {
        let mut done = 0;
        while done < batch && !self.is_done() {
            if self.cancel.is_cancelled() {
                return Err(PortraitError::Cancelled);
            }
            self.trace_column(self.column, observer)?;
            self.column += 1;
            done += 1;
        }
        Ok(done)
    }

    /// Runs every remaining column.
    pub fn trace(mut self, observer: &mut dyn PortraitObserver) -> Result<BoundaryCurve, PortraitError> {
        self.run_columns(usize::MAX, observer)?;
        Ok(self.curve)
    }

    pub fn into_curve(self) -> BoundaryCurve {
        self.curve
    }

    fn window(&self, column: usize) -> Range<usize> {
        let len_y = self.settings.len_y;
        if column == 0 {
            return 0..len_y;
        }
        let start = self.prev_row.saturating_sub(self.settings.window);
        let end = self.prev_row.saturating_add(self.settings.window).min(len_y);
        start..end
    }

    fn classify(&self, seed: Point) -> BasinLabel {
        let stepper = Rk4::new(&self.f_dx, &self.f_dy, self.settings.h_step, &self.params);
        match stepper.integrate_final(seed, self.settings.steps) {
            Ok(last) => {
                if last.distance(&self.equilibria[0]) <= last.distance(&self.equilibria[1]) {
                    BasinLabel::Lower
                } else {
                    BasinLabel::Upper
                }
            }
            // Divergent seeds stay unclassified instead of failing the trace.
            Err(_) => BasinLabel::Unclassified,
        }
    }

    /// Labels the whole window up front. Returns whether it did.
    #[cfg(feature = "parallel")]
    fn classify_window(&mut self, column: usize, rows: Range<usize>) -> Result<bool, PortraitError> {
        let this = &*self;
        let labels: Vec<BasinLabel> = rows
            .clone()
            .into_par_iter()
            .map(|row| {
                if this.cancel.is_cancelled() {
                    BasinLabel::Unclassified
                } else {
                    this.classify(this.grid.point(row, column))
                }
            })
            .collect();
        if self.cancel.is_cancelled() {
            return Err(PortraitError::Cancelled);
        }
        for (row, label) in rows.zip(labels) {
            self.grid.set_label(row, column, label);
        }
        Ok(true)
    }

    #[cfg(not(feature = "parallel"))]
    fn classify_window(&mut self, _column: usize, _rows: Range<usize>) -> Result<bool, PortraitError> {
        Ok(false)
    }

    fn trace_column(
        &mut self,
        column: usize,
        observer: &mut dyn PortraitObserver,
    ) -> Result<(), PortraitError> {
        let rows = self.window(column);
        let classified = self.parallel && self.classify_window(column, rows.clone())?;

        for row in rows.clone() {
            if !classified {
                if self.cancel.is_cancelled() {
                    return Err(PortraitError::Cancelled);
                }
                let label = self.classify(self.grid.point(row, column));
                self.grid.set_label(row, column, label);
            }

            if row > rows.start
                && self
                    .grid
                    .label(row - 1, column)
                    .flips_to(self.grid.label(row, column))
            {
                let below = self.grid.point(row - 1, column);
                let above = self.grid.point(row, column);
                let point = Point::new(above.x, (below.y + above.y) / 2.0);
                self.curve.push(point);
                self.prev_row = row;
                observer.boundary_point_found(column, point);
                break;
            }
        }
        Ok(())
    }
}

/// Traces the full separating curve in one call.
pub fn trace_basin_boundary<F, G>(
    f_dx: F,
    f_dy: G,
    params: ParameterSet,
    equilibria: &[Point],
    settings: BasinSettings,
    observer: &mut dyn PortraitObserver,
) -> Result<BoundaryCurve, PortraitError>
where
    F: ScalarField,
    G: ScalarField,
{
    BasinBoundaryTracer::new(f_dx, f_dy, params, equilibria, settings)?.trace(observer)
}
