use crate::evaluate::{finite_or_nan, Registers};
use crate::{Error, Expr};

#[cfg(feature = "rayon")]
use rayon::prelude::{ParallelIterator, ParallelSliceMut};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Forward-difference step used by [`Mode::Derivative`].
pub const DERIVATIVE_STEP: f64 = 0.01;

/// Most points a single [`Grid`] axis may hold.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Evenly spaced sample inputs from `start` to `stop` inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "GridParts", into = "GridParts")
)]
pub struct Grid {
    start: f64,
    stop: f64,
    step: f64,
}

impl Grid {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, Error> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(Error::invalid_grid("bounds and step must be finite"));
        }
        if step <= 0.0 {
            return Err(Error::invalid_grid(format!("step {step} must be positive")));
        }
        if start > stop {
            return Err(Error::invalid_grid(format!(
                "start {start} is greater than stop {stop}"
            )));
        }
        let intervals = interval_count(start, stop, step);
        if intervals.is_nan() || intervals >= MAX_GRID_POINTS as f64 {
            return Err(Error::invalid_grid(format!(
                "more than {MAX_GRID_POINTS} points from {start} to {stop} by {step}"
            )));
        }
        Ok(Self { start, stop, step })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// `floor((stop - start) / step) + 1`, tolerant of rounding in the quotient.
    /// Never more than [`MAX_GRID_POINTS`].
    pub fn len(&self) -> usize {
        // The float-to-int cast saturates; `new` keeps it below the cap.
        (interval_count(self.start, self.stop, self.step) as usize)
            .checked_add(1)
            .map_or(MAX_GRID_POINTS, |n| n.min(MAX_GRID_POINTS))
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The `i`-th point, computed directly so error does not accumulate.
    pub fn point(&self, i: usize) -> f64 {
        (self.start + i as f64 * self.step).min(self.stop)
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        (0..self.len()).map(|i| self.point(i))
    }
}

fn interval_count(start: f64, stop: f64, step: f64) -> f64 {
    let span = stop - start;
    let err = ((start.abs() + stop.abs() + span.abs()) / step * f64::EPSILON).min(0.5);
    (span / step + err).floor()
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct GridParts {
    start: f64,
    stop: f64,
    step: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<GridParts> for Grid {
    type Error = Error;

    fn try_from(parts: GridParts) -> Result<Self, Error> {
        Self::new(parts.start, parts.stop, parts.step)
    }
}

#[cfg(feature = "serde")]
impl From<Grid> for GridParts {
    fn from(grid: Grid) -> Self {
        Self {
            start: grid.start,
            stop: grid.stop,
            step: grid.step,
        }
    }
}

/// `[-10, 10]` in steps of `0.1`.
impl Default for Grid {
    fn default() -> Self {
        Self {
            start: -10.0,
            stop: 10.0,
            step: 0.1,
        }
    }
}

/// Independent `x` (columns) and `y` (rows) grids of a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid2d {
    pub x: Grid,
    pub y: Grid,
}

/// `[-10, 10]` in steps of `0.5` on both axes.
impl Default for Grid2d {
    fn default() -> Self {
        let axis = Grid {
            step: 0.5,
            ..Grid::default()
        };
        Self { x: axis, y: axis }
    }
}

/// What to sample.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// The expression itself.
    Function,
    /// Forward finite difference along `x`.
    Derivative,
    /// Running Riemann sum along `x`.
    Integral,
}

/// One point of a curve. `output` is NaN where the curve is undefined.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    pub input: f64,
    pub output: f64,
}

/// Row-major grid of `z` values: one row per `y`, one column per `x`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Surface {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub values: Vec<f64>,
}

impl Surface {
    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols()..(row + 1) * self.cols()]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.cols().max(1))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows() && col < self.cols()).then(|| self.values[row * self.cols() + col])
    }
}

/// Drives expression evaluation over grids.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampler {
    pub derivative_step: f64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            derivative_step: DERIVATIVE_STEP,
        }
    }
}

impl Sampler {
    /// Samples a curve of `x`. Undefined points are kept as NaN, in grid order.
    pub fn sample(&self, expr: &Expr, mode: Mode, grid: &Grid) -> Vec<Sample> {
        let xs: Vec<f64> = grid.points().collect();
        log::debug!("sampling {} points in {mode} mode", xs.len());

        let outputs = self.sample_columns(expr, mode, &xs, None, xs.len(), grid.step());
        xs.into_iter()
            .zip(outputs)
            .map(|(input, output)| Sample { input, output })
            .collect()
    }

    /// Samples a surface of `x` and `y`. Each row is sampled along `x` at a
    /// fixed `y`; integrals restart at the beginning of every row.
    pub fn sample_surface(&self, expr: &Expr, mode: Mode, grid: &Grid2d) -> Surface {
        let xs: Vec<f64> = grid.x.points().collect();
        let ys: Vec<f64> = grid.y.points().collect();
        log::debug!("sampling {}x{} surface in {mode} mode", ys.len(), xs.len());

        let x_column: Vec<f64> = ys.iter().flat_map(|_| xs.iter().copied()).collect();
        let y_column: Vec<f64> = ys
            .iter()
            .flat_map(|y| std::iter::repeat(*y).take(xs.len()))
            .collect();
        let values = self.sample_columns(
            expr,
            mode,
            &x_column,
            Some(y_column.as_slice()),
            xs.len(),
            grid.x.step(),
        );

        Surface { xs, ys, values }
    }

    /// Samples flattened rows of length `row_length`.
    fn sample_columns(
        &self,
        expr: &Expr,
        mode: Mode,
        xs: &[f64],
        ys: Option<&[f64]>,
        row_length: usize,
        step: f64,
    ) -> Vec<f64> {
        let mut registers = Registers::new(xs.len());
        let evaluate = |xs: &[f64], registers: &mut Registers| match ys {
            Some(ys) => expr.evaluate_columns(&[xs, ys], registers),
            None => expr.evaluate_columns(&[xs], registers),
        };

        match mode {
            Mode::Function => evaluate(xs, &mut registers),
            Mode::Derivative => {
                let h = self.derivative_step;
                let shifted: Vec<f64> = xs.iter().map(|x| x + h).collect();
                let mut values = evaluate(xs, &mut registers);
                let ahead = evaluate(shifted.as_slice(), &mut registers);
                for (value, ahead) in values.iter_mut().zip(&ahead) {
                    // NaN on either side propagates.
                    *value = finite_or_nan((ahead - *value) / h);
                }
                registers.recycle(ahead);
                values
            }
            Mode::Integral => {
                let mut values = evaluate(xs, &mut registers);
                integrate_rows(&mut values, row_length, step);
                values
            }
        }
    }
}

/// Replaces each row with its running Riemann sum in place.
///
/// Undefined terms add nothing; the sum carries forward over them.
fn integrate_rows(values: &mut [f64], row_length: usize, step: f64) {
    if row_length == 0 {
        return;
    }
    #[cfg(feature = "rayon")]
    values
        .par_chunks_mut(row_length)
        .for_each(|row| integrate_row(row, step));
    #[cfg(not(feature = "rayon"))]
    values
        .chunks_mut(row_length)
        .for_each(|row| integrate_row(row, step));
}

fn integrate_row(row: &mut [f64], step: f64) {
    let mut integral = 0.0;
    for value in row.iter_mut() {
        if !value.is_nan() {
            integral += *value * step;
        }
        *value = integral;
    }
}
