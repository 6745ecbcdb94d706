use crate::sample::{Grid, Grid2d, Mode, Sample, Sampler, Surface, DERIVATIVE_STEP};
use crate::{Error, Expr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings for turning an expression into plot-ready data.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlotConfig {
    /// Inputs for curves of `x`.
    pub grid: Grid,
    /// Inputs for surfaces of `x` and `y`.
    pub surface_grid: Grid2d,
    pub derivative_step: f64,
    /// Label every `tick_every`-th point of a curve.
    pub tick_every: usize,
    pub label_decimals: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            surface_grid: Grid2d::default(),
            derivative_step: DERIVATIVE_STEP,
            tick_every: 20,
            label_decimals: 2,
        }
    }
}

/// Data for the renderer, which must tolerate NaN anywhere in it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Plot {
    Series(PlotSeries),
    Surface(PlotSurface),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlotSeries {
    pub title: String,
    pub label: &'static str,
    pub points: Vec<Sample>,
    /// `(point index, text)` pairs for the independent axis.
    pub tick_labels: Vec<(usize, String)>,
}

impl PlotSeries {
    /// Points with a defined output, for renderers that cannot draw gaps.
    pub fn finite_points(&self) -> impl Iterator<Item = &Sample> {
        self.points.iter().filter(|p| !p.output.is_nan())
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlotSurface {
    pub title: String,
    pub label: &'static str,
    pub surface: Surface,
}

impl Mode {
    fn title(self) -> &'static str {
        match self {
            Self::Function => "Function",
            Self::Derivative => "Derivative",
            Self::Integral => "Integral",
        }
    }

    /// Dependent-axis label.
    pub fn label(self, surface: bool) -> &'static str {
        match (self, surface) {
            (Self::Function, false) => "f(x)",
            (Self::Derivative, false) => "f'(x)",
            (Self::Integral, false) => "∫f(x)dx",
            (Self::Function, true) => "f(x,y)",
            (Self::Derivative, true) => "∂f/∂x(x,y)",
            (Self::Integral, true) => "∫f(x,y)dx",
        }
    }
}

/// Compiles `input` and samples it in `mode`.
///
/// Expressions mentioning `y` become surfaces over `config.surface_grid`;
/// everything else is a curve over `config.grid`. Any rejection of the input
/// fails the whole request.
pub fn plot(input: &str, mode: Mode, config: &PlotConfig) -> Result<Plot, Error> {
    let input = input.trim();
    let expr = Expr::compile(input)?;
    let sampler = Sampler {
        derivative_step: config.derivative_step,
    };
    let title = format!("{}: {input}", mode.title());

    if expr.uses_y() {
        log::debug!("plotting surface {title:?}");
        Ok(Plot::Surface(PlotSurface {
            title,
            label: mode.label(true),
            surface: sampler.sample_surface(&expr, mode, &config.surface_grid),
        }))
    } else {
        log::debug!("plotting series {title:?}");
        let points = sampler.sample(&expr, mode, &config.grid);
        let tick_labels = tick_labels(&points, config.tick_every, config.label_decimals);
        Ok(Plot::Series(PlotSeries {
            title,
            label: mode.label(false),
            points,
            tick_labels,
        }))
    }
}

/// Beyond this many decimals an `f64` label carries no further precision.
const MAX_LABEL_DECIMALS: usize = 15;

fn tick_labels(points: &[Sample], every: usize, decimals: usize) -> Vec<(usize, String)> {
    let decimals = decimals.min(MAX_LABEL_DECIMALS);
    let scale = 10f64.powi(decimals as i32);
    points
        .iter()
        .enumerate()
        .step_by(every.max(1))
        .map(|(i, point)| {
            // Adding zero turns a rounded -0.0 into 0.0.
            let rounded = (point.input * scale).round() / scale + 0.0;
            (i, format!("{rounded:.decimals$}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    #[test]
    fn default_series_matches_grid() {
        let Plot::Series(series) = plot("x^2", Mode::Function, &PlotConfig::default()).unwrap()
        else {
            panic!("expected a series");
        };
        assert_eq!(series.title, "Function: x^2");
        assert_eq!(series.label, "f(x)");
        assert_eq!(series.points.len(), 201);
        assert_eq!(series.points[0].input, -10.0);
        assert_eq!(series.points[0].output, 100.0);

        let ticks: Vec<&str> = series.tick_labels.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(ticks.len(), 11);
        assert_eq!(ticks[0], "-10.00");
        assert_eq!(ticks[5], "0.00");
        assert_eq!(ticks[10], "10.00");
        assert_eq!(series.tick_labels[1].0, 20);
    }

    #[test]
    fn label_decimals_are_clamped() {
        for label_decimals in [16, 400, usize::MAX] {
            let config = PlotConfig {
                label_decimals,
                ..PlotConfig::default()
            };
            let Plot::Series(series) = plot("x", Mode::Function, &config).unwrap() else {
                panic!("expected a series");
            };
            assert_eq!(series.tick_labels[0].1, "-10.000000000000000");
            assert_eq!(series.tick_labels[10].1, "10.000000000000000");
        }

        let config = PlotConfig {
            label_decimals: 0,
            ..PlotConfig::default()
        };
        let Plot::Series(series) = plot("x", Mode::Function, &config).unwrap() else {
            panic!("expected a series");
        };
        assert_eq!(series.tick_labels[0].1, "-10");
    }

    #[test]
    fn labels_per_mode() {
        for mode in Mode::iter() {
            let Plot::Series(series) = plot(" sin(x) ", mode, &PlotConfig::default()).unwrap()
            else {
                panic!("expected a series");
            };
            assert_eq!(series.label, mode.label(false));
            assert!(series.title.ends_with(": sin(x)"), "{}", series.title);
        }
    }

    #[test]
    fn y_makes_a_surface() {
        let config = PlotConfig {
            surface_grid: Grid2d {
                x: Grid::new(-1.0, 1.0, 1.0).unwrap(),
                y: Grid::new(-1.0, 1.0, 0.5).unwrap(),
            },
            ..PlotConfig::default()
        };
        let Plot::Surface(surface) = plot("x * y", Mode::Integral, &config).unwrap() else {
            panic!("expected a surface");
        };
        assert_eq!(surface.title, "Integral: x * y");
        assert_eq!(surface.label, "∫f(x,y)dx");
        assert_eq!(surface.surface.rows(), 5);
        assert_eq!(surface.surface.cols(), 3);
    }

    #[test]
    fn gaps_can_be_dropped() {
        let Plot::Series(series) = plot("log(x)", Mode::Function, &PlotConfig::default()).unwrap()
        else {
            panic!("expected a series");
        };
        assert_eq!(series.points.len(), 201);
        assert_eq!(series.finite_points().count(), 100);
    }

    #[test]
    fn rejection_yields_no_plot() {
        let err = plot("x; rm -rf", Mode::Function, &PlotConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCharacter { .. }));
        let err = plot("2x", Mode::Derivative, &PlotConfig::default()).unwrap_err();
        assert!(matches!(err, Error::SyntaxError { .. }));
    }
}
