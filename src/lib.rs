//! Safe math expression parser and numeric sampler for plotting.
//!
//! # Why?
//!
//! Plotting a user-typed formula must never hand that string to an
//! interpreter. Input is checked against a fixed alphabet, parsed into an
//! explicit [`Expr`] tree, and evaluated with every undefined result (division
//! by zero, `sqrt(-1)`, `log(0)`, overflow) turned into NaN instead of an
//! error. Curves and surfaces are then sampled column-wise over a [`Grid`]
//! (with optional data parallelism via the `rayon` feature) as the function
//! itself, its forward-difference derivative, or its running integral.
//!
//! # Example
//!
//! ```rust
//! use plot_expr::*;
//!
//! let parsed = Expr::compile("2 * sin(x) + x^2").unwrap();
//! assert_eq!(parsed.evaluate(&Environment::new(0.0)), 0.0);
//!
//! let grid = Grid::new(0.0, 1.0, 0.5).unwrap();
//! let samples = Sampler::default().sample(&parsed, Mode::Integral, &grid);
//! assert_eq!(samples.len(), 3);
//! assert_eq!(samples[0].output, 0.0);
//!
//! assert!(matches!(
//!     Expr::compile("x; rm -rf"),
//!     Err(Error::InvalidCharacter { character: ';', .. })
//! ));
//! ```

mod error;
mod evaluate;
mod expression;
mod parse;
mod plot;
mod sample;
mod validate;

/// Uses the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use error::{Error, INPUT_HINT};
pub use evaluate::{finite_or_nan, Registers};
pub use expression::*;
pub use plot::{plot, Plot, PlotConfig, PlotSeries, PlotSurface};
pub use sample::{
    Grid, Grid2d, Mode, Sample, Sampler, Surface, DERIVATIVE_STEP, MAX_GRID_POINTS,
};
pub use validate::validate;

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str, x: f64) -> f64 {
        Expr::compile(input).unwrap().evaluate(&Environment::new(x))
    }

    #[test]
    fn evaluates_expressions() {
        assert_eq!(eval("x^2", 3.0), 9.0);
        assert!(eval("sin(x)", 0.0).abs() < 1e-9);
        assert!(eval("sqrt(x)", -1.0).is_nan());
        assert_eq!(eval("2^3^2", 0.0), 512.0);
    }

    #[test]
    fn rejects_before_evaluation() {
        assert!(matches!(
            Expr::compile("sinx"),
            Err(Error::SyntaxError { .. })
        ));
        assert!(matches!(
            Expr::parse("foo(x)"),
            Err(Error::UnknownFunction { .. })
        ));
        assert!(matches!(
            Expr::compile("x; rm -rf"),
            Err(Error::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn derivative_of_square() {
        let parsed = Expr::compile("x^2").unwrap();
        let samples = Sampler::default().sample(&parsed, Mode::Derivative, &Grid::default());
        let at_five = samples
            .iter()
            .find(|s| (s.input - 5.0).abs() < 1e-9)
            .unwrap();
        assert!((at_five.output - 10.0).abs() < 0.05);
        for sample in &samples {
            assert!((sample.output - 2.0 * sample.input).abs() < 0.05, "{sample:?}");
        }
    }

    #[test]
    fn integral_of_constant() {
        let parsed = Expr::compile("1").unwrap();
        let grid = Grid::new(0.0, 1.0, 0.1).unwrap();
        let samples = Sampler::default().sample(&parsed, Mode::Integral, &grid);
        assert!(samples.windows(2).all(|w| w[0].output < w[1].output));
        // The first term is already included, so 11 points sum to 1.1.
        let last = samples.last().unwrap().output;
        assert!((last - 1.1).abs() < 1e-9, "{last}");
    }

    #[test]
    fn surface_of_sum() {
        let parsed = Expr::compile("x+y").unwrap();
        let axis = Grid::new(-1.0, 1.0, 1.0).unwrap();
        let surface = Sampler::default().sample_surface(
            &parsed,
            Mode::Function,
            &Grid2d { x: axis, y: axis },
        );
        assert_eq!((surface.rows(), surface.cols()), (3, 3));
        assert_eq!(surface.get(1, 1), Some(0.0));
        assert_eq!(surface.get(0, 0), Some(-2.0));
        assert_eq!(surface.get(2, 2), Some(2.0));
        assert_eq!(surface.get(0, 2), Some(0.0));
    }

    #[test]
    fn real_bench() {
        let parsed = Expr::compile("(x + (x^2 - 4*x*y)^0.5) / (2*x) + sin(y)").unwrap();
        let axis = Grid::new(-100.0, 100.0, 0.5).unwrap();
        let grid = Grid2d { x: axis, y: axis };

        let start = std::time::Instant::now();
        let surface = Sampler::default().sample_surface(&parsed, Mode::Derivative, &grid);
        let elapsed = start.elapsed().as_millis();
        let len = surface.values.len() as u128;
        println!(
            "Took {elapsed} ms, {} ns per element",
            (1_000_000 * elapsed) / len
        );
        assert_eq!(len, 401 * 401);
    }
}
