use crate::expression::{BinaryOp, Environment, Expr, Function};

#[cfg(feature = "rayon")]
use rayon::prelude::{
    IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
    ParallelExtend, ParallelIterator,
};

impl BinaryOp {
    /// Applies the operator, yielding NaN for undefined or infinite results.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        finite_or_nan(match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div if rhs == 0.0 => f64::NAN,
            Self::Div => lhs / rhs,
            // `powf` maps `NaN^0` and `1^NaN` to 1; an undefined operand stays undefined.
            Self::Pow if lhs.is_nan() || rhs.is_nan() => f64::NAN,
            // 0^0 is indeterminate.
            Self::Pow if lhs == 0.0 && rhs == 0.0 => f64::NAN,
            Self::Pow => lhs.powf(rhs),
        })
    }
}

impl Function {
    /// Applies the function, yielding NaN outside its domain or on overflow.
    pub fn apply(self, arg: f64) -> f64 {
        finite_or_nan(match self {
            Self::Sin => arg.sin(),
            Self::Cos => arg.cos(),
            Self::Tan => arg.tan(),
            Self::Sqrt if arg < 0.0 => f64::NAN,
            Self::Sqrt => arg.sqrt(),
            Self::Log if arg <= 0.0 => f64::NAN,
            Self::Log => arg.ln(),
            Self::Exp => arg.exp(),
        })
    }
}

/// Replaces infinities with the not-a-number sentinel.
pub fn finite_or_nan(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::NAN
    }
}

impl Expr {
    /// Evaluates the expression at a single point.
    ///
    /// Never fails: anything undefined at this point (division by zero,
    /// `sqrt(-1)`, `log(0)`, overflow) comes back as NaN. Every operator and
    /// function maps an infinite result to NaN where it occurs, so an
    /// overflowed subexpression cannot turn finite again further up the tree.
    pub fn evaluate(&self, env: &Environment) -> f64 {
        finite_or_nan(self.evaluate_recursive(env))
    }

    fn evaluate_recursive(&self, env: &Environment) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::Variable(var) => env.get(*var),
            Self::BinaryOp(op, lhs, rhs) => {
                op.apply(lhs.evaluate_recursive(env), rhs.evaluate_recursive(env))
            }
            Self::Neg(only) => -only.evaluate_recursive(env),
            Self::Call(function, arg) => function.apply(arg.evaluate_recursive(env)),
        }
    }

    /// Calculates the results of the expression component-wise over whole
    /// columns of input.
    ///
    /// `bindings` is indexed by [`VarId::index`](crate::VarId::index): `x`
    /// first, then `y`. A missing `y` column reads as NaN. Agrees element-wise
    /// with [`Expr::evaluate`].
    pub fn evaluate_columns<R: AsRef<[f64]>>(
        &self,
        bindings: &[R],
        registers: &mut Registers,
    ) -> Vec<f64> {
        validate_bindings(bindings, registers.register_length);
        let mut output = match self.evaluate_operand(bindings, registers) {
            // The entire expression is the identity map of one binding.
            Operand::Borrowed(values) => {
                let mut output = registers.allocate();
                output.extend_from_slice(values);
                output
            }
            Operand::Owned(values) => values,
        };

        #[cfg(feature = "rayon")]
        output.par_iter_mut().for_each(|v| *v = finite_or_nan(*v));
        #[cfg(not(feature = "rayon"))]
        output.iter_mut().for_each(|v| *v = finite_or_nan(*v));

        output
    }

    fn evaluate_column_recursive<R: AsRef<[f64]>>(
        &self,
        bindings: &[R],
        registers: &mut Registers,
    ) -> Vec<f64> {
        match self {
            Self::Number(value) => {
                let mut output = registers.allocate();
                output.extend(std::iter::repeat(*value).take(registers.register_length));
                output
            }
            // Only reached for a missing binding; present ones are borrowed.
            Self::Variable(_) => {
                let mut output = registers.allocate();
                output.extend(std::iter::repeat(f64::NAN).take(registers.register_length));
                output
            }
            Self::BinaryOp(op, lhs, rhs) => {
                let op = *op;
                evaluate_binary_op(move |l, r| op.apply(l, r), lhs, rhs, bindings, registers)
            }
            Self::Neg(only) => evaluate_unary_op(|v| -v, only, bindings, registers),
            Self::Call(function, arg) => {
                let function = *function;
                evaluate_unary_op(move |v| function.apply(v), arg, bindings, registers)
            }
        }
    }

    /// Before doing recursive evaluation, we check first if we already have
    /// input values in our bindings. This avoids unnecessary copies.
    fn evaluate_operand<'a, R: AsRef<[f64]>>(
        &self,
        bindings: &'a [R],
        registers: &mut Registers,
    ) -> Operand<'a> {
        match self {
            Self::Variable(var) if var.index() < bindings.len() => {
                Operand::Borrowed(bindings[var.index()].as_ref())
            }
            _ => Operand::Owned(self.evaluate_column_recursive(bindings, registers)),
        }
    }
}

enum Operand<'a> {
    Borrowed(&'a [f64]),
    Owned(Vec<f64>),
}

impl Operand<'_> {
    fn as_slice(&self) -> &[f64] {
        match self {
            Self::Borrowed(values) => values,
            Self::Owned(values) => values,
        }
    }

    fn recycle(self, registers: &mut Registers) {
        if let Self::Owned(values) = self {
            registers.recycle(values);
        }
    }
}

fn validate_bindings<B: AsRef<[f64]>>(input_bindings: &[B], expected_length: usize) {
    for b in input_bindings.iter() {
        assert_eq!(b.as_ref().len(), expected_length);
    }
}

fn evaluate_binary_op<R: AsRef<[f64]>>(
    op: impl Fn(f64, f64) -> f64 + Send + Sync,
    lhs: &Expr,
    rhs: &Expr,
    bindings: &[R],
    registers: &mut Registers,
) -> Vec<f64> {
    let lhs_values = lhs.evaluate_operand(bindings, registers);
    let rhs_values = rhs.evaluate_operand(bindings, registers);
    // Allocate this output register as lazily as possible.
    let mut output = registers.allocate();

    #[cfg(feature = "rayon")]
    {
        output.par_extend(
            lhs_values
                .as_slice()
                .par_iter()
                .zip(rhs_values.as_slice().par_iter())
                .map(|(lhs, rhs)| op(*lhs, *rhs)),
        );
    }
    #[cfg(not(feature = "rayon"))]
    {
        output.extend(
            lhs_values
                .as_slice()
                .iter()
                .zip(rhs_values.as_slice().iter())
                .map(|(lhs, rhs)| op(*lhs, *rhs)),
        );
    }

    lhs_values.recycle(registers);
    rhs_values.recycle(registers);
    output
}

fn evaluate_unary_op<R: AsRef<[f64]>>(
    op: impl Fn(f64) -> f64 + Send + Sync,
    only: &Expr,
    bindings: &[R],
    registers: &mut Registers,
) -> Vec<f64> {
    let only_values = only.evaluate_operand(bindings, registers);
    // Allocate this output register as lazily as possible.
    let mut output = registers.allocate();

    #[cfg(feature = "rayon")]
    {
        output.par_extend(only_values.as_slice().par_iter().map(|only| op(*only)));
    }
    #[cfg(not(feature = "rayon"))]
    {
        output.extend(only_values.as_slice().iter().map(|only| op(*only)));
    }

    only_values.recycle(registers);
    output
}

/// Scratch space for calculations. Can be reused across evaluations with the
/// same column length.
///
/// Attempts to minimize allocations by recycling registers after intermediate
/// calculations have finished.
pub struct Registers {
    num_allocations: usize,
    registers: Vec<Vec<f64>>,
    register_length: usize,
}

impl Registers {
    pub fn new(register_length: usize) -> Self {
        Self {
            num_allocations: 0,
            registers: vec![],
            register_length,
        }
    }

    /// Returns a finished output column so its storage can be reused.
    pub fn recycle(&mut self, mut used: Vec<f64>) {
        used.clear();
        self.registers.push(used);
    }

    fn allocate(&mut self) -> Vec<f64> {
        self.registers.pop().unwrap_or_else(|| {
            self.num_allocations += 1;
            Vec::with_capacity(self.register_length)
        })
    }

    pub fn register_length(&self) -> usize {
        self.register_length
    }

    pub fn num_allocations(&self) -> usize {
        self.num_allocations
    }
}
