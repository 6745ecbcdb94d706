use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed real-valued expression of `x` and optionally `y`.
///
/// Trees are immutable once parsed; evaluate them with
/// [`Expr::evaluate`] or [`Expr::evaluate_columns`].
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    // Constant.
    Number(f64),

    // Input variable.
    Variable(VarId),

    // Binary real ops.
    BinaryOp(BinaryOp, Box<Expr>, Box<Expr>),

    // Unary real ops.
    Neg(Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::BinaryOp(op, Box::new(lhs), Box::new(rhs))
    }

    /// Which variables occur anywhere in the tree.
    pub fn variables(&self) -> Variables {
        let mut found = Variables::default();
        self.collect_variables(&mut found);
        found
    }

    /// `true` when this is a surface `z = f(x, y)` rather than a curve.
    pub fn uses_y(&self) -> bool {
        self.variables().y
    }

    fn collect_variables(&self, found: &mut Variables) {
        match self {
            Self::Number(_) => {}
            Self::Variable(VarId::X) => found.x = true,
            Self::Variable(VarId::Y) => found.y = true,
            Self::BinaryOp(_, lhs, rhs) => {
                lhs.collect_variables(found);
                rhs.collect_variables(found);
            }
            Self::Neg(only) | Self::Call(_, only) => only.collect_variables(found),
        }
    }
}

/// Fully parenthesised rendering; parsing it back yields an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value:?}"),
            Self::Variable(var) => write!(f, "{var}"),
            Self::BinaryOp(op, lhs, rhs) => write!(f, "({lhs} {op} {rhs})"),
            Self::Neg(only) => write!(f, "(-{only})"),
            Self::Call(function, arg) => write!(f, "{function}({arg})"),
        }
    }
}

/// The two independent variables an expression may reference.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VarId {
    X,
    Y,
}

impl VarId {
    /// Index into the bindings passed to [`Expr::evaluate_columns`].
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" | "X" => Some(Self::X),
            "y" | "Y" => Some(Self::Y),
            _ => None,
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        })
    }
}

/// Named unary functions. Angles are in radians.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::EnumIter)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Log,
    Exp,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Exp => "exp",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        use strum::IntoEnumIterator;

        Self::iter().find(|function| function.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variables found by [`Expr::variables`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Variables {
    pub x: bool,
    pub y: bool,
}

/// Values of `x` and `y` for a single evaluation.
///
/// An environment built without `y` reads it as the not-a-number sentinel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Environment {
    values: [f64; 2],
}

impl Environment {
    pub fn new(x: f64) -> Self {
        Self {
            values: [x, f64::NAN],
        }
    }

    pub fn with_y(x: f64, y: f64) -> Self {
        Self { values: [x, y] }
    }

    pub fn get(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_lookup_ignores_case() {
        assert_eq!(Function::from_name("SQRT"), Some(Function::Sqrt));
        assert_eq!(Function::from_name("Log"), Some(Function::Log));
        assert_eq!(Function::from_name("foo"), None);
    }

    #[test]
    fn variables_are_collected() {
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::Call(Function::Sin, Box::new(Expr::Variable(VarId::Y))),
            Expr::Number(1.0),
        );
        assert_eq!(expr.variables(), Variables { x: false, y: true });
        assert!(expr.uses_y());
        assert!(!Expr::Number(1.0).uses_y());
    }

    #[test]
    fn missing_y_is_sentinel() {
        let env = Environment::new(2.0);
        assert_eq!(env.get(VarId::X), 2.0);
        assert!(env.get(VarId::Y).is_nan());
    }
}
