use crate::expression::{BinaryOp, Expr, Function, VarId};
use crate::validate::validate;
use crate::Error;

use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct ExpressionParser;

impl Expr {
    /// Trims, validates and parses untrusted user input.
    ///
    /// Character validation runs first, so input such as `x; rm -rf` is
    /// rejected with [`Error::InvalidCharacter`] before the grammar is
    /// consulted.
    pub fn compile(input: &str) -> Result<Self, Error> {
        let expr = Self::parse(validate(input.trim())?)?;
        log::trace!("compiled {input:?} into {expr}");
        Ok(expr)
    }

    /// Parse the expression from `input` without character validation.
    ///
    /// Operators bind, loosest first: `+ -`, `* /`, unary `-`, then `^`
    /// (right-associative). There is no implicit multiplication.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut pairs = ExpressionParser::parse(Rule::calculation, input)?;
        match pairs.next() {
            Some(expr) if expr.as_rule() == Rule::expr => climb_recursive(expr.into_inner()),
            _ => Err(Error::syntax(0, "expected an expression")),
        }
    }
}

static PRATT_PARSER: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    use Assoc::*;
    use Rule::*;

    PrattParser::new()
        .op(Op::infix(add, Left) | Op::infix(subtract, Left))
        .op(Op::infix(multiply, Left) | Op::infix(divide, Left))
        .op(Op::prefix(neg))
        .op(Op::infix(power, Right))
});

fn climb_recursive(input: Pairs<Rule>) -> Result<Expr, Error> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op: Pair<Rule>, rhs: Result<Expr, Error>| match op.as_rule() {
            Rule::neg => Ok(Expr::Neg(Box::new(rhs?))),
            x => Err(Error::syntax(
                op.as_span().start(),
                format!("unexpected prefix operator {x:?}"),
            )),
        })
        .map_infix(
            |lhs: Result<Expr, Error>, op: Pair<Rule>, rhs: Result<Expr, Error>| {
                let op = match op.as_rule() {
                    Rule::add => BinaryOp::Add,
                    Rule::subtract => BinaryOp::Sub,
                    Rule::multiply => BinaryOp::Mul,
                    Rule::divide => BinaryOp::Div,
                    Rule::power => BinaryOp::Pow,
                    x => {
                        return Err(Error::syntax(
                            op.as_span().start(),
                            format!("unexpected operator {x:?}"),
                        ))
                    }
                };
                Ok(Expr::binary(op, lhs?, rhs?))
            },
        )
        .parse(input)
}

fn parse_primary(pair: Pair<Rule>) -> Result<Expr, Error> {
    let position = pair.as_span().start();
    match pair.as_rule() {
        Rule::expr => climb_recursive(pair.into_inner()),
        Rule::number => match pair.as_str().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Expr::Number(value)),
            Ok(_) => Err(Error::syntax(
                position,
                format!("number `{}` is out of range", pair.as_str()),
            )),
            Err(_) => Err(Error::syntax(
                position,
                format!("invalid number `{}`", pair.as_str()),
            )),
        },
        Rule::identifier => {
            let name = pair.as_str();
            if let Some(var) = VarId::from_name(name) {
                Ok(Expr::Variable(var))
            } else if Function::from_name(name).is_some() {
                Err(Error::syntax(
                    position,
                    format!("function `{name}` must be followed by `(`"),
                ))
            } else {
                Err(Error::syntax(
                    position,
                    format!("unknown name `{name}`; operators between factors are required"),
                ))
            }
        }
        Rule::call => parse_call(pair),
        x => Err(Error::syntax(position, format!("unexpected {x:?}"))),
    }
}

fn parse_call(pair: Pair<Rule>) -> Result<Expr, Error> {
    let position = pair.as_span().start();
    let text = pair.as_str();
    let mut inner = pair.into_inner();
    let (Some(name), Some(arg)) = (inner.next(), inner.next()) else {
        return Err(Error::syntax(position, "malformed function call"));
    };
    let name = name.as_str();

    if VarId::from_name(name).is_some() {
        return Err(Error::syntax(
            position,
            format!("implicit multiplication is not supported; write `{name}*(...)`"),
        ));
    }
    let Some(function) = Function::from_name(name) else {
        return Err(Error::UnknownFunction {
            name: name.to_string(),
            position,
        });
    };
    if !text[name.len()..].starts_with('(') {
        return Err(Error::syntax(
            position + name.len(),
            format!("function `{function}` must be immediately followed by `(`"),
        ));
    }

    Ok(Expr::Call(function, Box::new(climb_recursive(arg.into_inner())?)))
}
