//! Evaluation of the arithmetic expressions allowed wherever the configuration expects a number,
//! e.g. `"1/5.2"` for an incubation rate or `"1/6"` for the step size.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := '-'* power
//! power   := atom (('^' | '**') atom)*      right associative
//! atom    := number | name | name '(' args ')' | '(' sum ')'
//! ```
//!
//! Names are the constants `pi` and `e`; functions are `sqrt`, `exp`, `ln`/`log`, `log10`, `abs`,
//! `min` and `max`.

use chumsky::prelude::*;

use crate::error::SetupError;

type ParseError<'src> = Rich<'src, char>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Number(f64),
    Name(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parser<'src>() -> impl Parser<'src, &'src str, Expr, extra::Err<ParseError<'src>>> + Clone {
    recursive(|expr| {
        let number = text::int(10)
            .then(just('.').then(text::digits(10).or_not()).or_not())
            .then(
                one_of("eE")
                    .then(one_of("+-").or_not())
                    .then(text::digits(10))
                    .or_not(),
            )
            .to_slice()
            .try_map(|s: &str, span| {
                s.parse::<f64>()
                    .map(Expr::Number)
                    .map_err(|e| Rich::custom(span, format!("invalid number '{s}': {e}")))
            });

        let args = expr
            .clone()
            .separated_by(just(',').padded())
            .collect::<Vec<_>>()
            .delimited_by(just('(').padded(), just(')').padded());

        let name_or_call = text::ascii::ident()
            .then(args.or_not())
            .map(|(name, args): (&str, Option<Vec<Expr>>)| match args {
                Some(args) => Expr::Call {
                    name: name.to_string(),
                    args,
                },
                None => Expr::Name(name.to_string()),
            });

        let atom = choice((
            number,
            name_or_call,
            expr.delimited_by(just('(').padded(), just(')').padded()),
        ))
        .padded();

        let pow_op = just("**").or(just("^")).padded();
        let power = atom
            .clone()
            .then_ignore(pow_op)
            .repeated()
            .foldr(atom, |base, exponent| binary(BinaryOp::Pow, base, exponent));

        let unary = just('-')
            .padded()
            .repeated()
            .foldr(power, |_, operand| Expr::Neg(Box::new(operand)));

        let product = unary.clone().foldl(
            choice((just('*').to(BinaryOp::Mul), just('/').to(BinaryOp::Div)))
                .padded()
                .then(unary)
                .repeated(),
            |left, (op, right)| binary(op, left, right),
        );

        product.clone().foldl(
            choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub)))
                .padded()
                .then(product)
                .repeated(),
            |left, (op, right)| binary(op, left, right),
        )
    })
}

fn call(name: &str, args: &[f64], source: &str) -> Result<f64, SetupError> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, SetupError> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(SetupError::ConfigError(format!(
                "{name}() takes 1 argument, got {} in expression '{source}'",
                args.len()
            ))),
        }
    };
    match name {
        "sqrt" => unary(f64::sqrt),
        "exp" => unary(f64::exp),
        "ln" | "log" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "abs" => unary(f64::abs),
        "min" | "max" if !args.is_empty() => {
            let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().copied().fold(args[0], fold))
        }
        _ => Err(SetupError::ConfigError(format!(
            "unknown function '{name}' in expression '{source}'"
        ))),
    }
}

fn eval(expr: &Expr, source: &str) -> Result<f64, SetupError> {
    match expr {
        Expr::Number(x) => Ok(*x),
        Expr::Name(name) => match name.as_str() {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            _ => Err(SetupError::ConfigError(format!(
                "unknown name '{name}' in expression '{source}'"
            ))),
        },
        Expr::Neg(operand) => Ok(-eval(operand, source)?),
        Expr::Binary { op, left, right } => {
            let (l, r) = (eval(left, source)?, eval(right, source)?);
            Ok(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Pow => l.powf(r),
            })
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, source))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &args, source)
        }
    }
}

/// Parses and evaluates `source`.
///
/// # Errors
/// Returns `SetupError::ConfigError` if the text does not parse, refers to an unknown name or
/// function, or evaluates to a non-finite value.
pub fn evaluate(source: &str) -> Result<f64, SetupError> {
    let expr = parser()
        .then_ignore(end())
        .parse(source)
        .into_result()
        .map_err(|errors| {
            let details = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            SetupError::ConfigError(format!("cannot parse expression '{source}': {details}"))
        })?;
    let value = eval(&expr, source)?;
    if !value.is_finite() {
        return Err(SetupError::ConfigError(format!(
            "expression '{source}' does not evaluate to a finite number (got {value})"
        )));
    }
    Ok(value)
}
