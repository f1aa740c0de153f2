//! Expression parsing and evaluation for parameter formulas
//!
//! Formulas are parsed by a small recursive-descent grammar into an
//! [`Expression`] tree, which is then interpreted against an
//! [`EvaluationContext`]. The grammar is closed: numbers, names, the
//! operators `+ - * / % ^ **`, parentheses, and calls to the allow-listed
//! functions in [`builtins`](super::builtins). Nothing else can be expressed.

use crate::config::NonRealPolicy;
use crate::parameters::builtins;
use indexmap::{IndexMap, IndexSet};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{map, not, opt, recognize, value},
    error::ErrorKind,
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Deepest parenthesis nesting accepted by the parser
const MAX_NESTING: usize = 128;

/// Deepest expression tree accepted by the parser
const MAX_DEPTH: usize = 256;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Non-real result: {message}")]
    NonReal { message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Floored modulo (%), sign follows the divisor
    Mod,

    /// Power (^ or **)
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> ExprResult<f64> {
        match self {
            BinaryOp::Add => Ok(lhs + rhs),
            BinaryOp::Sub => Ok(lhs - rhs),
            BinaryOp::Mul => Ok(lhs * rhs),
            BinaryOp::Div | BinaryOp::Mod if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
            BinaryOp::Div => Ok(lhs / rhs),
            BinaryOp::Mod => {
                let rem = lhs % rhs;
                if rem != 0.0 && (rem < 0.0) != (rhs < 0.0) {
                    Ok(rem + rhs)
                } else {
                    Ok(rem)
                }
            }
            BinaryOp::Pow => Ok(lhs.powf(rhs)),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;
}

/// Simple implementation of EvaluationContext using a HashMap
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    variables: HashMap<String, f64>,
}

impl SimpleContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }
}

fn undefined(name: &str) -> ExpressionError {
    ExpressionError::UndefinedVariable {
        name: name.to_string(),
    }
}

impl EvaluationContext for SimpleContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.variables.get_variable(name)
    }
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name).copied().ok_or_else(|| undefined(name))
    }
}

impl EvaluationContext for IndexMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name).copied().ok_or_else(|| undefined(name))
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        if input.trim().is_empty() {
            return Err(ExpressionError::ParseError {
                message: "empty expression".to_string(),
            });
        }
        check_nesting(input)?;

        match expression(input) {
            Ok((remainder, (expr, _))) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!(
                            "unexpected input at position {}: '{}'",
                            input.len() - remainder.len(),
                            remainder
                        ),
                    })
                }
            }
            Err(nom::Err::Failure(err)) if err.code == ErrorKind::TooLarge => {
                Err(ExpressionError::ParseError {
                    message: format!("expression nested deeper than {}", MAX_DEPTH),
                })
            }
            Err(nom::Err::Failure(err)) if err.code == ErrorKind::Float => {
                Err(ExpressionError::ParseError {
                    message: format!(
                        "numeric literal out of range at position {}",
                        input.len() - err.input.len()
                    ),
                })
            }
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
                Err(ExpressionError::ParseError {
                    message: format!(
                        "unexpected input at position {}",
                        input.len() - err.input.len()
                    ),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(ExpressionError::ParseError {
                message: "incomplete expression".to_string(),
            }),
        }
    }

    /// Evaluate the expression with the given context, failing on non-real results
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        self.evaluate_with(context, NonRealPolicy::Error)
    }

    /// Evaluate the expression with the given context and non-real policy
    ///
    /// Names are looked up in `context` first and in the builtin constants
    /// second. Division and modulo by zero always fail, whatever the policy.
    pub fn evaluate_with<C: EvaluationContext + ?Sized>(
        &self,
        context: &C,
        policy: NonRealPolicy,
    ) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context
                .get_variable(name)
                .or_else(|err| builtins::constant(name).ok_or(err)),

            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate_with(context, policy)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate_with(context, policy)?;
                let rhs = right.evaluate_with(context, policy)?;
                let result = op.apply(lhs, rhs)?;
                check_real(result, &[lhs, rhs], policy, || {
                    format!("{} {} {}", lhs, op, rhs)
                })
            }

            Self::Function(name, args) => {
                let builtin = builtins::function(name).ok_or_else(|| {
                    ExpressionError::UndefinedFunction {
                        name: name.to_string(),
                    }
                })?;
                if !builtin.arity.accepts(args.len()) {
                    return Err(ExpressionError::InvalidOperation {
                        message: builtin.arity_message(args.len()),
                    });
                }

                let evaluated_args = args
                    .iter()
                    .map(|arg| arg.evaluate_with(context, policy))
                    .collect::<ExprResult<Vec<f64>>>()?;

                let result = builtin.call(&evaluated_args);
                check_real(result, &evaluated_args, policy, || {
                    let rendered: Vec<String> =
                        evaluated_args.iter().map(|a| a.to_string()).collect();
                    format!("{}({})", name, rendered.join(", "))
                })
            }
        }
    }

    /// Names this expression reads from its context, in order of first
    /// appearance. Builtin constants and function names are excluded.
    pub fn references(&self) -> IndexSet<String> {
        let mut refs = IndexSet::new();
        self.walk(&mut |node| {
            if let Self::Variable(name) = node {
                if builtins::constant(name).is_none() {
                    refs.insert(name.clone());
                }
            }
        });
        refs
    }

    /// Find all variable names used in the expression, sorted
    pub fn variables(&self) -> Vec<String> {
        let mut vars: Vec<String> = self.references().into_iter().collect();
        vars.sort();
        vars
    }

    /// Names of all functions called by the expression, in order of first appearance
    pub fn functions(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        self.walk(&mut |node| {
            if let Self::Function(name, _) = node {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Check every call against the allow-list and its arity
    pub fn validate_calls(&self) -> ExprResult<()> {
        let mut result = Ok(());
        self.walk(&mut |node| {
            if result.is_err() {
                return;
            }
            if let Self::Function(name, args) = node {
                result = match builtins::function(name) {
                    None => Err(ExpressionError::UndefinedFunction { name: name.clone() }),
                    Some(builtin) if !builtin.arity.accepts(args.len()) => {
                        Err(ExpressionError::InvalidOperation {
                            message: builtin.arity_message(args.len()),
                        })
                    }
                    Some(_) => Ok(()),
                };
            }
        });
        result
    }

    /// Return a copy with every variable renamed by `rename`.
    /// Returning `None` keeps the original name.
    pub fn rename_variables<F>(&self, rename: &mut F) -> Expression
    where
        F: FnMut(&str) -> Option<String>,
    {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Variable(name) => Self::Variable(rename(name).unwrap_or_else(|| name.clone())),
            Self::Unary(op, expr) => Self::Unary(*op, Box::new(expr.rename_variables(rename))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.rename_variables(rename)),
                Box::new(right.rename_variables(rename)),
            ),
            Self::Function(name, args) => Self::Function(
                name.clone(),
                args.iter().map(|arg| arg.rename_variables(rename)).collect(),
            ),
        }
    }

    /// Visit every node, parents before children
    fn walk<F: FnMut(&Expression)>(&self, visit: &mut F) {
        visit(self);
        match self {
            Self::Number(_) | Self::Variable(_) => {}
            Self::Unary(_, expr) => expr.walk(visit),
            Self::Binary(_, left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }
}

/// Renders a fully parenthesized formula that parses back to the same tree.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => f.write_str(name),
            Self::Unary(UnaryOp::Neg, expr) => write!(f, "(-{})", expr),
            Self::Binary(op, left, right) => write!(f, "({} {} {})", left, op, right),
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parse `formula` and return the candidate parameter names it references
pub fn extract_references(formula: &str) -> ExprResult<IndexSet<String>> {
    Ok(Expression::parse(formula)?.references())
}

fn check_real<F>(result: f64, operands: &[f64], policy: NonRealPolicy, describe: F) -> ExprResult<f64>
where
    F: FnOnce() -> String,
{
    let real_operands = operands.iter().all(|v| v.is_finite());
    if result.is_finite() || !real_operands || policy == NonRealPolicy::Propagate {
        return Ok(result);
    }
    Err(ExpressionError::NonReal {
        message: format!("{} produced {}", describe(), result),
    })
}

fn check_nesting(input: &str) -> ExprResult<()> {
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(ExpressionError::ParseError {
                        message: format!("parentheses nested deeper than {}", MAX_NESTING),
                    });
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// Parser functions using nom

/// Wrap a parser so it skips surrounding whitespace
fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Expression node paired with the depth of its tree
type Node = (Expression, usize);

fn too_deep(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))
}

/// Combine two operands, failing once the tree would exceed [`MAX_DEPTH`]
fn binary<'a>(
    input: &'a str,
    op: BinaryOp,
    (left, left_depth): Node,
    (right, right_depth): Node,
) -> Result<Node, nom::Err<nom::error::Error<&'a str>>> {
    let depth = left_depth.max(right_depth) + 1;
    if depth > MAX_DEPTH {
        return Err(too_deep(input));
    }
    Ok((Expression::Binary(op, Box::new(left), Box::new(right)), depth))
}

fn negate_if<'a>(
    input: &'a str,
    negate: bool,
    (expr, depth): Node,
) -> Result<Node, nom::Err<nom::error::Error<&'a str>>> {
    if !negate {
        return Ok((expr, depth));
    }
    if depth + 1 > MAX_DEPTH {
        return Err(too_deep(input));
    }
    Ok((Expression::Unary(UnaryOp::Neg, Box::new(expr)), depth + 1))
}

/// Parse an unsigned decimal literal: `12`, `1.5`, `.5`, `1.`, `2e-3`
///
/// Literals that overflow to infinity are rejected outright.
fn number(input: &str) -> IResult<&str, f64> {
    let (rest, literal) = recognize((
        alt((
            recognize((digit1, opt((char('.'), digit0)))),
            recognize((char('.'), digit1)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;

    match literal.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok((rest, n)),
        _ => Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Float))),
    }
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Node> {
    let (rest, (name, args)) = pair(
        ws(identifier),
        delimited(
            ws(char('(')),
            separated_list0(ws(char(',')), expression),
            ws(char(')')),
        ),
    )
    .parse(input)?;

    let depth = args.iter().map(|(_, depth)| *depth).max().unwrap_or(0) + 1;
    if depth > MAX_DEPTH {
        return Err(too_deep(input));
    }
    let args = args.into_iter().map(|(arg, _)| arg).collect();
    Ok((rest, (Expression::Function(name.to_string(), args), depth)))
}

/// Parse a primary expression (number, function call, variable, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Node> {
    alt((
        map(ws(number), |n| (Expression::Number(n), 1)),
        function_call,
        map(ws(identifier), |name: &str| {
            (Expression::Variable(name.to_string()), 1)
        }),
        delimited(ws(char('(')), expression, ws(char(')'))),
    ))
    .parse(input)
}

/// Parse a run of prefix signs; true when the run negates
fn signs(input: &str) -> IResult<&str, bool> {
    fold_many0(ws(one_of("+-")), || false, |negate, sign| {
        negate ^ (sign == '-')
    })
    .parse(input)
}

/// Parse a power chain, folding right to left; exponents may be signed (`2^-1`)
fn power(input: &str) -> IResult<&str, Node> {
    let (mut input, first) = primary(input)?;
    let mut exponents: Vec<(bool, Node)> = Vec::new();
    loop {
        let Ok((rest, _)) = ws(alt((tag("**"), tag("^")))).parse(input) else {
            break;
        };
        let (rest, negate) = signs(rest)?;
        match primary(rest) {
            Ok((rest, operand)) => {
                if exponents.len() >= MAX_DEPTH {
                    return Err(too_deep(input));
                }
                exponents.push((negate, operand));
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(err) => return Err(err),
        }
    }

    let mut tail: Option<Node> = None;
    for (negate, base) in exponents.into_iter().rev() {
        let raised = match tail.take() {
            Some(exponent) => binary(input, BinaryOp::Pow, base, exponent)?,
            None => base,
        };
        tail = Some(negate_if(input, negate, raised)?);
    }
    let node = match tail {
        Some(exponent) => binary(input, BinaryOp::Pow, first, exponent)?,
        None => first,
    };
    Ok((input, node))
}

/// Parse a unary expression; binds looser than `^`, so `-2^2` is `-(2^2)`
///
/// A run of signs collapses to at most one negation.
fn unary(input: &str) -> IResult<&str, Node> {
    let (input, negate) = signs(input)?;
    let (input, node) = power(input)?;
    let node = negate_if(input, negate, node)?;
    Ok((input, node))
}

/// Fold `operand (operator operand)*` left to right
fn fold_left<'a, O>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Node>,
    mut operator: O,
) -> IResult<&'a str, Node>
where
    O: Parser<&'a str, Output = BinaryOp, Error = nom::error::Error<&'a str>>,
{
    let (mut input, mut acc) = operand(input)?;
    loop {
        let Ok((rest, op)) = operator.parse(input) else {
            break;
        };
        match operand(rest) {
            Ok((rest, rhs)) => {
                acc = binary(input, op, acc, rhs)?;
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(err) => return Err(err),
        }
    }
    Ok((input, acc))
}

/// Parse a multiplicative expression
fn term(input: &str) -> IResult<&str, Node> {
    fold_left(
        input,
        unary,
        ws(alt((
            value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Mod, char('%')),
        ))),
    )
}

/// Parse an additive expression
fn expression(input: &str) -> IResult<&str, Node> {
    fold_left(
        input,
        term,
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
    )
}
