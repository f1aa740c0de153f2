//! Allow-listed math functions and constants available inside formulas.
//!
//! Identifiers that match an entry here are never treated as parameter
//! references, and parameters may not be named after them.

use std::f64::consts;

/// Number of arguments a builtin function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),

    /// Between `min` and `max` arguments, inclusive
    Range(usize, usize),

    /// At least this many arguments
    AtLeast(usize),
}

impl Arity {
    /// Check whether `count` arguments are acceptable
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(n) => count >= n,
        }
    }

    fn describe(self) -> String {
        match self {
            Arity::Exact(1) => "1 argument".to_string(),
            Arity::Exact(n) => format!("{} arguments", n),
            Arity::Range(min, max) => format!("{} to {} arguments", min, max),
            Arity::AtLeast(n) => format!("at least {} arguments", n),
        }
    }
}

/// An allow-listed function callable from a formula.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    func: fn(&[f64]) -> f64,
}

impl Builtin {
    /// Apply the function. Arity must already have been checked.
    pub fn call(&self, args: &[f64]) -> f64 {
        (self.func)(args)
    }

    /// Message used when a call has the wrong number of arguments
    pub fn arity_message(&self, got: usize) -> String {
        format!(
            "{}() requires {}, got {}",
            self.name,
            self.arity.describe(),
            got
        )
    }
}

const fn unary(name: &'static str, func: fn(&[f64]) -> f64) -> Builtin {
    Builtin {
        name,
        arity: Arity::Exact(1),
        func,
    }
}

static FUNCTIONS: &[Builtin] = &[
    unary("sin", |a| a[0].sin()),
    unary("cos", |a| a[0].cos()),
    unary("tan", |a| a[0].tan()),
    unary("asin", |a| a[0].asin()),
    unary("acos", |a| a[0].acos()),
    unary("atan", |a| a[0].atan()),
    unary("sinh", |a| a[0].sinh()),
    unary("cosh", |a| a[0].cosh()),
    unary("tanh", |a| a[0].tanh()),
    unary("exp", |a| a[0].exp()),
    unary("ln", |a| a[0].ln()),
    unary("log10", |a| a[0].log10()),
    unary("log2", |a| a[0].log2()),
    unary("sqrt", |a| a[0].sqrt()),
    unary("abs", |a| a[0].abs()),
    unary("floor", |a| a[0].floor()),
    unary("ceil", |a| a[0].ceil()),
    unary("round", |a| a[0].round()),
    Builtin {
        name: "atan2",
        arity: Arity::Exact(2),
        func: |a| a[0].atan2(a[1]),
    },
    Builtin {
        name: "pow",
        arity: Arity::Exact(2),
        func: |a| a[0].powf(a[1]),
    },
    Builtin {
        name: "hypot",
        arity: Arity::Exact(2),
        func: |a| a[0].hypot(a[1]),
    },
    // log(x) is the natural logarithm, log(x, base) uses the given base
    Builtin {
        name: "log",
        arity: Arity::Range(1, 2),
        func: |a| match a {
            [x] => x.ln(),
            [x, base] => x.ln() / base.ln(),
            _ => f64::NAN,
        },
    },
    Builtin {
        name: "min",
        arity: Arity::AtLeast(1),
        func: |a| a.iter().copied().fold(f64::INFINITY, f64::min),
    },
    Builtin {
        name: "max",
        arity: Arity::AtLeast(1),
        func: |a| a.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    },
];

static CONSTANTS: &[(&str, f64)] = &[("pi", consts::PI), ("e", consts::E), ("tau", consts::TAU)];

/// Look up an allow-listed function by name
pub fn function(name: &str) -> Option<&'static Builtin> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Look up an allow-listed constant by name
pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, value)| *value)
}

/// Whether `name` is reserved by the allow-list
pub fn is_builtin(name: &str) -> bool {
    function(name).is_some() || constant(name).is_some()
}

/// All reserved names, functions first
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS
        .iter()
        .map(|f| f.name)
        .chain(CONSTANTS.iter().map(|(name, _)| *name))
}
