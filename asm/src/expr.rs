use crate::{context::Context, error::Error};
use color_print::cformat;
use std::fmt;

/// Operand expression, evaluated lazily against the [`Context`] of the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i64),
    Ident(String),
    /// Address of the instruction being visited.
    InstrAddr,
    /// Skip-reach address of the instruction being visited.
    SkipAddr,
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::Add(Box::new(a), Box::new(b))
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    pub fn eval(&self, context: &Context) -> Result<i64, Error> {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Ident(name) => context.resolve(name),
            Expr::InstrAddr => Ok(context.instr_addr()),
            Expr::SkipAddr => Ok(context.skip_addr()),
            Expr::Add(a, b) => a
                .eval(context)?
                .checked_add(b.eval(context)?)
                .ok_or_else(|| Error::Overflow(self.to_string())),
            Expr::Sub(a, b) => a
                .eval(context)?
                .checked_sub(b.eval(context)?)
                .ok_or_else(|| Error::Overflow(self.to_string())),
        }
    }

    /// The plain identifier this expression consists of, if any.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// True if the value can only stay equal or decrease while instructions shrink.
    ///
    /// Label addresses never grow during optimization, so a sum of identifiers and
    /// non-negative literals never grows and never drops below zero.
    pub fn shrinks_monotonically(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Ident(_) => true,
            Expr::Add(..) => self.is_constant() || self.is_non_negative_sum(),
            Expr::Sub(..) | Expr::InstrAddr | Expr::SkipAddr => self.is_constant(),
        }
    }

    fn is_non_negative_sum(&self) -> bool {
        match self {
            Expr::Literal(v) => *v >= 0,
            Expr::Ident(_) => true,
            Expr::Add(a, b) => a.is_non_negative_sum() && b.is_non_negative_sum(),
            _ => false,
        }
    }

    /// True if no identifier or cursor is involved.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Ident(_) | Expr::InstrAddr | Expr::SkipAddr => false,
            Expr::Add(a, b) | Expr::Sub(a, b) => a.is_constant() && b.is_constant(),
        }
    }

    pub fn cfmt(&self, context: &Context) -> String {
        match self {
            Expr::Literal(v) => cformat!("<y>{}</>", v),
            Expr::Ident(name) => match context.get(name) {
                Some(v) => cformat!("<g>0x{:0>4X}({})</>", v, name),
                None => cformat!("<r,u>{}</>", name),
            },
            other => cformat!("<c>{}</>", other),
        }
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Literal(v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::InstrAddr => write!(f, "$"),
            Expr::SkipAddr => write!(f, "$skip"),
            Expr::Add(a, b) => write!(f, "({}+{})", a, b),
            Expr::Sub(a, b) => write!(f, "({}-{})", a, b),
        }
    }
}
