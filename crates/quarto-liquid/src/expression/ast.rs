/*
 * expression/ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::source::Span;
use crate::value::Value;

/// An expression, as found in `{{ }}` and tag arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),

    /// The `empty` / `blank` keywords. Only meaningful on one side of `==`
    /// or `!=`; evaluates to the empty string elsewhere.
    Empty,

    /// A top-level variable reference.
    Variable(String),

    /// `base.name`
    Property(Box<Expr>, String),

    /// `base[index]`
    Index(Box<Expr>, Box<Expr>),

    /// `(start..end)`, inclusive on both ends.
    Range(Box<Expr>, Box<Expr>),

    Not(Box<Expr>),

    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    /// `expr | filter: args | filter ...`
    Filtered(Box<Expr>, Vec<FilterCall>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// One `| name: arg, key: value` step of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub named: Vec<(String, Expr)>,
    pub span: Span,
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    /// Visit every filter call in the expression tree, outermost first.
    pub fn visit_filters<'e>(&'e self, f: &mut dyn FnMut(&'e FilterCall)) {
        match self {
            Expr::Literal(_) | Expr::Empty | Expr::Variable(_) => {}
            Expr::Property(base, _) | Expr::Not(base) => base.visit_filters(f),
            Expr::Index(a, b) | Expr::Range(a, b) | Expr::Binary(_, a, b) => {
                a.visit_filters(f);
                b.visit_filters(f);
            }
            Expr::Filtered(base, calls) => {
                for call in calls {
                    f(call);
                    for arg in &call.args {
                        arg.visit_filters(f);
                    }
                    for (_, arg) in &call.named {
                        arg.visit_filters(f);
                    }
                }
                base.visit_filters(f);
            }
        }
    }
}

/// Modifiers of a `for` loop. They are applied offset, then limit, then
/// reversed, whatever order they were written in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoopModifiers {
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub reversed: bool,
}

/// A parsed tag argument. Which variant is produced depends on the
/// [`Production`](super::Production) the tag asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `name = expr`
    Assignment { variable: String, value: Expr },

    /// `name in source [reversed] [limit: n] [offset: n]`
    Loop {
        variable: String,
        source: Expr,
        modifiers: LoopModifiers,
    },

    /// `[group:] value, value, ...`
    Cycle { group: Option<Expr>, values: Vec<Expr> },

    /// `value, value` or `value or value`
    When { values: Vec<Expr> },

    /// `name [with expr [as alias]] [key: value, ...]`
    Include {
        name: Expr,
        with: Option<(Expr, Option<String>)>,
        bindings: Vec<(String, Expr)>,
    },

    /// A plain expression.
    Expression(Expr),
}

impl Statement {
    /// All expressions held by the statement.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            Statement::Assignment { value, .. } => vec![value],
            Statement::Loop {
                source, modifiers, ..
            } => std::iter::once(source)
                .chain(modifiers.limit.as_ref())
                .chain(modifiers.offset.as_ref())
                .collect(),
            Statement::Cycle { group, values } => group.iter().chain(values).collect(),
            Statement::When { values } => values.iter().collect(),
            Statement::Include {
                name,
                with,
                bindings,
            } => std::iter::once(name)
                .chain(with.iter().map(|(e, _)| e))
                .chain(bindings.iter().map(|(_, e)| e))
                .collect(),
            Statement::Expression(expr) => vec![expr],
        }
    }
}
