/*
 * expression/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The expression language: variables, property paths, literals, ranges,
//! operators and filter pipelines.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, FilterCall, LoopModifiers, Statement};
pub use eval::{evaluate, evaluate_condition};
pub use parser::{Production, parse_expression, parse_statement};
