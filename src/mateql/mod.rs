//! MetricsQL-flavoured expression parser.
//!
//! This is the Prometheus dialect spoken by VictoriaMetrics, with one
//! deliberate extension: the lexer admits Graphite dotted names (including
//! glob metacharacters such as `a.{b,c}.*`) as bare selectors. Stock PromQL
//! parsers reject `a.b.c.d` outright, which is the one construct this crate
//! needs most, so the dialect is carried in-tree.
//!
//! The surface is small: [`parse`] produces a typed [`Expr`] tree, and the
//! `Display` implementations reproduce the canonical text form. The grammar
//! covers selectors, rollups (`expr[window:step] offset d`), function calls,
//! aggregations with `by`/`without` modifiers, and binary operators with
//! PromQL precedence.

mod lexer;
mod parser;

pub use parser::parse;

use std::fmt;
use std::fmt::Display;
use thiserror::Error;

/// The reserved label carrying the metric name inside a selector.
pub const NAME_LABEL: &str = "__name__";

/// Errors produced while lexing or parsing an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string literal starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected token '{found}' at position {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: &'static str,
    },

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEof { expected: &'static str },
}

/// One `label<op>"value"` matcher inside a series selector.
///
/// Regex-inequality (`!~`) is accepted by the parser even though the rest of
/// this crate never generates it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelFilter {
    pub label: String,
    pub value: String,
    pub is_regexp: bool,
    pub is_negative: bool,
}

impl LabelFilter {
    pub fn equal(label: impl Into<String>, value: impl Into<String>) -> Self {
        LabelFilter {
            label: label.into(),
            value: value.into(),
            ..LabelFilter::default()
        }
    }

    pub fn regexp(label: impl Into<String>, value: impl Into<String>) -> Self {
        LabelFilter {
            label: label.into(),
            value: value.into(),
            is_regexp: true,
            is_negative: false,
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match (self.is_negative, self.is_regexp) {
            (false, false) => "=",
            (true, false) => "!=",
            (false, true) => "=~",
            (true, true) => "!~",
        };
        write!(f, "{}{}\"{}\"", self.label, op, escape_string(&self.value))
    }
}

/// A typed expression node. The query rewriter dispatches on these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    StringLiteral(String),
    Duration(DurationExpr),
    Metric(MetricExpr),
    Rollup(RollupExpr),
    Function(FunctionExpr),
    Aggregation(AggregationExpr),
    Binary(BinaryExpr),
    Parens(Vec<Expr>),
}

/// A duration literal, kept as written (`5m`, `1h30m`, `300`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationExpr {
    pub text: String,
}

/// A series selector: an ordered list of label filters. A selector written
/// as `name{...}` carries the name as a leading `__name__` equality filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricExpr {
    pub label_filters: Vec<LabelFilter>,
}

impl MetricExpr {
    pub fn from_name(name: impl Into<String>) -> Self {
        MetricExpr {
            label_filters: vec![LabelFilter::equal(NAME_LABEL, name)],
        }
    }
}

/// `expr[window:step] offset d`.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupExpr {
    pub expr: Box<Expr>,
    pub window: Option<DurationExpr>,
    pub step: Option<DurationExpr>,
    pub offset: Option<DurationExpr>,
}

/// A transform function call such as `rate(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateModifierOp {
    By,
    Without,
}

impl AggregateModifierOp {
    fn as_str(self) -> &'static str {
        match self {
            AggregateModifierOp::By => "by",
            AggregateModifierOp::Without => "without",
        }
    }
}

/// The `by (...)` / `without (...)` grouping clause of an aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateModifier {
    pub op: AggregateModifierOp,
    pub args: Vec<String>,
}

/// An aggregate function call, e.g. `sum(x) by (job)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationExpr {
    pub name: String,
    pub args: Vec<Expr>,
    pub modifier: Option<AggregateModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eql,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    And,
    Or,
    Unless,
}

impl BinaryOp {
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And | BinaryOp::Unless => 2,
            BinaryOp::Eql
            | BinaryOp::Neq
            | BinaryOp::Gt
            | BinaryOp::Lt
            | BinaryOp::Gte
            | BinaryOp::Lte => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
            BinaryOp::Pow => 6,
        }
    }

    pub(crate) fn is_right_associative(self) -> bool {
        self == BinaryOp::Pow
    }

    pub(crate) fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eql | BinaryOp::Neq | BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Gte | BinaryOp::Lte
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eql => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Lte => "<=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Unless => "unless",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupModifierOp {
    On,
    Ignoring,
}

/// The `on (...)` / `ignoring (...)` vector-matching clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupModifier {
    pub op: GroupModifierOp,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinModifierOp {
    GroupLeft,
    GroupRight,
}

/// The `group_left (...)` / `group_right (...)` many-to-one clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinModifier {
    pub op: JoinModifierOp,
    pub labels: Vec<String>,
}

/// A binary operation with optional `bool` / matching / join modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub bool_modifier: bool,
    pub group_modifier: Option<GroupModifier>,
    pub join_modifier: Option<JoinModifier>,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write_number(f, *n),
            Expr::StringLiteral(s) => write!(f, "\"{}\"", escape_string(s)),
            Expr::Duration(d) => f.write_str(&d.text),
            Expr::Metric(m) => m.fmt(f),
            Expr::Rollup(r) => r.fmt(f),
            Expr::Function(func) => {
                write!(f, "{}(", func.name)?;
                write_list(f, &func.args)?;
                f.write_str(")")
            }
            Expr::Aggregation(a) => a.fmt(f),
            Expr::Binary(b) => b.fmt(f),
            Expr::Parens(list) => {
                f.write_str("(")?;
                write_list(f, list)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for MetricExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut filters = self.label_filters.as_slice();
        if let Some(first) = filters.first() {
            if first.label == NAME_LABEL && !first.is_regexp && !first.is_negative {
                f.write_str(&first.value)?;
                filters = &filters[1..];
                if filters.is_empty() {
                    return Ok(());
                }
            }
        }
        f.write_str("{")?;
        for (i, filter) in filters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            filter.fmt(f)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for RollupExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operand(f, &self.expr)?;
        match (&self.window, &self.step) {
            (Some(window), Some(step)) => write!(f, "[{}:{}]", window.text, step.text)?,
            (Some(window), None) => write!(f, "[{}]", window.text)?,
            (None, Some(step)) => write!(f, "[:{}]", step.text)?,
            (None, None) => {}
        }
        if let Some(offset) = &self.offset {
            write!(f, " offset {}", offset.text)?;
        }
        Ok(())
    }
}

impl fmt::Display for AggregationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_list(f, &self.args)?;
        f.write_str(")")?;
        if let Some(modifier) = &self.modifier {
            write!(f, " {} ({})", modifier.op.as_str(), modifier.args.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operand(f, &self.left)?;
        write!(f, " {}", self.op.as_str())?;
        if self.bool_modifier {
            f.write_str(" bool")?;
        }
        if let Some(group) = &self.group_modifier {
            let op = match group.op {
                GroupModifierOp::On => "on",
                GroupModifierOp::Ignoring => "ignoring",
            };
            write!(f, " {} ({})", op, group.labels.join(", "))?;
        }
        if let Some(join) = &self.join_modifier {
            let op = match join.op {
                JoinModifierOp::GroupLeft => "group_left",
                JoinModifierOp::GroupRight => "group_right",
            };
            write!(f, " {}", op)?;
            if !join.labels.is_empty() {
                write!(f, " ({})", join.labels.join(", "))?;
            }
        }
        f.write_str(" ")?;
        write_operand(f, &self.right)
    }
}

// Binary operands are parenthesized so that precedence survives a reprint.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr, Expr::Binary(_)) {
        write!(f, "({expr})")
    } else {
        expr.fmt(f)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, list: &[Expr]) -> fmt::Result {
    for (i, expr) in list.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        expr.fmt(f)?;
    }
    Ok(())
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}
