//! Partial rewrite of a parsed query so that Graphite dotted names become
//! labelled selectors.
//!
//! The transform is a pure tree walk: every node returns the head inferred
//! from its subtree alongside the rewritten node, so no mutable state leaks
//! across branches. The inferred head is what lets `by (g1)` grouping be
//! relabelled to the synthetic group labels.

use crate::mateql::{self, Expr, ParseError, NAME_LABEL};
use crate::translate::target::{convert_target, label_name};

/// Rewrite a query string. `terminal` pins converted selectors to their
/// exact depth, which is right for instant/range queries (`query=`) but
/// wrong for series lookups (`match[]=`).
pub fn convert_query(query: &str, terminal: bool) -> Result<String, ParseError> {
    let expr = mateql::parse(query)?;
    let (_, expr) = convert_expr(None, expr, terminal);
    Ok(expr.to_string())
}

fn convert_expr(mut head: Option<String>, expr: Expr, terminal: bool) -> (Option<String>, Expr) {
    match expr {
        Expr::Metric(mut metric) => {
            let mut appended = Vec::new();
            for filter in metric.label_filters.iter_mut() {
                if filter.label != NAME_LABEL || !filter.value.contains('.') {
                    continue;
                }
                // An unconvertible target (bad glob) stays untouched and
                // is forwarded as written.
                if let Ok((name, filters)) = convert_target(&filter.value, terminal) {
                    filter.value = name.clone();
                    head = Some(name);
                    appended.extend(filters);
                }
            }
            metric.label_filters.extend(appended);
            (head, Expr::Metric(metric))
        }
        Expr::Rollup(mut rollup) => {
            let (head, inner) = convert_expr(head, *rollup.expr, terminal);
            rollup.expr = Box::new(inner);
            (head, Expr::Rollup(rollup))
        }
        Expr::Function(mut func) => {
            let mut args = Vec::with_capacity(func.args.len());
            for arg in func.args {
                let (next, arg) = convert_expr(head, arg, terminal);
                head = next;
                args.push(arg);
            }
            func.args = args;
            (head, Expr::Function(func))
        }
        Expr::Aggregation(mut aggr) => {
            let mut args = Vec::with_capacity(aggr.args.len());
            for arg in aggr.args {
                let (next, arg) = convert_expr(head, arg, terminal);
                head = next;
                args.push(arg);
            }
            aggr.args = args;
            if let (Some(modifier), Some(head)) = (aggr.modifier.as_mut(), head.as_deref()) {
                for arg in modifier.args.iter_mut() {
                    if let Some(group) = group_index(arg) {
                        *arg = label_name(head, group);
                    }
                }
            }
            (head, Expr::Aggregation(aggr))
        }
        Expr::Binary(mut binary) => {
            let (head, left) = convert_expr(head, *binary.left, terminal);
            let (head, right) = convert_expr(head, *binary.right, terminal);
            binary.left = Box::new(left);
            binary.right = Box::new(right);
            (head, Expr::Binary(binary))
        }
        Expr::Parens(list) => {
            let mut converted = Vec::with_capacity(list.len());
            for expr in list {
                let (next, expr) = convert_expr(head, expr, terminal);
                head = next;
                converted.push(expr);
            }
            (head, Expr::Parens(converted))
        }
        other => (head, other),
    }
}

// A grouping label of the form g<k> refers to the k-th Graphite segment.
fn group_index(label: &str) -> Option<usize> {
    let digits = label.strip_prefix('g')?;
    if digits.is_empty() {
        return None;
    }
    digits.parse::<usize>().ok()
}
