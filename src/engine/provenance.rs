//! Static provenance resolution over accepted code: map a variable use back
//! to the table that fed it. Used after the fact for explanations, never
//! during execution.

use crate::script::ast::{Constant, Expr, Program, Stmt};

/// Primitive token in an access chain, base-expression-first and innermost
/// index last.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Literal(Constant),
}

/// Flatten an access chain into its primitive tokens: a call yields the
/// invoked method name, a subscript yields its base's tokens followed by
/// the literal index, a bare name yields the identifier, a literal yields
/// its value. `foo[2][1][0]` becomes `[foo, 2, 1, 0]`.
pub fn tokenize(expr: &Expr) -> Vec<Token> {
    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

fn walk(expr: &Expr, out: &mut Vec<Token>) {
    match expr {
        Expr::MethodCall { method, .. } => out.push(Token::Name(method.clone())),
        Expr::Subscript { base, index } => {
            walk(base, out);
            if let Expr::Constant(c) = index.as_ref() {
                out.push(Token::Literal(c.clone()));
            }
        }
        Expr::Name(name) => out.push(Token::Name(name.clone())),
        Expr::Constant(c) => out.push(Token::Literal(c.clone())),
        _ => {}
    }
}

/// An assignment statement somewhere in the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<'a> {
    pub line: usize,
    pub target: &'a str,
    pub value: &'a Expr,
}

/// Collect every assignment, including those nested in loop bodies.
pub fn collect_assignments(program: &Program) -> Vec<Assignment<'_>> {
    let mut out = Vec::new();
    collect(&program.statements, &mut out);
    out
}

fn collect<'a>(statements: &'a [Stmt], out: &mut Vec<Assignment<'a>>) {
    for stmt in statements {
        match stmt {
            Stmt::Assign { line, target, value } => {
                out.push(Assignment { line: *line, target, value })
            }
            Stmt::For { body, .. } => collect(body, out),
            Stmt::Expr { .. } => {}
        }
    }
}

/// Find the table a name was bound to at a given line: among all assignments
/// of `target_name` whose right-hand side is a direct literal-index
/// subscript of `dfs`, pick the one with the latest line at or before
/// `line`. Assignments with any other shape are skipped, not fatal.
pub fn resolve_table_alias(
    line: usize,
    assignments: &[Assignment<'_>],
    target_name: &str,
) -> Option<String> {
    let mut sorted: Vec<&Assignment<'_>> = assignments.iter().collect();
    sorted.sort_by_key(|a| a.line);

    let mut nearest = None;
    for assignment in sorted {
        if assignment.line > line {
            break;
        }
        if assignment.target != target_name {
            continue;
        }
        let Expr::Subscript { base, index } = assignment.value else {
            continue;
        };
        if !matches!(base.as_ref(), Expr::Name(n) if n == "dfs") {
            continue;
        }
        if let Expr::Constant(Constant::Int(i)) = index.as_ref() {
            nearest = Some(format!("table[{i}]"));
        }
    }
    nearest
}
