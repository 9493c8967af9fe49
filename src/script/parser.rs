//! Line-oriented lexer and recursive-descent parser. Blocks are delimited by
//! indentation, which only `for` statements introduce.

use super::ast::{BinOp, Constant, Expr, Program, Stmt, UnaryOp};
use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Line {
    indent: usize,
    number: usize,
    toks: Vec<Tok>,
}

pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let mut lines = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let number = i + 1;
        let mut indent = 0usize;
        for ch in raw.chars() {
            match ch {
                ' ' => indent += 1,
                '\t' => indent += 4,
                _ => break,
            }
        }
        let toks = lex(raw.trim_start(), number)?;
        if toks.is_empty() {
            continue;
        }
        lines.push(Line { indent, number, toks });
    }
    if lines.is_empty() {
        return Ok(Program { statements: Vec::new() });
    }
    let base = lines[0].indent;
    let mut idx = 0;
    let statements = parse_block(&lines, &mut idx, base)?;
    if idx != lines.len() {
        return Err(ScriptError::Parse {
            line: lines[idx].number,
            message: "unexpected indentation".to_string(),
        });
    }
    Ok(Program { statements })
}

fn parse_block(lines: &[Line], idx: &mut usize, indent: usize) -> Result<Vec<Stmt>, ScriptError> {
    let mut out = Vec::new();
    while *idx < lines.len() && lines[*idx].indent == indent {
        let line = &lines[*idx];
        *idx += 1;
        let mut p = Parser { toks: &line.toks, pos: 0, line: line.number };
        match p.parse_statement()? {
            Parsed::Simple(stmt) => out.push(stmt),
            Parsed::ForHeader { var, iter } => {
                if *idx >= lines.len() || lines[*idx].indent <= indent {
                    return Err(ScriptError::Parse {
                        line: line.number,
                        message: "expected an indented block after `for`".to_string(),
                    });
                }
                let body_indent = lines[*idx].indent;
                let body = parse_block(lines, idx, body_indent)?;
                out.push(Stmt::For { line: line.number, var, iter, body });
            }
        }
    }
    Ok(out)
}

enum Parsed {
    Simple(Stmt),
    ForHeader { var: String, iter: Expr },
}

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Parse { line: self.line, message: message.into() }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn next_name(&mut self, what: &str) -> Result<String, ScriptError> {
        if let Some(Tok::Name(n)) = self.toks.get(self.pos) {
            let n = n.clone();
            self.pos += 1;
            Ok(n)
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn expect_end(&self) -> Result<(), ScriptError> {
        if self.pos == self.toks.len() {
            Ok(())
        } else {
            Err(self.err("unexpected trailing tokens"))
        }
    }

    fn parse_statement(&mut self) -> Result<Parsed, ScriptError> {
        if self.peek() == Some(&Tok::Name("for".to_string())) {
            self.pos += 1;
            let var = self.next_name("a loop variable after `for`")?;
            self.expect(Tok::Name("in".to_string()), "`in`")?;
            let iter = self.parse_expr()?;
            self.expect(Tok::Colon, "`:` after the `for` header")?;
            self.expect_end()?;
            return Ok(Parsed::ForHeader { var, iter });
        }
        if let (Some(Tok::Name(name)), Some(Tok::Assign)) = (self.toks.first(), self.toks.get(1)) {
            let target = name.clone();
            self.pos = 2;
            let value = self.parse_expr()?;
            self.expect_end()?;
            return Ok(Parsed::Simple(Stmt::Assign { line: self.line, target, value }));
        }
        let value = self.parse_expr()?;
        self.expect_end()?;
        Ok(Parsed::Simple(Stmt::Expr { line: self.line, value }))
    }

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.parse_arith()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => Some(BinOp::Eq),
            Some(Tok::NotEq) => Some(BinOp::Ne),
            Some(Tok::Lt) => Some(BinOp::Lt),
            Some(Tok::Le) => Some(BinOp::Le),
            Some(Tok::Gt) => Some(BinOp::Gt),
            Some(Tok::Ge) => Some(BinOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let rhs = self.parse_arith()?;
            return Ok(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        Ok(lhs)
    }

    fn parse_arith(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Tok::Dot) {
                let method = self.next_name("a method name after `.`")?;
                self.expect(Tok::LParen, "`(` after a method name")?;
                let args = self.parse_args()?;
                expr = Expr::MethodCall { base: Box::new(expr), method, args };
            } else if self.eat(&Tok::LBracket) {
                let index = self.parse_expr()?;
                self.expect(Tok::RBracket, "`]`")?;
                expr = Expr::Subscript { base: Box::new(expr), index: Box::new(index) };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Arguments up to and including the closing paren.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Tok::RParen) {
                return Ok(args);
            }
            self.expect(Tok::Comma, "`,` or `)` in an argument list")?;
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ScriptError> {
        let tok = self.next().ok_or_else(|| self.err("unexpected end of line"))?;
        match tok {
            Tok::Int(i) => Ok(Expr::Constant(Constant::Int(i))),
            Tok::Float(f) => Ok(Expr::Constant(Constant::Float(f))),
            Tok::Str(s) => Ok(Expr::Constant(Constant::Str(s))),
            Tok::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Constant(Constant::Bool(true))),
                "False" => Ok(Expr::Constant(Constant::Bool(false))),
                "None" => Ok(Expr::Constant(Constant::None)),
                "for" | "in" => Err(self.err(format!("unexpected keyword `{name}`"))),
                _ => {
                    if self.eat(&Tok::LParen) {
                        let args = self.parse_args()?;
                        Ok(Expr::Call { func: name, args })
                    } else {
                        Ok(Expr::Name(name))
                    }
                }
            },
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                if self.eat(&Tok::RBracket) {
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_expr()?);
                    if self.eat(&Tok::RBracket) {
                        return Ok(Expr::List(items));
                    }
                    self.expect(Tok::Comma, "`,` or `]` in a list literal")?;
                }
            }
            Tok::LBrace => {
                let mut pairs = Vec::new();
                if self.eat(&Tok::RBrace) {
                    return Ok(Expr::Dict(pairs));
                }
                loop {
                    let key = self.parse_expr()?;
                    self.expect(Tok::Colon, "`:` in a dict literal")?;
                    let value = self.parse_expr()?;
                    pairs.push((key, value));
                    if self.eat(&Tok::RBrace) {
                        return Ok(Expr::Dict(pairs));
                    }
                    self.expect(Tok::Comma, "`,` or `}` in a dict literal")?;
                }
            }
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }
}

fn lex(text: &str, line: usize) -> Result<Vec<Tok>, ScriptError> {
    let err = |message: String| ScriptError::Parse { line, message };
    let mut toks = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            '#' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_digit() => {
                let mut num = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        num.push(c);
                    } else if c == '.' && !is_float {
                        is_float = true;
                        num.push(c);
                    } else {
                        break;
                    }
                    chars.next();
                }
                if is_float {
                    let f = num.parse::<f64>().map_err(|_| err(format!("bad number `{num}`")))?;
                    toks.push(Tok::Float(f));
                } else {
                    let i = num.parse::<i64>().map_err(|_| err(format!("bad number `{num}`")))?;
                    toks.push(Tok::Int(i));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Name(name));
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => break,
                        }
                    } else {
                        s.push(c);
                    }
                }
                if !closed {
                    return Err(err("unterminated string literal".to_string()));
                }
                toks.push(Tok::Str(s));
            }
            _ => {
                chars.next();
                let tok = match ch {
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    ',' => Tok::Comma,
                    ':' => Tok::Colon,
                    '.' => Tok::Dot,
                    '+' => Tok::Plus,
                    '-' => Tok::Minus,
                    '*' => Tok::Star,
                    '/' => Tok::Slash,
                    '=' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::EqEq
                        } else {
                            Tok::Assign
                        }
                    }
                    '!' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::NotEq
                        } else {
                            return Err(err("unexpected `!`".to_string()));
                        }
                    }
                    '<' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::Le
                        } else {
                            Tok::Lt
                        }
                    }
                    '>' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Tok::Ge
                        } else {
                            Tok::Gt
                        }
                    }
                    other => return Err(err(format!("unexpected character `{other}`"))),
                };
                toks.push(tok);
            }
        }
    }
    Ok(toks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_envelope_assignment() {
        let prog = parse("result = {'type': 'number', 'value': dfs[1].sum('amount')}").unwrap();
        assert_eq!(prog.statements.len(), 1);
        let Stmt::Assign { line, target, value } = &prog.statements[0] else {
            panic!("expected an assignment");
        };
        assert_eq!(*line, 1);
        assert_eq!(target, "result");
        let Expr::Dict(pairs) = value else { panic!("expected a dict literal") };
        assert_eq!(pairs.len(), 2);
        let Expr::MethodCall { base, method, args } = &pairs[1].1 else {
            panic!("expected a method call");
        };
        assert_eq!(method, "sum");
        assert_eq!(args.len(), 1);
        assert!(matches!(&**base, Expr::Subscript { .. }));
    }

    #[test]
    fn parses_for_block() {
        let prog = parse("total = 0\nfor df in dfs:\n    total = total + df.count()\nresult = total").unwrap();
        assert_eq!(prog.statements.len(), 3);
        let Stmt::For { var, body, .. } = &prog.statements[1] else {
            panic!("expected a for loop");
        };
        assert_eq!(var, "df");
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let prog = parse("# compute\n\nresult = 1 + 2  # sum\n").unwrap();
        assert_eq!(prog.statements.len(), 1);
        assert_eq!(prog.statements[0].line(), 3);
    }

    #[test]
    fn reports_parse_errors_with_line_numbers() {
        let err = parse("x = 1\ny = (2").unwrap_err();
        match err {
            ScriptError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn rejects_for_without_block() {
        assert!(parse("for df in dfs:").is_err());
    }

    #[test]
    fn negative_numbers_and_comparisons() {
        let prog = parse("ok = -3 <= x").unwrap();
        let Stmt::Assign { value, .. } = &prog.statements[0] else { panic!() };
        assert!(matches!(value, Expr::Binary { op: BinOp::Le, .. }));
    }
}
