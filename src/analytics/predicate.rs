//! Allow-listed grammar for free-text `where_clause` arguments.
//!
//! The model writes filters as SQL-ish text (`year = 2023 AND product =
//! 'Product 1'`). Instead of splicing that text into a statement, it is
//! parsed into an expression tree whose columns come from the schema registry and
//! whose literals are emitted as bind parameters.
//!
//! ```text
//! expr       := and_expr ( OR and_expr )*
//! and_expr   := unary ( AND unary )*
//! unary      := NOT unary | '(' expr ')' | comparison
//! comparison := column op literal
//!             | column [NOT] IN '(' literal ( ',' literal )* ')'
//!             | column [NOT] BETWEEN literal AND literal
//!             | column IS [NOT] NULL
//! op         := '=' | '!=' | '<>' | '<' | '<=' | '>' | '>='
//! literal    := ['-'] number | '\'' text '\''
//! ```

use std::fmt;

use rusqlite::types::Value;

use super::schema::{FilterColumn, Metric};
use super::types::Rejection;

const MAX_PREDICATE_LEN: usize = 2048;
const MAX_DEPTH: usize = 32;
const MAX_IN_LIST: usize = 256;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Column that may appear inside a predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PredicateColumn {
    Dimension(FilterColumn),
    Metric(Metric),
    Date,
}

impl PredicateColumn {
    fn parse(ident: &str) -> Option<Self> {
        let lower = ident.to_ascii_lowercase();
        if lower == "date" {
            return Some(Self::Date);
        }
        if let Some(c) = FilterColumn::ALL.into_iter().find(|c| c.column() == lower) {
            return Some(Self::Dimension(c));
        }
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == lower)
            .map(Self::Metric)
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Dimension(c) => c.column(),
            Self::Metric(m) => m.column(),
            Self::Date => "date",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Literal {
    fn to_sql_value(&self) -> Value {
        match self {
            Self::Integer(i) => Value::Integer(*i),
            Self::Real(f) => Value::Real(*f),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Compare {
        column: PredicateColumn,
        op: CompareOp,
        value: Literal,
    },
    InList {
        column: PredicateColumn,
        negated: bool,
        values: Vec<Literal>,
    },
    Between {
        column: PredicateColumn,
        negated: bool,
        low: Literal,
        high: Literal,
    },
    IsNull {
        column: PredicateColumn,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

fn bind(lit: &Literal, params: &mut Vec<Value>) -> String {
    params.push(lit.to_sql_value());
    format!("?{}", params.len())
}

impl Expr {
    /// Emit SQL, appending bind values to `params` and numbering
    /// placeholders after whatever is already there.
    fn compile_into(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::Compare { column, op, value } => {
                let p = bind(value, params);
                sql.push_str(&format!("{} {} {p}", column.column(), op.sql()));
            }
            Self::InList {
                column,
                negated,
                values,
            } => {
                let placeholders: Vec<String> = values.iter().map(|v| bind(v, params)).collect();
                let not = if *negated { "NOT " } else { "" };
                sql.push_str(&format!(
                    "{} {not}IN ({})",
                    column.column(),
                    placeholders.join(", ")
                ));
            }
            Self::Between {
                column,
                negated,
                low,
                high,
            } => {
                let lo = bind(low, params);
                let hi = bind(high, params);
                let not = if *negated { "NOT " } else { "" };
                sql.push_str(&format!("{} {not}BETWEEN {lo} AND {hi}", column.column()));
            }
            Self::IsNull { column, negated } => {
                let not = if *negated { "NOT " } else { "" };
                sql.push_str(&format!("{} IS {not}NULL", column.column()));
            }
            Self::And(a, b) | Self::Or(a, b) => {
                let joiner = if matches!(self, Self::And(..)) { " AND " } else { " OR " };
                sql.push('(');
                a.compile_into(sql, params);
                sql.push_str(joiner);
                b.compile_into(sql, params);
                sql.push(')');
            }
            Self::Not(inner) => {
                sql.push_str("NOT (");
                inner.compile_into(sql, params);
                sql.push(')');
            }
        }
    }
}

/// A parsed, allow-listed filter expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    /// Parse a `where_clause` argument. Blank input means "no filter".
    pub fn parse(text: &str) -> Result<Option<Self>, Rejection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.len() > MAX_PREDICATE_LEN {
            return Err(Rejection::predicate(format!(
                "longer than {MAX_PREDICATE_LEN} characters"
            )));
        }
        let mut tokens = tokenize(trimmed)?;
        // Tolerate a leading WHERE keyword.
        if matches!(tokens.first(), Some(Token::Keyword(Kw::Where))) {
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return Ok(None);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(Rejection::predicate(format!("unexpected {tok}")));
        }
        Ok(Some(Self {
            source: trimmed.to_string(),
            expr,
        }))
    }

    /// Compile to a SQL boolean expression with positional placeholders.
    pub fn compile(&self, params: &mut Vec<Value>) -> String {
        let mut sql = String::new();
        self.expr.compile_into(&mut sql, params);
        sql
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kw {
    And,
    Or,
    Not,
    In,
    Between,
    Is,
    Null,
    Where,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Keyword(Kw),
    Number(String),
    Str(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    Minus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier `{s}`"),
            Self::Keyword(k) => write!(f, "keyword {}", format!("{k:?}").to_ascii_uppercase()),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Str(s) => write!(f, "string '{s}'"),
            Self::Op(op) => write!(f, "operator {}", op.sql()),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Minus => f.write_str("'-'"),
        }
    }
}

fn keyword(word: &str) -> Option<Kw> {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Some(Kw::And),
        "OR" => Some(Kw::Or),
        "NOT" => Some(Kw::Not),
        "IN" => Some(Kw::In),
        "BETWEEN" => Some(Kw::Between),
        "IS" => Some(Kw::Is),
        "NULL" => Some(Kw::Null),
        "WHERE" => Some(Kw::Where),
        _ => None,
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, Rejection> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '-' => {
                if chars.get(i + 1) == Some(&'-') {
                    return Err(Rejection::predicate("comments are not allowed"));
                }
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' => {
                // Accept `==` as a synonym.
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                if chars.get(i + 1) != Some(&'=') {
                    return Err(Rejection::predicate("expected '!='"));
                }
                tokens.push(Token::Op(CompareOp::NotEq));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::LtEq));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::NotEq));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::GtEq));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(Rejection::predicate("unterminated string literal")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                let mut seen_dot = false;
                while let Some(ch) = chars.get(i) {
                    if ch.is_ascii_digit() {
                        i += 1;
                    } else if *ch == '.' && !seen_dot {
                        seen_dot = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                if chars.get(i).is_some_and(|ch| ch.is_ascii_alphabetic() || *ch == '_') {
                    return Err(Rejection::predicate("malformed number"));
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match keyword(&word) {
                    Some(kw) => tokens.push(Token::Keyword(kw)),
                    None => tokens.push(Token::Ident(word)),
                }
            }
            ';' => return Err(Rejection::predicate("statement separators are not allowed")),
            '"' | '`' | '[' => {
                return Err(Rejection::predicate(
                    "quoted identifiers are not allowed; use bare column names and single-quoted strings",
                ));
            }
            other => {
                return Err(Rejection::predicate(format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_keyword(&mut self, kw: Kw) -> bool {
        if self.peek() == Some(&Token::Keyword(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Kw) -> Result<(), Rejection> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{kw:?}").to_ascii_uppercase()))
        }
    }

    fn unexpected(&self, wanted: &str) -> Rejection {
        match self.peek() {
            Some(tok) => Rejection::predicate(format!("expected {wanted}, found {tok}")),
            None => Rejection::predicate(format!("expected {wanted}, found end of input")),
        }
    }

    fn enter(&mut self) -> Result<(), Rejection> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Rejection::predicate("expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, Rejection> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Kw::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Rejection> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword(Kw::And) {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Rejection> {
        self.enter()?;
        let expr = if self.eat_keyword(Kw::Not) {
            Expr::Not(Box::new(self.parse_unary()?))
        } else if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.next() != Some(Token::RParen) {
                return Err(Rejection::predicate("unbalanced parentheses"));
            }
            inner
        } else {
            self.parse_comparison()?
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_column(&mut self) -> Result<PredicateColumn, Rejection> {
        match self.next() {
            Some(Token::Ident(name)) => PredicateColumn::parse(&name).ok_or_else(|| {
                Rejection::predicate(format!(
                    "column `{name}` is not allowed. Allowed: {}, {}, date",
                    FilterColumn::allowed(),
                    Metric::allowed()
                ))
            }),
            Some(tok) => Err(Rejection::predicate(format!("expected column, found {tok}"))),
            None => Err(Rejection::predicate("expected column, found end of input")),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, Rejection> {
        let column = self.parse_column()?;

        match self.next() {
            Some(Token::Op(op)) => {
                let value = self.parse_literal()?;
                Ok(Expr::Compare { column, op, value })
            }
            Some(Token::Keyword(Kw::Is)) => {
                let negated = self.eat_keyword(Kw::Not);
                self.expect_keyword(Kw::Null)?;
                Ok(Expr::IsNull { column, negated })
            }
            Some(Token::Keyword(Kw::Not)) => match self.next() {
                Some(Token::Keyword(Kw::In)) => self.parse_in_list(column, true),
                Some(Token::Keyword(Kw::Between)) => self.parse_between(column, true),
                _ => Err(Rejection::predicate("expected IN or BETWEEN after NOT")),
            },
            Some(Token::Keyword(Kw::In)) => self.parse_in_list(column, false),
            Some(Token::Keyword(Kw::Between)) => self.parse_between(column, false),
            Some(tok) => Err(Rejection::predicate(format!(
                "expected comparison after `{}`, found {tok}",
                column.column()
            ))),
            None => Err(Rejection::predicate(format!(
                "expected comparison after `{}`",
                column.column()
            ))),
        }
    }

    fn parse_in_list(&mut self, column: PredicateColumn, negated: bool) -> Result<Expr, Rejection> {
        if self.next() != Some(Token::LParen) {
            return Err(Rejection::predicate("expected '(' after IN"));
        }
        let mut values = vec![self.parse_literal()?];
        loop {
            match self.next() {
                Some(Token::Comma) => {
                    if values.len() >= MAX_IN_LIST {
                        return Err(Rejection::predicate(format!(
                            "IN lists are limited to {MAX_IN_LIST} values"
                        )));
                    }
                    values.push(self.parse_literal()?);
                }
                Some(Token::RParen) => break,
                _ => return Err(Rejection::predicate("unterminated IN list")),
            }
        }
        Ok(Expr::InList {
            column,
            negated,
            values,
        })
    }

    fn parse_between(&mut self, column: PredicateColumn, negated: bool) -> Result<Expr, Rejection> {
        let low = self.parse_literal()?;
        self.expect_keyword(Kw::And)?;
        let high = self.parse_literal()?;
        Ok(Expr::Between {
            column,
            negated,
            low,
            high,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, Rejection> {
        let negative = if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next() {
            Some(Token::Number(raw)) => {
                let text = if negative { format!("-{raw}") } else { raw };
                if let Ok(i) = text.parse::<i64>() {
                    Ok(Literal::Integer(i))
                } else {
                    text.parse::<f64>()
                        .map(Literal::Real)
                        .map_err(|_| Rejection::predicate(format!("malformed number {text}")))
                }
            }
            Some(Token::Str(s)) if !negative => Ok(Literal::Text(s)),
            Some(tok) => Err(Rejection::predicate(format!("expected literal, found {tok}"))),
            None => Err(Rejection::predicate("expected literal, found end of input")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
