//! Lexer and recursive-descent parser for the ES3/5 subset.
//!
//! Produces the ESTree-shaped [`ast`] nodes the compile layer consumes,
//! with byte offsets on every node. Automatic semicolon insertion follows
//! the usual simplification: a statement also ends at `}`, at end of
//! input, or before a token on a new line; `return`/`break`/`continue`
//! and the postfix operators are newline-restricted.
//!
//! Not lexed: regular-expression literals (a dedicated error points at
//! them) and legacy octal escapes.

use crate::ast::{
    AssignOp, BinaryOp, Block, CatchClause, Expr, ExprNode, ForTarget, Ident, LitValue, LogicalOp, Program, Property,
    PropertyKind, Stmt, StmtNode, SwitchCase, UnaryOp, UpdateOp, VariableDeclaration, VariableDeclarator,
};

/// A parse failure, positioned by byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

type Parsed<T> = Result<T, ParseError>;

/// Parses a complete program.
pub(crate) fn parse(source: &str) -> Parsed<Program> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    parser.parse_program()
}

const KEYWORDS: &[&str] = &[
    "break", "case", "catch", "continue", "debugger", "default", "delete", "do", "else", "finally", "for", "function",
    "if", "in", "instanceof", "new", "return", "switch", "this", "throw", "try", "typeof", "var", "void", "while",
    "with", "true", "false", "null",
];

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Name(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
    /// Whether a line terminator appeared before this token; drives
    /// semicolon insertion and the restricted productions.
    newline_before: bool,
}

/// Multi-character punctuators, longest first so maximal munch wins.
const PUNCTS: &[&str] = &[
    ">>>=", "===", "!==", ">>>", "<<=", ">>=", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

fn lex(source: &str) -> Parsed<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut newline = false;

    while i < bytes.len() {
        let b = bytes[i];
        // whitespace and comments
        if b == b'\n' {
            newline = true;
            i += 1;
            continue;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let start = i;
            i += 2;
            loop {
                if i + 1 >= bytes.len() {
                    return Err(ParseError::new("unterminated block comment", start));
                }
                if bytes[i] == b'\n' {
                    newline = true;
                }
                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let start = i;
        let tok = if b.is_ascii_digit() || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            lex_number(source, &mut i)?
        } else if b == b'"' || b == b'\'' {
            lex_string(source, &mut i)?
        } else if is_ident_start(source[i..].chars().next().expect("non-empty")) {
            let mut end = i;
            for ch in source[i..].chars() {
                if is_ident_part(ch) {
                    end += ch.len_utf8();
                } else {
                    break;
                }
            }
            let name = source[i..end].to_owned();
            i = end;
            Tok::Name(name)
        } else if let Some(&punct) = PUNCTS.iter().find(|&&p| source[i..].starts_with(p)) {
            i += punct.len();
            Tok::Punct(punct)
        } else {
            return Err(ParseError::new(
                format!("unexpected character '{}'", &source[i..].chars().next().expect("non-empty")),
                i,
            ));
        };
        tokens.push(Token {
            tok,
            start,
            end: i,
            newline_before: newline,
        });
        newline = false;
    }
    tokens.push(Token {
        tok: Tok::Eof,
        start: source.len(),
        end: source.len(),
        newline_before: newline,
    });
    Ok(tokens)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn lex_number(source: &str, i: &mut usize) -> Parsed<Tok> {
    let bytes = source.as_bytes();
    let start = *i;
    if bytes[*i] == b'0' && matches!(bytes.get(*i + 1).copied(), Some(b'x' | b'X')) {
        *i += 2;
        let digits_start = *i;
        while *i < bytes.len() && bytes[*i].is_ascii_hexdigit() {
            *i += 1;
        }
        if *i == digits_start {
            return Err(ParseError::new("missing hexadecimal digits", start));
        }
        let value = u64::from_str_radix(&source[digits_start..*i], 16)
            .map_err(|_| ParseError::new("hexadecimal literal out of range", start))?;
        return Ok(Tok::Num(value as f64));
    }
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i < bytes.len() && bytes[*i] == b'.' {
        *i += 1;
        while *i < bytes.len() && bytes[*i].is_ascii_digit() {
            *i += 1;
        }
    }
    if *i < bytes.len() && matches!(bytes[*i], b'e' | b'E') {
        let mut j = *i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j == exp_start {
            return Err(ParseError::new("missing exponent digits", *i));
        }
        *i = j;
    }
    source[start..*i]
        .parse()
        .map(Tok::Num)
        .map_err(|_| ParseError::new("invalid number literal", start))
}

fn lex_string(source: &str, i: &mut usize) -> Parsed<Tok> {
    let start = *i;
    let quote = source.as_bytes()[*i] as char;
    *i += 1;
    let mut out = String::new();
    let mut chars = source[*i..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        if ch == quote {
            *i += offset + ch.len_utf8();
            return Ok(Tok::Str(out));
        }
        match ch {
            '\n' => return Err(ParseError::new("unterminated string literal", start)),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    return Err(ParseError::new("unterminated string literal", start));
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'x' | 'u' => {
                        let len = if escaped == 'x' { 2 } else { 4 };
                        let mut code = 0u32;
                        for _ in 0..len {
                            let Some((_, digit)) = chars.next() else {
                                return Err(ParseError::new("invalid escape sequence", start));
                            };
                            let Some(digit) = digit.to_digit(16) else {
                                return Err(ParseError::new("invalid escape sequence", start));
                            };
                            code = code * 16 + digit;
                        }
                        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    }
                    '\n' => {}
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }
    Err(ParseError::new("unterminated string literal", start))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().tok, Tok::Punct(p) if *p == punct)
    }

    fn at_name(&self, name: &str) -> bool {
        matches!(&self.peek().tok, Tok::Name(n) if n == name)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_name(&mut self, name: &str) -> bool {
        if self.at_name(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Parsed<Token> {
        if self.at_punct(punct) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected '{punct}'")))
        }
    }

    fn expect_ident(&mut self) -> Parsed<Ident> {
        let token = self.peek().clone();
        match &token.tok {
            Tok::Name(name) if !is_keyword(name) => {
                self.advance();
                Ok(Ident {
                    name: name.clone(),
                    start: token.start,
                    end: token.end,
                })
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = match &token.tok {
            Tok::Eof => "end of input".to_owned(),
            Tok::Punct(p) => format!("'{p}'"),
            Tok::Name(n) => format!("'{n}'"),
            Tok::Num(_) => "number".to_owned(),
            Tok::Str(_) => "string".to_owned(),
        };
        ParseError::new(format!("{message}, found {found}"), token.start)
    }

    /// Consumes a statement terminator: an explicit `;`, or an inserted
    /// one before `}`, end of input, or a token on a new line.
    fn semicolon(&mut self) -> Parsed<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        let token = self.peek();
        if matches!(token.tok, Tok::Eof) || self.at_punct("}") || token.newline_before {
            return Ok(());
        }
        Err(self.unexpected("expected ';'"))
    }

    fn parse_program(&mut self) -> Parsed<Program> {
        let mut body = Vec::new();
        while !matches!(self.peek().tok, Tok::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            body,
            start: 0,
            end: self.source_len,
        })
    }

    fn parse_statement(&mut self) -> Parsed<StmtNode> {
        let start = self.peek().start;
        // Cloned so the statement parsers below can advance freely.
        let tok = self.peek().tok.clone();
        let stmt = match &tok {
            Tok::Punct("{") => {
                self.advance();
                let mut body = Vec::new();
                while !self.at_punct("}") {
                    if matches!(self.peek().tok, Tok::Eof) {
                        return Err(self.unexpected("expected '}'"));
                    }
                    body.push(self.parse_statement()?);
                }
                self.advance();
                Stmt::Block { body }
            }
            Tok::Punct(";") => {
                self.advance();
                Stmt::Empty
            }
            Tok::Name(name) => match name.as_str() {
                "var" => {
                    let decl = self.parse_var_declaration()?;
                    self.semicolon()?;
                    Stmt::Variable {
                        declarations: decl.declarations,
                        kind: decl.kind,
                    }
                }
                "function" => {
                    self.advance();
                    let id = self.expect_ident()?;
                    let (params, body) = self.parse_function_rest()?;
                    Stmt::FunctionDecl {
                        id: Some(id),
                        params,
                        body,
                    }
                }
                "if" => self.parse_if()?,
                "for" => self.parse_for()?,
                "while" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let test = self.parse_expression(false)?;
                    self.expect_punct(")")?;
                    let body = Box::new(self.parse_statement()?);
                    Stmt::While { test, body }
                }
                "do" => {
                    self.advance();
                    let body = Box::new(self.parse_statement()?);
                    if !self.eat_name("while") {
                        return Err(self.unexpected("expected 'while'"));
                    }
                    self.expect_punct("(")?;
                    let test = self.parse_expression(false)?;
                    self.expect_punct(")")?;
                    self.eat_punct(";");
                    Stmt::DoWhile { body, test }
                }
                "continue" => {
                    self.advance();
                    let label = self.parse_jump_label()?;
                    self.semicolon()?;
                    Stmt::Continue { label }
                }
                "break" => {
                    self.advance();
                    let label = self.parse_jump_label()?;
                    self.semicolon()?;
                    Stmt::Break { label }
                }
                "return" => {
                    self.advance();
                    let argument = if self.at_punct(";")
                        || self.at_punct("}")
                        || matches!(self.peek().tok, Tok::Eof)
                        || self.peek().newline_before
                    {
                        None
                    } else {
                        Some(self.parse_expression(false)?)
                    };
                    self.semicolon()?;
                    Stmt::Return { argument }
                }
                "with" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let object = self.parse_expression(false)?;
                    self.expect_punct(")")?;
                    let body = Box::new(self.parse_statement()?);
                    Stmt::With { object, body }
                }
                "switch" => self.parse_switch()?,
                "throw" => {
                    self.advance();
                    if self.peek().newline_before {
                        return Err(self.unexpected("newline not allowed after 'throw'"));
                    }
                    let argument = self.parse_expression(false)?;
                    self.semicolon()?;
                    Stmt::Throw { argument }
                }
                "try" => self.parse_try()?,
                "debugger" => {
                    self.advance();
                    self.semicolon()?;
                    Stmt::Debugger
                }
                name if !is_keyword(name) && matches!(self.tokens[self.pos + 1].tok, Tok::Punct(":")) => {
                    let label = self.expect_ident()?;
                    self.advance(); // ":"
                    let body = Box::new(self.parse_statement()?);
                    Stmt::Labeled { label, body }
                }
                _ => {
                    let expression = self.parse_expression(false)?;
                    self.semicolon()?;
                    Stmt::Expression { expression }
                }
            },
            _ => {
                let expression = self.parse_expression(false)?;
                self.semicolon()?;
                Stmt::Expression { expression }
            }
        };
        Ok(StmtNode {
            start,
            end: self.prev_end(),
            stmt,
        })
    }

    /// The optional, newline-restricted label of `break`/`continue`.
    fn parse_jump_label(&mut self) -> Parsed<Option<Ident>> {
        if self.peek().newline_before {
            return Ok(None);
        }
        let is_label = matches!(&self.peek().tok, Tok::Name(name) if !is_keyword(name));
        if is_label {
            Ok(Some(self.expect_ident()?))
        } else {
            Ok(None)
        }
    }

    /// Parses `var` declarators; the caller handles the terminator so the
    /// `for` headers can reuse this.
    fn parse_var_declaration(&mut self) -> Parsed<VariableDeclaration> {
        let start = self.advance().start; // "var"
        let mut declarations = Vec::new();
        loop {
            let id = self.expect_ident()?;
            let id = ExprNode {
                start: id.start,
                end: id.end,
                expr: Expr::Identifier { name: id.name },
            };
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment(false)?)
            } else {
                None
            };
            declarations.push(VariableDeclarator { id, init });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(VariableDeclaration {
            declarations,
            kind: "var".to_owned(),
            start,
            end: self.prev_end(),
        })
    }

    fn parse_if(&mut self) -> Parsed<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.parse_expression(false)?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat_name("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Parsed<Stmt> {
        self.advance();
        self.expect_punct("(")?;

        // Empty init: `for (;;)`.
        if self.eat_punct(";") {
            return self.parse_for_rest(None);
        }

        let left = if self.at_name("var") {
            ForTarget::Declaration(self.parse_var_declaration()?)
        } else {
            ForTarget::Expression(self.parse_expression(true)?)
        };

        if self.eat_name("in") {
            let right = self.parse_expression(false)?;
            self.expect_punct(")")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Stmt::ForIn {
                left: Box::new(left),
                right,
                body,
            });
        }

        self.expect_punct(";")?;
        self.parse_for_rest(Some(Box::new(left)))
    }

    fn parse_for_rest(&mut self, init: Option<Box<ForTarget>>) -> Parsed<Stmt> {
        let test = if self.at_punct(";") {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> Parsed<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let discriminant = self.parse_expression(false)?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat_punct("}") {
            let test = if self.eat_name("case") {
                Some(self.parse_expression(false)?)
            } else if self.at_name("default") {
                if seen_default {
                    return Err(self.unexpected("duplicate default clause"));
                }
                seen_default = true;
                self.advance();
                None
            } else {
                return Err(self.unexpected("expected 'case' or 'default'"));
            };
            self.expect_punct(":")?;
            let mut consequent = Vec::new();
            while !(self.at_name("case") || self.at_name("default") || self.at_punct("}")) {
                if matches!(self.peek().tok, Tok::Eof) {
                    return Err(self.unexpected("expected '}'"));
                }
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(Stmt::Switch { discriminant, cases })
    }

    fn parse_try(&mut self) -> Parsed<Stmt> {
        self.advance();
        let block = self.parse_block()?;
        let handler = if self.eat_name("catch") {
            self.expect_punct("(")?;
            let param = self.expect_ident()?;
            let param = ExprNode {
                start: param.start,
                end: param.end,
                expr: Expr::Identifier { name: param.name },
            };
            self.expect_punct(")")?;
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_name("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("expected 'catch' or 'finally'"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_block(&mut self) -> Parsed<Block> {
        let start = self.expect_punct("{")?.start;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if matches!(self.peek().tok, Tok::Eof) {
                return Err(self.unexpected("expected '}'"));
            }
            body.push(self.parse_statement()?);
        }
        let end = self.advance().end;
        Ok(Block { body, start, end })
    }

    /// Parses the remainder of a function after its optional name: the
    /// parameter list and body.
    fn parse_function_rest(&mut self) -> Parsed<(Vec<ExprNode>, Block)> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.at_punct(")") {
            loop {
                let param = self.expect_ident()?;
                params.push(ExprNode {
                    start: param.start,
                    end: param.end,
                    expr: Expr::Identifier { name: param.name },
                });
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        let body = self.parse_block()?;
        Ok((params, body))
    }

    fn parse_expression(&mut self, no_in: bool) -> Parsed<ExprNode> {
        let start = self.peek().start;
        let first = self.parse_assignment(no_in)?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat_punct(",") {
            expressions.push(self.parse_assignment(no_in)?);
        }
        Ok(ExprNode {
            start,
            end: self.prev_end(),
            expr: Expr::Sequence { expressions },
        })
    }

    fn parse_assignment(&mut self, no_in: bool) -> Parsed<ExprNode> {
        let start = self.peek().start;
        let left = self.parse_conditional(no_in)?;
        let operator = match &self.peek().tok {
            Tok::Punct("=") => AssignOp::Assign,
            Tok::Punct("+=") => AssignOp::AddAssign,
            Tok::Punct("-=") => AssignOp::SubAssign,
            Tok::Punct("*=") => AssignOp::MulAssign,
            Tok::Punct("/=") => AssignOp::DivAssign,
            Tok::Punct("%=") => AssignOp::ModAssign,
            Tok::Punct("<<=") => AssignOp::LShiftAssign,
            Tok::Punct(">>=") => AssignOp::RShiftAssign,
            Tok::Punct(">>>=") => AssignOp::URShiftAssign,
            Tok::Punct("&=") => AssignOp::BitAndAssign,
            Tok::Punct("^=") => AssignOp::BitXorAssign,
            Tok::Punct("|=") => AssignOp::BitOrAssign,
            _ => return Ok(left),
        };
        if !matches!(left.expr, Expr::Identifier { .. } | Expr::Member { .. }) {
            return Err(ParseError::new("invalid assignment target", left.start));
        }
        self.advance();
        let right = self.parse_assignment(no_in)?;
        Ok(ExprNode {
            start,
            end: right.end,
            expr: Expr::Assignment {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
        })
    }

    fn parse_conditional(&mut self, no_in: bool) -> Parsed<ExprNode> {
        let start = self.peek().start;
        let test = self.parse_binary(0, no_in)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment(false)?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment(no_in)?;
        Ok(ExprNode {
            start,
            end: alternate.end,
            expr: Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        })
    }

    /// Precedence-climbing parse of binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> Parsed<ExprNode> {
        let start = self.peek().start;
        let mut left = self.parse_unary(no_in)?;
        loop {
            let (prec, op) = match &self.peek().tok {
                Tok::Punct("||") => (1, OpKind::Logical(LogicalOp::Or)),
                Tok::Punct("&&") => (2, OpKind::Logical(LogicalOp::And)),
                Tok::Punct("|") => (3, OpKind::Binary(BinaryOp::BitOr)),
                Tok::Punct("^") => (4, OpKind::Binary(BinaryOp::BitXor)),
                Tok::Punct("&") => (5, OpKind::Binary(BinaryOp::BitAnd)),
                Tok::Punct("==") => (6, OpKind::Binary(BinaryOp::Eq)),
                Tok::Punct("!=") => (6, OpKind::Binary(BinaryOp::NotEq)),
                Tok::Punct("===") => (6, OpKind::Binary(BinaryOp::StrictEq)),
                Tok::Punct("!==") => (6, OpKind::Binary(BinaryOp::StrictNotEq)),
                Tok::Punct("<") => (7, OpKind::Binary(BinaryOp::Lt)),
                Tok::Punct("<=") => (7, OpKind::Binary(BinaryOp::LtE)),
                Tok::Punct(">") => (7, OpKind::Binary(BinaryOp::Gt)),
                Tok::Punct(">=") => (7, OpKind::Binary(BinaryOp::GtE)),
                Tok::Name(n) if n == "instanceof" => (7, OpKind::Binary(BinaryOp::Instanceof)),
                Tok::Name(n) if n == "in" && !no_in => (7, OpKind::Binary(BinaryOp::In)),
                Tok::Punct("<<") => (8, OpKind::Binary(BinaryOp::LShift)),
                Tok::Punct(">>") => (8, OpKind::Binary(BinaryOp::RShift)),
                Tok::Punct(">>>") => (8, OpKind::Binary(BinaryOp::URShift)),
                Tok::Punct("+") => (9, OpKind::Binary(BinaryOp::Add)),
                Tok::Punct("-") => (9, OpKind::Binary(BinaryOp::Sub)),
                Tok::Punct("*") => (10, OpKind::Binary(BinaryOp::Mul)),
                Tok::Punct("/") => (10, OpKind::Binary(BinaryOp::Div)),
                Tok::Punct("%") => (10, OpKind::Binary(BinaryOp::Mod)),
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1, no_in)?;
            left = ExprNode {
                start,
                end: right.end,
                expr: match op {
                    OpKind::Binary(operator) => Expr::Binary {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    OpKind::Logical(operator) => Expr::Logical {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self, no_in: bool) -> Parsed<ExprNode> {
        let token = self.peek().clone();
        let operator = match &token.tok {
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Pos),
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("~") => Some(UnaryOp::BitNot),
            Tok::Name(n) if n == "typeof" => Some(UnaryOp::TypeOf),
            Tok::Name(n) if n == "void" => Some(UnaryOp::Void),
            Tok::Name(n) if n == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary(no_in)?;
            return Ok(ExprNode {
                start: token.start,
                end: argument.end,
                expr: Expr::Unary {
                    operator,
                    argument: Box::new(argument),
                },
            });
        }
        if self.at_punct("++") || self.at_punct("--") {
            let operator = if self.at_punct("++") { UpdateOp::Incr } else { UpdateOp::Decr };
            self.advance();
            let argument = self.parse_unary(no_in)?;
            return Ok(ExprNode {
                start: token.start,
                end: argument.end,
                expr: Expr::Update {
                    operator,
                    argument: Box::new(argument),
                    prefix: true,
                },
            });
        }

        let mut expr = self.parse_lhs()?;
        // Postfix update is newline-restricted: `a\n++b` is two statements.
        if (self.at_punct("++") || self.at_punct("--")) && !self.peek().newline_before {
            let operator = if self.at_punct("++") { UpdateOp::Incr } else { UpdateOp::Decr };
            self.advance();
            expr = ExprNode {
                start: expr.start,
                end: self.prev_end(),
                expr: Expr::Update {
                    operator,
                    argument: Box::new(expr),
                    prefix: false,
                },
            };
        }
        Ok(expr)
    }

    /// Call/member chains over a primary (or `new`) expression.
    fn parse_lhs(&mut self) -> Parsed<ExprNode> {
        let mut expr = self.parse_new_expression()?;
        loop {
            let start = expr.start;
            if self.eat_punct(".") {
                let property = self.expect_member_name()?;
                expr = ExprNode {
                    start,
                    end: property.end,
                    expr: Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: false,
                    },
                };
            } else if self.eat_punct("[") {
                let property = self.parse_expression(false)?;
                let end = self.expect_punct("]")?.end;
                expr = ExprNode {
                    start,
                    end,
                    expr: Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(property),
                        computed: true,
                    },
                };
            } else if self.at_punct("(") {
                let arguments = self.parse_arguments()?;
                expr = ExprNode {
                    start,
                    end: self.prev_end(),
                    expr: Expr::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// `new` binds tighter than calls: `new a.b(c)(d)` news `a.b` with
    /// `(c)` and then calls the result with `(d)`.
    fn parse_new_expression(&mut self) -> Parsed<ExprNode> {
        if !self.at_name("new") {
            return self.parse_primary();
        }
        let start = self.advance().start;
        let mut callee = self.parse_new_expression()?;
        // Member accesses bind to the constructor expression.
        loop {
            if self.eat_punct(".") {
                let property = self.expect_member_name()?;
                callee = ExprNode {
                    start: callee.start,
                    end: property.end,
                    expr: Expr::Member {
                        object: Box::new(callee),
                        property: Box::new(property),
                        computed: false,
                    },
                };
            } else if self.eat_punct("[") {
                let property = self.parse_expression(false)?;
                let end = self.expect_punct("]")?.end;
                callee = ExprNode {
                    start: callee.start,
                    end,
                    expr: Expr::Member {
                        object: Box::new(callee),
                        property: Box::new(property),
                        computed: true,
                    },
                };
            } else {
                break;
            }
        }
        let arguments = if self.at_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(ExprNode {
            start,
            end: self.prev_end(),
            expr: Expr::New {
                callee: Box::new(callee),
                arguments,
            },
        })
    }

    /// A member name after `.`: any name token, keywords included.
    fn expect_member_name(&mut self) -> Parsed<ExprNode> {
        let token = self.peek().clone();
        match &token.tok {
            Tok::Name(name) => {
                self.advance();
                Ok(ExprNode {
                    start: token.start,
                    end: token.end,
                    expr: Expr::Identifier { name: name.clone() },
                })
            }
            _ => Err(self.unexpected("expected property name")),
        }
    }

    fn parse_arguments(&mut self) -> Parsed<Vec<ExprNode>> {
        self.expect_punct("(")?;
        let mut arguments = Vec::new();
        if !self.at_punct(")") {
            loop {
                arguments.push(self.parse_assignment(false)?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Parsed<ExprNode> {
        let token = self.peek().clone();
        let node = match &token.tok {
            Tok::Num(value) => {
                self.advance();
                Expr::Literal {
                    value: LitValue::Number(*value),
                    raw: None,
                }
            }
            Tok::Str(value) => {
                self.advance();
                Expr::Literal {
                    value: LitValue::String(value.clone()),
                    raw: None,
                }
            }
            Tok::Name(name) => match name.as_str() {
                "this" => {
                    self.advance();
                    Expr::This
                }
                "true" | "false" => {
                    self.advance();
                    Expr::Literal {
                        value: LitValue::Bool(name == "true"),
                        raw: None,
                    }
                }
                "null" => {
                    self.advance();
                    Expr::Literal {
                        value: LitValue::Null,
                        raw: None,
                    }
                }
                "function" => {
                    self.advance();
                    let id = if matches!(&self.peek().tok, Tok::Name(n) if !is_keyword(n)) {
                        Some(self.expect_ident()?)
                    } else {
                        None
                    };
                    let (params, body) = self.parse_function_rest()?;
                    Expr::Function { id, params, body }
                }
                name if !is_keyword(name) => {
                    self.advance();
                    Expr::Identifier { name: name.to_owned() }
                }
                _ => return Err(self.unexpected("unexpected keyword")),
            },
            Tok::Punct("(") => {
                self.advance();
                let expr = self.parse_expression(false)?;
                self.expect_punct(")")?;
                return Ok(expr);
            }
            Tok::Punct("[") => return self.parse_array_literal(),
            Tok::Punct("{") => return self.parse_object_literal(),
            Tok::Punct("/") => {
                return Err(ParseError::new(
                    "regular expression literals are not supported",
                    token.start,
                ));
            }
            _ => return Err(self.unexpected("unexpected token")),
        };
        Ok(ExprNode {
            start: token.start,
            end: self.prev_end(),
            expr: node,
        })
    }

    fn parse_array_literal(&mut self) -> Parsed<ExprNode> {
        let start = self.expect_punct("[")?.start;
        let mut elements = Vec::new();
        loop {
            if self.at_punct("]") {
                break;
            }
            if self.eat_punct(",") {
                // Elision.
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_assignment(false)?));
            if !self.eat_punct(",") {
                break;
            }
        }
        let end = self.expect_punct("]")?.end;
        Ok(ExprNode {
            start,
            end,
            expr: Expr::Array { elements },
        })
    }

    fn parse_object_literal(&mut self) -> Parsed<ExprNode> {
        let start = self.expect_punct("{")?.start;
        let mut properties = Vec::new();
        while !self.at_punct("}") {
            properties.push(self.parse_property()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        let end = self.expect_punct("}")?.end;
        Ok(ExprNode {
            start,
            end,
            expr: Expr::Object { properties },
        })
    }

    fn parse_property(&mut self) -> Parsed<Property> {
        // `get`/`set` start an accessor unless they are themselves the
        // key of a plain property (`{get: 1}`).
        if self.at_name("get") || self.at_name("set") {
            let accessor = self.advance();
            let is_getter = matches!(&accessor.tok, Tok::Name(n) if n == "get");
            if !(self.at_punct(":") || self.at_punct(",") || self.at_punct("}") || self.at_punct("(")) {
                let key = self.parse_property_key()?;
                let fn_start = self.peek().start;
                let (params, body) = self.parse_function_rest()?;
                let value = ExprNode {
                    start: fn_start,
                    end: self.prev_end(),
                    expr: Expr::Function { id: None, params, body },
                };
                return Ok(Property {
                    key,
                    value,
                    kind: if is_getter { PropertyKind::Get } else { PropertyKind::Set },
                });
            }
            // Plain property whose key is the word `get`/`set`.
            let key = ExprNode {
                start: accessor.start,
                end: accessor.end,
                expr: Expr::Identifier {
                    name: if is_getter { "get".to_owned() } else { "set".to_owned() },
                },
            };
            self.expect_punct(":")?;
            let value = self.parse_assignment(false)?;
            return Ok(Property {
                key,
                value,
                kind: PropertyKind::Init,
            });
        }
        let key = self.parse_property_key()?;
        self.expect_punct(":")?;
        let value = self.parse_assignment(false)?;
        Ok(Property {
            key,
            value,
            kind: PropertyKind::Init,
        })
    }

    fn parse_property_key(&mut self) -> Parsed<ExprNode> {
        let token = self.peek().clone();
        let expr = match &token.tok {
            Tok::Name(name) => {
                self.advance();
                Expr::Identifier { name: name.clone() }
            }
            Tok::Str(value) => {
                self.advance();
                Expr::Literal {
                    value: LitValue::String(value.clone()),
                    raw: None,
                }
            }
            Tok::Num(value) => {
                self.advance();
                Expr::Literal {
                    value: LitValue::Number(*value),
                    raw: None,
                }
            }
            _ => return Err(self.unexpected("expected property key")),
        };
        Ok(ExprNode {
            start: token.start,
            end: token.end,
            expr,
        })
    }
}

enum OpKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_insertion() {
        assert!(parse("var a = 1\nvar b = 2").is_ok());
        assert!(parse("a = 1 b = 2").is_err());
        // An expression continues across a newline when it can.
        let program = parse("a = 1 +\n2").unwrap();
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn restricted_productions() {
        // `return\nx` returns undefined, then `x` is its own statement.
        let program = parse("function f() { return\n1 }").unwrap();
        let Stmt::FunctionDecl { body, .. } = &program.body[0].stmt else {
            panic!("expected function declaration");
        };
        assert_eq!(body.body.len(), 2);
    }

    #[test]
    fn for_in_and_classic_for() {
        assert!(parse("for (var i = 0; i < 3; i++) {}").is_ok());
        assert!(parse("for (k in o) {}").is_ok());
        assert!(parse("for (var k in o) {}").is_ok());
        assert!(parse("for (;;) break;").is_ok());
    }

    #[test]
    fn object_literal_accessors() {
        let program = parse("x = { a: 1, get b() { return 2 }, set b(v) {}, 'c': 3, 4: 5 };").unwrap();
        let Stmt::Expression { expression } = &program.body[0].stmt else {
            panic!("expected expression statement");
        };
        let Expr::Assignment { right, .. } = &expression.expr else {
            panic!("expected assignment");
        };
        let Expr::Object { properties } = &right.expr else {
            panic!("expected object literal");
        };
        assert_eq!(properties.len(), 5);
        assert_eq!(properties[1].kind, PropertyKind::Get);
        assert_eq!(properties[2].kind, PropertyKind::Set);
    }

    #[test]
    fn function_offsets_slice_source() {
        let source = "var f = function (a) { return a };";
        let program = parse(source).unwrap();
        let Stmt::Variable { declarations, .. } = &program.body[0].stmt else {
            panic!("expected var declaration");
        };
        let init = declarations[0].init.as_ref().unwrap();
        assert_eq!(&source[init.start..init.end], "function (a) { return a }");
    }

    #[test]
    fn regex_literals_are_rejected() {
        let err = parse("var re = /ab+c/;").unwrap_err();
        assert!(err.message.contains("regular expression"));
    }

    #[test]
    fn labeled_statements() {
        assert!(parse("outer: for (;;) { break outer; }").is_ok());
        assert!(parse("L: { if (true) break L; }").is_ok());
    }
}
