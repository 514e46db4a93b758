//! Arithmetic expressions of the spatial coordinates `x`, `y`, `z` and the time `t`.
//!
//! Supports `+ - * / ^`, unary signs, parentheses, the constants `pi` and `e`, and the
//! usual elementary functions. `^` is right-associative and binds tighter than a unary
//! minus, so `-2^2` is `-4`.

pub mod value;

pub use value::ExpressionValue;

use thiserror::Error;

const MAX_NESTING: usize = 128;

/// Error raised while compiling an expression string.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at column {column} of `{text}`")]
pub struct ExpressionError {
    pub text: String,
    /// 1-based column of the offending token.
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    X,
    Y,
    Z,
    T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}
impl BinOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Sign,
    Atan2,
    Pow,
    Min,
    Max,
}
impl Func {
    fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" | "ln" => Func::Ln,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "sign" => Func::Sign,
            "atan2" => Func::Atan2,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        };
        Some(func)
    }
    fn arity(self) -> usize {
        match self {
            Func::Atan2 | Func::Pow | Func::Min | Func::Max => 2,
            _ => 1,
        }
    }
    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Func::Sin => a.sin(),
            Func::Cos => a.cos(),
            Func::Tan => a.tan(),
            Func::Asin => a.asin(),
            Func::Acos => a.acos(),
            Func::Atan => a.atan(),
            Func::Sinh => a.sinh(),
            Func::Cosh => a.cosh(),
            Func::Tanh => a.tanh(),
            Func::Exp => a.exp(),
            Func::Ln => a.ln(),
            Func::Log10 => a.log10(),
            Func::Sqrt => a.sqrt(),
            Func::Abs => a.abs(),
            Func::Floor => a.floor(),
            Func::Ceil => a.ceil(),
            // signum() maps 0 to 1, we want 0
            Func::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Func::Atan2 => a.atan2(args[1]),
            Func::Pow => a.powf(args[1]),
            Func::Min => a.min(args[1]),
            Func::Max => a.max(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Var(Var),
    Neg(Box<Node>),
    BinOp(BinOp, Box<Node>, Box<Node>),
    // left-associative run such as `a - b + c`, kept flat so its depth does not grow with length
    Chain(Box<Node>, Vec<(BinOp, Node)>),
    Call(Func, Vec<Node>),
}
impl Node {
    fn eval(&self, xyzt: &[f64; 4]) -> f64 {
        match self {
            Node::Number(v) => *v,
            Node::Var(var) => match var {
                Var::X => xyzt[0],
                Var::Y => xyzt[1],
                Var::Z => xyzt[2],
                Var::T => xyzt[3],
            },
            Node::Neg(a) => -a.eval(xyzt),
            Node::BinOp(op, a, b) => op.apply(a.eval(xyzt), b.eval(xyzt)),
            Node::Chain(first, rest) => rest
                .iter()
                .fold(first.eval(xyzt), |acc, (op, b)| op.apply(acc, b.eval(xyzt))),
            Node::Call(func, args) => {
                let mut values = [0.0; 2];
                for (value, arg) in values.iter_mut().zip(args) {
                    *value = arg.eval(xyzt);
                }
                func.apply(&values[..args.len()])
            }
        }
    }
    fn is_constant(&self) -> bool {
        match self {
            Node::Number(_) => true,
            Node::Var(_) => false,
            Node::Neg(a) => a.is_constant(),
            Node::BinOp(_, a, b) => a.is_constant() && b.is_constant(),
            Node::Chain(first, rest) => first.is_constant() && rest.iter().all(|(_, b)| b.is_constant()),
            Node::Call(_, args) => args.iter().all(Node::is_constant),
        }
    }
}

/// A compiled expression. Immutable once built, evaluation is pure.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: Node,
}
impl Expression {
    pub fn compile(text: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_add()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error_at(
                token.start,
                format!("unexpected {} after expression", token.kind.describe()),
            ));
        }
        Ok(Self {
            text: text.to_string(),
            root,
        })
    }
    pub fn evaluate(&self, x: f64, y: f64, z: f64, t: f64) -> f64 {
        self.root.eval(&[x, y, z, t])
    }
    /// True when the expression references none of `x`, `y`, `z`, `t`.
    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}
impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Num(v) => format!("number {v}"),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Caret => "'^'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
}

fn syntax_error(text: &str, offset: usize, message: String) -> ExpressionError {
    ExpressionError {
        text: text.to_string(),
        column: offset + 1,
        message,
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    if let Some((start, ch)) = text.char_indices().find(|(_, ch)| !ch.is_ascii()) {
        return Err(syntax_error(
            text,
            start,
            format!("non-ASCII character '{ch}'"),
        ));
    }
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match b {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'^' => TokenKind::Caret,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // exponent only when a digit follows, optionally signed
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal = &text[start..i];
                let value = literal.parse::<f64>().map_err(|_| {
                    syntax_error(text, start, format!("invalid number '{literal}'"))
                })?;
                tokens.push(Token {
                    kind: TokenKind::Num(value),
                    start,
                });
                continue;
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(text[start..i].to_string()),
                    start,
                });
                continue;
            }
            other => {
                return Err(syntax_error(
                    text,
                    start,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        tokens.push(Token { kind, start });
        i += 1;
    }
    Ok(tokens)
}

fn chain(first: Node, mut rest: Vec<(BinOp, Node)>) -> Node {
    match rest.len() {
        0 => first,
        1 => {
            let (op, rhs) = rest.remove(0);
            Node::BinOp(op, Box::new(first), Box::new(rhs))
        }
        _ => Node::Chain(Box::new(first), rest),
    }
}

struct Parser<'a> {
    text: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}
impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }
    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|token| &token.kind)
    }
    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
    fn error_at(&self, offset: usize, message: String) -> ExpressionError {
        syntax_error(self.text, offset, message)
    }
    fn error_at_end(&self, message: &str) -> ExpressionError {
        self.error_at(self.text.len(), format!("{message}, got end of input"))
    }
    fn expect(&mut self, expected: TokenKind) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(token) if token.kind == expected => Ok(()),
            Some(token) => Err(self.error_at(
                token.start,
                format!(
                    "expected {}, got {}",
                    expected.describe(),
                    token.kind.describe()
                ),
            )),
            None => Err(self.error_at_end(&format!("expected {}", expected.describe()))),
        }
    }
    fn parse_add(&mut self) -> Result<Node, ExpressionError> {
        let first = self.parse_mul()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_mul()?));
        }
        Ok(chain(first, rest))
    }
    fn parse_mul(&mut self) -> Result<Node, ExpressionError> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_unary()?));
        }
        Ok(chain(first, rest))
    }
    // Every nested construct (sign, parenthesis, call argument, exponent) re-enters here, so
    // this bounds the tree depth for both the parser and `Node::eval`.
    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let offset = self.peek().map_or(self.text.len(), |token| token.start);
            return Err(self.error_at(
                offset,
                format!("expression nested too deeply (limit {MAX_NESTING})"),
            ));
        }
        let node = self.parse_signed();
        self.depth -= 1;
        node
    }
    fn parse_signed(&mut self) -> Result<Node, ExpressionError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }
    fn parse_power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.parse_atom()?;
        if matches!(self.peek_kind(), Some(TokenKind::Caret)) {
            self.advance();
            // right-associative, and the exponent may carry its own sign
            let exponent = self.parse_unary()?;
            return Ok(Node::BinOp(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }
    fn parse_atom(&mut self) -> Result<Node, ExpressionError> {
        let Some(token) = self.advance() else {
            return Err(self.error_at_end("expected expression"));
        };
        match &token.kind {
            TokenKind::Num(v) => Ok(Node::Number(*v)),
            TokenKind::LParen => {
                let inner = self.parse_add()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if matches!(self.peek_kind(), Some(TokenKind::LParen)) {
                    self.advance();
                    self.parse_call(name, token.start)
                } else {
                    self.resolve_name(name, token.start)
                }
            }
            other => Err(self.error_at(
                token.start,
                format!("expected expression, got {}", other.describe()),
            )),
        }
    }
    fn parse_call(&mut self, name: &str, start: usize) -> Result<Node, ExpressionError> {
        let func = Func::lookup(name)
            .ok_or_else(|| self.error_at(start, format!("unknown function '{name}'")))?;
        let mut args = Vec::new();
        if !matches!(self.peek_kind(), Some(TokenKind::RParen)) {
            args.push(self.parse_add()?);
            while matches!(self.peek_kind(), Some(TokenKind::Comma)) {
                self.advance();
                args.push(self.parse_add()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        if args.len() != func.arity() {
            return Err(self.error_at(
                start,
                format!(
                    "function '{name}' takes {} argument(s), got {}",
                    func.arity(),
                    args.len()
                ),
            ));
        }
        Ok(Node::Call(func, args))
    }
    fn resolve_name(&self, name: &str, start: usize) -> Result<Node, ExpressionError> {
        let node = match name {
            "x" => Node::Var(Var::X),
            "y" => Node::Var(Var::Y),
            "z" => Node::Var(Var::Z),
            "t" => Node::Var(Var::T),
            "pi" => Node::Number(std::f64::consts::PI),
            "e" => Node::Number(std::f64::consts::E),
            _ => {
                return Err(self.error_at(start, format!("unknown variable '{name}'")));
            }
        };
        Ok(node)
    }
}
