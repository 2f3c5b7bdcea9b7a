//! 数学能力：安全的算术表达式求值
//!
//! 递归下降解析，支持 + - * / % ^、括号、一元负号、常用函数与常量 pi / e；不执行任意代码。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

static SPAN_RE: OnceLock<Regex> = OnceLock::new();

pub struct MathTool;

impl MathTool {
    pub fn new() -> Self {
        Self
    }

    /// 句子中最长的算术片段，如 "compute 2+2 please" 中的 "2+2"
    fn candidate<'a>(&self, query: &'a str) -> Option<&'a str> {
        let re = SPAN_RE
            .get_or_init(|| Regex::new(r"[0-9.+\-*/%^()\s]*[0-9][0-9.+\-*/%^()\s]*").unwrap());
        re.find_iter(query)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .max_by_key(|s| s.len())
    }
}

impl Default for MathTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for MathTool {
    fn name(&self) -> &str {
        "math_agent"
    }

    fn description(&self) -> &str {
        "Evaluate arithmetic expressions precisely (+ - * / % ^, sqrt, abs, sin, cos, ln, pi, e). Args: {\"query\": \"...\", \"expression\": \"optional expression\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        if let Some(expr) = args.str_arg("expression") {
            return evaluate(expr).map(format_number);
        }
        match evaluate(&args.query) {
            Ok(v) => Ok(format_number(v)),
            Err(whole_err) => {
                let span = self
                    .candidate(&args.query)
                    .ok_or_else(|| format!("No arithmetic expression found: {whole_err}"))?;
                tracing::debug!(span = %span, "math tool fallback span");
                evaluate(span).map(format_number)
            }
        }
    }
}

/// 整数结果不带小数点
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("Unexpected token at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not finite".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n = s.parse::<f64>().map_err(|_| format!("Bad number: {s}"))?;
                tokens.push(Token::Num(n));
            }
            'a'..='z' | 'A'..='Z' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect::<String>().to_lowercase()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                // ** 视为乘方
                if c == '*' && chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Op('^'));
                    i += 2;
                } else {
                    tokens.push(Token::Op(c));
                    i += 1;
                }
            }
            '×' => {
                tokens.push(Token::Op('*'));
                i += 1;
            }
            '÷' => {
                tokens.push(Token::Op('/'));
                i += 1;
            }
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
            other => return Err(format!("Unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

/// 括号、一元符号、乘方链的最大嵌套层数
const MAX_DEPTH: usize = 128;

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
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err("Division by zero".to_string()),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := '-' unary | '+' unary | power
    // 括号、函数参数和乘方右侧都经过这里，嵌套层数在此统一计数
    fn unary(&mut self) -> Result<f64, String> {
        self.depth += 1;
        let result = if self.depth > MAX_DEPTH {
            Err("Expression nested too deeply".to_string())
        } else {
            self.unary_inner()
        };
        self.depth -= 1;
        result
    }

    fn unary_inner(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   右结合
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err("Missing closing parenthesis".to_string()),
                }
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                "e" => Ok(std::f64::consts::E),
                _ => {
                    if self.next() != Some(Token::LParen) {
                        return Err(format!("Unknown identifier '{name}'"));
                    }
                    let mut args = vec![self.expr()?];
                    while let Some(Token::Comma) = self.peek() {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                    if self.next() != Some(Token::RParen) {
                        return Err("Missing closing parenthesis".to_string());
                    }
                    apply(&name, &args)
                }
            },
            Some(t) => Err(format!("Unexpected token {t:?}")),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}

fn apply(name: &str, args: &[f64]) -> Result<f64, String> {
    let one = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(format!("{name} takes one argument")),
    };
    match name {
        "sqrt" => match args {
            [x] if *x < 0.0 => Err("sqrt of negative number".to_string()),
            _ => one(f64::sqrt),
        },
        "abs" => one(f64::abs),
        "sin" => one(f64::sin),
        "cos" => one(f64::cos),
        "tan" => one(f64::tan),
        "ln" => one(f64::ln),
        "log10" | "log" => one(f64::log10),
        "exp" => one(f64::exp),
        "floor" => one(f64::floor),
        "ceil" => one(f64::ceil),
        "round" => one(f64::round),
        "pow" => match args {
            [a, b] => Ok(a.powf(*b)),
            _ => Err("pow takes two arguments".to_string()),
        },
        "max" if !args.is_empty() => Ok(args.iter().cloned().fold(f64::MIN, f64::max)),
        "min" if !args.is_empty() => Ok(args.iter().cloned().fold(f64::MAX, f64::min)),
        _ => Err(format!("Unknown function '{name}'")),
    }
}
