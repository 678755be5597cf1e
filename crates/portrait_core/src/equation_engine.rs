use crate::params::ParameterSet;
use crate::traits::ScalarField;
use std::cell::RefCell;
use std::collections::HashMap;

/// One-argument functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
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
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        })
    }

    fn apply(self, a: f64) -> f64 {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Log10 => a.log10(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

/// OpCodes for the stack-based virtual machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant.
    LoadConst(f64),
    /// Pushes the first (0) or second (1) state variable.
    LoadVar(usize),
    /// Pushes the parameter whose name sits at this index of the
    /// expression's parameter table.
    LoadParam(usize),
    /// Pops b, a; pushes a + b.
    Add,
    /// Pops b, a; pushes a - b.
    Sub,
    /// Pops b, a; pushes a * b.
    Mul,
    /// Pops b, a; pushes a / b.
    Div,
    /// Pops b, a; pushes a ^ b.
    Pow,
    /// Pops a; pushes -a.
    Neg,
    /// Pops a; pushes f(a).
    Call(Function),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

thread_local! {
    static STACK: RefCell<Vec<f64>> = RefCell::new(Vec::with_capacity(64));
}

/// Stack-based virtual machine.
///
/// The evaluation stack is thread-local, so compiled expressions can be
/// shared between the worker threads of a basin trace.
pub struct VM;

impl VM {
    /// Runs `bytecode` for the state `(x, y)`. Malformed bytecode and
    /// unbound parameters evaluate to NaN.
    pub fn execute(bytecode: &Bytecode, x: f64, y: f64, params: &[f64]) -> f64 {
        STACK.with(|cell| {
            let mut stack = cell.borrow_mut();
            stack.clear();
            for op in &bytecode.ops {
                match *op {
                    OpCode::LoadConst(value) => stack.push(value),
                    OpCode::LoadVar(0) => stack.push(x),
                    OpCode::LoadVar(_) => stack.push(y),
                    OpCode::LoadParam(idx) => stack.push(params.get(idx).copied().unwrap_or(f64::NAN)),
                    OpCode::Neg => {
                        let a = stack.pop().unwrap_or(f64::NAN);
                        stack.push(-a);
                    }
                    OpCode::Call(func) => {
                        let a = stack.pop().unwrap_or(f64::NAN);
                        stack.push(func.apply(a));
                    }
                    binary => {
                        let b = stack.pop().unwrap_or(f64::NAN);
                        let a = stack.pop().unwrap_or(f64::NAN);
                        stack.push(match binary {
                            OpCode::Add => a + b,
                            OpCode::Sub => a - b,
                            OpCode::Mul => a * b,
                            OpCode::Div => a / b,
                            OpCode::Pow => a.powf(b),
                            _ => f64::NAN,
                        });
                    }
                }
            }
            stack.pop().unwrap_or(f64::NAN)
        })
    }
}

// --- AST & Parser ---

/// Abstract syntax tree of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // +, -, *, /, ^
    Unary(char, Box<Expr>),            // -
    Call(String, Box<Expr>),
}

/// Compiles an [`Expr`] into [`Bytecode`], resolving names to the two state
/// variables, the declared parameters, or the constants `pi` and `e`.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { var_map, param_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, String> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), String> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else {
                    match name.as_str() {
                        "pi" => ops.push(OpCode::LoadConst(std::f64::consts::PI)),
                        "e" => ops.push(OpCode::LoadConst(std::f64::consts::E)),
                        _ => return Err(format!("Unknown variable or parameter: {name}")),
                    }
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    _ => return Err(format!("Unknown binary operator: {op}")),
                });
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    _ => return Err(format!("Unknown unary operator: {op}")),
                }
            }
            Expr::Call(func, arg) => {
                let func = Function::from_name(func).ok_or_else(|| format!("Unknown function: {func}"))?;
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(func));
            }
        }
        Ok(())
    }
}

/// Parses an expression string into an AST.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("Unexpected trailing token {token:?}")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            // Exponent suffix: e, E, optionally signed.
            if let Some(&e) = chars.peek() {
                if e == 'e' || e == 'E' {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let mut exponent = String::from("e");
                    if let Some(&sign) = lookahead.peek() {
                        if sign == '+' || sign == '-' {
                            exponent.push(sign);
                            lookahead.next();
                        }
                    }
                    let mut digits = 0;
                    while let Some(&d) = lookahead.peek() {
                        if d.is_ascii_digit() {
                            exponent.push(d);
                            lookahead.next();
                            digits += 1;
                        } else {
                            break;
                        }
                    }
                    if digits > 0 {
                        num_str.push_str(&exponent);
                        chars = lookahead;
                    }
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| format!("Invalid number literal: {num_str}"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            chars.next();
            match c {
                '+' => tokens.push(Token::Plus),
                '-' => tokens.push(Token::Minus),
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(Token::Caret);
                    } else {
                        tokens.push(Token::Star);
                    }
                }
                '/' => tokens.push(Token::Slash),
                '^' => tokens.push(Token::Caret),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                other => return Err(format!("Unexpected character '{other}'")),
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Unary minus binds looser than power: -x^2 == -(x^2).
    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary('-', Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // Right-associative: 2^3^2 == 2^(3^2).
    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    if let Some(Token::RParen) = self.consume() {
                        Ok(Expr::Call(name, Box::new(arg)))
                    } else {
                        Err("Expected ')'".to_string())
                    }
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                if let Some(Token::RParen) = self.consume() {
                    Ok(expr)
                } else {
                    Err("Expected ')'".to_string())
                }
            }
            Some(token) => Err(format!("Unexpected token {token:?}")),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}

// --- Expression ---

/// A compiled scalar expression of two state variables and named parameters.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    bytecode: Bytecode,
    param_names: Vec<String>,
}

impl Expression {
    /// Parses and compiles `source`. Identifiers must be one of
    /// `var_names` (exactly two), one of `param_names`, or `pi` / `e`.
    pub fn compile(source: &str, var_names: &[String], param_names: &[String]) -> Result<Self, String> {
        if var_names.len() != 2 {
            return Err(format!(
                "Expected exactly 2 state variables, got {}",
                var_names.len()
            ));
        }
        let expr = parse(source)?;
        let compiler = Compiler::new(var_names, param_names);
        let bytecode = compiler.compile(&expr)?;
        Ok(Self {
            source: source.to_string(),
            bytecode,
            param_names: param_names.to_vec(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}

impl ScalarField for Expression {
    fn eval(&self, x: f64, y: f64, params: &ParameterSet) -> f64 {
        // Up to 16 parameters are resolved without allocating.
        let mut values = [f64::NAN; 16];
        if self.param_names.len() <= values.len() {
            for (slot, name) in values.iter_mut().zip(&self.param_names) {
                *slot = params.get(name).unwrap_or(f64::NAN);
            }
            VM::execute(&self.bytecode, x, y, &values[..self.param_names.len()])
        } else {
            let values: Vec<f64> = self
                .param_names
                .iter()
                .map(|name| params.get(name).unwrap_or(f64::NAN))
                .collect();
            VM::execute(&self.bytecode, x, y, &values)
        }
    }
}
