//! Algebraic expressions: tokenizer, recursive-descent parser, evaluator, and
//! sampled numeric equivalence.

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::MathParseError;
use crate::config::MathSettings;

/// Fixed seed for equivalence sampling, so a verdict never changes between
/// runs.
const SAMPLE_SEED: u64 = 0x5EED_A55E_55ED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Ln,
    Log,
    Exp,
    Sqrt,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "sec" => Func::Sec,
            "csc" => Func::Csc,
            "cot" => Func::Cot,
            "asin" | "arcsin" => Func::Asin,
            "acos" | "arccos" => Func::Acos,
            "atan" | "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "ln" => Func::Ln,
            "log" => Func::Log,
            "exp" => Func::Exp,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            _ => return None,
        })
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Sec => 1.0 / x.cos(),
            Func::Csc => 1.0 / x.sin(),
            Func::Cot => 1.0 / x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Ln => x.ln(),
            Func::Log => x.log10(),
            Func::Exp => x.exp(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                vars.insert(name.clone());
            }
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_variables(vars),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "identifier {name:?}"),
            Token::Op(op) => write!(f, "operator {op:?}"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

const NAMED: &[&str] = &[
    "arcsin", "arccos", "arctan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "sin", "cos",
    "tan", "sec", "csc", "cot", "ln", "log", "exp", "sqrt", "abs", "pi", "alpha", "beta",
    "gamma", "delta", "varepsilon", "epsilon", "zeta", "eta", "vartheta", "theta", "iota",
    "kappa", "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "upsilon", "varphi", "phi",
    "chi", "psi", "omega",
];

/// Split a run of letters into known names, falling back to single-letter
/// variables (`2xy` is `2*x*y`, `sinx` is `sin(x)`).
fn split_identifiers(run: &str, out: &mut Vec<Token>) {
    let mut rest = run;
    while !rest.is_empty() {
        let known = NAMED
            .iter()
            .filter(|name| rest.starts_with(**name))
            .max_by_key(|name| name.len());
        let len = match known {
            Some(name) => name.len(),
            None => rest.chars().next().map_or(1, char::len_utf8),
        };
        out.push(Token::Ident(rest[..len].to_string()));
        rest = &rest[len..];
    }
}

fn tokenize(input: &str, max_tokens: usize) -> Result<Vec<Token>, MathParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| MathParseError::MalformedNumber(literal.clone()))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let run: String = chars[start..i].iter().collect();
                split_identifiers(&run, &mut tokens);
            }
            '\\' if chars.get(i + 1) == Some(&'%') => {
                tokens.push(Token::Op('%'));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '^' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '−' => {
                tokens.push(Token::Op('-'));
                i += 1;
            }
            '·' | '×' => {
                tokens.push(Token::Op('*'));
                i += 1;
            }
            '÷' => {
                tokens.push(Token::Op('/'));
                i += 1;
            }
            '(' | '[' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' | ']' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => return Err(MathParseError::UnexpectedChar(other)),
        }
        if tokens.len() > max_tokens {
            return Err(MathParseError::TooLong(max_tokens));
        }
    }
    Ok(tokens)
}

/// Parse an algebraic expression.
pub fn parse(input: &str, settings: &MathSettings) -> Result<Expr, MathParseError> {
    let tokens = tokenize(input, settings.max_tokens)?;
    if tokens.is_empty() {
        return Err(MathParseError::Empty);
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        max_depth: settings.max_depth,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::RParen) => Err(MathParseError::Unbalanced(')')),
        Some(token) => Err(MathParseError::UnexpectedToken(token.to_string())),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn enter(&mut self) -> Result<(), MathParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(MathParseError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, MathParseError> {
        self.enter()?;
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = if *op == '+' { BinOp::Add } else { BinOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        self.depth -= 1;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, MathParseError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Op('*')) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::binary(BinOp::Mul, lhs, rhs);
                }
                Some(Token::Op('/')) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::binary(BinOp::Div, lhs, rhs);
                }
                // Implicit multiplication: `2x`, `x(y+1)`, `(a)(b)`.
                Some(Token::Num(_) | Token::Ident(_) | Token::LParen) => {
                    let rhs = self.power()?;
                    lhs = Expr::binary(BinOp::Mul, lhs, rhs);
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, MathParseError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.power(),
        }
    }

    /// `^` is right-associative and binds tighter than unary minus on its
    /// left (`-x^2` is `-(x^2)`).
    fn power(&mut self) -> Result<Expr, MathParseError> {
        let base = self.postfix()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.enter()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, MathParseError> {
        let mut expr = self.primary()?;
        while let Some(Token::Op('%')) = self.peek() {
            self.pos += 1;
            expr = Expr::binary(BinOp::Div, expr, Expr::Num(100.0));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, MathParseError> {
        match self.next().cloned() {
            Some(Token::Num(value)) => Ok(Expr::Num(value)),
            Some(Token::Ident(name)) => {
                if let Some(func) = Func::from_name(&name) {
                    self.enter()?;
                    let arg = match self.peek() {
                        Some(Token::LParen) => self.primary()?,
                        _ => self.power()?,
                    };
                    self.depth -= 1;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                if name == "pi" {
                    return Ok(Expr::Num(std::f64::consts::PI));
                }
                Ok(Expr::Var(name))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(MathParseError::Unbalanced('(')),
                }
            }
            Some(token) => Err(MathParseError::UnexpectedToken(token.to_string())),
            None => Err(MathParseError::UnexpectedEnd),
        }
    }
}

/// Step-counting evaluator.
struct Evaluator<'a> {
    vars: &'a HashMap<String, f64>,
    steps: usize,
    max_steps: usize,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<f64, MathParseError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(MathParseError::BudgetExceeded(self.max_steps));
        }
        Ok(match expr {
            Expr::Num(value) => *value,
            Expr::Var(name) => self.vars.get(name).copied().unwrap_or(f64::NAN),
            Expr::Neg(inner) => -self.eval(inner)?,
            Expr::Call(func, arg) => func.apply(self.eval(arg)?),
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                }
            }
        })
    }
}

/// Evaluate an expression with no free variables.
pub fn evaluate(expr: &Expr, settings: &MathSettings) -> Result<f64, MathParseError> {
    let vars = HashMap::new();
    let mut evaluator = Evaluator {
        vars: &vars,
        steps: 0,
        max_steps: settings.max_steps,
    };
    evaluator.eval(expr)
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

/// Numeric equivalence of two expressions.
///
/// Constant expressions are compared directly and must both be finite.
/// Expressions with variables are evaluated at deterministic sample points
/// with magnitudes in `[0.5, 3.5)` and alternating signs; a point where both
/// sides are undefined is skipped, a point where only one side is undefined
/// is a mismatch, and at least one point must be comparable.
pub fn equivalent(a: &Expr, b: &Expr, settings: &MathSettings) -> Result<bool, MathParseError> {
    let mut vars = a.variables();
    vars.extend(b.variables());

    if vars.is_empty() {
        let env = HashMap::new();
        let mut evaluator = Evaluator {
            vars: &env,
            steps: 0,
            max_steps: settings.max_steps,
        };
        let x = evaluator.eval(a)?;
        let y = evaluator.eval(b)?;
        return Ok(x.is_finite() && y.is_finite() && close(x, y, settings.tolerance));
    }

    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut compared = 0;
    let mut steps = 0;
    for point in 0..settings.sample_points.max(2) {
        let env: HashMap<String, f64> = vars
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let magnitude = rng.gen_range(0.5..3.5);
                let sign = if (point + i) % 2 == 0 { 1.0 } else { -1.0 };
                (v.clone(), sign * magnitude)
            })
            .collect();
        let mut evaluator = Evaluator {
            vars: &env,
            steps,
            max_steps: settings.max_steps,
        };
        let x = evaluator.eval(a)?;
        let y = evaluator.eval(b)?;
        steps = evaluator.steps;
        match (x.is_finite(), y.is_finite()) {
            (true, true) => {
                if !close(x, y, settings.tolerance) {
                    return Ok(false);
                }
                compared += 1;
            }
            (false, false) => continue,
            _ => return Ok(false),
        }
    }
    Ok(compared > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MathSettings {
        MathSettings::default()
    }

    fn value(input: &str) -> f64 {
        evaluate(&parse(input, &settings()).unwrap(), &settings()).unwrap()
    }

    fn equiv(a: &str, b: &str) -> bool {
        let s = settings();
        equivalent(&parse(a, &s).unwrap(), &parse(b, &s).unwrap(), &s).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(value("1 + 2 * 3"), 7.0);
        assert_eq!(value("(1 + 2) * 3"), 9.0);
        assert_eq!(value("2^3^2"), 512.0);
        assert_eq!(value("-2^2"), -4.0);
        assert_eq!(value("8 / 4 / 2"), 1.0);
        assert_eq!(value("2^-1"), 0.5);
    }

    #[test]
    fn implicit_multiplication_and_percent() {
        assert_eq!(value("2(3)"), 6.0);
        assert_eq!(value("(1+1)(2+2)"), 8.0);
        assert_eq!(value("50%"), 0.5);
        assert_eq!(value("50\\%"), 0.5);
        assert!((value("2pi") - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn functions() {
        assert!((value("sin(0)")).abs() < 1e-12);
        assert_eq!(value("sqrt(16)"), 4.0);
        assert_eq!(value("sqrt16"), 4.0);
        assert_eq!(value("abs(-3)"), 3.0);
        assert!((value("log(1000)") - 3.0).abs() < 1e-12);
    }

    #[test]
    fn identifiers_split_into_variables() {
        let expr = parse("2xy", &settings()).unwrap();
        let vars: Vec<String> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["x".to_string(), "y".to_string()]);

        let expr = parse("sinx", &settings()).unwrap();
        assert!(matches!(expr, Expr::Call(Func::Sin, _)));
    }

    #[test]
    fn algebraic_equivalence() {
        assert!(equiv("2x + 2", "2(x+1)"));
        assert!(equiv("x^2 - 1", "(x-1)(x+1)"));
        assert!(equiv("((x)/(2))", "0.5x"));
        assert!(equiv("0.5", "1/2"));
        assert!(!equiv("2x", "x + 2"));
        assert!(!equiv("x", "y"));
    }

    #[test]
    fn undefined_everywhere_is_not_equal() {
        assert!(!equiv("sqrt(-x^2-1)", "sqrt(-x^2-1)"));
        assert!(!equiv("1/0", "1/0"));
    }

    #[test]
    fn non_finite_constants_are_not_equal() {
        assert!(!equiv("10^400", "10^999"));
        assert!(!equiv("10^400", "10^400"));
        assert!(!equiv("0/0", "0/0"));
        assert!(equiv("10^300", "10^300"));
    }

    #[test]
    fn negative_inputs_are_sampled() {
        assert!(!equiv("sqrt(x^2)", "x"));
        assert!(!equiv("abs(x)", "x"));
        assert!(!equiv("abs(xy)", "xy"));
        assert!(equiv("sqrt(x^2)", "abs(x)"));
        // Undefined for negative x on both sides, equal elsewhere.
        assert!(equiv("sqrt(x)sqrt(x)", "sqrt(x)^2"));
    }

    #[test]
    fn syntax_errors() {
        let s = settings();
        assert_eq!(parse("", &s), Err(MathParseError::Empty));
        assert_eq!(parse("(1 + 2", &s), Err(MathParseError::Unbalanced('(')));
        assert_eq!(parse("1 + 2)", &s), Err(MathParseError::Unbalanced(')')));
        assert_eq!(parse("1 +", &s), Err(MathParseError::UnexpectedEnd));
        assert_eq!(parse("2 & 3", &s), Err(MathParseError::UnexpectedChar('&')));
        assert!(matches!(parse("1.2.3", &s), Err(MathParseError::MalformedNumber(_))));
    }

    #[test]
    fn budgets() {
        let s = MathSettings {
            max_tokens: 10,
            ..MathSettings::default()
        };
        assert_eq!(
            parse("1+1+1+1+1+1+1", &s),
            Err(MathParseError::TooLong(10))
        );

        let s = MathSettings {
            max_depth: 8,
            ..MathSettings::default()
        };
        let nested = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&nested, &s), Err(MathParseError::TooDeep(8)));

        let s = MathSettings {
            max_steps: 5,
            ..MathSettings::default()
        };
        let expr = parse("1+2+3+4+5", &s).unwrap();
        assert_eq!(evaluate(&expr, &s), Err(MathParseError::BudgetExceeded(5)));
    }
}
