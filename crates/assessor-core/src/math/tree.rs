//! LaTeX to math markup tree.
//!
//! Only the structure that matters for comparison is kept: fractions, roots,
//! super/subscripts, and environments become elements; operator and symbol
//! commands are rewritten to the plain text the algebraic parser reads; font
//! and sizing commands disappear.

use super::MathParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum MathNode {
    Text(String),
    Element {
        name: String,
        args: Vec<Vec<MathNode>>,
        children: Vec<MathNode>,
    },
}

impl MathNode {
    pub fn element(name: &str, args: Vec<Vec<MathNode>>) -> Self {
        MathNode::Element {
            name: name.to_string(),
            args,
            children: Vec::new(),
        }
    }

    /// Whitespace-only text carries no meaning for comparison.
    pub fn is_important(&self) -> bool {
        match self {
            MathNode::Text(t) => !t.trim().is_empty(),
            MathNode::Element { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MathTree {
    pub children: Vec<MathNode>,
}

impl MathTree {
    /// Parse LaTeX (with or without math-mode delimiters).
    pub fn parse(input: &str, max_depth: usize) -> Result<Self, MathParseError> {
        let body = strip_math_mode(input.trim());
        let chars: Vec<char> = body.chars().collect();
        let mut parser = TreeParser {
            chars: &chars,
            pos: 0,
            depth: 0,
            max_depth,
        };
        let children = parser.sequence(&Stop::Eof)?;
        Ok(Self { children })
    }

    /// Parse, or keep the raw input as a single text node when it is not
    /// well-formed LaTeX.
    pub fn parse_or_text(input: &str, max_depth: usize) -> Self {
        match Self::parse(input, max_depth) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(error = %e, input, "latex parse failed, comparing as text");
                Self {
                    children: vec![MathNode::Text(input.to_string())],
                }
            }
        }
    }
}

fn strip_math_mode(input: &str) -> &str {
    for (open, close) in [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")] {
        if input.len() >= open.len() + close.len()
            && input.starts_with(open)
            && input.ends_with(close)
        {
            return input[open.len()..input.len() - close.len()].trim();
        }
    }
    input
}

enum Stop {
    Eof,
    Char(char),
    End(String),
}

struct TreeParser<'a> {
    chars: &'a [char],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl TreeParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn enter(&mut self) -> Result<(), MathParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(MathParseError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn sequence(&mut self, stop: &Stop) -> Result<Vec<MathNode>, MathParseError> {
        self.enter()?;
        let mut nodes = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return match stop {
                    Stop::Eof => {
                        self.leave();
                        Ok(nodes)
                    }
                    Stop::Char(c) => Err(MathParseError::Unbalanced(*c)),
                    Stop::End(_) => Err(MathParseError::UnexpectedEnd),
                };
            };
            match c {
                '}' | ']' if matches!(stop, Stop::Char(s) if *s == c) => {
                    self.pos += 1;
                    break;
                }
                '}' => return Err(MathParseError::Unbalanced('}')),
                '{' => {
                    self.pos += 1;
                    let inner = self.sequence(&Stop::Char('}'))?;
                    extend_inline(&mut nodes, inner);
                }
                '^' | '_' => {
                    self.pos += 1;
                    let arg = self.argument()?;
                    let name = if c == '^' { "sup" } else { "sub" };
                    nodes.push(MathNode::element(name, vec![arg]));
                }
                '\\' => {
                    self.pos += 1;
                    let name = self.command_name()?;
                    if name == "end" {
                        let env = self.raw_group()?;
                        if matches!(stop, Stop::End(open) if *open == env) {
                            break;
                        }
                        return Err(MathParseError::UnexpectedToken(format!("\\end{{{env}}}")));
                    }
                    self.command(&name, &mut nodes)?;
                }
                _ => {
                    self.pos += 1;
                    push_text(&mut nodes, &c.to_string());
                }
            }
        }
        self.leave();
        Ok(nodes)
    }

    fn command_name(&mut self) -> Result<String, MathParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos > start {
            return Ok(self.chars[start..self.pos].iter().collect());
        }
        match self.peek() {
            Some(c) => {
                self.pos += 1;
                Ok(c.to_string())
            }
            None => Err(MathParseError::UnexpectedEnd),
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// A braced group, a single command, or a single character.
    ///
    /// Counts toward the depth budget: bare command arguments like
    /// `\sqrt\sqrt x` nest without ever opening a group.
    fn argument(&mut self) -> Result<Vec<MathNode>, MathParseError> {
        self.enter()?;
        let arg = self.bare_argument()?;
        self.leave();
        Ok(arg)
    }

    fn bare_argument(&mut self) -> Result<Vec<MathNode>, MathParseError> {
        self.skip_spaces();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.sequence(&Stop::Char('}'))
            }
            Some('\\') => {
                self.pos += 1;
                let name = self.command_name()?;
                let mut nodes = Vec::new();
                self.command(&name, &mut nodes)?;
                Ok(nodes)
            }
            Some(c) => {
                self.pos += 1;
                Ok(vec![MathNode::Text(c.to_string())])
            }
            None => Err(MathParseError::UnexpectedEnd),
        }
    }

    /// `{name}` read verbatim, for environment names.
    fn raw_group(&mut self) -> Result<String, MathParseError> {
        self.skip_spaces();
        if self.peek() != Some('{') {
            return Err(MathParseError::UnexpectedEnd);
        }
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '}' {
                let name = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(name);
            }
            self.pos += 1;
        }
        Err(MathParseError::Unbalanced('}'))
    }

    fn command(&mut self, name: &str, nodes: &mut Vec<MathNode>) -> Result<(), MathParseError> {
        match name {
            "frac" | "dfrac" | "tfrac" => {
                let numerator = self.argument()?;
                let denominator = self.argument()?;
                nodes.push(MathNode::element("frac", vec![numerator, denominator]));
            }
            "sqrt" => {
                self.skip_spaces();
                if self.peek() == Some('[') {
                    self.pos += 1;
                    let index = self.sequence(&Stop::Char(']'))?;
                    let radicand = self.argument()?;
                    nodes.push(MathNode::element("root", vec![index, radicand]));
                } else {
                    let radicand = self.argument()?;
                    nodes.push(MathNode::element("sqrt", vec![radicand]));
                }
            }
            "text" | "textrm" | "textit" | "mathrm" | "mathit" | "mathbf" | "mbox"
            | "operatorname" => {
                let inner = self.argument()?;
                extend_inline(nodes, inner);
            }
            "begin" => {
                let env = self.raw_group()?;
                let children = self.sequence(&Stop::End(env.clone()))?;
                nodes.push(MathNode::Element {
                    name: env,
                    args: Vec::new(),
                    children,
                });
            }
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "displaystyle" => {}
            _ => match symbol_text(name) {
                Some(text) => push_text(nodes, text),
                None => nodes.push(MathNode::element(name, Vec::new())),
            },
        }
        Ok(())
    }
}

/// Plain-text rendering of symbol and operator commands.
fn symbol_text(name: &str) -> Option<&'static str> {
    const FUNCTIONS: &[&str] = &[
        "sin", "cos", "tan", "sec", "csc", "cot", "arcsin", "arccos", "arctan", "sinh", "cosh",
        "tanh", "ln", "log", "exp",
    ];
    const GREEK: &[&str] = &[
        "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
        "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "rho", "sigma", "tau",
        "upsilon", "phi", "varphi", "chi", "psi", "omega", "pi",
    ];
    let text = match name {
        "cdot" | "times" | "ast" => "*",
        "div" => "/",
        "%" => "\\%",
        "," | ";" | ":" | "!" | " " | "quad" | "qquad" => " ",
        "{" | "lbrace" => "(",
        "}" | "rbrace" => ")",
        "\\" => ";",
        _ => {
            return FUNCTIONS
                .iter()
                .chain(GREEK)
                .copied()
                .find(|known| *known == name);
        }
    };
    Some(text)
}

fn push_text(nodes: &mut Vec<MathNode>, text: &str) {
    if let Some(MathNode::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(MathNode::Text(text.to_string()));
    }
}

fn extend_inline(nodes: &mut Vec<MathNode>, inner: Vec<MathNode>) {
    for node in inner {
        match node {
            MathNode::Text(t) => push_text(nodes, &t),
            element => nodes.push(element),
        }
    }
}

/// Render nodes as algebraic text, if every node has an algebraic reading.
pub fn linearize(nodes: &[&MathNode]) -> Option<String> {
    let mut out = String::new();
    for node in nodes {
        match node {
            MathNode::Text(t) => out.push_str(t),
            MathNode::Element { name, args, children } if children.is_empty() => {
                let arg = |i: usize| -> Option<String> {
                    let refs: Vec<&MathNode> = args.get(i)?.iter().collect();
                    linearize(&refs)
                };
                match (name.as_str(), args.len()) {
                    ("frac", 2) => out.push_str(&format!("(({})/({}))", arg(0)?, arg(1)?)),
                    ("sqrt", 1) => out.push_str(&format!("sqrt({})", arg(0)?)),
                    ("root", 2) => out.push_str(&format!("(({})^(1/({})))", arg(1)?, arg(0)?)),
                    ("sup", 1) => out.push_str(&format!("^({})", arg(0)?)),
                    _ => return None,
                }
            }
            MathNode::Element { .. } => return None,
        }
    }
    Some(out)
}
