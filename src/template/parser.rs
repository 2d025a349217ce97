//! ERB-style template parser.
//!
//! Parses templates with syntax like:
//! - `<%= expr %>` - HTML-escaped output
//! - `<%- expr %>` - Raw/unescaped output
//! - `<% code %>` - Control flow (if, for, else, end)
//! - `<%= yield %>` - Layout content insertion point

use crate::error::TemplateError;

/// Pre-compiled expression for fast evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String literal: "hello"
    StringLit(String),
    /// Integer literal: 42
    IntLit(i64),
    /// Float literal: 3.14
    FloatLit(f64),
    /// Boolean literal: true/false
    BoolLit(bool),
    /// Null literal
    Null,
    /// Simple variable lookup: name
    Var(String),
    /// Field access: expr.field
    Field(Box<Expr>, String),
    /// Comparison: expr op expr
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    /// Logical NOT: !expr
    Not(Box<Expr>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq, // ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

/// A node in the template AST. Line numbers point into the template source
/// for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Raw HTML/text content
    Literal(String),
    /// Output expression: `<%= expr %>` (escaped) or `<%- expr %>` (raw)
    Output {
        expr: Expr,
        escaped: bool,
        line: usize,
    },
    /// If conditional block
    If {
        condition: Expr,
        body: Vec<TemplateNode>,
        else_body: Option<Vec<TemplateNode>>,
        line: usize,
    },
    /// For loop block, optionally with an index variable
    For {
        var: String,
        index_var: Option<String>,
        iterable: Expr,
        body: Vec<TemplateNode>,
        line: usize,
    },
    /// Layout content insertion point
    Yield,
}

/// Token types during lexing
#[derive(Debug)]
enum Token {
    Literal(String),
    Output {
        content: String,
        escaped: bool,
        line: usize,
    },
    Code {
        content: String,
        line: usize,
    },
}

/// Parse an ERB-style template into an AST.
pub fn parse_template(source: &str) -> Result<Vec<TemplateNode>, TemplateError> {
    let tokens = tokenize(source)?;
    parse_tokens(tokens)
}

/// Tokenize the template source into literals and tags, tracking lines.
fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut literal = String::new();
    let mut line = 1usize;

    while let Some(c) = chars.next() {
        if c == '<' && chars.peek() == Some(&'%') {
            chars.next(); // consume '%'

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }

            let tag_line = line;
            let escaped = chars.peek() == Some(&'=');
            let raw = chars.peek() == Some(&'-');
            if escaped || raw {
                chars.next();
            }

            // Read until closing %>
            let mut content = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '%' && chars.peek() == Some(&'>') {
                    chars.next();
                    closed = true;
                    break;
                }
                if c == '\n' {
                    line += 1;
                }
                content.push(c);
            }
            if !closed {
                return Err(TemplateError::parse("Unterminated tag", tag_line));
            }

            if escaped || raw {
                tokens.push(Token::Output {
                    content,
                    escaped,
                    line: tag_line,
                });
            } else {
                tokens.push(Token::Code {
                    content,
                    line: tag_line,
                });
            }
        } else {
            if c == '\n' {
                line += 1;
            }
            literal.push(c);
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok(tokens)
}

/// An open block while parsing.
enum Block {
    If {
        condition: Expr,
        body: Vec<TemplateNode>,
        else_body: Option<Vec<TemplateNode>>,
        in_else: bool,
        line: usize,
    },
    For {
        var: String,
        index_var: Option<String>,
        iterable: Expr,
        body: Vec<TemplateNode>,
        line: usize,
    },
}

/// Append a node to the innermost open block, or the root.
fn push_node(root: &mut Vec<TemplateNode>, stack: &mut Vec<Block>, node: TemplateNode) {
    match stack.last_mut() {
        Some(Block::If {
            body,
            else_body,
            in_else,
            ..
        }) => {
            if *in_else {
                else_body.get_or_insert_with(Vec::new).push(node);
            } else {
                body.push(node);
            }
        }
        Some(Block::For { body, .. }) => body.push(node),
        None => root.push(node),
    }
}

fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<TemplateNode>, TemplateError> {
    let mut root = Vec::new();
    let mut stack: Vec<Block> = Vec::new();

    for token in tokens {
        match token {
            Token::Literal(s) => push_node(&mut root, &mut stack, TemplateNode::Literal(s)),

            Token::Output {
                content,
                escaped,
                line,
            } => {
                let trimmed = content.trim();
                if trimmed == "yield" {
                    push_node(&mut root, &mut stack, TemplateNode::Yield);
                } else {
                    let expr = parse_expr(trimmed, line)?;
                    push_node(
                        &mut root,
                        &mut stack,
                        TemplateNode::Output {
                            expr,
                            escaped,
                            line,
                        },
                    );
                }
            }

            Token::Code { content, line } => {
                let trimmed = content.trim();
                if trimmed == "end" {
                    let Some(block) = stack.pop() else {
                        return Err(TemplateError::parse("'end' with no open block", line));
                    };
                    let node = match block {
                        Block::If {
                            condition,
                            body,
                            else_body,
                            line,
                            ..
                        } => TemplateNode::If {
                            condition,
                            body,
                            else_body,
                            line,
                        },
                        Block::For {
                            var,
                            index_var,
                            iterable,
                            body,
                            line,
                        } => TemplateNode::For {
                            var,
                            index_var,
                            iterable,
                            body,
                            line,
                        },
                    };
                    push_node(&mut root, &mut stack, node);
                } else if trimmed == "else" {
                    match stack.last_mut() {
                        Some(Block::If {
                            in_else, else_body, ..
                        }) if !*in_else => {
                            *in_else = true;
                            *else_body = Some(Vec::new());
                        }
                        _ => return Err(TemplateError::parse("'else' outside of if block", line)),
                    }
                } else if let Some(rest) = trimmed.strip_prefix("if ") {
                    let condition = parse_expr(rest.trim(), line)?;
                    stack.push(Block::If {
                        condition,
                        body: Vec::new(),
                        else_body: None,
                        in_else: false,
                        line,
                    });
                } else if let Some(rest) = trimmed.strip_prefix("for ") {
                    let (var, index_var, iterable) = parse_for_header(rest, line)?;
                    stack.push(Block::For {
                        var,
                        index_var,
                        iterable,
                        body: Vec::new(),
                        line,
                    });
                } else {
                    return Err(TemplateError::parse(
                        format!("Unsupported code block '{trimmed}'"),
                        line,
                    ));
                }
            }
        }
    }

    if let Some(block) = stack.last() {
        let (what, line) = match block {
            Block::If { line, .. } => ("if", *line),
            Block::For { line, .. } => ("for", *line),
        };
        return Err(TemplateError::parse(format!("Unclosed '{what}' block"), line));
    }

    Ok(root)
}

/// Parse `x in xs` or `x, i in xs` from a for tag.
fn parse_for_header(
    rest: &str,
    line: usize,
) -> Result<(String, Option<String>, Expr), TemplateError> {
    let Some((vars, iterable)) = rest.split_once(" in ") else {
        return Err(TemplateError::parse("Expected 'for <var> in <expr>'", line));
    };
    let vars = vars.trim();
    let (var, index_var) = match vars.split_once(',') {
        Some((v, i)) => (v.trim().to_string(), Some(i.trim().to_string())),
        None => (vars.to_string(), None),
    };
    if var.is_empty() {
        return Err(TemplateError::parse("Missing loop variable", line));
    }
    let iterable = parse_expr(iterable.trim(), line)?;
    Ok((var, index_var, iterable))
}

/// Parse a single expression from a tag body.
pub fn parse_expr(source: &str, line: usize) -> Result<Expr, TemplateError> {
    let mut parser = ExprParser {
        chars: source.chars().collect(),
        pos: 0,
        line,
    };
    parser.parse()
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn err(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::parse(message, self.line)
    }

    fn parse(&mut self) -> Result<Expr, TemplateError> {
        let expr = self.comparison()?;
        self.skip_ws();
        if let Some(c) = self.peek() {
            return Err(self.err(format!("Unexpected '{c}' after expression")));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, TemplateError> {
        let left = self.unary()?;
        self.skip_ws();

        let op = match (self.peek(), self.peek_ahead(1)) {
            (Some('='), Some('=')) => Some((CompareOp::Eq, 2)),
            (Some('!'), Some('=')) => Some((CompareOp::Ne, 2)),
            (Some('<'), Some('=')) => Some((CompareOp::Le, 2)),
            (Some('>'), Some('=')) => Some((CompareOp::Ge, 2)),
            (Some('<'), _) => Some((CompareOp::Lt, 1)),
            (Some('>'), _) => Some((CompareOp::Gt, 1)),
            _ => None,
        };

        if let Some((op, width)) = op {
            self.pos += width;
            let right = self.unary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, TemplateError> {
        self.skip_ws();
        if self.peek() == Some('!') && self.peek_ahead(1) != Some('=') {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.primary()?;
        while self.peek() == Some('.') {
            self.pos += 1;
            let field = self.ident()?;
            expr = Expr::Field(Box::new(expr), field);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        self.skip_ws();
        match self.peek() {
            Some('"') | Some('\'') => self.string_lit(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number_lit(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let ident = self.ident()?;
                Ok(match ident.as_str() {
                    "true" => Expr::BoolLit(true),
                    "false" => Expr::BoolLit(false),
                    "null" => Expr::Null,
                    _ => Expr::Var(ident),
                })
            }
            Some(c) => Err(self.err(format!("Unexpected character '{c}' in expression"))),
            None => Err(self.err("Unexpected end of expression")),
        }
    }

    fn ident(&mut self) -> Result<String, TemplateError> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if s.is_empty() {
            return Err(self.err("Expected identifier"));
        }
        Ok(s)
    }

    fn string_lit(&mut self) -> Result<Expr, TemplateError> {
        let Some(quote) = self.bump() else {
            return Err(self.err("Unexpected end of expression"));
        };
        let mut s = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                return Ok(Expr::StringLit(s));
            }
            if c == '\\' {
                match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(other) => s.push(other),
                    None => break,
                }
            } else {
                s.push(c);
            }
        }
        Err(self.err("Unterminated string literal"))
    }

    fn number_lit(&mut self) -> Result<Expr, TemplateError> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push('-');
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.pos += 1;
            } else if c == '.' && !is_float && self.peek_ahead(1).is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if is_float {
            s.parse::<f64>()
                .map(Expr::FloatLit)
                .map_err(|_| self.err(format!("Invalid number '{s}'")))
        } else {
            s.parse::<i64>()
                .map(Expr::IntLit)
                .map_err(|_| self.err(format!("Invalid number '{s}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_output() {
        let nodes = parse_template("<h1><%= title %></h1>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], TemplateNode::Literal("<h1>".to_string()));
        assert_eq!(
            nodes[1],
            TemplateNode::Output {
                expr: Expr::Var("title".to_string()),
                escaped: true,
                line: 1,
            }
        );
        assert_eq!(nodes[2], TemplateNode::Literal("</h1>".to_string()));
    }

    #[test]
    fn test_raw_output() {
        let nodes = parse_template("<%- body %>").unwrap();
        assert_eq!(
            nodes[0],
            TemplateNode::Output {
                expr: Expr::Var("body".to_string()),
                escaped: false,
                line: 1,
            }
        );
    }

    #[test]
    fn test_yield_node() {
        let nodes = parse_template("<body><%= yield %></body>").unwrap();
        assert_eq!(nodes[1], TemplateNode::Yield);
    }

    #[test]
    fn test_if_else_end() {
        let nodes = parse_template("<% if admin %>A<% else %>B<% end %>").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            TemplateNode::If {
                condition,
                body,
                else_body,
                ..
            } => {
                assert_eq!(*condition, Expr::Var("admin".to_string()));
                assert_eq!(body[0], TemplateNode::Literal("A".to_string()));
                assert_eq!(
                    else_body.as_ref().unwrap()[0],
                    TemplateNode::Literal("B".to_string())
                );
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_for_with_index() {
        let nodes = parse_template("<% for item, i in items %><%= item %><% end %>").unwrap();
        match &nodes[0] {
            TemplateNode::For {
                var,
                index_var,
                iterable,
                body,
                ..
            } => {
                assert_eq!(var, "item");
                assert_eq!(index_var.as_deref(), Some("i"));
                assert_eq!(*iterable, Expr::Var("items".to_string()));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_blocks() {
        let nodes =
            parse_template("<% for u in users %><% if u.active %><%= u.name %><% end %><% end %>")
                .unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            TemplateNode::For { body, .. } => {
                assert!(matches!(body[0], TemplateNode::If { .. }));
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn test_field_and_compare_exprs() {
        let expr = parse_expr("user.name == \"ann\"", 1).unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                Box::new(Expr::Field(
                    Box::new(Expr::Var("user".to_string())),
                    "name".to_string()
                )),
                CompareOp::Eq,
                Box::new(Expr::StringLit("ann".to_string())),
            )
        );
    }

    #[test]
    fn test_not_and_literals() {
        assert_eq!(
            parse_expr("!hidden", 1).unwrap(),
            Expr::Not(Box::new(Expr::Var("hidden".to_string())))
        );
        assert_eq!(parse_expr("42", 1).unwrap(), Expr::IntLit(42));
        assert_eq!(parse_expr("3.14", 1).unwrap(), Expr::FloatLit(3.14));
        assert_eq!(parse_expr("true", 1).unwrap(), Expr::BoolLit(true));
        assert_eq!(parse_expr("null", 1).unwrap(), Expr::Null);
        assert_eq!(parse_expr("-7", 1).unwrap(), Expr::IntLit(-7));
    }

    #[test]
    fn test_unterminated_tag() {
        let err = parse_template("a\nb<%= oops").unwrap_err();
        assert_eq!(err.to_string(), "Parse error: Unterminated tag at line 2");
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_template("<% if admin %>A").unwrap_err();
        assert!(err.to_string().contains("Unclosed 'if' block"));
    }

    #[test]
    fn test_stray_end() {
        let err = parse_template("<% end %>").unwrap_err();
        assert!(err.to_string().contains("'end' with no open block"));
    }

    #[test]
    fn test_unsupported_code_block() {
        let err = parse_template("<% while true %>").unwrap_err();
        assert!(err.to_string().contains("Unsupported code block"));
    }
}
