use crate::core::{DynSqlError, Result, Value};
use crate::evaluator::ast::{CompOp, ExprNode, LogicOp};

/// Parses one IF-condition into its expression tree.
///
/// Precedence, loosest to tightest: `||`, `&&`, comparisons, unary `!`.
/// Parentheses group. Comparisons do not chain; write explicit parentheses
/// instead.
pub fn parse_expression(source: &str) -> Result<ExprNode> {
    let tokens = lex(source)?;
    let mut parser = ExprParser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    Dot,
    LParen,
    RParen,
}

fn lex(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '=' if next == Some('=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '.' => {
                tokens.push(Token::Dot);
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
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    if chars[j] == quote {
                        if quote == '\'' && chars.get(j + 1) == Some(&'\'') {
                            text.push('\'');
                            j += 2;
                            continue;
                        }
                        closed = true;
                        j += 1;
                        break;
                    }
                    text.push(chars[j]);
                    j += 1;
                }
                if !closed {
                    return Err(DynSqlError::ExpressionEvaluation(format!(
                        "Unterminated string literal in expression '{}'",
                        source
                    )));
                }
                tokens.push(Token::Str(text));
                i = j;
            }
            '-' if next.map(|n| n.is_ascii_digit()).unwrap_or(false) => {
                let (number, end) = lex_number(&chars, i + 1);
                tokens.push(Token::Number(format!("-{}", number)));
                i = end;
            }
            d if d.is_ascii_digit() => {
                let (number, end) = lex_number(&chars, i);
                tokens.push(Token::Number(number));
                i = end;
            }
            a if a.is_alphabetic() || a == '_' || a == '$' || a == '#' => {
                let mut ident = String::new();
                ident.push(a);
                let mut j = i + 1;
                while j < chars.len() {
                    let ch = chars[j];
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                        ident.push(ch);
                        j += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
                i = j;
            }
            other => {
                return Err(DynSqlError::ExpressionEvaluation(format!(
                    "Unexpected character '{}' in expression '{}'",
                    other, source
                )));
            }
        }
    }
    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> (String, usize) {
    let mut number = String::new();
    let mut seen_dot = false;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            number.push(c);
            i += 1;
        } else if c == '.'
            && !seen_dot
            && chars.get(i + 1).map(|n| n.is_ascii_digit()).unwrap_or(false)
        {
            seen_dot = true;
            number.push(c);
            i += 1;
        } else {
            break;
        }
    }
    (number, i)
}

struct ExprParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, detail: &str) -> DynSqlError {
        DynSqlError::ExpressionEvaluation(format!(
            "{} in expression '{}'",
            detail, self.source
        ))
    }

    fn parse_or(&mut self) -> Result<ExprNode> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.bump();
            let right = self.parse_and()?;
            left = ExprNode::Logical {
                left: Box::new(left),
                op: LogicOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExprNode> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.bump();
            let right = self.parse_comparison()?;
            left = ExprNode::Logical {
                left: Box::new(left),
                op: LogicOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<ExprNode> {
        let left = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CompOp::Eq,
            Some(Token::NotEq) => CompOp::NotEq,
            Some(Token::Lt) => CompOp::Lt,
            Some(Token::LtEq) => CompOp::LtEq,
            Some(Token::Gt) => CompOp::Gt,
            Some(Token::GtEq) => CompOp::GtEq,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.parse_unary()?;
        Ok(ExprNode::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_unary(&mut self) -> Result<ExprNode> {
        if self.peek() == Some(&Token::Bang) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(ExprNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::Str(text)) => Ok(ExprNode::Literal(Value::Text(text))),
            Some(Token::Number(number)) => {
                if number.contains('.') {
                    let value: f64 = number
                        .parse()
                        .map_err(|_| self.error("malformed number literal"))?;
                    Ok(ExprNode::Literal(Value::Double(value)))
                } else {
                    let value: i64 = number
                        .parse()
                        .map_err(|_| self.error("malformed number literal"))?;
                    match i32::try_from(value) {
                        Ok(small) => Ok(ExprNode::Literal(Value::Integer(small))),
                        Err(_) => Ok(ExprNode::Literal(Value::Long(value))),
                    }
                }
            }
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(ExprNode::Literal(Value::Boolean(true))),
                "false" => Ok(ExprNode::Literal(Value::Boolean(false))),
                "null" => Ok(ExprNode::Literal(Value::Null)),
                _ => self.parse_path(ident),
            },
            _ => Err(self.error("expected a value or variable")),
        }
    }

    /// `ident ('.' ident)*` with an optional trailing `()` turning the
    /// final segment into a zero-argument method call.
    fn parse_path(&mut self, head: String) -> Result<ExprNode> {
        let mut names = vec![head];
        while self.peek() == Some(&Token::Dot) {
            self.bump();
            let segment = match self.bump() {
                Some(Token::Ident(name)) => name,
                _ => return Err(self.error("expected a property name after '.'")),
            };
            if self.peek() == Some(&Token::LParen) {
                self.bump();
                match self.bump() {
                    Some(Token::RParen) => {}
                    _ => return Err(self.error("method calls take no arguments; expected ')'")),
                }
                let expression = names.join(".");
                return Ok(ExprNode::MethodCall {
                    expression,
                    names,
                    method: segment,
                });
            }
            names.push(segment);
        }
        if self.peek() == Some(&Token::LParen) {
            return Err(self.error("a method call needs a target variable"));
        }
        let expression = names.join(".");
        Ok(ExprNode::Path { expression, names })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comparison_with_path_and_literal() {
        let expr = parse_expression("pmb.memberId != null").unwrap();
        let ExprNode::Comparison { left, op, right } = expr else {
            panic!("expected comparison");
        };
        assert_eq!(op, CompOp::NotEq);
        assert_eq!(
            *left,
            ExprNode::Path {
                expression: "pmb.memberId".to_string(),
                names: vec!["pmb".to_string(), "memberId".to_string()],
            }
        );
        assert_eq!(*right, ExprNode::Literal(Value::Null));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_expression("a || b && c").unwrap();
        let ExprNode::Logical { op, right, .. } = expr else {
            panic!("expected logical");
        };
        assert_eq!(op, LogicOp::Or);
        assert!(matches!(
            *right,
            ExprNode::Logical {
                op: LogicOp::And,
                ..
            }
        ));
    }

    #[test]
    fn not_binds_tighter_than_comparison() {
        let expr = parse_expression("!a == b").unwrap();
        let ExprNode::Comparison { left, .. } = expr else {
            panic!("expected comparison");
        };
        assert!(matches!(*left, ExprNode::Not(_)));
    }

    #[test]
    fn method_call_is_terminal() {
        let expr = parse_expression("pmb.memberList.isEmpty()").unwrap();
        assert_eq!(
            expr,
            ExprNode::MethodCall {
                expression: "pmb.memberList".to_string(),
                names: vec!["pmb".to_string(), "memberList".to_string()],
                method: "isEmpty".to_string(),
            }
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse_expression("'abc'").unwrap(),
            ExprNode::Literal(Value::Text("abc".to_string()))
        );
        assert_eq!(
            parse_expression("-4").unwrap(),
            ExprNode::Literal(Value::Integer(-4))
        );
        assert_eq!(
            parse_expression("1.5").unwrap(),
            ExprNode::Literal(Value::Double(1.5))
        );
        assert_eq!(
            parse_expression("true").unwrap(),
            ExprNode::Literal(Value::Boolean(true))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_expression("pmb.").is_err());
        assert!(parse_expression("a &&").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("a ^ b").is_err());
        assert!(parse_expression("'open").is_err());
    }
}
