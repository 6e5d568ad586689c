use std::sync::Arc;

use crate::core::{DynSqlError, MessageBuilder, Result};
use crate::evaluator::{ExprNode, parse_expression};
use crate::template::node::{ForNode, IfNode, Node, VariableNode};
use crate::template::tokenizer::{TokenKind, Tokenizer};

/// Recursive-descent parser from a two-way SQL string to its node tree.
/// Linear single pass: block comments open frames, END closes them, and
/// everything between becomes children of the innermost open frame.
pub struct TemplateParser<'a> {
    tokenizer: Tokenizer<'a>,
    specified_sql: Arc<str>,
    block_null_parameter: bool,
    frames: Vec<Frame>,
}

enum Frame {
    Root {
        children: Vec<Node>,
    },
    If {
        condition_text: String,
        condition: ExprNode,
        children: Vec<Node>,
        else_children: Option<Vec<Node>>,
        line_else: bool,
    },
    Begin {
        children: Vec<Node>,
    },
    For {
        expression: String,
        children: Vec<Node>,
    },
    LoopFirst {
        children: Vec<Node>,
    },
    LoopLast {
        children: Vec<Node>,
    },
}

impl Frame {
    fn push(&mut self, node: Node) {
        match self {
            Frame::Root { children }
            | Frame::Begin { children }
            | Frame::For { children, .. }
            | Frame::LoopFirst { children }
            | Frame::LoopLast { children } => children.push(node),
            Frame::If {
                children,
                else_children,
                ..
            } => match else_children {
                Some(else_branch) => else_branch.push(node),
                None => children.push(node),
            },
        }
    }

    /// The AND/OR prefix split applies only to the first literal of an
    /// IF/ELSE branch.
    fn wants_prefix_split(&self) -> bool {
        match self {
            Frame::If {
                children,
                else_children,
                ..
            } => match else_children {
                Some(else_branch) => else_branch.is_empty(),
                None => children.is_empty(),
            },
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Frame::Root { .. } => "template root".to_string(),
            Frame::If { condition_text, .. } => format!("IF {}", condition_text),
            Frame::Begin { .. } => "BEGIN".to_string(),
            Frame::For { expression, .. } => format!("FOR {}", expression),
            Frame::LoopFirst { .. } => "FIRST".to_string(),
            Frame::LoopLast { .. } => "LAST".to_string(),
        }
    }
}

impl<'a> TemplateParser<'a> {
    pub fn new(sql: &'a str, block_null_parameter: bool) -> Self {
        Self {
            tokenizer: Tokenizer::new(sql),
            specified_sql: Arc::from(sql),
            block_null_parameter,
            frames: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Node> {
        self.frames.push(Frame::Root {
            children: Vec::new(),
        });
        loop {
            match self.tokenizer.next()? {
                TokenKind::Eof => break,
                TokenKind::Sql => self.parse_sql()?,
                TokenKind::Comment => self.parse_comment()?,
                TokenKind::Else => self.enter_else(true),
                TokenKind::BindVariable => {
                    // A bare `?` binds the positional argument named by the
                    // tokenizer ($1, $2, ...). The leading `$` is part of
                    // the positional name here, not the embedded sigil.
                    let expression = self.tokenizer.token().to_string();
                    let node = Node::BindVariable(VariableNode::new(
                        &expression,
                        None,
                        self.block_null_parameter,
                        self.specified_sql.clone(),
                    ));
                    self.push_child(node)?;
                }
            }
        }
        if self.frames.len() > 1 {
            return Err(self.end_not_found());
        }
        match self.frames.pop() {
            Some(Frame::Root { children }) => Ok(Node::Root { children }),
            _ => Err(DynSqlError::TemplateSyntax(
                "Internal parser error: frame stack corrupted".to_string(),
            )),
        }
    }

    fn parse_sql(&mut self) -> Result<()> {
        let mut sql = self.tokenizer.token().to_string();
        if sql.is_empty() {
            return Ok(());
        }
        if self.in_line_else() {
            // The else content lives inside line comments; strip the
            // leading dashes so it becomes executable SQL.
            sql = sql.replace("--", "");
        }
        if self.top()?.wants_prefix_split() {
            let mut sub = Tokenizer::new(&sql);
            sub.skip_whitespace();
            let word = sub.skip_token().to_string();
            sub.skip_whitespace();
            if word.eq_ignore_ascii_case("AND") || word.eq_ignore_ascii_case("OR") {
                let prefix = sub.before().to_string();
                let rest = sub.after().to_string();
                return self.push_child(Node::Prefix { prefix, sql: rest });
            }
        }
        self.push_child(Node::Sql { sql })
    }

    fn parse_comment(&mut self) -> Result<()> {
        let comment = self.tokenizer.token().to_string();
        if is_target_comment(&comment) {
            if let Some(condition) = comment.strip_prefix("IF") {
                return self.enter_if(condition.trim());
            }
            if comment == "BEGIN" {
                self.frames.push(Frame::Begin {
                    children: Vec::new(),
                });
                return Ok(());
            }
            if comment == "END" {
                return self.close_frame();
            }
            if comment == "ELSE" {
                self.enter_else(false);
                return Ok(());
            }
            if let Some(expression) = comment.strip_prefix("FOR ") {
                self.frames.push(Frame::For {
                    expression: expression.trim().to_string(),
                    children: Vec::new(),
                });
                return Ok(());
            }
            if comment == "FIRST" {
                self.require_loop_scope("FIRST")?;
                self.frames.push(Frame::LoopFirst {
                    children: Vec::new(),
                });
                return Ok(());
            }
            if comment == "LAST" {
                self.require_loop_scope("LAST")?;
                self.frames.push(Frame::LoopLast {
                    children: Vec::new(),
                });
                return Ok(());
            }
            if let Some(rest) = comment.strip_prefix("NEXT ") {
                self.require_loop_scope("NEXT")?;
                let separator = parse_next_separator(rest).ok_or_else(|| {
                    DynSqlError::TemplateSyntax(format!(
                        "NEXT comment needs a quoted separator, e.g. /*NEXT 'or '*/: found '/*{}*/'",
                        comment
                    ))
                })?;
                return self.push_child(Node::LoopNext { separator });
            }
            // Anything else identifier-shaped is a variable comment whose
            // test value follows in the SQL stream.
            let test_value = self.tokenizer.skip_token().to_string();
            let test_value = (!test_value.is_empty()).then_some(test_value);
            return self.push_variable(&comment, test_value);
        }
        if !comment.is_empty() {
            // Ordinary SQL comment: keep it verbatim.
            let before = self.tokenizer.before();
            if let Some(start) = before.rfind("/*") {
                let text = before[start..].to_string();
                return self.push_child(Node::Sql { sql: text });
            }
        }
        Ok(())
    }

    fn enter_if(&mut self, condition_text: &str) -> Result<()> {
        if condition_text.is_empty() {
            let mut br = MessageBuilder::new();
            br.add_notice("The IF comment has no condition.");
            br.add_item("Specified SQL");
            br.add_element(self.specified_sql.to_string());
            return Err(DynSqlError::TemplateSyntax(br.build()));
        }
        let condition = parse_expression(condition_text)?;
        self.frames.push(Frame::If {
            condition_text: condition_text.to_string(),
            condition,
            children: Vec::new(),
            else_children: None,
            line_else: false,
        });
        Ok(())
    }

    /// Switches the innermost IF into its else branch. ELSE outside an IF
    /// (or a second ELSE) is ignored, matching the tolerant original.
    fn enter_else(&mut self, line_form: bool) {
        if let Some(Frame::If {
            else_children,
            line_else,
            ..
        }) = self.frames.last_mut()
        {
            if else_children.is_none() {
                *else_children = Some(Vec::new());
                *line_else = line_form;
                if line_form {
                    self.tokenizer.skip_whitespace();
                }
            }
        }
    }

    fn close_frame(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            // Stray END at the root is ignored, as in the original parser.
            return Ok(());
        }
        let node = match self.frames.pop() {
            Some(Frame::If {
                condition_text,
                condition,
                children,
                else_children,
                ..
            }) => Node::If(IfNode {
                condition_text,
                condition,
                children,
                else_children,
                specified_sql: self.specified_sql.clone(),
            }),
            Some(Frame::Begin { children }) => Node::Begin { children },
            Some(Frame::For {
                expression,
                children,
            }) => Node::For(ForNode {
                names: expression.split('.').map(str::to_string).collect(),
                expression,
                children,
                specified_sql: self.specified_sql.clone(),
            }),
            Some(Frame::LoopFirst { children }) => Node::LoopFirst { children },
            Some(Frame::LoopLast { children }) => Node::LoopLast { children },
            Some(frame @ Frame::Root { .. }) => {
                self.frames.push(frame);
                return Ok(());
            }
            None => return Ok(()),
        };
        self.push_child(node)
    }

    fn push_variable(&mut self, expression: &str, test_value: Option<String>) -> Result<()> {
        let node = match expression.strip_prefix('$') {
            Some(embedded) => Node::EmbeddedValue(VariableNode::new(
                embedded,
                test_value,
                self.block_null_parameter,
                self.specified_sql.clone(),
            )),
            None => Node::BindVariable(VariableNode::new(
                expression,
                test_value,
                self.block_null_parameter,
                self.specified_sql.clone(),
            )),
        };
        self.push_child(node)
    }

    fn push_child(&mut self, node: Node) -> Result<()> {
        self.top()?.push(node);
        Ok(())
    }

    fn top(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or_else(|| {
            DynSqlError::TemplateSyntax("Internal parser error: empty frame stack".to_string())
        })
    }

    fn in_line_else(&self) -> bool {
        self.frames.iter().any(|frame| {
            matches!(
                frame,
                Frame::If {
                    else_children: Some(_),
                    line_else: true,
                    ..
                }
            )
        })
    }

    fn require_loop_scope(&self, marker: &str) -> Result<()> {
        if self
            .frames
            .iter()
            .any(|frame| matches!(frame, Frame::For { .. }))
        {
            return Ok(());
        }
        Err(DynSqlError::TemplateSyntax(format!(
            "{} comment is only allowed inside a FOR comment: sql={}",
            marker, self.specified_sql
        )))
    }

    fn end_not_found(&self) -> DynSqlError {
        let open = self
            .frames
            .last()
            .map(Frame::describe)
            .unwrap_or_else(|| "block comment".to_string());
        let mut br = MessageBuilder::new();
        br.add_notice("The END comment was not found.");
        br.add_item("Open Comment");
        br.add_element(open);
        br.add_item("Specified SQL");
        br.add_element(self.specified_sql.to_string());
        DynSqlError::TemplateSyntax(br.build())
    }
}

/// Target comments start like an identifier (`pmb.x`, `IF`, `BEGIN`), an
/// embedded-value sigil `$`, or the loop variable sigil `#`. Anything else
/// is an ordinary SQL comment.
fn is_target_comment(comment: &str) -> bool {
    comment
        .chars()
        .next()
        .map(|first| first.is_alphabetic() || first == '_' || first == '$' || first == '#')
        .unwrap_or(false)
}

/// Extracts the quoted separator of `/*NEXT 'or '*/`.
fn parse_next_separator(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let inner = rest.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Result<Node> {
        TemplateParser::new(sql, false).parse()
    }

    fn root_children(node: Node) -> Vec<Node> {
        match node {
            Node::Root { children } => children,
            other => panic!("expected root, got {:?}", other),
        }
    }

    #[test]
    fn literal_only_template() {
        let children = root_children(parse("select * from MEMBER").unwrap());
        assert_eq!(children.len(), 1);
        assert!(matches!(&children[0], Node::Sql { sql } if sql == "select * from MEMBER"));
    }

    #[test]
    fn bind_comment_captures_expression_and_test_value() {
        let children = root_children(parse("id = /*pmb.id*/3").unwrap());
        assert_eq!(children.len(), 2);
        let Node::BindVariable(variable) = &children[1] else {
            panic!("expected bind variable");
        };
        assert_eq!(variable.expression, "pmb.id");
        assert_eq!(variable.test_value.as_deref(), Some("3"));
    }

    #[test]
    fn embedded_comment_strips_the_sigil() {
        let children = root_children(parse("order by /*$pmb.column*/name").unwrap());
        let Node::EmbeddedValue(variable) = &children[1] else {
            panic!("expected embedded value");
        };
        assert_eq!(variable.expression, "pmb.column");
    }

    #[test]
    fn if_block_nests_and_keeps_else() {
        let children =
            root_children(parse("/*IF pmb.flag*/A/*ELSE*/B/*END*/").unwrap());
        assert_eq!(children.len(), 1);
        let Node::If(if_node) = &children[0] else {
            panic!("expected IF node");
        };
        assert_eq!(if_node.condition_text, "pmb.flag");
        assert_eq!(if_node.children.len(), 1);
        let else_children = if_node.else_children.as_ref().unwrap();
        assert_eq!(else_children.len(), 1);
    }

    #[test]
    fn first_literal_of_if_branch_splits_connector() {
        let children =
            root_children(parse("/*IF pmb.id != null*/AND id = /*pmb.id*/3/*END*/").unwrap());
        let Node::If(if_node) = &children[0] else {
            panic!("expected IF node");
        };
        let Node::Prefix { prefix, sql } = &if_node.children[0] else {
            panic!("expected prefix node, got {:?}", if_node.children[0]);
        };
        assert_eq!(prefix, "AND ");
        assert_eq!(sql, "id = ");
    }

    #[test]
    fn plain_comment_survives() {
        let children = root_children(parse("select /* hint */ * from t").unwrap());
        let rendered: Vec<&str> = children
            .iter()
            .map(|node| match node {
                Node::Sql { sql } => sql.as_str(),
                other => panic!("unexpected node {:?}", other),
            })
            .collect();
        assert_eq!(rendered, vec!["select ", "/* hint */", " * from t"]);
    }

    #[test]
    fn missing_end_is_reported_with_open_comment() {
        let err = parse("/*BEGIN*/where /*IF pmb.id != null*/id = 1/*END*/").unwrap_err();
        let DynSqlError::TemplateSyntax(msg) = err else {
            panic!("expected template syntax error");
        };
        assert!(msg.contains("END comment was not found"));
        assert!(msg.contains("BEGIN"));
    }

    #[test]
    fn empty_if_condition_is_rejected() {
        assert!(matches!(
            parse("/*IF */A/*END*/"),
            Err(DynSqlError::TemplateSyntax(_))
        ));
    }

    #[test]
    fn loop_markers_require_a_for_scope() {
        assert!(matches!(
            parse("/*FIRST*/x/*END*/"),
            Err(DynSqlError::TemplateSyntax(_))
        ));
        assert!(matches!(
            parse("/*NEXT 'or '*/"),
            Err(DynSqlError::TemplateSyntax(_))
        ));
    }

    #[test]
    fn for_block_with_loop_markers_parses() {
        let sql = "/*FOR pmb.nameList*//*FIRST*/( /*END*//*NEXT 'or '*/name = \
                   /*#current*/'a'/*LAST*/ )/*END*//*END*/";
        let children = root_children(parse(sql).unwrap());
        assert_eq!(children.len(), 1);
        let Node::For(for_node) = &children[0] else {
            panic!("expected FOR node");
        };
        assert_eq!(for_node.expression, "pmb.nameList");
        assert!(for_node
            .children
            .iter()
            .any(|n| matches!(n, Node::LoopNext { separator } if separator == "or ")));
    }

    #[test]
    fn stray_end_is_ignored() {
        let children = root_children(parse("A/*END*/B").unwrap());
        assert_eq!(children.len(), 2);
    }
}
