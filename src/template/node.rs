use std::sync::Arc;

use crate::core::{DynSqlError, MessageBuilder, Result, Value};
use crate::evaluator::{ExprNode, evaluate_bool};
use crate::template::context::CommandContext;
use crate::template::resolver::resolve_variable;

/// Parsed template tree. Built once per distinct template text, immutable,
/// and safe to evaluate concurrently: every walk mutates only its own
/// [`CommandContext`].
#[derive(Debug, Clone)]
pub enum Node {
    Root { children: Vec<Node> },

    /// Verbatim SQL run.
    Sql { sql: String },

    /// First literal of an IF/ELSE branch starting with AND/OR: the
    /// connector is emitted only when the surrounding frame already
    /// produced dynamic output, so it never dangles after elision.
    Prefix { prefix: String, sql: String },

    BindVariable(VariableNode),
    EmbeddedValue(VariableNode),
    If(IfNode),

    /// Optional clause: children evaluate into a scratch frame that is
    /// kept only when a condition inside fired.
    Begin { children: Vec<Node> },

    For(ForNode),
    LoopFirst { children: Vec<Node> },
    LoopNext { separator: String },
    LoopLast { children: Vec<Node> },
}

/// Shared shape of bind-variable and embedded-value comments.
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub expression: String,
    pub names: Vec<String>,
    pub test_value: Option<String>,
    pub block_null: bool,
    pub specified_sql: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct IfNode {
    pub condition_text: String,
    pub condition: ExprNode,
    pub children: Vec<Node>,
    pub else_children: Option<Vec<Node>>,
    pub specified_sql: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct ForNode {
    pub expression: String,
    pub names: Vec<String>,
    pub children: Vec<Node>,
    pub specified_sql: Arc<str>,
}

impl Node {
    /// Walks this node against one context, appending SQL and bind pairs
    /// in source order. Either the whole walk succeeds or the first error
    /// aborts it; no partial output contract exists on failure.
    pub fn accept(&self, ctx: &mut CommandContext) -> Result<()> {
        match self {
            Node::Root { children } => accept_children(children, ctx),
            Node::Sql { sql } => {
                ctx.add_sql(sql);
                Ok(())
            }
            Node::Prefix { prefix, sql } => {
                if ctx.is_enabled() {
                    ctx.add_sql(prefix);
                }
                ctx.add_sql(sql);
                Ok(())
            }
            Node::BindVariable(variable) => variable.accept_bind(ctx),
            Node::EmbeddedValue(variable) => variable.accept_embedded(ctx),
            Node::If(if_node) => if_node.accept(ctx),
            Node::Begin { children } => {
                ctx.push_frame();
                let walked = accept_children(children, ctx);
                let frame = ctx.pop_frame();
                walked?;
                if frame.enabled {
                    ctx.append_frame(frame);
                }
                Ok(())
            }
            Node::For(for_node) => for_node.accept(ctx),
            Node::LoopFirst { children } => {
                if ctx.loop_index() == Some(0) {
                    accept_children(children, ctx)?;
                }
                Ok(())
            }
            Node::LoopNext { separator } => {
                if ctx.loop_index().map(|i| i > 0).unwrap_or(false) {
                    ctx.add_sql(separator);
                }
                Ok(())
            }
            Node::LoopLast { children } => {
                if ctx.is_loop_last() {
                    accept_children(children, ctx)?;
                }
                Ok(())
            }
        }
    }
}

fn accept_children(children: &[Node], ctx: &mut CommandContext) -> Result<()> {
    for child in children {
        child.accept(ctx)?;
    }
    Ok(())
}

impl VariableNode {
    pub(crate) fn new(
        expression: &str,
        test_value: Option<String>,
        block_null: bool,
        specified_sql: Arc<str>,
    ) -> Self {
        Self {
            expression: expression.to_string(),
            names: expression.split('.').map(str::to_string).collect(),
            test_value,
            block_null,
            specified_sql,
        }
    }

    /// A parenthesized test value like `(1, 2)` marks the variable as
    /// standing in an IN scope, switching list values to literal
    /// expansion.
    fn is_in_scope(&self) -> bool {
        self.test_value
            .as_deref()
            .map(|t| t.starts_with('(') && t.ends_with(')'))
            .unwrap_or(false)
    }

    fn accept_bind(&self, ctx: &mut CommandContext) -> Result<()> {
        let resolved = resolve_variable(ctx, &self.expression, &self.names, &self.specified_sql)?;
        if self.block_null && resolved.value.is_null() {
            return Err(self.null_parameter_error());
        }
        if self.is_in_scope() {
            if let Value::List(items) = &resolved.value {
                return self.embed_list(ctx, items);
            }
        }
        ctx.add_bind("?", resolved.value, resolved.tag);
        Ok(())
    }

    fn accept_embedded(&self, ctx: &mut CommandContext) -> Result<()> {
        let resolved = resolve_variable(ctx, &self.expression, &self.names, &self.specified_sql)?;
        if self.block_null && resolved.value.is_null() {
            return Err(self.null_parameter_error());
        }
        if self.is_in_scope() {
            if let Value::List(items) = &resolved.value {
                return self.embed_list(ctx, items);
            }
        }
        let text = resolved.value.to_string();
        if text.contains('?') {
            let mut br = MessageBuilder::new();
            br.add_notice("The embedded value must not contain a bind placeholder '?'.");
            br.add_item("Embedded Value");
            br.add_element(text.clone());
            br.add_item("Comment Expression");
            br.add_element(self.expression.clone());
            br.add_item("Specified SQL");
            br.add_element(self.specified_sql.to_string());
            return Err(DynSqlError::IllegalEmbeddedValue(br.build()));
        }
        ctx.add_sql(&text);
        Ok(())
    }

    /// IN-list expansion: a literal, comma-joined, parenthesized list.
    /// Non-numeric elements are single-quoted, nulls are skipped, and a
    /// list with nothing usable in it is an error because `IN ()` is not
    /// valid SQL.
    fn embed_list(&self, ctx: &mut CommandContext, items: &[Value]) -> Result<()> {
        if items.is_empty() {
            return Err(self.list_error("The IN-scope list was empty."));
        }
        let quote = items
            .iter()
            .find(|item| !item.is_null())
            .map(|first| if first.is_numeric() { "" } else { "'" });
        let Some(quote) = quote else {
            return Err(self.list_error("The IN-scope list held only null elements."));
        };
        ctx.add_sql("(");
        let mut wrote_any = false;
        for item in items.iter().filter(|item| !item.is_null()) {
            if wrote_any {
                ctx.add_sql(", ");
            }
            ctx.add_sql(&format!("{}{}{}", quote, item, quote));
            wrote_any = true;
        }
        ctx.add_sql(")");
        Ok(())
    }

    fn null_parameter_error(&self) -> DynSqlError {
        let mut br = MessageBuilder::new();
        br.add_notice("The variable comment resolved to null where null is not allowed.");
        br.add_item("Advice");
        br.add_element("Confirm the parameter value, or allow null for this template.");
        br.add_item("Comment Expression");
        br.add_element(self.expression.clone());
        br.add_item("Specified SQL");
        br.add_element(self.specified_sql.to_string());
        DynSqlError::BindParameterNull(br.build())
    }

    fn list_error(&self, notice: &str) -> DynSqlError {
        let mut br = MessageBuilder::new();
        br.add_notice(notice);
        br.add_item("Comment Expression");
        br.add_element(self.expression.clone());
        br.add_item("Specified SQL");
        br.add_element(self.specified_sql.to_string());
        DynSqlError::BindListEmptyOrNullOnly(br.build())
    }
}

impl IfNode {
    fn accept(&self, ctx: &mut CommandContext) -> Result<()> {
        if evaluate_bool(&self.condition, ctx, &self.specified_sql)? {
            accept_children(&self.children, ctx)?;
            ctx.set_enabled(true);
        } else if let Some(else_children) = &self.else_children {
            accept_children(else_children, ctx)?;
            ctx.set_enabled(true);
        }
        Ok(())
    }
}

impl ForNode {
    /// Iterates a list-valued expression, exposing each element as
    /// `#current`. A null list contributes nothing; a non-empty loop marks
    /// the frame enabled like a fired IF.
    fn accept(&self, ctx: &mut CommandContext) -> Result<()> {
        let resolved = resolve_variable(ctx, &self.expression, &self.names, &self.specified_sql)?;
        let items = match resolved.value {
            Value::Null => return Ok(()),
            Value::List(items) => items,
            other => {
                let mut br = MessageBuilder::new();
                br.add_notice("The FOR comment expects a list value.");
                br.add_item("Actual Type");
                br.add_element(other.type_name().to_string());
                br.add_item("Comment Expression");
                br.add_element(self.expression.clone());
                br.add_item("Specified SQL");
                br.add_element(self.specified_sql.to_string());
                return Err(DynSqlError::ExpressionEvaluation(br.build()));
            }
        };
        if items.is_empty() {
            return Ok(());
        }
        let size = items.len();
        for (index, item) in items.into_iter().enumerate() {
            ctx.push_loop(item, index, size);
            let walked = accept_children(&self.children, ctx);
            ctx.pop_loop();
            walked?;
        }
        ctx.set_enabled(true);
        Ok(())
    }
}
