use crate::core::{DynSqlError, MessageBuilder, Result, Value};
use crate::evaluator::ast::{CompOp, ExprNode, LogicOp};
use crate::template::context::CommandContext;
use crate::template::resolver::resolve_variable;

/// Evaluates an IF condition down to its truthiness.
pub fn evaluate_bool(expr: &ExprNode, ctx: &CommandContext, specified_sql: &str) -> Result<bool> {
    Ok(evaluate(expr, ctx, specified_sql)?.as_bool())
}

/// Evaluates one expression node against the context namespace. Pure and
/// terminating: the grammar has no assignment and no loops.
pub fn evaluate(expr: &ExprNode, ctx: &CommandContext, specified_sql: &str) -> Result<Value> {
    match expr {
        ExprNode::Literal(value) => Ok(value.clone()),
        ExprNode::Path { expression, names } => {
            Ok(resolve_variable(ctx, expression, names, specified_sql)?.value)
        }
        ExprNode::MethodCall {
            expression,
            names,
            method,
        } => {
            let target = resolve_variable(ctx, expression, names, specified_sql)?;
            call_zero_arg(ctx, &target.value, method, expression, specified_sql)
        }
        ExprNode::Comparison { left, op, right } => {
            let lhs = evaluate(left, ctx, specified_sql)?;
            let rhs = evaluate(right, ctx, specified_sql)?;
            compare(*op, &lhs, &rhs, expr, specified_sql).map(Value::Boolean)
        }
        ExprNode::Logical { left, op, right } => {
            let lhs = evaluate_bool(left, ctx, specified_sql)?;
            // Short-circuit, so null guards like `a != null && a.b` work.
            let result = match op {
                LogicOp::And => lhs && evaluate_bool(right, ctx, specified_sql)?,
                LogicOp::Or => lhs || evaluate_bool(right, ctx, specified_sql)?,
            };
            Ok(Value::Boolean(result))
        }
        ExprNode::Not(inner) => Ok(Value::Boolean(!evaluate_bool(inner, ctx, specified_sql)?)),
    }
}

fn compare(
    op: CompOp,
    lhs: &Value,
    rhs: &Value,
    expr: &ExprNode,
    specified_sql: &str,
) -> Result<bool> {
    match op {
        CompOp::Eq => equals(lhs, rhs, expr, specified_sql),
        CompOp::NotEq => equals(lhs, rhs, expr, specified_sql).map(|eq| !eq),
        _ => {
            // Ordering against NULL is simply false, never an error.
            if lhs.is_null() || rhs.is_null() {
                return Ok(false);
            }
            let Some(ordering) = lhs.partial_cmp(rhs) else {
                return Err(incompatible_comparison(lhs, rhs, expr, specified_sql));
            };
            Ok(match op {
                CompOp::Lt => ordering.is_lt(),
                CompOp::LtEq => ordering.is_le(),
                CompOp::Gt => ordering.is_gt(),
                CompOp::GtEq => ordering.is_ge(),
                CompOp::Eq | CompOp::NotEq => unreachable!(),
            })
        }
    }
}

fn equals(lhs: &Value, rhs: &Value, expr: &ExprNode, specified_sql: &str) -> Result<bool> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(lhs.is_null() && rhs.is_null());
    }
    let comparable = (lhs.is_numeric() && rhs.is_numeric())
        || matches!(
            (lhs, rhs),
            (Value::Text(_), Value::Text(_))
                | (Value::Boolean(_), Value::Boolean(_))
                | (Value::List(_), Value::List(_))
                | (Value::Bean(_), Value::Bean(_))
        );
    if !comparable {
        return Err(incompatible_comparison(lhs, rhs, expr, specified_sql));
    }
    Ok(lhs == rhs)
}

fn call_zero_arg(
    ctx: &CommandContext,
    target: &Value,
    method: &str,
    path: &str,
    specified_sql: &str,
) -> Result<Value> {
    match target {
        Value::Text(text) => match method {
            "length" => Ok(Value::Integer(text.chars().count() as i32)),
            "isEmpty" => Ok(Value::Boolean(text.is_empty())),
            _ => Err(unknown_method(target, method, path, specified_sql)),
        },
        Value::List(items) => match method {
            "size" => Ok(Value::Integer(items.len() as i32)),
            "isEmpty" => Ok(Value::Boolean(items.is_empty())),
            _ => Err(unknown_method(target, method, path, specified_sql)),
        },
        Value::Bean(bean) => {
            let metadata = ctx.registry().metadata(bean.class())?;
            metadata
                .invoke(ctx.registry(), bean, method, Vec::new())
                .map_err(|_| unknown_method(target, method, path, specified_sql))
        }
        Value::Null => {
            let mut br = MessageBuilder::new();
            br.add_notice("The IF comment called a method on a null value.");
            br.add_item("Comment Expression");
            br.add_element(format!("{}.{}()", path, method));
            br.add_item("Specified SQL");
            br.add_element(specified_sql.to_string());
            Err(DynSqlError::ExpressionEvaluation(br.build()))
        }
        _ => Err(unknown_method(target, method, path, specified_sql)),
    }
}

fn unknown_method(target: &Value, method: &str, path: &str, specified_sql: &str) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The IF comment called an unknown method.");
    br.add_item("Unknown Method");
    br.add_element(format!("{}() on a {} value", method, target.type_name()));
    br.add_item("Comment Expression");
    br.add_element(format!("{}.{}()", path, method));
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}

fn incompatible_comparison(
    lhs: &Value,
    rhs: &Value,
    expr: &ExprNode,
    specified_sql: &str,
) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The IF comment compared incompatible types.");
    br.add_item("Compared Types");
    br.add_element(format!("{} and {}", lhs.type_name(), rhs.type_name()));
    br.add_item("Comment Expression");
    br.add_element(expr.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}
