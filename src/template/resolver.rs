use crate::core::{DynSqlError, MessageBuilder, Result, TypeTag, Value};
use crate::template::context::CommandContext;

/// A resolved template expression: the value plus the declared tag of the
/// final segment (the argument's declared tag for a bare head, the
/// property's tag after traversal).
#[derive(Debug)]
pub struct ResolvedValue {
    pub value: Value,
    pub tag: TypeTag,
}

/// Resolves a dotted expression against the context namespace. The head
/// names an argument (or `#current` inside a FOR loop); each further
/// segment is a property lookup through the bean metadata cache.
pub fn resolve_variable(
    ctx: &CommandContext,
    expression: &str,
    names: &[String],
    specified_sql: &str,
) -> Result<ResolvedValue> {
    let Some(head) = names.first() else {
        return Err(DynSqlError::InvalidArgument(
            "Variable expression must not be empty".to_string(),
        ));
    };

    let (mut value, mut tag) = if head == "#current" {
        match ctx.current_loop_value() {
            Some(current) => {
                let tag = current.runtime_tag();
                (current, tag)
            }
            None => {
                return Err(loop_variable_outside_for(expression, specified_sql));
            }
        }
    } else {
        match ctx.get_arg(head) {
            Some((found, tag)) => (found.clone(), tag),
            None => return Err(unknown_variable(expression, head, specified_sql)),
        }
    };

    for segment in &names[1..] {
        match &value {
            Value::Bean(bean) => {
                let metadata = ctx.registry().metadata(bean.class())?;
                let property = metadata.get_property(segment).map_err(|_| {
                    property_not_found(metadata.class_name(), segment, expression, specified_sql)
                })?;
                tag = property.tag();
                value = property.get_value(bean)?;
            }
            Value::Null => {
                return Err(property_on_null(segment, expression, specified_sql));
            }
            other => {
                return Err(property_on_terminal(
                    other.type_name(),
                    segment,
                    expression,
                    specified_sql,
                ));
            }
        }
    }

    Ok(ResolvedValue { value, tag })
}

fn unknown_variable(expression: &str, head: &str, specified_sql: &str) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The variable comment referenced an unknown argument.");
    br.add_item("Unknown Argument");
    br.add_element(head.to_string());
    br.add_item("Comment Expression");
    br.add_element(expression.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}

fn loop_variable_outside_for(expression: &str, specified_sql: &str) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The loop variable #current was referenced outside a FOR comment.");
    br.add_item("Comment Expression");
    br.add_element(expression.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}

fn property_not_found(
    class_name: &str,
    segment: &str,
    expression: &str,
    specified_sql: &str,
) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The variable comment traversed a property the bean does not have.");
    br.add_item("Missing Property");
    br.add_element(format!("{}#{}", class_name, segment));
    br.add_item("Comment Expression");
    br.add_element(expression.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::PropertyNotFound(br.build())
}

fn property_on_null(segment: &str, expression: &str, specified_sql: &str) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The variable comment read a property of a null value.");
    br.add_item("Null Segment");
    br.add_element(format!("'{}' was reached with a null target", segment));
    br.add_item("Comment Expression");
    br.add_element(expression.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}

fn property_on_terminal(
    type_name: &str,
    segment: &str,
    expression: &str,
    specified_sql: &str,
) -> DynSqlError {
    let mut br = MessageBuilder::new();
    br.add_notice("The variable comment traversed into a value that has no properties.");
    br.add_item("Target");
    br.add_element(format!("'{}' read on a {} value", segment, type_name));
    br.add_item("Comment Expression");
    br.add_element(expression.to_string());
    br.add_item("Specified SQL");
    br.add_element(specified_sql.to_string());
    DynSqlError::ExpressionEvaluation(br.build())
}
