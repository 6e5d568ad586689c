use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use dynsql::{SqlEngine, TypeTag, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlgen")]
#[command(about = "Render a two-way SQL template against named arguments")]
struct Cli {
    /// Template text. Mutually exclusive with --file.
    #[arg(long)]
    sql: Option<String>,

    /// Read the template from a file instead.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Argument as name=value or name:type=value. Types: text (default),
    /// int, long, short, float, double, bool, list (comma-separated).
    /// Repeatable.
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Reject null bind values everywhere in the template.
    #[arg(long)]
    block_null: bool,
}

struct ParsedArg {
    name: String,
    tag: TypeTag,
    value: Value,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let template = match (&cli.sql, &cli.file) {
        (Some(sql), None) => sql.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading template file {}", path.display()))?,
        _ => bail!("pass exactly one of --sql or --file"),
    };

    let mut names = Vec::new();
    let mut tags = Vec::new();
    let mut values = Vec::new();
    for raw in &cli.args {
        let parsed = parse_arg(raw)?;
        names.push(parsed.name);
        tags.push(parsed.tag);
        values.push(parsed.value);
    }
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let engine = SqlEngine::new().block_null_parameter(cli.block_null);
    let generated = engine
        .generate(&template, &name_refs, &tags, &values)
        .map_err(|e| anyhow!("{}", e))?;

    println!("{}", generated.sql);
    if !generated.bind_values.is_empty() {
        println!();
        for (i, (value, tag)) in generated
            .bind_values
            .iter()
            .zip(&generated.bind_tags)
            .enumerate()
        {
            println!("-- bind[{}] {} = {}", i + 1, tag, value);
        }
    }
    Ok(())
}

fn parse_arg(raw: &str) -> Result<ParsedArg> {
    let (key, text) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("argument '{}' is not in name=value form", raw))?;
    let (name, type_name) = match key.split_once(':') {
        Some((name, type_name)) => (name, type_name),
        None => (key, "text"),
    };
    let (tag, value) = parse_typed_value(type_name, text)
        .with_context(|| format!("argument '{}'", raw))?;
    Ok(ParsedArg {
        name: name.to_string(),
        tag,
        value,
    })
}

fn parse_typed_value(type_name: &str, text: &str) -> Result<(TypeTag, Value)> {
    let value = match type_name {
        "text" => (TypeTag::Text, Value::from(text)),
        "int" => (TypeTag::Integer, Value::Integer(text.parse()?)),
        "long" => (TypeTag::Long, Value::Long(text.parse()?)),
        "short" => (TypeTag::Short, Value::Short(text.parse()?)),
        "float" => (TypeTag::Float, Value::Float(text.parse()?)),
        "double" => (TypeTag::Double, Value::Double(text.parse()?)),
        "bool" => (TypeTag::Boolean, Value::Boolean(text.parse()?)),
        "null" => (TypeTag::Text, Value::Null),
        "list" => {
            let items = text
                .split(',')
                .map(|item| {
                    let item = item.trim();
                    match item.parse::<i64>() {
                        Ok(number) => Value::Long(number),
                        Err(_) => Value::from(item),
                    }
                })
                .collect();
            (TypeTag::List, Value::List(items))
        }
        other => bail!("unknown argument type '{}'", other),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_arg() {
        let parsed = parse_arg("name=abc").unwrap();
        assert_eq!(parsed.name, "name");
        assert_eq!(parsed.tag, TypeTag::Text);
        assert_eq!(parsed.value, Value::from("abc"));
    }

    #[test]
    fn parses_typed_args() {
        let parsed = parse_arg("id:int=42").unwrap();
        assert_eq!(parsed.tag, TypeTag::Integer);
        assert_eq!(parsed.value, Value::Integer(42));

        let parsed = parse_arg("ids:list=1,2,3").unwrap();
        assert_eq!(
            parsed.value,
            Value::List(vec![Value::Long(1), Value::Long(2), Value::Long(3)])
        );
    }

    #[test]
    fn rejects_malformed_args() {
        assert!(parse_arg("no-equals").is_err());
        assert!(parse_arg("id:int=abc").is_err());
        assert!(parse_arg("id:mystery=1").is_err());
    }
}
