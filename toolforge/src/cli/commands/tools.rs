//! Tools command - inspect and call registered tools

use crate::cli::{CliContext, OutputFormat, OutputFormatter};
use crate::flexible::{bind, BindError, CallArguments, FlexibleInput};
use crate::types::Parameter;
use anyhow::bail;
use clap::{Args, Subcommand};
use serde_json::Value;

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// List registered tools
    List {
        /// Only tools in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one tool with its documentation and source
    Show {
        /// Tool name
        name: String,
    },

    /// Call a registered tool in the sandbox
    Call(CallArgs),
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Tool name
    pub name: String,

    /// Arguments: a JSON array, a JSON object, key=value pairs or positional values
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub async fn execute(ctx: &CliContext, command: ToolsCommand) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let registry = ctx.open_registry()?;

    match command {
        ToolsCommand::List { category } => {
            let summaries: Vec<_> = registry
                .summaries()
                .into_iter()
                .filter(|s| category.as_deref().map_or(true, |c| s.category == c))
                .collect();
            if formatter.is_json() {
                formatter.json(&summaries);
                return Ok(());
            }
            if summaries.is_empty() {
                ctx.status("No tools registered");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| vec![s.name.clone(), s.category.clone(), s.signature.clone()])
                .collect();
            formatter.table(&["Name", "Category", "Signature"], &rows);
            ctx.status(&format!("\n{} tool(s)", summaries.len()));
        }
        ToolsCommand::Show { name } => {
            let tool = registry.lookup(&name)?;
            if formatter.is_json() {
                formatter.json(tool);
                return Ok(());
            }
            formatter.section(&tool.name);
            formatter.kv("Category", &tool.category);
            formatter.kv("Signature", &tool.signature());
            formatter.kv("Created", &tool.created_at.to_rfc3339());
            formatter.kv("Validation attempts", &tool.validation_attempts.to_string());
            formatter.kv("Validated inputs", &tool.test_outcomes.len().to_string());
            formatter.section("Documentation");
            println!("{}", tool.documentation);
            formatter.section("Source");
            println!("{}", tool.source);
        }
        ToolsCommand::Call(args) => {
            let tool = registry.lookup(&args.name)?;
            let values = bind_arguments(&tool.parameters, &args.args)?;
            ctx.debug(&format!("calling {} with {}", tool.name, Value::Array(values.clone())));

            let executor = ctx.executor();
            let outcome = executor.execute(&tool.source, &tool.name, &values).await?;
            match ctx.output_format {
                OutputFormat::Json => formatter.json(&outcome),
                _ if outcome.success => {
                    let value = outcome.value.unwrap_or(Value::Null);
                    println!("{}", serde_json::to_string_pretty(&value)?);
                    ctx.debug(&format!("elapsed: {} ms", outcome.elapsed_ms));
                }
                _ => bail!("{}", outcome.describe()),
            }
        }
    }
    Ok(())
}

/// Bind command-line tokens to positional arguments for `parameters`.
///
/// Accepted shapes: one JSON array (positional), one JSON object (by name),
/// `key=value` pairs, or bare positional tokens. Every value goes through
/// `FlexibleInput` against the declared type.
pub fn bind_arguments(parameters: &[Parameter], raw: &[String]) -> Result<Vec<Value>, BindError> {
    let structured = match raw {
        [only] => serde_json::from_str::<Value>(only)
            .ok()
            .filter(|v| v.is_array() || v.is_object()),
        _ => None,
    };
    let args = match structured {
        Some(value) => CallArguments::from_value(value, parameters),
        None => {
            let mut args = CallArguments::default();
            for token in raw {
                match split_pair(token, parameters) {
                    Some((key, value)) => args
                        .named
                        .push((key.to_string(), FlexibleInput::from_cli_arg(value))),
                    None => args.positional.push(FlexibleInput::from_cli_arg(token)),
                }
            }
            args
        }
    };
    bind(parameters, args)
}

/// `key=value` only when `key` names a declared parameter.
fn split_pair<'a>(token: &'a str, parameters: &[Parameter]) -> Option<(&'a str, &'a str)> {
    let (key, value) = token.split_once('=')?;
    parameters
        .iter()
        .any(|p| p.name == key)
        .then_some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(declared: &[(&str, TypeTag)]) -> Vec<Parameter> {
        declared
            .iter()
            .map(|(name, tag)| Parameter::new(*name, tag.clone()))
            .collect()
    }

    fn raw(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn binds_positional_tokens_with_coercion() {
        let p = params(&[("a", TypeTag::Integer), ("b", TypeTag::Integer)]);
        assert_eq!(bind_arguments(&p, &raw(&["2", "3"])).unwrap(), vec![json!(2), json!(3)]);
    }

    #[test]
    fn binds_key_value_pairs_in_any_order() {
        let p = params(&[("text", TypeTag::String), ("times", TypeTag::Integer)]);
        let values = bind_arguments(&p, &raw(&["times=2", "text=ab"])).unwrap();
        assert_eq!(values, vec![json!("ab"), json!(2)]);
    }

    #[test]
    fn lone_array_fills_a_lone_sequence_parameter() {
        let p = params(&[("numbers", TypeTag::sequence_of(TypeTag::Float))]);
        let values = bind_arguments(&p, &raw(&["[1, 2.5]"])).unwrap();
        assert_eq!(values, vec![json!([1.0, 2.5])]);
    }

    #[test]
    fn scalar_for_sequence_is_wrapped() {
        let p = params(&[("numbers", TypeTag::sequence_of(TypeTag::Integer))]);
        assert_eq!(bind_arguments(&p, &raw(&["4"])).unwrap(), vec![json!([4])]);
    }

    #[test]
    fn json_array_spreads_over_several_parameters() {
        let p = params(&[("a", TypeTag::Integer), ("b", TypeTag::String)]);
        let values = bind_arguments(&p, &raw(&[r#"[1, "x"]"#])).unwrap();
        assert_eq!(values, vec![json!(1), json!("x")]);
    }

    #[test]
    fn json_object_binds_by_name() {
        let p = params(&[("a", TypeTag::Integer), ("b", TypeTag::Boolean)]);
        let values = bind_arguments(&p, &raw(&[r#"{"b": true, "a": 7}"#])).unwrap();
        assert_eq!(values, vec![json!(7), json!(true)]);
    }

    #[test]
    fn missing_and_surplus_arguments_are_errors() {
        let p = params(&[("a", TypeTag::Integer), ("b", TypeTag::Integer)]);
        let missing = bind_arguments(&p, &raw(&["1"])).unwrap_err();
        assert!(missing.to_string().contains("missing argument 'b'"));
        let surplus = bind_arguments(&p, &raw(&["1", "2", "3"])).unwrap_err();
        assert!(surplus.to_string().contains("too many arguments"));
    }

    #[test]
    fn incompatible_value_reports_the_parameter() {
        let p = params(&[("n", TypeTag::Integer)]);
        let err = bind_arguments(&p, &raw(&["abc"])).unwrap_err();
        assert!(err.to_string().contains("'n'"));
    }

    #[test]
    fn repeated_key_value_pair_is_rejected() {
        let p = params(&[("text", TypeTag::String)]);
        let err = bind_arguments(&p, &raw(&["text=a", "text=b"])).unwrap_err();
        assert_eq!(err, BindError::Duplicate("text".into()));
    }
}
