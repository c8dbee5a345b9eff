//! Loosely-shaped inputs normalized against declared parameter types.
//!
//! Tool arguments that arrive from the command line or from JSON do not
//! always match the declared shape: a single value where a list is expected,
//! a number spelled as text. `FlexibleInput` makes those conversions
//! explicit instead of leaving them to the candidate.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::types::{Parameter, TypeTag};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot use {found} as {expected} for parameter '{parameter}'")]
pub struct CoercionError {
    pub parameter: String,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlexibleInput {
    Scalar(Value),
    Sequence(Vec<FlexibleInput>),
    Mapping(Map<String, Value>),
}

impl From<Value> for FlexibleInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                FlexibleInput::Sequence(items.into_iter().map(FlexibleInput::from).collect())
            }
            Value::Object(map) => FlexibleInput::Mapping(map),
            scalar => FlexibleInput::Scalar(scalar),
        }
    }
}

impl FlexibleInput {
    /// A command-line token: JSON when it parses, otherwise a bare string.
    pub fn from_cli_arg(raw: &str) -> Self {
        serde_json::from_str::<Value>(raw)
            .map(FlexibleInput::from)
            .unwrap_or_else(|_| FlexibleInput::Scalar(Value::String(raw.to_string())))
    }

    pub fn into_value(self) -> Value {
        match self {
            FlexibleInput::Scalar(v) => v,
            FlexibleInput::Sequence(items) => {
                Value::Array(items.into_iter().map(FlexibleInput::into_value).collect())
            }
            FlexibleInput::Mapping(map) => Value::Object(map),
        }
    }

    fn shape(&self) -> String {
        match self {
            FlexibleInput::Scalar(Value::String(s)) => format!("string {:?}", s),
            FlexibleInput::Scalar(v) => v.to_string(),
            FlexibleInput::Sequence(_) => "a sequence".to_string(),
            FlexibleInput::Mapping(_) => "a mapping".to_string(),
        }
    }

    /// Convert into a value of type `tag`.
    pub fn normalize(self, tag: &TypeTag, parameter: &str) -> Result<Value, CoercionError> {
        let mismatch = |input: &FlexibleInput| CoercionError {
            parameter: parameter.to_string(),
            expected: tag.to_string(),
            found: input.shape(),
        };

        match (tag, self) {
            (TypeTag::Any, input) => Ok(input.into_value()),
            (TypeTag::Sequence(inner), FlexibleInput::Sequence(items)) => items
                .into_iter()
                .map(|item| item.normalize(inner, parameter))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (TypeTag::Sequence(inner), scalar @ FlexibleInput::Scalar(_)) => {
                Ok(Value::Array(vec![scalar.normalize(inner, parameter)?]))
            }
            (TypeTag::Mapping, FlexibleInput::Mapping(map)) => Ok(Value::Object(map)),
            (TypeTag::String, FlexibleInput::Scalar(value)) => match value {
                Value::String(s) => Ok(Value::String(s)),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(mismatch(&FlexibleInput::Scalar(other))),
            },
            (TypeTag::Integer, FlexibleInput::Scalar(value)) => {
                let coerced = match &value {
                    Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                    Value::Number(n) => n
                        .as_f64()
                        .filter(|f| f.fract() == 0.0 && in_i64_range(*f))
                        .map(|f| Value::from(f as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                    _ => None,
                };
                coerced.ok_or_else(|| mismatch(&FlexibleInput::Scalar(value)))
            }
            (TypeTag::Float, FlexibleInput::Scalar(value)) => {
                let coerced = match &value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }
                .and_then(Number::from_f64)
                .map(Value::Number);
                coerced.ok_or_else(|| mismatch(&FlexibleInput::Scalar(value)))
            }
            (TypeTag::Boolean, FlexibleInput::Scalar(value)) => {
                let coerced = match &value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => match s.trim().to_lowercase().as_str() {
                        "true" | "yes" | "1" => Some(true),
                        "false" | "no" | "0" => Some(false),
                        _ => None,
                    },
                    Value::Number(n) => match n.as_i64() {
                        Some(1) => Some(true),
                        Some(0) => Some(false),
                        _ => None,
                    },
                    _ => None,
                };
                coerced
                    .map(Value::Bool)
                    .ok_or_else(|| mismatch(&FlexibleInput::Scalar(value)))
            }
            (_, input) => Err(mismatch(&input)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("missing argument '{0}'")]
    Missing(String),
    #[error("unknown argument '{0}'")]
    Unknown(String),
    #[error("argument '{0}' given twice")]
    Duplicate(String),
    #[error("too many arguments ({0} given)")]
    TooMany(usize),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// Call arguments before they are matched against declared parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    pub positional: Vec<FlexibleInput>,
    pub named: Vec<(String, FlexibleInput)>,
}

impl CallArguments {
    /// Arguments from one structured value. An array spreads positionally,
    /// an object binds by name and anything else is a single argument. A lone
    /// container for a lone parameter of that shape is passed whole.
    pub fn from_value(value: Value, parameters: &[Parameter]) -> Self {
        match value {
            Value::Array(items) if !takes_whole(parameters, TypeTag::is_sequence) => Self {
                positional: items.into_iter().map(FlexibleInput::from).collect(),
                named: Vec::new(),
            },
            Value::Object(map) if !takes_whole(parameters, |t| *t == TypeTag::Mapping) => Self {
                positional: Vec::new(),
                named: map
                    .into_iter()
                    .map(|(key, value)| (key, FlexibleInput::from(value)))
                    .collect(),
            },
            other => Self {
                positional: vec![FlexibleInput::from(other)],
                named: Vec::new(),
            },
        }
    }
}

fn takes_whole(parameters: &[Parameter], shape: impl Fn(&TypeTag) -> bool) -> bool {
    match parameters {
        [only] => only.declared_type == TypeTag::Any || shape(&only.declared_type),
        _ => false,
    }
}

/// Match `args` to `parameters` and normalize each value against its
/// declared type. Named arguments are placed first; positional values fill
/// the remaining slots in order.
pub fn bind(parameters: &[Parameter], args: CallArguments) -> Result<Vec<Value>, BindError> {
    let mut slots: Vec<Option<FlexibleInput>> = vec![None; parameters.len()];

    for (key, value) in args.named {
        let index = parameters
            .iter()
            .position(|p| p.name == key)
            .ok_or_else(|| BindError::Unknown(key.clone()))?;
        if slots[index].replace(value).is_some() {
            return Err(BindError::Duplicate(key));
        }
    }

    let total = args.positional.len();
    let mut free = slots.iter_mut().filter(|s| s.is_none());
    for value in args.positional {
        match free.next() {
            Some(slot) => *slot = Some(value),
            None => return Err(BindError::TooMany(total)),
        }
    }

    parameters
        .iter()
        .zip(slots)
        .map(|(param, slot)| -> Result<Value, BindError> {
            let input = slot.ok_or_else(|| BindError::Missing(param.name.clone()))?;
            Ok(input.normalize(&param.declared_type, &param.name)?)
        })
        .collect()
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn in_i64_range(f: f64) -> bool {
    f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_is_wrapped_for_sequence_parameters() {
        let value = FlexibleInput::from_cli_arg("4")
            .normalize(&TypeTag::sequence_of(TypeTag::Float), "numbers")
            .unwrap();
        assert_eq!(value, json!([4.0]));
    }

    #[test]
    fn numeric_text_becomes_numbers() {
        assert_eq!(
            FlexibleInput::from(json!("12")).normalize(&TypeTag::Integer, "n").unwrap(),
            json!(12)
        );
        assert_eq!(
            FlexibleInput::from(json!(3.0)).normalize(&TypeTag::Integer, "n").unwrap(),
            json!(3)
        );
        assert_eq!(
            FlexibleInput::from(json!("2.5")).normalize(&TypeTag::Float, "x").unwrap(),
            json!(2.5)
        );
    }

    #[test]
    fn bare_words_are_strings_and_flags_are_booleans() {
        assert_eq!(
            FlexibleInput::from_cli_arg("hello").normalize(&TypeTag::String, "text").unwrap(),
            json!("hello")
        );
        assert_eq!(
            FlexibleInput::from_cli_arg("yes").normalize(&TypeTag::Boolean, "flag").unwrap(),
            json!(true)
        );
        assert_eq!(
            FlexibleInput::from(json!(7)).normalize(&TypeTag::String, "text").unwrap(),
            json!("7")
        );
    }

    #[test]
    fn incompatible_shapes_name_the_parameter() {
        let err = FlexibleInput::from(json!([1, 2]))
            .normalize(&TypeTag::Integer, "count")
            .unwrap_err();
        assert_eq!(err.parameter, "count");
        assert_eq!(err.expected, "integer");

        let err = FlexibleInput::from(json!({"a": 1}))
            .normalize(&TypeTag::sequence_of(TypeTag::Integer), "xs")
            .unwrap_err();
        assert_eq!(err.found, "a mapping");

        assert!(FlexibleInput::from(json!(2.5))
            .normalize(&TypeTag::Integer, "n")
            .is_err());
    }

    #[test]
    fn nested_sequences_normalize_elementwise() {
        let value = FlexibleInput::from(json!(["1", 2, 3.0]))
            .normalize(&TypeTag::sequence_of(TypeTag::Integer), "xs")
            .unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn integral_floats_outside_i64_are_rejected() {
        let err = FlexibleInput::from(json!(1e30))
            .normalize(&TypeTag::Integer, "count")
            .unwrap_err();
        assert_eq!(err.parameter, "count");
        assert_eq!(err.expected, "integer");
        assert!(FlexibleInput::from(json!(-1e19))
            .normalize(&TypeTag::Integer, "count")
            .is_err());
        assert_eq!(
            FlexibleInput::from(json!(-9.0e15))
                .normalize(&TypeTag::Integer, "count")
                .unwrap(),
            json!(-9_000_000_000_000_000i64)
        );
    }

    fn params(declared: &[(&str, TypeTag)]) -> Vec<Parameter> {
        declared
            .iter()
            .map(|(name, tag)| Parameter::new(*name, tag.clone()))
            .collect()
    }

    #[test]
    fn named_arguments_bind_before_positional_ones() {
        let p = params(&[("text", TypeTag::String), ("times", TypeTag::Integer)]);
        let args = CallArguments {
            positional: vec![FlexibleInput::from(json!("ab"))],
            named: vec![("times".to_string(), FlexibleInput::from(json!("3")))],
        };
        assert_eq!(bind(&p, args).unwrap(), vec![json!("ab"), json!(3)]);
    }

    #[test]
    fn binding_errors_name_the_argument() {
        let pair = params(&[("a", TypeTag::Integer), ("c", TypeTag::Integer)]);
        assert_eq!(
            bind(&pair, CallArguments::from_value(json!({"b": 1}), &pair)),
            Err(BindError::Unknown("b".into()))
        );

        let single = params(&[("a", TypeTag::Integer)]);
        assert_eq!(
            bind(&single, CallArguments::default()),
            Err(BindError::Missing("a".into()))
        );
        assert_eq!(
            bind(&single, CallArguments::from_value(json!([1, 2]), &single)),
            Err(BindError::TooMany(2))
        );
        assert!(matches!(
            bind(&single, CallArguments::from_value(json!("x"), &single)),
            Err(BindError::Coercion(_))
        ));
    }

    #[test]
    fn lone_container_is_passed_whole_to_a_lone_parameter() {
        let seq = params(&[("xs", TypeTag::sequence_of(TypeTag::Integer))]);
        assert_eq!(
            bind(&seq, CallArguments::from_value(json!([1, 2]), &seq)).unwrap(),
            vec![json!([1, 2])]
        );
        let map = params(&[("m", TypeTag::Mapping)]);
        assert_eq!(
            bind(&map, CallArguments::from_value(json!({"k": 1}), &map)).unwrap(),
            vec![json!({"k": 1})]
        );
        let pair = params(&[("a", TypeTag::Integer), ("b", TypeTag::Integer)]);
        assert_eq!(
            bind(&pair, CallArguments::from_value(json!({"b": 2, "a": 1}), &pair)).unwrap(),
            vec![json!(1), json!(2)]
        );
    }
}
