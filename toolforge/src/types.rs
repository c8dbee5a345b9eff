//! Shared value types: declared type tags and parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a candidate parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Boolean,
    Sequence(Box<TypeTag>),
    Mapping,
    Any,
}

impl TypeTag {
    pub fn sequence_of(element: TypeTag) -> Self {
        TypeTag::Sequence(Box::new(element))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, TypeTag::Sequence(_))
    }

    /// Python spelling used when rendering signatures in documentation.
    pub fn python_name(&self) -> String {
        match self {
            TypeTag::String => "str".into(),
            TypeTag::Integer => "int".into(),
            TypeTag::Float => "float".into(),
            TypeTag::Boolean => "bool".into(),
            TypeTag::Sequence(inner) if **inner == TypeTag::Any => "list".into(),
            TypeTag::Sequence(inner) => format!("list[{}]", inner.python_name()),
            TypeTag::Mapping => "dict".into(),
            TypeTag::Any => "Any".into(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::String => write!(f, "string"),
            TypeTag::Integer => write!(f, "integer"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Boolean => write!(f, "boolean"),
            TypeTag::Sequence(inner) => write!(f, "sequence<{}>", inner),
            TypeTag::Mapping => write!(f, "mapping"),
            TypeTag::Any => write!(f, "any"),
        }
    }
}

/// A named, typed parameter of a candidate's entry function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub declared_type: TypeTag,
}

impl Parameter {
    pub fn new(name: impl Into<String>, declared_type: TypeTag) -> Self {
        Self {
            name: name.into(),
            declared_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nests_sequence_elements() {
        let tag = TypeTag::sequence_of(TypeTag::sequence_of(TypeTag::Integer));
        assert_eq!(tag.to_string(), "sequence<sequence<integer>>");
    }

    #[test]
    fn python_name_round_trips_common_annotations() {
        assert_eq!(TypeTag::sequence_of(TypeTag::Float).python_name(), "list[float]");
        assert_eq!(TypeTag::sequence_of(TypeTag::Any).python_name(), "list");
        assert_eq!(TypeTag::Mapping.python_name(), "dict");
    }
}
