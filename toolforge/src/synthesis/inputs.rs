//! Deterministic test-input synthesis from declared parameter types.

use serde_json::{json, Value};

use crate::types::TypeTag;

/// Produces representative values per declared type and combines them into
/// an argument matrix. Nothing here is random: the same type sequence always
/// yields the same matrix.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestInputSynthesizer;

impl TestInputSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Candidate values for one declared type. The first value is the primary.
    pub fn values_for(&self, tag: &TypeTag) -> Vec<Value> {
        match tag {
            TypeTag::String => vec![json!("hello world"), json!("")],
            TypeTag::Integer => vec![json!(5), json!(0), json!(-3)],
            TypeTag::Float => vec![json!(2.5)],
            TypeTag::Boolean => vec![json!(true), json!(false)],
            TypeTag::Sequence(inner) => match inner.as_ref() {
                TypeTag::String => vec![
                    json!(["apple", "banana", "cherry"]),
                    json!([]),
                    json!(["apple"]),
                ],
                TypeTag::Integer => vec![json!([4, 1, 3, 2]), json!([]), json!([7])],
                TypeTag::Float => vec![json!([1.5, 0.25, 3.0]), json!([]), json!([1.5])],
                _ => vec![json!([]), json!(["sample"])],
            },
            TypeTag::Mapping => vec![json!({"alpha": 1, "beta": 2})],
            TypeTag::Any => vec![json!("sample")],
        }
    }

    /// Argument tuples for a parameter list: the primary tuple first, then one
    /// tuple per alternate value with only that position substituted.
    pub fn synthesize(&self, types: &[TypeTag]) -> Vec<Vec<Value>> {
        let per_param: Vec<Vec<Value>> = types.iter().map(|t| self.values_for(t)).collect();
        let primary: Vec<Value> = per_param.iter().map(|vals| vals[0].clone()).collect();

        let mut matrix = vec![primary.clone()];
        for (position, values) in per_param.iter().enumerate() {
            for alternate in values.iter().skip(1) {
                let mut tuple = primary.clone();
                tuple[position] = alternate.clone();
                matrix.push(tuple);
            }
        }
        matrix
    }

    /// Number of tuples [`synthesize`](Self::synthesize) returns.
    pub fn matrix_size(&self, types: &[TypeTag]) -> usize {
        1 + types
            .iter()
            .map(|t| self.values_for(t).len() - 1)
            .sum::<usize>()
    }
}
