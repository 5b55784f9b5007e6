use std::collections::BTreeMap;

use xxhash_rust::xxh64::xxh64;

use crate::error::CompileError;
use crate::expr::Literal;
use crate::value::Value;

/// Typed bound parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// Boolean, bound as 0/1.
    Bool(bool),
    /// Integer array for `IN`.
    IntList(Vec<i64>),
    /// Float array for `IN`.
    FloatList(Vec<f64>),
    /// Text array for `IN`.
    TextList(Vec<String>),
}

impl Param {
    /// Scalar parameter for a non-null literal.
    pub fn from_literal(literal: &Literal) -> Option<Param> {
        match literal {
            Literal::Null => None,
            Literal::Bool(v) => Some(Param::Bool(*v)),
            Literal::Int(v) => Some(Param::Int(*v)),
            Literal::Float(v) => Some(Param::Float(*v)),
            Literal::String(v) => Some(Param::Text(v.clone())),
        }
    }

    /// Array parameter for a homogeneous list of non-null literals.
    ///
    /// Ints widen to floats when mixed with floats; booleans bind as ints.
    pub fn from_literals(items: &[Literal]) -> Option<Param> {
        if items.iter().all(|l| matches!(l, Literal::Int(_) | Literal::Bool(_))) {
            return Some(Param::IntList(
                items
                    .iter()
                    .map(|l| match l {
                        Literal::Int(v) => *v,
                        Literal::Bool(b) => i64::from(*b),
                        _ => 0,
                    })
                    .collect(),
            ));
        }
        if items.iter().all(|l| matches!(l, Literal::Int(_) | Literal::Float(_))) {
            return Some(Param::FloatList(
                items
                    .iter()
                    .map(|l| match l {
                        Literal::Int(v) => *v as f64,
                        Literal::Float(v) => *v,
                        _ => 0.0,
                    })
                    .collect(),
            ));
        }
        let texts: Option<Vec<String>> = items
            .iter()
            .map(|l| match l {
                Literal::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        texts.map(Param::TextList)
    }

    /// Scalar parameter for a non-null value.
    pub fn from_value(value: &Value) -> Option<Param> {
        match value {
            Value::Bool(v) => Some(Param::Bool(*v)),
            Value::Int(v) => Some(Param::Int(*v)),
            Value::Float(v) => Some(Param::Float(*v)),
            Value::String(v) => Some(Param::Text(v.clone())),
            Value::Null | Value::List(_) | Value::Object(_) => None,
        }
    }

    /// Number of placeholders this parameter expands to.
    pub fn arity(&self) -> usize {
        match self {
            Param::IntList(v) => v.len(),
            Param::FloatList(v) => v.len(),
            Param::TextList(v) => v.len(),
            _ => 1,
        }
    }

    /// Whether the parameter is an array.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Param::IntList(_) | Param::FloatList(_) | Param::TextList(_)
        )
    }

    /// Values handed to the driver, one per placeholder.
    pub fn sql_values(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value as Sql;
        match self {
            Param::Int(v) => vec![Sql::Integer(*v)],
            Param::Float(v) => vec![Sql::Real(*v)],
            Param::Text(v) => vec![Sql::Text(v.clone())],
            Param::Bool(v) => vec![Sql::Integer(i64::from(*v))],
            Param::IntList(v) => v.iter().map(|x| Sql::Integer(*x)).collect(),
            Param::FloatList(v) => v.iter().map(|x| Sql::Real(*x)).collect(),
            Param::TextList(v) => v.iter().map(|x| Sql::Text(x.clone())).collect(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Param::Int(v) => {
                out.push(b'i');
                out.extend_from_slice(&v.to_le_bytes());
            }
            Param::Float(v) => {
                out.push(b'f');
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Param::Text(v) => {
                out.push(b't');
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                out.extend_from_slice(v.as_bytes());
            }
            Param::Bool(v) => {
                out.push(b'b');
                out.push(u8::from(*v));
            }
            Param::IntList(v) => {
                out.push(b'I');
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            Param::FloatList(v) => {
                out.push(b'F');
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                for x in v {
                    out.extend_from_slice(&x.to_bits().to_le_bytes());
                }
            }
            Param::TextList(v) => {
                out.push(b'T');
                out.extend_from_slice(&(v.len() as u64).to_le_bytes());
                for x in v {
                    out.extend_from_slice(&(x.len() as u64).to_le_bytes());
                    out.extend_from_slice(x.as_bytes());
                }
            }
        }
    }
}

/// Deterministic parameter name for `semantic` bound to `param`.
///
/// Equal inputs always produce the same name, so views composed in any order
/// agree on names without coordination.
pub fn param_name(semantic: &str, param: &Param) -> String {
    let mut bytes = Vec::with_capacity(semantic.len() + 16);
    bytes.extend_from_slice(semantic.as_bytes());
    bytes.push(0);
    param.encode(&mut bytes);
    format!("p_{:016x}", xxh64(&bytes, 0))
}

/// Named parameters of one query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet {
    params: BTreeMap<String, Param>,
}

impl ParamSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `param` under a content-derived name and returns the name.
    pub fn bind(&mut self, semantic: &str, param: Param) -> Result<String, CompileError> {
        let name = param_name(semantic, &param);
        self.insert(name.clone(), param)?;
        Ok(name)
    }

    /// Registers a named parameter. Re-registering an identical value is a
    /// no-op; a different value under the same name is a conflict.
    pub fn insert(&mut self, name: String, param: Param) -> Result<(), CompileError> {
        match self.params.get(&name) {
            Some(existing) if *existing == param => Ok(()),
            Some(_) => Err(CompileError::ParamConflict { name }),
            None => {
                self.params.insert(name, param);
                Ok(())
            }
        }
    }

    /// Re-registers every parameter of `other` on this set.
    pub fn merge(&mut self, other: ParamSet) -> Result<(), CompileError> {
        for (name, param) in other.params {
            self.insert(name, param)?;
        }
        Ok(())
    }

    /// Parameter by name.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }
}
