use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CompileError;

/// A bound variable value, after type-checking against its `VarSpec`
/// declaration (spec.md §4.3 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    List(Vec<VarValue>),
}

impl VarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            VarValue::Str(_) => "str",
            VarValue::Int(_) => "int",
            VarValue::Bool(_) => "bool",
            VarValue::Float(_) => "float",
            VarValue::List(_) => "list",
        }
    }

    /// Render this value the way it should appear when interpolated into
    /// a string or list field.
    pub fn render(&self) -> String {
        match self {
            VarValue::Str(s) => s.clone(),
            VarValue::Int(i) => i.to_string(),
            VarValue::Bool(b) => b.to_string(),
            VarValue::Float(f) => f.to_string(),
            VarValue::List(items) => items.iter().map(VarValue::render).collect::<Vec<_>>().join(","),
        }
    }

    /// Field access for `each.value.field` when `self` is a map-shaped
    /// value. Only meaningful for `for_each` items sourced from a list of
    /// single-key maps; plain scalars have no fields.
    pub fn get_field(&self, _field: &str) -> Option<&VarValue> {
        None
    }
}

/// One declaration under the manifest's top-level `vars:` list (spec.md
/// §6.1): `{name, type, default?}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VarSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: VarType,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Str,
    Int,
    Bool,
    Float,
    List,
}

impl VarType {
    pub fn name(self) -> &'static str {
        match self {
            VarType::Str => "str",
            VarType::Int => "int",
            VarType::Bool => "bool",
            VarType::Float => "float",
            VarType::List => "list",
        }
    }

    fn matches(self, value: &VarValue) -> bool {
        matches!(
            (self, value),
            (VarType::Str, VarValue::Str(_))
                | (VarType::Int, VarValue::Int(_))
                | (VarType::Bool, VarValue::Bool(_))
                | (VarType::Float, VarValue::Float(_))
                | (VarType::List, VarValue::List(_))
        )
    }
}

fn json_to_var_value(value: &serde_json::Value) -> Option<VarValue> {
    match value {
        serde_json::Value::String(s) => Some(VarValue::Str(s.clone())),
        serde_json::Value::Bool(b) => Some(VarValue::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(VarValue::Int(i))
            } else {
                n.as_f64().map(VarValue::Float)
            }
        }
        serde_json::Value::Array(items) => {
            let values = items.iter().map(json_to_var_value).collect::<Option<Vec<_>>>()?;
            Some(VarValue::List(values))
        }
        serde_json::Value::Null => None,
        serde_json::Value::Object(_) => None,
    }
}

/// The bound environment available to template interpolation: one value
/// per declared variable.
pub type VarsEnv = BTreeMap<String, VarValue>;

/// Bind the caller-supplied variable inputs against the manifest's
/// `vars_spec` declarations (spec.md §4.3 step 2): every declared var must
/// either receive an input value of the matching type, or fall back to its
/// `default`; a required var with neither is `MissingVar`.
pub fn bind_vars(
    specs: &[VarSpec],
    inputs: &BTreeMap<String, serde_json::Value>,
) -> Result<VarsEnv, CompileError> {
    let mut env = VarsEnv::new();
    for spec in specs {
        let raw = inputs.get(&spec.name).or(spec.default.as_ref());
        let raw = match raw {
            Some(raw) => raw,
            None => return Err(CompileError::MissingVar(spec.name.clone())),
        };
        let value = json_to_var_value(raw)
            .ok_or_else(|| CompileError::MissingVar(spec.name.clone()))?;
        if !spec.ty.matches(&value) {
            return Err(CompileError::VarTypeMismatch {
                name: spec.name.clone(),
                expected: spec.ty.name(),
                actual: value.type_name(),
            });
        }
        env.insert(spec.name.clone(), value);
    }
    Ok(env)
}

#[cfg(test)]
mod test {
    use super::*;

    fn spec(name: &str, ty: VarType, default: Option<serde_json::Value>) -> VarSpec {
        VarSpec {
            name: name.to_string(),
            ty,
            default,
        }
    }

    #[test]
    fn binds_supplied_value() {
        let specs = vec![spec("env", VarType::Str, None)];
        let mut inputs = BTreeMap::new();
        inputs.insert("env".to_string(), serde_json::json!("prod"));
        let env = bind_vars(&specs, &inputs).unwrap();
        assert_eq!(env.get("env"), Some(&VarValue::Str("prod".to_string())));
    }

    #[test]
    fn falls_back_to_default() {
        let specs = vec![spec("retries", VarType::Int, Some(serde_json::json!(3)))];
        let env = bind_vars(&specs, &BTreeMap::new()).unwrap();
        assert_eq!(env.get("retries"), Some(&VarValue::Int(3)));
    }

    #[test]
    fn missing_required_var_fails() {
        let specs = vec![spec("env", VarType::Str, None)];
        assert!(matches!(
            bind_vars(&specs, &BTreeMap::new()),
            Err(CompileError::MissingVar(name)) if name == "env"
        ));
    }

    #[test]
    fn type_mismatch_fails() {
        let specs = vec![spec("count", VarType::Int, None)];
        let mut inputs = BTreeMap::new();
        inputs.insert("count".to_string(), serde_json::json!("not-a-number"));
        assert!(matches!(
            bind_vars(&specs, &inputs),
            Err(CompileError::VarTypeMismatch { .. })
        ));
    }
}
