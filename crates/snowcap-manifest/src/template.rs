use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CompileError;
use crate::vars::{VarValue, VarsEnv};

lazy_static! {
    static ref EXPR_RE: Regex = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap();
}

/// Interpolate `{{ var.X }}` / `{{ each.value }}` / `{{ each.value.field }}`
/// expressions in `input`, with pipe filters `upper`, `lower`,
/// `replace:old,new`, `split:sep`, `default:value`, `get:field` (spec.md
/// §4.3 step 3, §6.1's "Variable interpolation syntax"). `each` is `None`
/// outside a `for_each` expansion.
pub fn interpolate(
    input: &str,
    vars: &VarsEnv,
    each: Option<&VarValue>,
    context: &str,
) -> Result<String, CompileError> {
    let mut err = None;
    let result = EXPR_RE.replace_all(input, |caps: &regex::Captures| {
        match eval_expr(&caps[1], vars, each) {
            Ok(v) => v,
            Err(e) => {
                err.get_or_insert(e);
                String::new()
            }
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    Ok(result.into_owned())
}

/// Coerce an interpolated string into an integer when the target field is
/// declared as an integer attribute (spec.md §4.3 step 3: "integer fields
/// coerced").
pub fn coerce_int(s: &str, context: &str) -> Result<i64, CompileError> {
    s.trim().parse::<i64>().map_err(|_| CompileError::Template {
        context: context.to_string(),
        reason: format!("cannot coerce {s:?} to an integer"),
    })
}

fn eval_expr(expr: &str, vars: &VarsEnv, each: Option<&VarValue>) -> Result<String, CompileError> {
    let mut parts = expr.split('|').map(str::trim);
    let path = parts.next().unwrap_or("");

    let mut value = resolve_path(path, vars, each);

    for filter in parts {
        value = apply_filter(value, filter, path)?;
    }

    Ok(match value {
        Some(v) => v.render(),
        None => String::new(),
    })
}

fn resolve_path(path: &str, vars: &VarsEnv, each: Option<&VarValue>) -> Option<VarValue> {
    if let Some(name) = path.strip_prefix("var.") {
        return vars.get(name).cloned();
    }
    if let Some(rest) = path.strip_prefix("each.value") {
        let rest = rest.trim_start_matches('.');
        let base = each?;
        if rest.is_empty() {
            return Some(base.clone());
        }
        return base.get_field(rest).cloned();
    }
    None
}

fn apply_filter(value: Option<VarValue>, filter: &str, path: &str) -> Result<Option<VarValue>, CompileError> {
    let (name, arg) = match filter.split_once(':') {
        Some((n, a)) => (n.trim(), Some(a.trim())),
        None => (filter.trim(), None),
    };

    match name {
        "upper" => Ok(value.map(|v| VarValue::Str(v.render().to_uppercase()))),
        "lower" => Ok(value.map(|v| VarValue::Str(v.render().to_lowercase()))),
        "default" => match value {
            Some(v) => Ok(Some(v)),
            None => Ok(arg.map(|a| VarValue::Str(a.trim_matches('"').to_string()))),
        },
        "replace" => {
            let arg = arg.ok_or_else(|| CompileError::Template {
                context: path.to_string(),
                reason: "replace filter requires 'old,new' argument".to_string(),
            })?;
            let (old, new) = arg.split_once(',').ok_or_else(|| CompileError::Template {
                context: path.to_string(),
                reason: "replace filter requires 'old,new' argument".to_string(),
            })?;
            Ok(value.map(|v| VarValue::Str(v.render().replace(old, new))))
        }
        "split" => {
            let sep = arg.unwrap_or(",");
            Ok(value.map(|v| {
                VarValue::List(
                    v.render()
                        .split(sep)
                        .map(|s| VarValue::Str(s.to_string()))
                        .collect(),
                )
            }))
        }
        "get" => {
            let field = arg.ok_or_else(|| CompileError::Template {
                context: path.to_string(),
                reason: "get filter requires a field argument".to_string(),
            })?;
            Ok(value.and_then(|v| v.get_field(field).cloned()))
        }
        other => Err(CompileError::Template {
            context: path.to_string(),
            reason: format!("unknown filter {other:?}"),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    fn vars_with(name: &str, value: VarValue) -> VarsEnv {
        let mut env = BTreeMap::new();
        env.insert(name.to_string(), value);
        env
    }

    #[test]
    fn interpolates_var() {
        let vars = vars_with("env", VarValue::Str("prod".to_string()));
        let out = interpolate("db_{{ var.env }}", &vars, None, "test").unwrap();
        assert_eq!(out, "db_prod");
    }

    #[test]
    fn interpolates_each_value() {
        let each = VarValue::Str("west".to_string());
        let out = interpolate("region_{{ each.value }}", &BTreeMap::new(), Some(&each), "test").unwrap();
        assert_eq!(out, "region_west");
    }

    #[test]
    fn applies_upper_filter() {
        let vars = vars_with("env", VarValue::Str("prod".to_string()));
        let out = interpolate("{{ var.env | upper }}", &vars, None, "test").unwrap();
        assert_eq!(out, "PROD");
    }

    #[test]
    fn applies_default_filter_when_missing() {
        let out = interpolate("{{ var.missing | default:\"fallback\" }}", &BTreeMap::new(), None, "test").unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn unknown_filter_errors() {
        let vars = vars_with("env", VarValue::Str("prod".to_string()));
        assert!(interpolate("{{ var.env | bogus }}", &vars, None, "test").is_err());
    }

    #[test]
    fn coerces_integer() {
        assert_eq!(coerce_int("42", "test").unwrap(), 42);
        assert!(coerce_int("nope", "test").is_err());
    }
}
