//! Recursive key rewriting between application and wire conventions

use std::collections::BTreeMap;

use crate::value::{Form, Value};

/// Field-naming convention on one side of the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseConvention {
    /// camelCase, used by application code
    Application,
    /// snake_case, used on the wire
    Wire,
}

impl CaseConvention {
    /// Rewrite a single key into this convention.
    pub fn convert_key(self, key: &str) -> String {
        match self {
            CaseConvention::Application => snake_to_camel(key),
            CaseConvention::Wire => camel_to_snake(key),
        }
    }
}

/// Rewrite every mapping key to snake_case.
pub fn to_wire(value: Value) -> Value {
    convert(value, CaseConvention::Wire)
}

/// Rewrite every mapping key to camelCase.
pub fn to_application(value: Value) -> Value {
    convert(value, CaseConvention::Application)
}

/// Rewrite every mapping key to `target`, recursing through objects and
/// arrays. Scalars and `Value::Opaque` are returned as-is.
pub fn convert(value: Value, target: CaseConvention) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (target.convert_key(&k), convert(v, target)))
                .collect::<BTreeMap<_, _>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| convert(v, target)).collect())
        }
        other => other,
    }
}

/// Rewrite multipart field names to snake_case. Text values and file
/// contents are untouched.
pub fn form_to_wire(form: Form) -> Form {
    Form {
        fields: form
            .fields
            .into_iter()
            .map(|(name, part)| (camel_to_snake(&name), part))
            .collect(),
    }
}

/// `firstName` -> `first_name`. A leading capital is lowercased without
/// an underscore.
fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `first_name` -> `firstName`. Only an underscore followed by a lowercase
/// letter is folded, so `_id`, `line_2` and `a__b` keep their underscores
/// where no letter follows.
fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_'
            && !out.is_empty()
            && let Some(&next) = chars.peek()
            && next.is_lowercase()
        {
            chars.next();
            out.extend(next.to_uppercase());
            continue;
        }
        out.push(c);
    }
    out
}
