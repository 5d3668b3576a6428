//! Template-with-override composition for job descriptors.
//!
//! YAML anchors (`&name`) and aliases (`*name`) are expanded by the parser into
//! plain copies. The merge key `<<` is not: it survives as an ordinary mapping
//! entry whose value is the copied base. [`resolve`] turns such a mapping into a
//! fully expanded one.

use serde_yaml::{Mapping, Value};

use crate::error::ParseError;

pub const MERGE_KEY: &str = "<<";

/// Shallow merge: every key of `overrides` replaces the same key in `base`.
/// Key order is base order, then new keys in override order.
pub fn merge(base: &Mapping, overrides: &Mapping) -> Mapping {
    let mut out = base.clone();
    for (k, v) in overrides {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Expand the `<<` entry of `mapping`, if any.
///
/// `<<` may hold one mapping or a sequence of mappings. Keys written on the
/// mapping itself win over merged keys; within a sequence, earlier bases win
/// over later ones. Bases are resolved recursively, so a template may itself
/// be built from another template.
pub fn resolve(mapping: &Mapping, location: &str) -> Result<Mapping, ParseError> {
    let merge_key = Value::String(MERGE_KEY.to_string());
    let Some(merge_value) = mapping.get(&merge_key) else {
        return Ok(mapping.clone());
    };

    let bases = collect_bases(merge_value, location)?;

    let mut inherited = Mapping::new();
    for base in bases.iter().rev() {
        let base = resolve(base, location)?;
        inherited = merge(&inherited, &base);
    }

    let explicit: Mapping = mapping
        .iter()
        .filter(|(k, _)| **k != merge_key)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(merge(&inherited, &explicit))
}

fn collect_bases<'a>(value: &'a Value, location: &str) -> Result<Vec<&'a Mapping>, ParseError> {
    match value {
        Value::Mapping(m) => Ok(vec![m]),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Mapping(m) => Ok(m),
                other => Err(ParseError::MalformedMerge {
                    location: location.to_string(),
                    reason: format!("merge entry {} is {}, expected a mapping", i + 1, kind(other)),
                }),
            })
            .collect(),
        other => Err(ParseError::MalformedMerge {
            location: location.to_string(),
            reason: format!("'<<' holds {}, expected a mapping or a list of mappings", kind(other)),
        }),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
