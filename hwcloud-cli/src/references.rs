//! `${type.name.attr}` references between blocks
//!
//! A string that is exactly one reference takes the referenced value with its JSON type;
//! references embedded in longer strings are interpolated as text.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use anyhow::{Result, bail};
use hwcloud_provider::types::{ResourceMode, StateFile};
use regex::Regex;
use serde_json::{Map, Value};

use crate::configuration::Block;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{((?:data\.)?[A-Za-z0-9_]+\.[A-Za-z0-9_-]+)\.([A-Za-z0-9_.]+)\}")
        .unwrap_or_else(|e| unreachable!("invalid reference pattern: {e}"))
});

/// Addresses referenced anywhere inside `value`.
pub fn referenced_addresses(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect(value, &mut out);
    out
}

fn collect(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in REFERENCE.captures_iter(s) {
                out.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        _ => {}
    }
}

fn block_dependencies(block: &Block) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    block.body.values().for_each(|v| collect(v, &mut out));
    out
}

/// Blocks in dependency order: every block comes after the blocks it references.
///
/// References to addresses that are not declared are left for resolution to report.
/// Cycles are an error.
pub fn order_blocks(blocks: &[Block]) -> Result<Vec<&Block>> {
    let by_address: HashMap<String, &Block> = blocks.iter().map(|b| (b.address(), b)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        block: &'a Block,
        by_address: &HashMap<String, &'a Block>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
        sorted: &mut Vec<&'a Block>,
    ) -> Result<()> {
        let address = block.address();
        match marks.get(&address) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|a| *a == address).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(address);
                bail!("reference cycle: {}", cycle.join(" -> "));
            }
            None => {}
        }

        marks.insert(address.clone(), Mark::Visiting);
        path.push(address.clone());
        for dep in block_dependencies(block) {
            if let Some(dep_block) = by_address.get(&dep) {
                visit(dep_block, by_address, marks, path, sorted)?;
            }
        }
        path.pop();
        marks.insert(address, Mark::Done);
        sorted.push(block);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut sorted = Vec::with_capacity(blocks.len());
    for block in blocks {
        visit(block, &by_address, &mut marks, &mut Vec::new(), &mut sorted)?;
    }
    Ok(sorted)
}

fn lookup(state: &StateFile, address: &str, attr_path: &str) -> Option<Value> {
    let (mode, rest) = match address.strip_prefix("data.") {
        Some(rest) => (ResourceMode::Data, rest),
        None => (ResourceMode::Managed, address),
    };
    let (type_name, name) = rest.split_once('.')?;
    let resource = state.find(mode, type_name, name)?;

    let mut parts = attr_path.split('.');
    let mut current = resource.attribute(parts.next()?)?;
    for part in parts {
        current = match (&current, part.parse::<usize>()) {
            (Value::Array(items), Ok(i)) => items.get(i)?.clone(),
            (Value::Object(map), _) => map.get(part)?.clone(),
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every reference in `body` with its value from `state`.
///
/// Returns the references that could not be resolved instead, e.g. because the
/// referenced resource has not been created yet.
pub fn resolve(body: &Map<String, Value>, state: &StateFile) -> Result<Map<String, Value>, Vec<String>> {
    let mut unknown = Vec::new();
    let resolved = body
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, state, &mut unknown)))
        .collect();
    if unknown.is_empty() { Ok(resolved) } else { Err(unknown) }
}

fn resolve_value(value: &Value, state: &StateFile, unknown: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, state, unknown),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, state, unknown)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, state, unknown)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, state: &StateFile, unknown: &mut Vec<String>) -> Value {
    if let Some(caps) = REFERENCE.captures(s)
        && caps.get(0).is_some_and(|m| m.len() == s.len())
    {
        return match lookup(state, &caps[1], &caps[2]) {
            Some(v) => v,
            None => {
                unknown.push(s.to_string());
                Value::Null
            }
        };
    }

    let replaced = REFERENCE.replace_all(s, |caps: &regex::Captures| match lookup(state, &caps[1], &caps[2]) {
        Some(v) => as_text(&v),
        None => {
            unknown.push(caps[0].to_string());
            String::new()
        }
    });
    Value::String(replaced.into_owned())
}
