use serde_json::{Map, Value};

use crate::error::AdapterError;

pub const DEFAULT_TITLE: &str = "OutputModel";

const DEFINITION_KEYS: [&str; 2] = ["$defs", "definitions"];
const PROPERTY_MAPS: [&str; 2] = ["properties", "patternProperties"];
const DATA_KEYWORDS: [&str; 4] = ["enum", "const", "default", "examples"];

/// Resolves an output schema: inlines every local `$ref`, drops definition
/// sections and gives the root a title.
///
/// Resolving an already resolved schema returns it unchanged.
///
/// # Errors
/// See [`resolve_refs`].
pub fn resolve(schema: &Value) -> Result<Value, AdapterError> {
    let mut resolved = resolve_refs(schema)?;
    if let Value::Object(map) = &mut resolved {
        map.entry("title")
            .or_insert_with(|| Value::String(DEFAULT_TITLE.to_string()));
    }
    Ok(resolved)
}

/// Inlines every local `$ref` and drops definition sections, leaving the title alone.
///
/// # Errors
/// [`AdapterError::CyclicSchema`] when a reference reappears while it is being
/// expanded, [`AdapterError::UnresolvedReference`] when a reference is not a local
/// pointer to an object schema.
pub fn resolve_refs(schema: &Value) -> Result<Value, AdapterError> {
    let mut walker = Walker {
        root: schema,
        active: Vec::new(),
    };
    walker.walk(schema)
}

struct Walker<'a> {
    root: &'a Value,
    active: Vec<String>,
}

impl<'a> Walker<'a> {
    fn lookup(&self, reference: &str) -> Option<&'a Map<String, Value>> {
        reference
            .strip_prefix('#')
            .and_then(|pointer| self.root.pointer(pointer))
            .and_then(Value::as_object)
    }

    fn walk(&mut self, node: &Value) -> Result<Value, AdapterError> {
        match node {
            Value::Object(map) => match map.get("$ref").and_then(Value::as_str) {
                Some(reference) => self.expand(reference, map),
                None => self.walk_schema(map),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.walk(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(node.clone()),
        }
    }

    fn expand(&mut self, reference: &str, node: &Map<String, Value>) -> Result<Value, AdapterError> {
        if self.active.iter().any(|active| active == reference) {
            return Err(AdapterError::CyclicSchema {
                reference: reference.to_string(),
                schema: self.root.clone(),
            });
        }
        let target = self
            .lookup(reference)
            .ok_or_else(|| AdapterError::UnresolvedReference {
                reference: reference.to_string(),
                schema: self.root.clone(),
            })?;

        // keywords next to the $ref win over the referenced body
        let merged: Map<String, Value> = target
            .iter()
            .chain(node.iter().filter(|(key, _)| *key != "$ref"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.active.push(reference.to_string());
        let expanded = self.walk(&Value::Object(merged));
        self.active.pop();
        expanded
    }

    fn walk_schema(&mut self, map: &Map<String, Value>) -> Result<Value, AdapterError> {
        let mut out = Map::new();
        for (key, value) in map {
            let key_str = key.as_str();
            if DEFINITION_KEYS.contains(&key_str) {
                continue;
            }
            let walked = if DATA_KEYWORDS.contains(&key_str) {
                value.clone()
            } else if PROPERTY_MAPS.contains(&key_str) {
                self.walk_property_map(value)?
            } else {
                self.walk(value)?
            };
            out.insert(key.clone(), walked);
        }
        collapse_all_of(&mut out);
        Ok(Value::Object(out))
    }

    fn walk_property_map(&mut self, value: &Value) -> Result<Value, AdapterError> {
        match value {
            Value::Object(properties) => properties
                .iter()
                .map(|(name, schema)| Ok((name.clone(), self.walk(schema)?)))
                .collect::<Result<Map<_, _>, AdapterError>>()
                .map(Value::Object),
            other => self.walk(other),
        }
    }
}

fn collapse_all_of(schema: &mut Map<String, Value>) {
    let Some(members) = schema.get("allOf").and_then(Value::as_array) else {
        return;
    };
    if !members.iter().all(Value::is_object) {
        return;
    }
    let members = members.clone();
    schema.remove("allOf");

    for member in members.iter().filter_map(Value::as_object) {
        for (key, value) in member {
            match (key.as_str(), value) {
                ("properties", Value::Object(properties)) => {
                    if let Some(existing) = schema
                        .entry("properties")
                        .or_insert_with(|| Value::Object(Map::new()))
                        .as_object_mut()
                    {
                        for (name, property) in properties {
                            existing.entry(name.clone()).or_insert_with(|| property.clone());
                        }
                    }
                }
                ("required", Value::Array(required)) => {
                    if let Some(existing) = schema
                        .entry("required")
                        .or_insert_with(|| Value::Array(Vec::new()))
                        .as_array_mut()
                    {
                        for name in required {
                            if !existing.contains(name) {
                                existing.push(name.clone());
                            }
                        }
                    }
                }
                _ => {
                    schema.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }

    if schema.contains_key("properties") {
        schema
            .entry("type")
            .or_insert_with(|| Value::String("object".to_string()));
    }
}
