use serde_json::{Map, Value};

use crate::schema::{Descriptor, Kind};

/// Fills declared array fields with `[]` and object fields with `{}` when they are
/// missing or null, and absent fields with their schema default. Scalars are left alone.
pub fn normalize(value: &mut Value, descriptor: &Descriptor) {
    match (&descriptor.kind, value) {
        (Kind::Object(shape), Value::Object(object)) => {
            for field in &shape.fields {
                let slot = object.get(&field.name);
                let replacement = match (&field.descriptor.kind, slot) {
                    (Kind::Array(_), None | Some(Value::Null)) => Some(Value::Array(Vec::new())),
                    (Kind::Object(_), None | Some(Value::Null)) => Some(Value::Object(Map::new())),
                    (_, None) => field.descriptor.default.clone(),
                    _ => None,
                };
                if let Some(replacement) = replacement {
                    object.insert(field.name.clone(), replacement);
                }
                if let Some(child) = object.get_mut(&field.name) {
                    normalize(child, &field.descriptor);
                }
            }
        }
        (Kind::Array(item), Value::Array(items)) => {
            for element in items {
                normalize(element, item);
            }
        }
        _ => {}
    }
}
