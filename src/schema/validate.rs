use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

use super::descriptor::{Constraints, Descriptor, Kind, ObjectShape, ScalarKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the offending field, empty for the root value.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Checks `value` against `descriptor` and returns every violation found.
#[must_use]
pub fn validate(value: &Value, descriptor: &Descriptor) -> Vec<Violation> {
    let mut checker = Checker::default();
    checker.check(value, descriptor, "");
    checker.violations
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn report(&mut self, path: &str, message: String) {
        self.violations.push(Violation {
            path: path.to_string(),
            message,
        });
    }

    fn mismatch(&mut self, path: &str, expected: &str, value: &Value) {
        self.report(path, format!("expected {expected}, got {}", type_name(value)));
    }

    fn check(&mut self, value: &Value, descriptor: &Descriptor, path: &str) {
        let constraints = &descriptor.constraints;
        match &descriptor.kind {
            Kind::Scalar(ScalarKind::Any) => {}
            Kind::Scalar(ScalarKind::Null) => {
                if !value.is_null() {
                    self.mismatch(path, "null", value);
                }
            }
            Kind::Scalar(ScalarKind::Boolean) => {
                if !value.is_boolean() {
                    self.mismatch(path, "boolean", value);
                }
            }
            Kind::Scalar(ScalarKind::String) => match value.as_str() {
                Some(text) => self.check_string(text, constraints, path),
                None => self.mismatch(path, "string", value),
            },
            Kind::Scalar(ScalarKind::Integer) => match value.as_f64() {
                Some(number) if is_integer(value) => self.check_number(number, constraints, path),
                _ => self.mismatch(path, "integer", value),
            },
            Kind::Scalar(ScalarKind::Number) => match value.as_f64() {
                Some(number) => self.check_number(number, constraints, path),
                None => self.mismatch(path, "number", value),
            },
            Kind::Enum(allowed) => {
                if !allowed.contains(value) {
                    let options = allowed
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.report(path, format!("expected one of [{options}], got {value}"));
                }
            }
            Kind::Union(variants) => {
                if !variants.iter().any(|variant| validate(value, variant).is_empty()) {
                    self.report(
                        path,
                        format!(
                            "{} does not match any of {} allowed variants",
                            type_name(value),
                            variants.len()
                        ),
                    );
                }
            }
            Kind::Array(item) => match value.as_array() {
                Some(items) => {
                    if let Some(min) = constraints.min_items
                        && items.len() < min
                    {
                        self.report(path, format!("expected at least {min} items, got {}", items.len()));
                    }
                    if let Some(max) = constraints.max_items
                        && items.len() > max
                    {
                        self.report(path, format!("expected at most {max} items, got {}", items.len()));
                    }
                    for (index, element) in items.iter().enumerate() {
                        self.check(element, item, &format!("{path}[{index}]"));
                    }
                }
                None => self.mismatch(path, "array", value),
            },
            Kind::Object(shape) => match value.as_object() {
                Some(object) => self.check_object(object, shape, path),
                None => self.mismatch(path, "object", value),
            },
        }
    }

    fn check_object(&mut self, object: &Map<String, Value>, shape: &ObjectShape, path: &str) {
        for field in &shape.fields {
            let field_path = join(path, &field.name);
            match object.get(&field.name) {
                None if field.required => {
                    self.report(&field_path, "missing required field".to_string());
                }
                None => {}
                Some(Value::Null) if !field.required => {}
                Some(value) => self.check(value, &field.descriptor, &field_path),
            }
        }

        if let Some(additional) = &shape.additional {
            for (key, value) in object {
                if shape.field(key).is_none() {
                    self.check(value, additional, &join(path, key));
                }
            }
        }
    }

    fn check_string(&mut self, text: &str, constraints: &Constraints, path: &str) {
        let length = text.chars().count();
        if let Some(min) = constraints.min_length
            && length < min
        {
            self.report(path, format!("expected at least {min} characters, got {length}"));
        }
        if let Some(max) = constraints.max_length
            && length > max
        {
            self.report(path, format!("expected at most {max} characters, got {length}"));
        }
        if let Some(pattern) = &constraints.pattern
            && let Ok(regex) = Regex::new(pattern)
            && !regex.is_match(text)
        {
            self.report(path, format!("does not match pattern {pattern}"));
        }
    }

    fn check_number(&mut self, number: f64, constraints: &Constraints, path: &str) {
        if let Some(min) = constraints.minimum
            && number < min
        {
            self.report(path, format!("must be >= {min}, got {number}"));
        }
        if let Some(max) = constraints.maximum
            && number > max
        {
            self.report(path, format!("must be <= {max}, got {number}"));
        }
        if let Some(min) = constraints.exclusive_minimum
            && number <= min
        {
            self.report(path, format!("must be > {min}, got {number}"));
        }
        if let Some(max) = constraints.exclusive_maximum
            && number >= max
        {
            self.report(path, format!("must be < {max}, got {number}"));
        }
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64()
        || value.is_u64()
        || value
            .as_f64()
            .is_some_and(|n| n.fract().abs() < f64::EPSILON)
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
