use serde_json::Value;

use super::resolve::DEFAULT_TITLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Scalar(ScalarKind),
    Enum(Vec<Value>),
    Array(Box<Descriptor>),
    Object(ObjectShape),
    Union(Vec<Descriptor>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub kind: Kind,
    pub constraints: Constraints,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectShape {
    pub fields: Vec<Field>,
    pub additional: Option<Box<Descriptor>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: Descriptor,
    pub required: bool,
}

/// The runtime type a structured reply is checked against. Built per request.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicTypeDescriptor {
    pub name: String,
    pub root: Descriptor,
}

impl Descriptor {
    #[must_use]
    pub fn any() -> Self {
        Self {
            kind: Kind::Scalar(ScalarKind::Any),
            constraints: Constraints::default(),
            default: None,
        }
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, Kind::Array(_))
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.kind, Kind::Object(_))
    }

    /// Whether `null` is an acceptable value.
    #[must_use]
    pub fn accepts_null(&self) -> bool {
        match &self.kind {
            Kind::Scalar(ScalarKind::Null | ScalarKind::Any) => true,
            Kind::Enum(values) => values.contains(&Value::Null),
            Kind::Union(variants) => variants.iter().any(Descriptor::accepts_null),
            _ => false,
        }
    }
}

impl ObjectShape {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Builds the descriptor for an already resolved schema.
///
/// Unknown keywords are ignored and unknown types accept any value.
#[must_use]
pub fn describe(schema: &Value) -> DynamicTypeDescriptor {
    let name = schema
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    DynamicTypeDescriptor {
        name,
        root: describe_node(schema),
    }
}

fn describe_node(schema: &Value) -> Descriptor {
    let Value::Object(map) = schema else {
        return Descriptor::any();
    };

    let kind = if let Some(values) = map.get("enum").and_then(Value::as_array) {
        Kind::Enum(values.clone())
    } else if let Some(value) = map.get("const") {
        Kind::Enum(vec![value.clone()])
    } else if let Some(variants) = map
        .get("anyOf")
        .or_else(|| map.get("oneOf"))
        .and_then(Value::as_array)
    {
        Kind::Union(variants.iter().map(describe_node).collect())
    } else {
        match map.get("type") {
            Some(Value::String(name)) => kind_for(name, schema),
            Some(Value::Array(names)) => Kind::Union(
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|name| Descriptor {
                        kind: kind_for(name, schema),
                        constraints: constraints(schema),
                        default: None,
                    })
                    .collect(),
            ),
            _ if map.contains_key("properties") => kind_for("object", schema),
            _ if map.contains_key("items") => kind_for("array", schema),
            _ => Kind::Scalar(ScalarKind::Any),
        }
    };

    Descriptor {
        kind,
        constraints: constraints(schema),
        default: map.get("default").cloned(),
    }
}

fn kind_for(type_name: &str, schema: &Value) -> Kind {
    match type_name {
        "string" => Kind::Scalar(ScalarKind::String),
        "integer" => Kind::Scalar(ScalarKind::Integer),
        "number" => Kind::Scalar(ScalarKind::Number),
        "boolean" => Kind::Scalar(ScalarKind::Boolean),
        "null" => Kind::Scalar(ScalarKind::Null),
        "array" => Kind::Array(Box::new(
            schema.get("items").map_or_else(Descriptor::any, describe_node),
        )),
        "object" => Kind::Object(object_shape(schema)),
        _ => Kind::Scalar(ScalarKind::Any),
    }
}

fn object_shape(schema: &Value) -> ObjectShape {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let fields = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| Field {
                    name: name.clone(),
                    descriptor: describe_node(property),
                    required: required.contains(&name.as_str()),
                })
                .collect()
        })
        .unwrap_or_default();

    let additional = schema
        .get("additionalProperties")
        .filter(|value| value.is_object())
        .map(|value| Box::new(describe_node(value)));

    ObjectShape { fields, additional }
}

fn constraints(schema: &Value) -> Constraints {
    let number = |key: &str| schema.get(key).and_then(Value::as_f64);
    let count = |key: &str| {
        schema
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    };
    Constraints {
        minimum: number("minimum"),
        maximum: number("maximum"),
        exclusive_minimum: number("exclusiveMinimum"),
        exclusive_maximum: number("exclusiveMaximum"),
        min_length: count("minLength"),
        max_length: count("maxLength"),
        pattern: schema
            .get("pattern")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        min_items: count("minItems"),
        max_items: count("maxItems"),
    }
}
