//! Typed view over JSON Schema documents.
//!
//! Raw `serde_json::Value` trees are parsed once into [`SchemaNode`], a closed
//! union with one variant per keyword family, so the generator can dispatch
//! exhaustively. Parsing is lenient about unusual constraint combinations and
//! strict only about structure (non-object nodes, malformed `type`, external
//! `$ref`s).

use serde_json::{Map, Value};

use super::error::{MockError, MockResult};

/// Keywords that give a node a shape. A root without any of the first five is
/// rejected; the rest only matter when inferring an omitted `type`.
const ROOT_KEYWORDS: [&str; 5] = ["type", "$ref", "oneOf", "anyOf", "allOf"];
const SHAPE_KEYWORDS: [&str; 17] = [
    "type",
    "$ref",
    "oneOf",
    "anyOf",
    "allOf",
    "enum",
    "const",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "prefixItems",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "minimum",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl SchemaType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    /// Whether `value` has this JSON type. Whole floats count as integers.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }
}

/// One side of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringSchema {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub integer: bool,
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItems {
    Single(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub items: ArrayItems,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum AdditionalProperties {
    /// Keyword absent: nothing beyond declared properties is synthesized.
    #[default]
    Unspecified,
    Forbidden,
    /// `additionalProperties: true`
    Untyped,
    Typed(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    /// Declared properties in document order.
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    pub additional: AdditionalProperties,
}

impl ObjectSchema {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Internal pointer (`#/...`), resolved lazily against the root document.
    Ref(String),
    OneOf(Vec<SchemaNode>),
    AnyOf(Vec<SchemaNode>),
    /// Members are merged before generation; sibling keywords of the
    /// `allOf` node become the first member.
    AllOf(Vec<SchemaNode>),
    /// `type` given as a set of names; one candidate is chosen per value.
    Choice(Vec<SchemaNode>),
    Enum(Vec<Value>),
    String(StringSchema),
    Number(NumberSchema),
    Boolean,
    Array(ArraySchema),
    Object(ObjectSchema),
    Null,
    Any,
}

impl SchemaNode {
    /// Parse a document root. Besides being well formed, a root must declare
    /// a `type`, a `$ref` or a composition keyword.
    pub fn parse_root(value: &Value) -> MockResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            MockError::SchemaParse(format!(
                "schema root must be an object, found {}",
                json_kind(value)
            ))
        })?;
        if !ROOT_KEYWORDS.iter().any(|k| obj.contains_key(*k)) {
            return Err(MockError::SchemaParse(
                "schema root declares no type, $ref or composition keyword".to_string(),
            ));
        }
        Self::parse_object(obj)
    }

    pub fn parse(value: &Value) -> MockResult<Self> {
        match value {
            Value::Bool(_) => Ok(Self::Any),
            Value::Object(obj) => Self::parse_object(obj),
            other => Err(MockError::SchemaParse(format!(
                "expected a schema object, found {}",
                json_kind(other)
            ))),
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> MockResult<Self> {
        if let Some(reference) = obj.get("$ref") {
            let pointer = reference
                .as_str()
                .ok_or_else(|| MockError::SchemaParse("$ref must be a string".to_string()))?;
            if !pointer.starts_with('#') {
                return Err(MockError::schema_ref(
                    pointer,
                    "only internal '#/...' references are supported",
                ));
            }
            return Ok(Self::Ref(pointer.to_string()));
        }

        if let Some(members) = non_empty_array(obj, "allOf") {
            let mut siblings = obj.clone();
            siblings.remove("allOf");
            let mut nodes = Vec::with_capacity(members.len() + 1);
            if has_shape(&siblings) {
                nodes.push(Self::parse_object(&siblings)?);
            }
            for member in members {
                nodes.push(Self::parse(member)?);
            }
            return Ok(Self::AllOf(nodes));
        }
        if let Some(alternatives) = non_empty_array(obj, "oneOf") {
            return Ok(Self::OneOf(parse_all(alternatives)?));
        }
        if let Some(alternatives) = non_empty_array(obj, "anyOf") {
            return Ok(Self::AnyOf(parse_all(alternatives)?));
        }

        if let Some(values) = non_empty_array(obj, "enum") {
            return Ok(Self::Enum(values.clone()));
        }
        if let Some(constant) = obj.get("const") {
            return Ok(Self::Enum(vec![constant.clone()]));
        }

        match obj.get("type") {
            Some(Value::String(name)) => Self::parse_typed(obj, type_name(name)?),
            Some(Value::Array(names)) => {
                let mut candidates = names
                    .iter()
                    .map(|name| {
                        let name = name.as_str().ok_or_else(|| {
                            MockError::SchemaParse("type entries must be strings".to_string())
                        })?;
                        Self::parse_typed(obj, type_name(name)?)
                    })
                    .collect::<MockResult<Vec<_>>>()?;
                match candidates.len() {
                    0 => Ok(Self::Any),
                    1 => Ok(candidates.remove(0)),
                    _ => Ok(Self::Choice(candidates)),
                }
            }
            Some(other) => Err(MockError::SchemaParse(format!(
                "type must be a string or an array of strings, found {}",
                json_kind(other)
            ))),
            None => match infer_type(obj) {
                Some(ty) => Self::parse_typed(obj, ty),
                None => Ok(Self::Any),
            },
        }
    }

    fn parse_typed(obj: &Map<String, Value>, ty: SchemaType) -> MockResult<Self> {
        let node = match ty {
            SchemaType::String => Self::String(StringSchema {
                min_length: read_usize(obj, "minLength"),
                max_length: read_usize(obj, "maxLength"),
                pattern: read_string(obj, "pattern"),
                format: read_string(obj, "format"),
            }),
            SchemaType::Number | SchemaType::Integer => Self::Number(NumberSchema {
                integer: ty == SchemaType::Integer,
                lower: read_bound(obj, "minimum", "exclusiveMinimum"),
                upper: read_bound(obj, "maximum", "exclusiveMaximum"),
                multiple_of: obj
                    .get("multipleOf")
                    .and_then(Value::as_f64)
                    .filter(|m| *m > 0.0),
            }),
            SchemaType::Boolean => Self::Boolean,
            SchemaType::Null => Self::Null,
            SchemaType::Array => {
                let items = match (obj.get("prefixItems"), obj.get("items")) {
                    (Some(Value::Array(tuple)), _) | (None, Some(Value::Array(tuple))) => {
                        ArrayItems::Tuple(parse_all(tuple)?)
                    }
                    (_, Some(single)) => ArrayItems::Single(Box::new(Self::parse(single)?)),
                    _ => ArrayItems::Unspecified,
                };
                Self::Array(ArraySchema {
                    items,
                    min_items: read_usize(obj, "minItems"),
                    max_items: read_usize(obj, "maxItems"),
                })
            }
            SchemaType::Object => {
                let mut properties = Vec::new();
                if let Some(declared) = obj.get("properties").and_then(Value::as_object) {
                    for (name, schema) in declared {
                        let node = Self::parse(schema).map_err(|e| match e {
                            MockError::SchemaParse(msg) => {
                                MockError::SchemaParse(format!("property '{}': {}", name, msg))
                            }
                            other => other,
                        })?;
                        properties.push((name.clone(), node));
                    }
                }
                let required = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let additional = match obj.get("additionalProperties") {
                    Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
                    Some(Value::Bool(true)) => AdditionalProperties::Untyped,
                    Some(schema @ Value::Object(_)) => {
                        AdditionalProperties::Typed(Box::new(Self::parse(schema)?))
                    }
                    _ => AdditionalProperties::Unspecified,
                };
                Self::Object(ObjectSchema {
                    properties,
                    required,
                    additional,
                })
            }
        };
        Ok(node)
    }
}

/// Resolve an internal JSON pointer (`#`, `#/definitions/User`, ...) against
/// `root`. The target has to be a schema (object or boolean).
pub fn resolve_ref<'a>(root: &'a Value, pointer: &str) -> MockResult<&'a Value> {
    let fragment = pointer.strip_prefix('#').ok_or_else(|| {
        MockError::schema_ref(pointer, "only internal '#/...' references are supported")
    })?;
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(MockError::schema_ref(pointer, "anchor references are not supported"));
    }

    let mut current = root;
    for raw in fragment.split('/').skip(1) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| {
            MockError::schema_ref(pointer, format!("missing path segment '{}'", segment))
        })?;
    }

    match current {
        Value::Object(_) | Value::Bool(_) => Ok(current),
        other => Err(MockError::schema_ref(
            pointer,
            format!("target is {}, not a schema", json_kind(other)),
        )),
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn type_name(name: &str) -> MockResult<SchemaType> {
    SchemaType::parse(name)
        .ok_or_else(|| MockError::SchemaParse(format!("unknown type '{}'", name)))
}

fn infer_type(obj: &Map<String, Value>) -> Option<SchemaType> {
    let has = |keys: &[&str]| keys.iter().any(|k| obj.contains_key(*k));
    if has(&["properties", "required", "additionalProperties"]) {
        Some(SchemaType::Object)
    } else if has(&["items", "prefixItems", "minItems", "maxItems"]) {
        Some(SchemaType::Array)
    } else if has(&["minLength", "maxLength", "pattern", "format"]) {
        Some(SchemaType::String)
    } else if has(&["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"]) {
        Some(SchemaType::Number)
    } else {
        None
    }
}

fn has_shape(obj: &Map<String, Value>) -> bool {
    SHAPE_KEYWORDS.iter().any(|k| obj.contains_key(*k)) || infer_type(obj).is_some()
}

fn non_empty_array<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    obj.get(key).and_then(Value::as_array).filter(|a| !a.is_empty())
}

fn parse_all(values: &[Value]) -> MockResult<Vec<SchemaNode>> {
    values.iter().map(SchemaNode::parse).collect()
}

fn read_usize(obj: &Map<String, Value>, key: &str) -> Option<usize> {
    obj.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

fn read_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn read_bound(obj: &Map<String, Value>, inclusive_key: &str, exclusive_key: &str) -> Option<Bound> {
    let inclusive = obj.get(inclusive_key).and_then(Value::as_f64);
    match obj.get(exclusive_key) {
        // draft-04 style: boolean flag modifying the inclusive bound
        Some(Value::Bool(true)) => inclusive.map(|value| Bound {
            value,
            exclusive: true,
        }),
        Some(Value::Number(n)) => n.as_f64().map(|value| Bound {
            value,
            exclusive: true,
        }),
        _ => inclusive.map(|value| Bound {
            value,
            exclusive: false,
        }),
    }
}
