use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::route_table::{resolve_shallow, RouteHandler};
use super::state_manager::{record_id_matches, ResourceStore};
use super::value_generator::ValueGenerator;
use crate::domain::schema::{json_kind, SchemaType};
use crate::domain::{GenerateOptions, MockError, MockRequest, MockResponse, MockResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOperation {
    List,
    Read,
    Create,
    /// Shallow merge for both PUT and PATCH.
    Update,
    Delete,
}

/// How new identifiers are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// One past the largest integer id in the store.
    Integer,
    Uuid,
}

impl IdKind {
    pub fn detect(record_schema: &Value, root: &Value) -> Self {
        let schema = resolve_shallow(record_schema, root);
        let id_type = schema
            .get("properties")
            .and_then(|props| props.get("id"))
            .map(|id| resolve_shallow(id, root))
            .and_then(|id| id.get("type"))
            .and_then(Value::as_str);
        match id_type {
            Some("integer") | Some("number") => Self::Integer,
            _ => Self::Uuid,
        }
    }
}

/// State shared by all CRUD handlers of one resource.
pub struct CrudResource {
    pub name: String,
    pub record_schema: Value,
    /// Set when the document root is an array schema; used for seeding.
    pub list_schema: Option<Value>,
    pub root: Arc<Value>,
    pub generator: Arc<ValueGenerator>,
    pub strict: bool,
    pub seed_count: usize,
    pub wrap: bool,
    pub id_kind: IdKind,
}

impl CrudResource {
    fn generate(&self, schema: &Value) -> MockResult<Value> {
        let options = GenerateOptions::uncached().strict(self.strict);
        self.generator.generate_in(schema, &self.root, &options)
    }

    fn seed(&self, records: &mut Vec<Value>) -> MockResult<()> {
        let generated = match &self.list_schema {
            Some(list) => match self.generate(list)? {
                Value::Array(items) => items,
                other => vec![other],
            },
            None => (0..self.seed_count)
                .map(|_| self.generate(&self.record_schema))
                .collect::<MockResult<Vec<_>>>()?,
        };
        debug!(resource = %self.name, count = generated.len(), "Seeding resource");
        for item in generated {
            let mut record = into_record(item);
            if record.get("id").map_or(true, Value::is_null) {
                record.insert("id".to_string(), self.next_id(records));
            }
            records.push(Value::Object(record));
        }
        Ok(())
    }

    fn next_id(&self, records: &[Value]) -> Value {
        match self.id_kind {
            IdKind::Integer => {
                let max = records
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0);
                match max.checked_add(1) {
                    Some(next) => json!(next),
                    // integer space exhausted by a client-supplied id
                    None => Value::String(self.generator.generate_id()),
                }
            }
            IdKind::Uuid => Value::String(self.generator.generate_id()),
        }
    }

    /// Path parameter converted to the id representation records use.
    fn typed_id(&self, id: &str) -> Value {
        match (self.id_kind, id.parse::<i64>()) {
            (IdKind::Integer, Ok(n)) => json!(n),
            _ => Value::String(id.to_string()),
        }
    }

    fn wrap(&self, payload: Value) -> Value {
        if self.wrap {
            json!({ "data": payload })
        } else {
            payload
        }
    }

    /// Strict-mode body check. `creating` additionally demands every
    /// required property other than `id`.
    fn check_body(&self, body: &Map<String, Value>, creating: bool) -> MockResult<()> {
        if !self.strict {
            return Ok(());
        }
        let schema = resolve_shallow(&self.record_schema, &self.root);

        if creating {
            let required = schema
                .get("required")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str);
            for name in required {
                if name != "id" && !body.contains_key(name) {
                    return Err(MockError::Validation(format!(
                        "missing required field '{}'",
                        name
                    )));
                }
            }
        }

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(());
        };
        for (name, value) in body {
            let Some(declared) = properties.get(name) else {
                continue;
            };
            let declared = resolve_shallow(declared, &self.root);
            let types: Vec<SchemaType> = match declared.get("type") {
                Some(Value::String(t)) => SchemaType::parse(t).into_iter().collect(),
                Some(Value::Array(ts)) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(SchemaType::parse)
                    .collect(),
                _ => continue,
            };
            if !types.is_empty() && !types.iter().any(|t| t.matches(value)) {
                let expected: Vec<&str> = types.iter().map(SchemaType::as_str).collect();
                return Err(MockError::Validation(format!(
                    "field '{}' must be {}, found {}",
                    name,
                    expected.join(" or "),
                    json_kind(value)
                )));
            }
        }
        Ok(())
    }
}

pub struct CrudHandler {
    operation: CrudOperation,
    resource: Arc<CrudResource>,
}

impl CrudHandler {
    pub fn new(operation: CrudOperation, resource: Arc<CrudResource>) -> Self {
        Self {
            operation,
            resource,
        }
    }

    pub fn operation(&self) -> CrudOperation {
        self.operation
    }

    async fn list(&self, store: &ResourceStore) -> MockResult<MockResponse> {
        let resource = &self.resource;
        let records = store
            .with_records(&resource.name, |records| {
                if records.is_empty() {
                    resource.seed(records)?;
                }
                Ok::<_, MockError>(records.clone())
            })
            .await?;

        let total = records.len();
        let body = if resource.wrap {
            json!({ "data": records, "total": total })
        } else {
            Value::Array(records)
        };
        Ok(MockResponse::ok(body).with_header("X-Total-Count", total.to_string()))
    }

    async fn read(&self, id: &str, store: &ResourceStore) -> MockResult<MockResponse> {
        let resource = &self.resource;
        let record = store
            .with_records(&resource.name, |records| {
                if let Some(found) = records.iter().find(|r| record_id_matches(r, id)) {
                    return Ok::<_, MockError>(found.clone());
                }
                // unknown ids materialize so later reads stay consistent
                let mut record = into_record(resource.generate(&resource.record_schema)?);
                record.insert("id".to_string(), resource.typed_id(id));
                let record = Value::Object(record);
                records.push(record.clone());
                Ok(record)
            })
            .await?;
        Ok(MockResponse::ok(resource.wrap(record)))
    }

    async fn create(&self, request: &MockRequest, store: &ResourceStore) -> MockResult<MockResponse> {
        let resource = &self.resource;
        let body = body_object(request)?;
        resource.check_body(&body, true)?;

        let record = store
            .with_records(&resource.name, |records| {
                let mut record = Map::new();
                let id = body
                    .get("id")
                    .filter(|id| !id.is_null())
                    .cloned()
                    .unwrap_or_else(|| resource.next_id(records));
                record.insert("id".to_string(), id);
                for (key, value) in body {
                    if key != "id" {
                        record.insert(key, value);
                    }
                }
                let now = timestamp();
                record.insert("createdAt".to_string(), Value::String(now.clone()));
                record.insert("updatedAt".to_string(), Value::String(now));
                let record = Value::Object(record);
                records.push(record.clone());
                record
            })
            .await;
        Ok(MockResponse::created(resource.wrap(record)))
    }

    async fn update(
        &self,
        id: &str,
        request: &MockRequest,
        store: &ResourceStore,
    ) -> MockResult<MockResponse> {
        let resource = &self.resource;
        let body = body_object(request)?;
        resource.check_body(&body, false)?;

        let record = store
            .with_records(&resource.name, |records| {
                let now = timestamp();
                if let Some(existing) = records.iter_mut().find(|r| record_id_matches(r, id)) {
                    if let Value::Object(fields) = existing {
                        for (key, value) in body {
                            if key != "id" {
                                fields.insert(key, value);
                            }
                        }
                        fields.insert("updatedAt".to_string(), Value::String(now));
                    }
                    return existing.clone();
                }

                let mut record = Map::new();
                record.insert("id".to_string(), resource.typed_id(id));
                for (key, value) in body {
                    if key != "id" {
                        record.insert(key, value);
                    }
                }
                record.insert("createdAt".to_string(), Value::String(now.clone()));
                record.insert("updatedAt".to_string(), Value::String(now));
                let record = Value::Object(record);
                records.push(record.clone());
                record
            })
            .await;
        Ok(MockResponse::ok(resource.wrap(record)))
    }

    async fn delete(&self, id: &str, store: &ResourceStore) -> MockResult<MockResponse> {
        let deleted = store.remove(&self.resource.name, id).await;
        debug!(resource = %self.resource.name, id = %id, deleted, "Delete");
        if self.resource.wrap {
            Ok(MockResponse::ok(json!({
                "data": { "id": self.resource.typed_id(id), "deleted": deleted }
            })))
        } else {
            Ok(MockResponse::no_content())
        }
    }
}

#[async_trait]
impl RouteHandler for CrudHandler {
    async fn handle(&self, request: &MockRequest, store: &ResourceStore) -> MockResult<MockResponse> {
        match self.operation {
            CrudOperation::List => self.list(store).await,
            CrudOperation::Create => self.create(request, store).await,
            CrudOperation::Read => self.read(path_id(request)?, store).await,
            CrudOperation::Update => self.update(path_id(request)?, request, store).await,
            CrudOperation::Delete => self.delete(path_id(request)?, store).await,
        }
    }
}

fn path_id(request: &MockRequest) -> MockResult<&str> {
    request
        .param("id")
        .ok_or_else(|| MockError::Validation("missing ':id' path parameter".to_string()))
}

fn body_object(request: &MockRequest) -> MockResult<Map<String, Value>> {
    match &request.body {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(MockError::Validation(format!(
            "request body must be a JSON object, found {}",
            json_kind(other)
        ))),
    }
}

fn into_record(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
