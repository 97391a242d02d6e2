//! Route table derivation: CRUD routes for the schema's resource plus any
//! custom routes declared under the `x-mock-routes` extension.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::crud_handler::{CrudHandler, CrudOperation, CrudResource};
use super::state_manager::ResourceStore;
use super::value_generator::ValueGenerator;
use crate::domain::schema::resolve_ref;
use crate::domain::{HttpMethod, MockError, MockRequest, MockResponse, MockResult, SchemaNode};

pub const CUSTOM_ROUTES_KEY: &str = "x-mock-routes";
pub const DEFAULT_RESOURCE_NAME: &str = "resources";
pub const DEFAULT_PREFIX: &str = "api";
pub const DEFAULT_SEED_COUNT: usize = 3;

/// Handler bound to a route. Every handler of one server sees the same store.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: &MockRequest, store: &ResourceStore) -> MockResult<MockResponse>;
}

#[derive(Clone)]
pub enum RouteResponse {
    /// Literal JSON returned as is.
    Static(Value),
    /// Schema generated per request against the table's root document.
    Schema(Value),
    Handler(Arc<dyn RouteHandler>),
}

impl fmt::Debug for RouteResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Schema(schema) => f.debug_tuple("Schema").field(schema).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub method: HttpMethod,
    /// Path template; `:name` segments capture parameters.
    pub path: String,
    pub response: RouteResponse,
    pub status: u16,
    pub delay: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

impl RouteDefinition {
    fn handler(method: HttpMethod, path: String, status: u16, handler: CrudHandler) -> Self {
        Self {
            method,
            path,
            response: RouteResponse::Handler(Arc::new(handler)),
            status,
            delay: None,
            headers: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        route_key(self.method, &self.path)
    }
}

pub fn route_key(method: HttpMethod, path: &str) -> String {
    format!("{}:{}", method, path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOptions {
    pub resource_name: Option<String>,
    pub base_path: Option<String>,
    pub prefix: String,
    pub strict: bool,
    pub seed_count: usize,
    /// Wrap CRUD payloads in `{"data": ..}` envelopes.
    pub wrap: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            resource_name: None,
            base_path: None,
            prefix: DEFAULT_PREFIX.to_string(),
            strict: false,
            seed_count: DEFAULT_SEED_COUNT,
            wrap: false,
        }
    }
}

pub struct RouteMatch<'a> {
    pub route: &'a RouteDefinition,
    pub params: HashMap<String, String>,
}

/// Immutable map of `"METHOD:/path"` to route definitions.
pub struct RouteTable {
    routes: BTreeMap<String, RouteDefinition>,
    resource: String,
    base_path: String,
    root: Arc<Value>,
}

impl RouteTable {
    pub fn build(
        schema: &Value,
        options: &RouteOptions,
        generator: Arc<ValueGenerator>,
    ) -> MockResult<Self> {
        SchemaNode::parse_root(schema)?;
        let root = Arc::new(schema.clone());

        let resource = resource_name(schema, options.resource_name.as_deref())?;
        let base_path = match &options.base_path {
            Some(path) => normalize_path(path),
            None => {
                let prefix = options.prefix.trim_matches('/');
                if prefix.is_empty() {
                    format!("/{}", resource)
                } else {
                    format!("/{}/{}", prefix, resource)
                }
            }
        };

        let is_array = schema.get("type").and_then(Value::as_str) == Some("array");
        let (record_schema, list_schema) = match schema.get("items") {
            Some(items @ Value::Object(_)) if is_array => (items.clone(), Some(schema.clone())),
            _ => (schema.clone(), None),
        };
        let id_kind = super::crud_handler::IdKind::detect(&record_schema, &root);

        let shared = Arc::new(CrudResource {
            name: resource.clone(),
            record_schema,
            list_schema,
            root: root.clone(),
            generator,
            strict: options.strict,
            seed_count: options.seed_count,
            wrap: options.wrap,
            id_kind,
        });

        let item_path = format!("{}/:id", base_path);
        let crud = [
            (HttpMethod::Get, base_path.clone(), 200, CrudOperation::List),
            (HttpMethod::Get, item_path.clone(), 200, CrudOperation::Read),
            (HttpMethod::Post, base_path.clone(), 201, CrudOperation::Create),
            (HttpMethod::Put, item_path.clone(), 200, CrudOperation::Update),
            (HttpMethod::Patch, item_path.clone(), 200, CrudOperation::Update),
            (
                HttpMethod::Delete,
                item_path,
                if options.wrap { 200 } else { 204 },
                CrudOperation::Delete,
            ),
        ];

        let mut routes = BTreeMap::new();
        for (method, path, status, operation) in crud {
            let route = RouteDefinition::handler(
                method,
                path,
                status,
                CrudHandler::new(operation, shared.clone()),
            );
            routes.insert(route.key(), route);
        }

        for route in custom_routes(schema)? {
            debug!(method = %route.method, path = %route.path, "Custom route declared");
            routes.insert(route.key(), route);
        }

        info!(
            resource = %resource,
            base_path = %base_path,
            routes = routes.len(),
            "Route table built"
        );

        Ok(Self {
            routes,
            resource,
            base_path,
            root,
        })
    }

    pub fn routes(&self) -> &BTreeMap<String, RouteDefinition> {
        &self.routes
    }

    pub fn get(&self, key: &str) -> Option<&RouteDefinition> {
        self.routes.get(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn resource_name(&self) -> &str {
        &self.resource
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Root document that schema responses resolve `$ref`s against.
    pub fn root(&self) -> &Arc<Value> {
        &self.root
    }

    /// Find the route for a concrete request path. When several templates
    /// match, the one with the most literal segments wins.
    pub fn match_route(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<'_>> {
        let segments = split_path(path);
        let mut best: Option<(usize, RouteMatch<'_>)> = None;

        for route in self.routes.values().filter(|r| r.method == method) {
            let Some((literals, params)) = match_template(&route.path, &segments) else {
                continue;
            };
            if best.as_ref().map_or(true, |(score, _)| literals > *score) {
                best = Some((literals, RouteMatch { route, params }));
            }
        }
        best.map(|(_, found)| found)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_template(template: &str, segments: &[&str]) -> Option<(usize, HashMap<String, String>)> {
    let parts = split_path(template);
    if parts.len() != segments.len() {
        return None;
    }
    let mut literals = 0;
    let mut params = HashMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), (*segment).to_string());
            }
            None if part == segment => literals += 1,
            None => return None,
        }
    }
    Some((literals, params))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

/// Resource name from an explicit override, else the pluralized schema
/// title, else a generic fallback.
pub fn resource_name(schema: &Value, explicit: Option<&str>) -> MockResult<String> {
    let name = match explicit {
        Some(name) => name.trim().to_string(),
        None => {
            let title = schema
                .get("title")
                .or_else(|| schema.get("items").and_then(|items| items.get("title")))
                .and_then(Value::as_str)
                .map(slugify)
                .filter(|slug| !slug.is_empty());
            match title {
                Some(slug) => pluralize(&slug),
                None => DEFAULT_RESOURCE_NAME.to_string(),
            }
        }
    };
    validate_resource_name(&name)?;
    Ok(name)
}

pub fn validate_resource_name(name: &str) -> MockResult<()> {
    if name.is_empty() {
        return Err(MockError::Validation("resource name must not be empty".to_string()));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(MockError::Validation(format!(
            "resource name '{}' contains invalid character '{}'",
            name, bad
        )));
    }
    Ok(())
}

/// `"User Profile"` and `"UserProfile"` both become `user-profile`.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len() + 4);
    let mut prev_lower = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
            prev_lower = false;
        }
    }
    slug.trim_matches('-').to_string()
}

/// English pluralization of the last hyphen-separated word.
pub fn pluralize(name: &str) -> String {
    const IRREGULAR: [(&str, &str); 8] = [
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("mouse", "mice"),
        ("goose", "geese"),
        ("tooth", "teeth"),
        ("foot", "feet"),
    ];
    const UNCOUNTABLE: [&str; 8] = [
        "data", "information", "equipment", "news", "series", "species", "sheep", "fish",
    ];

    let (head, word) = match name.rfind('-') {
        Some(split) => name.split_at(split + 1),
        None => ("", name),
    };
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return name.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return format!("{}{}", head, plural);
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == word) {
        return name.to_string();
    }

    let plural = if let Some(stem) = word.strip_suffix('y') {
        let consonant_before = stem
            .chars()
            .last()
            .is_some_and(|c| !"aeiou".contains(c));
        if consonant_before {
            format!("{}ies", stem)
        } else {
            format!("{}s", word)
        }
    } else if ["ss", "us", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else if word.ends_with('s') {
        word.to_string()
    } else {
        format!("{}s", word)
    };
    format!("{}{}", head, plural)
}

fn custom_routes(schema: &Value) -> MockResult<Vec<RouteDefinition>> {
    let Some(declared) = schema.get(CUSTOM_ROUTES_KEY) else {
        return Ok(Vec::new());
    };
    let entries = declared.as_array().ok_or_else(|| {
        MockError::Validation(format!("{} must be an array", CUSTOM_ROUTES_KEY))
    })?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| custom_route(index, entry))
        .collect()
}

fn custom_route(index: usize, entry: &Value) -> MockResult<RouteDefinition> {
    let invalid = |reason: &str| {
        MockError::Validation(format!("{}[{}]: {}", CUSTOM_ROUTES_KEY, index, reason))
    };

    let path = entry
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| invalid("missing path"))?;
    let method = match entry.get("method") {
        None => HttpMethod::Get,
        Some(Value::String(name)) => {
            HttpMethod::parse(name).ok_or_else(|| invalid(&format!("unsupported method '{}'", name)))?
        }
        Some(_) => return Err(invalid("method must be a string")),
    };
    let response = match (entry.get("response"), entry.get("schema")) {
        (Some(value), _) => RouteResponse::Static(value.clone()),
        (None, Some(schema @ Value::Object(_))) => {
            SchemaNode::parse(schema).map_err(|e| invalid(&e.to_string()))?;
            RouteResponse::Schema(schema.clone())
        }
        (None, Some(_)) => return Err(invalid("schema must be an object")),
        (None, None) => return Err(invalid("needs a response or a schema")),
    };
    let status = match entry.get("status") {
        None => 200,
        Some(value) => value
            .as_u64()
            .filter(|s| (100..=599).contains(s))
            .ok_or_else(|| invalid("status must be an integer between 100 and 599"))?
            as u16,
    };
    let delay = match entry.get("delay") {
        None => None,
        Some(value) => Some(Duration::from_millis(
            value
                .as_u64()
                .ok_or_else(|| invalid("delay must be a non-negative number of milliseconds"))?,
        )),
    };
    let headers = match entry.get("headers") {
        None => Vec::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, value)| match value {
                Value::String(s) => (name.clone(), s.clone()),
                other => (name.clone(), other.to_string()),
            })
            .collect(),
        Some(_) => return Err(invalid("headers must be an object")),
    };

    Ok(RouteDefinition {
        method,
        path: normalize_path(path),
        response,
        status,
        delay,
        headers,
    })
}

/// Follow `$ref` links from `schema` until a concrete node is reached.
/// Unresolvable or looping chains yield the last node seen.
pub(crate) fn resolve_shallow<'a>(schema: &'a Value, root: &'a Value) -> &'a Value {
    let mut current = schema;
    for _ in 0..16 {
        match current
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|pointer| resolve_ref(root, pointer).ok())
        {
            Some(target) => current = target,
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(schema: Value, options: RouteOptions) -> MockResult<RouteTable> {
        RouteTable::build(&schema, &options, Arc::new(ValueGenerator::seeded(1)))
    }

    #[test]
    fn test_crud_routes_from_title() {
        let table = build(
            json!({"title": "User", "type": "object", "properties": {"id": {"type": "integer"}}}),
            RouteOptions::default(),
        )
        .unwrap();

        assert_eq!(table.resource_name(), "users");
        assert_eq!(table.base_path(), "/api/users");
        for key in [
            "GET:/api/users",
            "GET:/api/users/:id",
            "POST:/api/users",
            "PUT:/api/users/:id",
            "PATCH:/api/users/:id",
            "DELETE:/api/users/:id",
        ] {
            assert!(table.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(table.get("POST:/api/users").unwrap().status, 201);
        assert_eq!(table.get("DELETE:/api/users/:id").unwrap().status, 204);
    }

    #[test]
    fn test_naming_overrides_and_fallback() {
        let options = RouteOptions {
            resource_name: Some("people".to_string()),
            base_path: Some("v2/folks/".to_string()),
            ..Default::default()
        };
        let table = build(json!({"title": "Person", "type": "object"}), options).unwrap();
        assert_eq!(table.resource_name(), "people");
        assert_eq!(table.base_path(), "/v2/folks");

        let table = build(json!({"type": "object"}), RouteOptions::default()).unwrap();
        assert_eq!(table.resource_name(), "resources");

        let options = RouteOptions {
            prefix: String::new(),
            ..Default::default()
        };
        let table = build(json!({"title": "Category", "type": "object"}), options).unwrap();
        assert_eq!(table.base_path(), "/categories");
    }

    #[test]
    fn test_invalid_resource_name_rejected() {
        let options = RouteOptions {
            resource_name: Some("bad name!".to_string()),
            ..Default::default()
        };
        let err = build(json!({"type": "object"}), options).err().unwrap();
        assert!(matches!(err, MockError::Validation(_)));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("users"), "users");
        assert_eq!(pluralize("user-profile"), "user-profiles");
        assert_eq!(pluralize("data"), "data");
        assert_eq!(slugify("User Profile"), "user-profile");
        assert_eq!(slugify("BlogPost"), "blog-post");
    }

    #[test]
    fn test_custom_routes() {
        let table = build(
            json!({
                "title": "Order",
                "type": "object",
                "x-mock-routes": [
                    {"path": "/status", "response": {"ok": true}, "headers": {"X-Mock": "1"}},
                    {"path": "reports/:year", "method": "post", "schema": {"type": "integer"}, "status": 202, "delay": 5}
                ]
            }),
            RouteOptions::default(),
        )
        .unwrap();

        let status = table.get("GET:/status").unwrap();
        assert!(matches!(&status.response, RouteResponse::Static(v) if v == &json!({"ok": true})));
        assert_eq!(status.headers, vec![("X-Mock".to_string(), "1".to_string())]);

        let report = table.get("POST:/reports/:year").unwrap();
        assert_eq!(report.status, 202);
        assert_eq!(report.delay, Some(Duration::from_millis(5)));
        assert!(matches!(report.response, RouteResponse::Schema(_)));
    }

    #[test]
    fn test_custom_route_without_response_rejected() {
        let err = build(
            json!({"type": "object", "x-mock-routes": [{"path": "/x"}]}),
            RouteOptions::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, MockError::Validation(msg) if msg.contains("x-mock-routes[0]")));
    }

    #[test]
    fn test_match_prefers_literal_segments() {
        let table = build(
            json!({
                "title": "User",
                "type": "object",
                "x-mock-routes": [{"path": "/api/users/me", "response": {"me": true}}]
            }),
            RouteOptions::default(),
        )
        .unwrap();

        let found = table.match_route(HttpMethod::Get, "/api/users/me").unwrap();
        assert_eq!(found.route.path, "/api/users/me");
        assert!(found.params.is_empty());

        let found = table.match_route(HttpMethod::Get, "/api/users/42/").unwrap();
        assert_eq!(found.route.path, "/api/users/:id");
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));

        assert!(table.match_route(HttpMethod::Get, "/api/other").is_none());
        assert!(table.match_route(HttpMethod::Post, "/api/users/42").is_none());
    }

    #[test]
    fn test_array_root_uses_item_title() {
        let table = build(
            json!({"type": "array", "items": {"title": "Comment", "type": "object"}}),
            RouteOptions::default(),
        )
        .unwrap();
        assert_eq!(table.resource_name(), "comments");
    }

    #[test]
    fn test_malformed_root_rejected() {
        let err = build(json!({"title": "Nothing"}), RouteOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, MockError::SchemaParse(_)));
    }
}
