//! Recursive, type-directed synthesis of JSON values from schema nodes.
//!
//! Every top-level call builds a fresh [`Context`]. The chain of `$ref`
//! pointers currently being expanded is an immutable linked list living on
//! the call stack: entering a reference pushes a link for the duration of
//! that recursive call only, so sibling branches never see each other's
//! pointers and nothing has to be removed on return.
//!
//! The random source sits behind a mutex that is held for one whole
//! top-level generation. Seeded runs therefore replay exactly, even with
//! concurrent callers, as long as the call order is fixed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::heuristics::{self, Category};
use super::metrics_handler::MetricsCollector;
use super::pattern;
use super::random_source::RandomSource;
use super::result_cache::{fingerprint, ResultCache};
use crate::domain::schema::{
    resolve_ref, AdditionalProperties, ArrayItems, ArraySchema, Bound, NumberSchema,
    ObjectSchema, StringSchema,
};
use crate::domain::{GenerateOptions, MockError, MockResult, SchemaNode};

const DEFAULT_MIN_NUMBER: f64 = 0.0;
const DEFAULT_MAX_NUMBER: f64 = 1000.0;
const FLOAT_EPSILON: f64 = 1e-6;
const DEFAULT_MIN_ITEMS: usize = 1;
const DEFAULT_MAX_ITEMS: usize = 3;

static UNTYPED: SchemaNode = SchemaNode::Any;

/// What to emit when a `$ref` reappears in its own expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircularPolicy {
    /// Substitute `{}` and log a warning.
    #[default]
    Placeholder,
    /// Fail the generation with [`MockError::CircularRef`].
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorTuning {
    /// Chance that a non-required property is generated in lenient mode.
    pub optional_probability: f64,
    pub circular_policy: CircularPolicy,
    /// Upper bound on synthesized keys for open objects.
    pub max_extra_properties: usize,
}

impl Default for GeneratorTuning {
    fn default() -> Self {
        Self {
            optional_probability: 0.9,
            circular_policy: CircularPolicy::Placeholder,
            max_extra_properties: 2,
        }
    }
}

pub struct ValueGenerator {
    random: Mutex<RandomSource>,
    cache: Option<Arc<ResultCache>>,
    tuning: GeneratorTuning,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ValueGenerator {
    pub fn new(random: RandomSource) -> Self {
        Self {
            random: Mutex::new(random),
            cache: None,
            tuning: GeneratorTuning::default(),
            metrics: None,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(RandomSource::seeded(seed))
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_tuning(mut self, tuning: GeneratorTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn tuning(&self) -> &GeneratorTuning {
        &self.tuning
    }

    /// Generate a value for a document root. The document is both the schema
    /// and the base that `$ref` pointers resolve against.
    pub fn generate(&self, schema: &Value, options: &GenerateOptions) -> MockResult<Value> {
        let node = SchemaNode::parse_root(schema)?;
        self.run(&node, schema, schema, None, options)
    }

    /// Generate a value for a sub-schema whose `$ref`s resolve against `root`.
    pub fn generate_in(
        &self,
        schema: &Value,
        root: &Value,
        options: &GenerateOptions,
    ) -> MockResult<Value> {
        let node = SchemaNode::parse(schema)?;
        self.run(&node, schema, root, Some(root), options)
    }

    fn run(
        &self,
        node: &SchemaNode,
        schema: &Value,
        root: &Value,
        distinct_root: Option<&Value>,
        options: &GenerateOptions,
    ) -> MockResult<Value> {
        let property = options.property_name.as_deref();
        let cache = self.cache.as_ref().filter(|_| options.use_cache);
        let key = cache.map(|_| fingerprint(schema, distinct_root, options.strict, property));

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(hit) = cache.get(key) {
                debug!(key = %&key[..12], "Generation cache hit");
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit();
                }
                return Ok(hit);
            }
            debug!(key = %&key[..12], "Generation cache miss");
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_miss();
            }
        }

        let value = {
            let mut random = self.random();
            let mut walker = Walker {
                rng: &mut random,
                tuning: &self.tuning,
            };
            walker.node(
                node,
                Context {
                    root,
                    visited: None,
                    strict: options.strict,
                    property,
                },
            )?
        };

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.set(key, value.clone());
        }
        Ok(value)
    }

    /// Random UUID drawn from the generator's source.
    pub fn generate_id(&self) -> String {
        heuristics::uuid(&mut self.random())
    }

    /// Run `f` with exclusive access to the random source.
    pub fn with_random<T>(&self, f: impl FnOnce(&mut RandomSource) -> T) -> T {
        let mut random = self.random();
        f(&mut random)
    }

    pub fn reset_random(&self) {
        self.random().reset();
    }

    pub fn set_seed(&self, seed: u64) {
        self.random().set_seed(seed);
    }

    fn random(&self) -> MutexGuard<'_, RandomSource> {
        self.random.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ValueGenerator {
    fn default() -> Self {
        Self::new(RandomSource::new())
    }
}

/// One link in the chain of `$ref` pointers under expansion.
struct RefPath<'a> {
    pointer: &'a str,
    parent: Option<&'a RefPath<'a>>,
}

#[derive(Clone, Copy)]
struct Context<'a> {
    root: &'a Value,
    visited: Option<&'a RefPath<'a>>,
    strict: bool,
    property: Option<&'a str>,
}

impl<'a> Context<'a> {
    fn in_flight(&self, pointer: &str) -> bool {
        let mut link = self.visited;
        while let Some(current) = link {
            if current.pointer == pointer {
                return true;
            }
            link = current.parent;
        }
        false
    }

    fn enter<'b>(&self, link: &'b RefPath<'b>) -> Context<'b>
    where
        'a: 'b,
    {
        Context {
            root: self.root,
            visited: Some(link),
            strict: self.strict,
            property: self.property,
        }
    }

    fn named<'b>(&self, property: &'b str) -> Context<'b>
    where
        'a: 'b,
    {
        Context {
            root: self.root,
            visited: self.visited,
            strict: self.strict,
            property: Some(property),
        }
    }

    fn unnamed(&self) -> Self {
        Context {
            property: None,
            ..*self
        }
    }
}

struct Walker<'r> {
    rng: &'r mut RandomSource,
    tuning: &'r GeneratorTuning,
}

impl Walker<'_> {
    fn node(&mut self, node: &SchemaNode, ctx: Context<'_>) -> MockResult<Value> {
        match node {
            SchemaNode::Ref(pointer) => self.reference(pointer, ctx),
            SchemaNode::OneOf(choices) | SchemaNode::AnyOf(choices) | SchemaNode::Choice(choices) => {
                match self.rng.pick(choices) {
                    Some(choice) => self.node(choice, ctx),
                    None => Ok(json!({})),
                }
            }
            SchemaNode::AllOf(members) => self.all_of(members, ctx),
            SchemaNode::Enum(values) => Ok(self.rng.pick(values).cloned().unwrap_or(Value::Null)),
            SchemaNode::String(schema) => Ok(Value::String(self.string(schema, ctx))),
            SchemaNode::Number(schema) => Ok(self.number(schema, ctx)),
            SchemaNode::Boolean => Ok(Value::Bool(self.rng.next_f64() < 0.5)),
            SchemaNode::Array(schema) => self.array(schema, ctx),
            SchemaNode::Object(schema) => self.object(schema, ctx),
            SchemaNode::Null | SchemaNode::Any => Ok(json!({})),
        }
    }

    fn reference(&mut self, pointer: &str, ctx: Context<'_>) -> MockResult<Value> {
        if ctx.in_flight(pointer) {
            return self.circular(pointer);
        }
        let target = parse_target(ctx.root, pointer)?;
        let link = RefPath {
            pointer,
            parent: ctx.visited,
        };
        self.node(&target, ctx.enter(&link))
    }

    fn circular(&self, pointer: &str) -> MockResult<Value> {
        match self.tuning.circular_policy {
            CircularPolicy::Placeholder => {
                warn!(pointer = %pointer, "Circular $ref, substituting empty placeholder");
                Ok(json!({}))
            }
            CircularPolicy::Error => Err(MockError::CircularRef(pointer.to_string())),
        }
    }

    fn all_of(&mut self, members: &[SchemaNode], ctx: Context<'_>) -> MockResult<Value> {
        let mut flat = Vec::new();
        self.flatten(members, ctx, &mut flat)?;

        let mut merged: Option<ObjectSchema> = None;
        for member in &flat {
            if let SchemaNode::Object(object) = member {
                merge_object(merged.get_or_insert_with(ObjectSchema::default), object);
            }
        }
        let node = match merged {
            Some(object) => SchemaNode::Object(object),
            None => match flat.pop() {
                Some(last) => last,
                None => return Ok(json!({})),
            },
        };
        // Pointers followed while flattening only guard the flatten walk;
        // refs inside the merged node push their own links.
        self.node(&node, ctx)
    }

    /// Expand `$ref` and nested `allOf` members into a flat list.
    fn flatten(
        &mut self,
        members: &[SchemaNode],
        ctx: Context<'_>,
        out: &mut Vec<SchemaNode>,
    ) -> MockResult<()> {
        for member in members {
            match member {
                SchemaNode::Ref(pointer) => {
                    if ctx.in_flight(pointer) {
                        self.circular(pointer)?;
                        continue;
                    }
                    let target = parse_target(ctx.root, pointer)?;
                    let link = RefPath {
                        pointer,
                        parent: ctx.visited,
                    };
                    self.flatten(std::slice::from_ref(&target), ctx.enter(&link), out)?;
                }
                SchemaNode::AllOf(nested) => self.flatten(nested, ctx, out)?,
                other => out.push(other.clone()),
            }
        }
        Ok(())
    }

    fn string(&mut self, schema: &StringSchema, ctx: Context<'_>) -> String {
        if let Some(name) = ctx.property {
            if let Some(value) = heuristics::string_for_property(name, self.rng) {
                return heuristics::fit_length(value, schema.min_length, schema.max_length, self.rng);
            }
        }
        if let Some(value) = schema
            .format
            .as_deref()
            .and_then(|format| heuristics::string_for_format(format, self.rng))
        {
            return value;
        }
        if let Some(value) = schema
            .pattern
            .as_deref()
            .and_then(|pattern| pattern::generate_match(pattern, self.rng))
        {
            return value;
        }
        heuristics::random_string(self.rng, schema.min_length, schema.max_length)
    }

    fn number(&mut self, schema: &NumberSchema, ctx: Context<'_>) -> Value {
        let integer = schema.integer;
        let lower = schema.lower.map(|bound| adjust_lower(bound, integer));
        let upper = schema.upper.map(|bound| adjust_upper(bound, integer));

        let hint = ctx
            .property
            .and_then(heuristics::classify)
            .and_then(heuristics::numeric_hint);
        let hinted = hint.and_then(|hint| {
            let low = lower.map_or(hint.min, |l| l.max(hint.min));
            let high = upper.map_or(hint.max, |u| u.min(hint.max));
            (low <= high).then_some((low, high, hint.decimals))
        });

        let (low, high, decimals) = hinted.unwrap_or_else(|| {
            let (low, high) = default_range(lower, upper);
            (low, high, None)
        });

        if let Some(step) = schema.multiple_of {
            let first = (low / step).ceil();
            let last = (high / step).floor();
            if first <= last {
                let k = self.rng.next_int(first as i64, last as i64) as f64;
                let value = k * step;
                return if integer {
                    json!(value.round() as i64)
                } else {
                    json!(value)
                };
            }
        }

        if integer {
            let first = low.ceil() as i64;
            let last = (high.floor() as i64).max(first);
            return json!(self.rng.next_int(first, last));
        }

        let mut value = self.rng.next_float(low, high);
        if let Some(places) = decimals.filter(|_| !integer) {
            let scale = 10f64.powi(places as i32);
            value = ((value * scale).round() / scale).clamp(low, high);
        }
        json!(value)
    }

    fn array(&mut self, schema: &ArraySchema, ctx: Context<'_>) -> MockResult<Value> {
        let item = match &schema.items {
            ArrayItems::Tuple(positions) => {
                let mut values = Vec::with_capacity(positions.len());
                for position in positions {
                    values.push(self.node(position, ctx)?);
                }
                return Ok(Value::Array(values));
            }
            ArrayItems::Single(item) => item.as_ref(),
            ArrayItems::Unspecified => &UNTYPED,
        };

        let min = schema
            .min_items
            .unwrap_or_else(|| DEFAULT_MIN_ITEMS.min(schema.max_items.unwrap_or(DEFAULT_MIN_ITEMS)));
        let max = schema
            .max_items
            .unwrap_or_else(|| min.max(DEFAULT_MAX_ITEMS))
            .max(min);
        let count = self.rng.next_int(min as i64, max as i64) as usize;

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.node(item, ctx)?);
        }
        Ok(Value::Array(values))
    }

    fn object(&mut self, schema: &ObjectSchema, ctx: Context<'_>) -> MockResult<Value> {
        let mut out = Map::new();

        for (name, property) in &schema.properties {
            let include = schema.is_required(name)
                || (!ctx.strict && self.rng.chance(self.tuning.optional_probability));
            if include {
                let value = self.node(property, ctx.named(name))?;
                out.insert(name.clone(), value);
            }
        }

        // required names without a declaration still have to appear
        for name in &schema.required {
            if !out.contains_key(name) && schema.property(name).is_none() {
                let value = heuristics::string_for_property(name, self.rng)
                    .unwrap_or_else(|| heuristics::random_string(self.rng, None, None));
                out.insert(name.clone(), Value::String(value));
            }
        }

        if !ctx.strict {
            let extra = match &schema.additional {
                AdditionalProperties::Untyped => Some(None),
                AdditionalProperties::Typed(node) => Some(Some(node.as_ref())),
                AdditionalProperties::Unspecified | AdditionalProperties::Forbidden => None,
            };
            if let Some(node) = extra {
                let count = self.rng.next_int(0, self.tuning.max_extra_properties as i64);
                for _ in 0..count {
                    let mut key = heuristics::string_for_category(Category::Word, self.rng);
                    while out.contains_key(&key) {
                        key.push('_');
                    }
                    let value = match node {
                        Some(node) => self.node(node, ctx.unnamed())?,
                        None => Value::String(heuristics::string_for_category(Category::Word, self.rng)),
                    };
                    out.insert(key, value);
                }
            }
        }

        Ok(Value::Object(out))
    }
}

fn parse_target(root: &Value, pointer: &str) -> MockResult<SchemaNode> {
    let target = resolve_ref(root, pointer)?;
    SchemaNode::parse(target).map_err(|err| match err {
        MockError::SchemaParse(reason) => MockError::schema_ref(pointer, reason),
        other => other,
    })
}

/// Later members win on property collisions; `required` is a union.
fn merge_object(into: &mut ObjectSchema, from: &ObjectSchema) {
    for (name, node) in &from.properties {
        match into.properties.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = node.clone(),
            None => into.properties.push((name.clone(), node.clone())),
        }
    }
    for name in &from.required {
        if !into.is_required(name) {
            into.required.push(name.clone());
        }
    }
    if from.additional != AdditionalProperties::Unspecified {
        into.additional = from.additional.clone();
    }
}

fn adjust_lower(bound: Bound, integer: bool) -> f64 {
    match (bound.exclusive, integer) {
        (true, true) => bound.value.floor() + 1.0,
        (false, true) => bound.value.ceil(),
        (true, false) => bound.value + FLOAT_EPSILON,
        (false, false) => bound.value,
    }
}

fn adjust_upper(bound: Bound, integer: bool) -> f64 {
    match (bound.exclusive, integer) {
        (true, true) => bound.value.ceil() - 1.0,
        (false, true) => bound.value.floor(),
        (true, false) => bound.value - FLOAT_EPSILON,
        (false, false) => bound.value,
    }
}

fn default_range(lower: Option<f64>, upper: Option<f64>) -> (f64, f64) {
    let span = DEFAULT_MAX_NUMBER - DEFAULT_MIN_NUMBER;
    let (low, high) = match (lower, upper) {
        (Some(low), Some(high)) => (low, high),
        (Some(low), None) if low < DEFAULT_MAX_NUMBER => (low, DEFAULT_MAX_NUMBER),
        (Some(low), None) => (low, low + span),
        (None, Some(high)) if high > DEFAULT_MIN_NUMBER => (DEFAULT_MIN_NUMBER, high),
        (None, Some(high)) => (high - span, high),
        (None, None) => (DEFAULT_MIN_NUMBER, DEFAULT_MAX_NUMBER),
    };
    // contradictory bounds collapse onto the lower one
    (low, high.max(low))
}
