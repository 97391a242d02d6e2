use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory record collections, one ordered list per resource name.
///
/// Clones share the same underlying map; separate `new()` calls never do.
#[derive(Clone)]
pub struct ResourceStore {
    state: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Run `f` on the records of `resource` inside one write lock, creating
    /// an empty list first if the resource has never been touched. Every
    /// read-modify-write sequence goes through here.
    pub async fn with_records<T>(
        &self,
        resource: &str,
        f: impl FnOnce(&mut Vec<Value>) -> T,
    ) -> T {
        let mut state = self.state.write().await;
        let records = state.entry(resource.to_string()).or_default();
        f(records)
    }

    pub async fn list(&self, resource: &str) -> Vec<Value> {
        let state = self.state.read().await;
        state.get(resource).cloned().unwrap_or_default()
    }

    pub async fn find(&self, resource: &str, id: &str) -> Option<Value> {
        let state = self.state.read().await;
        state
            .get(resource)
            .and_then(|records| records.iter().find(|r| record_id_matches(r, id)))
            .cloned()
    }

    pub async fn insert(&self, resource: &str, record: Value) {
        self.with_records(resource, |records| records.push(record))
            .await;
    }

    /// Remove every record whose id matches; returns how many were removed.
    pub async fn remove(&self, resource: &str, id: &str) -> usize {
        self.with_records(resource, |records| {
            let before = records.len();
            records.retain(|r| !record_id_matches(r, id));
            before - records.len()
        })
        .await
    }

    /// Get all resources (for the admin API)
    pub async fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        let state = self.state.read().await;
        state.clone()
    }

    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.clear();
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `record.id` equals `id`, comparing numbers and strings by their
/// textual form since path parameters always arrive as strings.
pub fn record_id_matches(record: &Value, id: &str) -> bool {
    match record.get("id") {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lazy_initialization() {
        let store = ResourceStore::new();
        assert!(store.list("users").await.is_empty());
        let len = store.with_records("users", |records| records.len()).await;
        assert_eq!(len, 0);
        assert!(store.snapshot().await.contains_key("users"));
    }

    #[tokio::test]
    async fn test_insert_find_remove() {
        let store = ResourceStore::new();
        store.insert("users", json!({"id": 7, "name": "Ann"})).await;
        store.insert("users", json!({"id": "abc"})).await;
        store.insert("users", json!({"id": 7, "name": "Dup"})).await;

        assert_eq!(store.find("users", "7").await.unwrap()["name"], "Ann");
        assert!(store.find("users", "abc").await.is_some());
        assert_eq!(store.remove("users", "7").await, 2);
        assert_eq!(store.remove("users", "7").await, 0);
        assert_eq!(store.list("users").await.len(), 1);
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let a = ResourceStore::new();
        let b = ResourceStore::new();
        a.insert("posts", json!({"id": 1})).await;
        assert!(b.list("posts").await.is_empty());

        let shared = a.clone();
        assert_eq!(shared.list("posts").await.len(), 1);
        shared.reset().await;
        assert!(a.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let store = ResourceStore::new();
        let mut tasks = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.insert("items", json!({"id": i})).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.list("items").await.len(), 50);
    }
}
