//! In-memory stand-ins for the hosted backend, used by tests across the crate.
//!
//! `MemoryStore` evaluates `RowQuery` filters with the same meaning the REST
//! dialect gives them: values compare as timestamps when both sides parse as
//! RFC 3339, as numbers when both parse as numbers, and as strings otherwise.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use serde_json::{json, Value};

use super::auth::{AuthService, AuthUser, Session};
use super::query::{Direction, Filter, RowQuery};
use super::storage::{public_object_url, ObjectStore};
use super::{BackendError, DataStore};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<HashSet<String>>,
    next_id: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1000),
            ..Default::default()
        }
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every subsequent call touching `table` fails with a backend query error.
    pub fn fail_table(&self, table: &str) {
        self.failing.lock().unwrap().insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        self.failing.lock().unwrap().remove(table);
    }

    fn check(&self, table: &str) -> Result<(), BackendError> {
        if self.failing.lock().unwrap().contains(table) {
            return Err(BackendError::Query {
                status: 500,
                message: format!("simulated failure on '{table}'"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        self.check(table)?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.filters().iter().all(|f| matches(row, f)))
            .collect();
        if let Some((column, direction)) = query.order() {
            rows.sort_by(|a, b| {
                let ord = compare(
                    &text(a.get(column).unwrap_or(&Value::Null)),
                    &text(b.get(column).unwrap_or(&Value::Null)),
                );
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, BackendError> {
        self.check(table)?;
        if row.get("id").map_or(true, Value::is_null) {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            row["id"] = json!(*next);
        }
        self.seed(table, vec![row.clone()]);
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        query: &RowQuery,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        self.check(table)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if query.filters().iter().all(|f| matches(row, f)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        self.check(table)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let (deleted, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| query.filters().iter().all(|f| matches(row, f)));
        *rows = kept;
        Ok(deleted)
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let field = |c: &str| text(row.get(c).unwrap_or(&Value::Null));
    match filter {
        Filter::Eq(c, v) => field(c) == *v,
        Filter::Gte(c, v) => compare(&field(c), v) != Ordering::Less && field(c) != "null",
        Filter::Lte(c, v) => compare(&field(c), v) != Ordering::Greater && field(c) != "null",
        Filter::Or(inner) => inner.iter().any(|f| matches(row, f)),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.cmp(b)
}

// ────────────────────────────────────────────────────────────────────────────
// Storage and auth fakes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_removals: Mutex<bool>,
}

impl MemoryObjects {
    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&format!("{bucket}/{path}"))
    }

    pub fn put(&self, bucket: &str, path: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{path}"), Bytes::from_static(b"img"));
    }

    pub fn fail_removals(&self) {
        *self.fail_removals.lock().unwrap() = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), BackendError> {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{path}"), body);
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), BackendError> {
        if *self.fail_removals.lock().unwrap() {
            return Err(BackendError::Storage("simulated removal failure".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&format!("{bucket}/{path}"));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url("https://backend.test", bucket, path)
    }
}

/// Accepts exactly one token and one email/password pair.
pub struct StaticAuth {
    pub token: String,
    pub email: String,
    pub password: String,
}

impl StaticAuth {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            email: "admin@nirvana.test".to_string(),
            password: "secret".to_string(),
        }
    }

    fn user(&self) -> AuthUser {
        AuthUser {
            id: "admin-1".to_string(),
            email: Some(self.email.clone()),
        }
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        if email == self.email && password == self.password {
            Ok(Session {
                access_token: self.token.clone(),
                refresh_token: None,
                expires_in: Some(3600),
                user: self.user(),
            })
        } else {
            Err(BackendError::Unauthorized)
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.current_user(access_token).await.map(|_| ())
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        if access_token == self.token {
            Ok(self.user())
        } else {
            Err(BackendError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timestamp_range_filter() {
        let store = MemoryStore::new();
        store.seed(
            "analytics",
            vec![
                json!({"id": 1, "tipo": "a", "timestamp": "2024-01-01T10:00:00Z"}),
                json!({"id": 2, "tipo": "a", "timestamp": "2024-01-05T10:00:00+00:00"}),
                json!({"id": 3, "tipo": "a", "timestamp": "2024-02-01T10:00:00Z"}),
            ],
        );
        let q = RowQuery::new()
            .gte("timestamp", "2024-01-01T10:00:00Z")
            .lte("timestamp", "2024-01-31T00:00:00Z");
        let rows = store.select("analytics", &q).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_by_numeric_id() {
        let store = MemoryStore::new();
        store.seed("analytics", vec![json!({"profissional_id": 5}), json!({"profissional_id": 6})]);
        let deleted = store
            .delete("analytics", &RowQuery::new().eq("profissional_id", 5))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(store.rows("analytics").len(), 1);
    }
}
