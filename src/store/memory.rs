//! In-process store with the same row policies, cascades and triggers as the
//! hosted database. Used for tests and offline demos.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::filter::value_text;
use super::{Filter, Query, ResourceStore};
use crate::error::StoreError;
use crate::models::{AssignmentStatus, ASSIGNMENTS, CLASSES, PROFILES};

/// Column layout of one collection
struct TableSpec {
    owner: &'static str,
    not_null: &'static [&'static str],
    defaults: &'static [(&'static str, DefaultValue)],
}

#[derive(Clone, Copy)]
enum DefaultValue {
    Null,
    Text(&'static str),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Text(s) => Value::String(s.to_string()),
        }
    }
}

fn table_spec(collection: &str) -> Option<TableSpec> {
    match collection {
        PROFILES => Some(TableSpec {
            owner: "user_id",
            not_null: &["user_id", "full_name"],
            defaults: &[("school_name", DefaultValue::Null)],
        }),
        CLASSES => Some(TableSpec {
            owner: "teacher_id",
            not_null: &["teacher_id", "name"],
            defaults: &[
                ("description", DefaultValue::Null),
                ("grade_level", DefaultValue::Null),
                ("subject", DefaultValue::Null),
            ],
        }),
        ASSIGNMENTS => Some(TableSpec {
            owner: "teacher_id",
            not_null: &["teacher_id", "turma_id", "title"],
            defaults: &[
                ("description", DefaultValue::Null),
                ("due_date", DefaultValue::Null),
                ("status", DefaultValue::Text("pending")),
            ],
        }),
        _ => None,
    }
}

/// Foreign key column on `from` referencing `to`
fn foreign_key(from: &str, to: &str) -> Option<&'static str> {
    match (from, to) {
        (ASSIGNMENTS, CLASSES) => Some("turma_id"),
        _ => None,
    }
}

/// Number of requests received, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub query: usize,
    pub insert: usize,
    pub update: usize,
    pub delete: usize,
    pub count: usize,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.query + self.insert + self.update + self.delete + self.count
    }

    /// Requests that change data
    pub fn writes(&self) -> usize {
        self.insert + self.update + self.delete
    }
}

#[derive(Default)]
struct Counters {
    query: AtomicUsize,
    insert: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    count: AtomicUsize,
}

#[derive(Default)]
struct State {
    current_user: Option<Uuid>,
    tables: HashMap<String, Vec<Value>>,
    last_timestamp: Option<DateTime<Utc>>,
    offline: bool,
    defer_profiles: bool,
    pending_profiles: Vec<(Uuid, String)>,
}

impl State {
    /// Strictly increasing timestamps so `created_at` ordering is total
    fn next_timestamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn caller(&self) -> Result<Uuid, StoreError> {
        self.current_user.ok_or(StoreError::Unauthenticated)
    }

    fn table(&self, collection: &str) -> &[Value] {
        self.tables.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    fn visible<'a>(
        &'a self,
        collection: &str,
        owner: &'static str,
    ) -> impl Iterator<Item = &'a Value> + 'a {
        let user = self.current_user.map(|u| u.to_string());
        self.table(collection)
            .iter()
            .filter(move |row| match &user {
                Some(user) => row.get(owner).map(value_text).as_deref() == Some(user.as_str()),
                None => false,
            })
    }

    fn check_row(
        &self,
        collection: &str,
        spec: &TableSpec,
        row: &Map<String, Value>,
        caller: Uuid,
    ) -> Result<(), StoreError> {
        for column in spec.not_null {
            if row.get(*column).map_or(true, Value::is_null) {
                return Err(StoreError::Constraint(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column, collection
                )));
            }
        }

        let owner = row.get(spec.owner).map(value_text);
        if owner.as_deref() != Some(caller.to_string().as_str()) {
            return Err(StoreError::PolicyDenied(collection.to_string()));
        }

        if let Some(status) = row.get("status") {
            let valid = status
                .as_str()
                .is_some_and(|s| s.parse::<AssignmentStatus>().is_ok());
            if !valid {
                return Err(StoreError::Constraint(format!(
                    "new row for relation \"{}\" violates check constraint \"{}_status_check\"",
                    collection, collection
                )));
            }
        }

        if let Some(fk) = foreign_key(collection, CLASSES) {
            let parent_id = row.get(fk).map(value_text).unwrap_or_default();
            let parent = self
                .table(CLASSES)
                .iter()
                .find(|c| c.get("id").map(value_text).as_deref() == Some(parent_id.as_str()));
            match parent {
                None => {
                    return Err(StoreError::Constraint(format!(
                        "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
                        collection, collection, fk
                    )))
                }
                Some(parent) if parent.get("teacher_id").map(value_text) != owner => {
                    return Err(StoreError::PolicyDenied(collection.to_string()))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    fn embed(&self, collection: &str, row: &mut Value, query: &Query) {
        for (relation, columns) in query.embeds() {
            let Some(fk) = foreign_key(collection, &relation) else {
                continue;
            };
            let key = row.get(fk).map(value_text);
            let parent = self
                .table(&relation)
                .iter()
                .find(|p| p.get("id").map(value_text) == key);
            let embedded = match parent {
                Some(parent) => {
                    let mut picked = Map::new();
                    for column in &columns {
                        if column == "*" {
                            if let Some(all) = parent.as_object() {
                                picked.extend(all.clone());
                            }
                        } else if let Some(v) = parent.get(column) {
                            picked.insert(column.clone(), v.clone());
                        }
                    }
                    Value::Object(picked)
                }
                None => Value::Null,
            };
            if let Some(obj) = row.as_object_mut() {
                obj.insert(relation, embedded);
            }
        }
    }

    fn insert_profile(&mut self, user_id: Uuid, full_name: String) {
        let now = self.next_timestamp();
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "full_name": full_name,
            "school_name": null,
            "created_at": now,
            "updated_at": now,
        });
        self.tables.entry(PROFILES.to_string()).or_default().push(row);
    }
}

fn compare_column(a: &Value, b: &Value, column: &str) -> Ordering {
    let a = a.get(column).map(value_text);
    let b = b.get(column).map(value_text);
    a.cmp(&b)
}

fn id_of(row: &Value) -> Option<String> {
    row.get("id").map(value_text)
}

/// Thread-safe in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity the row policies compare owner columns against. The memory
    /// auth backend switches it on sign-in and sign-out.
    pub async fn set_current_user(&self, user: Option<Uuid>) {
        self.state.lock().await.current_user = user;
    }

    pub async fn current_user(&self) -> Option<Uuid> {
        self.state.lock().await.current_user
    }

    /// Make every request fail as if the network were down
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Hold profile creation back until [`MemoryStore::flush_triggers`] runs,
    /// reproducing the delay between sign-up and the trigger's insert.
    pub async fn defer_profile_trigger(&self, defer: bool) {
        self.state.lock().await.defer_profiles = defer;
    }

    /// The `handle_new_user` trigger: seed a profile for a new identity
    pub async fn create_profile_for(&self, user_id: Uuid, full_name: &str) {
        let mut state = self.state.lock().await;
        if state.defer_profiles {
            state.pending_profiles.push((user_id, full_name.to_string()));
        } else {
            state.insert_profile(user_id, full_name.to_string());
        }
    }

    /// Run deferred triggers
    pub async fn flush_triggers(&self) {
        let mut state = self.state.lock().await;
        let pending = std::mem::take(&mut state.pending_profiles);
        for (user_id, full_name) in pending {
            state.insert_profile(user_id, full_name);
        }
    }

    /// Delete an identity; its profile, classes and assignments cascade
    pub async fn remove_user(&self, user_id: Uuid) {
        let mut state = self.state.lock().await;
        let user = user_id.to_string();
        for collection in [PROFILES, CLASSES, ASSIGNMENTS] {
            if let Some(spec) = table_spec(collection) {
                if let Some(rows) = state.tables.get_mut(collection) {
                    rows.retain(|r| r.get(spec.owner).map(value_text).as_deref() != Some(user.as_str()));
                }
            }
        }
    }

    /// Every row of a collection regardless of owner
    pub async fn all_rows(&self, collection: &str) -> Vec<Value> {
        self.state.lock().await.table(collection).to_vec()
    }

    pub fn calls(&self) -> Calls {
        Calls {
            query: self.counters.query.load(AtomicOrdering::SeqCst),
            insert: self.counters.insert.load(AtomicOrdering::SeqCst),
            update: self.counters.update.load(AtomicOrdering::SeqCst),
            delete: self.counters.delete.load(AtomicOrdering::SeqCst),
            count: self.counters.count.load(AtomicOrdering::SeqCst),
        }
    }

    fn spec(collection: &str) -> Result<TableSpec, StoreError> {
        table_spec(collection).ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn check_online(state: &State) -> Result<(), StoreError> {
        if state.offline {
            return Err(StoreError::UnparsedApi {
                message: "service unavailable".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.counters.query.fetch_add(1, AtomicOrdering::SeqCst);
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        let spec = Self::spec(collection)?;

        let mut rows: Vec<Value> = state
            .visible(collection, spec.owner)
            .filter(|row| query.filter.matches(row))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_column(a, b, &order.column);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        for row in rows.iter_mut() {
            state.embed(collection, row, query);
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        self.counters.insert.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        let spec = Self::spec(collection)?;
        let caller = state.caller()?;

        let Value::Object(mut fields) = row else {
            return Err(StoreError::Deserialization("row must be a JSON object".to_string()));
        };
        for (column, default) in spec.defaults {
            fields
                .entry(column.to_string())
                .or_insert_with(|| default.to_value());
        }
        fields
            .entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

        state.check_row(collection, &spec, &fields, caller)?;

        let id = fields.get("id").map(value_text);
        if state.table(collection).iter().any(|r| id_of(r) == id) {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                collection
            )));
        }

        let now = state.next_timestamp();
        fields.insert("created_at".to_string(), Value::String(now.clone()));
        fields.insert("updated_at".to_string(), Value::String(now));

        let row = Value::Object(fields);
        state
            .tables
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, StoreError> {
        self.counters.update.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        let spec = Self::spec(collection)?;
        let caller = state.caller()?;
        let key = Some(id.to_string());

        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id,
        };

        let current = state
            .visible(collection, spec.owner)
            .find(|r| id_of(r) == key)
            .cloned()
            .ok_or_else(not_found)?;

        let Value::Object(patch) = patch else {
            return Err(StoreError::Deserialization("patch must be a JSON object".to_string()));
        };
        let Value::Object(mut fields) = current else {
            return Err(not_found());
        };
        for (column, value) in patch {
            if column == "id" || column == "created_at" {
                continue;
            }
            fields.insert(column, value);
        }

        state.check_row(collection, &spec, &fields, caller)?;
        fields.insert(
            "updated_at".to_string(),
            Value::String(state.next_timestamp()),
        );

        let updated = Value::Object(fields);
        let rows = state
            .tables
            .get_mut(collection)
            .ok_or_else(not_found)?;
        let slot = rows
            .iter_mut()
            .find(|r| id_of(r) == key)
            .ok_or_else(not_found)?;
        *slot = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        self.counters.delete.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        let spec = Self::spec(collection)?;
        state.caller()?;
        let key = Some(id.to_string());

        if !state.visible(collection, spec.owner).any(|r| id_of(r) == key) {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            });
        }

        if let Some(rows) = state.tables.get_mut(collection) {
            rows.retain(|r| id_of(r) != key);
        }

        // on delete cascade
        let children: Vec<String> = state.tables.keys().cloned().collect();
        for child in children {
            if let Some(fk) = foreign_key(&child, collection) {
                if let Some(rows) = state.tables.get_mut(&child) {
                    rows.retain(|r| r.get(fk).map(value_text) != key);
                }
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.counters.count.fetch_add(1, AtomicOrdering::SeqCst);
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        let spec = Self::spec(collection)?;
        Ok(state
            .visible(collection, spec.owner)
            .filter(|row| filter.matches(row))
            .count() as u64)
    }
}
