//! Per-resource configuration for the list-form controller

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// User-facing texts for one resource type
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub load_failed: &'static str,
    pub created: &'static str,
    pub updated: &'static str,
    pub deleted: &'static str,
    pub create_failed: &'static str,
    pub update_failed: &'static str,
    pub delete_failed: &'static str,
}

/// Reference from a resource to the collection it belongs to
#[derive(Debug, Clone, Copy)]
pub struct ParentRef {
    /// Foreign key column on the child
    pub column: &'static str,
    pub collection: &'static str,
    pub owner_column: &'static str,
    /// Column shown in the selector
    pub label_column: &'static str,
    /// Singular noun used when no parent exists yet
    pub label: &'static str,
    pub load_failed: &'static str,
}

/// Everything the generic controller needs to know about a collection
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub collection: &'static str,
    pub select: &'static str,
    pub owner_column: &'static str,
    pub order_column: &'static str,
    pub required_fields: &'static [&'static str],
    pub parent: Option<ParentRef>,
    pub messages: Messages,
}

/// Read access to form fields by column name. Unknown names read as empty.
pub trait FormFields {
    fn field(&self, name: &str) -> &str;
}

/// A resource type managed by a [`ListFormController`](super::ListFormController)
pub trait Resource: Send + Sync + 'static {
    type Row: DeserializeOwned + Clone + fmt::Debug + Send + Sync;
    type Form: FormFields + Default + Clone + fmt::Debug + PartialEq + Send + Sync;

    const DESCRIPTOR: ResourceDescriptor;

    fn id(row: &Self::Row) -> Uuid;

    /// Copy a row's editable fields into form state; `None` becomes `""`.
    fn form_from_row(row: &Self::Row) -> Self::Form;

    /// Editable columns to send on insert or update. The owner column is
    /// added by the controller on insert.
    fn payload(form: &Self::Form) -> Result<Map<String, Value>, ValidationError>;
}

/// Empty or blank text becomes SQL null
pub(crate) fn optional_text(value: &str) -> Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::String(trimmed.to_string())
    }
}
