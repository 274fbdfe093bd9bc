//! Rows stored in the three collections

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Collection holding one profile per identity
pub const PROFILES: &str = "profiles";

/// Collection holding classes ("turmas")
pub const CLASSES: &str = "classes";

/// Collection holding assignments ("atividades")
pub const ASSIGNMENTS: &str = "assignments";

/// Teacher profile, seeded by a database trigger when the identity is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub school_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A class ("turma") owned by one teacher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Class {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment lifecycle status. The set is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 3] = [
        AssignmentStatus::Pending,
        AssignmentStatus::InProgress,
        AssignmentStatus::Completed,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "Pendente",
            AssignmentStatus::InProgress => "Em andamento",
            AssignmentStatus::Completed => "Concluída",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "completed" => Ok(AssignmentStatus::Completed),
            other => Err(ValidationError::InvalidStatus(other.to_string())),
        }
    }
}

/// Embedded parent class, as returned by `select=*,classes(name)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassName {
    pub name: String,
}

/// An assignment ("atividade") belonging to one class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub turma_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename = "classes", skip_serializing)]
    pub class: Option<ClassName>,
}

impl Assignment {
    /// Name of the parent class, when the query embedded it
    pub fn class_name(&self) -> Option<&str> {
        self.class.as_ref().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_wire_names() {
        for status in AssignmentStatus::ALL {
            let parsed: AssignmentStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
            assert_eq!(serde_json::to_value(status).unwrap(), json!(status.as_str()));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(
            "archived".parse::<AssignmentStatus>(),
            Err(ValidationError::InvalidStatus("archived".to_string()))
        );
        assert!(serde_json::from_value::<AssignmentStatus>(json!("done")).is_err());
    }

    #[test]
    fn portuguese_labels() {
        assert_eq!(AssignmentStatus::Pending.label(), "Pendente");
        assert_eq!(AssignmentStatus::InProgress.label(), "Em andamento");
        assert_eq!(AssignmentStatus::Completed.label(), "Concluída");
    }

    #[test]
    fn assignment_with_embedded_class() {
        let row = json!({
            "id": "7f1c2d9e-0d7a-4c61-9b61-2f1f4a3c9b10",
            "turma_id": "0b8e6f2a-5a0e-4e1b-8a51-6c3d5f1e2a40",
            "teacher_id": "5d3c7b9a-1e2f-4a6b-9c8d-7e6f5a4b3c21",
            "title": "Lista 1",
            "description": null,
            "due_date": "2024-03-15",
            "status": "in_progress",
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-01T12:00:00Z",
            "classes": { "name": "5º Ano A" }
        });
        let assignment: Assignment = serde_json::from_value(row).unwrap();
        assert_eq!(assignment.class_name(), Some("5º Ano A"));
        assert_eq!(assignment.status, AssignmentStatus::InProgress);
        assert_eq!(
            assignment.due_date,
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }
}
