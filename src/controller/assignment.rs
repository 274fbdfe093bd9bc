//! Assignments ("atividades"), each belonging to a class

use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::resource::{
    optional_text, FormFields, Messages, ParentRef, Resource, ResourceDescriptor,
};
use crate::error::ValidationError;
use crate::models::{Assignment, AssignmentStatus, ASSIGNMENTS, CLASSES};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentForm {
    /// Selected class id, empty when nothing is selected
    pub turma_id: String,
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD`, empty for no due date
    pub due_date: String,
    pub status: AssignmentStatus,
}

impl FormFields for AssignmentForm {
    fn field(&self, name: &str) -> &str {
        match name {
            "turma_id" => &self.turma_id,
            "title" => &self.title,
            "description" => &self.description,
            "due_date" => &self.due_date,
            "status" => self.status.as_str(),
            _ => "",
        }
    }
}

pub struct AssignmentResource;

impl Resource for AssignmentResource {
    type Row = Assignment;
    type Form = AssignmentForm;

    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        collection: ASSIGNMENTS,
        select: "*,classes(name)",
        owner_column: "teacher_id",
        order_column: "created_at",
        required_fields: &["title"],
        parent: Some(ParentRef {
            column: "turma_id",
            collection: CLASSES,
            owner_column: "teacher_id",
            label_column: "name",
            label: "turma",
            load_failed: "Erro ao carregar turmas",
        }),
        messages: Messages {
            load_failed: "Erro ao carregar atividades",
            created: "Atividade criada com sucesso!",
            updated: "Atividade atualizada com sucesso!",
            deleted: "Atividade excluída com sucesso!",
            create_failed: "Erro ao criar atividade",
            update_failed: "Erro ao atualizar atividade",
            delete_failed: "Erro ao excluir atividade",
        },
    };

    fn id(row: &Assignment) -> Uuid {
        row.id
    }

    fn form_from_row(row: &Assignment) -> AssignmentForm {
        AssignmentForm {
            turma_id: row.turma_id.to_string(),
            title: row.title.clone(),
            description: row.description.clone().unwrap_or_default(),
            due_date: row
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status: row.status,
        }
    }

    fn payload(form: &AssignmentForm) -> Result<Map<String, Value>, ValidationError> {
        let turma_id = Uuid::parse_str(form.turma_id.trim())
            .map_err(|_| ValidationError::MissingParentSelection)?;

        let due_date = match form.due_date.trim() {
            "" => Value::Null,
            text => {
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|_| ValidationError::InvalidDate(text.to_string()))?;
                Value::String(date.format("%Y-%m-%d").to_string())
            }
        };

        let mut fields = Map::new();
        fields.insert("turma_id".into(), Value::String(turma_id.to_string()));
        fields.insert("title".into(), Value::String(form.title.trim().to_string()));
        fields.insert("description".into(), optional_text(&form.description));
        fields.insert("due_date".into(), due_date);
        fields.insert("status".into(), Value::String(form.status.as_str().to_string()));
        Ok(fields)
    }
}
