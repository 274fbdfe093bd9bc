//! Classes ("turmas")

use serde_json::{Map, Value};
use uuid::Uuid;

use super::resource::{optional_text, FormFields, Messages, Resource, ResourceDescriptor};
use crate::error::ValidationError;
use crate::models::{Class, CLASSES};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassForm {
    pub name: String,
    pub description: String,
    pub grade_level: String,
    pub subject: String,
}

impl FormFields for ClassForm {
    fn field(&self, name: &str) -> &str {
        match name {
            "name" => &self.name,
            "description" => &self.description,
            "grade_level" => &self.grade_level,
            "subject" => &self.subject,
            _ => "",
        }
    }
}

pub struct ClassResource;

impl Resource for ClassResource {
    type Row = Class;
    type Form = ClassForm;

    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        collection: CLASSES,
        select: "*",
        owner_column: "teacher_id",
        order_column: "created_at",
        required_fields: &["name"],
        parent: None,
        messages: Messages {
            load_failed: "Erro ao carregar turmas",
            created: "Turma criada com sucesso!",
            updated: "Turma atualizada com sucesso!",
            deleted: "Turma excluída com sucesso!",
            create_failed: "Erro ao criar turma",
            update_failed: "Erro ao atualizar turma",
            delete_failed: "Erro ao excluir turma",
        },
    };

    fn id(row: &Class) -> Uuid {
        row.id
    }

    fn form_from_row(row: &Class) -> ClassForm {
        ClassForm {
            name: row.name.clone(),
            description: row.description.clone().unwrap_or_default(),
            grade_level: row.grade_level.clone().unwrap_or_default(),
            subject: row.subject.clone().unwrap_or_default(),
        }
    }

    fn payload(form: &ClassForm) -> Result<Map<String, Value>, ValidationError> {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(form.name.trim().to_string()));
        fields.insert("description".into(), optional_text(&form.description));
        fields.insert("grade_level".into(), optional_text(&form.grade_level));
        fields.insert("subject".into(), optional_text(&form.subject));
        Ok(fields)
    }
}
