use crate::{
    audit::AuditAction,
    constants::{API_ERROR_PERSON_FIELDS, API_ERROR_PERSON_ID_FORMAT, API_ERROR_PERSON_NOT_FOUND},
    error::ApiError,
    models::{Person, PersonFields, is_valid_identity_number},
    storage::Store,
};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND, API_ERROR_PERSON_NOT_FOUND)
}

fn check_identity_number(value: &str) -> Result<(), ApiError> {
    if is_valid_identity_number(value) {
        Ok(())
    } else {
        Err(ApiError::http(
            StatusCode::BAD_REQUEST,
            API_ERROR_PERSON_ID_FORMAT,
        ))
    }
}

impl Store {
    pub async fn list_persons(&self, actor: &str) -> Result<Vec<Person>, ApiError> {
        let persons = self.list_records::<Person>().await?;
        self.audit(actor, AuditAction::PersonsListed, "Listagem de pessoas")
            .await?;
        Ok(persons)
    }

    #[instrument(skip(self, fields))]
    pub async fn create_person(
        &self,
        actor: &str,
        fields: PersonFields,
    ) -> Result<Person, ApiError> {
        let name = fields
            .name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let (Some(name), Some(role)) = (name, fields.role) else {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_PERSON_FIELDS,
            ));
        };
        let identity_number = fields.identity_number.clone().unwrap_or_default();
        check_identity_number(&identity_number)?;

        let mut person = Person {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            alias: None,
            role,
            identity_number: String::new(),
            phone: None,
            address: None,
            birth_date: None,
            photo: None,
            coordinates: None,
            district: None,
            neighborhood: None,
            municipality: None,
            status: None,
            danger_level: None,
            related_reports: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        fields.apply_to(&mut person);
        person.name = person.name.trim().to_string();

        self.save_record(&person).await?;
        self.audit(
            actor,
            AuditAction::PersonCreated,
            format!("{} - {}", person.name, person.role.as_str()),
        )
        .await?;
        debug!(person_id = person.id, "person registered");
        Ok(person)
    }

    #[instrument(skip(self, fields))]
    pub async fn update_person(
        &self,
        actor: &str,
        id: &str,
        fields: PersonFields,
    ) -> Result<Person, ApiError> {
        let mut person = self
            .load_record::<Person>(id)
            .await?
            .ok_or_else(not_found)?;
        if let Some(number) = fields.identity_number.as_deref() {
            check_identity_number(number)?;
        }
        if fields
            .name
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_PERSON_FIELDS,
            ));
        }
        let previous_name = person.name.clone();
        let previous_update = person.updated_at.unwrap_or(person.created_at);

        fields.apply_to(&mut person);
        person.updated_at = Some(Utc::now().max(previous_update));
        self.save_record(&person).await?;
        self.audit(
            actor,
            AuditAction::PersonUpdated,
            format!("{previous_name} atualizado"),
        )
        .await?;
        Ok(person)
    }

    #[instrument(skip(self))]
    pub async fn delete_person(&self, actor: &str, id: &str) -> Result<(), ApiError> {
        let person = self
            .load_record::<Person>(id)
            .await?
            .ok_or_else(not_found)?;
        self.delete_record::<Person>(&person.id).await?;
        self.audit(
            actor,
            AuditAction::PersonDeleted,
            format!("{} removido do sistema", person.name),
        )
        .await?;
        debug!(person_id = person.id, "person removed");
        Ok(())
    }
}
