//! Canvas template CRUD on top of the object store.

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::template::Template;
use crate::storage::{Persistence, StorageError};

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Template"))
}

fn not_found_as_template(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(_) => AppError::NotFound("Template"),
        other => other.into(),
    }
}

/// Save `template`, overwriting any existing document with the same id.
///
/// A missing id gets a fresh UUID. `createdAt` survives overwrites;
/// `updatedAt` is always reset.
pub async fn save_template(
    persistence: &Persistence,
    mut template: Template,
) -> Result<String, AppError> {
    if template.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Template name is required".to_string()));
    }

    let id = match template.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Uuid::parse_str(id)
            .map_err(|_| AppError::InvalidRequest(format!("Invalid template id: {id}")))?,
        None => Uuid::new_v4(),
    };

    let now = Utc::now();
    let created_at = match persistence.load_template(id).await {
        Ok(existing) => existing.created_at.unwrap_or(now),
        Err(StorageError::NotFound(_)) => now,
        Err(e) => return Err(e.into()),
    };

    template.id = Some(id.to_string());
    template.created_at = Some(created_at);
    template.updated_at = Some(now);
    persistence.save_template(id, &template).await?;

    tracing::info!(template_id = %id, elements = template.elements.as_ref().map_or(0, Vec::len), "template saved");
    Ok(id.to_string())
}

pub async fn get_template(persistence: &Persistence, id: &str) -> Result<Template, AppError> {
    persistence
        .load_template(parse_id(id)?)
        .await
        .map_err(not_found_as_template)
}

pub async fn list_templates(persistence: &Persistence) -> Result<Vec<Template>, AppError> {
    Ok(persistence.list_templates().await?)
}

pub async fn delete_template(persistence: &Persistence, id: &str) -> Result<(), AppError> {
    persistence
        .delete_template(parse_id(id)?)
        .await
        .map_err(not_found_as_template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryObjectStore, UrlSigner};
    use std::sync::Arc;
    use std::time::Duration;

    fn persistence() -> Persistence {
        Persistence::new(
            Arc::new(MemoryObjectStore::new()),
            UrlSigner::new("http://localhost:3000", "secret").unwrap(),
            Duration::from_secs(3600),
        )
    }

    fn template_json() -> serde_json::Value {
        serde_json::json!({
            "name": "Workshop",
            "description": "Two-day workshop layout",
            "orientation": "landscape",
            "size": "A4",
            "backgroundColor": "#ffffff",
            "elements": [{
                "type": "text",
                "content": "{name}",
                "position": {"x": 10, "y": 20.5},
                "size": {"width": 200, "height": 40},
                "style": {"fontSize": 24},
                "dynamicField": "name",
                "rotation": 45,
                "zIndex": 2
            }]
        })
    }

    fn template() -> Template {
        serde_json::from_value(template_json()).unwrap()
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let persistence = persistence();
        let id = save_template(&persistence, template()).await.unwrap();

        let loaded = get_template(&persistence, &id).await.unwrap();
        assert!(loaded.created_at.is_some() && loaded.updated_at.is_some());

        let mut json = serde_json::to_value(&loaded).unwrap();
        let object = json.as_object_mut().unwrap();
        for server_key in ["id", "createdAt", "updatedAt"] {
            assert!(object.remove(server_key).is_some(), "{server_key} missing");
        }
        assert_eq!(json, template_json());
        assert_eq!(
            serde_json::to_string(&json["elements"][0]["position"]).unwrap(),
            r#"{"x":10,"y":20.5}"#
        );
    }

    #[tokio::test]
    async fn overwrite_keeps_created_at() {
        let persistence = persistence();
        let id = save_template(&persistence, template()).await.unwrap();
        let first = get_template(&persistence, &id).await.unwrap();

        let mut changed = template();
        changed.id = Some(id.clone());
        changed.name = "Renamed".into();
        save_template(&persistence, changed).await.unwrap();

        let second = get_template(&persistence, &id).await.unwrap();
        assert_eq!(second.name, "Renamed");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(list_templates(&persistence).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let persistence = persistence();
        for id in [Uuid::new_v4().to_string(), "../../etc".to_string()] {
            assert!(matches!(
                get_template(&persistence, &id).await,
                Err(AppError::NotFound("Template"))
            ));
            assert!(matches!(
                delete_template(&persistence, &id).await,
                Err(AppError::NotFound("Template"))
            ));
        }
    }

    #[tokio::test]
    async fn invalid_supplied_id_is_rejected() {
        let mut t = template();
        t.id = Some("not-a-uuid".into());
        assert!(matches!(
            save_template(&persistence(), t).await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
