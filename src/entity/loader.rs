//! Loader (C11): text file -> entity document -> typed, validated entity.

use std::path::{Path, PathBuf};

use log::warn;

use super::Entity;
use crate::error::Result;

/// Parse a single entity document (already read into a generic JSON value, the
/// shared intermediate representation for both the `.yaml` and `.json` entity
/// file formats) into its typed variant, running the variant's validator.
pub fn create_entity(value: serde_json::Value) -> Result<Entity> {
    let entity: Entity = serde_json::from_value(value)?;
    match &entity {
        Entity::Employee(e) => e.validate()?,
        Entity::Grant(e) => e.validate()?,
        Entity::Investment(e) => e.validate()?,
        Entity::Sale(e) => e.validate()?,
        Entity::Service(e) => e.validate()?,
        Entity::Facility(e) => e.validate()?,
        Entity::Software(e) => e.validate()?,
        Entity::Equipment(e) => e.validate()?,
        Entity::Project(e) => e.validate()?,
        Entity::Shareholder(e) => e.validate()?,
        Entity::ShareClass(e) => e.validate()?,
        Entity::FundingRound(e) => e.validate()?,
    }
    Ok(entity)
}

/// Recursive directory loader for entity `.yaml`/`.json` files, matching the
/// directory convention of §6 (not enforced, only a default when generating).
pub struct EntityLoader {
    root: PathBuf,
}

impl EntityLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load_file(&self, path: &Path) -> Result<Entity> {
        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_yaml::from_str(&text)?;
        create_entity(value)
    }

    /// Walk the root recursively, loading every `.yaml`/`.yml`/`.json` file.
    /// A file that fails to load is logged and skipped rather than aborting
    /// the whole sync, matching the store's `SyncFromDir` semantics.
    pub fn load_all(&self) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let read_dir = std::fs::read_dir(&dir)?;
            for entry in read_dir {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let is_entity_file = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| matches!(ext, "yaml" | "yml" | "json"))
                    .unwrap_or(false);
                if !is_entity_file {
                    continue;
                }
                match self.load_file(&path) {
                    Ok(entity) => entities.push(entity),
                    Err(err) => warn!("failed to load entity file {}: {}", path.display(), err),
                }
            }
        }
        Ok(entities)
    }
}

impl EntityLoader {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_entity_from_minimal_employee_document() {
        let value = serde_json::json!({
            "type": "employee",
            "name": "Alice",
            "start_date": "2024-01-01",
            "salary": 120000.0,
        });
        let entity = create_entity(value).unwrap();
        assert_eq!(entity.type_tag(), "employee");
        assert_eq!(entity.name(), "Alice");
    }

    #[test]
    fn create_entity_rejects_missing_required_field() {
        let value = serde_json::json!({
            "type": "employee",
            "name": "Alice",
            "start_date": "2024-01-01",
        });
        assert!(create_entity(value).is_err());
    }

    #[test]
    fn create_entity_preserves_extra_fields() {
        let value = serde_json::json!({
            "type": "employee",
            "name": "Alice",
            "start_date": "2024-01-01",
            "salary": 120000.0,
            "department": "engineering",
        });
        let entity = create_entity(value).unwrap();
        if let Entity::Employee(e) = entity {
            assert_eq!(
                e.base.extra.get("department").and_then(|v| v.as_str()),
                Some("engineering")
            );
        } else {
            panic!("expected employee");
        }
    }
}
