//! Entity Store (C4): an indexed, persistent entity index with active-on-date
//! queries. Readers observe a consistent snapshot via a copy-on-write pointer
//! swap; writers are serialized behind a mutex.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use log::info;

use crate::entity::{Entity, EntityLoader};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub active_on: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub name_contains: Option<String>,
}

/// A snapshot of the store's entities at a point in time; cheap to clone
/// (an `Arc` bump) so the engine can hand readers a stable view mid-computation.
#[derive(Clone, Default)]
struct Snapshot {
    entities: Arc<Vec<Entity>>,
}

pub struct EntityStore {
    snapshot: RwLock<Snapshot>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new()
    }

    /// Walk `path` recursively, load and validate every entity file, and
    /// atomically replace the in-store set. A per-file failure is logged and
    /// skipped by the loader; it does not abort the sync.
    pub fn sync_from_dir(&self, path: &Path) -> Result<usize> {
        let loader = EntityLoader::new(path);
        let entities = loader.load_all()?;
        let count = entities.len();
        info!("synced {count} entities from {}", path.display());
        *self.snapshot.write().unwrap() = Snapshot {
            entities: Arc::new(entities),
        };
        Ok(count)
    }

    pub fn add(&self, entity: Entity) {
        let mut guard = self.snapshot.write().unwrap();
        let mut entities = (*guard.entities).clone();
        entities.push(entity);
        guard.entities = Arc::new(entities);
    }

    /// Matches by `(name, type)`; falls back to `add` when no match exists.
    pub fn update(&self, entity: Entity) {
        let mut guard = self.snapshot.write().unwrap();
        let mut entities = (*guard.entities).clone();
        if let Some(existing) = entities
            .iter_mut()
            .find(|e| e.name() == entity.name() && e.type_tag() == entity.type_tag())
        {
            *existing = entity;
        } else {
            entities.push(entity);
        }
        guard.entities = Arc::new(entities);
    }

    pub fn delete(&self, name: &str, entity_type: Option<&str>) -> bool {
        let mut guard = self.snapshot.write().unwrap();
        let mut entities = (*guard.entities).clone();
        let before = entities.len();
        entities.retain(|e| {
            !(e.name() == name && entity_type.map(|t| t == e.type_tag()).unwrap_or(true))
        });
        let removed = entities.len() != before;
        guard.entities = Arc::new(entities);
        removed
    }

    /// Snapshot read: the returned vector is independent of subsequent
    /// writers, so a computation in progress never observes a mid-sync set.
    pub fn all(&self) -> Arc<Vec<Entity>> {
        self.snapshot.read().unwrap().entities.clone()
    }

    pub fn query(&self, filter: &EntityFilter) -> Vec<Entity> {
        self.all()
            .iter()
            .filter(|e| {
                if let Some(t) = &filter.entity_type {
                    if e.type_tag() != t {
                        return false;
                    }
                }
                if let Some(d) = filter.active_on {
                    if !e.is_active(d) {
                        return false;
                    }
                }
                if !filter.tags.is_empty() {
                    let entity_tags: std::collections::HashSet<&str> =
                        e.tags().iter().map(|s| s.as_str()).collect();
                    if !filter.tags.iter().any(|t| entity_tags.contains(t.as_str())) {
                        return false;
                    }
                }
                if let Some(sub) = &filter.name_contains {
                    if !e.name().contains(sub.as_str()) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    pub fn get_by_name(&self, name: &str, entity_type: Option<&str>) -> Option<Entity> {
        self.all()
            .iter()
            .find(|e| e.name() == name && entity_type.map(|t| t == e.type_tag()).unwrap_or(true))
            .cloned()
    }

    pub fn get_by_type(&self, entity_type: &str) -> Vec<Entity> {
        self.query(&EntityFilter {
            entity_type: Some(entity_type.to_string()),
            ..Default::default()
        })
    }

    pub fn get_by_tags(&self, tags: &[String]) -> Vec<Entity> {
        self.query(&EntityFilter {
            tags: tags.to_vec(),
            ..Default::default()
        })
    }

    pub fn get_active_on(&self, as_of_date: NaiveDate, entity_type: Option<&str>) -> Vec<Entity> {
        self.query(&EntityFilter {
            entity_type: entity_type.map(|s| s.to_string()),
            active_on: Some(as_of_date),
            ..Default::default()
        })
    }

    /// Counts of entities grouped by type, used by log statements and the
    /// demo binary's summary output.
    pub fn type_counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for e in self.all().iter() {
            *counts.entry(e.type_tag()).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, EntityBase};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn employee(name: &str, start: &str) -> Entity {
        Entity::Employee(Employee {
            base: EntityBase::new(name, date(start)),
            salary: 100_000.0,
            overhead_multiplier: 1.3,
            benefits_annual: 0.0,
            home_office_stipend: 0.0,
            allowances_annual: 0.0,
            signing_bonus: 0.0,
            relocation_assistance: 0.0,
            bonus_performance_max: 0.0,
            bonus_milestone_max: 0.0,
            equity: None,
        })
    }

    #[test]
    fn add_then_query_by_type() {
        let store = EntityStore::new();
        store.add(employee("Alice", "2024-01-01"));
        store.add(employee("Bob", "2024-03-01"));
        assert_eq!(store.get_by_type("employee").len(), 2);
        assert_eq!(
            store.get_active_on(date("2024-02-01"), Some("employee")).len(),
            1
        );
    }

    #[test]
    fn update_falls_back_to_add() {
        let store = EntityStore::new();
        store.update(employee("Alice", "2024-01-01"));
        assert_eq!(store.all().len(), 1);
        store.update(employee("Alice", "2024-02-01"));
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get_by_name("Alice", None).unwrap().base().start_date, date("2024-02-01"));
    }

    #[test]
    fn delete_removes_matching_entity() {
        let store = EntityStore::new();
        store.add(employee("Alice", "2024-01-01"));
        assert!(store.delete("Alice", Some("employee")));
        assert!(store.all().is_empty());
    }
}
