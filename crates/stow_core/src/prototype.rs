//! Prototypes: named templates that produce an entity's initial components.
//!
//! A prototype maps component names to JSON field maps. Overrides given at
//! spawn time are merged field-by-field over those maps before any
//! component is built, so a bad override fails the spawn before an entity
//! is allocated.

use crate::components::ActorComponent;
use crate::container::ContainerSpec;
use crate::ecs::{meta_of_name, Component, ErasedComponent};
use crate::error::{LifecycleError, PrototypeError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Component name to initial field values.
pub type ComponentOverrides = BTreeMap<String, Value>;

/// A named entity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub id: String,
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerSpec>,
}

impl Prototype {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            components: BTreeMap::new(),
            containers: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, name: impl Into<String>, fields: Value) -> Self {
        self.components.insert(name.into(), fields);
        self
    }

    pub fn with_container(mut self, name: impl Into<String>, spec: ContainerSpec) -> Self {
        self.containers.insert(name.into(), spec);
        self
    }
}

/// Contract consumed from prototype resolution.
pub trait PrototypeIndex: Send + Sync {
    fn index(&self, id: &str) -> Option<&Prototype>;
}

/// In-memory prototype collection, loadable from JSON documents.
#[derive(Debug, Default, Clone)]
pub struct PrototypeSet {
    prototypes: HashMap<String, Prototype>,
}

impl PrototypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of prototypes.
    pub fn from_json_str(document: &str) -> Result<Self, PrototypeError> {
        let mut set = Self::new();
        set.load_json_str(document)?;
        Ok(set)
    }

    /// Add every prototype from a JSON array. Returns how many were added.
    pub fn load_json_str(&mut self, document: &str) -> Result<usize, PrototypeError> {
        let parsed: Vec<Prototype> = serde_json::from_str(document)?;
        let count = parsed.len();
        for prototype in parsed {
            self.insert(prototype)?;
        }
        Ok(count)
    }

    pub fn insert(&mut self, prototype: Prototype) -> Result<(), PrototypeError> {
        if self.prototypes.contains_key(&prototype.id) {
            return Err(PrototypeError::Duplicate { id: prototype.id });
        }
        self.prototypes.insert(prototype.id.clone(), prototype);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

impl PrototypeIndex for PrototypeSet {
    fn index(&self, id: &str) -> Option<&Prototype> {
        self.prototypes.get(id)
    }
}

/// Components and containers ready to be attached to a fresh entity.
pub struct ResolvedTemplate {
    pub components: Vec<Box<dyn ErasedComponent>>,
    pub containers: Vec<(String, ContainerSpec)>,
}

/// Build the component set for `prototype` with `overrides` applied.
pub fn resolve(
    prototype: Option<&Prototype>,
    overrides: Option<&ComponentOverrides>,
) -> Result<ResolvedTemplate, LifecycleError> {
    let mut fields: BTreeMap<String, Value> = prototype
        .map(|p| p.components.clone())
        .unwrap_or_default();
    if let Some(overrides) = overrides {
        for (name, patch) in overrides {
            match fields.get_mut(name) {
                Some(base) => merge_fields(base, patch.clone()),
                None => {
                    fields.insert(name.clone(), patch.clone());
                }
            }
        }
    }

    let mut components = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        if name == ActorComponent::NAME {
            return Err(LifecycleError::ReservedComponent { name });
        }
        let meta = meta_of_name(&name).ok_or_else(|| LifecycleError::UnknownComponent {
            name: name.clone(),
        })?;
        let value = match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let component = (meta.factory)(value).map_err(|err| LifecycleError::InvalidComponentData {
            name,
            reason: err.to_string(),
        })?;
        components.push(component);
    }

    let containers = prototype
        .map(|p| {
            p.containers
                .iter()
                .map(|(name, spec)| (name.clone(), spec.clone()))
                .collect()
        })
        .unwrap_or_default();

    Ok(ResolvedTemplate {
        components,
        containers,
    })
}

/// Shallow merge: object patches overwrite individual fields, anything else
/// replaces the base value.
fn merge_fields(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Stack {
        count: u32,
        max: u32,
    }
    define_component!(Stack, 920, "Stack");

    const DOCUMENT: &str = r#"[
        { "id": "coin", "components": { "Stack": { "count": 1, "max": 50 } } },
        { "id": "purse", "containers": { "coins": { "capacity": 3, "whitelist": ["coin"] } } }
    ]"#;

    #[test]
    fn loads_prototypes_and_rejects_duplicates() {
        let mut set = PrototypeSet::from_json_str(DOCUMENT).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.index("purse").unwrap().containers["coins"].capacity,
            Some(3)
        );
        assert!(matches!(
            set.insert(Prototype::new("coin")),
            Err(PrototypeError::Duplicate { .. })
        ));
        assert!(PrototypeSet::from_json_str("{").is_err());
    }

    #[test]
    fn overrides_merge_over_prototype_fields() {
        Stack::ensure_registered();
        let set = PrototypeSet::from_json_str(DOCUMENT).unwrap();
        let overrides: ComponentOverrides = [("Stack".to_string(), json!({ "count": 7 }))].into();

        let resolved = resolve(set.index("coin"), Some(&overrides)).unwrap();
        assert_eq!(resolved.components.len(), 1);
        assert_eq!(
            resolved.components[0].downcast_ref::<Stack>(),
            Some(&Stack { count: 7, max: 50 })
        );
    }

    #[test]
    fn null_fields_build_defaults_and_unknown_names_fail() {
        Stack::ensure_registered();
        let proto = Prototype::new("blank").with_component("Stack", Value::Null);
        let resolved = resolve(Some(&proto), None).unwrap();
        assert_eq!(resolved.components[0].downcast_ref::<Stack>(), Some(&Stack::default()));

        let bad = Prototype::new("bad").with_component("Nope", json!({}));
        assert_eq!(
            resolve(Some(&bad), None).err(),
            Some(LifecycleError::UnknownComponent { name: "Nope".into() })
        );

        let wrong = Prototype::new("wrong").with_component("Stack", json!({ "count": "x" }));
        assert!(matches!(
            resolve(Some(&wrong), None),
            Err(LifecycleError::InvalidComponentData { .. })
        ));
    }

    #[test]
    fn actor_marker_cannot_come_from_templates() {
        let proto = Prototype::new("puppet").with_component("Actor", json!({ "session": 1 }));
        assert_eq!(
            resolve(Some(&proto), None).err(),
            Some(LifecycleError::ReservedComponent { name: "Actor".into() })
        );

        let overrides: ComponentOverrides = [("Actor".to_string(), json!({ "session": 1 }))].into();
        assert_eq!(
            resolve(None, Some(&overrides)).err(),
            Some(LifecycleError::ReservedComponent { name: "Actor".into() })
        );
    }
}
