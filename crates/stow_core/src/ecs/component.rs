// component.rs - Runtime component registration
//
// Components are identified by u32 IDs, not Rust TypeIds, and are
// addressable by name so prototype documents can instantiate them from
// JSON field maps.

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

pub type ComponentId = u32;

/// Builds a boxed component from its JSON field map.
pub type ComponentFactory = fn(Value) -> Result<Box<dyn ErasedComponent>, serde_json::Error>;

/// Metadata describing a registered component kind.
#[derive(Clone, Debug)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: &'static str,
    pub factory: ComponentFactory,
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<ComponentId, ComponentMeta>,
    by_name: HashMap<&'static str, ComponentId>,
}

/// Process-wide table of component kinds. Registration is idempotent.
static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// Register a component's metadata.
///
/// # Panics
/// Re-registering an id under a different name, or a name under a
/// different id, is a programming error and panics.
pub fn register_component(meta: ComponentMeta) {
    let mut registry = REGISTRY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(prev) = registry.by_id.get(&meta.id) {
        assert_eq!(
            prev.name, meta.name,
            "Component name mismatch for id {}: was {}, now {}",
            meta.id, prev.name, meta.name
        );
        return;
    }
    if let Some(prev_id) = registry.by_name.get(meta.name) {
        assert_eq!(
            *prev_id, meta.id,
            "Component id mismatch for name {}: was {}, now {}",
            meta.name, prev_id, meta.id
        );
    }
    registry.by_name.insert(meta.name, meta.id);
    registry.by_id.insert(meta.id, meta);
}

/// Look up component metadata by ID.
pub fn meta_of(id: ComponentId) -> Option<ComponentMeta> {
    REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .by_id
        .get(&id)
        .cloned()
}

/// Look up component metadata by its registered name.
pub fn meta_of_name(name: &str) -> Option<ComponentMeta> {
    let registry = REGISTRY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let id = registry.by_name.get(name)?;
    registry.by_id.get(id).cloned()
}

/// Trait for Rust-defined components.
///
/// Components are plain data that can be built from a prototype's JSON
/// field map, so every component is serde-(de)serializable. Use
/// `#[serde(default)]` to let prototypes omit fields.
pub trait Component: 'static + Sized + Send + Sync + Serialize + DeserializeOwned {
    /// Globally unique component ID.
    const ID: ComponentId;

    /// Name used by prototypes and overrides.
    const NAME: &'static str;

    /// Register this component with the global registry.
    /// Should be called once during startup.
    fn ensure_registered() {
        register_component(ComponentMeta {
            id: Self::ID,
            name: Self::NAME,
            factory: build_from_json::<Self>,
        });
    }
}

fn build_from_json<T: Component>(value: Value) -> Result<Box<dyn ErasedComponent>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<T>(value)?))
}

/// Object-safe view of a component stored in the world.
pub trait ErasedComponent: Any + Send + Sync {
    fn component_id(&self) -> ComponentId;
    fn component_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> ErasedComponent for T {
    fn component_id(&self) -> ComponentId {
        T::ID
    }

    fn component_name(&self) -> &'static str {
        T::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn ErasedComponent {
    /// Borrow as a concrete component type.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Helper macro to implement Component trait.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize, Default)]
/// struct Durability { hits: u32 }
///
/// define_component!(Durability, 40, "Durability");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $id:expr, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const ID: $crate::ecs::ComponentId = $id;
            const NAME: &'static str = $name;
        }
    };
}
