//! Spawn registry mapping numeric object types to constructors
//!
//! Every spawnable type registers a build closure that assembles a
//! [`Composite`] from cached models and, optionally, a setup closure that
//! runs once the composite is live (initial action, part placement).

use std::collections::BTreeMap;

use crate::cache::{AssetSource, ModelCache};
use crate::composite::Composite;
use crate::error::{Result, RigError};
use crate::instance::ModelInstance;
use crate::scene::InstanceArena;

/// Builds a composite for one spawn type
pub type BuildFn<S> = Box<dyn Fn(&mut InstanceArena, &mut ModelCache<S>) -> Result<Composite>>;

/// Post-load step run on a freshly built composite
pub type SetupFn = Box<dyn Fn(&mut InstanceArena, &Composite) -> Result<()>>;

struct Registration<S> {
    build: BuildFn<S>,
    setup: Option<SetupFn>,
}

/// Factory map from spawn type id to construction closures
pub struct SpawnRegistry<S> {
    entries: BTreeMap<u32, Registration<S>>,
}

impl<S> std::fmt::Debug for SpawnRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S> Default for SpawnRegistry<S> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<S: AssetSource + 'static> SpawnRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a build closure; replaces any previous registration
    pub fn register<F>(&mut self, type_id: u32, build: F)
    where
        F: Fn(&mut InstanceArena, &mut ModelCache<S>) -> Result<Composite> + 'static,
    {
        self.insert(type_id, Box::new(build), None);
    }

    /// Register a build closure plus a post-load setup step
    pub fn register_with_setup<F, G>(&mut self, type_id: u32, build: F, setup: G)
    where
        F: Fn(&mut InstanceArena, &mut ModelCache<S>) -> Result<Composite> + 'static,
        G: Fn(&mut InstanceArena, &Composite) -> Result<()> + 'static,
    {
        self.insert(type_id, Box::new(build), Some(Box::new(setup)));
    }

    /// Register a single-model type that starts on `initial_action`
    pub fn register_model(&mut self, type_id: u32, path: impl Into<String>, initial_action: usize) {
        let path = path.into();
        self.register_with_setup(
            type_id,
            move |arena, cache| {
                let model = cache.load(&path)?;
                let instance = ModelInstance::from_model(model.name.clone(), model)?;
                Ok(Composite::spawn(arena, instance))
            },
            move |arena, composite| {
                if let Some(root) = arena.get_mut(composite.root()) {
                    root.set_action(initial_action);
                }
                Ok(())
            },
        );
    }

    fn insert(&mut self, type_id: u32, build: BuildFn<S>, setup: Option<SetupFn>) {
        if self
            .entries
            .insert(type_id, Registration { build, setup })
            .is_some()
        {
            log::debug!("Spawn type {type_id} re-registered");
        }
    }

    /// Check if a type id is registered
    pub fn contains(&self, type_id: u32) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Registered type ids in ascending order
    pub fn type_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Build and set up an object of `type_id`
    ///
    /// A failing setup step despawns whatever the build step created.
    pub fn spawn(
        &self,
        type_id: u32,
        arena: &mut InstanceArena,
        cache: &mut ModelCache<S>,
    ) -> Result<Composite> {
        let registration = self
            .entries
            .get(&type_id)
            .ok_or(RigError::UnknownSpawnType(type_id))?;

        let composite = (registration.build)(arena, cache)?;
        if let Some(setup) = &registration.setup
            && let Err(e) = setup(arena, &composite)
        {
            composite.despawn(arena)?;
            return Err(e);
        }

        log::debug!("Spawned type {type_id} as {}", composite.root());
        Ok(composite)
    }
}
