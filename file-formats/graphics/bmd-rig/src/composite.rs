//! Composite objects built from named parts
//!
//! A player avatar is a body instance plus parts (helm, armor, weapon,
//! wings) linked to it. Parts are referenced by handle; replacing a part
//! despawns the old one together with anything attached to it.

use std::collections::BTreeMap;

use crate::attachment::AttachmentLink;
use crate::error::{Result, RigError};
use crate::instance::ModelInstance;
use crate::scene::{InstanceArena, InstanceHandle};

/// Root instance plus named attached parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    root: InstanceHandle,
    parts: BTreeMap<String, InstanceHandle>,
}

impl Composite {
    /// Wrap an already spawned root instance
    pub fn new(root: InstanceHandle) -> Self {
        Self {
            root,
            parts: BTreeMap::new(),
        }
    }

    /// Spawn `instance` as the root of a new composite
    pub fn spawn(arena: &mut InstanceArena, instance: ModelInstance) -> Self {
        Self::new(arena.spawn(instance))
    }

    /// Get the root instance
    pub fn root(&self) -> InstanceHandle {
        self.root
    }

    /// Get a part by name
    pub fn part(&self, name: &str) -> Option<InstanceHandle> {
        self.parts.get(name).copied()
    }

    /// Iterate over parts in name order
    pub fn parts(&self) -> impl Iterator<Item = (&str, InstanceHandle)> {
        self.parts.iter().map(|(name, &handle)| (name.as_str(), handle))
    }

    /// Attach `instance` to the root under `name`
    ///
    /// An existing part with the same name is despawned first.
    pub fn set_part(
        &mut self,
        arena: &mut InstanceArena,
        name: impl Into<String>,
        instance: ModelInstance,
        link: AttachmentLink,
    ) -> Result<InstanceHandle> {
        if !arena.contains(self.root) {
            return Err(RigError::InvalidHandle(self.root.to_string()));
        }

        let name = name.into();
        if let Some(old) = self.parts.remove(&name) {
            log::debug!("Replacing part {name}");
            arena.despawn(old)?;
        }

        let handle = arena.spawn(instance);
        if let Err(e) = arena.attach(self.root, handle, link) {
            arena.despawn(handle)?;
            return Err(e);
        }

        self.parts.insert(name, handle);
        Ok(handle)
    }

    /// Remove a part; returns false if no part had that name
    pub fn remove_part(&mut self, arena: &mut InstanceArena, name: &str) -> Result<bool> {
        match self.parts.remove(name) {
            Some(handle) => {
                arena.despawn(handle)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Despawn the root and every part
    pub fn despawn(self, arena: &mut InstanceArena) -> Result<usize> {
        arena.despawn(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, KeyframeTrack, RiggedModel};
    use glam::{Quat, Vec3};
    use std::sync::Arc;

    fn model(bones: usize) -> Arc<RiggedModel> {
        let mut builder = RiggedModel::builder("part").bone("root", None);
        for i in 1..bones {
            builder = builder.bone(format!("b{i}"), Some(0));
        }
        let tracks = vec![KeyframeTrack::constant(Quat::IDENTITY, Vec3::Z, 2); bones];
        Arc::new(builder.action(Action::new(2, 1.0), tracks).build())
    }

    fn part(name: &str) -> ModelInstance {
        ModelInstance::from_model(name, model(2)).unwrap()
    }

    #[test]
    fn test_parts_are_linked_to_root() {
        let mut arena = InstanceArena::new();
        let mut avatar = Composite::spawn(&mut arena, part("body"));

        let helm = avatar
            .set_part(&mut arena, "helm", part("helm"), AttachmentLink::Mirror)
            .unwrap();
        let wings = avatar
            .set_part(&mut arena, "wings", part("wings"), AttachmentLink::Socket(1))
            .unwrap();

        assert_eq!(avatar.part("helm"), Some(helm));
        assert_eq!(arena.parent(helm), Some((avatar.root(), AttachmentLink::Mirror)));
        assert_eq!(arena.parent(wings), Some((avatar.root(), AttachmentLink::Socket(1))));
        let names: Vec<&str> = avatar.parts().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["helm", "wings"]);
    }

    #[test]
    fn test_replacing_part_despawns_old() {
        let mut arena = InstanceArena::new();
        let mut avatar = Composite::spawn(&mut arena, part("body"));

        let first = avatar
            .set_part(&mut arena, "weapon", part("sword"), AttachmentLink::Socket(1))
            .unwrap();
        let second = avatar
            .set_part(&mut arena, "weapon", part("axe"), AttachmentLink::Socket(1))
            .unwrap();

        assert!(!arena.contains(first));
        assert!(arena.contains(second));
        assert_eq!(arena.children(avatar.root()), &[second]);
    }

    #[test]
    fn test_failed_attach_leaves_no_orphan() {
        let mut arena = InstanceArena::new();
        let mut avatar = Composite::spawn(&mut arena, part("body"));

        let result = avatar.set_part(&mut arena, "wings", part("wings"), AttachmentLink::Socket(9));
        assert!(result.is_err());
        assert_eq!(arena.len(), 1);
        assert_eq!(avatar.part("wings"), None);
    }

    #[test]
    fn test_remove_and_despawn() {
        let mut arena = InstanceArena::new();
        let mut avatar = Composite::spawn(&mut arena, part("body"));
        avatar
            .set_part(&mut arena, "helm", part("helm"), AttachmentLink::Mirror)
            .unwrap();
        avatar
            .set_part(&mut arena, "armor", part("armor"), AttachmentLink::Mirror)
            .unwrap();

        assert!(avatar.remove_part(&mut arena, "helm").unwrap());
        assert!(!avatar.remove_part(&mut arena, "helm").unwrap());
        assert_eq!(avatar.despawn(&mut arena).unwrap(), 2);
        assert!(arena.is_empty());
    }
}
