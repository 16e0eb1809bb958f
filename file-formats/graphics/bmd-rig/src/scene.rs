//! Instance arena with attachment links
//!
//! Instances live in generational slots and refer to each other only through
//! [`InstanceHandle`]s, so a composite object and its parts never own each
//! other. Links are set once; [`InstanceArena::update_all`] walks the
//! attachment forest parents-first so every child reads matrices from the
//! same tick.

use glam::Mat4;

use crate::attachment::{AttachmentLink, SocketPlacement, decompose_socket};
use crate::error::{Result, RigError};
use crate::instance::{InstanceTick, ModelInstance};

/// Generational handle to an instance in an [`InstanceArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Entry {
    instance: ModelInstance,
    parent: Option<(InstanceHandle, AttachmentLink)>,
    children: Vec<InstanceHandle>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Owner of every live instance and of the links between them
#[derive(Debug, Default)]
pub struct InstanceArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Parents-first update order, rebuilt after structural changes
    order: Vec<InstanceHandle>,
    order_valid: bool,
}

impl InstanceArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an instance and return its handle
    pub fn spawn(&mut self, instance: ModelInstance) -> InstanceHandle {
        let entry = Entry {
            instance,
            parent: None,
            children: Vec::new(),
        };

        let index = if let Some(index) = self.free.pop() {
            self.slots[index as usize].entry = Some(entry);
            index
        } else {
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            (self.slots.len() - 1) as u32
        };

        self.order_valid = false;
        InstanceHandle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn entry(&self, handle: InstanceHandle) -> Option<&Entry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: InstanceHandle) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn require(&self, handle: InstanceHandle) -> Result<&Entry> {
        self.entry(handle)
            .ok_or_else(|| RigError::InvalidHandle(handle.to_string()))
    }

    /// Check if a handle refers to a live instance
    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.entry(handle).is_some()
    }

    /// Get an instance
    pub fn get(&self, handle: InstanceHandle) -> Option<&ModelInstance> {
        self.entry(handle).map(|e| &e.instance)
    }

    /// Get an instance for mutation (action switches, placement)
    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut ModelInstance> {
        self.entry_mut(handle).map(|e| &mut e.instance)
    }

    /// Get number of live instances
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// Check if the arena holds no instances
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Link `child` to `parent`
    ///
    /// Links are permanent until the child is despawned. A child can have
    /// only one parent and may not be its own ancestor.
    pub fn attach(
        &mut self,
        parent: InstanceHandle,
        child: InstanceHandle,
        link: AttachmentLink,
    ) -> Result<()> {
        let parent_entry = self.require(parent)?;
        let child_entry = self.require(child)?;

        if child_entry.parent.is_some() {
            return Err(RigError::AlreadyAttached(child.to_string()));
        }

        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(RigError::AttachmentCycle(format!(
                    "{child} is an ancestor of {parent}"
                )));
            }
            cursor = self.entry(current).and_then(|e| e.parent.map(|(p, _)| p));
        }

        if let AttachmentLink::Socket(bone) = link
            && let Some(model) = parent_entry.instance.model()
            && bone >= model.bone_count()
        {
            return Err(RigError::SocketOutOfRange {
                bone,
                count: model.bone_count(),
            });
        }

        if let Some(entry) = self.entry_mut(child) {
            entry.parent = Some((parent, link));
            entry.instance.set_mirrored(link.is_mirror());
        }
        if let Some(entry) = self.entry_mut(parent) {
            entry.children.push(child);
        }

        log::debug!("Attached {child} to {parent} as {link:?}");
        self.order_valid = false;
        if link.is_mirror() {
            self.refresh_mirror(child, true);
        }
        Ok(())
    }

    /// Get the parent and link of an instance
    pub fn parent(&self, child: InstanceHandle) -> Option<(InstanceHandle, AttachmentLink)> {
        self.entry(child)?.parent
    }

    /// Get the instances attached to `parent`
    pub fn children(&self, parent: InstanceHandle) -> &[InstanceHandle] {
        self.entry(parent).map_or(&[], |e| e.children.as_slice())
    }

    /// Instance whose evaluator produces the pose of `handle`
    ///
    /// Follows Mirror links up to the first instance that animates itself.
    pub fn pose_source(&self, handle: InstanceHandle) -> Option<InstanceHandle> {
        let mut current = handle;
        loop {
            match self.entry(current)?.parent {
                Some((parent, AttachmentLink::Mirror)) => current = parent,
                _ => return Some(current),
            }
        }
    }

    /// Bone world matrices of an instance, resolving Mirror links
    pub fn bone_matrices(&self, handle: InstanceHandle) -> Option<&[Mat4]> {
        let source = self.pose_source(handle)?;
        self.get(source).map(ModelInstance::bone_matrices)
    }

    /// Handles in parents-first order
    pub fn update_order(&mut self) -> &[InstanceHandle] {
        if !self.order_valid {
            self.rebuild_order();
        }
        &self.order
    }

    fn rebuild_order(&mut self) {
        let mut order = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(entry) = &slot.entry
                && entry.parent.is_none()
            {
                order.push(InstanceHandle {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }

        let mut cursor = 0;
        while cursor < order.len() {
            let handle = order[cursor];
            if let Some(entry) = self.entry(handle) {
                order.extend_from_slice(&entry.children);
            }
            cursor += 1;
        }

        self.order = order;
        self.order_valid = true;
    }

    /// Advance every instance by `delta_seconds`, parents before children
    ///
    /// Mirror children copy their source's matrices into their skin buffers
    /// when the source changed; socket children are re-anchored at the
    /// parent bone before their own playback runs.
    pub fn update_all(&mut self, delta_seconds: f64) -> Vec<(InstanceHandle, InstanceTick)> {
        if !self.order_valid {
            self.rebuild_order();
        }
        let order = std::mem::take(&mut self.order);
        let mut ticks = Vec::with_capacity(order.len());

        for &handle in &order {
            let link = self.parent(handle);
            let tick = match link {
                None => self
                    .get_mut(handle)
                    .map(|instance| instance.update(delta_seconds)),
                Some((_, AttachmentLink::Mirror)) => self.refresh_mirror(handle, false),
                Some((parent, AttachmentLink::Socket(bone))) => {
                    let socket = self.socket_placement(parent, bone);
                    self.get_mut(handle).map(|instance| {
                        if let Some(socket) = socket {
                            instance.apply_socket(socket);
                        }
                        instance.update(delta_seconds)
                    })
                }
            };
            if let Some(tick) = tick {
                ticks.push((handle, tick));
            }
        }

        self.order = order;
        ticks
    }

    /// Placement of a socket on `parent`'s bone
    ///
    /// Mirror parents carry no placement of their own; both the root and the
    /// bone come from the instance they mirror.
    fn socket_placement(&self, parent: InstanceHandle, bone: usize) -> Option<SocketPlacement> {
        let source = self.get(self.pose_source(parent)?)?;
        let bone_world = source
            .bone_matrices()
            .get(bone)
            .copied()
            .unwrap_or(Mat4::IDENTITY);
        Some(decompose_socket(source.root_matrix(), bone_world))
    }

    fn refresh_mirror(&mut self, child: InstanceHandle, force: bool) -> Option<InstanceTick> {
        let source = self.pose_source(child)?;
        let (source_index, child_index) = (source.index as usize, child.index as usize);
        if source_index == child_index {
            return None;
        }

        // Split the slots so the source is read while the child is written
        let (source_slot, child_slot) = if source_index < child_index {
            let (head, tail) = self.slots.split_at_mut(child_index);
            (&head[source_index], &mut tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(source_index);
            (&tail[0], &mut head[child_index])
        };

        let source = &source_slot.entry.as_ref()?.instance;
        let child = &mut child_slot.entry.as_mut()?.instance;
        Some(child.refresh_mirrored(source.bone_matrices(), force || source.is_dirty()))
    }

    /// Dispose an instance and everything attached to it
    ///
    /// Returns the number of instances removed.
    pub fn despawn(&mut self, handle: InstanceHandle) -> Result<usize> {
        let parent = self.require(handle)?.parent;
        if let Some((parent, _)) = parent
            && let Some(entry) = self.entry_mut(parent)
        {
            entry.children.retain(|&c| c != handle);
        }

        let mut stack = vec![handle];
        let mut removed = 0;
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if slot.generation != current.generation {
                continue;
            }
            if let Some(mut entry) = slot.entry.take() {
                entry.instance.dispose();
                stack.extend(entry.children.drain(..));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                removed += 1;
            }
        }

        log::debug!("Despawned {handle} ({removed} instances)");
        self.order_valid = false;
        Ok(removed)
    }
}
