//! # Scene
//!
//! Entity store shared by the chunk streamer and the rendering system.
//!
//! ## Key Components
//! - `Scene`: owns entities, allocates entity and mesh ids, records lifecycle events
//! - `EntityConfig`: template an entity is instantiated from
//! - `Entity`: tag, parent link, local transform and optional mesh/material
//! - `SceneEvent`: `Created` / `Destroyed` notifications drained once per frame
//!
//! Entities are kept in id order, so iteration order is creation order. Destroying an
//! entity destroys its descendants first; every removed entity is reported exactly
//! once, carrying its components so observers can release what they hold.

pub mod component;

use std::collections::BTreeMap;
use std::sync::Arc;

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Transform, Vector3};

pub use component::{ComponentMask, MaterialComponent, MeshHandle, MeshId};

use crate::{
    engine_state::rendering::mesh::Mesh,
    error::{EngineError, EngineResult},
};

/// Scene-unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Template an entity is instantiated from.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Optional name used by `Scene::find_by_tag`.
    pub tag: Option<String>,
    /// Parent entity; the local transform is relative to it.
    pub parent: Option<EntityId>,
    /// Local transform.
    pub transform: Matrix4<f32>,
    /// Geometry to draw.
    pub mesh: Option<MeshHandle>,
    /// Program and material to draw with.
    pub material: Option<MaterialComponent>,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            tag: None,
            parent: None,
            transform: Matrix4::identity(),
            mesh: None,
            material: None,
        }
    }
}

impl EntityConfig {
    /// Sets the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the parent.
    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the local transform to a translation.
    pub fn with_translation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform = Matrix4::from_translation(Vector3::new(x, y, z));
        self
    }

    /// Sets the mesh.
    pub fn with_mesh(mut self, mesh: MeshHandle) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Sets the material.
    pub fn with_material(mut self, material: MaterialComponent) -> Self {
        self.material = Some(material);
        self
    }

    fn mask(&self) -> ComponentMask {
        let mut mask = ComponentMask::EMPTY;
        if self.mesh.is_some() {
            mask = mask | ComponentMask::MESH;
        }
        if self.material.is_some() {
            mask = mask | ComponentMask::MATERIAL;
        }
        if self.tag.is_some() {
            mask = mask | ComponentMask::TAG;
        }
        mask
    }
}

/// An entity living in the scene.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    tag: Option<String>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    transform: Matrix4<f32>,
    mesh: Option<MeshHandle>,
    material: Option<MaterialComponent>,
    mask: ComponentMask,
}

impl Entity {
    /// Identifier.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Parent, if any.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Direct children in creation order.
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Local transform.
    pub fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    /// Translation part of the local transform.
    pub fn translation(&self) -> Vector3<f32> {
        self.transform.w.truncate()
    }

    /// Mesh component.
    pub fn mesh(&self) -> Option<&MeshHandle> {
        self.mesh.as_ref()
    }

    /// Material component.
    pub fn material(&self) -> Option<&MaterialComponent> {
        self.material.as_ref()
    }

    /// Components present at creation time.
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }
}

/// Lifecycle notification.
#[derive(Debug, Clone)]
pub enum SceneEvent {
    /// The entity was instantiated.
    Created(EntityId),
    /// The entity was removed; carries its final state.
    Destroyed(Entity),
}

/// Owner of every entity and mesh id.
#[derive(Debug, Default)]
pub struct Scene {
    entities: BTreeMap<EntityId, Entity>,
    next_entity: u64,
    next_mesh: u64,
    events: Vec<SceneEvent>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mesh and hands out a shareable handle with a fresh id.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        let id = MeshId(self.next_mesh);
        self.next_mesh += 1;
        MeshHandle::new(id, Arc::new(mesh))
    }

    /// Creates an entity from `config` and records a `Created` event.
    ///
    /// # Returns
    /// The new id, or `UnknownEntity` if the configured parent does not exist.
    pub fn instantiate(&mut self, config: EntityConfig) -> EngineResult<EntityId> {
        if let Some(parent) = config.parent {
            if !self.entities.contains_key(&parent) {
                return Err(EngineError::UnknownEntity(parent.0));
            }
        }

        let id = EntityId(self.next_entity);
        self.next_entity += 1;

        let mask = config.mask();
        let entity = Entity {
            id,
            tag: config.tag,
            parent: config.parent,
            children: Vec::new(),
            transform: config.transform,
            mesh: config.mesh,
            material: config.material,
            mask,
        };

        if let Some(parent) = entity.parent.and_then(|p| self.entities.get_mut(&p)) {
            parent.children.push(id);
        }
        self.entities.insert(id, entity);
        self.events.push(SceneEvent::Created(id));
        Ok(id)
    }

    /// Removes an entity and all of its descendants, deepest first.
    ///
    /// # Returns
    /// `false` if the entity did not exist.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get(&id) else {
            return false;
        };

        if let Some(parent) = entity.parent.and_then(|p| self.entities.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }

        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(entity) = self.entities.get(&current) {
                for child in entity.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        for current in order {
            if let Some(entity) = self.entities.remove(&current) {
                self.events.push(SceneEvent::Destroyed(entity));
            }
        }
        true
    }

    /// Looks up an entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Whether the entity exists.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the scene holds no entity.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.parent.is_none())
    }

    /// First entity, in creation order, whose tag equals `tag`.
    pub fn find_by_tag(&self, tag: &str) -> Option<EntityId> {
        self.entities
            .values()
            .find(|e| e.tag.as_deref() == Some(tag))
            .map(|e| e.id)
    }

    /// Replaces the local transform of an entity.
    pub fn set_transform(&mut self, id: EntityId, transform: Matrix4<f32>) -> EngineResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntity(id.0))?;
        entity.transform = transform;
        Ok(())
    }

    /// Moves an entity by `offset` in its parent's space.
    pub fn translate(&mut self, id: EntityId, offset: Vector3<f32>) -> EngineResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntity(id.0))?;
        entity.transform = Matrix4::from_translation(offset) * entity.transform;
        Ok(())
    }

    /// Local transform composed with every ancestor's transform.
    pub fn world_transform(&self, id: EntityId) -> Option<Matrix4<f32>> {
        let mut entity = self.entities.get(&id)?;
        let mut transform = entity.transform;
        while let Some(parent) = entity.parent {
            entity = self.entities.get(&parent)?;
            transform = entity.transform * transform;
        }
        Some(transform)
    }

    /// World-space position of the entity origin.
    pub fn world_position(&self, id: EntityId) -> Option<Point3<f32>> {
        self.world_transform(id)
            .map(|transform| transform.transform_point(Point3::origin()))
    }

    /// Takes every event recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }
}
