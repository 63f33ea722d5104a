//! # GPU Resource Registry
//!
//! Reference counts GPU resources by the entities that use them, so a mesh, a
//! texture, a program or a shader shared by many entities is uploaded once and
//! destroyed once nobody uses it any more.
//!
//! ## Lifecycle of one id
//! 1. `register` adds the entity to the owner set of every id it uses. Gaining an
//!    owner takes the id out of the pending set, which aborts a scheduled
//!    destruction.
//! 2. `unregister` removes the entity from those owner sets. An owner set that
//!    becomes empty puts its id into the pending set.
//! 3. `cleanup` runs once per frame before drawing. It asks the context to destroy
//!    every pending id, meshes first, then textures, programs and shaders. An id
//!    leaves the pending set only when destruction succeeds; a shader that is
//!    still loading stays pending and is retried next frame.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::{
    context::GpuContext,
    material::{Program, ProgramId, Shader, ShaderId},
    texture::{Texture, TextureId},
};
use crate::engine_state::scene::{Entity, EntityId, MeshHandle, MeshId};

#[derive(Debug)]
struct OwnerEntry<V> {
    resource: V,
    owners: BTreeSet<EntityId>,
}

/// Owner sets and pending destruction for one kind of resource.
#[derive(Debug)]
pub struct OwnerTable<K, V> {
    entries: BTreeMap<K, OwnerEntry<V>>,
    pending: BTreeSet<K>,
}

impl<K, V> Default for OwnerTable<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Clone, V> OwnerTable<K, V> {
    /// Adds `owner` to the owner set of `key`, creating the entry on first use.
    ///
    /// # Returns
    /// `true` if a scheduled destruction was aborted.
    pub fn acquire(&mut self, key: K, resource: V, owner: EntityId) -> bool {
        let revived = self.pending.remove(&key);
        self.entries
            .entry(key)
            .or_insert_with(|| OwnerEntry {
                resource,
                owners: BTreeSet::new(),
            })
            .owners
            .insert(owner);
        revived
    }

    /// Removes `owner` from the owner set of `key`.
    ///
    /// # Returns
    /// `true` if the owner set became empty and `key` is now pending destruction.
    pub fn release(&mut self, key: &K, owner: EntityId) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.owners.remove(&owner);
        if entry.owners.is_empty() {
            self.pending.insert(key.clone());
            true
        } else {
            false
        }
    }

    /// Calls `destroy` for every pending resource.
    ///
    /// # Returns
    /// How many resources were destroyed; the rest stay pending.
    pub fn sweep(&mut self, mut destroy: impl FnMut(&V) -> bool) -> usize {
        let mut destroyed = 0;
        let pending: Vec<K> = self.pending.iter().cloned().collect();
        for key in pending {
            let Some(entry) = self.entries.get(&key) else {
                self.pending.remove(&key);
                continue;
            };
            if !entry.owners.is_empty() {
                self.pending.remove(&key);
                continue;
            }
            if destroy(&entry.resource) {
                self.entries.remove(&key);
                self.pending.remove(&key);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Owners of `key`, if it is tracked.
    pub fn owners(&self, key: &K) -> Option<&BTreeSet<EntityId>> {
        self.entries.get(key).map(|entry| &entry.owners)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    /// Number of tracked ids, pending ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// What one `cleanup` pass destroyed and what it had to leave for later.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub meshes: usize,
    pub textures: usize,
    pub programs: usize,
    pub shaders: usize,
    /// Ids still pending after the pass.
    pub deferred: usize,
}

/// Owner tables for every resource kind.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    pub meshes: OwnerTable<MeshId, MeshHandle>,
    pub textures: OwnerTable<TextureId, Texture>,
    pub programs: OwnerTable<ProgramId, Program>,
    pub shaders: OwnerTable<ShaderId, Shader>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every resource `entity` uses on its behalf.
    pub fn register(&mut self, entity: &Entity) {
        let owner = entity.id();
        if let Some(component) = entity.material() {
            let program = &component.program;
            if self.programs.acquire(program.id(), program.clone(), owner) {
                debug!("Program {} revived by {owner}", program.id());
            }
            for shader in program.shaders() {
                self.shaders.acquire(shader.id().clone(), shader.clone(), owner);
            }
            for texture in component.material.textures() {
                self.textures.acquire(texture.id().clone(), texture.clone(), owner);
            }
        }
        if let Some(mesh) = entity.mesh() {
            self.meshes.acquire(mesh.id(), mesh.clone(), owner);
        }
    }

    /// Releases every resource `entity` used.
    pub fn unregister(&mut self, entity: &Entity) {
        let owner = entity.id();
        if let Some(component) = entity.material() {
            let program = &component.program;
            self.programs.release(&program.id(), owner);
            for shader in program.shaders() {
                self.shaders.release(shader.id(), owner);
            }
            for texture in component.material.textures() {
                self.textures.release(texture.id(), owner);
            }
        }
        if let Some(mesh) = entity.mesh() {
            self.meshes.release(&mesh.id(), owner);
        }
    }

    /// Destroys pending resources in the order meshes, textures, programs, shaders.
    pub fn cleanup<C: GpuContext>(&mut self, context: &mut C) -> CleanupReport {
        let mut report = CleanupReport {
            meshes: self.meshes.sweep(|mesh| context.destroy_mesh(mesh)),
            textures: self.textures.sweep(|texture| context.destroy_texture(texture)),
            programs: self.programs.sweep(|program| context.destroy_program(program)),
            shaders: self.shaders.sweep(|shader| context.destroy_shader(shader)),
            deferred: 0,
        };
        report.deferred = self.meshes.pending_len()
            + self.textures.pending_len()
            + self.programs.pending_len()
            + self.shaders.pending_len();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        rendering::{
            assets::Asset,
            context::HeadlessContext,
            material::{Material, ShaderStage},
            test_support::{flat_program, textured},
        },
        scene::{EntityConfig, MaterialComponent, Scene, SceneEvent},
    };

    fn destroyed(scene: &mut Scene) -> Vec<Entity> {
        scene
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                SceneEvent::Destroyed(entity) => Some(entity),
                SceneEvent::Created(_) => None,
            })
            .collect()
    }

    #[test]
    fn table_tracks_owners_and_pending() {
        let mut table: OwnerTable<u32, &str> = OwnerTable::default();
        table.acquire(1, "a", EntityId(10));
        table.acquire(1, "a", EntityId(11));
        assert!(!table.release(&1, EntityId(10)));
        assert!(table.release(&1, EntityId(11)));
        assert!(table.is_pending(&1));
        assert_eq!(table.sweep(|_| true), 1);
        assert!(!table.contains(&1));
        assert_eq!(table.pending_len(), 0);
    }

    #[test]
    fn failed_destruction_stays_pending() {
        let mut table: OwnerTable<u32, ()> = OwnerTable::default();
        table.acquire(7, (), EntityId(1));
        table.release(&7, EntityId(1));
        assert_eq!(table.sweep(|_| false), 0);
        assert!(table.is_pending(&7));
        assert_eq!(table.sweep(|_| true), 1);
    }

    #[test]
    fn register_unregister_cleanup_round_trip() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(crate::engine_state::rendering::test_support::quad_mesh());
        let id = scene
            .instantiate(
                EntityConfig::default()
                    .with_mesh(mesh.clone())
                    .with_material(textured(Texture::solid("atlas", [255; 4]))),
            )
            .unwrap();

        let mut registry = ResourceRegistry::new();
        let mut context = HeadlessContext::new();
        registry.register(scene.get(id).unwrap());
        assert_eq!(registry.meshes.owners(&mesh.id()).map(|o| o.len()), Some(1));
        assert_eq!(registry.shaders.len(), 2);

        scene.destroy(id);
        for entity in destroyed(&mut scene) {
            registry.unregister(&entity);
        }
        assert!(registry.meshes.is_pending(&mesh.id()));

        let report = registry.cleanup(&mut context);
        assert_eq!(
            report,
            CleanupReport {
                meshes: 1,
                textures: 1,
                programs: 1,
                shaders: 2,
                deferred: 0,
            }
        );
        assert!(registry.meshes.is_empty());
        assert!(registry.programs.is_empty());
    }

    #[test]
    fn re_registering_before_cleanup_keeps_the_resource() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(crate::engine_state::rendering::test_support::quad_mesh());
        let config = EntityConfig::default()
            .with_mesh(mesh.clone())
            .with_material(MaterialComponent {
                program: flat_program(),
                material: Material::new(),
            });
        let first = scene.instantiate(config.clone()).unwrap();

        let mut registry = ResourceRegistry::new();
        let mut context = HeadlessContext::new();
        context.prepare_mesh(&mesh).unwrap();
        registry.register(scene.get(first).unwrap());

        scene.destroy(first);
        for entity in destroyed(&mut scene) {
            registry.unregister(&entity);
        }
        let second = scene.instantiate(config).unwrap();
        registry.register(scene.get(second).unwrap());

        assert_eq!(registry.cleanup(&mut context), CleanupReport::default());
        assert!(context.has_mesh(mesh.id()));
        assert_eq!(
            registry.meshes.owners(&mesh.id()).map(|o| o.iter().copied().collect::<Vec<_>>()),
            Some(vec![second])
        );
    }

    #[test]
    fn loading_shader_is_retried_on_the_next_cleanup() {
        let (source, sender) = Asset::pending();
        let program = crate::engine_state::rendering::material::Program::new(
            Shader::with_source("late.vert", ShaderStage::Vertex, source),
            Shader::inline("flat.frag", ShaderStage::Fragment, ""),
        );
        let mut scene = Scene::new();
        let id = scene
            .instantiate(EntityConfig::default().with_material(MaterialComponent {
                program,
                material: Material::new(),
            }))
            .unwrap();

        let mut registry = ResourceRegistry::new();
        let mut context = HeadlessContext::new();
        registry.register(scene.get(id).unwrap());
        scene.destroy(id);
        for entity in destroyed(&mut scene) {
            registry.unregister(&entity);
        }

        let first = registry.cleanup(&mut context);
        assert_eq!((first.programs, first.shaders, first.deferred), (1, 1, 1));
        assert!(registry.shaders.is_pending(&ShaderId("late.vert".into())));

        sender.complete(Ok(String::new()));
        let second = registry.cleanup(&mut context);
        assert_eq!((second.shaders, second.deferred), (1, 0));
    }
}
