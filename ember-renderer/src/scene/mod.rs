//! Scene graph: a pool of entities with parent/child links stored as
//! handles. World matrices are recomputed on demand with dirty propagation -
//! an entity is revisited only when its own transform or an ancestor's
//! changed.

pub mod camera;
pub mod light;
pub mod material;

use crate::{
    resource::{mesh::Mesh, texture::Texture},
    scene::{light::Light, material::Material},
};
use ember_core::pool::{Handle, Pool};
use ember_math::octree::Octree;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use std::{cell::RefCell, rc::Rc};

/// A renderable pairing of a mesh and a material. Contributes to the octree
/// and is culled against the camera frustum.
#[derive(Default)]
pub struct StaticMeshRenderer {
    pub mesh: Option<Rc<Mesh>>,
    pub material: Material,
    /// Draw a wireframe box around every model (editor aid).
    pub draw_aabb: bool,
}

/// A skinned renderable. Never enters the octree: it is submitted every
/// frame with its current bone palette.
#[derive(Default)]
pub struct SkinnedMeshRenderer {
    pub mesh: Option<Rc<Mesh>>,
    pub material: Material,
    /// The resolved palette for the current frame, one matrix per bone.
    pub bone_palette: Vec<Matrix4<f32>>,
    /// Draw a wireframe box around the mesh (editor aid).
    pub draw_aabb: bool,
}

/// The skybox of a scene: an equirectangular HDR source. The derived GPU
/// maps are regenerated by the renderer whenever the source changes.
#[derive(Default)]
pub struct Skybox {
    equirect: Option<Rc<RefCell<Texture>>>,
    revision: u64,
}

impl Skybox {
    pub fn set_equirect(&mut self, texture: Option<Rc<RefCell<Texture>>>) {
        self.equirect = texture;
        self.revision += 1;
    }

    pub fn equirect(&self) -> Option<&Rc<RefCell<Texture>>> {
        self.equirect.as_ref()
    }

    /// Monotonic counter bumped on every source change.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// A node of the scene graph.
pub struct Entity {
    pub name: String,
    local_position: Vector3<f32>,
    local_rotation: UnitQuaternion<f32>,
    local_scale: Vector3<f32>,
    world_matrix: Matrix4<f32>,
    transform_dirty: bool,
    parent: Handle<Entity>,
    children: Vec<Handle<Entity>>,
    pub static_mesh: Option<StaticMeshRenderer>,
    pub skinned_mesh: Option<SkinnedMeshRenderer>,
    pub light: Option<Light>,
}

impl Entity {
    fn new(name: String, parent: Handle<Entity>) -> Self {
        Self {
            name,
            local_position: Vector3::zeros(),
            local_rotation: UnitQuaternion::identity(),
            local_scale: Vector3::repeat(1.0),
            world_matrix: Matrix4::identity(),
            transform_dirty: true,
            parent,
            children: Vec::new(),
            static_mesh: None,
            skinned_mesh: None,
            light: None,
        }
    }

    pub fn local_position(&self) -> Vector3<f32> {
        self.local_position
    }

    pub fn set_local_position(&mut self, position: Vector3<f32>) {
        self.local_position = position;
        self.transform_dirty = true;
    }

    pub fn local_rotation(&self) -> UnitQuaternion<f32> {
        self.local_rotation
    }

    pub fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.local_rotation = rotation;
        self.transform_dirty = true;
    }

    pub fn local_scale(&self) -> Vector3<f32> {
        self.local_scale
    }

    pub fn set_local_scale(&mut self, scale: Vector3<f32>) {
        self.local_scale = scale;
        self.transform_dirty = true;
    }

    fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.local_position)
            * self.local_rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.local_scale)
    }

    /// The world matrix computed by the last [`Scene::update_world_matrices`].
    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.world_matrix
    }

    /// World-space position, the translation column of the world matrix.
    pub fn world_position(&self) -> Vector3<f32> {
        self.world_matrix.column(3).xyz()
    }

    pub fn parent(&self) -> Handle<Entity> {
        self.parent
    }

    pub fn children(&self) -> &[Handle<Entity>] {
        &self.children
    }
}

/// See module docs.
pub struct Scene {
    entities: Pool<Entity>,
    roots: Vec<Handle<Entity>>,
    pub skybox: Skybox,
    pub(crate) render_octree: Octree<Handle<Entity>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            entities: Pool::new(),
            roots: Vec::new(),
            skybox: Skybox::default(),
            render_octree: Octree::default(),
        }
    }

    /// Spawns an entity under the given parent; pass [`Handle::NONE`] for a
    /// root entity.
    pub fn create_entity<N: Into<String>>(
        &mut self,
        name: N,
        parent: Handle<Entity>,
    ) -> Handle<Entity> {
        let handle = self.entities.spawn(Entity::new(name.into(), parent));
        if parent.is_some() {
            self.entities[parent].children.push(handle);
        } else {
            self.roots.push(handle);
        }
        handle
    }

    /// Removes an entity together with its whole subtree.
    pub fn remove_entity(&mut self, handle: Handle<Entity>) {
        let Some(entity) = self.entities.try_borrow(handle) else {
            return;
        };
        let parent = entity.parent;
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let entity = self.entities.free(current);
            stack.extend_from_slice(&entity.children);
        }
        if parent.is_some() {
            if let Some(parent) = self.entities.try_borrow_mut(parent) {
                parent.children.retain(|c| *c != handle);
            }
        } else {
            self.roots.retain(|c| *c != handle);
        }
    }

    pub fn entity(&self, handle: Handle<Entity>) -> &Entity {
        self.entities.borrow(handle)
    }

    pub fn entity_mut(&mut self, handle: Handle<Entity>) -> &mut Entity {
        self.entities.borrow_mut(handle)
    }

    pub fn try_entity(&self, handle: Handle<Entity>) -> Option<&Entity> {
        self.entities.try_borrow(handle)
    }

    pub fn entities(&self) -> impl Iterator<Item = (Handle<Entity>, &Entity)> {
        self.entities.pair_iter()
    }

    /// Object identifier written to the picking attachment: the pool index
    /// plus one, so zero (the clear value) means "nothing".
    pub fn entity_render_index(&self, handle: Handle<Entity>) -> u32 {
        handle.index() + 1
    }

    /// Recomputes world matrices top-down. An entity is recomputed when its
    /// own transform changed or any ancestor's did; everything else is left
    /// untouched. Returns the amount of recomputed matrices.
    pub fn update_world_matrices(&mut self) -> usize {
        let mut updated = 0;
        let mut stack: Vec<(Handle<Entity>, Matrix4<f32>, bool)> = self
            .roots
            .iter()
            .map(|handle| (*handle, Matrix4::identity(), false))
            .collect();

        while let Some((handle, parent_world, parent_changed)) = stack.pop() {
            let entity = self.entities.borrow_mut(handle);
            let changed = entity.transform_dirty || parent_changed;
            if changed {
                entity.world_matrix = parent_world * entity.local_matrix();
                entity.transform_dirty = false;
                updated += 1;
            }
            let world = entity.world_matrix;
            for child in entity.children.clone() {
                stack.push((child, world, changed));
            }
        }

        updated
    }

    pub(crate) fn octree(&self) -> &Octree<Handle<Entity>> {
        &self.render_octree
    }
}

#[cfg(test)]
mod test {
    use super::Scene;
    use ember_core::pool::Handle;
    use nalgebra::{Matrix4, Vector3};

    #[test]
    fn scene_world_matrix_propagation() {
        let mut scene = Scene::new();
        let root = scene.create_entity("root", Handle::NONE);
        let child = scene.create_entity("child", root);

        scene
            .entity_mut(root)
            .set_local_position(Vector3::new(1.0, 0.0, 0.0));
        scene
            .entity_mut(child)
            .set_local_position(Vector3::new(0.0, 2.0, 0.0));
        scene.update_world_matrices();

        assert_eq!(
            scene.entity(child).world_position(),
            Vector3::new(1.0, 2.0, 0.0)
        );
    }

    #[test]
    fn scene_dirty_propagation_skips_clean_subtrees() {
        let mut scene = Scene::new();
        let a = scene.create_entity("a", Handle::NONE);
        let _a_child = scene.create_entity("a_child", a);
        let b = scene.create_entity("b", Handle::NONE);

        // First pass computes everything.
        assert_eq!(scene.update_world_matrices(), 3);
        // Nothing changed: nothing recomputed.
        assert_eq!(scene.update_world_matrices(), 0);

        // Moving `a` updates its subtree but leaves `b` alone.
        scene
            .entity_mut(a)
            .set_local_position(Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(scene.update_world_matrices(), 2);
        assert_eq!(scene.entity(b).world_matrix(), Matrix4::identity());
    }

    #[test]
    fn scene_remove_entity_clears_subtree() {
        let mut scene = Scene::new();
        let root = scene.create_entity("root", Handle::NONE);
        let child = scene.create_entity("child", root);
        let grandchild = scene.create_entity("grandchild", child);

        scene.remove_entity(child);
        assert!(scene.try_entity(child).is_none());
        assert!(scene.try_entity(grandchild).is_none());
        assert!(scene.entity(root).children().is_empty());
    }

    #[test]
    fn scene_render_index_is_offset_by_one() {
        let mut scene = Scene::new();
        let first = scene.create_entity("first", Handle::NONE);
        assert_eq!(scene.entity_render_index(first), 1);
    }

    #[test]
    fn skybox_revision_bumps_on_change() {
        let mut scene = Scene::new();
        let before = scene.skybox.revision();
        scene.skybox.set_equirect(None);
        assert_eq!(scene.skybox.revision(), before + 1);
    }
}
