//! Submits mesh draws. Keeps per-frame snapshots of the static and skinned
//! renderers; static renderers additionally go into the scene octree, which
//! perspective passes walk with a frustum to skip whole subtrees. Shadow
//! cascades render with orthographic cameras whose frusta are already
//! minimal, so they iterate the flat list instead - per-object culling is a
//! net loss there.

use crate::{
    renderer::ubo::{ModelUniformData, UniformBlocks},
    resource::model::Model,
    scene::{material::MaterialType, Entity, Scene},
    settings::MAX_BONES,
};
use ember_core::pool::Handle;
use ember_graphics::{
    core::log::Log,
    error::FrameworkError,
    framebuffer::FrameBuffer,
    gpu_program::GpuProgram,
    state::PipelineState,
    stats::RenderPassStatistics,
    DrawParameters, ElementRange, PolygonFace, PolygonFillMode,
};
use ember_math::{aabb::AxisAlignedBoundingBox, frustum::Frustum, Rect};
use nalgebra::Matrix4;
use std::cell::Cell;

/// Everything one mesh pass needs to issue draws.
pub(crate) struct MeshDrawContext<'a> {
    pub state: &'a PipelineState,
    pub scene: &'a Scene,
    pub ubos: &'a UniformBlocks,
    pub framebuffer: &'a FrameBuffer,
    pub viewport: Rect<i32>,
    pub program: &'a GpuProgram,
    pub draw_params: DrawParameters,
    pub frustum: &'a Frustum,
    pub camera_is_orthographic: bool,
    /// Draw only renderers of this material type; [`None`] draws everything
    /// (depth-only passes).
    pub material_filter: Option<MaterialType>,
    /// Whether the material block and textures are bound per draw.
    pub bind_material: bool,
    pub element_range: ElementRange,
}

/// See module docs.
#[derive(Default)]
pub struct MeshesDrawer {
    static_renderers: Vec<Handle<Entity>>,
    skinned_renderers: Vec<Handle<Entity>>,
    palette_warning_logged: Cell<bool>,
}

/// World-space enclosure of every model of a static renderer.
fn renderer_world_aabb(entity: &Entity) -> Option<AxisAlignedBoundingBox> {
    let renderer = entity.static_mesh.as_ref()?;
    let mesh = renderer.mesh.as_ref()?;
    let world = entity.world_matrix();

    let mut world_aabb = AxisAlignedBoundingBox::default();
    for model in mesh.models.iter() {
        world_aabb.add_box(model.local_aabb().transform(&world));
    }
    world_aabb.is_valid().then_some(world_aabb)
}

impl MeshesDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the renderable entities and rebuilds the octree from the
    /// static ones. Must run after the scene graph updated world matrices.
    pub fn begin_frame(&mut self, scene: &mut Scene) {
        self.static_renderers.clear();
        self.skinned_renderers.clear();
        self.palette_warning_logged.set(false);

        let mut octree_objects = Vec::new();
        for (handle, entity) in scene.entities() {
            if let Some(world_aabb) = renderer_world_aabb(entity) {
                self.static_renderers.push(handle);
                octree_objects.push((handle, world_aabb));
            }
            if entity
                .skinned_mesh
                .as_ref()
                .is_some_and(|r| r.mesh.is_some())
            {
                self.skinned_renderers.push(handle);
            }
        }

        scene.render_octree.rebuild(&octree_objects);
    }

    pub fn static_renderers(&self) -> &[Handle<Entity>] {
        &self.static_renderers
    }

    pub fn skinned_renderers(&self) -> &[Handle<Entity>] {
        &self.skinned_renderers
    }

    /// Draws the static renderers that pass the frustum and material tests.
    pub(crate) fn render_static(
        &self,
        ctx: MeshDrawContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        if ctx.camera_is_orthographic {
            for handle in self.static_renderers.iter() {
                stats += self.draw_static_renderer(&ctx, *handle)?;
            }
        } else {
            let octree = ctx.scene.octree();
            let mut cursor = octree.iterator();
            loop {
                if ctx.frustum.is_on_frustum(&cursor.bounds()) {
                    for handle in cursor.payloads() {
                        stats += self.draw_static_renderer(&ctx, *handle)?;
                    }
                } else {
                    cursor.skip_children();
                }
                if !cursor.advance() {
                    break;
                }
            }
        }

        Ok(stats)
    }

    fn draw_static_renderer(
        &self,
        ctx: &MeshDrawContext,
        handle: Handle<Entity>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let entity = ctx.scene.entity(handle);
        let Some(renderer) = entity.static_mesh.as_ref() else {
            return Ok(stats);
        };
        let Some(mesh) = renderer.mesh.as_ref() else {
            return Ok(stats);
        };
        if ctx
            .material_filter
            .is_some_and(|filter| renderer.material.material_type != filter)
        {
            return Ok(stats);
        }

        let world = entity.world_matrix();
        ctx.ubos.update_model(
            ctx.state,
            &ModelUniformData::new(world, ctx.scene.entity_render_index(handle)),
        );

        if ctx.bind_material {
            ctx.ubos.update_material(
                ctx.state,
                &renderer.material.write_uniforms(),
            );
            renderer.material.bind_textures(ctx.state);
        }

        for model in mesh.models.iter() {
            if !ctx.camera_is_orthographic {
                let world_aabb = model.local_aabb().transform(&world);
                if !ctx.frustum.is_on_frustum(&world_aabb) {
                    continue;
                }
            }

            stats += ctx.framebuffer.draw(
                model.geometry(),
                ctx.viewport,
                ctx.program,
                &ctx.draw_params,
                ctx.element_range,
            )?;
        }

        Ok(stats)
    }

    /// Draws every skinned renderer, uploading its bone palette first.
    /// Skinned meshes are never culled: the palette can move vertices far
    /// outside the bind-pose bounds.
    pub(crate) fn render_skinned(
        &self,
        ctx: MeshDrawContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        for handle in self.skinned_renderers.iter() {
            let entity = ctx.scene.entity(*handle);
            let Some(renderer) = entity.skinned_mesh.as_ref() else {
                continue;
            };
            let Some(mesh) = renderer.mesh.as_ref() else {
                continue;
            };

            if renderer.bone_palette.len() > MAX_BONES
                && !self.palette_warning_logged.replace(true)
            {
                Log::warning(format!(
                    "Skinned mesh of \"{}\" has {} bones, only the first {MAX_BONES} are used.",
                    entity.name,
                    renderer.bone_palette.len(),
                ));
            }

            ctx.ubos.update_skinning(ctx.state, &renderer.bone_palette);
            ctx.ubos.update_model(
                ctx.state,
                &ModelUniformData::new(
                    entity.world_matrix(),
                    ctx.scene.entity_render_index(*handle),
                ),
            );

            if ctx.bind_material {
                ctx.ubos.update_material(
                    ctx.state,
                    &renderer.material.write_uniforms(),
                );
                renderer.material.bind_textures(ctx.state);
            }

            for model in mesh.models.iter() {
                stats += ctx.framebuffer.draw(
                    model.geometry(),
                    ctx.viewport,
                    ctx.program,
                    &ctx.draw_params,
                    ctx.element_range,
                )?;
            }
        }

        Ok(stats)
    }

    /// Draws wireframe boxes around every renderer flagged with `draw_aabb`.
    pub(crate) fn draw_aabb_gizmos(
        &self,
        ctx: MeshDrawContext,
        cube: &Model,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        ctx.state
            .set_polygon_fill_mode(PolygonFace::FrontAndBack, PolygonFillMode::Line);

        for handle in self
            .static_renderers
            .iter()
            .chain(self.skinned_renderers.iter())
        {
            let entity = ctx.scene.entity(*handle);
            let flagged = entity.static_mesh.as_ref().map_or(false, |r| r.draw_aabb)
                || entity.skinned_mesh.as_ref().map_or(false, |r| r.draw_aabb);
            if !flagged {
                continue;
            }
            let mesh = entity
                .static_mesh
                .as_ref()
                .and_then(|r| r.mesh.as_ref())
                .or_else(|| entity.skinned_mesh.as_ref().and_then(|r| r.mesh.as_ref()));
            let Some(mesh) = mesh else {
                continue;
            };

            let world = entity.world_matrix();
            for model in mesh.models.iter() {
                let aabb = model.local_aabb().transform(&world);
                let box_matrix = Matrix4::new_translation(&aabb.center())
                    * Matrix4::new_nonuniform_scaling(&aabb.size());
                ctx.ubos
                    .update_model(ctx.state, &ModelUniformData::new(box_matrix, 0));

                stats += ctx.framebuffer.draw(
                    cube.geometry(),
                    ctx.viewport,
                    ctx.program,
                    &ctx.draw_params,
                    ctx.element_range,
                )?;
            }
        }

        ctx.state
            .set_polygon_fill_mode(PolygonFace::FrontAndBack, PolygonFillMode::Fill);

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::MeshesDrawer;
    use crate::scene::{Scene, SkinnedMeshRenderer, StaticMeshRenderer};
    use ember_core::pool::Handle;

    #[test]
    fn begin_frame_snapshots_only_renderers_with_meshes() {
        let mut scene = Scene::new();

        // A bare entity and a renderer without a mesh: neither is snapshot.
        scene.create_entity("empty", Handle::NONE);
        let no_mesh = scene.create_entity("no_mesh", Handle::NONE);
        scene.entity_mut(no_mesh).static_mesh = Some(StaticMeshRenderer::default());
        let skinned = scene.create_entity("skinned", Handle::NONE);
        scene.entity_mut(skinned).skinned_mesh = Some(SkinnedMeshRenderer::default());

        scene.update_world_matrices();
        let mut drawer = MeshesDrawer::new();
        drawer.begin_frame(&mut scene);

        assert!(drawer.static_renderers().is_empty());
        assert!(drawer.skinned_renderers().is_empty());
        assert_eq!(scene.octree().payload_count(), 0);
    }
}
