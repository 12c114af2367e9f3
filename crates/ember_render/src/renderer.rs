// renderer.rs - per-frame transform propagation, batch reconciliation,
// render-target selection, and the texture-view/bind-group/pipeline
// caches shared across a frame.
//
// Shader compilation and pipeline descriptors are the host's concern (the
// renderer has no opinion on shading); `register_pipeline` lets the host
// hand in a pipeline once per shader class, and the renderer caches it.

use crate::batch::{Camera, DirtyState, MaterialId, SpriteBatch, SpriteHandle, SpriteInstance, TextureId, INSTANCE_SIZE_BYTES};
use crate::device::GpuDevice;
use bytemuck::{Pod, Zeroable};
use glam::Affine2;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Camera origin plus a per-axis clip-space scale, uploaded once per frame
/// so the sprite shader can project world-space instance positions without
/// the renderer handing it a full matrix.
#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct ViewUniform {
    origin: [f32; 2],
    inv_half_extent: [f32; 2],
}

pub type NodeId = u32;
pub type ShaderClassId = &'static str;
pub type EffectId = &'static str;

const BIND_GROUP_CACHE_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct SpriteDrawable {
    pub material: MaterialId,
    pub texture: TextureId,
    pub size: [f32; 2],
    pub frame: [f32; 4],
    pub tint: [f32; 4],
}

struct SceneNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Affine2,
    world: Affine2,
}

/// Parent-to-child transform tree. `world = parent.world * local`,
/// recomputed top-down from the roots every frame.
pub struct SceneGraph {
    nodes: HashMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
    next_id: NodeId,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { nodes: HashMap::new(), roots: Vec::new(), next_id: 0 }
    }

    pub fn add_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, SceneNode { parent, children: Vec::new(), local: Affine2::IDENTITY, world: Affine2::IDENTITY });
        match parent {
            Some(parent_id) => self.nodes.get_mut(&parent_id).expect("parent must exist").children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn set_local_transform(&mut self, node: NodeId, local: Affine2) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local = local;
        }
    }

    pub fn world_transform(&self, node: NodeId) -> Affine2 {
        self.nodes.get(&node).map(|n| n.world).unwrap_or(Affine2::IDENTITY)
    }

    /// Top-down world-transform recompute from every root.
    pub fn propagate_transforms(&mut self) {
        let roots = self.roots.clone();
        for root in roots {
            self.propagate_from(root, Affine2::IDENTITY);
        }
    }

    fn propagate_from(&mut self, node: NodeId, parent_world: Affine2) {
        let (local, children) = match self.nodes.get(&node) {
            Some(n) => (n.local, n.children.clone()),
            None => return,
        };
        let world = parent_world * local;
        if let Some(n) = self.nodes.get_mut(&node) {
            n.world = world;
        }
        for child in children {
            self.propagate_from(child, world);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PostEffect {
    pub id: EffectId,
    pub order: i32,
    pub enabled: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UploadStats {
    pub full_uploads: usize,
    pub partial_uploads: usize,
    pub bytes_uploaded: usize,
}

pub struct RenderPlan {
    pub use_offscreen: bool,
    pub pre_effects: Vec<EffectId>,
    pub post_effects: Vec<EffectId>,
}

struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_offscreen_target(device: &GpuDevice, width: u32, height: u32, label: &str) -> OffscreenTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: device.surface_format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    OffscreenTarget { texture, view }
}

/// Texture-view / bind-group / pipeline caches, all lazily populated and
/// invalidated by the caller discarding the keyed identity (a texture id
/// going away, a buffer id being reissued on growth).
pub struct RenderCaches {
    texture_views: HashMap<TextureId, wgpu::TextureView>,
    bind_groups: LruCache<String, wgpu::BindGroup>,
    pipelines: HashMap<ShaderClassId, wgpu::RenderPipeline>,
}

impl RenderCaches {
    fn new() -> Self {
        Self {
            texture_views: HashMap::new(),
            bind_groups: LruCache::new(NonZeroUsize::new(BIND_GROUP_CACHE_CAPACITY).expect("capacity is nonzero")),
            pipelines: HashMap::new(),
        }
    }

    pub fn invalidate_texture_view(&mut self, texture: TextureId) {
        self.texture_views.remove(&texture);
    }

    pub fn get_or_create_texture_view(&mut self, texture: TextureId, make: impl FnOnce() -> wgpu::TextureView) -> &wgpu::TextureView {
        self.texture_views.entry(texture).or_insert_with(make)
    }

    pub fn get_or_create_bind_group(&mut self, key: &str, make: impl FnOnce() -> wgpu::BindGroup) -> &wgpu::BindGroup {
        if !self.bind_groups.contains(key) {
            self.bind_groups.put(key.to_string(), make());
        }
        self.bind_groups.get(key).expect("just inserted above")
    }

    /// Host registers the pipeline for a shader class once; subsequent
    /// calls are no-ops (the renderer never compiles shaders itself).
    pub fn register_pipeline(&mut self, class: ShaderClassId, pipeline: wgpu::RenderPipeline) {
        self.pipelines.entry(class).or_insert(pipeline);
    }

    pub fn pipeline(&self, class: ShaderClassId) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(class)
    }
}

impl Default for RenderCaches {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Renderer {
    scene: SceneGraph,
    drawables: HashMap<NodeId, SpriteDrawable>,
    batches: HashMap<(MaterialId, TextureId), SpriteBatch>,
    effects: Vec<PostEffect>,
    caches: RenderCaches,
    camera: Camera,
    clear_color: wgpu::Color,
    offscreen: Option<OffscreenTarget>,
    ping_pong: [Option<OffscreenTarget>; 2],
    view_uniform: Option<wgpu::Buffer>,
}

impl Renderer {
    pub fn new(clear_color: wgpu::Color) -> Self {
        Self {
            scene: SceneGraph::new(),
            drawables: HashMap::new(),
            batches: HashMap::new(),
            effects: Vec::new(),
            caches: RenderCaches::new(),
            camera: Camera::default(),
            clear_color,
            offscreen: None,
            ping_pong: [None, None],
            view_uniform: None,
        }
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn add_effect(&mut self, effect: PostEffect) {
        self.effects.push(effect);
    }

    pub fn set_effect_enabled(&mut self, id: EffectId, enabled: bool) {
        if let Some(effect) = self.effects.iter_mut().find(|e| e.id == id) {
            effect.enabled = enabled;
        }
    }

    pub fn set_drawable(&mut self, node: NodeId, drawable: Option<SpriteDrawable>) {
        match drawable {
            Some(d) => {
                self.drawables.insert(node, d);
            }
            None => {
                self.drawables.remove(&node);
            }
        }
    }

    pub fn caches_mut(&mut self) -> &mut RenderCaches {
        &mut self.caches
    }

    /// Add/remove sprites so each batch's membership matches the current
    /// drawable set. A batch is marked dirty only through `add_sprite`/
    /// `remove_sprite` themselves - reconciliation never touches an
    /// unchanged sprite's dirty flag.
    pub fn reconcile_batches(&mut self) {
        for (&node, drawable) in &self.drawables {
            let handle = node as SpriteHandle;
            let key = (drawable.material, drawable.texture);
            let batch = self.batches.entry(key).or_insert_with(|| SpriteBatch::new(drawable.material, drawable.texture));
            let world = self.scene.world_transform(node);
            let world_pos: [f32; 2] = world.translation.into();
            let instance = SpriteInstance { world_pos, size: drawable.size, frame: drawable.frame, tint: drawable.tint };
            if batch.has_sprite(handle) {
                let _ = batch.update_sprite(handle, instance);
            } else {
                let _ = batch.add_sprite(handle, instance);
            }
        }

        // Remove sprites whose owning node no longer has a drawable. Batch
        // membership is keyed by handle, so we diff against the live set
        // rather than walking scene nodes.
        let live_handles: std::collections::HashSet<SpriteHandle> = self.drawables.keys().map(|&n| n as SpriteHandle).collect();
        for batch in self.batches.values_mut() {
            batch.retain_handles(&live_handles);
        }
    }

    pub fn render_plan(&self) -> RenderPlan {
        let mut pre: Vec<&PostEffect> = self.effects.iter().filter(|e| e.enabled && e.order < 0).collect();
        let mut post: Vec<&PostEffect> = self.effects.iter().filter(|e| e.enabled && e.order >= 0).collect();
        pre.sort_by_key(|e| e.order);
        post.sort_by_key(|e| e.order);
        RenderPlan {
            use_offscreen: self.effects.iter().any(|e| e.enabled),
            pre_effects: pre.into_iter().map(|e| e.id).collect(),
            post_effects: post.into_iter().map(|e| e.id).collect(),
        }
    }

    fn ensure_offscreen(&mut self, device: &GpuDevice, width: u32, height: u32) {
        if self.offscreen.is_none() {
            self.offscreen = Some(create_offscreen_target(device, width, height, "ember_render::Renderer::scene_texture"));
        }
        for slot in 0..2 {
            if self.ping_pong[slot].is_none() {
                self.ping_pong[slot] = Some(create_offscreen_target(device, width, height, "ember_render::Renderer::ping_pong"));
            }
        }
    }

    /// Upload every batch's dirty instance data to its GPU buffer, full or
    /// partial depending on `get_dirty_ranges`. Call once per frame after
    /// `reconcile_batches`.
    pub fn upload_dirty_batches(&mut self, device: &GpuDevice) -> UploadStats {
        let mut stats = UploadStats::default();
        for batch in self.batches.values_mut() {
            batch.update_instance_data(&self.camera);
            let dirty = batch.get_dirty_ranges();
            let buffer = batch.get_or_create_instance_buffer(device.device());
            let Some(gpu_buffer) = &buffer.gpu_buffer else { continue };
            let packed = batch.packed_bytes();
            match dirty {
                DirtyState::FullReupload => {
                    device.queue().write_buffer(gpu_buffer, 0, packed);
                    stats.full_uploads += 1;
                    stats.bytes_uploaded += packed.len();
                }
                DirtyState::Ranges(ranges) => {
                    for range in ranges {
                        let byte_start = range.start * INSTANCE_SIZE_BYTES;
                        let byte_end = range.end * INSTANCE_SIZE_BYTES;
                        device.queue().write_buffer(gpu_buffer, byte_start as u64, &packed[byte_start..byte_end]);
                        stats.partial_uploads += 1;
                        stats.bytes_uploaded += byte_end - byte_start;
                    }
                }
            }
        }
        stats
    }

    /// First half of the frame: propagate transforms, reconcile batch
    /// membership, decide offscreen-vs-surface, upload dirty instance
    /// data. Follow with `submit_frame` to actually draw and present.
    pub fn prepare_frame(&mut self, device: &GpuDevice, surface_width: u32, surface_height: u32) -> (RenderPlan, UploadStats) {
        self.scene.propagate_transforms();
        self.reconcile_batches();
        let plan = self.render_plan();
        if plan.use_offscreen {
            self.ensure_offscreen(device, surface_width, surface_height);
        }
        let stats = self.upload_dirty_batches(device);
        (plan, stats)
    }

    fn update_view_uniform(&mut self, device: &GpuDevice, surface_width: u32, surface_height: u32) {
        let zoom = if self.camera.zoom > 0.0 { self.camera.zoom } else { 1.0 };
        let uniform = ViewUniform {
            origin: self.camera.view_pos,
            inv_half_extent: [2.0 * zoom / surface_width.max(1) as f32, 2.0 * zoom / surface_height.max(1) as f32],
        };
        let buffer = self.view_uniform.get_or_insert_with(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ember_render::Renderer::view_uniform"),
                size: std::mem::size_of::<ViewUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        device.queue().write_buffer(buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Second half of the frame, following `prepare_frame`: draw every
    /// non-empty batch through the pipeline registered for its material's
    /// shader class, into the offscreen scene texture if `plan` calls for
    /// one (else straight onto `target`), then ping-pong every pre/post
    /// effect across the two offscreen slots, with the last effect
    /// landing directly on `target`. Submits the encoded commands before
    /// returning; the caller still owns presenting `target`.
    ///
    /// `shader_class_of` maps a batch's material to the `ShaderClassId`
    /// whose pipeline was registered via `caches_mut().register_pipeline`
    /// - the renderer never decides what a material should look like,
    /// only how to sequence the draws. `apply_effect` does the same job
    /// for post-processing: given the encoder and a source/destination
    /// view, it is responsible for its own pipeline and bind group.
    pub fn submit_frame(
        &mut self,
        device: &GpuDevice,
        target: &wgpu::TextureView,
        surface_width: u32,
        surface_height: u32,
        plan: &RenderPlan,
        shader_class_of: impl Fn(MaterialId) -> ShaderClassId,
        mut apply_effect: impl FnMut(&mut wgpu::CommandEncoder, EffectId, &wgpu::TextureView, &wgpu::TextureView, &mut RenderCaches),
    ) {
        if plan.use_offscreen {
            self.ensure_offscreen(device, surface_width, surface_height);
        }
        self.update_view_uniform(device, surface_width, surface_height);

        let mut encoder = device.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember_render::Renderer::submit_frame"),
        });

        let scene_view: &wgpu::TextureView = if plan.use_offscreen { &self.offscreen.as_ref().expect("ensured above").view } else { target };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember_render::Renderer::scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: scene_view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear_color), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let view_uniform = self.view_uniform.as_ref().expect("written above");
            for (&(material, texture), batch) in &self.batches {
                if batch.is_empty() {
                    continue;
                }
                let Some(instance_buffer) = batch.instance_buffer() else { continue };
                let class = shader_class_of(material);
                let Some(pipeline) = self.caches.pipeline(class) else { continue };
                let layout = pipeline.get_bind_group_layout(0);
                pass.set_pipeline(pipeline);

                let key = format!("ember_render::Renderer::sprite_bind_group:{material}:{texture}");
                let bind_group = self.caches.get_or_create_bind_group(&key, || {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("ember_render::Renderer::sprite_bind_group"),
                        layout: &layout,
                        entries: &[
                            wgpu::BindGroupEntry { binding: 0, resource: view_uniform.as_entire_binding() },
                            wgpu::BindGroupEntry { binding: 1, resource: instance_buffer.as_entire_binding() },
                        ],
                    })
                });
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..6, 0..batch.len() as u32);
            }
        }

        let effects: Vec<EffectId> = plan.pre_effects.iter().chain(plan.post_effects.iter()).copied().collect();
        let mut source: &wgpu::TextureView = scene_view;
        for (index, &effect) in effects.iter().enumerate() {
            let is_last = index + 1 == effects.len();
            let dest: &wgpu::TextureView =
                if is_last { target } else { &self.ping_pong[index % 2].as_ref().expect("ensured by ensure_offscreen").view };
            apply_effect(&mut encoder, effect, source, dest, &mut self.caches);
            source = dest;
        }

        device.queue().submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_world_transform_composes_parent_translation() {
        let mut scene = SceneGraph::new();
        let root = scene.add_node(None);
        scene.set_local_transform(root, Affine2::from_translation([10.0, 0.0].into()));
        let child = scene.add_node(Some(root));
        scene.set_local_transform(child, Affine2::from_translation([0.0, 5.0].into()));

        scene.propagate_transforms();

        let world = scene.world_transform(child);
        assert_eq!(world.translation.to_array(), [10.0, 5.0]);
    }

    #[test]
    fn render_plan_skips_offscreen_when_no_effect_enabled() {
        let renderer = Renderer::new(wgpu::Color::BLACK);
        let plan = renderer.render_plan();
        assert!(!plan.use_offscreen);
        assert!(plan.pre_effects.is_empty());
        assert!(plan.post_effects.is_empty());
    }

    #[test]
    fn pre_and_post_effects_are_split_and_order_sorted() {
        let mut renderer = Renderer::new(wgpu::Color::BLACK);
        renderer.add_effect(PostEffect { id: "bloom", order: 1, enabled: true });
        renderer.add_effect(PostEffect { id: "vignette", order: -1, enabled: true });
        renderer.add_effect(PostEffect { id: "outline", order: -2, enabled: true });
        renderer.add_effect(PostEffect { id: "disabled", order: -5, enabled: false });

        let plan = renderer.render_plan();
        assert!(plan.use_offscreen);
        assert_eq!(plan.pre_effects, vec!["outline", "vignette"]);
        assert_eq!(plan.post_effects, vec!["bloom"]);
    }

    #[test]
    fn reconcile_adds_and_removes_sprites_to_match_drawables() {
        let mut renderer = Renderer::new(wgpu::Color::BLACK);
        let node = renderer.scene_mut().add_node(None);
        renderer.set_drawable(node, Some(SpriteDrawable { material: 1, texture: 2, size: [1.0, 1.0], frame: [0.0, 0.0, 1.0, 1.0], tint: [1.0; 4] }));
        renderer.reconcile_batches();
        assert!(renderer.batches.get(&(1, 2)).unwrap().has_sprite(node as SpriteHandle));

        renderer.set_drawable(node, None);
        renderer.reconcile_batches();
        assert!(!renderer.batches.get(&(1, 2)).unwrap().has_sprite(node as SpriteHandle));
    }
}
