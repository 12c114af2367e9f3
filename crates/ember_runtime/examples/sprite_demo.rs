//! Opens a window, spawns a grid of sprites driven by the ECS/scheduler,
//! and renders them every frame through the batching pipeline.

use ember_core::app::{App, FrameInput, Plugin, PluginContext};
use ember_core::define_component;
use ember_core::ecs::{Commands, Query, SystemResult};
use ember_core::scheduler::{Phase, SystemConfig, SystemFn};
use ember_render::batch::{MaterialId, TextureId};
use ember_render::device::{GpuDevice, SharedDevice};
use ember_render::renderer::{NodeId, Renderer, SpriteDrawable};
use ember_render::window::{window_attributes, WindowConfig};
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const GRID_SIDE: i32 = 16;
const SPRITE_MATERIAL: MaterialId = 0;
const SPRITE_TEXTURE: TextureId = 0;
const SPRITE_SHADER_CLASS: &str = "sprite_demo::sprite";

/// Auto-infers its bind group layout from `sprite.wgsl`'s reflection data
/// (`layout: None`), matching the pattern `ember_render::compute` uses for
/// its own pipelines.
fn create_sprite_pipeline(device: &GpuDevice) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("sprite_demo::sprite_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("../../ember_render/shaders/sprite.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("sprite_demo::sprite_pipeline"),
        layout: None,
        vertex: wgpu::VertexState { module: &shader, entry_point: Some("vs_main"), compilation_options: Default::default(), buffers: &[] },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: device.surface_format(),
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

#[derive(Clone, Copy)]
struct SpriteNode {
    node: NodeId,
}
define_component!(SpriteNode, "examples::sprite_demo::SpriteNode");

struct SpawnGridPlugin;

impl Plugin for SpawnGridPlugin {
    fn name(&self) -> &'static str {
        "SpawnGridPlugin"
    }

    fn build(&mut self, context: &mut PluginContext) {
        let config = SystemConfig::new("spawn_grid", Phase::Startup, SystemFn::Sync(Box::new(spawn_grid)));
        context.scheduler.add_system(Phase::Startup, config).expect("unique system name");

        let config = SystemConfig::new("sway_sprites", Phase::Update, SystemFn::Sync(Box::new(sway_sprites)));
        context.scheduler.add_system(Phase::Update, config).expect("unique system name");
    }
}

fn spawn_grid(commands: &mut Commands) -> SystemResult {
    let mut nodes = Vec::with_capacity((GRID_SIDE * GRID_SIDE) as usize);
    {
        let renderer = commands.resource_mut::<Renderer>().expect("renderer resource installed before startup");
        for x in 0..GRID_SIDE {
            for y in 0..GRID_SIDE {
                let node = renderer.scene_mut().add_node(None);
                renderer.scene_mut().set_local_transform(node, glam::Affine2::from_translation([x as f32 * 40.0, y as f32 * 40.0].into()));
                renderer.set_drawable(
                    node,
                    Some(SpriteDrawable {
                        material: SPRITE_MATERIAL,
                        texture: SPRITE_TEXTURE,
                        size: [32.0, 32.0],
                        frame: [0.0, 0.0, 1.0, 1.0],
                        tint: [1.0, 1.0, 1.0, 1.0],
                    }),
                );
                nodes.push(node);
            }
        }
    }
    for node in nodes {
        commands.spawn(SpriteNode { node });
    }
    Ok(())
}

fn sway_sprites(commands: &mut Commands) -> SystemResult {
    let elapsed = commands.resource::<ember_core::time::SimulationTime>().map(|t| t.tick_count()).unwrap_or(0) as f32;
    let nodes: Vec<NodeId> = Query::new(commands.world()).with_component(SpriteNode::id()).iter1::<SpriteNode>().map(|(_, n)| n.node).collect();

    let renderer = commands.resource_mut::<Renderer>().expect("renderer resource installed before startup");
    let offset = (elapsed * 0.05).sin() * 4.0;
    for node in nodes {
        let base = renderer.scene_mut().world_transform(node).translation;
        renderer.scene_mut().set_local_transform(node, glam::Affine2::from_translation([base.x, base.y + offset].into()));
    }
    Ok(())
}

struct DemoApp {
    window: Option<Arc<Window>>,
    device: Option<SharedDevice>,
    app: App,
}

impl DemoApp {
    fn new() -> Self {
        let mut app = App::new();
        app.add_plugin(SpawnGridPlugin);
        Self { window: None, device: None, app }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = window_attributes(WindowConfig::default());
        let window = Arc::new(event_loop.create_window(attrs).expect("failed to create window"));
        let size = window.inner_size();

        let device = pollster::block_on(GpuDevice::new(window.clone(), size.width, size.height)).expect("failed to acquire GPU device");
        device.watch_for_loss(self.app.shutdown_signal());
        let device: SharedDevice = Arc::new(device);

        let mut renderer = Renderer::new(wgpu::Color { r: 0.02, g: 0.02, b: 0.05, a: 1.0 });
        renderer.caches_mut().register_pipeline(SPRITE_SHADER_CLASS, create_sprite_pipeline(&device));
        self.app.resources_mut().insert(renderer);
        self.app.install_plugins();
        let report = self.app.startup();
        for (phase, handle, error) in &report.system_errors {
            tracing::error!(?phase, ?handle, %error, "startup system failed");
        }

        self.window = Some(window);
        self.device = Some(device);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_size) => {
                // Surface reconfiguration on resize isn't wired into this
                // demo; see `GpuDevice::resize`.
            }
            WindowEvent::RedrawRequested => {
                if self.app.shutdown_requested() {
                    event_loop.exit();
                    return;
                }

                let report = self.app.update(FrameInput { delta_seconds: 1.0 / 60.0 });
                for (phase, handle, error) in &report.system_errors {
                    tracing::error!(?phase, ?handle, %error, "frame system failed");
                }

                if let (Some(device), Some(window)) = (&self.device, &self.window) {
                    let size = window.inner_size();
                    match device.acquire_frame() {
                        Ok(surface_texture) => {
                            let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                            let renderer = self.app.resources_mut().get_mut::<Renderer>().expect("renderer resource installed before startup");
                            let (plan, _stats) = renderer.prepare_frame(device, size.width, size.height);
                            renderer.submit_frame(
                                device,
                                &view,
                                size.width,
                                size.height,
                                &plan,
                                |_material| SPRITE_SHADER_CLASS,
                                |_encoder, _effect, _src, _dst, _caches| {},
                            );
                            surface_texture.present();
                        }
                        Err(error) => tracing::error!(%error, "failed to acquire surface texture"),
                    }
                }

                if self.app.shutdown_requested() {
                    event_loop.exit();
                } else if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let event_loop = EventLoop::new().expect("failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut demo = DemoApp::new();
    event_loop.run_app(&mut demo).expect("event loop run failed");
}
