// device.rs - GPU adapter/device acquisition and the factory for every
// other GPU resource (buffers, textures, samplers, shader modules,
// pipelines). Created once per App; destroying it invalidates every
// resource allocated through it (enforced by wgpu's own generation
// tracking, not by this type - we just never construct a second one for
// the same surface).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to request a logical device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface is incompatible with the chosen adapter")]
    IncompatibleSurface,
    #[error("GPU device was lost: {0}")]
    DeviceLost(String),
}

/// Owns the adapter, logical device, submission queue, and the
/// presentation surface's configuration. The sole factory for buffers,
/// textures, samplers, shader modules, and pipelines in the engine.
pub struct GpuDevice {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
}

impl GpuDevice {
    /// Acquire an adapter/device for `surface` and configure it for
    /// premultiplied-alpha presentation at `width`x`height`.
    pub async fn new(surface_target: impl Into<wgpu::SurfaceTarget<'static>>, width: u32, height: u32) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(surface_target).map_err(|_| DeviceError::IncompatibleSurface)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(DeviceError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("ember_render::GpuDevice"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(capabilities.formats[0]);
        let alpha_mode = if capabilities.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            capabilities.alpha_modes[0]
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(Self { instance, adapter, device, queue, surface, surface_config })
    }

    /// Register `shutdown_signal` to be flipped to `true` if the device is
    /// ever lost (driver reset, adapter removal, OS-level surface loss).
    /// Every buffer/texture/pipeline/cache built through this device is
    /// considered invalidated the moment this fires - the caller's job is
    /// just to notice the flag and stop driving frames, not to recover.
    pub fn watch_for_loss(&self, shutdown_signal: Arc<AtomicBool>) {
        self.device.set_device_lost_callback(move |reason, message| {
            tracing::error!(?reason, %message, "GPU device lost");
            shutdown_signal.store(true, Ordering::SeqCst);
        });
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn create_buffer(&self, descriptor: &wgpu::BufferDescriptor) -> wgpu::Buffer {
        self.device.create_buffer(descriptor)
    }

    pub fn create_texture(&self, descriptor: &wgpu::TextureDescriptor) -> wgpu::Texture {
        self.device.create_texture(descriptor)
    }

    pub fn create_sampler(&self, descriptor: &wgpu::SamplerDescriptor) -> wgpu::Sampler {
        self.device.create_sampler(descriptor)
    }

    pub fn create_shader_module(&self, descriptor: wgpu::ShaderModuleDescriptor) -> wgpu::ShaderModule {
        self.device.create_shader_module(descriptor)
    }

    pub fn create_render_pipeline(&self, descriptor: &wgpu::RenderPipelineDescriptor) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(descriptor)
    }

    pub fn create_compute_pipeline(&self, descriptor: &wgpu::ComputePipelineDescriptor) -> wgpu::ComputePipeline {
        self.device.create_compute_pipeline(descriptor)
    }

    pub fn create_bind_group_layout(&self, descriptor: &wgpu::BindGroupLayoutDescriptor) -> wgpu::BindGroupLayout {
        self.device.create_bind_group_layout(descriptor)
    }

    pub fn create_bind_group(&self, descriptor: &wgpu::BindGroupDescriptor) -> wgpu::BindGroup {
        self.device.create_bind_group(descriptor)
    }
}

/// Shared handle to the device, cheaply cloned into every subsystem
/// (batching, tilemaps, compute workers, particles) that needs GPU
/// access without owning the device itself.
pub type SharedDevice = Arc<GpuDevice>;
