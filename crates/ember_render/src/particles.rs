// particles.rs - particle emitters as a specialization of the compute
// worker + sprite batch pipelines: a compute pass advances and spawns
// particles GPU-side, and their CPU-visible instance data is projected
// into a regular sprite batch for drawing.

use crate::batch::{MaterialId, SpriteBatch, SpriteHandle, SpriteInstance, TextureId};
use crate::compute::{ComputeError, WorkerBuilder, WorkerInstance};
use crate::device::SharedDevice;
use bytemuck::{Pod, Zeroable};

const UPDATE_EMIT_SHADER: &str = include_str!("../shaders/particle_update.wgsl");

#[derive(Clone, Copy, Debug)]
pub struct EmitterConfig {
    pub max_particles: u32,
    pub spawn_rate: f32,
    pub lifetime_seconds: f32,
    pub initial_velocity: [f32; 2],
    pub size: [f32; 2],
    pub tint: [f32; 4],
    pub material: MaterialId,
    pub texture: TextureId,
}

#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[repr(C)]
struct EmitterParams {
    delta_seconds: f32,
    spawn_count: f32,
    lifetime_seconds: f32,
    max_particles: f32,
    initial_velocity: [f32; 2],
    _pad: [f32; 2],
}

#[derive(Copy, Clone, Debug, Pod, Zeroable)]
#[repr(C)]
struct GpuParticle {
    position: [f32; 2],
    velocity: [f32; 2],
    age_seconds: f32,
    alive: f32,
    _pad: [f32; 2],
}

/// A single GPU-driven particle emitter: the compute pass owns particle
/// position/velocity/age in a storage buffer; CPU-side bookkeeping only
/// tracks how many spawns are due and mirrors live particles into a
/// sprite batch for drawing.
pub struct ParticleEmitter {
    config: EmitterConfig,
    worker: WorkerInstance,
    batch: SpriteBatch,
    spawn_remainder: f32,
}

impl ParticleEmitter {
    pub fn new(device: &SharedDevice, config: EmitterConfig) -> Self {
        let particle_bytes = std::mem::size_of::<GpuParticle>() * config.max_particles as usize;
        let params = EmitterParams {
            delta_seconds: 0.0,
            spawn_count: 0.0,
            lifetime_seconds: config.lifetime_seconds,
            max_particles: config.max_particles as f32,
            initial_velocity: config.initial_velocity,
            _pad: [0.0, 0.0],
        };

        let builder = WorkerBuilder::new()
            .add_uniform("params", bytemuck::bytes_of(&params))
            .add_storage("particles", &vec![0u8; particle_bytes]);
        let workgroups = [(config.max_particles).div_ceil(64).max(1), 1, 1];
        let builder = builder
            .add_pass(UPDATE_EMIT_SHADER, "update_emit", workgroups, &["params", "particles"])
            .expect("both bindings are declared immediately above");

        Self {
            worker: builder.build(device),
            batch: SpriteBatch::new(config.material, config.texture),
            config,
            spawn_remainder: 0.0,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn batch(&self) -> &SpriteBatch {
        &self.batch
    }

    /// Advance the simulation by `delta_seconds`: compute how many spawns
    /// are due, push the frame's uniform params, and run the compute pass.
    pub fn update(&mut self, delta_seconds: f32) -> Result<(), ComputeError> {
        self.spawn_remainder += delta_seconds * self.config.spawn_rate;
        let spawn_count = self.spawn_remainder.floor();
        self.spawn_remainder -= spawn_count;

        let params = EmitterParams {
            delta_seconds,
            spawn_count,
            lifetime_seconds: self.config.lifetime_seconds,
            max_particles: self.config.max_particles as f32,
            initial_velocity: self.config.initial_velocity,
            _pad: [0.0, 0.0],
        };
        self.worker.write("params", bytemuck::bytes_of(&params))?;
        self.worker.execute()
    }

    /// Mirror the compute pass's live particles into the render batch.
    /// Reads back the storage buffer via the worker's staging path would
    /// require `particles` to be declared staging; emitters that only
    /// render (never inspect particle state from the CPU) can skip this
    /// and drive the batch directly from emission-time positions instead.
    pub fn sync_batch_from(&mut self, particles: &[(SpriteHandle, SpriteInstance)]) {
        let live: std::collections::HashSet<SpriteHandle> = particles.iter().map(|(h, _)| *h).collect();
        self.batch.retain_handles(&live);
        for &(handle, instance) in particles {
            if self.batch.has_sprite(handle) {
                let _ = self.batch.update_sprite(handle, instance);
            } else {
                let _ = self.batch.add_sprite(handle, instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitter_params_layout_is_pod_and_sized_for_gpu_upload() {
        let params = EmitterParams { delta_seconds: 0.016, spawn_count: 2.0, lifetime_seconds: 1.0, max_particles: 256.0, initial_velocity: [0.0, -1.0], _pad: [0.0, 0.0] };
        let bytes = bytemuck::bytes_of(&params);
        assert_eq!(bytes.len(), std::mem::size_of::<EmitterParams>());
    }

    #[test]
    fn gpu_particle_layout_is_pod() {
        let particle = GpuParticle { position: [0.0, 0.0], velocity: [1.0, 1.0], age_seconds: 0.0, alive: 1.0, _pad: [0.0, 0.0] };
        assert_eq!(bytemuck::bytes_of(&particle).len(), std::mem::size_of::<GpuParticle>());
    }
}
