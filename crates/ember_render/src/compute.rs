// compute.rs - declarative GPU compute workers: buffers are declared up
// front, passes reference them by name in binding-index order, and the
// shader module for each pass compiles lazily on first `execute`.

use crate::device::SharedDevice;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("buffer '{0}' was not declared before use")]
    BufferNotDeclared(String),
    #[error("buffer '{0}' is not a staging buffer and cannot be read back")]
    BufferNotReadable(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BufferKind {
    Uniform,
    Storage,
    Staging,
}

struct BufferDecl {
    kind: BufferKind,
    initial: Vec<u8>,
}

/// Zero-pads `data` up to the next 16-byte boundary, as required for a
/// uniform buffer binding.
fn pad_to_uniform_alignment(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    let remainder = padded.len() % 16;
    if remainder != 0 {
        padded.resize(padded.len() + (16 - remainder), 0);
    }
    padded
}

#[derive(Clone, Debug)]
struct ComputePassDecl {
    shader_source: &'static str,
    entry_point: &'static str,
    workgroups: [u32; 3],
    bindings: Vec<String>,
}

pub struct WorkerBuilder {
    buffers: HashMap<String, BufferDecl>,
    passes: Vec<ComputePassDecl>,
    one_shot: bool,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self { buffers: HashMap::new(), passes: Vec::new(), one_shot: false }
    }

    pub fn add_uniform(mut self, name: impl Into<String>, data: &[u8]) -> Self {
        self.buffers.insert(name.into(), BufferDecl { kind: BufferKind::Uniform, initial: pad_to_uniform_alignment(data) });
        self
    }

    pub fn add_storage(mut self, name: impl Into<String>, data: &[u8]) -> Self {
        self.buffers.insert(name.into(), BufferDecl { kind: BufferKind::Storage, initial: data.to_vec() });
        self
    }

    pub fn add_staging(mut self, name: impl Into<String>, data: &[u8]) -> Self {
        self.buffers.insert(name.into(), BufferDecl { kind: BufferKind::Staging, initial: data.to_vec() });
        self
    }

    /// `bindings[i]` becomes binding index `i` in the pass's bind group.
    /// Every name must already have been declared via `add_uniform`/
    /// `add_storage`/`add_staging`.
    pub fn add_pass(mut self, shader_source: &'static str, entry_point: &'static str, workgroups: [u32; 3], bindings: &[&str]) -> Result<Self, ComputeError> {
        for name in bindings {
            if !self.buffers.contains_key(*name) {
                return Err(ComputeError::BufferNotDeclared((*name).to_string()));
            }
        }
        self.passes.push(ComputePassDecl {
            shader_source,
            entry_point,
            workgroups,
            bindings: bindings.iter().map(|n| n.to_string()).collect(),
        });
        Ok(self)
    }

    /// Mark the worker as not automatically driven every frame; the host
    /// is responsible for calling `execute()` itself.
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    pub fn build(self, device: &SharedDevice) -> WorkerInstance {
        let mut buffers = HashMap::new();
        for (name, decl) in self.buffers {
            let size = decl.initial.len().max(16) as u64;
            let mut usage = wgpu::BufferUsages::COPY_DST;
            usage |= match decl.kind {
                BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
                BufferKind::Storage | BufferKind::Staging => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            };
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&name),
                size,
                usage,
                mapped_at_creation: false,
            });
            if !decl.initial.is_empty() {
                device.queue().write_buffer(&buffer, 0, &decl.initial);
            }
            let readback = matches!(decl.kind, BufferKind::Staging).then(|| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{name}_readback")),
                    size,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                })
            });
            buffers.insert(name, GpuBufferEntry { buffer, readback, size });
        }
        WorkerInstance {
            device: device.clone(),
            buffers,
            passes: self.passes,
            pipelines: HashMap::new(),
            shader_cache: HashMap::new(),
            one_shot: self.one_shot,
            execution_pending: false,
        }
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct GpuBufferEntry {
    buffer: wgpu::Buffer,
    readback: Option<wgpu::Buffer>,
    size: u64,
}

pub struct WorkerInstance {
    device: SharedDevice,
    buffers: HashMap<String, GpuBufferEntry>,
    passes: Vec<ComputePassDecl>,
    pipelines: HashMap<usize, wgpu::ComputePipeline>,
    shader_cache: HashMap<&'static str, wgpu::ShaderModule>,
    one_shot: bool,
    execution_pending: bool,
}

impl WorkerInstance {
    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    pub fn execution_pending(&self) -> bool {
        self.execution_pending
    }

    fn ensure_pipelines(&mut self) {
        let pending: Vec<(usize, &'static str, &'static str)> =
            self.passes.iter().enumerate().map(|(i, p)| (i, p.shader_source, p.entry_point)).filter(|(i, ..)| !self.pipelines.contains_key(i)).collect();

        for (index, source, entry_point) in pending {
            self.shader_cache.entry(source).or_insert_with(|| {
                self.device.create_shader_module(wgpu::ShaderModuleDescriptor { label: Some(source), source: wgpu::ShaderSource::Wgsl(source.into()) })
            });
            let module = self.shader_cache.get(source).expect("just inserted above");
            let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(source),
                layout: None,
                module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            self.pipelines.insert(index, pipeline);
        }
    }

    /// Encode every pass sequentially on one command buffer, submit, and
    /// block until the GPU has finished (readback copies are included so
    /// a following `read`/`read_typed` can map immediately).
    pub fn execute(&mut self) -> Result<(), ComputeError> {
        self.ensure_pipelines();
        self.execution_pending = true;

        let mut encoder = self.device.device().create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("ember_render::compute::execute") });
        for (index, pass_decl) in self.passes.iter().enumerate() {
            let pipeline = self.pipelines.get(&index).expect("ensured by ensure_pipelines");
            let layout = pipeline.get_bind_group_layout(0);
            let entries: Vec<wgpu::BindGroupEntry> = pass_decl
                .bindings
                .iter()
                .enumerate()
                .map(|(slot, name)| {
                    let entry = self.buffers.get(name).expect("validated in add_pass");
                    wgpu::BindGroupEntry { binding: slot as u32, resource: entry.buffer.as_entire_binding() }
                })
                .collect();
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor { label: None, layout: &layout, entries: &entries });

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: None, timestamp_writes: None });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(pass_decl.workgroups[0], pass_decl.workgroups[1], pass_decl.workgroups[2]);
        }

        for entry in self.buffers.values() {
            if let Some(readback) = &entry.readback {
                encoder.copy_buffer_to_buffer(&entry.buffer, 0, readback, 0, entry.size);
            }
        }

        self.device.queue().submit(Some(encoder.finish()));
        self.device.device().poll(wgpu::Maintain::Wait);
        self.execution_pending = false;
        Ok(())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, ComputeError> {
        let entry = self.buffers.get(name).ok_or_else(|| ComputeError::BufferNotDeclared(name.to_string()))?;
        let readback = entry.readback.as_ref().ok_or_else(|| ComputeError::BufferNotReadable(name.to_string()))?;

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.device().poll(wgpu::Maintain::Wait);
        rx.recv().expect("map_async callback fires after poll").expect("buffer mapping succeeds after a completed submission");

        let data = slice.get_mapped_range().to_vec();
        readback.unmap();
        Ok(data)
    }

    pub fn read_typed<T: bytemuck::Pod>(&self, name: &str) -> Result<Vec<T>, ComputeError> {
        let bytes = self.read(name)?;
        Ok(bytemuck::cast_slice(&bytes).to_vec())
    }

    pub fn write(&self, name: &str, data: &[u8]) -> Result<(), ComputeError> {
        self.write_slice(name, data, 0)
    }

    pub fn write_slice(&self, name: &str, data: &[u8], offset: u64) -> Result<(), ComputeError> {
        let entry = self.buffers.get(name).ok_or_else(|| ComputeError::BufferNotDeclared(name.to_string()))?;
        self.device.queue().write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    pub fn destroy(mut self) {
        for (_, entry) in self.buffers.drain() {
            entry.buffer.destroy();
            if let Some(readback) = entry.readback {
                readback.destroy();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_pass_rejects_an_undeclared_binding() {
        let builder = WorkerBuilder::new().add_storage("particles", &[0u8; 64]);
        let result = builder.add_pass("", "main", [1, 1, 1], &["particles", "missing"]);
        assert_eq!(result.err(), Some(ComputeError::BufferNotDeclared("missing".to_string())));
    }

    #[test]
    fn add_pass_accepts_bindings_declared_in_any_order_beforehand() {
        let builder = WorkerBuilder::new().add_uniform("params", &[0u8; 4]).add_storage("particles", &[0u8; 64]);
        let result = builder.add_pass("", "main", [8, 1, 1], &["params", "particles"]);
        assert!(result.is_ok());
    }

    #[test]
    fn uniform_data_is_padded_to_sixteen_bytes() {
        assert_eq!(pad_to_uniform_alignment(&[0u8; 4]).len(), 16);
        assert_eq!(pad_to_uniform_alignment(&[0u8; 16]).len(), 16);
        assert_eq!(pad_to_uniform_alignment(&[0u8; 17]).len(), 32);
    }

    #[test]
    fn one_shot_flag_is_recorded_on_the_builder() {
        let builder = WorkerBuilder::new().one_shot();
        assert!(builder.one_shot);
    }
}
