// batch.rs - per-(material, texture) sprite batch: packing, dirty-range
// tracking, and the monotonically growing instance buffer.
//
// The 48-byte packed instance layout is bit-exact and shared with tilemap
// sub-batches (tilemap.rs): four little-endian f32 tuples -
// `[worldPosX, worldPosY, sizeX, sizeY, frameX, frameY, frameW, frameH,
// tintR, tintG, tintB, tintA]`.

use std::ops::Range;
use thiserror::Error;

pub const INSTANCE_SIZE_BYTES: usize = 48;
/// Capped so a batch's storage buffer never exceeds ~3.1 MB.
pub const MAX_INSTANCES_PER_BATCH: usize = 65_536;
/// Above this fraction of changed instances, a full re-upload is cheaper
/// than computing and uploading individual dirty ranges.
const FULL_REUPLOAD_THRESHOLD: f32 = 0.8;

pub type MaterialId = u32;
pub type TextureId = u32;
pub type SpriteHandle = u64;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpriteInstance {
    pub world_pos: [f32; 2],
    pub size: [f32; 2],
    pub frame: [f32; 4],
    pub tint: [f32; 4],
}

impl SpriteInstance {
    pub fn pack(&self) -> [u8; INSTANCE_SIZE_BYTES] {
        let mut bytes = [0u8; INSTANCE_SIZE_BYTES];
        let mut cursor = 0;
        for value in self
            .world_pos
            .iter()
            .chain(self.size.iter())
            .chain(self.frame.iter())
            .chain(self.tint.iter())
        {
            bytes[cursor..cursor + 4].copy_from_slice(&value.to_le_bytes());
            cursor += 4;
        }
        bytes
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch is at its {MAX_INSTANCES_PER_BATCH}-instance capacity")]
    Full,
    #[error("sprite is not present in this batch")]
    NotFound,
    #[error("sprite is already present in this batch")]
    AlreadyPresent,
}

/// Either a set of contiguous `[start, end)` index ranges that changed
/// since the last upload, or a sentinel meaning "re-upload everything".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyState {
    Ranges(Vec<Range<usize>>),
    FullReupload,
}

/// Identifies a batch's GPU-side storage buffer. Reissued whenever the
/// buffer is recreated (grown), so bind groups keyed by this id
/// naturally invalidate instead of reading stale contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceBufferId(pub u64);

pub struct InstanceBuffer {
    pub id: InstanceBufferId,
    pub capacity: usize,
    pub gpu_buffer: Option<wgpu::Buffer>,
}

/// A camera view used when projecting sprites into packed instance data.
/// Sprite batching (unlike tilemap chunking) does not cull by this view -
/// visibility culling for freeform sprites is left to the caller, who
/// controls batch membership via `add_sprite`/`remove_sprite`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Camera {
    pub view_pos: [f32; 2],
    pub zoom: f32,
}

pub struct SpriteBatch {
    material_id: MaterialId,
    texture_id: TextureId,
    handles: Vec<SpriteHandle>,
    instances: Vec<SpriteInstance>,
    packed: Vec<u8>,
    dirty_flags: Vec<bool>,
    has_uploaded_once: bool,
    next_buffer_serial: u64,
    buffer: Option<InstanceBuffer>,
}

impl SpriteBatch {
    pub fn new(material_id: MaterialId, texture_id: TextureId) -> Self {
        Self {
            material_id,
            texture_id,
            handles: Vec::new(),
            instances: Vec::new(),
            packed: Vec::new(),
            dirty_flags: Vec::new(),
            has_uploaded_once: false,
            next_buffer_serial: 0,
            buffer: None,
        }
    }

    pub fn key(&self) -> (MaterialId, TextureId) {
        (self.material_id, self.texture_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn has_sprite(&self, handle: SpriteHandle) -> bool {
        self.handles.contains(&handle)
    }

    fn index_of(&self, handle: SpriteHandle) -> Option<usize> {
        self.handles.iter().position(|&h| h == handle)
    }

    pub fn add_sprite(&mut self, handle: SpriteHandle, instance: SpriteInstance) -> Result<(), BatchError> {
        if self.has_sprite(handle) {
            return Err(BatchError::AlreadyPresent);
        }
        if self.handles.len() >= MAX_INSTANCES_PER_BATCH {
            return Err(BatchError::Full);
        }
        self.handles.push(handle);
        self.instances.push(instance);
        self.dirty_flags.push(true);
        Ok(())
    }

    pub fn remove_sprite(&mut self, handle: SpriteHandle) -> Result<(), BatchError> {
        let index = self.index_of(handle).ok_or(BatchError::NotFound)?;
        self.handles.remove(index);
        self.instances.remove(index);
        self.dirty_flags.remove(index);
        // every sprite after the removed one shifted left by one slot
        for flag in &mut self.dirty_flags[index..] {
            *flag = true;
        }
        if index < self.packed.len() / INSTANCE_SIZE_BYTES {
            self.packed.truncate(index * INSTANCE_SIZE_BYTES);
        }
        Ok(())
    }

    pub fn update_sprite(&mut self, handle: SpriteHandle, instance: SpriteInstance) -> Result<(), BatchError> {
        let index = self.index_of(handle).ok_or(BatchError::NotFound)?;
        if self.instances[index] != instance {
            self.instances[index] = instance;
            self.dirty_flags[index] = true;
        }
        Ok(())
    }

    /// Remove every sprite whose handle is not in `live`, in handle order.
    pub fn retain_handles(&mut self, live: &std::collections::HashSet<SpriteHandle>) {
        let stale: Vec<SpriteHandle> = self.handles.iter().copied().filter(|h| !live.contains(h)).collect();
        for handle in stale {
            let _ = self.remove_sprite(handle);
        }
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.instances.clear();
        self.dirty_flags.clear();
        self.packed.clear();
        self.has_uploaded_once = false;
    }

    /// Re-project every dirty sprite into `[worldPosX, worldPosY, sizeX,
    /// sizeY, frameX, frameY, frameW, frameH, tintR, tintG, tintB, tintA]`
    /// and write it into the packed byte buffer. `camera` is accepted to
    /// keep the projection signature stable for future view-space
    /// packing; sprite batching does not itself cull by view (see
    /// `Camera` docs above).
    pub fn update_instance_data(&mut self, _camera: &Camera) {
        self.packed.resize(self.instances.len() * INSTANCE_SIZE_BYTES, 0);
        for (index, instance) in self.instances.iter().enumerate() {
            if !self.dirty_flags[index] {
                continue;
            }
            let start = index * INSTANCE_SIZE_BYTES;
            self.packed[start..start + INSTANCE_SIZE_BYTES].copy_from_slice(&instance.pack());
        }
    }

    /// Contiguous `[start, end)` ranges (in instance indices) that changed
    /// since the last call to `get_dirty_ranges`, or `FullReupload` when
    /// more than 80% of instances changed or this is the first upload.
    /// Clears the dirty flags for whatever it reports.
    pub fn get_dirty_ranges(&mut self) -> DirtyState {
        let total = self.instances.len();
        if total == 0 {
            return DirtyState::Ranges(Vec::new());
        }
        let dirty_count = self.dirty_flags.iter().filter(|d| **d).count();
        let full = !self.has_uploaded_once || dirty_count as f32 / total as f32 > FULL_REUPLOAD_THRESHOLD;

        let result = if full {
            DirtyState::FullReupload
        } else {
            let mut ranges = Vec::new();
            let mut start = None;
            for (index, dirty) in self.dirty_flags.iter().enumerate() {
                match (dirty, start) {
                    (true, None) => start = Some(index),
                    (false, Some(s)) => {
                        ranges.push(s..index);
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = start {
                ranges.push(s..total);
            }
            DirtyState::Ranges(ranges)
        };

        self.has_uploaded_once = true;
        for flag in &mut self.dirty_flags {
            *flag = false;
        }
        result
    }

    pub fn packed_bytes(&self) -> &[u8] {
        &self.packed
    }

    /// The GPU storage buffer backing this batch's instance data, if one
    /// has been created yet (via `get_or_create_instance_buffer`).
    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref().and_then(|b| b.gpu_buffer.as_ref())
    }

    /// Grow the GPU storage buffer monotonically (never shrinks) up to
    /// the 65,536-instance cap, issuing a fresh buffer id whenever it is
    /// actually recreated so id-keyed bind groups invalidate naturally.
    pub fn get_or_create_instance_buffer(&mut self, device: &wgpu::Device) -> &InstanceBuffer {
        let needed = self.instances.len().max(1);
        let needs_growth = match &self.buffer {
            None => true,
            Some(buffer) => buffer.capacity < needed,
        };
        if needs_growth {
            let capacity = needed.next_power_of_two().min(MAX_INSTANCES_PER_BATCH);
            let id = InstanceBufferId(self.next_buffer_serial);
            self.next_buffer_serial += 1;
            let gpu_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("ember_render::SpriteBatch::instances"),
                size: (capacity * INSTANCE_SIZE_BYTES) as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.buffer = Some(InstanceBuffer { id, capacity, gpu_buffer: Some(gpu_buffer) });
        }
        self.buffer.as_ref().expect("buffer just ensured present")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(x: f32) -> SpriteInstance {
        SpriteInstance { world_pos: [x, 0.0], size: [1.0, 1.0], frame: [0.0, 0.0, 1.0, 1.0], tint: [1.0, 1.0, 1.0, 1.0] }
    }

    #[test]
    fn packed_buffer_matches_sprite_order_after_update() {
        let mut batch = SpriteBatch::new(1, 1);
        for i in 0..4 {
            batch.add_sprite(i, instance(i as f32)).unwrap();
        }
        batch.update_instance_data(&Camera::default());
        assert_eq!(batch.packed_bytes().len(), 4 * INSTANCE_SIZE_BYTES);
        for i in 0..4 {
            let start = i * INSTANCE_SIZE_BYTES;
            let x = f32::from_le_bytes(batch.packed_bytes()[start..start + 4].try_into().unwrap());
            assert_eq!(x, i as f32);
        }
    }

    #[test]
    fn first_upload_is_always_full_reupload() {
        let mut batch = SpriteBatch::new(1, 1);
        batch.add_sprite(0, instance(0.0)).unwrap();
        assert_eq!(batch.get_dirty_ranges(), DirtyState::FullReupload);
    }

    #[test]
    fn single_change_after_first_upload_yields_single_range() {
        let mut batch = SpriteBatch::new(1, 1);
        for i in 0..10 {
            batch.add_sprite(i, instance(i as f32)).unwrap();
        }
        batch.get_dirty_ranges(); // consume the initial full-reupload
        batch.update_sprite(5, instance(500.0)).unwrap();
        assert_eq!(batch.get_dirty_ranges(), DirtyState::Ranges(vec![5..6]));
    }

    #[test]
    fn more_than_80_percent_dirty_forces_full_reupload() {
        let mut batch = SpriteBatch::new(1, 1);
        for i in 0..10 {
            batch.add_sprite(i, instance(i as f32)).unwrap();
        }
        batch.get_dirty_ranges();
        for i in 0..9 {
            batch.update_sprite(i, instance(1000.0 + i as f32)).unwrap();
        }
        assert_eq!(batch.get_dirty_ranges(), DirtyState::FullReupload);
    }

    #[test]
    fn add_then_remove_leaves_batch_empty() {
        let mut batch = SpriteBatch::new(1, 1);
        batch.add_sprite(0, instance(0.0)).unwrap();
        batch.remove_sprite(0).unwrap();
        assert!(batch.is_empty());
        assert!(!batch.has_sprite(0));
    }

    #[test]
    fn retain_handles_drops_everything_not_in_the_live_set() {
        let mut batch = SpriteBatch::new(1, 1);
        for i in 0..5 {
            batch.add_sprite(i, instance(i as f32)).unwrap();
        }
        let live: std::collections::HashSet<SpriteHandle> = [1, 3].into_iter().collect();
        batch.retain_handles(&live);
        assert_eq!(batch.len(), 2);
        assert!(batch.has_sprite(1) && batch.has_sprite(3));
        assert!(!batch.has_sprite(0) && !batch.has_sprite(2) && !batch.has_sprite(4));
    }

    #[test]
    fn batch_refuses_to_exceed_capacity() {
        let mut batch = SpriteBatch::new(1, 1);
        for i in 0..MAX_INSTANCES_PER_BATCH as u64 {
            batch.add_sprite(i, instance(0.0)).unwrap();
        }
        assert_eq!(batch.add_sprite(MAX_INSTANCES_PER_BATCH as u64, instance(0.0)), Err(BatchError::Full));
    }
}
