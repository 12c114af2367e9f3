// tilemap.rs - fixed-size chunk partitioning over a tilemap, with
// per-tileset sub-batches and view-AABB culling.
//
// A chunk's sub-batches reuse the same 48-byte packed instance layout as
// sprite batching (batch.rs), just with tile-coordinate packing instead
// of world sprite packing; the byte layout itself is identical.

use crate::batch::{BatchError, SpriteBatch, SpriteInstance};
use glam::Affine2;
use std::collections::HashMap;

pub type TilesetId = u32;
pub type TileCoord = (i32, i32);
pub type ChunkCoord = (i32, i32);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Aabb {
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min[0] <= other.max[0] && self.max[0] >= other.min[0] && self.min[1] <= other.max[1] && self.max[1] >= other.min[1]
    }

    fn from_points(points: &[[f32; 2]]) -> Self {
        let mut min = [f32::INFINITY, f32::INFINITY];
        let mut max = [f32::NEG_INFINITY, f32::NEG_INFINITY];
        for p in points {
            min[0] = min[0].min(p[0]);
            min[1] = min[1].min(p[1]);
            max[0] = max[0].max(p[0]);
            max[1] = max[1].max(p[1]);
        }
        Self { min, max }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AnimatedTile {
    pub frame_duration_secs: f32,
    pub frame_count: u32,
    elapsed: f32,
    current: u32,
}

impl AnimatedTile {
    pub fn new(frame_duration_secs: f32, frame_count: u32) -> Self {
        Self { frame_duration_secs, frame_count, elapsed: 0.0, current: 0 }
    }

    /// Advance by `delta_seconds`; returns `true` if the current frame
    /// index changed (the caller should mark its tilemap dirty).
    fn advance(&mut self, delta_seconds: f32) -> bool {
        if self.frame_count <= 1 || self.frame_duration_secs <= 0.0 {
            return false;
        }
        self.elapsed += delta_seconds;
        let mut changed = false;
        while self.elapsed >= self.frame_duration_secs {
            self.elapsed -= self.frame_duration_secs;
            self.current = (self.current + 1) % self.frame_count;
            changed = true;
        }
        changed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Tile {
    pub tileset: TilesetId,
    pub frame: [f32; 4],
    pub tint: [f32; 4],
    pub animation: Option<AnimatedTile>,
}

pub struct TilemapChunk {
    pub coord: ChunkCoord,
    pub aabb: Aabb,
    pub sub_batches: HashMap<TilesetId, SpriteBatch>,
}

impl TilemapChunk {
    fn new(coord: ChunkCoord, aabb: Aabb) -> Self {
        Self { coord, aabb, sub_batches: HashMap::new() }
    }

    fn tile_count(&self) -> usize {
        self.sub_batches.values().map(SpriteBatch::len).sum()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RenderStats {
    pub rendered_tiles: usize,
    pub skipped_tiles: usize,
    pub draw_calls: usize,
}

pub struct Tilemap {
    chunk_size: u32,
    tile_size: [f32; 2],
    world_transform: Affine2,
    tiles: HashMap<TileCoord, Tile>,
    chunks: HashMap<ChunkCoord, TilemapChunk>,
    dirty: bool,
}

impl Tilemap {
    pub fn new(chunk_size: u32, tile_size: [f32; 2]) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            tile_size,
            world_transform: Affine2::IDENTITY,
            tiles: HashMap::new(),
            chunks: HashMap::new(),
            dirty: true,
        }
    }

    fn chunk_coord_of(&self, tile: TileCoord) -> ChunkCoord {
        (tile.0.div_euclid(self.chunk_size as i32), tile.1.div_euclid(self.chunk_size as i32))
    }

    pub fn set_tile(&mut self, coord: TileCoord, tile: Tile) {
        self.tiles.insert(coord, tile);
        self.dirty = true;
    }

    pub fn remove_tile(&mut self, coord: TileCoord) {
        if self.tiles.remove(&coord).is_some() {
            self.dirty = true;
        }
    }

    pub fn set_world_transform(&mut self, transform: Affine2) {
        self.world_transform = transform;
        for (&coord, chunk) in &mut self.chunks {
            chunk.aabb = self.compute_chunk_aabb(coord);
        }
    }

    fn compute_chunk_aabb(&self, coord: ChunkCoord) -> Aabb {
        let size = self.chunk_size as f32;
        let local_min = [coord.0 as f32 * size * self.tile_size[0], coord.1 as f32 * size * self.tile_size[1]];
        let local_max = [local_min[0] + size * self.tile_size[0], local_min[1] + size * self.tile_size[1]];
        let corners = [
            [local_min[0], local_min[1]],
            [local_max[0], local_min[1]],
            [local_min[0], local_max[1]],
            [local_max[0], local_max[1]],
        ]
        .map(|p| self.world_transform.transform_point2(p.into()).into());
        Aabb::from_points(&corners)
    }

    /// Advance every animated tile's frame; any tile whose visible frame
    /// changed marks the whole tilemap dirty (next render rebuilds all
    /// chunks - there is only the one tilemap-wide dirty flag).
    pub fn advance_animations(&mut self, delta_seconds: f32) {
        let mut any_changed = false;
        for tile in self.tiles.values_mut() {
            if let Some(animation) = &mut tile.animation {
                if animation.advance(delta_seconds) {
                    any_changed = true;
                }
            }
        }
        if any_changed {
            self.dirty = true;
        }
    }

    fn rebuild_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.chunks.clear();
        for (&coord, tile) in &self.tiles {
            let chunk_coord = self.chunk_coord_of(coord);
            let aabb = self.compute_chunk_aabb(chunk_coord);
            let chunk = self.chunks.entry(chunk_coord).or_insert_with(|| TilemapChunk::new(chunk_coord, aabb));
            let batch = chunk.sub_batches.entry(tile.tileset).or_insert_with(|| SpriteBatch::new(0, tile.tileset));
            let world_pos: [f32; 2] = self.world_transform.transform_point2([coord.0 as f32 * self.tile_size[0], coord.1 as f32 * self.tile_size[1]].into()).into();
            let instance = SpriteInstance { world_pos, size: self.tile_size, frame: tile.frame, tint: tile.tint };
            let handle = tile_handle(coord);
            let result = if batch.has_sprite(handle) { batch.update_sprite(handle, instance) } else { batch.add_sprite(handle, instance) };
            debug_assert!(!matches!(result, Err(BatchError::Full)), "chunk sub-batch exceeded instance cap");
        }
        self.dirty = false;
    }

    /// Rebuild if dirty, then draw every chunk whose AABB intersects
    /// `view_aabb` - one draw call per tileset sub-batch in a visible
    /// chunk, zero draw calls contributed by a chunk outside the view.
    pub fn render(&mut self, view_aabb: Aabb) -> RenderStats {
        self.rebuild_if_dirty();
        let mut stats = RenderStats::default();
        for chunk in self.chunks.values_mut() {
            let tile_count = chunk.tile_count();
            if chunk.aabb.intersects(&view_aabb) {
                stats.rendered_tiles += tile_count;
                stats.draw_calls += chunk.sub_batches.len();
                for batch in chunk.sub_batches.values_mut() {
                    batch.update_instance_data(&crate::batch::Camera::default());
                }
            } else {
                stats.skipped_tiles += tile_count;
            }
        }
        stats
    }

    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<&TilemapChunk> {
        self.chunks.get(&coord)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn tile_handle(coord: TileCoord) -> u64 {
    ((coord.0 as i64 as u64) << 32) | (coord.1 as i64 as u64 & 0xFFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_tile(tileset: TilesetId) -> Tile {
        Tile { tileset, frame: [0.0, 0.0, 1.0, 1.0], tint: [1.0, 1.0, 1.0, 1.0], animation: None }
    }

    #[test]
    fn chunk_outside_view_contributes_zero_draws() {
        let mut map = Tilemap::new(4, [1.0, 1.0]);
        for x in 0..4 {
            for y in 0..4 {
                map.set_tile((x, y), plain_tile(0));
            }
        }
        // one far-away chunk
        map.set_tile((1000, 1000), plain_tile(0));

        let stats = map.render(Aabb { min: [0.0, 0.0], max: [4.0, 4.0] });
        assert_eq!(stats.rendered_tiles, 16);
        assert_eq!(stats.skipped_tiles, 1);
    }

    #[test]
    fn draw_call_count_equals_tileset_count_in_visible_chunk() {
        let mut map = Tilemap::new(8, [1.0, 1.0]);
        for x in 0..8 {
            map.set_tile((x, 0), plain_tile((x % 3) as TilesetId));
        }
        let stats = map.render(Aabb { min: [0.0, 0.0], max: [8.0, 8.0] });
        assert_eq!(stats.draw_calls, 3);
    }

    #[test]
    fn animation_frame_change_marks_tilemap_dirty() {
        let mut map = Tilemap::new(4, [1.0, 1.0]);
        let mut tile = plain_tile(0);
        tile.animation = Some(AnimatedTile::new(0.5, 2));
        map.set_tile((0, 0), tile);
        map.render(Aabb { min: [-10.0, -10.0], max: [10.0, 10.0] });
        assert!(!map.is_dirty());

        map.advance_animations(0.6);
        assert!(map.is_dirty());
    }
}
