//! Meshes on the GPU

use ash::{vk, Device};

use super::buffer::Buffer;
use crate::assets::mesh::{MeshData, MeshLod};
use crate::graphics::error::RenderResult;
use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::GpuDevice;

/// Vertex and index buffers of one mesh; every LOD indexes the same vertices
pub struct VulkanMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    lods: Vec<MeshLod>,
}

impl VulkanMesh {
    /// Upload validated mesh data
    pub fn new(gpu: &GpuDevice, pool: &CommandPool, mesh: &MeshData) -> RenderResult<Self> {
        let vertex_buffer = Buffer::device_local(gpu, pool, &mesh.vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = Buffer::device_local(gpu, pool, &mesh.indices, vk::BufferUsageFlags::INDEX_BUFFER)?;
        log::trace!(
            "Uploaded mesh: {} vertices, {} indices, {} LODs",
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.lods.len()
        );
        Ok(Self {
            vertex_buffer,
            index_buffer,
            lods: mesh.lods.clone(),
        })
    }

    /// Stored LODs
    pub fn lod_count(&self) -> u32 {
        self.lods.len() as u32
    }

    /// Clamp a requested LOD to the coarsest one stored
    pub fn resolve_lod(&self, lod: u32) -> u32 {
        lod.min(self.lod_count().saturating_sub(1))
    }

    /// Buffers and index range of one LOD
    pub fn binding(&self, lod: u32) -> MeshBinding {
        let range = self.lods.get(self.resolve_lod(lod) as usize).copied().unwrap_or_default();
        MeshBinding {
            vertex_buffer: self.vertex_buffer.handle(),
            index_buffer: self.index_buffer.handle(),
            range,
        }
    }
}

/// Everything needed to record one indexed draw of a mesh
///
/// Plain handles, so a draw can be queued and recorded later in the pass.
#[derive(Debug, Clone, Copy)]
pub struct MeshBinding {
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    range: MeshLod,
}

impl MeshBinding {
    /// Bind the buffers and draw the range
    pub fn record(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        if self.range.count == 0 {
            return;
        }
        unsafe {
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer], &[0]);
            device.cmd_bind_index_buffer(command_buffer, self.index_buffer, 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(command_buffer, self.range.count, 1, self.range.offset, 0, 0);
        }
    }
}
