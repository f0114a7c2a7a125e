use mo_vk::{VkResult, VkResultExt, VulkanContext};
use vulkano::buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer};
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};
use vulkano::memory::allocator::{AllocationCreateInfo, MemoryTypeFilter};

pub mod material;
pub mod primitives;

pub use material::Material;
pub use primitives::{Geometry, MeshDesc, StaticVertex};

/// GPU-resident geometry plus the materials its meshes reference.
///
/// All meshes share one vertex and one index buffer; a [`MeshDesc`] addresses its range.
pub struct Model {
    meshes: Vec<MeshDesc>,
    materials: Vec<Material>,
    vertex_buffer: Subbuffer<[StaticVertex]>,
    index_buffer: Subbuffer<[u32]>,
}

impl Model {
    pub fn from_geometry(
        ctx: &VulkanContext,
        geometry: Geometry,
        mut materials: Vec<Material>,
    ) -> VkResult<Self> {
        let Geometry {
            vertices,
            indices,
            meshes,
        } = geometry;

        if materials.is_empty() {
            materials.push(Material::default());
        }
        if let Some(mesh) = meshes.iter().find(|m| m.material_index >= materials.len()) {
            tracing::warn!(
                "ECS - Mesh references material {} of {}, default material used.",
                mesh.material_index,
                materials.len()
            );
        }

        let vertex_buffer = Buffer::from_iter(
            ctx.memory_allocator().clone(),
            BufferCreateInfo {
                usage: BufferUsage::VERTEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            vertices,
        )
        .vk_op("create model vertex buffer")?;

        let index_buffer = Buffer::from_iter(
            ctx.memory_allocator().clone(),
            BufferCreateInfo {
                usage: BufferUsage::INDEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            indices,
        )
        .vk_op("create model index buffer")?;

        tracing::debug!(
            "ECS - Model with {} meshes and {} materials created.",
            meshes.len(),
            materials.len()
        );

        Ok(Self {
            meshes,
            materials,
            vertex_buffer,
            index_buffer,
        })
    }

    pub fn meshes(&self) -> &[MeshDesc] {
        &self.meshes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Material of `index`, the first material if out of range.
    pub fn material(&self, index: usize) -> &Material {
        self.materials.get(index).unwrap_or(&self.materials[0])
    }

    /// Binds the vertex and index buffers.
    pub fn bind(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> VkResult<()> {
        builder
            .bind_vertex_buffers(0, self.vertex_buffer.clone())
            .vk_op("bind model vertex buffer")?
            .bind_index_buffer(self.index_buffer.clone())
            .vk_op("bind model index buffer")?;
        Ok(())
    }
}
