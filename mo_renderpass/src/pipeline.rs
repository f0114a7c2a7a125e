use crate::error::{PassError, PassResult};
use mo_vk::{VkResult, VkResultExt, VulkanContext};
use std::sync::Arc;
use vulkano::buffer::BufferUsage;
use vulkano::buffer::allocator::{SubbufferAllocator, SubbufferAllocatorCreateInfo};
use vulkano::buffer::{BufferContents, Subbuffer};
use vulkano::descriptor_set::layout::DescriptorSetLayout;
use vulkano::device::Device;
use vulkano::memory::allocator::MemoryTypeFilter;
use vulkano::pipeline::PipelineLayout;
use vulkano::pipeline::PipelineShaderStageCreateInfo;
use vulkano::pipeline::graphics::viewport::Viewport;
use vulkano::pipeline::layout::PipelineDescriptorSetLayoutCreateInfo;
use vulkano::shader::{EntryPoint, ShaderModule};
use vulkano::{Validated, VulkanError};

pub(crate) fn entry_point(
    module: Result<Arc<ShaderModule>, Validated<VulkanError>>,
    name: &'static str,
) -> PassResult<EntryPoint> {
    module
        .vk_op("load shader module")?
        .entry_point("main")
        .ok_or(PassError::MissingEntryPoint(name))
}

/// Pipeline layout reflected from the shader stages, with some set layouts replaced by
/// externally owned ones so descriptor sets created elsewhere stay compatible.
pub(crate) fn layout_from_stages(
    device: &Arc<Device>,
    stages: &[PipelineShaderStageCreateInfo],
    shared_sets: &[(usize, Arc<DescriptorSetLayout>)],
) -> PassResult<Arc<PipelineLayout>> {
    let mut create_info = PipelineDescriptorSetLayoutCreateInfo::from_stages(stages)
        .into_pipeline_layout_create_info(device.clone())
        .vk_op("reflect pipeline layout")?;
    for (set, layout) in shared_sets {
        create_info.set_layouts[*set] = layout.clone();
    }
    PipelineLayout::new(device.clone(), create_info)
        .vk_op("create pipeline layout")
        .map_err(PassError::from)
}

pub(crate) fn uniform_allocator(gpu: &VulkanContext) -> SubbufferAllocator {
    SubbufferAllocator::new(
        gpu.memory_allocator().clone(),
        SubbufferAllocatorCreateInfo {
            buffer_usage: BufferUsage::UNIFORM_BUFFER,
            memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
    )
}

pub(crate) fn upload_uniform<T: BufferContents>(
    allocator: &SubbufferAllocator,
    data: T,
) -> VkResult<Subbuffer<T>> {
    let subbuffer = allocator
        .allocate_sized::<T>()
        .vk_op("allocate uniform buffer")?;
    *subbuffer.write().vk_op("write uniform buffer")? = data;
    Ok(subbuffer)
}

pub(crate) fn viewport(extent: [u32; 2]) -> Viewport {
    Viewport {
        offset: [0.0, 0.0],
        extent: [extent[0] as f32, extent[1] as f32],
        depth_range: 0.0..=1.0,
    }
}
