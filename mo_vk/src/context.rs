use crate::error::{VkError, VkResult, VkResultExt};
use std::sync::Arc;
use vulkano::{
    VulkanLibrary,
    command_buffer::allocator::StandardCommandBufferAllocator,
    descriptor_set::allocator::StandardDescriptorSetAllocator,
    device::{
        Device, DeviceCreateInfo, DeviceExtensions, DeviceFeatures, Queue, QueueCreateInfo,
        QueueFlags,
        physical::{PhysicalDevice, PhysicalDeviceType},
    },
    instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
    memory::allocator::StandardMemoryAllocator,
    swapchain::Surface,
};
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Everything a pass needs to create GPU objects. Passed explicitly, never global.
pub struct VulkanContext {
    instance: Arc<Instance>,
    surface: Arc<Surface>,
    device: Arc<Device>,
    graphics_queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
}

impl VulkanContext {
    pub fn new(
        event_loop: &ActiveEventLoop,
        window: Arc<Window>,
        enable_validation: bool,
    ) -> VkResult<Self> {
        let library = VulkanLibrary::new().vk_op("load vulkan library")?;
        let required_extensions =
            Surface::required_extensions(event_loop).vk_op("query surface extensions")?;

        let mut enabled_layers = Vec::new();
        if enable_validation {
            let available = library
                .layer_properties()
                .vk_op("enumerate instance layers")?
                .any(|layer| layer.name() == VALIDATION_LAYER);
            if available {
                enabled_layers.push(VALIDATION_LAYER.to_owned());
            } else {
                tracing::warn!("Context - {VALIDATION_LAYER} requested but not installed.");
            }
        }

        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
                enabled_extensions: required_extensions,
                enabled_layers,
                ..Default::default()
            },
        )
        .vk_op("create instance")?;

        let surface =
            Surface::from_window(instance.clone(), window).vk_op("create window surface")?;

        let device_extensions = DeviceExtensions {
            khr_swapchain: true,
            ..DeviceExtensions::empty()
        };
        // Bindless material lookups index the texture array with a push constant.
        let device_features = DeviceFeatures {
            shader_sampled_image_array_dynamic_indexing: true,
            ..DeviceFeatures::empty()
        };
        let (physical_device, queue_family_index) =
            pick_physical_device(&instance, &surface, &device_extensions, &device_features)?;

        tracing::info!(
            "Context - Using device {} (type: {:?}).",
            physical_device.properties().device_name,
            physical_device.properties().device_type,
        );

        let (device, mut queues) = Device::new(
            physical_device,
            DeviceCreateInfo {
                enabled_extensions: device_extensions,
                enabled_features: device_features,
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .vk_op("create logical device")?;
        let graphics_queue = queues.next().ok_or(VkError::NoSuitableDevice)?;

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
            device.clone(),
            Default::default(),
        ));
        let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
            device.clone(),
            Default::default(),
        ));

        tracing::info!("Context - Vulkan context successfully created.");

        Ok(Self {
            instance,
            surface,
            device,
            graphics_queue,
            memory_allocator,
            command_buffer_allocator,
            descriptor_set_allocator,
        })
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn physical_device(&self) -> &Arc<PhysicalDevice> {
        self.device.physical_device()
    }

    pub fn graphics_queue(&self) -> &Arc<Queue> {
        &self.graphics_queue
    }

    pub fn memory_allocator(&self) -> &Arc<StandardMemoryAllocator> {
        &self.memory_allocator
    }

    pub fn command_buffer_allocator(&self) -> &Arc<StandardCommandBufferAllocator> {
        &self.command_buffer_allocator
    }

    pub fn descriptor_set_allocator(&self) -> &Arc<StandardDescriptorSetAllocator> {
        &self.descriptor_set_allocator
    }

    /// Blocks until every queue of the device is idle.
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.wait_idle() }.vk_op("wait for device idle")
    }
}

fn pick_physical_device(
    instance: &Arc<Instance>,
    surface: &Arc<Surface>,
    device_extensions: &DeviceExtensions,
    device_features: &DeviceFeatures,
) -> VkResult<(Arc<PhysicalDevice>, u32)> {
    instance
        .enumerate_physical_devices()
        .vk_op("enumerate physical devices")?
        .filter(|p| p.supported_extensions().contains(device_extensions))
        .filter(|p| p.supported_features().contains(device_features))
        .filter_map(|p| {
            p.queue_family_properties()
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags.intersects(QueueFlags::GRAPHICS)
                        && p.surface_support(i as u32, surface).unwrap_or(false)
                })
                .map(|i| (p, i as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
            _ => 5,
        })
        .ok_or(VkError::NoSuitableDevice)
}
