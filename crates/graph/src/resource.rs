//! Descriptors and backing storage for transient textures.

use ash::vk;
use gpu_allocator::{
	vulkan::{Allocation, AllocationCreateDesc, AllocationScheme},
	MemoryLocation,
};

use crate::{device::Device, sync::AccessType, Error, Result};

/// Immutable description of a transient texture, fixed at declaration time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureInfo {
	pub name: String,
	pub size: vk::Extent3D,
	pub format: vk::Format,
	pub samples: vk::SampleCountFlags,
}

impl TextureInfo {
	/// A single-sampled color or depth target.
	pub fn new(name: impl Into<String>, size: vk::Extent3D, format: vk::Format) -> Self {
		Self {
			name: name.into(),
			size,
			format,
			samples: vk::SampleCountFlags::TYPE_1,
		}
	}

	pub fn image_type(&self) -> vk::ImageType {
		if self.size.depth > 1 {
			vk::ImageType::TYPE_3D
		} else if self.size.height > 1 {
			vk::ImageType::TYPE_2D
		} else {
			vk::ImageType::TYPE_1D
		}
	}

	pub fn aspect_mask(&self) -> vk::ImageAspectFlags { format_aspect_mask(self.format) }
}

pub fn format_aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
	match format {
		vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => vk::ImageAspectFlags::DEPTH,
		vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
		vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
			vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
		},
		_ => vk::ImageAspectFlags::COLOR,
	}
}

/// An image subresource range with value semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subresource {
	pub aspect: vk::ImageAspectFlags,
	pub first_layer: u32,
	pub layer_count: u32,
	pub first_mip: u32,
	pub mip_count: u32,
}

impl Default for Subresource {
	fn default() -> Self {
		Self {
			aspect: vk::ImageAspectFlags::COLOR,
			first_layer: 0,
			layer_count: vk::REMAINING_ARRAY_LAYERS,
			first_mip: 0,
			mip_count: vk::REMAINING_MIP_LEVELS,
		}
	}
}

impl From<Subresource> for vk::ImageSubresourceRange {
	fn from(subresource: Subresource) -> Self {
		vk::ImageSubresourceRange {
			aspect_mask: subresource.aspect,
			base_mip_level: subresource.first_mip,
			level_count: subresource.mip_count,
			base_array_layer: subresource.first_layer,
			layer_count: subresource.layer_count,
		}
	}
}

/// Where a texture's storage currently comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureStatus {
	/// Declared, but not backed by memory. Becomes `Allocated` during compilation if and
	/// only if some surviving task needs it.
	Virtual,
	/// Storage is borrowed from the caller for this frame and never freed here.
	External,
	/// Storage is owned by the graph and freed on reset.
	Allocated,
}

/// Mutable synchronization state of a texture, updated by every barrier emission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureState {
	pub last_access: AccessType,
	pub layout: vk::ImageLayout,
	pub status: TextureStatus,
}

/// The image and view behind a texture, plus the allocation when the graph owns it.
pub(crate) struct Backing {
	pub image: vk::Image,
	pub view: vk::ImageView,
	allocation: Option<Allocation>,
}

impl Backing {
	pub fn external(image: vk::Image, view: vk::ImageView) -> Self {
		Self {
			image,
			view,
			allocation: None,
		}
	}

	pub fn create(device: &Device, info: &TextureInfo) -> Result<Self> {
		let aspect = info.aspect_mask();
		let usage = if aspect.contains(vk::ImageAspectFlags::DEPTH) || aspect.contains(vk::ImageAspectFlags::STENCIL) {
			vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
		} else {
			vk::ImageUsageFlags::COLOR_ATTACHMENT
				| vk::ImageUsageFlags::SAMPLED
				| vk::ImageUsageFlags::STORAGE
				| vk::ImageUsageFlags::TRANSFER_SRC
				| vk::ImageUsageFlags::TRANSFER_DST
		};

		unsafe {
			let image = device
				.device()
				.create_image(
					&vk::ImageCreateInfo::default()
						.image_type(info.image_type())
						.format(info.format)
						.extent(info.size)
						.mip_levels(1)
						.array_layers(1)
						.samples(info.samples)
						.usage(usage)
						.sharing_mode(vk::SharingMode::EXCLUSIVE)
						.initial_layout(vk::ImageLayout::UNDEFINED),
					None,
				)
				.map_err(Error::vulkan("vkCreateImage"))?;

			let mut dedicated = vk::MemoryDedicatedRequirements::default();
			let mut out = vk::MemoryRequirements2::default().push_next(&mut dedicated);
			device
				.device()
				.get_image_memory_requirements2(&vk::ImageMemoryRequirementsInfo2::default().image(image), &mut out);

			let allocation = device.allocator().allocate(&AllocationCreateDesc {
				name: &info.name,
				requirements: out.memory_requirements,
				location: MemoryLocation::GpuOnly,
				linear: false,
				allocation_scheme: match dedicated.prefers_dedicated_allocation != 0
					|| dedicated.requires_dedicated_allocation != 0
				{
					true => AllocationScheme::DedicatedImage(image),
					false => AllocationScheme::GpuAllocatorManaged,
				},
			})?;

			device
				.device()
				.bind_image_memory(image, allocation.memory(), allocation.offset())
				.map_err(Error::vulkan("vkBindImageMemory"))?;

			let view = device
				.device()
				.create_image_view(
					&vk::ImageViewCreateInfo::default()
						.image(image)
						.view_type(match info.image_type() {
							vk::ImageType::TYPE_3D => vk::ImageViewType::TYPE_3D,
							vk::ImageType::TYPE_1D => vk::ImageViewType::TYPE_1D,
							_ => vk::ImageViewType::TYPE_2D,
						})
						.format(info.format)
						.components(vk::ComponentMapping {
							r: vk::ComponentSwizzle::IDENTITY,
							g: vk::ComponentSwizzle::IDENTITY,
							b: vk::ComponentSwizzle::IDENTITY,
							a: vk::ComponentSwizzle::IDENTITY,
						})
						.subresource_range(vk::ImageSubresourceRange {
							aspect_mask: aspect,
							base_mip_level: 0,
							level_count: vk::REMAINING_MIP_LEVELS,
							base_array_layer: 0,
							layer_count: vk::REMAINING_ARRAY_LAYERS,
						}),
					None,
				)
				.map_err(Error::vulkan("vkCreateImageView"))?;

			Ok(Self {
				image,
				view,
				allocation: Some(allocation),
			})
		}
	}

	pub fn is_owned(&self) -> bool { self.allocation.is_some() }

	/// # Safety
	/// The image must no longer be in use by the device.
	pub unsafe fn destroy(self, device: &Device) {
		if let Some(allocation) = self.allocation {
			device.device().destroy_image_view(self.view, None);
			let _ = device.allocator().free(allocation);
			device.device().destroy_image(self.image, None);
		}
	}
}
