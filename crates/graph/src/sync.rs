//! Pipeline barrier derivation from coarse access types.
//!
//! This is a port of Tobias Hector's "simpler Vulkan synchronization" table: rather than
//! the full maze of stage/access/layout combinations - many of which are invalid or
//! nonsensical - resource usage collapses to a short list of distinct access types, each
//! mapping to exactly one `{stage mask, access mask, image layout}` triple.

use ash::vk;

use crate::{Error, Result};

/// Every way the render graph can touch a resource.
///
/// Read accesses are ordered strictly before write accesses; [`is_write_access`] relies on
/// this ordering.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessType {
	/// No access. Useful primarily for initialization.
	#[default]
	Nothing,

	/// Read as an indirect buffer for drawing or dispatch.
	IndirectBuffer,
	/// Read as an index buffer for drawing.
	IndexBuffer,
	/// Read as a vertex buffer for drawing.
	VertexBuffer,
	/// Read as a uniform buffer in a vertex shader.
	VertexShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a vertex shader.
	VertexShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource in a vertex shader.
	VertexShaderReadOther,
	/// Read as a uniform buffer in a tessellation control shader.
	TessellationControlShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a tessellation control shader.
	TessellationControlShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource in a tessellation control shader.
	TessellationControlShaderReadOther,
	/// Read as a uniform buffer in a tessellation evaluation shader.
	TessellationEvaluationShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a tessellation evaluation shader.
	TessellationEvaluationShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource in a tessellation evaluation shader.
	TessellationEvaluationShaderReadOther,
	/// Read as a uniform buffer in a geometry shader.
	GeometryShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a geometry shader.
	GeometryShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource in a geometry shader.
	GeometryShaderReadOther,
	/// Read as a uniform buffer in a fragment shader.
	FragmentShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a fragment shader.
	FragmentShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as an input attachment with a color format in a fragment shader.
	FragmentShaderReadColorInputAttachment,
	/// Read as an input attachment with a depth/stencil format in a fragment shader.
	FragmentShaderReadDepthStencilInputAttachment,
	/// Read as any other resource in a fragment shader.
	FragmentShaderReadOther,
	/// Read by blending/logic operations or subpass load operations.
	ColorAttachmentRead,
	/// Read by depth/stencil tests or subpass load operations.
	DepthStencilAttachmentRead,
	/// Read as a uniform buffer in a compute shader.
	ComputeShaderReadUniformBuffer,
	/// Read as a sampled image or uniform texel buffer in a compute shader.
	ComputeShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource in a compute shader.
	ComputeShaderReadOther,
	/// Read as a uniform buffer in any shader.
	AnyShaderReadUniformBuffer,
	/// Read as a uniform buffer in any shader, or a vertex buffer.
	AnyShaderReadUniformBufferOrVertexBuffer,
	/// Read as a sampled image in any shader.
	AnyShaderReadSampledImageOrUniformTexelBuffer,
	/// Read as any other resource (excluding attachments) in any shader.
	AnyShaderReadOther,
	/// Read as the source of a transfer operation.
	TransferRead,
	/// Read on the host.
	HostRead,
	/// Read by the presentation engine.
	Present,

	/// Written as any resource in a vertex shader.
	VertexShaderWrite,
	/// Written as any resource in a tessellation control shader.
	TessellationControlShaderWrite,
	/// Written as any resource in a tessellation evaluation shader.
	TessellationEvaluationShaderWrite,
	/// Written as any resource in a geometry shader.
	GeometryShaderWrite,
	/// Written as any resource in a fragment shader.
	FragmentShaderWrite,
	/// Written as a color attachment during rendering.
	ColorAttachmentWrite,
	/// Written as a depth/stencil attachment during rendering.
	DepthStencilAttachmentWrite,
	/// Written as the depth aspect of a depth/stencil attachment, stencil read-only.
	DepthAttachmentWriteStencilReadOnly,
	/// Written as the stencil aspect of a depth/stencil attachment, depth read-only.
	StencilAttachmentWriteDepthReadOnly,
	/// Written as any resource in a compute shader.
	ComputeShaderWrite,
	/// Read or written as any resource in a compute shader.
	ComputeShaderReadWrite,
	/// Written as any resource in any shader.
	AnyShaderWrite,
	/// Written as the destination of a transfer operation.
	TransferWrite,
	/// Written on the host.
	HostWrite,
	/// Read or written as a color attachment during rendering.
	ColorAttachmentReadWrite,
	/// Covers any access. Useful for debug, avoid for performance.
	General,
}

/// The first entry of the write half of the table. Everything at or past it is a write.
const FIRST_WRITE_ACCESS: AccessType = AccessType::VertexShaderWrite;

pub fn is_write_access(ty: AccessType) -> bool { ty >= FIRST_WRITE_ACCESS }

pub fn is_read_access(ty: AccessType) -> bool { !is_write_access(ty) }

impl AccessType {
	pub fn is_write(self) -> bool { is_write_access(self) }

	pub fn is_read(self) -> bool { is_read_access(self) }
}

/// The stage/access/layout triple a single [`AccessType`] resolves to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessInfo {
	pub stage_mask: vk::PipelineStageFlags,
	pub access_mask: vk::AccessFlags,
	pub image_layout: vk::ImageLayout,
}

pub fn get_access_info(ty: AccessType) -> AccessInfo {
	match ty {
		AccessType::Nothing => AccessInfo {
			stage_mask: vk::PipelineStageFlags::empty(),
			access_mask: vk::AccessFlags::empty(),
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::IndirectBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::DRAW_INDIRECT,
			access_mask: vk::AccessFlags::INDIRECT_COMMAND_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::IndexBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_INPUT,
			access_mask: vk::AccessFlags::INDEX_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::VertexBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_INPUT,
			access_mask: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::VertexShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::VertexShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::VertexShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TessellationControlShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::TessellationControlShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::TessellationControlShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TessellationEvaluationShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::TessellationEvaluationShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::TessellationEvaluationShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::GeometryShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::GEOMETRY_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::GeometryShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::GEOMETRY_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::GeometryShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::GEOMETRY_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::FragmentShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::FragmentShaderReadColorInputAttachment => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::FragmentShaderReadDepthStencilInputAttachment => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
		},
		AccessType::FragmentShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::ColorAttachmentRead => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
			access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
		},
		AccessType::DepthStencilAttachmentRead => AccessInfo {
			stage_mask: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
			access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
		},
		AccessType::ComputeShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COMPUTE_SHADER,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COMPUTE_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::ComputeShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COMPUTE_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::AnyShaderReadUniformBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::UNIFORM_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::AnyShaderReadUniformBufferOrVertexBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::UNIFORM_READ | vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
			image_layout: vk::ImageLayout::UNDEFINED,
		},
		AccessType::AnyShaderReadSampledImageOrUniformTexelBuffer => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		},
		AccessType::AnyShaderReadOther => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::SHADER_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TransferRead => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TRANSFER,
			access_mask: vk::AccessFlags::TRANSFER_READ,
			image_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
		},
		AccessType::HostRead => AccessInfo {
			stage_mask: vk::PipelineStageFlags::HOST,
			access_mask: vk::AccessFlags::HOST_READ,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::Present => AccessInfo {
			stage_mask: vk::PipelineStageFlags::empty(),
			access_mask: vk::AccessFlags::empty(),
			image_layout: vk::ImageLayout::PRESENT_SRC_KHR,
		},
		AccessType::VertexShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::VERTEX_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TessellationControlShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TessellationEvaluationShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::GeometryShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::GEOMETRY_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::FragmentShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::ColorAttachmentWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
			access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
			image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
		},
		AccessType::DepthStencilAttachmentWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
			access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
			image_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
		},
		AccessType::DepthAttachmentWriteStencilReadOnly => AccessInfo {
			stage_mask: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
			access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL,
		},
		AccessType::StencilAttachmentWriteDepthReadOnly => AccessInfo {
			stage_mask: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
			access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
			image_layout: vk::ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL,
		},
		AccessType::ComputeShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COMPUTE_SHADER,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::ComputeShaderReadWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COMPUTE_SHADER,
			access_mask: vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::AnyShaderWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::SHADER_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::TransferWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::TRANSFER,
			access_mask: vk::AccessFlags::TRANSFER_WRITE,
			image_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
		},
		AccessType::HostWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::HOST,
			access_mask: vk::AccessFlags::HOST_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
		AccessType::ColorAttachmentReadWrite => AccessInfo {
			stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
			access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
			image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
		},
		AccessType::General => AccessInfo {
			stage_mask: vk::PipelineStageFlags::ALL_COMMANDS,
			access_mask: vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
			image_layout: vk::ImageLayout::GENERAL,
		},
	}
}

/// The OR-combination of a set of access types.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CombinedAccess {
	pub stage_mask: vk::PipelineStageFlags,
	pub access_mask: vk::AccessFlags,
	pub image_layout: vk::ImageLayout,
	pub has_write: bool,
}

/// Combines a set of access types into one stage/access/layout triple.
///
/// The set must be non-empty and either all reads or exactly one write; all members must
/// agree on the image layout.
pub fn combined_access_info(accesses: &[AccessType]) -> Result<CombinedAccess> {
	let (&first, rest) = accesses.split_first().ok_or_else(|| {
		Error::ContractViolation("cannot combine an empty access set".into())
	})?;

	let info = get_access_info(first);
	let mut combined = CombinedAccess {
		stage_mask: info.stage_mask,
		access_mask: info.access_mask,
		image_layout: info.image_layout,
		has_write: first.is_write(),
	};

	for &access in rest {
		if access.is_write() || combined.has_write {
			return Err(Error::ContractViolation(format!(
				"a write access must stand alone, got {:?} in a set of {}",
				access,
				accesses.len()
			)));
		}
		let info = get_access_info(access);
		if info.image_layout != combined.image_layout {
			return Err(Error::ContractViolation(format!(
				"accesses {:?} and {:?} disagree on the image layout",
				first, access
			)));
		}
		combined.stage_mask |= info.stage_mask;
		combined.access_mask |= info.access_mask;
	}

	Ok(combined)
}

/// A barrier affecting all resources at once. Preferred whenever no layout transition or
/// queue ownership transfer is required.
#[derive(Clone, Debug, Default)]
pub struct GlobalBarrier<'a> {
	pub previous_accesses: &'a [AccessType],
	pub next_accesses: &'a [AccessType],
}

/// A barrier affecting a single image subresource range, able to transition layouts.
///
/// With `discard_contents` the old layout is reported as undefined, allowing the driver to
/// skip preserving the previous contents entirely.
#[derive(Clone, Debug)]
pub struct ImageBarrier<'a> {
	pub previous_accesses: &'a [AccessType],
	pub next_accesses: &'a [AccessType],
	pub discard_contents: bool,
	pub src_queue_family_index: u32,
	pub dst_queue_family_index: u32,
	pub image: vk::Image,
	pub range: vk::ImageSubresourceRange,
}

impl Default for ImageBarrier<'_> {
	fn default() -> Self {
		Self {
			previous_accesses: &[],
			next_accesses: &[],
			discard_contents: false,
			src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
			dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
			image: vk::Image::null(),
			range: vk::ImageSubresourceRange::default(),
		}
	}
}

/// Translates a global barrier into source and destination stages plus a Vulkan memory
/// barrier.
pub fn get_memory_barrier(barrier: &GlobalBarrier) -> (vk::PipelineStageFlags, vk::PipelineStageFlags, vk::MemoryBarrier<'static>) {
	let mut src_stages = vk::PipelineStageFlags::empty();
	let mut dst_stages = vk::PipelineStageFlags::empty();
	let mut memory_barrier = vk::MemoryBarrier::default();

	for &previous in barrier.previous_accesses {
		let info = get_access_info(previous);
		src_stages |= info.stage_mask;
		// Availability operations are only needed for writes.
		if previous.is_write() {
			memory_barrier.src_access_mask |= info.access_mask;
		}
	}

	for &next in barrier.next_accesses {
		let info = get_access_info(next);
		dst_stages |= info.stage_mask;
		// A zero source access mask means a WAR hazard, which needs no visibility.
		if memory_barrier.src_access_mask != vk::AccessFlags::empty() {
			memory_barrier.dst_access_mask |= info.access_mask;
		}
	}

	if src_stages == vk::PipelineStageFlags::empty() {
		src_stages = vk::PipelineStageFlags::TOP_OF_PIPE;
	}
	if dst_stages == vk::PipelineStageFlags::empty() {
		dst_stages = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
	}

	(src_stages, dst_stages, memory_barrier)
}

/// Translates an image barrier into source and destination stages plus a Vulkan image
/// memory barrier, deriving the layout transition from the access sets.
pub fn get_image_memory_barrier(
	barrier: &ImageBarrier,
) -> Result<(vk::PipelineStageFlags, vk::PipelineStageFlags, vk::ImageMemoryBarrier<'static>)> {
	let mut src_stages = vk::PipelineStageFlags::empty();
	let mut dst_stages = vk::PipelineStageFlags::empty();
	let mut image_barrier = vk::ImageMemoryBarrier::default()
		.src_queue_family_index(barrier.src_queue_family_index)
		.dst_queue_family_index(barrier.dst_queue_family_index)
		.image(barrier.image)
		.subresource_range(barrier.range);

	let mut old_layout = None;
	for &previous in barrier.previous_accesses {
		let info = get_access_info(previous);
		src_stages |= info.stage_mask;
		if previous.is_write() {
			image_barrier.src_access_mask |= info.access_mask;
		}

		let layout = if barrier.discard_contents {
			vk::ImageLayout::UNDEFINED
		} else {
			info.image_layout
		};
		if old_layout.is_some_and(|l| l != layout) {
			return Err(Error::ContractViolation(format!(
				"previous accesses disagree on the old image layout: {:?} vs {:?}",
				old_layout.unwrap(),
				layout
			)));
		}
		old_layout = Some(layout);
		image_barrier.old_layout = layout;
	}

	let mut new_layout = None;
	for &next in barrier.next_accesses {
		let info = get_access_info(next);
		dst_stages |= info.stage_mask;
		// A zero source access mask means a WAR hazard, which needs no visibility.
		if image_barrier.src_access_mask != vk::AccessFlags::empty() {
			image_barrier.dst_access_mask |= info.access_mask;
		}

		if new_layout.is_some_and(|l| l != info.image_layout) {
			return Err(Error::ContractViolation(format!(
				"next accesses disagree on the new image layout: {:?} vs {:?}",
				new_layout.unwrap(),
				info.image_layout
			)));
		}
		new_layout = Some(info.image_layout);
		image_barrier.new_layout = info.image_layout;
	}

	if src_stages == vk::PipelineStageFlags::empty() {
		src_stages = vk::PipelineStageFlags::TOP_OF_PIPE;
	}
	if dst_stages == vk::PipelineStageFlags::empty() {
		dst_stages = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
	}

	Ok((src_stages, dst_stages, image_barrier))
}

/// Batches the given barriers into a single `vkCmdPipelineBarrier`.
pub fn pipeline_barrier(
	device: &ash::Device, cmd: vk::CommandBuffer, global_barrier: Option<&GlobalBarrier>, image_barriers: &[ImageBarrier],
) -> Result<()> {
	let mut src_stage_mask = vk::PipelineStageFlags::TOP_OF_PIPE;
	let mut dst_stage_mask = vk::PipelineStageFlags::BOTTOM_OF_PIPE;

	let mut memory_barriers = Vec::with_capacity(1);
	let mut vk_image_barriers = Vec::with_capacity(image_barriers.len());

	if let Some(barrier) = global_barrier {
		let (src, dst, barrier) = get_memory_barrier(barrier);
		src_stage_mask |= src;
		dst_stage_mask |= dst;
		memory_barriers.push(barrier);
	}

	for barrier in image_barriers {
		let (src, dst, barrier) = get_image_memory_barrier(barrier)?;
		src_stage_mask |= src;
		dst_stage_mask |= dst;
		vk_image_barriers.push(barrier);
	}

	unsafe {
		device.cmd_pipeline_barrier(
			cmd,
			src_stage_mask,
			dst_stage_mask,
			vk::DependencyFlags::empty(),
			&memory_barriers,
			&[],
			&vk_image_barriers,
		);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_write_split_follows_the_table_order() {
		assert!(!is_write_access(AccessType::Nothing));
		assert!(!is_write_access(AccessType::Present));
		assert!(!is_write_access(AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer));
		assert!(is_write_access(AccessType::VertexShaderWrite));
		assert!(is_write_access(AccessType::ColorAttachmentWrite));
		assert!(is_write_access(AccessType::General));
	}

	#[test]
	fn nothing_maps_to_empty_info() {
		let info = get_access_info(AccessType::Nothing);
		assert_eq!(info.stage_mask, vk::PipelineStageFlags::empty());
		assert_eq!(info.access_mask, vk::AccessFlags::empty());
		assert_eq!(info.image_layout, vk::ImageLayout::UNDEFINED);
	}

	#[test]
	fn combine_reads_ors_stages_and_masks() {
		let combined = combined_access_info(&[
			AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer,
			AccessType::ComputeShaderReadSampledImageOrUniformTexelBuffer,
		])
		.unwrap();
		assert!(combined.stage_mask.contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
		assert!(combined.stage_mask.contains(vk::PipelineStageFlags::COMPUTE_SHADER));
		assert_eq!(combined.access_mask, vk::AccessFlags::SHADER_READ);
		assert_eq!(combined.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
		assert!(!combined.has_write);
	}

	#[test]
	fn combine_rejects_write_mixed_with_anything() {
		assert!(combined_access_info(&[]).is_err());
		assert!(combined_access_info(&[AccessType::ColorAttachmentWrite, AccessType::ColorAttachmentRead]).is_err());
		assert!(combined_access_info(&[AccessType::TransferRead, AccessType::TransferWrite]).is_err());
		let lone_write = combined_access_info(&[AccessType::ColorAttachmentWrite]).unwrap();
		assert!(lone_write.has_write);
	}

	#[test]
	fn combine_rejects_conflicting_layouts() {
		assert!(combined_access_info(&[
			AccessType::TransferRead,
			AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer,
		])
		.is_err());
	}

	#[test]
	fn war_hazard_needs_no_visibility() {
		let (src, dst, barrier) = get_memory_barrier(&GlobalBarrier {
			previous_accesses: &[AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer],
			next_accesses: &[AccessType::TransferWrite],
		});
		assert_eq!(barrier.src_access_mask, vk::AccessFlags::empty());
		assert_eq!(barrier.dst_access_mask, vk::AccessFlags::empty());
		assert_eq!(src, vk::PipelineStageFlags::FRAGMENT_SHADER);
		assert_eq!(dst, vk::PipelineStageFlags::TRANSFER);
	}

	#[test]
	fn raw_hazard_gets_visibility() {
		let (_, _, barrier) = get_memory_barrier(&GlobalBarrier {
			previous_accesses: &[AccessType::ColorAttachmentWrite],
			next_accesses: &[AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer],
		});
		assert_eq!(barrier.src_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
		assert_eq!(barrier.dst_access_mask, vk::AccessFlags::SHADER_READ);
	}

	#[test]
	fn empty_access_sets_default_to_pipe_ends() {
		let (src, dst, _) = get_memory_barrier(&GlobalBarrier::default());
		assert_eq!(src, vk::PipelineStageFlags::TOP_OF_PIPE);
		assert_eq!(dst, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
	}

	#[test]
	fn discard_forces_undefined_old_layout() {
		let (_, _, barrier) = get_image_memory_barrier(&ImageBarrier {
			previous_accesses: &[AccessType::ColorAttachmentWrite],
			next_accesses: &[AccessType::ColorAttachmentWrite],
			discard_contents: true,
			..Default::default()
		})
		.unwrap();
		assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
		assert_eq!(barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
	}

	#[test]
	fn layout_transition_from_undefined() {
		let (src, dst, barrier) = get_image_memory_barrier(&ImageBarrier {
			previous_accesses: &[AccessType::Nothing],
			next_accesses: &[AccessType::ColorAttachmentWrite],
			..Default::default()
		})
		.unwrap();
		assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
		assert_eq!(barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
		assert_eq!(src, vk::PipelineStageFlags::TOP_OF_PIPE);
		assert_eq!(dst, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
	}

	#[test]
	fn image_barrier_rejects_conflicting_next_layouts() {
		assert!(get_image_memory_barrier(&ImageBarrier {
			previous_accesses: &[AccessType::Nothing],
			next_accesses: &[AccessType::TransferRead, AccessType::ColorAttachmentRead],
			..Default::default()
		})
		.is_err());
	}
}
