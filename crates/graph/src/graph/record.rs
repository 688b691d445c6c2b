//! Walks compiled tasks, emits their barriers, and drives each recording body.

use ash::vk;
use bytemuck::{bytes_of, NoUninit};
use tracing::{span, trace, Level};

use crate::{
	device::Device,
	graph::{
		task::{Attachment, RenderPassInfo, TaskInfo, TaskState},
		texture::{ImageBarrier, ImageContents, TextureManager},
		ExecutionInfo, FrameContext, TaskHandle, TransitionInfo,
	},
	slotmap::SlotMap,
	sync, Error, Result,
};

/// The per-task command context a recording body receives.
///
/// It wraps the frame's command buffer together with the live texture state, and is only
/// valid for the duration of the body.
pub struct RenderInput<'a> {
	pub device: &'a Device,
	pub frame: &'a FrameContext,
	pub resources: &'a TextureManager,
	cmd: vk::CommandBuffer,
	render_pass: Option<&'a RenderPassInfo>,
	rendering: bool,
	passes_begun: u32,
}

impl RenderInput<'_> {
	pub fn command_buffer(&self) -> vk::CommandBuffer { self.cmd }

	/// Begins the render pass this task declared, clearing/loading attachments as declared.
	/// Must be balanced by [`Self::end_render_pass`] before the body returns.
	pub fn begin_render_pass(&mut self) -> Result<()> {
		let pass = self.render_pass.ok_or_else(|| {
			Error::ContractViolation("task did not declare a render pass".into())
		})?;
		if self.rendering {
			return Err(Error::ContractViolation(format!(
				"render pass '{}' is already active",
				pass.name
			)));
		}

		let first = pass
			.color_attachments
			.first()
			.or(pass.depth_attachment.as_ref())
			.or(pass.stencil_attachment.as_ref())
			.ok_or_else(|| {
				Error::ContractViolation(format!("render pass '{}' has no attachments", pass.name))
			})?;
		let size = self.resources.info(first.texture)?.size;
		let area = vk::Rect2D::default().extent(vk::Extent2D {
			width: size.width,
			height: size.height,
		});

		let color: Vec<_> = pass
			.color_attachments
			.iter()
			.map(|attachment| self.map_attachment(attachment))
			.collect::<Result<_>>()?;
		let depth = pass.depth_attachment.as_ref().map(|a| self.map_attachment(a)).transpose()?;
		let stencil = pass.stencil_attachment.as_ref().map(|a| self.map_attachment(a)).transpose()?;

		let mut info = vk::RenderingInfo::default()
			.render_area(area)
			.layer_count(1)
			.color_attachments(&color);
		if let Some(depth) = depth.as_ref() {
			info = info.depth_attachment(depth);
		}
		if let Some(stencil) = stencil.as_ref() {
			info = info.stencil_attachment(stencil);
		}

		unsafe {
			self.device.device().cmd_begin_rendering(self.cmd, &info);
			self.device.device().cmd_set_viewport(
				self.cmd,
				0,
				&[vk::Viewport {
					x: 0.0,
					y: 0.0,
					width: area.extent.width as f32,
					height: area.extent.height as f32,
					min_depth: 0.0,
					max_depth: 1.0,
				}],
			);
			self.device.device().cmd_set_scissor(self.cmd, 0, &[area]);
		}

		self.rendering = true;
		self.passes_begun += 1;
		Ok(())
	}

	pub fn end_render_pass(&mut self) -> Result<()> {
		if !self.rendering {
			return Err(Error::ContractViolation("no render pass is active".into()));
		}
		unsafe { self.device.device().cmd_end_rendering(self.cmd) };
		self.rendering = false;
		Ok(())
	}

	fn map_attachment(&self, attachment: &Attachment) -> Result<vk::RenderingAttachmentInfo<'static>> {
		let view = self.resources.view(attachment.texture)?;
		let layout = self.resources.state(attachment.texture)?.layout;
		Ok(vk::RenderingAttachmentInfo::default()
			.image_view(view)
			.image_layout(layout)
			.load_op(attachment.load_op)
			.store_op(attachment.store_op)
			.clear_value(attachment.clear_value))
	}

	pub fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline) {
		unsafe {
			self.device
				.device()
				.cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
		}
	}

	pub fn bind_compute_pipeline(&mut self, pipeline: vk::Pipeline) {
		unsafe {
			self.device
				.device()
				.cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::COMPUTE, pipeline);
		}
	}

	pub fn bind_descriptor_sets(
		&mut self, point: vk::PipelineBindPoint, layout: vk::PipelineLayout, first: u32, sets: &[vk::DescriptorSet],
	) {
		unsafe {
			self.device
				.device()
				.cmd_bind_descriptor_sets(self.cmd, point, layout, first, sets, &[]);
		}
	}

	pub fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, value: &impl NoUninit) {
		unsafe {
			self.device
				.device()
				.cmd_push_constants(self.cmd, layout, stages, offset, bytes_of(value));
		}
	}

	pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, ty: vk::IndexType) {
		unsafe { self.device.device().cmd_bind_index_buffer(self.cmd, buffer, offset, ty) }
	}

	pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: u64) {
		unsafe {
			self.device
				.device()
				.cmd_bind_vertex_buffers(self.cmd, binding, &[buffer], &[offset]);
		}
	}

	pub fn draw(&mut self, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32) {
		unsafe {
			self.device
				.device()
				.cmd_draw(self.cmd, vertices, instances, first_vertex, first_instance);
		}
	}

	pub fn draw_indexed(&mut self, indices: u32, instances: u32, first_index: u32, first_instance: u32) {
		unsafe {
			self.device
				.device()
				.cmd_draw_indexed(self.cmd, indices, instances, first_index, 0, first_instance);
		}
	}

	pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
		unsafe { self.device.device().cmd_dispatch(self.cmd, x, y, z) }
	}
}

/// Computes the barriers and transition log for one task, updating the texture states.
/// Pure bookkeeping: nothing touches the command buffer yet.
pub(crate) fn sync_task(
	textures: &mut TextureManager, tasks: &SlotMap<TaskInfo>, handle: TaskHandle,
) -> Result<(Vec<ImageBarrier>, Vec<TransitionInfo>)> {
	let task = tasks.get(handle.0).ok_or(Error::StaleHandle)?;

	let mut barriers = Vec::with_capacity(task.dependencies.len());
	let mut transitions = Vec::with_capacity(task.dependencies.len());
	for dep in &task.dependencies {
		transitions.push(TransitionInfo {
			kind: dep.kind,
			task: handle,
			resource: dep.handle,
			state_before: textures.state(dep.handle)?.last_access,
			state_after: dep.access,
		});

		// Only a dependency that observes the previous contents may keep them.
		let contents = if dep.kind.is_read() {
			ImageContents::Retain
		} else {
			ImageContents::Discard
		};
		barriers.push(textures.synchronize(dep.handle, dep.access, contents)?);
	}

	Ok((barriers, transitions))
}

/// Records every compiled task into the frame's command buffer, in plan order.
pub(crate) fn record_frame(
	device: &Device, frame: &FrameContext, textures: &mut TextureManager, tasks: &mut SlotMap<TaskInfo>,
	info: &mut ExecutionInfo,
) -> Result<()> {
	let mut log = Vec::new();
	for &task_handle in info.tasks.iter() {
		let (barriers, transitions) = sync_task(textures, tasks, task_handle)?;

		let task = tasks.get_mut(task_handle.0).ok_or(Error::StaleHandle)?;
		let name = task.name.clone();
		let span = span!(Level::TRACE, "record task", name = name.as_str());
		let _e = span.enter();

		let sync_barriers: Vec<_> = barriers.iter().map(|barrier| barrier.as_sync()).collect();
		sync::pipeline_barrier(device.device(), frame.cmd, None, &sync_barriers)?;

		task.state = TaskState::Recording;
		let body = task.body.take().ok_or_else(|| {
			Error::ContractViolation(format!("body of task '{}' was already consumed", name))
		})?;
		let render_pass = task.render_pass.clone();

		trace!("executing recording body of '{}'", name);
		let mut input = RenderInput {
			device,
			frame,
			resources: textures,
			cmd: frame.cmd,
			render_pass: render_pass.as_ref(),
			rendering: false,
			passes_begun: 0,
		};
		body(&mut input)?;

		if input.rendering {
			return Err(Error::MissingRenderPass(format!(
				"task '{}' began a render pass but never ended it",
				name
			)));
		}
		if render_pass.is_some() && input.passes_begun == 0 {
			return Err(Error::MissingRenderPass(format!(
				"task '{}' declared a render pass but never began it",
				name
			)));
		}

		tasks.get_mut(task_handle.0).ok_or(Error::StaleHandle)?.state = TaskState::Complete;
		log.extend(transitions);
	}
	info.transitions.append(&mut log);

	Ok(())
}
