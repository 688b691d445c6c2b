//! Render task declarations and the fluent builder that produces them.

use ash::vk;

use crate::{
	graph::{record::RenderInput, Framegraph, TaskHandle, TransientTexture},
	resource::TextureInfo,
	sync::AccessType,
	Error, Result,
};

/// How a task relates to one version of a resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DependencyKind {
	Create,
	Read,
	Write,
	ReadWrite,
}

impl DependencyKind {
	/// Whether the previous contents of the resource are observed.
	pub fn is_read(self) -> bool { matches!(self, DependencyKind::Read | DependencyKind::ReadWrite) }

	/// Whether the dependency mints the resource version it refers to.
	pub fn produces_version(self) -> bool {
		matches!(self, DependencyKind::Create | DependencyKind::Write | DependencyKind::ReadWrite)
	}

	pub fn label(self) -> &'static str {
		match self {
			DependencyKind::Create => "CREATE",
			DependencyKind::Read => "READ",
			DependencyKind::Write => "WRITE",
			DependencyKind::ReadWrite => "RW",
		}
	}
}

/// One edge between a task and a resource version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
	pub handle: TransientTexture,
	pub kind: DependencyKind,
	pub access: AccessType,
}

/// Lifecycle of a task within one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
	/// Committed to the registry, not yet compiled.
	Committed,
	/// The resolver assigned an execution priority.
	Compiled,
	/// Barriers emitted, body running.
	Recording,
	/// The body ran to completion.
	Complete,
	/// The resolver found no path from any requested output; the body will never run.
	Dropped,
}

/// An attachment of a task's render pass, with its load/store behavior.
#[derive(Copy, Clone)]
pub struct Attachment {
	pub texture: TransientTexture,
	pub load_op: vk::AttachmentLoadOp,
	pub store_op: vk::AttachmentStoreOp,
	pub clear_value: vk::ClearValue,
}

/// The declared attachment state of a task, consumed when its body begins rendering.
#[derive(Clone, Default)]
pub struct RenderPassInfo {
	pub name: String,
	pub color_attachments: Vec<Attachment>,
	pub depth_attachment: Option<Attachment>,
	pub stencil_attachment: Option<Attachment>,
}

pub(crate) type TaskBody = Box<dyn FnOnce(&mut RenderInput<'_>) -> Result<()>>;

/// A committed render task: its declaration plus the deferred recording body.
pub struct TaskInfo {
	pub name: String,
	pub dependencies: Vec<Dependency>,
	pub render_pass: Option<RenderPassInfo>,
	pub execution_priority: i32,
	pub(crate) state: TaskState,
	pub(crate) body: Option<TaskBody>,
}

/// Declaration-time view over the framegraph, handed out by
/// [`Framegraph::declare_task`]. Consuming it with [`TaskBuilder::finish`] commits the
/// task; dropping it declares nothing.
pub struct TaskBuilder<'graph> {
	pub(crate) graph: &'graph mut Framegraph,
	pub(crate) name: String,
	pub(crate) dependencies: Vec<Dependency>,
	pub(crate) render_pass: Option<RenderPassInfo>,
	/// Versions this task produces; used to reject reads of our own outputs.
	pub(crate) minted: Vec<TransientTexture>,
}

impl<'graph> TaskBuilder<'graph> {
	/// Declares a fresh virtual texture written by this task.
	pub fn create(&mut self, info: TextureInfo, access: AccessType) -> Result<TransientTexture> {
		if !access.is_write() {
			return Err(Error::ContractViolation(format!(
				"created texture '{}' must be declared with a write access, got {:?}",
				info.name, access
			)));
		}
		let handle = self.graph.textures.declare_virtual(info);
		self.graph.written.insert(handle);
		self.minted.push(handle);
		self.dependencies.push(Dependency {
			handle,
			kind: DependencyKind::Create,
			access,
		});
		Ok(handle)
	}

	/// Declares a read of the exact version carried by `handle`.
	pub fn read(&mut self, handle: TransientTexture, access: AccessType) -> Result<(TransientTexture, TextureInfo)> {
		if !access.is_read() {
			return Err(Error::ContractViolation(format!(
				"read declared with write access {:?}",
				access
			)));
		}
		let info = self.graph.textures.info(handle)?.clone();
		if self.minted.contains(&handle) {
			return Err(Error::ContractViolation(format!(
				"task '{}' reads its own output '{} v{}'",
				self.name,
				info.name,
				handle.version()
			)));
		}
		self.dependencies.push(Dependency {
			handle,
			kind: DependencyKind::Read,
			access,
		});
		Ok((handle, info))
	}

	/// Declares a write, minting the next version of the texture. The previous contents are
	/// not observed and may be discarded.
	pub fn write(&mut self, handle: TransientTexture, access: AccessType) -> Result<(TransientTexture, TextureInfo)> {
		self.produce(handle, access, DependencyKind::Write)
	}

	/// Declares a read-modify-write, minting the next version while observing the previous
	/// contents.
	pub fn read_write(&mut self, handle: TransientTexture, access: AccessType) -> Result<(TransientTexture, TextureInfo)> {
		self.produce(handle, access, DependencyKind::ReadWrite)
	}

	fn produce(
		&mut self, handle: TransientTexture, access: AccessType, kind: DependencyKind,
	) -> Result<(TransientTexture, TextureInfo)> {
		if !access.is_write() {
			return Err(Error::ContractViolation(format!(
				"{} declared with read access {:?}",
				kind.label(),
				access
			)));
		}
		let info = self.graph.textures.info(handle)?.clone();
		let next = handle.next_version();
		if !self.graph.written.insert(next) {
			return Err(Error::ContractViolation(format!(
				"'{} v{}' is already written by another task",
				info.name,
				next.version()
			)));
		}
		self.minted.push(next);
		self.dependencies.push(Dependency {
			handle: next,
			kind,
			access,
		});
		Ok((next, info))
	}

	/// Starts collecting the attachment state for this task's render pass.
	pub fn render_pass<'task>(&'task mut self, name: &str) -> RenderPassBuilder<'task, 'graph> {
		RenderPassBuilder {
			info: RenderPassInfo {
				name: name.into(),
				..Default::default()
			},
			task: self,
		}
	}

	/// Commits the declaration and attaches the recording body. The body runs exactly once,
	/// during [`Framegraph::record`], after the task's barriers have been emitted.
	pub fn finish(self, body: impl FnOnce(&mut RenderInput<'_>) -> Result<()> + 'static) -> Result<TaskHandle> {
		let info = TaskInfo {
			name: self.name,
			dependencies: self.dependencies,
			render_pass: self.render_pass,
			execution_priority: -1,
			state: TaskState::Committed,
			body: Some(Box::new(body)),
		};
		Ok(TaskHandle(self.graph.tasks.insert(info)))
	}

	pub(crate) fn new(graph: &'graph mut Framegraph, name: &str) -> TaskBuilder<'graph> {
		TaskBuilder {
			graph,
			name: name.into(),
			dependencies: Vec::new(),
			render_pass: None,
			minted: Vec::new(),
		}
	}
}

/// Collects color/depth/stencil attachments for one task. [`Self::finish`] commits the
/// record onto the owning task declaration.
pub struct RenderPassBuilder<'task, 'graph> {
	task: &'task mut TaskBuilder<'graph>,
	info: RenderPassInfo,
}

impl RenderPassBuilder<'_, '_> {
	pub fn color(
		mut self, texture: TransientTexture, load_op: vk::AttachmentLoadOp, store_op: vk::AttachmentStoreOp,
		clear: vk::ClearColorValue,
	) -> Self {
		self.info.color_attachments.push(Attachment {
			texture,
			load_op,
			store_op,
			clear_value: vk::ClearValue { color: clear },
		});
		self
	}

	pub fn depth(
		mut self, texture: TransientTexture, load_op: vk::AttachmentLoadOp, store_op: vk::AttachmentStoreOp,
		clear: vk::ClearDepthStencilValue,
	) -> Self {
		self.info.depth_attachment = Some(Attachment {
			texture,
			load_op,
			store_op,
			clear_value: vk::ClearValue { depth_stencil: clear },
		});
		self
	}

	pub fn stencil(
		mut self, texture: TransientTexture, load_op: vk::AttachmentLoadOp, store_op: vk::AttachmentStoreOp,
		clear: vk::ClearDepthStencilValue,
	) -> Self {
		self.info.stencil_attachment = Some(Attachment {
			texture,
			load_op,
			store_op,
			clear_value: vk::ClearValue { depth_stencil: clear },
		});
		self
	}

	pub fn finish(self) {
		self.task.render_pass = Some(self.info);
	}
}
