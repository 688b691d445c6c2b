//! The per-frame render framegraph.
//!
//! A frame is described declaratively: tasks publish which transient textures they create,
//! read, and write, and attach a deferred recording body. [`Framegraph::record`] then
//! prunes tasks no requested output depends on, orders the survivors, materializes backing
//! memory, and replays the bodies into the frame's command buffer with the right pipeline
//! barriers in between.

use std::hash::BuildHasherDefault;

use ash::vk;
use rustc_hash::FxHasher;
use tracing::{span, Level};

pub use crate::graph::{
	record::RenderInput,
	task::{Attachment, Dependency, DependencyKind, RenderPassBuilder, RenderPassInfo, TaskBuilder, TaskInfo, TaskState},
	texture::{ImageBarrier, ImageContents, TextureManager},
};
use crate::{
	device::Device,
	resource::{TextureInfo, TextureState},
	slotmap::{Handle, SlotMap},
	sync::AccessType,
	Error, Result,
};

mod dump;
mod record;
mod resolve;
mod task;
#[cfg(test)]
mod test;
mod texture;

pub(crate) type FxHashMap<K, V> = hashbrown::HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashSet<T> = hashbrown::HashSet<T, BuildHasherDefault<FxHasher>>;

/// A versioned handle to a transient texture.
///
/// Every write mints the next version of the same underlying texture, so consumers can
/// name exactly the contents they want: the version a handle carries is the version that
/// will be resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransientTexture {
	texture: Handle,
	version: u32,
}

impl TransientTexture {
	pub(crate) fn new(texture: Handle) -> Self { Self { texture, version: 0 } }

	pub fn texture(&self) -> Handle { self.texture }

	pub fn version(&self) -> u32 { self.version }

	pub(crate) fn next_version(self) -> Self {
		Self {
			texture: self.texture,
			version: self.version + 1,
		}
	}

	pub(crate) fn previous_version(self) -> Self {
		Self {
			texture: self.texture,
			version: self.version.saturating_sub(1),
		}
	}
}

/// A handle to a committed render task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub(crate) Handle);

/// Everything the caller provides for recording one frame.
pub struct FrameContext {
	/// The command buffer to record into; it must be in the recording state.
	pub cmd: vk::CommandBuffer,
	pub frame_index: u64,
	pub swapchain_image: vk::Image,
	pub swapchain_view: vk::ImageView,
	pub extent: vk::Extent2D,
}

/// One entry of the barrier diagnostics log.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionInfo {
	pub kind: DependencyKind,
	pub task: TaskHandle,
	pub resource: TransientTexture,
	pub state_before: AccessType,
	pub state_after: AccessType,
}

/// The compiled plan for one frame: surviving tasks in execution order, the resources they
/// need, and (after recording) the transitions that were emitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionInfo {
	pub tasks: Vec<TaskHandle>,
	pub resources: Vec<TransientTexture>,
	pub transitions: Vec<TransitionInfo>,
}

/// Owner of all per-frame graph state: texture tables, task registry, inputs and outputs.
///
/// The intended cycle is declare → [`Self::record`] → submit externally →
/// [`Self::reset_for_next_frame`].
#[derive(Default)]
pub struct Framegraph {
	pub(crate) textures: TextureManager,
	pub(crate) tasks: SlotMap<TaskInfo>,
	pub(crate) external_inputs: Vec<TransientTexture>,
	pub(crate) outputs: Vec<TransientTexture>,
	/// Every resource version produced by some committed task; used to reject double
	/// writes at declaration time.
	pub(crate) written: FxHashSet<TransientTexture>,
	pub(crate) recorded: bool,
}

impl Framegraph {
	pub fn new() -> Self { Self::default() }

	/// Imports a caller-owned image (swapchain color target, depth buffer carried across
	/// frames, ...) together with the access it was last touched with.
	pub fn declare_input(
		&mut self, info: TextureInfo, last_access: AccessType, image: vk::Image, view: vk::ImageView,
	) -> TransientTexture {
		let handle = self.textures.register_external(info, last_access, image, view);
		self.external_inputs.push(handle);
		handle
	}

	/// Starts declaring a task. The returned builder borrows the graph; commit it with
	/// [`TaskBuilder::finish`].
	pub fn declare_task(&mut self, name: &str) -> TaskBuilder<'_> { TaskBuilder::new(self, name) }

	/// Marks a resource version as a final output of the frame. Only tasks reachable from
	/// the declared outputs survive compilation.
	pub fn declare_output(&mut self, handle: TransientTexture) -> Result<(TextureInfo, TextureState)> {
		let info = self.textures.info(handle)?.clone();
		let state = self.textures.state(handle)?;
		self.outputs.push(handle);
		Ok((info, state))
	}

	/// Compiles the declared tasks and records them into the frame's command buffer.
	///
	/// Compilation failures abort before any barrier is emitted. The graph must be reset
	/// before it can record another frame.
	pub fn record(&mut self, device: &Device, frame: &FrameContext) -> Result<ExecutionInfo> {
		if self.recorded {
			return Err(Error::AlreadyRecorded);
		}
		let span = span!(Level::TRACE, "framegraph record");
		let _e = span.enter();

		let mut info = self.compile(device)?;
		record::record_frame(device, frame, &mut self.textures, &mut self.tasks, &mut info)?;
		self.recorded = true;
		Ok(info)
	}

	fn compile(&mut self, device: &Device) -> Result<ExecutionInfo> {
		let span = span!(Level::TRACE, "framegraph compile");
		let _e = span.enter();

		let info = self.resolve()?;
		self.textures.allocate(device, &info.resources)?;
		Ok(info)
	}

	pub(crate) fn resolve(&mut self) -> Result<ExecutionInfo> {
		resolve::resolve(&mut self.tasks, &self.textures, &self.external_inputs, &self.outputs)
	}

	/// Renders the compiled frame as a Graphviz dependency graph, annotated with resource
	/// versions, access types, and the recorded transitions.
	pub fn dump(&self, info: &ExecutionInfo) -> String { dump::generate_dot(self, info) }

	/// Direct access to the texture tables, mainly for recording bodies and diagnostics.
	pub fn resources(&self) -> &TextureManager { &self.textures }

	pub fn external_inputs(&self) -> &[TransientTexture] { &self.external_inputs }

	pub fn outputs(&self) -> &[TransientTexture] { &self.outputs }

	/// Iterates over all committed tasks, dead or alive.
	pub fn tasks(&self) -> impl Iterator<Item = (TaskHandle, &TaskInfo)> {
		self.tasks.iter().map(|(handle, info)| (TaskHandle(handle), info))
	}

	pub fn task(&self, handle: TaskHandle) -> Result<&TaskInfo> {
		self.tasks.get(handle.0).ok_or(Error::StaleHandle)
	}

	/// Discards all per-frame state: descriptors, allocations, inputs, outputs, and every
	/// task body that was not resumed. Idempotent; required before recording again.
	pub fn reset_for_next_frame(&mut self, device: &Device) {
		self.textures.clear(device);
		self.finish_reset();
	}

	/// Reset for a frame that never allocated backing memory (nothing to return to the
	/// device), e.g. after a failed compile.
	pub fn reset_unallocated(&mut self) {
		self.textures.clear_unallocated();
		self.finish_reset();
	}

	fn finish_reset(&mut self) {
		self.tasks.clear();
		self.external_inputs.clear();
		self.outputs.clear();
		self.written.clear();
		self.recorded = false;
	}
}
