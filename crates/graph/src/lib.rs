//! A per-frame render graph for Vulkan.
//!
//! Render passes are declared as producer/consumer relationships over transient
//! textures, then compiled into a correctly synchronized, dead-code-eliminated
//! command buffer recording for a single frame.

use std::fmt::{Debug, Display};

use ash::vk;
pub use ash;
pub use gpu_allocator::{vulkan as alloc, MemoryLocation};

pub mod device;
pub mod graph;
pub mod resource;
pub mod slotmap;
pub mod sync;

#[derive(Clone, PartialEq, Eq)]
pub enum Error {
	/// The API was misused: double writes, reads of self-produced versions, unbalanced render
	/// passes, conflicting image layouts in one barrier, and the like.
	ContractViolation(String),
	/// A required resource has no producing task and was not imported as an external input.
	UnresolvedDependency(String),
	/// Backing memory for a transient image could not be created.
	AllocationFailure(String),
	/// A task declared a render pass but its recording body never began (or never ended) it.
	MissingRenderPass(String),
	/// `record` was called twice without an intervening reset.
	AlreadyRecorded,
	/// A handle outlived the generation of the slot it points to.
	StaleHandle,
	/// Device bring-up failed outside of any Vulkan call.
	Init(String),
	/// A Vulkan call failed, tagged with the name of the failing call.
	Vulkan { call: &'static str, result: vk::Result },
}

impl Error {
	/// Tags a failing Vulkan call: `.map_err(Error::vulkan("vkCreateImage"))`.
	pub fn vulkan(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
		move |result| Self::Vulkan { call, result }
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::ContractViolation(msg) => write!(f, "contract violation: {}", msg),
			Error::UnresolvedDependency(msg) => write!(f, "unresolved dependency: {}", msg),
			Error::AllocationFailure(msg) => write!(f, "allocation failure: {}", msg),
			Error::MissingRenderPass(msg) => write!(f, "missing render pass: {}", msg),
			Error::AlreadyRecorded => write!(f, "frame was already recorded, reset before reuse"),
			Error::StaleHandle => write!(f, "stale handle"),
			Error::Init(msg) => write!(f, "initialization failed: {}", msg),
			Error::Vulkan { call, result } => write!(f, "{} failed: {}", call, result),
		}
	}
}

impl Debug for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { <Self as Display>::fmt(self, f) }
}

impl std::error::Error for Error {}

impl From<gpu_allocator::AllocationError> for Error {
	fn from(err: gpu_allocator::AllocationError) -> Self { Error::AllocationFailure(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
