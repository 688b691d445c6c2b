//! An abstraction over a raw Vulkan device.

use std::{
	mem::ManuallyDrop,
	sync::{Mutex, MutexGuard},
};

use ash::{ext, vk};
use gpu_allocator::vulkan::Allocator;

pub use crate::device::init::DeviceBuilder;
use crate::{Error, Result};

mod init;

pub(crate) struct DebugUtils {
	pub ext: ext::debug_utils::Instance,
	pub messenger: vk::DebugUtilsMessengerEXT,
}

/// Everything the graph needs from Vulkan: one device, one graphics queue, one allocator.
pub struct Device {
	physical_device: vk::PhysicalDevice,
	device: ash::Device,
	queue: Mutex<vk::Queue>,
	queue_family: u32,
	allocator: ManuallyDrop<Mutex<Allocator>>,
	debug_utils: Option<DebugUtils>,
	instance: ash::Instance,
	entry: ash::Entry,
}

impl Device {
	pub fn new() -> Result<Self> { DeviceBuilder::default().build() }

	pub fn builder<'a>() -> DeviceBuilder<'a> { DeviceBuilder::default() }

	pub fn entry(&self) -> &ash::Entry { &self.entry }

	pub fn instance(&self) -> &ash::Instance { &self.instance }

	pub fn device(&self) -> &ash::Device { &self.device }

	pub fn physical_device(&self) -> vk::PhysicalDevice { self.physical_device }

	pub fn queue_family(&self) -> u32 { self.queue_family }

	pub fn graphics_queue(&self) -> MutexGuard<'_, vk::Queue> { self.queue.lock().unwrap() }

	pub fn allocator(&self) -> MutexGuard<'_, Allocator> { self.allocator.lock().unwrap() }

	/// # Safety
	/// Thread-safety is handled, nothing else is.
	pub unsafe fn submit_graphics(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> Result<()> {
		self.device
			.queue_submit(*self.queue.lock().unwrap(), submits, fence)
			.map_err(Error::vulkan("vkQueueSubmit"))
	}

	pub fn wait_idle(&self) -> Result<()> {
		unsafe { self.device.device_wait_idle().map_err(Error::vulkan("vkDeviceWaitIdle")) }
	}
}

impl Drop for Device {
	fn drop(&mut self) {
		unsafe {
			// Drop the allocator before the device.
			ManuallyDrop::drop(&mut self.allocator);
			self.device.destroy_device(None);

			if let Some(utils) = self.debug_utils.as_ref() {
				utils.ext.destroy_debug_utils_messenger(utils.messenger, None);
			}
			self.instance.destroy_instance(None);
		}
	}
}
