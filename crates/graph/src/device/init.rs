use std::{
	ffi::{c_void, CStr},
	mem::ManuallyDrop,
	sync::Mutex,
};

use ash::{ext, vk};
use gpu_allocator::{
	vulkan::{Allocator, AllocatorCreateDesc},
	AllocationSizes, AllocatorDebugSettings,
};
use tracing::{error, info, trace, warn};

use crate::{
	device::{DebugUtils, Device},
	Error, Result,
};

/// Builder for a headless, single-queue [`Device`].
#[derive(Default)]
pub struct DeviceBuilder<'a> {
	pub layers: &'a [&'static CStr],
	pub instance_extensions: &'a [&'static CStr],
	pub device_extensions: &'a [&'static CStr],
}

impl<'a> DeviceBuilder<'a> {
	pub fn layers(mut self, layers: &'a [&'static CStr]) -> Self {
		self.layers = layers;
		self
	}

	pub fn instance_extensions(mut self, extensions: &'a [&'static CStr]) -> Self {
		self.instance_extensions = extensions;
		self
	}

	pub fn device_extensions(mut self, extensions: &'a [&'static CStr]) -> Self {
		self.device_extensions = extensions;
		self
	}

	pub fn build(self) -> Result<Device> {
		let entry = match unsafe { ash::Entry::load() } {
			Ok(entry) => entry,
			Err(err) => return Err(Error::Init(format!("failed to load Vulkan: {}", err))),
		};

		let (instance, debug_utils) = Self::create_instance(&entry, self.layers, self.instance_extensions)?;
		let (physical_device, queue_family) = Self::select_physical_device(&instance)?;
		let device = Self::create_device(&instance, physical_device, queue_family, self.device_extensions)?;
		let queue = unsafe { device.get_device_queue(queue_family, 0) };

		let allocator = Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: AllocatorDebugSettings::default(),
			buffer_device_address: false,
			allocation_sizes: AllocationSizes::default(),
		})?;

		Ok(Device {
			physical_device,
			device,
			queue: Mutex::new(queue),
			queue_family,
			allocator: ManuallyDrop::new(Mutex::new(allocator)),
			debug_utils,
			instance,
			entry,
		})
	}

	fn create_instance(
		entry: &ash::Entry, layers: &[&'static CStr], extensions: &[&'static CStr],
	) -> Result<(ash::Instance, Option<DebugUtils>)> {
		unsafe {
			let has_debug_utils = entry
				.enumerate_instance_extension_properties(None)
				.map_err(Error::vulkan("vkEnumerateInstanceExtensionProperties"))?
				.into_iter()
				.any(|props| CStr::from_ptr(props.extension_name.as_ptr()) == ext::debug_utils::NAME);

			let mut extensions: Vec<_> = extensions.iter().map(|x| x.as_ptr()).collect();
			if has_debug_utils {
				extensions.push(ext::debug_utils::NAME.as_ptr());
			}
			let layers: Vec<_> = layers.iter().map(|x| x.as_ptr()).collect();

			let instance = entry
				.create_instance(
					&vk::InstanceCreateInfo::default()
						.application_info(
							&vk::ApplicationInfo::default()
								.application_name(c"lucent")
								.engine_name(c"lucent")
								.api_version(vk::make_api_version(0, 1, 3, 0)),
						)
						.enabled_layer_names(&layers)
						.enabled_extension_names(&extensions),
					None,
				)
				.map_err(Error::vulkan("vkCreateInstance"))?;

			let debug_utils = if has_debug_utils {
				let ext = ext::debug_utils::Instance::new(entry, &instance);
				let messenger = ext
					.create_debug_utils_messenger(
						&vk::DebugUtilsMessengerCreateInfoEXT::default()
							.message_severity(
								vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
									| vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
									| vk::DebugUtilsMessageSeverityFlagsEXT::INFO
									| vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
							)
							.message_type(
								vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
									| vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
									| vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
							)
							.pfn_user_callback(Some(debug_messenger)),
						None,
					)
					.map_err(Error::vulkan("vkCreateDebugUtilsMessengerEXT"))?;
				Some(DebugUtils { ext, messenger })
			} else {
				None
			};

			Ok((instance, debug_utils))
		}
	}

	fn select_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32)> {
		unsafe {
			let mut best = None;
			for device in instance
				.enumerate_physical_devices()
				.map_err(Error::vulkan("vkEnumeratePhysicalDevices"))?
			{
				let properties = instance.get_physical_device_properties(device);
				if vk::api_version_minor(properties.api_version) < 3 {
					continue;
				}

				let Some(family) = instance
					.get_physical_device_queue_family_properties(device)
					.into_iter()
					.position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
				else {
					continue;
				};

				let score = match properties.device_type {
					vk::PhysicalDeviceType::DISCRETE_GPU => 2,
					vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
					_ => 0,
				};
				if best.as_ref().map_or(true, |&(_, _, s)| score > s) {
					let name = CStr::from_ptr(properties.device_name.as_ptr());
					info!("considering device {:?}", name);
					best = Some((device, family as u32, score));
				}
			}

			best.map(|(device, family, _)| (device, family))
				.ok_or_else(|| Error::Init("no suitable Vulkan 1.3 device with a graphics queue".into()))
		}
	}

	fn create_device(
		instance: &ash::Instance, physical_device: vk::PhysicalDevice, queue_family: u32,
		extensions: &[&'static CStr],
	) -> Result<ash::Device> {
		unsafe {
			let extensions: Vec<_> = extensions.iter().map(|x| x.as_ptr()).collect();
			let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);
			instance
				.create_device(
					physical_device,
					&vk::DeviceCreateInfo::default()
						.queue_create_infos(&[vk::DeviceQueueCreateInfo::default()
							.queue_family_index(queue_family)
							.queue_priorities(&[1.0])])
						.enabled_extension_names(&extensions)
						.push_next(&mut features13),
					None,
				)
				.map_err(Error::vulkan("vkCreateDevice"))
		}
	}
}

unsafe extern "system" fn debug_messenger(
	severity: vk::DebugUtilsMessageSeverityFlagsEXT, _types: vk::DebugUtilsMessageTypeFlagsEXT,
	data: *const vk::DebugUtilsMessengerCallbackDataEXT, _user: *mut c_void,
) -> vk::Bool32 {
	let message = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
	if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
		error!("{}", message);
	} else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
		warn!("{}", message);
	} else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
		info!("{}", message);
	} else {
		trace!("{}", message);
	}
	vk::FALSE
}
