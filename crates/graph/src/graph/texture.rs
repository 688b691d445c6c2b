//! Ownership and synchronization state of all transient textures of one frame.

use ash::vk;
use tracing::trace;

use crate::{
	device::Device,
	graph::{FxHashSet, TransientTexture},
	resource::{Backing, Subresource, TextureInfo, TextureState, TextureStatus},
	slotmap::SlotMap,
	sync::{self, get_access_info, AccessType},
	Error, Result,
};

/// Whether a barrier may discard the previous contents of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageContents {
	Retain,
	Discard,
}

/// A pending layout/access transition for a single image, produced by
/// [`TextureManager::synchronize`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageBarrier {
	pub image: vk::Image,
	pub range: Subresource,
	pub previous_access: AccessType,
	pub next_access: AccessType,
	pub discard_contents: bool,
}

impl ImageBarrier {
	pub fn as_sync(&self) -> sync::ImageBarrier<'_> {
		sync::ImageBarrier {
			previous_accesses: std::slice::from_ref(&self.previous_access),
			next_accesses: std::slice::from_ref(&self.next_access),
			discard_contents: self.discard_contents,
			image: self.image,
			range: self.range.into(),
			..Default::default()
		}
	}
}

struct TextureResource {
	info: TextureInfo,
	state: TextureState,
	backing: Option<Backing>,
}

/// Owns the descriptor and state tables for the frame's transient textures and their
/// backing memory.
#[derive(Default)]
pub struct TextureManager {
	textures: SlotMap<TextureResource>,
}

impl TextureManager {
	pub fn new() -> Self { Self::default() }

	/// Declares a texture that has a descriptor but no storage yet. Storage appears during
	/// compilation, and only if some surviving task needs it.
	pub fn declare_virtual(&mut self, info: TextureInfo) -> TransientTexture {
		let handle = self.textures.insert(TextureResource {
			info,
			state: TextureState {
				last_access: AccessType::Nothing,
				layout: vk::ImageLayout::UNDEFINED,
				status: TextureStatus::Virtual,
			},
			backing: None,
		});
		TransientTexture::new(handle)
	}

	/// Records a caller-owned image together with the state it arrives in. The graph tracks
	/// its layout for the frame but never frees it.
	pub fn register_external(
		&mut self, info: TextureInfo, last_access: AccessType, image: vk::Image, view: vk::ImageView,
	) -> TransientTexture {
		let handle = self.textures.insert(TextureResource {
			info,
			state: TextureState {
				last_access,
				layout: get_access_info(last_access).image_layout,
				status: TextureStatus::External,
			},
			backing: Some(Backing::external(image, view)),
		});
		TransientTexture::new(handle)
	}

	pub fn info(&self, handle: TransientTexture) -> Result<&TextureInfo> {
		self.textures
			.get(handle.texture())
			.map(|res| &res.info)
			.ok_or(Error::StaleHandle)
	}

	pub fn state(&self, handle: TransientTexture) -> Result<TextureState> {
		self.textures
			.get(handle.texture())
			.map(|res| res.state)
			.ok_or(Error::StaleHandle)
	}

	pub fn image(&self, handle: TransientTexture) -> Result<vk::Image> {
		self.backing(handle).map(|backing| backing.image)
	}

	pub fn view(&self, handle: TransientTexture) -> Result<vk::ImageView> {
		self.backing(handle).map(|backing| backing.view)
	}

	fn backing(&self, handle: TransientTexture) -> Result<&Backing> {
		let res = self.textures.get(handle.texture()).ok_or(Error::StaleHandle)?;
		res.backing.as_ref().ok_or_else(|| {
			Error::ContractViolation(format!("texture '{}' has no backing storage", res.info.name))
		})
	}

	/// Computes the barrier that moves the texture from its last recorded access to
	/// `next_access`, and updates the stored state in the same step.
	pub fn synchronize(
		&mut self, handle: TransientTexture, next_access: AccessType, contents: ImageContents,
	) -> Result<ImageBarrier> {
		let res = self.textures.get_mut(handle.texture()).ok_or(Error::StaleHandle)?;
		let backing = res.backing.as_ref().ok_or_else(|| {
			Error::ContractViolation(format!(
				"cannot synchronize virtual texture '{}' without backing storage",
				res.info.name
			))
		})?;

		let barrier = ImageBarrier {
			image: backing.image,
			range: Subresource {
				aspect: res.info.aspect_mask(),
				..Default::default()
			},
			previous_access: res.state.last_access,
			next_access,
			discard_contents: matches!(contents, ImageContents::Discard),
		};

		res.state.last_access = next_access;
		res.state.layout = get_access_info(next_access).image_layout;

		Ok(barrier)
	}

	/// Materializes backing memory for every virtual texture in `required`. Externals and
	/// repeated versions of one texture are skipped.
	pub fn allocate(&mut self, device: &Device, required: &[TransientTexture]) -> Result<()> {
		let mut seen = FxHashSet::default();
		for &handle in required {
			if !seen.insert(handle.texture()) {
				continue;
			}
			let res = self.textures.get(handle.texture()).ok_or(Error::StaleHandle)?;
			if res.state.status != TextureStatus::Virtual {
				continue;
			}
			trace!("allocating backing image for '{}'", res.info.name);
			let backing = Backing::create(device, &res.info)?;
			self.attach(handle, backing)?;
		}
		Ok(())
	}

	pub(crate) fn attach(&mut self, handle: TransientTexture, backing: Backing) -> Result<()> {
		let res = self.textures.get_mut(handle.texture()).ok_or(Error::StaleHandle)?;
		res.backing = Some(backing);
		res.state.status = TextureStatus::Allocated;
		Ok(())
	}

	/// Drops all descriptors, states, and owned allocations. Externals are left untouched.
	pub fn clear(&mut self, device: &Device) {
		for (_, res) in self.textures.drain() {
			if let Some(backing) = res.backing {
				if backing.is_owned() {
					unsafe { backing.destroy(device) };
				}
			}
		}
	}

	/// Like [`Self::clear`], for frames that never allocated anything (failed compiles,
	/// headless declaration passes).
	pub fn clear_unallocated(&mut self) {
		debug_assert!(self
			.textures
			.iter()
			.all(|(_, res)| res.backing.as_ref().map_or(true, |b| !b.is_owned())));
		self.textures.clear();
	}

	pub fn len(&self) -> usize { self.textures.len() }

	pub fn is_empty(&self) -> bool { self.textures.is_empty() }
}
