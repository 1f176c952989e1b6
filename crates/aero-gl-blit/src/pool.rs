//! Scratch GPU resources shared by every emulated blit.

use crate::device::{
    BufferId, BufferTarget, DeviceError, FramebufferId, GlDevice, TextureId, TextureParameter,
    VertexArrayId,
};
use crate::error::BlitError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::types::{TextureTarget, TextureType};

/// One triangle whose texcoords cover `[0, 1]^2`; the vertex shader maps it to clip space with
/// `a * 2 - 1`, so the unit square ends up covering the whole viewport.
pub const FULLSCREEN_TRIANGLE: [f32; 6] = [-0.5, 0.0, 1.5, 0.0, 0.5, 2.0];

pub const SCRATCH_TEXTURE_COUNT: usize = 2;

/// Ids of the scratch objects, valid until the pool is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchResources {
    pub textures: [TextureId; SCRATCH_TEXTURE_COUNT],
    pub framebuffer: FramebufferId,
    pub vertex_array: VertexArrayId,
}

/// Lazily created scratch textures, framebuffer and full-screen geometry.
///
/// Objects are created on first use and deleted exactly once by [`ScratchPool::release`]; the
/// pool itself does not implement `Drop` because deletion needs the device.
#[derive(Debug, Default)]
pub struct ScratchPool {
    textures: [Option<TextureId>; SCRATCH_TEXTURE_COUNT],
    framebuffer: Option<FramebufferId>,
    vertex_buffer: Option<BufferId>,
    vertex_array: Option<VertexArrayId>,
}

fn get_or_create<T: Copy>(
    slot: &mut Option<T>,
    create: impl FnOnce() -> Result<T, DeviceError>,
) -> Result<(T, bool), DeviceError> {
    if let Some(existing) = *slot {
        return Ok((existing, false));
    }
    let created = create()?;
    *slot = Some(created);
    Ok((created, true))
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.textures.iter().all(Option::is_some)
            && self.framebuffer.is_some()
            && self.vertex_buffer.is_some()
            && self.vertex_array.is_some()
    }

    pub fn textures(&self) -> [Option<TextureId>; SCRATCH_TEXTURE_COUNT] {
        self.textures
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// Creates whatever is missing. Objects that already exist are left untouched, so a failed
    /// call can simply be retried.
    pub fn ensure_ready<D: GlDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<ScratchResources, BlitError> {
        let mut textures = [TextureId(0); SCRATCH_TEXTURE_COUNT];
        for (slot, out) in self.textures.iter_mut().zip(textures.iter_mut()) {
            let (texture, created) = get_or_create(slot, || device.create_texture())?;
            if created {
                tracing::debug!(texture = texture.0, "created blit scratch texture");
            }
            *out = texture;
        }

        let (framebuffer, _) =
            get_or_create(&mut self.framebuffer, || device.create_framebuffer())?;

        let (vertex_buffer, created) =
            get_or_create(&mut self.vertex_buffer, || device.create_buffer())?;
        if created {
            device.bind_buffer(BufferTarget::Array, Some(vertex_buffer));
            device.buffer_data(
                BufferTarget::Array,
                bytemuck::cast_slice(&FULLSCREEN_TRIANGLE),
            );
        }

        let (vertex_array, created) =
            get_or_create(&mut self.vertex_array, || device.create_vertex_array())?;
        if created {
            // Every slot points at the triangle so the blit draw works regardless of which
            // location the driver assigned to `a_texcoord`.
            device.bind_vertex_array(Some(vertex_array));
            device.bind_buffer(BufferTarget::Array, Some(vertex_buffer));
            for index in 0..device.max_vertex_attribs() {
                device.enable_vertex_attrib_array(index);
                device.vertex_attrib_pointer_f32(index, 2, 0, 0);
            }
            tracing::debug!(
                framebuffer = framebuffer.0,
                vertex_array = vertex_array.0,
                "initialized blit scratch geometry"
            );
        }

        Ok(ScratchResources {
            textures,
            framebuffer,
            vertex_array,
        })
    }

    /// Drops the storage of every scratch texture by re-specifying it at `0x0`.
    ///
    /// Uses default unpack state (alignment 4, no unpack buffer).
    pub fn orphan_textures<D: GlDevice + ?Sized>(&self, device: &mut D) {
        device.bind_buffer(BufferTarget::PixelUnpack, None);
        device.set_pixel_unpack_alignment(4);
        for texture in self.textures.iter().flatten() {
            device.bind_texture(TextureType::Texture2D, Some(*texture));
            device.tex_image_2d(
                TextureTarget::Texture2D,
                0,
                InternalFormat::Rgba8,
                0,
                0,
                PixelFormat::Rgba,
                PixelType::UnsignedByte,
                None,
            );
        }
    }

    /// Applies `param` to every allocated scratch texture.
    pub fn set_texture_parameter<D: GlDevice + ?Sized>(
        &self,
        device: &mut D,
        param: TextureParameter,
    ) {
        for texture in self.textures.iter().flatten() {
            device.bind_texture(TextureType::Texture2D, Some(*texture));
            device.tex_parameter(TextureType::Texture2D, param);
        }
    }

    /// Deletes every owned object. Calling this on an empty pool is a no-op.
    pub fn release<D: GlDevice + ?Sized>(&mut self, device: &mut D) {
        for slot in &mut self.textures {
            if let Some(texture) = slot.take() {
                device.delete_texture(texture);
            }
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            device.delete_framebuffer(framebuffer);
        }
        if let Some(vertex_array) = self.vertex_array.take() {
            device.delete_vertex_array(vertex_array);
        }
        if let Some(buffer) = self.vertex_buffer.take() {
            device.delete_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Filter;
    use crate::recording::RecordingDevice;

    #[test]
    fn ensure_ready_is_idempotent() {
        let mut device = RecordingDevice::new();
        let mut pool = ScratchPool::new();
        assert!(!pool.is_ready());

        let first = pool.ensure_ready(&mut device).unwrap();
        let objects = device.live_object_count();
        let second = pool.ensure_ready(&mut device).unwrap();

        assert!(pool.is_ready());
        assert_eq!(first, second);
        assert_eq!(device.live_object_count(), objects);
    }

    #[test]
    fn geometry_is_uploaded_and_every_attribute_enabled() {
        let mut device = RecordingDevice::new().with_max_vertex_attribs(4);
        let mut pool = ScratchPool::new();
        let resources = pool.ensure_ready(&mut device).unwrap();

        let data = device.bound_array_buffer_data().unwrap();
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(data);
        assert_eq!(floats, FULLSCREEN_TRIANGLE);
        assert_eq!(device.enabled_attribs(resources.vertex_array), vec![0, 1, 2, 3]);
    }

    #[test]
    fn failed_allocation_keeps_created_objects_for_retry() {
        let mut device = RecordingDevice::new();
        device.fail_allocation_after(1);
        let mut pool = ScratchPool::new();

        let err = pool.ensure_ready(&mut device).unwrap_err();
        assert!(matches!(err, BlitError::Device(DeviceError::OutOfMemory(_))));
        assert!(pool.textures()[0].is_some());
        assert!(pool.textures()[1].is_none());

        let resources = pool.ensure_ready(&mut device).unwrap();
        assert_eq!(Some(resources.textures[0]), pool.textures()[0]);
        assert!(pool.is_ready());
    }

    #[test]
    fn orphaning_leaves_zero_sized_storage() {
        let mut device = RecordingDevice::new();
        let mut pool = ScratchPool::new();
        let resources = pool.ensure_ready(&mut device).unwrap();

        for texture in resources.textures {
            device.bind_texture(TextureType::Texture2D, Some(texture));
            device.tex_image_2d(
                TextureTarget::Texture2D,
                0,
                InternalFormat::Rgba8,
                16,
                16,
                PixelFormat::Rgba,
                PixelType::UnsignedByte,
                None,
            );
            assert_eq!(device.texture_footprint(texture), 16 * 16 * 4);
        }

        pool.orphan_textures(&mut device);
        for texture in resources.textures {
            assert_eq!(device.texture_footprint(texture), 0);
        }
    }

    #[test]
    fn parameters_apply_to_all_scratch_textures() {
        let mut device = RecordingDevice::new();
        let mut pool = ScratchPool::new();
        let resources = pool.ensure_ready(&mut device).unwrap();

        pool.set_texture_parameter(&mut device, TextureParameter::MinFilter(Filter::Linear));
        for texture in resources.textures {
            assert_eq!(device.texture_min_filter(texture), Some(Filter::Linear));
        }
    }

    #[test]
    fn release_is_idempotent() {
        let mut device = RecordingDevice::new();
        let baseline = device.live_object_count();
        let mut pool = ScratchPool::new();
        pool.ensure_ready(&mut device).unwrap();
        assert!(device.live_object_count() > baseline);

        pool.release(&mut device);
        assert_eq!(device.live_object_count(), baseline);
        pool.release(&mut device);
        assert_eq!(device.live_object_count(), baseline);
        assert!(!pool.is_ready());
    }
}
