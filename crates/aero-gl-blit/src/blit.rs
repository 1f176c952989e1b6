//! Emulated copy, blit and clear operations.

use crate::device::{
    Attachment, BufferTarget, Capability, ClearMask, Filter, FramebufferId, FramebufferTarget,
    GlDevice, RenderbufferId, TextureParameter, Wrap,
};
use crate::error::{BlitError, BlitOutcome};
use crate::format::{
    copy_tex_image_format, ComponentType, InternalFormat, LumaFormat, PixelFormat, PixelType,
    Swizzle,
};
use crate::pixels::{self, DestImage, SourceImage, UnpackOptions};
use crate::pool::{ScratchPool, ScratchResources};
use crate::resources::{ReadFramebuffer, TextureHandle, TextureLevel};
use crate::scratch::ScratchMemory;
use crate::shader::{BlitVariant, CompiledBlitProgram, ProgramCache};
use crate::state::{KeepState, ScopedState};
use crate::types::{Extents, ImageIndex, LayerRange, Offset, Rect, TextureTarget, TextureType, Vec2};

const IDENTITY_SWIZZLE: [Swizzle; 4] = [
    Swizzle::Red,
    Swizzle::Green,
    Swizzle::Blue,
    Swizzle::Alpha,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitConfig {
    /// Release scratch texture storage after the luminance/alpha copies, which size the scratch
    /// textures to the copied region.
    pub orphan_scratch_textures: bool,
}

impl Default for BlitConfig {
    fn default() -> Self {
        Self {
            orphan_scratch_textures: true,
        }
    }
}

/// Texture-to-texture copy drawn with a blit program.
///
/// The copy samples `source` through its own texture object, so it leaves that object's
/// BASE_LEVEL at `source.level`, both filters at NEAREST and, when `luma` is set, the luma
/// sampling swizzle. Callers that track texture parameters must re-sync them afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopySubTextureDesc {
    /// Must be a 2D texture level.
    pub source: TextureLevel,
    pub source_component_type: ComponentType,
    pub source_size: Extents,
    pub dest: TextureLevel,
    pub dest_component_type: ComponentType,
    pub source_area: Rect,
    pub dest_offset: Offset,
    /// Set when the source emulates a luminance/alpha format on RGBA storage.
    pub luma: Option<LumaFormat>,
    pub unpack: UnpackOptions,
}

/// Texture-to-texture copy converted on the CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuReadbackCopyDesc {
    pub source: TextureLevel,
    pub source_component_type: ComponentType,
    pub dest: TextureLevel,
    pub dest_format: PixelFormat,
    pub dest_type: PixelType,
    pub source_area: Rect,
    pub dest_offset: Offset,
    pub unpack: UnpackOptions,
}

/// Texture coordinate transform that samples `area` of a `size`-sized texture across the whole
/// viewport. A reversed axis mirrors the sampled range.
fn sample_transform(
    area: Rect,
    size: (i32, i32),
    reverse_x: bool,
    reverse_y: bool,
) -> (Vec2, Vec2) {
    let (width, height) = (size.0 as f32, size.1 as f32);
    let mut offset = Vec2::new(area.x as f32 / width, area.y as f32 / height);
    let mut scale = Vec2::new(area.width as f32 / width, area.height as f32 / height);
    if reverse_x {
        offset.x += scale.x;
        scale.x = -scale.x;
    }
    if reverse_y {
        offset.y += scale.y;
        scale.y = -scale.y;
    }
    (offset, scale)
}

fn set_blit_uniforms<D: GlDevice + ?Sized>(
    device: &mut D,
    program: &CompiledBlitProgram,
    offset: Vec2,
    scale: Vec2,
    unpack: UnpackOptions,
) {
    device.use_program(Some(program.program));
    device.uniform_2_f32(program.scale, scale.x, scale.y);
    device.uniform_2_f32(program.offset, offset.x, offset.y);
    device.uniform_1_i32(program.multiply_alpha, i32::from(unpack.multiply_alpha()));
    device.uniform_1_i32(program.unmultiply_alpha, i32::from(unpack.divide_alpha()));
}

fn draw_fullscreen<D: GlDevice + ?Sized>(device: &mut D, resources: &ScratchResources) {
    device.bind_vertex_array(Some(resources.vertex_array));
    device.draw_triangles(0, 3);
}

/// Attaches one image of `level` to the color attachment of the bound framebuffer. Layered
/// textures attach `layer`.
fn attach_color<D: GlDevice + ?Sized>(device: &mut D, level: TextureLevel, layer: u32) {
    if level.texture_type().is_layered() {
        device.framebuffer_texture_layer(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            Some(level.texture),
            level.level,
            layer,
        );
    } else {
        device.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            level.target,
            Some(level.texture),
            level.level,
        );
    }
}

fn detach<D: GlDevice + ?Sized>(device: &mut D, attachments: &[Attachment]) {
    for &attachment in attachments {
        device.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            attachment,
            TextureTarget::Texture2D,
            None,
            0,
        );
    }
}

fn copy_into_level<D: GlDevice + ?Sized>(
    device: &mut D,
    dest: TextureLevel,
    dest_offset: Offset,
    area: Rect,
) {
    device.bind_texture(dest.texture_type(), Some(dest.texture));
    if dest.texture_type().is_layered() {
        device.copy_tex_sub_image_3d(dest.target, dest.level, dest_offset, area);
    } else {
        device.copy_tex_sub_image_2d(dest.target, dest.level, dest_offset, area);
    }
}

const COLOR_TARGETS: &[Attachment] = &[Attachment::Color0];
const DEPTH_TARGETS: &[Attachment] = &[Attachment::Depth];
const STENCIL_TARGETS: &[Attachment] = &[Attachment::Stencil];
const DEPTH_STENCIL_TARGETS: &[Attachment] = &[Attachment::Depth, Attachment::Stencil];

/// Attachment points and clear mask used to clear an image of `format`.
fn clear_targets(format: InternalFormat) -> (ClearMask, &'static [Attachment]) {
    let info = format.info();
    match (info.depth_bits > 0, info.stencil_bits > 0) {
        (true, true) => (ClearMask::DEPTH | ClearMask::STENCIL, DEPTH_STENCIL_TARGETS),
        (true, false) => (ClearMask::DEPTH, DEPTH_TARGETS),
        (false, true) => (ClearMask::STENCIL, STENCIL_TARGETS),
        (false, false) => (ClearMask::COLOR, COLOR_TARGETS),
    }
}

/// Sets the clear values and write masks that make `mask` reset buffers to their initial
/// contents, and disables scissoring.
fn set_clear_state<D: GlDevice + ?Sized>(device: &mut D, mask: ClearMask) {
    if mask.contains(ClearMask::COLOR) {
        device.set_clear_color([0.0; 4]);
        device.set_color_mask([true; 4]);
    }
    if mask.contains(ClearMask::DEPTH) {
        device.set_depth_mask(true);
        device.set_clear_depth(1.0);
    }
    if mask.contains(ClearMask::STENCIL) {
        device.set_clear_stencil(0);
    }
    device.set_capability(Capability::ScissorTest, false);
}

/// Emulates copies and clears the device can't perform natively.
///
/// Scratch resources and programs are created on first use and released by
/// [`BlitEngine::release_resources`] or on drop.
pub struct BlitEngine<D: GlDevice> {
    device: D,
    config: BlitConfig,
    pool: ScratchPool,
    programs: ProgramCache,
}

impl<D: GlDevice> BlitEngine<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, BlitConfig::default())
    }

    pub fn with_config(device: D, config: BlitConfig) -> Self {
        Self {
            device,
            config,
            pool: ScratchPool::new(),
            programs: ProgramCache::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &BlitConfig {
        &self.config
    }

    pub fn program_cache(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn scratch_pool(&self) -> &ScratchPool {
        &self.pool
    }

    /// Deletes every program and scratch object. Safe to call repeatedly; later operations
    /// recreate what they need.
    pub fn release_resources(&mut self) {
        self.programs.release(&mut self.device);
        self.pool.release(&mut self.device);
    }

    /// (Re)specifies `dest` at the size of `source_area` and fills it from `source` through the
    /// luminance/alpha emulation layout. `dest` must be a 2D or cube map face level.
    pub fn copy_image_to_luma_workaround_texture(
        &mut self,
        dest: TextureLevel,
        luma: LumaFormat,
        source_area: Rect,
        internal_format: InternalFormat,
        source: &dyn ReadFramebuffer,
    ) -> Result<(), BlitError> {
        let read_type = source.implementation_color_read_type()?;
        let device = &mut self.device;
        device.bind_texture(dest.texture_type(), Some(dest.texture));
        device.bind_buffer(BufferTarget::PixelUnpack, None);
        device.tex_image_2d(
            dest.target,
            dest.level,
            internal_format,
            source_area.width,
            source_area.height,
            internal_format.info().format,
            read_type,
            None,
        );
        self.copy_sub_image_to_luma_workaround_texture(
            dest,
            luma,
            Offset::default(),
            source_area,
            source,
        )
    }

    /// Copies `source_area` of `source` into `dest` at `dest_offset`, storing the luminance and
    /// alpha channels the way emulated luma textures keep them.
    pub fn copy_sub_image_to_luma_workaround_texture(
        &mut self,
        dest: TextureLevel,
        luma: LumaFormat,
        dest_offset: Offset,
        source_area: Rect,
        source: &dyn ReadFramebuffer,
    ) -> Result<(), BlitError> {
        let resources = self.pool.ensure_ready(&mut self.device)?;
        let program = self
            .programs
            .get_or_create(&mut self.device, BlitVariant::FloatToFloat)?;
        let copy_format = copy_tex_image_format(
            source.implementation_color_read_format()?,
            source.implementation_color_read_type()?,
        )?;
        let copy_info = copy_format.info();
        let [color_copy, luma_target] = resources.textures;
        let size = Rect::new(0, 0, source_area.width, source_area.height);

        let device = &mut self.device;
        self.pool
            .set_texture_parameter(device, TextureParameter::MinFilter(Filter::Nearest));
        self.pool
            .set_texture_parameter(device, TextureParameter::MagFilter(Filter::Nearest));

        // Snapshot the source region, then swizzle it into luma storage order.
        device.bind_framebuffer(FramebufferTarget::Read, Some(source.id()));
        device.active_texture(0);
        device.bind_texture(TextureType::Texture2D, Some(color_copy));
        device.copy_tex_image_2d(TextureTarget::Texture2D, 0, copy_format, source_area);
        device.tex_parameter(
            TextureType::Texture2D,
            TextureParameter::Swizzle(luma.storage_swizzle()),
        );

        device.bind_texture(TextureType::Texture2D, Some(luma_target));
        device.bind_buffer(BufferTarget::PixelUnpack, None);
        device.tex_image_2d(
            TextureTarget::Texture2D,
            0,
            copy_format,
            size.width,
            size.height,
            copy_info.format,
            copy_info.ty,
            None,
        );

        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));
        device.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            TextureTarget::Texture2D,
            Some(luma_target),
            0,
        );

        {
            let mut state = ScopedState::new(&mut *device, size, KeepState::empty());
            state.prepare_texture_unit(0);
            state.active_texture(0);
            state.bind_texture(TextureType::Texture2D, Some(color_copy));
            set_blit_uniforms(
                &mut *state,
                &program,
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 1.0),
                UnpackOptions::default(),
            );
            draw_fullscreen(&mut *state, &resources);
        }

        // The scratch framebuffer is bound for reading; copy the swizzled result out.
        copy_into_level(device, dest, dest_offset, size);
        detach(device, COLOR_TARGETS);

        if self.config.orphan_scratch_textures {
            self.pool.orphan_textures(device);
        }
        Ok(())
    }

    /// Draws `source_area` of the source framebuffer's read attachment into `dest_area` of
    /// `dest`. Either rectangle may be reversed to mirror the copy. A source area entirely
    /// outside the read attachment is a no-op.
    pub fn blit_color_buffer_with_shader(
        &mut self,
        source: &dyn ReadFramebuffer,
        dest: FramebufferId,
        source_area: Rect,
        dest_area: Rect,
        filter: Filter,
    ) -> Result<(), BlitError> {
        let attachment = source
            .read_attachment()
            .ok_or(BlitError::MissingReadAttachment)?;
        if attachment.samples > 1 {
            return Err(BlitError::MultisampledSource {
                samples: attachment.samples,
            });
        }

        let reverse_x = source_area.is_reversed_x() != dest_area.is_reversed_x();
        let reverse_y = source_area.is_reversed_y() != dest_area.is_reversed_y();
        let source_area = source_area.remove_reversal();
        let dest_area = dest_area.remove_reversal();

        let Some(in_bounds) = source_area.clip(&attachment.size.bounds()) else {
            tracing::trace!(?source_area, "blit source is outside the read attachment");
            return Ok(());
        };

        let resources = self.pool.ensure_ready(&mut self.device)?;
        let program = self
            .programs
            .get_or_create(&mut self.device, BlitVariant::FloatToFloat)?;
        let color_copy = resources.textures[0];

        let device = &mut self.device;
        device.bind_framebuffer(FramebufferTarget::Read, Some(source.id()));
        device.active_texture(0);
        device.bind_texture(TextureType::Texture2D, Some(color_copy));
        device.copy_tex_image_2d(TextureTarget::Texture2D, 0, attachment.format, in_bounds);

        // The copy starts at the clipped origin; sample relative to it so the parts of the
        // source area outside the attachment fall outside [0, 1] and are discarded.
        let area = Rect::new(
            source_area.x - in_bounds.x,
            source_area.y - in_bounds.y,
            source_area.width,
            source_area.height,
        );
        let (offset, scale) = sample_transform(
            area,
            (in_bounds.width, in_bounds.height),
            reverse_x,
            reverse_y,
        );

        for param in [
            TextureParameter::MinFilter(filter),
            TextureParameter::MagFilter(filter),
            TextureParameter::WrapS(Wrap::ClampToEdge),
            TextureParameter::WrapT(Wrap::ClampToEdge),
            TextureParameter::Swizzle(IDENTITY_SWIZZLE),
        ] {
            self.pool.set_texture_parameter(device, param);
        }

        device.bind_framebuffer(FramebufferTarget::Draw, Some(dest));
        let mut state = ScopedState::new(device, dest_area, KeepState::SCISSOR);
        state.prepare_texture_unit(0);
        state.active_texture(0);
        state.bind_texture(TextureType::Texture2D, Some(color_copy));
        set_blit_uniforms(&mut *state, &program, offset, scale, UnpackOptions::default());
        draw_fullscreen(&mut *state, &resources);
        Ok(())
    }

    /// Draws `source_area` of the source level into `dest` at `dest_offset`, converting between
    /// component types and applying the copy's unpack flags.
    ///
    /// Returns [`BlitOutcome::Inapplicable`] when the destination level isn't renderable.
    ///
    /// On [`BlitOutcome::Done`] the source texture keeps the sampling parameters the draw set;
    /// see [`CopySubTextureDesc`].
    pub fn copy_sub_texture(
        &mut self,
        desc: &CopySubTextureDesc,
    ) -> Result<BlitOutcome, BlitError> {
        debug_assert_eq!(desc.source.texture_type(), TextureType::Texture2D);
        let variant = BlitVariant::select(desc.source_component_type, desc.dest_component_type)?;
        let resources = self.pool.ensure_ready(&mut self.device)?;
        let program = self.programs.get_or_create(&mut self.device, variant)?;

        let device = &mut self.device;
        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));
        attach_color(device, desc.dest, desc.dest_offset.z.max(0) as u32);
        if !device
            .check_framebuffer_status(FramebufferTarget::Framebuffer)
            .is_complete()
        {
            detach(device, COLOR_TARGETS);
            tracing::trace!(dest = ?desc.dest, "copy destination is not renderable");
            return Ok(BlitOutcome::Inapplicable);
        }

        let source_type = desc.source.texture_type();
        device.active_texture(0);
        device.bind_texture(source_type, Some(desc.source.texture));
        if let Some(luma) = desc.luma {
            device.tex_parameter(source_type, TextureParameter::Swizzle(luma.sampling_swizzle()));
        }
        device.tex_parameter(source_type, TextureParameter::MinFilter(Filter::Nearest));
        device.tex_parameter(source_type, TextureParameter::MagFilter(Filter::Nearest));
        device.tex_parameter(source_type, TextureParameter::BaseLevel(desc.source.level));

        let (offset, scale) = sample_transform(
            desc.source_area,
            (desc.source_size.width, desc.source_size.height),
            false,
            desc.unpack.flip_y,
        );
        let viewport = Rect::new(
            desc.dest_offset.x,
            desc.dest_offset.y,
            desc.source_area.width,
            desc.source_area.height,
        );

        {
            let mut state = ScopedState::new(&mut *device, viewport, KeepState::empty());
            state.prepare_texture_unit(0);
            state.active_texture(0);
            state.bind_texture(source_type, Some(desc.source.texture));
            set_blit_uniforms(&mut *state, &program, offset, scale, desc.unpack);
            draw_fullscreen(&mut *state, &resources);
        }

        detach(device, COLOR_TARGETS);
        Ok(BlitOutcome::Done)
    }

    /// Copies `source_area` of the source level into `dest` by reading it back and converting on
    /// the CPU. `scratch` provides the staging memory.
    ///
    /// Returns [`BlitOutcome::Inapplicable`] when the source level can't be attached for reading.
    pub fn copy_sub_texture_cpu_readback<S: ScratchMemory + ?Sized>(
        &mut self,
        desc: &CpuReadbackCopyDesc,
        scratch: &mut S,
    ) -> Result<BlitOutcome, BlitError> {
        let unsupported = BlitError::UnsupportedFormat {
            format: desc.dest_format,
            ty: desc.dest_type,
        };
        let Some(dest_format) = InternalFormat::from_format_type(desc.dest_format, desc.dest_type)
        else {
            return Err(unsupported);
        };
        let Some(write) = pixels::color_write_fn(dest_format) else {
            return Err(unsupported);
        };
        if desc.source_component_type == ComponentType::Int {
            return Err(BlitError::UnsupportedComponentType(ComponentType::Int));
        }

        let resources = self.pool.ensure_ready(&mut self.device)?;
        let device = &mut self.device;
        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));
        attach_color(device, desc.source, 0);
        if !device
            .check_framebuffer_status(FramebufferTarget::Framebuffer)
            .is_complete()
        {
            detach(device, COLOR_TARGETS);
            tracing::trace!(source = ?desc.source, "readback source is not attachable");
            return Ok(BlitOutcome::Inapplicable);
        }

        let result = Self::readback_and_upload(device, desc, dest_format, write, scratch);
        detach(device, COLOR_TARGETS);
        result.map(|()| BlitOutcome::Done)
    }

    fn readback_and_upload<S: ScratchMemory + ?Sized>(
        device: &mut D,
        desc: &CpuReadbackCopyDesc,
        dest_format: InternalFormat,
        write: pixels::WriteColorFn,
        scratch: &mut S,
    ) -> Result<(), BlitError> {
        let area = desc.source_area;
        if area.is_empty() {
            return Ok(());
        }
        let (width, height) = (area.width as usize, area.height as usize);
        let dest_pixel_bytes = dest_format.info().pixel_bytes;
        let lengths = width.checked_mul(height).and_then(|count| {
            let source_len = count.checked_mul(pixels::READBACK_PIXEL_BYTES)?;
            let dest_len = count.checked_mul(dest_pixel_bytes)?;
            Some((source_len, dest_len, source_len.checked_add(dest_len)?))
        });
        let Some((source_len, dest_len, total)) = lengths else {
            return Err(BlitError::ScratchAllocation {
                requested: usize::MAX,
            });
        };
        let buffer = scratch.scratch(total)?;
        let (source_bytes, dest_bytes) = buffer.split_at_mut(source_len);
        let dest_bytes = &mut dest_bytes[..dest_len];

        let (read_format, read_type) = pixels::readback_format(desc.source_component_type);
        device.bind_buffer(BufferTarget::PixelPack, None);
        device.set_pixel_pack_alignment(1);
        device.read_pixels(area, read_format, read_type, source_bytes);

        pixels::copy_image(
            &SourceImage {
                data: &*source_bytes,
                row_pitch: width * pixels::READBACK_PIXEL_BYTES,
                pixel_bytes: pixels::READBACK_PIXEL_BYTES,
                read: pixels::read_rgba8,
            },
            &mut DestImage {
                data: &mut *dest_bytes,
                row_pitch: width * dest_pixel_bytes,
                pixel_bytes: dest_pixel_bytes,
                format: desc.dest_format,
                write,
            },
            width,
            height,
            desc.unpack,
        );

        device.bind_texture(desc.dest.texture_type(), Some(desc.dest.texture));
        device.bind_buffer(BufferTarget::PixelUnpack, None);
        device.set_pixel_unpack_alignment(1);
        device.tex_sub_image_2d(
            desc.dest.target,
            desc.dest.level,
            Rect::new(desc.dest_offset.x, desc.dest_offset.y, area.width, area.height),
            desc.dest_format,
            desc.dest_type,
            dest_bytes,
        );
        Ok(())
    }

    /// Copies `source_area` of the source level into `dest` with the native framebuffer copy.
    pub fn copy_tex_sub_image(
        &mut self,
        source: TextureLevel,
        dest: TextureLevel,
        source_area: Rect,
        dest_offset: Offset,
    ) -> Result<BlitOutcome, BlitError> {
        let resources = self.pool.ensure_ready(&mut self.device)?;
        let device = &mut self.device;
        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));
        attach_color(device, source, 0);
        if !device
            .check_framebuffer_status(FramebufferTarget::Framebuffer)
            .is_complete()
        {
            detach(device, COLOR_TARGETS);
            tracing::trace!(?source, "copy source is not attachable");
            return Ok(BlitOutcome::Inapplicable);
        }

        copy_into_level(device, dest, dest_offset, source_area);
        detach(device, COLOR_TARGETS);
        Ok(BlitOutcome::Done)
    }

    /// Clears one image (or a set of layers) of `texture` to its initial contents: zero color,
    /// depth 1, stencil 0.
    ///
    /// For 3D and array textures `index.layers` selects the layers to clear; without a range
    /// every one of `layer_count` layers is cleared. Returns [`BlitOutcome::Inapplicable`] as
    /// soon as an image can't be attached; layers cleared before that stay cleared.
    pub fn clear_renderable_texture(
        &mut self,
        texture: TextureHandle,
        format: InternalFormat,
        layer_count: u32,
        index: &ImageIndex,
    ) -> Result<BlitOutcome, BlitError> {
        let resources = self.pool.ensure_ready(&mut self.device)?;
        let (mask, targets) = clear_targets(format);
        let device = &mut self.device;
        set_clear_state(device, mask);
        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));

        let outcome = if !texture.ty.is_layered() {
            for &attachment in targets {
                device.framebuffer_texture_2d(
                    FramebufferTarget::Framebuffer,
                    attachment,
                    index.target,
                    Some(texture.id),
                    index.level,
                );
            }
            clear_if_complete(device, mask)
        } else if device.supports_layered_attachment() && !index.has_layer() {
            for &attachment in targets {
                device.framebuffer_texture(
                    FramebufferTarget::Framebuffer,
                    attachment,
                    Some(texture.id),
                    index.level,
                );
            }
            clear_if_complete(device, mask)
        } else {
            let layers = index.layers.unwrap_or(LayerRange::new(0, layer_count));
            // A range past the last addressable layer can't be attached at all.
            let (mut outcome, end) = match layers.end() {
                Some(end) => (BlitOutcome::Done, end),
                None => (BlitOutcome::Inapplicable, layers.first),
            };
            for layer in layers.first..end {
                for &attachment in targets {
                    device.framebuffer_texture_layer(
                        FramebufferTarget::Framebuffer,
                        attachment,
                        Some(texture.id),
                        index.level,
                        layer,
                    );
                }
                outcome = clear_if_complete(device, mask);
                if !outcome.is_done() {
                    break;
                }
            }
            outcome
        };

        detach(device, targets);
        if !outcome.is_done() {
            tracing::trace!(texture = texture.id.0, ?index, "texture image is not renderable");
        }
        Ok(outcome)
    }

    /// Clears `renderbuffer` to its initial contents.
    pub fn clear_renderbuffer(
        &mut self,
        renderbuffer: RenderbufferId,
        format: InternalFormat,
    ) -> Result<(), BlitError> {
        let resources = self.pool.ensure_ready(&mut self.device)?;
        let (mask, targets) = clear_targets(format);
        let device = &mut self.device;
        set_clear_state(device, mask);
        device.bind_framebuffer(FramebufferTarget::Framebuffer, Some(resources.framebuffer));
        for &attachment in targets {
            device.framebuffer_renderbuffer(
                FramebufferTarget::Framebuffer,
                attachment,
                Some(renderbuffer),
            );
        }
        device.clear(mask);
        for &attachment in targets {
            device.framebuffer_renderbuffer(FramebufferTarget::Framebuffer, attachment, None);
        }
        Ok(())
    }

    /// Clears every buffer of `framebuffer` to its initial contents.
    pub fn clear_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), BlitError> {
        let mask = ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL;
        set_clear_state(&mut self.device, mask);
        self.device
            .bind_framebuffer(FramebufferTarget::Framebuffer, Some(framebuffer));
        self.device.clear(mask);
        Ok(())
    }
}

fn clear_if_complete<D: GlDevice + ?Sized>(device: &mut D, mask: ClearMask) -> BlitOutcome {
    if device
        .check_framebuffer_status(FramebufferTarget::Framebuffer)
        .is_complete()
    {
        device.clear(mask);
        BlitOutcome::Done
    } else {
        BlitOutcome::Inapplicable
    }
}

impl<D: GlDevice> Drop for BlitEngine<D> {
    fn drop(&mut self) {
        self.release_resources();
    }
}
