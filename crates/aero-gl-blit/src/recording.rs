//! Deterministic in-memory [`GlDevice`].
//!
//! Tracks object lifetimes, bindings, render state and texture storage, and records every clear,
//! draw, copy and pixel transfer so tests can assert on exactly what the engine issued. Draws are
//! recorded but not rasterized; clears, copies and pixel transfers update texture storage.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::device::{
    Attachment, BufferId, BufferTarget, Capability, ClearMask, DeviceError, Filter, FramebufferId,
    FramebufferStatus, FramebufferTarget, GlDevice, GlStandard, ProgramId, RenderbufferId,
    SamplerId, ShaderId, ShaderStage, TextureId, TextureParameter, UniformLocation, VertexArrayId,
    Wrap,
};
use crate::format::{InternalFormat, PixelFormat, PixelType, Swizzle};
use crate::pixels::{self, ColorF};
use crate::types::{Extents, Offset, Rect, TextureTarget, TextureType};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec2(f32, f32),
}

/// What a framebuffer attachment point refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachedImage {
    Texture {
        texture: TextureId,
        target: TextureTarget,
        level: u32,
    },
    Layer {
        texture: TextureId,
        level: u32,
        layer: u32,
    },
    /// Every layer of a level.
    Layered { texture: TextureId, level: u32 },
    Renderbuffer(RenderbufferId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: Option<ProgramId>,
    pub framebuffer: Option<FramebufferId>,
    pub viewport: Rect,
    /// 2D texture bound on unit 0.
    pub source_texture: Option<TextureId>,
    pub uniforms: BTreeMap<String, UniformValue>,
    pub enabled: BTreeSet<Capability>,
    pub queries_paused: bool,
    pub first: i32,
    pub count: i32,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear {
        framebuffer: Option<FramebufferId>,
        mask: ClearMask,
        attachments: Vec<(Attachment, AttachedImage)>,
    },
    Draw(DrawCall),
    TexImage {
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        width: i32,
        height: i32,
    },
    TexSubImage {
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
        area: Rect,
        format: PixelFormat,
        ty: PixelType,
        data: Vec<u8>,
    },
    CopyTexImage {
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        area: Rect,
        read_framebuffer: Option<FramebufferId>,
    },
    CopyTexSubImage2D {
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
        read_framebuffer: Option<FramebufferId>,
    },
    CopyTexSubImage3D {
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
        read_framebuffer: Option<FramebufferId>,
    },
    ReadPixels {
        framebuffer: Option<FramebufferId>,
        area: Rect,
        format: PixelFormat,
        ty: PixelType,
    },
}

/// Storage of one texture image. Layered images keep `size.depth` slices back to back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub format: InternalFormat,
    pub size: Extents,
    pub data: Vec<u8>,
}

impl TextureImage {
    fn new(format: InternalFormat, size: Extents) -> Self {
        let len = format.info().pixel_bytes
            * size.width.max(0) as usize
            * size.height.max(0) as usize
            * size.depth.max(0) as usize;
        Self {
            format,
            size,
            data: vec![0; len],
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset_of(&self, x: i32, y: i32, layer: i32) -> Option<usize> {
        if x < 0
            || y < 0
            || layer < 0
            || x >= self.size.width
            || y >= self.size.height
            || layer >= self.size.depth
        {
            return None;
        }
        let index = (layer as usize * self.size.height as usize + y as usize)
            * self.size.width as usize
            + x as usize;
        Some(index * self.format.info().pixel_bytes)
    }
}

#[derive(Debug)]
struct TextureObject {
    images: HashMap<(TextureTarget, u32), TextureImage>,
    swizzle: [Swizzle; 4],
    min_filter: Option<Filter>,
    mag_filter: Option<Filter>,
    wrap_s: Option<Wrap>,
    wrap_t: Option<Wrap>,
    base_level: u32,
}

impl Default for TextureObject {
    fn default() -> Self {
        Self {
            images: HashMap::new(),
            swizzle: [Swizzle::Red, Swizzle::Green, Swizzle::Blue, Swizzle::Alpha],
            min_filter: None,
            mag_filter: None,
            wrap_s: None,
            wrap_t: None,
            base_level: 0,
        }
    }
}

impl TextureObject {
    /// Key of the image an attachment addresses, plus the layer within it.
    fn image_key(&self, attached: AttachedImage) -> Option<((TextureTarget, u32), i32)> {
        match attached {
            AttachedImage::Texture { target, level, .. } => Some(((target, level), 0)),
            AttachedImage::Layer { level, layer, .. } => {
                self.layered_key(level).map(|key| (key, layer as i32))
            }
            AttachedImage::Layered { level, .. } => self.layered_key(level).map(|key| (key, 0)),
            AttachedImage::Renderbuffer(_) => None,
        }
    }

    fn layered_key(&self, level: u32) -> Option<(TextureTarget, u32)> {
        self.images
            .keys()
            .find(|(target, l)| *l == level && target.texture_type().is_layered())
            .copied()
    }
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    sources: Vec<String>,
    linked: bool,
    uniform_names: Vec<String>,
    uniforms: BTreeMap<String, UniformValue>,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    enabled: BTreeSet<u32>,
    buffer: Option<BufferId>,
}

fn attachment_texture(attached: AttachedImage) -> Option<TextureId> {
    match attached {
        AttachedImage::Texture { texture, .. }
        | AttachedImage::Layer { texture, .. }
        | AttachedImage::Layered { texture, .. } => Some(texture),
        AttachedImage::Renderbuffer(_) => None,
    }
}

fn uniform_names(source: &str) -> impl Iterator<Item = String> + '_ {
    source.lines().filter_map(|line| {
        let decl = line.trim().strip_prefix("uniform ")?;
        let name = decl.trim_end_matches(';').split_whitespace().last()?;
        Some(name.to_owned())
    })
}

/// Deterministic [`GlDevice`] backed by host memory.
#[derive(Debug)]
pub struct RecordingDevice {
    standard: GlStandard,
    max_vertex_attribs: u32,
    sampler_objects: bool,
    layered_attachment: bool,

    next_id: u32,
    allocation_budget: Option<u32>,
    fail_compile: Option<ShaderStage>,
    fail_link: bool,
    fail_query_pause: bool,
    fail_query_resume: bool,

    textures: BTreeMap<TextureId, TextureObject>,
    framebuffers: BTreeMap<FramebufferId, BTreeMap<Attachment, AttachedImage>>,
    renderbuffers: BTreeMap<RenderbufferId, (InternalFormat, Extents)>,
    buffers: BTreeMap<BufferId, Vec<u8>>,
    vertex_arrays: BTreeMap<VertexArrayId, VertexArrayObject>,
    shaders: BTreeMap<ShaderId, ShaderObject>,
    programs: BTreeMap<ProgramId, ProgramObject>,
    unrenderable: HashSet<(TextureId, TextureTarget)>,
    unrenderable_layers: HashSet<(TextureId, u32)>,

    active_unit: u32,
    bound_textures: HashMap<(u32, TextureType), TextureId>,
    read_framebuffer: Option<FramebufferId>,
    draw_framebuffer: Option<FramebufferId>,
    bound_buffers: HashMap<BufferTarget, BufferId>,
    vertex_array: Option<VertexArrayId>,
    program: Option<ProgramId>,

    enabled: BTreeSet<Capability>,
    viewport: Rect,
    depth_range: (f32, f32),
    color_mask: [bool; 4],
    depth_mask: bool,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: i32,
    pack_alignment: u32,
    unpack_alignment: u32,

    transform_feedback_paused: bool,
    queries_paused: bool,
    query_pause_count: u32,
    query_resume_count: u32,
    sampler_unbinds: u32,
    programs_linked: u32,

    commands: Vec<Command>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            standard: GlStandard::Es,
            max_vertex_attribs: 16,
            sampler_objects: true,
            layered_attachment: true,
            next_id: 0,
            allocation_budget: None,
            fail_compile: None,
            fail_link: false,
            fail_query_pause: false,
            fail_query_resume: false,
            textures: BTreeMap::new(),
            framebuffers: BTreeMap::new(),
            renderbuffers: BTreeMap::new(),
            buffers: BTreeMap::new(),
            vertex_arrays: BTreeMap::new(),
            shaders: BTreeMap::new(),
            programs: BTreeMap::new(),
            unrenderable: HashSet::new(),
            unrenderable_layers: HashSet::new(),
            active_unit: 0,
            bound_textures: HashMap::new(),
            read_framebuffer: None,
            draw_framebuffer: None,
            bound_buffers: HashMap::new(),
            vertex_array: None,
            program: None,
            enabled: BTreeSet::new(),
            viewport: Rect::default(),
            depth_range: (0.0, 1.0),
            color_mask: [true; 4],
            depth_mask: true,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            pack_alignment: 4,
            unpack_alignment: 4,
            transform_feedback_paused: false,
            queries_paused: false,
            query_pause_count: 0,
            query_resume_count: 0,
            sampler_unbinds: 0,
            programs_linked: 0,
            commands: Vec::new(),
        }
    }

    pub fn with_standard(mut self, standard: GlStandard) -> Self {
        self.standard = standard;
        self
    }

    pub fn with_max_vertex_attribs(mut self, count: u32) -> Self {
        self.max_vertex_attribs = count;
        self
    }

    pub fn with_sampler_objects(mut self, supported: bool) -> Self {
        self.sampler_objects = supported;
        self
    }

    pub fn with_layered_attachment(mut self, supported: bool) -> Self {
        self.layered_attachment = supported;
        self
    }

    /// Lets `count` more object allocations succeed, then fails the next one.
    pub fn fail_allocation_after(&mut self, count: u32) {
        self.allocation_budget = Some(count);
    }

    pub fn fail_shader_compile(&mut self, stage: ShaderStage) {
        self.fail_compile = Some(stage);
    }

    pub fn fail_program_link(&mut self) {
        self.fail_link = true;
    }

    pub fn fail_query_pause(&mut self, fail: bool) {
        self.fail_query_pause = fail;
    }

    pub fn fail_query_resume(&mut self, fail: bool) {
        self.fail_query_resume = fail;
    }

    /// Makes attaching `target` of `texture` produce an incomplete framebuffer.
    pub fn mark_unrenderable(&mut self, texture: TextureId, target: TextureTarget) {
        self.unrenderable.insert((texture, target));
    }

    pub fn mark_layer_unrenderable(&mut self, texture: TextureId, layer: u32) {
        self.unrenderable_layers.insert((texture, layer));
    }

    /// Creates a texture with level 0 of `target` allocated and zero-filled. Bindings are not
    /// affected.
    pub fn create_texture_image(
        &mut self,
        target: TextureTarget,
        format: InternalFormat,
        size: Extents,
    ) -> TextureId {
        self.next_id += 1;
        let id = TextureId(self.next_id);
        let mut texture = TextureObject::default();
        texture
            .images
            .insert((target, 0), TextureImage::new(format, size));
        self.textures.insert(id, texture);
        id
    }

    pub fn create_renderbuffer(&mut self, format: InternalFormat, size: Extents) -> RenderbufferId {
        self.next_id += 1;
        let id = RenderbufferId(self.next_id);
        self.renderbuffers.insert(id, (format, size));
        id
    }

    /// Creates a framebuffer with `attached` as its color attachment. Bindings are not affected.
    pub fn create_framebuffer_with_color(&mut self, attached: AttachedImage) -> FramebufferId {
        self.next_id += 1;
        let id = FramebufferId(self.next_id);
        self.framebuffers
            .insert(id, BTreeMap::from([(Attachment::Color0, attached)]));
        id
    }

    pub fn texture_image(
        &self,
        texture: TextureId,
        target: TextureTarget,
        level: u32,
    ) -> Option<&TextureImage> {
        self.textures.get(&texture)?.images.get(&(target, level))
    }

    /// Overwrites the storage of an allocated image.
    pub fn write_texture_image(
        &mut self,
        texture: TextureId,
        target: TextureTarget,
        level: u32,
        data: &[u8],
    ) {
        if let Some(image) = self
            .textures
            .get_mut(&texture)
            .and_then(|t| t.images.get_mut(&(target, level)))
        {
            let len = image.data.len().min(data.len());
            image.data[..len].copy_from_slice(&data[..len]);
        }
    }

    /// Bytes of storage currently held by every image of `texture`.
    pub fn texture_footprint(&self, texture: TextureId) -> usize {
        self.textures
            .get(&texture)
            .map_or(0, |t| t.images.values().map(|image| image.data.len()).sum())
    }

    pub fn texture_swizzle(&self, texture: TextureId) -> Option<[Swizzle; 4]> {
        self.textures.get(&texture).map(|t| t.swizzle)
    }

    pub fn texture_min_filter(&self, texture: TextureId) -> Option<Filter> {
        self.textures.get(&texture)?.min_filter
    }

    pub fn texture_mag_filter(&self, texture: TextureId) -> Option<Filter> {
        self.textures.get(&texture)?.mag_filter
    }

    pub fn texture_wrap(&self, texture: TextureId) -> (Option<Wrap>, Option<Wrap>) {
        self.textures
            .get(&texture)
            .map_or((None, None), |t| (t.wrap_s, t.wrap_t))
    }

    pub fn texture_base_level(&self, texture: TextureId) -> Option<u32> {
        self.textures.get(&texture).map(|t| t.base_level)
    }

    pub fn framebuffer_attachments(
        &self,
        framebuffer: FramebufferId,
    ) -> Option<&BTreeMap<Attachment, AttachedImage>> {
        self.framebuffers.get(&framebuffer)
    }

    pub fn live_object_count(&self) -> usize {
        self.textures.len()
            + self.framebuffers.len()
            + self.renderbuffers.len()
            + self.buffers.len()
            + self.vertex_arrays.len()
            + self.shaders.len()
            + self.programs.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn programs_linked(&self) -> u32 {
        self.programs_linked
    }

    pub fn uniform_i32(&self, program: ProgramId, name: &str) -> Option<i32> {
        match self.programs.get(&program)?.uniforms.get(name)? {
            UniformValue::Int(value) => Some(*value),
            UniformValue::Vec2(..) => None,
        }
    }

    pub fn bound_array_buffer_data(&self) -> Option<&[u8]> {
        let buffer = self.bound_buffers.get(&BufferTarget::Array)?;
        self.buffers.get(buffer).map(Vec::as_slice)
    }

    pub fn enabled_attribs(&self, vertex_array: VertexArrayId) -> Vec<u32> {
        self.vertex_arrays
            .get(&vertex_array)
            .map_or_else(Vec::new, |vao| vao.enabled.iter().copied().collect())
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn depth_range(&self) -> (f32, f32) {
        self.depth_range
    }

    pub fn color_mask(&self) -> [bool; 4] {
        self.color_mask
    }

    pub fn depth_mask(&self) -> bool {
        self.depth_mask
    }

    pub fn clear_values(&self) -> ([f32; 4], f32, i32) {
        (self.clear_color, self.clear_depth, self.clear_stencil)
    }

    pub fn pixel_alignment(&self) -> (u32, u32) {
        (self.pack_alignment, self.unpack_alignment)
    }

    pub fn transform_feedback_paused(&self) -> bool {
        self.transform_feedback_paused
    }

    pub fn queries_paused(&self) -> bool {
        self.queries_paused
    }

    pub fn query_pause_count(&self) -> u32 {
        self.query_pause_count
    }

    pub fn query_resume_count(&self) -> u32 {
        self.query_resume_count
    }

    pub fn sampler_unbinds(&self) -> u32 {
        self.sampler_unbinds
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn clears(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Clear { .. }))
    }

    fn allocate(&mut self, what: &'static str) -> Result<u32, DeviceError> {
        match self.allocation_budget {
            Some(0) => {
                self.allocation_budget = None;
                return Err(DeviceError::OutOfMemory(what));
            }
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        self.next_id += 1;
        Ok(self.next_id)
    }

    fn bound_texture(&self, ty: TextureType) -> Option<TextureId> {
        self.bound_textures.get(&(self.active_unit, ty)).copied()
    }

    fn framebuffer_for(&self, target: FramebufferTarget) -> Option<FramebufferId> {
        match target {
            FramebufferTarget::Read => self.read_framebuffer,
            FramebufferTarget::Framebuffer | FramebufferTarget::Draw => self.draw_framebuffer,
        }
    }

    fn attach(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        image: Option<AttachedImage>,
    ) {
        let Some(framebuffer) = self.framebuffer_for(target) else {
            return;
        };
        let Some(attachments) = self.framebuffers.get_mut(&framebuffer) else {
            return;
        };
        match image {
            Some(image) => {
                attachments.insert(attachment, image);
            }
            None => {
                attachments.remove(&attachment);
            }
        }
    }

    fn attachment_status(&self, attached: AttachedImage) -> FramebufferStatus {
        if let AttachedImage::Renderbuffer(renderbuffer) = attached {
            return if self.renderbuffers.contains_key(&renderbuffer) {
                FramebufferStatus::Complete
            } else {
                FramebufferStatus::IncompleteAttachment
            };
        }
        if matches!(attached, AttachedImage::Layered { .. }) && !self.layered_attachment {
            return FramebufferStatus::Unsupported;
        }
        let Some(texture_id) = attachment_texture(attached) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        let Some(texture) = self.textures.get(&texture_id) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        let Some((key, layer)) = texture.image_key(attached) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        let Some(image) = texture.images.get(&key) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        if image.is_empty() || layer >= image.size.depth {
            return FramebufferStatus::IncompleteAttachment;
        }
        let unrenderable = match attached {
            AttachedImage::Texture { target, .. } => {
                self.unrenderable.contains(&(texture_id, target))
            }
            AttachedImage::Layer { layer, .. } => {
                self.unrenderable_layers.contains(&(texture_id, layer))
            }
            _ => false,
        };
        if unrenderable {
            FramebufferStatus::IncompleteLayerTargets
        } else {
            FramebufferStatus::Complete
        }
    }

    /// Raw bytes of `area` of the read framebuffer's color image. Pixels outside the image read
    /// as zero.
    fn read_region(&self, area: Rect) -> Option<(InternalFormat, Vec<u8>)> {
        let attached = *self
            .framebuffers
            .get(&self.read_framebuffer?)?
            .get(&Attachment::Color0)?;
        let texture = self.textures.get(&attachment_texture(attached)?)?;
        let (key, layer) = texture.image_key(attached)?;
        let image = texture.images.get(&key)?;
        if area.is_empty() {
            return Some((image.format, Vec::new()));
        }
        let pixel_bytes = image.format.info().pixel_bytes;
        let mut out = vec![0; area.width as usize * area.height as usize * pixel_bytes];
        for row in 0..area.height {
            for col in 0..area.width {
                let Some(src) = image.offset_of(area.x + col, area.y + row, layer) else {
                    continue;
                };
                let dst = (row * area.width + col) as usize * pixel_bytes;
                out[dst..dst + pixel_bytes].copy_from_slice(&image.data[src..src + pixel_bytes]);
            }
        }
        Some((image.format, out))
    }

    /// Writes `pixels` into an image at `dest`, skipping pixels outside it.
    fn write_region(
        image: &mut TextureImage,
        dest: Offset,
        width: i32,
        height: i32,
        row_pitch: usize,
        pixels: &[u8],
    ) {
        let pixel_bytes = image.format.info().pixel_bytes;
        for row in 0..height {
            for col in 0..width {
                let Some(dst) = image.offset_of(dest.x + col, dest.y + row, dest.z) else {
                    continue;
                };
                let src = row as usize * row_pitch + col as usize * pixel_bytes;
                let Some(bytes) = pixels.get(src..src + pixel_bytes) else {
                    continue;
                };
                image.data[dst..dst + pixel_bytes].copy_from_slice(bytes);
            }
        }
    }

    fn image_mut(
        &mut self,
        texture: Option<TextureId>,
        target: TextureTarget,
        level: u32,
    ) -> Option<&mut TextureImage> {
        self.textures
            .get_mut(&texture?)?
            .images
            .get_mut(&(target, level))
    }

    fn copy_sub_image(&mut self, target: TextureTarget, level: u32, dest: Offset, area: Rect) {
        let texture = self.bound_texture(target.texture_type());
        let Some((format, data)) = self.read_region(area) else {
            return;
        };
        let Some(image) = self.image_mut(texture, target, level) else {
            return;
        };
        let pixel_bytes = format.info().pixel_bytes;
        if pixel_bytes == image.format.info().pixel_bytes {
            let row_pitch = area.width.max(0) as usize * pixel_bytes;
            Self::write_region(image, dest, area.width, area.height, row_pitch, &data);
        }
    }

    fn fill_color(&mut self, attached: AttachedImage, color: ColorF) {
        let Some(texture) = attachment_texture(attached).and_then(|id| self.textures.get_mut(&id))
        else {
            return;
        };
        let Some((key, layer)) = texture.image_key(attached) else {
            return;
        };
        let Some(image) = texture.images.get_mut(&key) else {
            return;
        };
        let Some(write) = pixels::color_write_fn(image.format) else {
            return;
        };
        let pixel_bytes = image.format.info().pixel_bytes;
        let mut packed = vec![0; pixel_bytes];
        write(color, &mut packed);

        let slice_bytes = image.size.width as usize * image.size.height as usize * pixel_bytes;
        let slices = match attached {
            AttachedImage::Layered { .. } => 0..image.size.depth as usize,
            _ => layer as usize..layer as usize + 1,
        };
        for slice in slices {
            let start = slice * slice_bytes;
            if let Some(bytes) = image.data.get_mut(start..start + slice_bytes) {
                for pixel in bytes.chunks_exact_mut(pixel_bytes) {
                    pixel.copy_from_slice(&packed);
                }
            }
        }
    }
}

impl GlDevice for RecordingDevice {
    fn standard(&self) -> GlStandard {
        self.standard
    }

    fn max_vertex_attribs(&self) -> u32 {
        self.max_vertex_attribs
    }

    fn supports_sampler_objects(&self) -> bool {
        self.sampler_objects
    }

    fn supports_layered_attachment(&self) -> bool {
        self.layered_attachment
    }

    fn create_texture(&mut self) -> Result<TextureId, DeviceError> {
        let id = TextureId(self.allocate("create_texture")?);
        self.textures.insert(id, TextureObject::default());
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, DeviceError> {
        let id = FramebufferId(self.allocate("create_framebuffer")?);
        self.framebuffers.insert(id, BTreeMap::new());
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.read_framebuffer == Some(framebuffer) {
            self.read_framebuffer = None;
        }
        if self.draw_framebuffer == Some(framebuffer) {
            self.draw_framebuffer = None;
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, DeviceError> {
        let id = BufferId(self.allocate("create_buffer")?);
        self.buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.bound_buffers.retain(|_, bound| *bound != buffer);
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DeviceError> {
        let id = VertexArrayId(self.allocate("create_vertex_array")?);
        self.vertex_arrays.insert(id, VertexArrayObject::default());
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
        if self.vertex_array == Some(vertex_array) {
            self.vertex_array = None;
        }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId, DeviceError> {
        let id = ShaderId(self.allocate("create_shader")?);
        self.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
            },
        );
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if let Some(object) = self.shaders.get_mut(&shader) {
            object.source = source.to_owned();
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        let fail_stage = self.fail_compile;
        if let Some(object) = self.shaders.get_mut(&shader) {
            object.compiled =
                fail_stage != Some(object.stage) && object.source.starts_with("#version");
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|object| object.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        match self.shaders.get(&shader) {
            Some(object) if !object.compiled => {
                format!("{:?} shader failed to compile", object.stage)
            }
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> Result<ProgramId, DeviceError> {
        let id = ProgramId(self.allocate("create_program")?);
        self.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        let Some(shader) = self.shaders.get(&shader) else {
            return;
        };
        if !shader.compiled {
            return;
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.sources.push(shader.source.clone());
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        let fail = self.fail_link;
        let Some(object) = self.programs.get_mut(&program) else {
            return;
        };
        object.linked = !fail && object.sources.len() == 2;
        if object.linked {
            let mut names: Vec<String> = Vec::new();
            for name in object.sources.iter().flat_map(|source| uniform_names(source)) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            object.uniform_names = names;
            self.programs_linked += 1;
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|object| object.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        match self.programs.get(&program) {
            Some(object) if !object.linked => "program failed to link".to_owned(),
            _ => String::new(),
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let object = self.programs.get(&program)?;
        let index = object.uniform_names.iter().position(|n| n == name)?;
        Some(UniformLocation(index as i32))
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn uniform_1_i32(&mut self, location: Option<UniformLocation>, value: i32) {
        let (Some(location), Some(program)) = (location, self.program) else {
            return;
        };
        if let Some(object) = self.programs.get_mut(&program) {
            if let Some(name) = object.uniform_names.get(location.0 as usize) {
                object.uniforms.insert(name.clone(), UniformValue::Int(value));
            }
        }
    }

    fn uniform_2_f32(&mut self, location: Option<UniformLocation>, x: f32, y: f32) {
        let (Some(location), Some(program)) = (location, self.program) else {
            return;
        };
        if let Some(object) = self.programs.get_mut(&program) {
            if let Some(name) = object.uniform_names.get(location.0 as usize) {
                object.uniforms.insert(name.clone(), UniformValue::Vec2(x, y));
            }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, ty: TextureType, texture: Option<TextureId>) {
        let key = (self.active_unit, ty);
        match texture {
            Some(texture) => {
                self.bound_textures.insert(key, texture);
            }
            None => {
                self.bound_textures.remove(&key);
            }
        }
    }

    fn bind_sampler(&mut self, _unit: u32, sampler: Option<SamplerId>) {
        if sampler.is_none() {
            self.sampler_unbinds += 1;
        }
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        match target {
            FramebufferTarget::Framebuffer => {
                self.read_framebuffer = framebuffer;
                self.draw_framebuffer = framebuffer;
            }
            FramebufferTarget::Read => self.read_framebuffer = framebuffer,
            FramebufferTarget::Draw => self.draw_framebuffer = framebuffer,
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        match buffer {
            Some(buffer) => {
                self.bound_buffers.insert(target, buffer);
            }
            None => {
                self.bound_buffers.remove(&target);
            }
        }
        if target == BufferTarget::Array {
            if let Some(vao) = self.vertex_array.and_then(|id| self.vertex_arrays.get_mut(&id)) {
                vao.buffer = buffer;
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        if let Some(buffer) = self
            .bound_buffers
            .get(&target)
            .and_then(|id| self.buffers.get_mut(id))
        {
            *buffer = data.to_vec();
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.vertex_array = vertex_array;
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        if let Some(vao) = self.vertex_array.and_then(|id| self.vertex_arrays.get_mut(&id)) {
            vao.enabled.insert(index);
        }
    }

    fn vertex_attrib_pointer_f32(&mut self, _index: u32, _size: i32, _stride: i32, _offset: i32) {}

    fn tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        width: i32,
        height: i32,
        _format: PixelFormat,
        _ty: PixelType,
        pixels: Option<&[u8]>,
    ) {
        let texture = self.bound_texture(target.texture_type());
        self.commands.push(Command::TexImage {
            texture,
            target,
            level,
            internal_format,
            width,
            height,
        });
        let Some(object) = texture.and_then(|id| self.textures.get_mut(&id)) else {
            return;
        };
        let mut image = TextureImage::new(internal_format, Extents::new(width, height, 1));
        if let Some(pixels) = pixels {
            let len = image.data.len().min(pixels.len());
            image.data[..len].copy_from_slice(&pixels[..len]);
        }
        object.images.insert((target, level), image);
    }

    fn tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        area: Rect,
        format: PixelFormat,
        ty: PixelType,
        pixels: &[u8],
    ) {
        let texture = self.bound_texture(target.texture_type());
        self.commands.push(Command::TexSubImage {
            texture,
            target,
            level,
            area,
            format,
            ty,
            data: pixels.to_vec(),
        });
        let alignment = self.unpack_alignment.max(1) as usize;
        let Some(image) = self.image_mut(texture, target, level) else {
            return;
        };
        let row_bytes = area.width.max(0) as usize * image.format.info().pixel_bytes;
        let row_pitch = row_bytes.div_ceil(alignment) * alignment;
        Self::write_region(
            image,
            Offset::new(area.x, area.y, 0),
            area.width,
            area.height,
            row_pitch,
            pixels,
        );
    }

    fn copy_tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        area: Rect,
    ) {
        let texture = self.bound_texture(target.texture_type());
        self.commands.push(Command::CopyTexImage {
            texture,
            target,
            level,
            internal_format,
            area,
            read_framebuffer: self.read_framebuffer,
        });
        let region = self.read_region(area);
        let Some(object) = texture.and_then(|id| self.textures.get_mut(&id)) else {
            return;
        };
        let mut image =
            TextureImage::new(internal_format, Extents::new(area.width, area.height, 1));
        if let Some((format, data)) = region {
            if format.info().pixel_bytes == internal_format.info().pixel_bytes {
                image.data = data;
            }
        }
        object.images.insert((target, level), image);
    }

    fn copy_tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
    ) {
        self.commands.push(Command::CopyTexSubImage2D {
            texture: self.bound_texture(target.texture_type()),
            target,
            level,
            dest,
            area,
            read_framebuffer: self.read_framebuffer,
        });
        self.copy_sub_image(target, level, Offset::new(dest.x, dest.y, 0), area);
    }

    fn copy_tex_sub_image_3d(
        &mut self,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
    ) {
        self.commands.push(Command::CopyTexSubImage3D {
            texture: self.bound_texture(target.texture_type()),
            target,
            level,
            dest,
            area,
            read_framebuffer: self.read_framebuffer,
        });
        self.copy_sub_image(target, level, dest, area);
    }

    fn tex_parameter(&mut self, ty: TextureType, param: TextureParameter) {
        let Some(object) = self
            .bound_texture(ty)
            .and_then(|id| self.textures.get_mut(&id))
        else {
            return;
        };
        match param {
            TextureParameter::MinFilter(filter) => object.min_filter = Some(filter),
            TextureParameter::MagFilter(filter) => object.mag_filter = Some(filter),
            TextureParameter::WrapS(wrap) => object.wrap_s = Some(wrap),
            TextureParameter::WrapT(wrap) => object.wrap_t = Some(wrap),
            TextureParameter::Swizzle(swizzle) => object.swizzle = swizzle,
            TextureParameter::BaseLevel(level) => object.base_level = level,
        }
    }

    fn set_pixel_pack_alignment(&mut self, alignment: u32) {
        self.pack_alignment = alignment;
    }

    fn set_pixel_unpack_alignment(&mut self, alignment: u32) {
        self.unpack_alignment = alignment;
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture_target: TextureTarget,
        texture: Option<TextureId>,
        level: u32,
    ) {
        let image = texture.map(|texture| AttachedImage::Texture {
            texture,
            target: texture_target,
            level,
        });
        self.attach(target, attachment, image);
    }

    fn framebuffer_texture(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
        level: u32,
    ) {
        let image = texture.map(|texture| AttachedImage::Layered { texture, level });
        self.attach(target, attachment, image);
    }

    fn framebuffer_texture_layer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
        level: u32,
        layer: u32,
    ) {
        let image = texture.map(|texture| AttachedImage::Layer {
            texture,
            level,
            layer,
        });
        self.attach(target, attachment, image);
    }

    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferId>,
    ) {
        self.attach(target, attachment, renderbuffer.map(AttachedImage::Renderbuffer));
    }

    fn check_framebuffer_status(&mut self, target: FramebufferTarget) -> FramebufferStatus {
        let Some(framebuffer) = self.framebuffer_for(target) else {
            return FramebufferStatus::Complete;
        };
        let Some(attachments) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        if attachments.is_empty() {
            return FramebufferStatus::IncompleteMissingAttachment;
        }
        attachments
            .values()
            .map(|attached| self.attachment_status(*attached))
            .find(|status| !status.is_complete())
            .unwrap_or(FramebufferStatus::Complete)
    }

    fn clear(&mut self, mask: ClearMask) {
        let framebuffer = self.draw_framebuffer;
        let attachments: Vec<(Attachment, AttachedImage)> = framebuffer
            .and_then(|id| self.framebuffers.get(&id))
            .map(|attachments| {
                attachments
                    .iter()
                    .filter(|(attachment, _)| match attachment {
                        Attachment::Color0 => mask.contains(ClearMask::COLOR),
                        Attachment::Depth => mask.contains(ClearMask::DEPTH),
                        Attachment::Stencil => mask.contains(ClearMask::STENCIL),
                    })
                    .map(|(attachment, image)| (*attachment, *image))
                    .collect()
            })
            .unwrap_or_default();

        let [r, g, b, a] = self.clear_color;
        for (attachment, image) in &attachments {
            if *attachment == Attachment::Color0 {
                self.fill_color(*image, ColorF::new(r, g, b, a));
            }
        }
        self.commands.push(Command::Clear {
            framebuffer,
            mask,
            attachments,
        });
    }

    fn draw_triangles(&mut self, first: i32, count: i32) {
        let uniforms = self
            .program
            .and_then(|id| self.programs.get(&id))
            .map(|object| object.uniforms.clone())
            .unwrap_or_default();
        self.commands.push(Command::Draw(DrawCall {
            program: self.program,
            framebuffer: self.draw_framebuffer,
            viewport: self.viewport,
            source_texture: self.bound_textures.get(&(0, TextureType::Texture2D)).copied(),
            uniforms,
            enabled: self.enabled.clone(),
            queries_paused: self.queries_paused,
            first,
            count,
        }));
    }

    fn read_pixels(&mut self, area: Rect, format: PixelFormat, ty: PixelType, out: &mut [u8]) {
        self.commands.push(Command::ReadPixels {
            framebuffer: self.read_framebuffer,
            area,
            format,
            ty,
        });
        out.fill(0);
        let Some((source_format, data)) = self.read_region(area) else {
            return;
        };
        // Only 8-bit RGBA storage is read back; it matches the readback layout byte for byte.
        let readable = matches!(
            (source_format, format),
            (InternalFormat::Rgba8, PixelFormat::Rgba)
                | (InternalFormat::Rgba8UI, PixelFormat::RgbaInteger)
        ) && ty == PixelType::UnsignedByte;
        if !readable || area.is_empty() {
            return;
        }
        let alignment = self.pack_alignment.max(1) as usize;
        let row_bytes = area.width as usize * 4;
        let row_pitch = row_bytes.div_ceil(alignment) * alignment;
        for (row, src) in data.chunks_exact(row_bytes).enumerate() {
            if let Some(dst) = out.get_mut(row * row_pitch..row * row_pitch + row_bytes) {
                dst.copy_from_slice(src);
            }
        }
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(capability);
        } else {
            self.enabled.remove(&capability);
        }
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth_range = (near, far);
    }

    fn set_color_mask(&mut self, mask: [bool; 4]) {
        self.color_mask = mask;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_mask = enabled;
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.clear_depth = depth;
    }

    fn set_clear_stencil(&mut self, stencil: i32) {
        self.clear_stencil = stencil;
    }

    fn pause_transform_feedback(&mut self) {
        self.transform_feedback_paused = true;
    }

    fn pause_all_queries(&mut self) -> Result<(), DeviceError> {
        self.query_pause_count += 1;
        if self.fail_query_pause {
            return Err(DeviceError::InvalidOperation("query pause failed".into()));
        }
        self.queries_paused = true;
        Ok(())
    }

    fn resume_all_queries(&mut self) -> Result<(), DeviceError> {
        self.query_resume_count += 1;
        if self.fail_query_resume {
            return Err(DeviceError::InvalidOperation("query resume failed".into()));
        }
        self.queries_paused = false;
        Ok(())
    }
}
