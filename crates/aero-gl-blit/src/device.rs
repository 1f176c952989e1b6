//! GL device abstraction.
//!
//! The blit engine is backend-agnostic: it issues commands through [`GlDevice`], which combines
//! the GL entry points it needs with the state-tracking layer in front of them (redundant binds
//! are the implementation's problem, not the engine's). For tests we provide a deterministic
//! in-memory implementation, [`crate::recording::RecordingDevice`].

use crate::format::{InternalFormat, PixelFormat, PixelType, Swizzle};
use crate::types::{Offset, Rect, TextureTarget, TextureType};

macro_rules! gl_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

gl_handle! {
    TextureId;
    FramebufferId;
    RenderbufferId;
    BufferId;
    VertexArrayId;
    ProgramId;
    ShaderId;
    SamplerId;
}

/// Location of a uniform in a linked program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("out of memory in {0}")]
    OutOfMemory(&'static str),
    #[error("device context lost")]
    ContextLost,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Shading language family; selects the GLSL version of integer-output blit shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlStandard {
    Desktop,
    Es,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Binds both the read and the draw framebuffer.
    Framebuffer,
    Read,
    Draw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    Color0,
    Depth,
    Stencil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    IncompleteMissingAttachment,
    IncompleteLayerTargets,
    Unsupported,
}

impl FramebufferStatus {
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    PixelPack,
    PixelUnpack,
}

/// Server-side toggles the state guard forces off around emulated draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    ScissorTest,
    Blend,
    DepthTest,
    StencilTest,
    SampleCoverage,
    SampleAlphaToCoverage,
    CullFace,
    PolygonOffsetFill,
    RasterizerDiscard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureParameter {
    MinFilter(Filter),
    MagFilter(Filter),
    WrapS(Wrap),
    WrapT(Wrap),
    Swizzle([Swizzle; 4]),
    BaseLevel(u32),
}

bitflags::bitflags! {
    /// Buffers affected by [`GlDevice::clear`]. Bit values match `GL_*_BUFFER_BIT`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        const DEPTH = 0x0000_0100;
        const STENCIL = 0x0000_0400;
        const COLOR = 0x0000_4000;
    }
}

/// Command sink plus the synchronous queries the blit engine relies on.
///
/// Object creation is fallible (allocation failure surfaces as [`DeviceError`]); everything else
/// follows GL semantics where errors are deferred and not observed by the engine.
#[allow(clippy::too_many_arguments)]
pub trait GlDevice {
    fn standard(&self) -> GlStandard;
    fn max_vertex_attribs(&self) -> u32;
    fn supports_sampler_objects(&self) -> bool;
    /// Whether a whole texture level (every layer) can be attached at once.
    fn supports_layered_attachment(&self) -> bool;

    fn create_texture(&mut self) -> Result<TextureId, DeviceError>;
    fn delete_texture(&mut self, texture: TextureId);
    fn create_framebuffer(&mut self) -> Result<FramebufferId, DeviceError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn create_buffer(&mut self) -> Result<BufferId, DeviceError>;
    fn delete_buffer(&mut self, buffer: BufferId);
    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DeviceError>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderId, DeviceError>;
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    fn compile_shader(&mut self, shader: ShaderId);
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);
    fn create_program(&mut self) -> Result<ProgramId, DeviceError>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId);
    fn program_link_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Sets a uniform of the current program. `None` locations are ignored.
    fn uniform_1_i32(&mut self, location: Option<UniformLocation>, value: i32);
    fn uniform_2_f32(&mut self, location: Option<UniformLocation>, x: f32, y: f32);

    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, ty: TextureType, texture: Option<TextureId>);
    fn bind_sampler(&mut self, unit: u32, sampler: Option<SamplerId>);
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferId>);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    /// Uploads static data into the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    /// Points attribute `index` at the bound array buffer as `size` x `f32`.
    fn vertex_attrib_pointer_f32(&mut self, index: u32, size: i32, stride: i32, offset: i32);

    /// (Re)specifies a level of the texture bound for `target`. `pixels == None` leaves the
    /// contents undefined; a `0x0` size releases the backing storage.
    fn tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        width: i32,
        height: i32,
        format: PixelFormat,
        ty: PixelType,
        pixels: Option<&[u8]>,
    );
    fn tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        area: Rect,
        format: PixelFormat,
        ty: PixelType,
        pixels: &[u8],
    );
    /// Specifies the bound texture's level from `area` of the read framebuffer.
    fn copy_tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        internal_format: InternalFormat,
        area: Rect,
    );
    fn copy_tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
    );
    fn copy_tex_sub_image_3d(
        &mut self,
        target: TextureTarget,
        level: u32,
        dest: Offset,
        area: Rect,
    );
    fn tex_parameter(&mut self, ty: TextureType, param: TextureParameter);
    fn set_pixel_pack_alignment(&mut self, alignment: u32);
    fn set_pixel_unpack_alignment(&mut self, alignment: u32);

    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture_target: TextureTarget,
        texture: Option<TextureId>,
        level: u32,
    );
    /// Attaches every layer of `level` (layered attachment).
    fn framebuffer_texture(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
        level: u32,
    );
    fn framebuffer_texture_layer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        texture: Option<TextureId>,
        level: u32,
        layer: u32,
    );
    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<RenderbufferId>,
    );
    fn check_framebuffer_status(&mut self, target: FramebufferTarget) -> FramebufferStatus;

    fn clear(&mut self, mask: ClearMask);
    /// Draws `count` vertices as a triangle list with the bound vertex array.
    fn draw_triangles(&mut self, first: i32, count: i32);
    /// Reads `area` of the read framebuffer's color attachment into `out`.
    fn read_pixels(&mut self, area: Rect, format: PixelFormat, ty: PixelType, out: &mut [u8]);

    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn set_viewport(&mut self, viewport: Rect);
    fn set_depth_range(&mut self, near: f32, far: f32);
    fn set_color_mask(&mut self, mask: [bool; 4]);
    fn set_depth_mask(&mut self, enabled: bool);
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_clear_depth(&mut self, depth: f32);
    fn set_clear_stencil(&mut self, stencil: i32);

    fn pause_transform_feedback(&mut self);
    fn pause_all_queries(&mut self) -> Result<(), DeviceError>;
    fn resume_all_queries(&mut self) -> Result<(), DeviceError>;
}
