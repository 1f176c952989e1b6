//! GL blit/copy/clear emulation.
//!
//! Some GL backends can't express a copy or clear natively: the formats don't match, the target
//! format is an emulated luminance/alpha layout, the copy needs alpha premultiplication or a
//! vertical flip, or the attachment configuration isn't supported. [`BlitEngine`] implements those
//! operations on top of a [`GlDevice`] by drawing a single full-viewport triangle with an
//! internally generated shader, or by reading pixels back and converting them on the CPU.
//!
//! This crate contains four layers:
//! 1. **Scratch resources** (`pool`): two scratch textures, a scratch framebuffer and the
//!    full-screen triangle geometry, created lazily and released exactly once.
//! 2. **Program cache** (`shader`): GLSL synthesis per [`BlitVariant`] plus compiled programs.
//! 3. **State guard** (`state`): forces neutral render state around an emulated draw and resumes
//!    paused queries on every exit path.
//! 4. **Orchestrator** (`blit`): the public operations.
//!
//! The engine never decides *whether* emulation is required; callers inspect format/feature
//! capabilities and pick an operation. Operations that may not apply to the current resource
//! state return [`BlitOutcome::Inapplicable`] so the caller can try a different strategy.

#![deny(unsafe_code)]

pub mod blit;
pub mod device;
pub mod error;
pub mod format;
pub mod pixels;
pub mod pool;
pub mod recording;
pub mod resources;
pub mod scratch;
pub mod shader;
pub mod state;
pub mod types;

pub use blit::{BlitConfig, BlitEngine, CopySubTextureDesc, CpuReadbackCopyDesc};
pub use device::{
    Attachment, BufferId, BufferTarget, Capability, ClearMask, DeviceError, Filter, FramebufferId,
    FramebufferStatus, FramebufferTarget, GlDevice, GlStandard, ProgramId, RenderbufferId,
    SamplerId, ShaderId, ShaderStage, TextureId, TextureParameter, UniformLocation,
    VertexArrayId, Wrap,
};
pub use error::{BlitError, BlitOutcome};
pub use format::{
    ComponentType, FormatInfo, InternalFormat, LumaFormat, PixelFormat, PixelType, Swizzle,
};
pub use pixels::{ColorF, UnpackOptions};
pub use pool::{ScratchPool, ScratchResources};
pub use recording::{
    AttachedImage, Command, DrawCall, RecordingDevice, TextureImage, UniformValue,
};
pub use resources::{FramebufferDesc, ReadAttachment, ReadFramebuffer, TextureHandle, TextureLevel};
pub use scratch::{ScratchBuffer, ScratchMemory};
pub use shader::{BlitShaderSource, BlitVariant, CompiledBlitProgram, ProgramCache};
pub use state::{KeepState, ScopedState};
pub use types::{Extents, ImageIndex, LayerRange, Offset, Rect, TextureTarget, TextureType, Vec2};
