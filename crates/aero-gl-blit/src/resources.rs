//! Accessors for caller-owned resources.
//!
//! The engine never owns textures, framebuffers or renderbuffers it is asked to operate on; it only
//! needs their ids plus a handful of properties. Those are described here.

use crate::device::{FramebufferId, TextureId};
use crate::error::BlitError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::types::{Extents, TextureTarget, TextureType};

/// A caller texture together with its type (the bind point it lives on).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureHandle {
    pub id: TextureId,
    pub ty: TextureType,
}

impl TextureHandle {
    pub const fn new(id: TextureId, ty: TextureType) -> Self {
        Self { id, ty }
    }
}

/// One mip level of one image target of a caller texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureLevel {
    pub texture: TextureId,
    pub target: TextureTarget,
    pub level: u32,
}

impl TextureLevel {
    pub const fn new(texture: TextureId, target: TextureTarget, level: u32) -> Self {
        Self {
            texture,
            target,
            level,
        }
    }

    pub fn texture_type(&self) -> TextureType {
        self.target.texture_type()
    }
}

/// The color attachment a framebuffer reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadAttachment {
    pub size: Extents,
    pub format: InternalFormat,
    pub samples: u32,
}

/// Framebuffer used as the source of a copy.
pub trait ReadFramebuffer {
    fn id(&self) -> FramebufferId;
    /// `None` when the read buffer has nothing attached.
    fn read_attachment(&self) -> Option<ReadAttachment>;
    fn implementation_color_read_format(&self) -> Result<PixelFormat, BlitError>;
    fn implementation_color_read_type(&self) -> Result<PixelType, BlitError>;
}

/// Plain [`ReadFramebuffer`] for callers that track framebuffer state themselves.
///
/// The implementation read format/type default to the unsized format and client type of the read
/// attachment's internal format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub id: FramebufferId,
    pub read_attachment: Option<ReadAttachment>,
    pub read_format: Option<(PixelFormat, PixelType)>,
}

impl FramebufferDesc {
    pub fn new(id: FramebufferId, attachment: ReadAttachment) -> Self {
        Self {
            id,
            read_attachment: Some(attachment),
            read_format: None,
        }
    }

    /// A framebuffer with no read attachment.
    pub fn empty(id: FramebufferId) -> Self {
        Self {
            id,
            read_attachment: None,
            read_format: None,
        }
    }

    pub fn with_read_format(mut self, format: PixelFormat, ty: PixelType) -> Self {
        self.read_format = Some((format, ty));
        self
    }

    fn resolve_read_format(&self) -> Result<(PixelFormat, PixelType), BlitError> {
        if let Some(pair) = self.read_format {
            return Ok(pair);
        }
        let attachment = self.read_attachment.ok_or(BlitError::MissingReadAttachment)?;
        let info = attachment.format.info();
        if !info.is_color() {
            return Err(BlitError::Framebuffer(format!(
                "read attachment {:?} is not a color format",
                attachment.format
            )));
        }
        Ok((info.format, info.ty))
    }
}

impl ReadFramebuffer for FramebufferDesc {
    fn id(&self) -> FramebufferId {
        self.id
    }

    fn read_attachment(&self) -> Option<ReadAttachment> {
        self.read_attachment
    }

    fn implementation_color_read_format(&self) -> Result<PixelFormat, BlitError> {
        self.resolve_read_format().map(|(format, _)| format)
    }

    fn implementation_color_read_type(&self) -> Result<PixelType, BlitError> {
        self.resolve_read_format().map(|(_, ty)| ty)
    }
}
