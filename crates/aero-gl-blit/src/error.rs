use crate::device::{DeviceError, ShaderStage};
use crate::format::{ComponentType, PixelFormat, PixelType};

/// Fatal failures. These abort the in-progress operation and are never retried.
///
/// Shader sources are generated internally, so compile/link failures indicate a broken invariant
/// (or a broken driver) rather than bad caller input.
#[derive(Debug, thiserror::Error)]
pub enum BlitError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("failed to compile internal blit {stage:?} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("failed to link internal blit program: {log}")]
    ProgramLink { log: String },
    #[error("failed to allocate {requested} bytes of scratch memory")]
    ScratchAllocation { requested: usize },
    #[error("unsupported destination format {format:?}/{ty:?}")]
    UnsupportedFormat { format: PixelFormat, ty: PixelType },
    #[error("unsupported source component type {0:?}")]
    UnsupportedComponentType(ComponentType),
    #[error("source framebuffer has no read color attachment")]
    MissingReadAttachment,
    #[error("cannot sample a multisampled read attachment (samples={samples})")]
    MultisampledSource { samples: u32 },
    #[error("framebuffer query failed: {0}")]
    Framebuffer(String),
}

/// Non-fatal result of an operation that may not apply to the current resource state.
///
/// `Inapplicable` means "this strategy can't be used right now" (e.g. a cube map face that is not
/// renderable until every face is specified). Work done before the check failed is not rolled
/// back.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitOutcome {
    Done,
    Inapplicable,
}

impl BlitOutcome {
    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_transparent() {
        let err = BlitError::from(DeviceError::OutOfMemory("create_texture"));
        assert_eq!(err.to_string(), DeviceError::OutOfMemory("create_texture").to_string());
    }

    #[test]
    fn shader_errors_carry_the_info_log() {
        let err = BlitError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "0:3: 'usampler2D' : syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Fragment"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn outcome_reports_done() {
        assert!(BlitOutcome::Done.is_done());
        assert!(!BlitOutcome::Inapplicable.is_done());
    }
}
