//! RAII guard that puts the device into a neutral state for an emulated draw.

use std::ops::{Deref, DerefMut};

use crate::device::{Capability, GlDevice};
use crate::types::Rect;

bitflags::bitflags! {
    /// Pieces of caller state the guard leaves alone.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeepState: u32 {
        /// Leave scissor test enablement as the caller set it.
        const SCISSOR = 1 << 0;
    }
}

const FORCED_OFF: [Capability; 8] = [
    Capability::Blend,
    Capability::SampleAlphaToCoverage,
    Capability::SampleCoverage,
    Capability::DepthTest,
    Capability::StencilTest,
    Capability::CullFace,
    Capability::PolygonOffsetFill,
    Capability::RasterizerDiscard,
];

/// Forces render state for the lifetime of the guard and resumes paused queries when dropped.
///
/// Only query suspension is undone; everything else the guard touches is left in its forced
/// state. The device is reachable through `Deref`/`DerefMut` while the guard is alive.
pub struct ScopedState<'a, D: GlDevice + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: GlDevice + ?Sized> ScopedState<'a, D> {
    pub fn new(device: &'a mut D, viewport: Rect, keep: KeepState) -> Self {
        if !keep.contains(KeepState::SCISSOR) {
            device.set_capability(Capability::ScissorTest, false);
        }
        device.set_viewport(viewport);
        device.set_depth_range(0.0, 1.0);
        device.set_color_mask([true; 4]);
        for capability in FORCED_OFF {
            device.set_capability(capability, false);
        }
        device.pause_transform_feedback();
        if let Err(err) = device.pause_all_queries() {
            tracing::debug!(%err, "failed to pause active queries for blit");
        }
        Self { device }
    }

    /// Makes `unit` sample with the bound texture's own parameters.
    pub fn prepare_texture_unit(&mut self, unit: u32) {
        if self.device.supports_sampler_objects() {
            self.device.bind_sampler(unit, None);
        }
    }
}

impl<D: GlDevice + ?Sized> Deref for ScopedState<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.device
    }
}

impl<D: GlDevice + ?Sized> DerefMut for ScopedState<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.device
    }
}

impl<D: GlDevice + ?Sized> Drop for ScopedState<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.resume_all_queries() {
            tracing::debug!(%err, "failed to resume queries after blit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingDevice;

    fn dirty_device() -> RecordingDevice {
        let mut device = RecordingDevice::new();
        device.set_capability(Capability::ScissorTest, true);
        device.set_capability(Capability::Blend, true);
        device.set_capability(Capability::DepthTest, true);
        device.set_capability(Capability::RasterizerDiscard, true);
        device.set_color_mask([false, true, false, true]);
        device.set_depth_range(0.25, 0.5);
        device
    }

    #[test]
    fn forces_neutral_state() {
        let mut device = dirty_device();
        let viewport = Rect::new(2, 3, 10, 20);
        {
            let guard = ScopedState::new(&mut device, viewport, KeepState::empty());
            assert!(!guard.is_enabled(Capability::ScissorTest));
            assert!(!guard.is_enabled(Capability::Blend));
            assert!(!guard.is_enabled(Capability::DepthTest));
            assert!(!guard.is_enabled(Capability::RasterizerDiscard));
            assert_eq!(guard.viewport(), viewport);
            assert_eq!(guard.depth_range(), (0.0, 1.0));
            assert_eq!(guard.color_mask(), [true; 4]);
            assert!(guard.transform_feedback_paused());
            assert!(guard.queries_paused());
        }
        assert!(!device.queries_paused());
        // Forced state is not restored.
        assert!(!device.is_enabled(Capability::Blend));
    }

    #[test]
    fn keep_scissor() {
        let mut device = dirty_device();
        let guard = ScopedState::new(&mut device, Rect::new(0, 0, 1, 1), KeepState::SCISSOR);
        assert!(guard.is_enabled(Capability::ScissorTest));
    }

    #[test]
    fn resumes_queries_on_early_return() {
        fn fails(device: &mut RecordingDevice) -> Result<(), &'static str> {
            let _guard = ScopedState::new(device, Rect::new(0, 0, 4, 4), KeepState::empty());
            Err("bail")
        }

        let mut device = RecordingDevice::new();
        assert!(fails(&mut device).is_err());
        assert!(!device.queries_paused());
        assert_eq!(device.query_resume_count(), 1);
    }

    #[test]
    fn query_failures_are_swallowed() {
        let mut device = RecordingDevice::new();
        device.fail_query_pause(true);
        device.fail_query_resume(true);
        {
            let _guard = ScopedState::new(&mut device, Rect::new(0, 0, 4, 4), KeepState::empty());
        }
        assert_eq!(device.query_resume_count(), 1);
    }

    #[test]
    fn sampler_unbound_only_when_supported() {
        let mut device = RecordingDevice::new();
        {
            let viewport = Rect::new(0, 0, 4, 4);
            let mut guard = ScopedState::new(&mut device, viewport, KeepState::empty());
            guard.prepare_texture_unit(0);
        }
        assert_eq!(device.sampler_unbinds(), 1);

        let mut legacy = RecordingDevice::new().with_sampler_objects(false);
        {
            let viewport = Rect::new(0, 0, 4, 4);
            let mut guard = ScopedState::new(&mut legacy, viewport, KeepState::empty());
            guard.prepare_texture_unit(0);
        }
        assert_eq!(legacy.sampler_unbinds(), 0);
    }
}
