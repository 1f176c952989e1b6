//! Shared helpers for `aero-gl-blit` integration tests.
//!
//! Every test drives a [`BlitEngine`] over the in-memory [`RecordingDevice`] and asserts on the
//! commands it recorded or the texture storage it left behind.

#![allow(dead_code)]

use aero_gl_blit::{
    AttachedImage, BlitEngine, DrawCall, Extents, FramebufferDesc, FramebufferId, InternalFormat,
    ReadAttachment, RecordingDevice, TextureLevel, TextureTarget, UniformValue,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn engine() -> BlitEngine<RecordingDevice> {
    engine_with(RecordingDevice::new())
}

pub fn engine_with(device: RecordingDevice) -> BlitEngine<RecordingDevice> {
    init_tracing();
    BlitEngine::new(device)
}

/// Allocates a zero-filled caller texture and returns its level 0.
pub fn texture(
    engine: &mut BlitEngine<RecordingDevice>,
    target: TextureTarget,
    format: InternalFormat,
    size: Extents,
) -> TextureLevel {
    let id = engine
        .device_mut()
        .create_texture_image(target, format, size);
    TextureLevel::new(id, target, 0)
}

pub fn texture_2d(
    engine: &mut BlitEngine<RecordingDevice>,
    format: InternalFormat,
    width: i32,
    height: i32,
) -> TextureLevel {
    texture(
        engine,
        TextureTarget::Texture2D,
        format,
        Extents::new(width, height, 1),
    )
}

/// Overwrites every byte of `level`'s storage with `value`.
pub fn fill(engine: &mut BlitEngine<RecordingDevice>, level: TextureLevel, value: u8) {
    let len = image_data(engine, level).len();
    engine
        .device_mut()
        .write_texture_image(level.texture, level.target, level.level, &vec![value; len]);
}

pub fn image_data(engine: &BlitEngine<RecordingDevice>, level: TextureLevel) -> Vec<u8> {
    engine
        .device()
        .texture_image(level.texture, level.target, level.level)
        .map(|image| image.data.clone())
        .unwrap_or_default()
}

/// Framebuffer whose color attachment is `level`.
pub fn color_framebuffer(
    engine: &mut BlitEngine<RecordingDevice>,
    level: TextureLevel,
) -> FramebufferId {
    engine
        .device_mut()
        .create_framebuffer_with_color(AttachedImage::Texture {
            texture: level.texture,
            target: level.target,
            level: level.level,
        })
}

/// Read framebuffer description for a single-sampled `level` of `format` and `size`.
pub fn read_framebuffer(
    engine: &mut BlitEngine<RecordingDevice>,
    level: TextureLevel,
    format: InternalFormat,
    size: Extents,
) -> FramebufferDesc {
    let id = color_framebuffer(engine, level);
    FramebufferDesc::new(
        id,
        ReadAttachment {
            size,
            format,
            samples: 1,
        },
    )
}

pub fn last_draw(engine: &BlitEngine<RecordingDevice>) -> DrawCall {
    engine
        .device()
        .draws()
        .last()
        .cloned()
        .expect("no draw was recorded")
}

pub fn vec2(draw: &DrawCall, name: &str) -> (f32, f32) {
    match draw.uniform(name) {
        Some(UniformValue::Vec2(x, y)) => (x, y),
        other => panic!("uniform {name} is {other:?}, expected vec2"),
    }
}

pub fn int(draw: &DrawCall, name: &str) -> i32 {
    match draw.uniform(name) {
        Some(UniformValue::Int(value)) => value,
        other => panic!("uniform {name} is {other:?}, expected int"),
    }
}
