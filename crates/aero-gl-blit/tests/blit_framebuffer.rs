mod common;

use aero_gl_blit::{
    BlitError, Capability, Command, Extents, Filter, FramebufferDesc, GlDevice, InternalFormat,
    PixelFormat, PixelType, ReadAttachment, Rect, Swizzle, TextureTarget, Wrap,
};
use pretty_assertions::assert_eq;

use common::{color_framebuffer, engine, last_draw, read_framebuffer, texture_2d, vec2};

const SIZE: Extents = Extents::new(4, 4, 1);

#[test]
fn source_outside_read_attachment_is_a_no_op() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba8, SIZE);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    engine
        .blit_color_buffer_with_shader(
            &source,
            dest,
            Rect::new(10, 10, 4, 4),
            Rect::new(0, 0, 4, 4),
            Filter::Nearest,
        )
        .unwrap();

    assert!(engine.device().commands().is_empty());
    assert!(!engine.scratch_pool().is_ready());
}

#[test]
fn reversal_combinations_mirror_the_sampled_range() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba8, SIZE);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    let forward = Rect::from_corners(0, 0, 4, 4);
    let reversed_x = Rect::from_corners(4, 0, 0, 4);
    let reversed_y = Rect::from_corners(0, 4, 4, 0);
    let cases = [
        // (source, dest, offset, scale)
        (forward, forward, (0.0, 0.0), (1.0, 1.0)),
        (reversed_x, forward, (1.0, 0.0), (-1.0, 1.0)),
        (forward, reversed_y, (0.0, 1.0), (1.0, -1.0)),
        (reversed_x, reversed_x, (0.0, 0.0), (1.0, 1.0)),
    ];

    for (source_area, dest_area, offset, scale) in cases {
        engine
            .blit_color_buffer_with_shader(&source, dest, source_area, dest_area, Filter::Nearest)
            .unwrap();
        let draw = last_draw(&engine);
        assert_eq!(vec2(&draw, "u_offset"), offset, "{source_area:?} -> {dest_area:?}");
        assert_eq!(vec2(&draw, "u_scale"), scale, "{source_area:?} -> {dest_area:?}");
        assert_eq!(draw.viewport, Rect::new(0, 0, 4, 4));
        assert_eq!(draw.framebuffer, Some(dest));
    }
}

#[test]
fn partially_clipped_source_samples_relative_to_the_copy() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba8, SIZE);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    engine
        .blit_color_buffer_with_shader(
            &source,
            dest,
            Rect::new(-2, 0, 4, 4),
            Rect::new(0, 0, 4, 4),
            Filter::Linear,
        )
        .unwrap();

    let copy_area = engine.device().commands().iter().find_map(|command| match command {
        Command::CopyTexImage { area, read_framebuffer, .. } => Some((*area, *read_framebuffer)),
        _ => None,
    });
    assert_eq!(copy_area, Some((Rect::new(0, 0, 2, 4), Some(source.id))));

    // Only the right half of the viewport maps into [0, 1].
    let draw = last_draw(&engine);
    assert_eq!(vec2(&draw, "u_offset"), (-1.0, 0.0));
    assert_eq!(vec2(&draw, "u_scale"), (2.0, 1.0));
}

#[test]
fn scratch_copy_keeps_the_read_attachment_format() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba16F, 4, 4);
    // The implementation read format would narrow the copy to 8 bits per channel.
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba16F, SIZE)
        .with_read_format(PixelFormat::Rgba, PixelType::UnsignedByte);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    engine
        .blit_color_buffer_with_shader(
            &source,
            dest,
            Rect::new(0, 0, 4, 4),
            Rect::new(0, 0, 4, 4),
            Filter::Nearest,
        )
        .unwrap();

    let copy_format = engine.device().commands().iter().find_map(|command| match command {
        Command::CopyTexImage { internal_format, .. } => Some(*internal_format),
        _ => None,
    });
    assert_eq!(copy_format, Some(InternalFormat::Rgba16F));
    let scratch = engine.scratch_pool().textures()[0].unwrap();
    let copied = engine
        .device()
        .texture_image(scratch, TextureTarget::Texture2D, 0)
        .map(|image| image.format);
    assert_eq!(copied, Some(InternalFormat::Rgba16F));
}

#[test]
fn scratch_texture_sampling_state_is_reset() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba8, SIZE);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    engine
        .blit_color_buffer_with_shader(
            &source,
            dest,
            Rect::new(0, 0, 4, 4),
            Rect::new(0, 0, 2, 2),
            Filter::Linear,
        )
        .unwrap();

    let identity = [Swizzle::Red, Swizzle::Green, Swizzle::Blue, Swizzle::Alpha];
    for texture in engine.scratch_pool().textures().into_iter().flatten() {
        let device = engine.device();
        assert_eq!(device.texture_min_filter(texture), Some(Filter::Linear));
        assert_eq!(device.texture_mag_filter(texture), Some(Filter::Linear));
        assert_eq!(
            device.texture_wrap(texture),
            (Some(Wrap::ClampToEdge), Some(Wrap::ClampToEdge))
        );
        assert_eq!(device.texture_swizzle(texture), Some(identity));
    }

    let draw = last_draw(&engine);
    assert_eq!(draw.source_texture, engine.scratch_pool().textures()[0]);
    assert_eq!(draw.viewport, Rect::new(0, 0, 2, 2));
}

#[test]
fn draw_runs_under_neutral_state_and_keeps_scissor() {
    let mut engine = engine();
    let source = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let source = read_framebuffer(&mut engine, source, InternalFormat::Rgba8, SIZE);
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);

    let device = engine.device_mut();
    device.set_capability(Capability::ScissorTest, true);
    device.set_capability(Capability::Blend, true);
    device.set_capability(Capability::StencilTest, true);
    device.set_color_mask([true, false, true, false]);

    engine
        .blit_color_buffer_with_shader(
            &source,
            dest,
            Rect::new(0, 0, 4, 4),
            Rect::new(0, 0, 4, 4),
            Filter::Nearest,
        )
        .unwrap();

    let draw = last_draw(&engine);
    assert!(draw.enabled.contains(&Capability::ScissorTest));
    assert!(!draw.enabled.contains(&Capability::Blend));
    assert!(!draw.enabled.contains(&Capability::StencilTest));
    assert!(draw.queries_paused);

    let device = engine.device();
    assert!(!device.queries_paused());
    assert!(device.transform_feedback_paused());
    assert_eq!(device.color_mask(), [true; 4]);
}

#[test]
fn invalid_sources_are_fatal() {
    let mut engine = engine();
    let dest = texture_2d(&mut engine, InternalFormat::Rgba8, 4, 4);
    let dest = color_framebuffer(&mut engine, dest);
    let area = Rect::new(0, 0, 4, 4);

    let empty = FramebufferDesc::empty(dest);
    assert!(matches!(
        engine.blit_color_buffer_with_shader(&empty, dest, area, area, Filter::Nearest),
        Err(BlitError::MissingReadAttachment)
    ));

    let multisampled = FramebufferDesc::new(
        dest,
        ReadAttachment {
            size: SIZE,
            format: InternalFormat::Rgba8,
            samples: 4,
        },
    );
    assert!(matches!(
        engine.blit_color_buffer_with_shader(&multisampled, dest, area, area, Filter::Nearest),
        Err(BlitError::MultisampledSource { samples: 4 })
    ));
    assert!(engine.device().draws().next().is_none());
}
