//! CPU pixel conversion used by the readback copy path.
//!
//! Pixels are read back as RGBA8 (normalized, or unsigned integer for integer sources), converted
//! to floating point, optionally premultiplied/unmultiplied, clipped to the destination's channel
//! set and packed into the destination format.

use half::f16;

use crate::format::{ComponentType, InternalFormat, PixelFormat, PixelType};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorF {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Pixel-transfer flags of a texture copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnpackOptions {
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub unmultiply_alpha: bool,
}

impl UnpackOptions {
    /// Premultiplying and unmultiplying at once cancels out.
    pub fn multiply_alpha(&self) -> bool {
        self.premultiply_alpha && !self.unmultiply_alpha
    }

    pub fn divide_alpha(&self) -> bool {
        self.unmultiply_alpha && !self.premultiply_alpha
    }
}

pub type ReadColorFn = fn(&[u8]) -> ColorF;
pub type WriteColorFn = fn(ColorF, &mut [u8]);

pub const READBACK_PIXEL_BYTES: usize = 4;

/// Format/type a source with `component_type` is read back in.
pub fn readback_format(component_type: ComponentType) -> (PixelFormat, PixelType) {
    match component_type {
        ComponentType::UnsignedInt | ComponentType::Int => {
            (PixelFormat::RgbaInteger, PixelType::UnsignedByte)
        }
        _ => (PixelFormat::Rgba, PixelType::UnsignedByte),
    }
}

/// Reads one RGBA8 pixel as normalized color. Integer readbacks use the same scale, matching the
/// `UintToUint` shader path.
pub fn read_rgba8(src: &[u8]) -> ColorF {
    ColorF::new(
        f32::from(src[0]) / 255.0,
        f32::from(src[1]) / 255.0,
        f32::from(src[2]) / 255.0,
        f32::from(src[3]) / 255.0,
    )
}

fn unorm(value: f32, bits: u32) -> u32 {
    let max = ((1u32 << bits) - 1) as f32;
    (value.clamp(0.0, 1.0) * max).round() as u32
}

fn unorm8(value: f32) -> u8 {
    unorm(value, 8) as u8
}

fn uint8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

fn write_u16(dst: &mut [u8], value: u16) {
    dst[..2].copy_from_slice(&value.to_ne_bytes());
}

fn write_f16s(dst: &mut [u8], values: &[f32]) {
    for (chunk, value) in dst.chunks_exact_mut(2).zip(values) {
        chunk.copy_from_slice(&f16::from_f32(*value).to_ne_bytes());
    }
}

fn write_f32s(dst: &mut [u8], values: &[f32]) {
    for (chunk, value) in dst.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_ne_bytes());
    }
}

fn write_r8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.r);
}

fn write_rg8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.r);
    dst[1] = unorm8(c.g);
}

fn write_rgb8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.r);
    dst[1] = unorm8(c.g);
    dst[2] = unorm8(c.b);
}

fn write_rgba8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.r);
    dst[1] = unorm8(c.g);
    dst[2] = unorm8(c.b);
    dst[3] = unorm8(c.a);
}

fn write_a8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.a);
}

fn write_l8a8(c: ColorF, dst: &mut [u8]) {
    dst[0] = unorm8(c.r);
    dst[1] = unorm8(c.a);
}

fn write_rgb565(c: ColorF, dst: &mut [u8]) {
    let packed = (unorm(c.r, 5) << 11) | (unorm(c.g, 6) << 5) | unorm(c.b, 5);
    write_u16(dst, packed as u16);
}

fn write_rgba4(c: ColorF, dst: &mut [u8]) {
    let packed =
        (unorm(c.r, 4) << 12) | (unorm(c.g, 4) << 8) | (unorm(c.b, 4) << 4) | unorm(c.a, 4);
    write_u16(dst, packed as u16);
}

fn write_rgb5a1(c: ColorF, dst: &mut [u8]) {
    let packed =
        (unorm(c.r, 5) << 11) | (unorm(c.g, 5) << 6) | (unorm(c.b, 5) << 1) | unorm(c.a, 1);
    write_u16(dst, packed as u16);
}

fn write_rgb10a2(c: ColorF, dst: &mut [u8]) {
    let packed =
        (unorm(c.a, 2) << 30) | (unorm(c.b, 10) << 20) | (unorm(c.g, 10) << 10) | unorm(c.r, 10);
    dst[..4].copy_from_slice(&packed.to_ne_bytes());
}

fn write_r16f(c: ColorF, dst: &mut [u8]) {
    write_f16s(dst, &[c.r]);
}

fn write_rg16f(c: ColorF, dst: &mut [u8]) {
    write_f16s(dst, &[c.r, c.g]);
}

fn write_rgb16f(c: ColorF, dst: &mut [u8]) {
    write_f16s(dst, &[c.r, c.g, c.b]);
}

fn write_rgba16f(c: ColorF, dst: &mut [u8]) {
    write_f16s(dst, &c.to_array());
}

fn write_r32f(c: ColorF, dst: &mut [u8]) {
    write_f32s(dst, &[c.r]);
}

fn write_rg32f(c: ColorF, dst: &mut [u8]) {
    write_f32s(dst, &[c.r, c.g]);
}

fn write_rgb32f(c: ColorF, dst: &mut [u8]) {
    write_f32s(dst, &[c.r, c.g, c.b]);
}

fn write_rgba32f(c: ColorF, dst: &mut [u8]) {
    write_f32s(dst, &c.to_array());
}

fn write_r8ui(c: ColorF, dst: &mut [u8]) {
    dst[0] = uint8(c.r);
}

fn write_rg8ui(c: ColorF, dst: &mut [u8]) {
    dst[0] = uint8(c.r);
    dst[1] = uint8(c.g);
}

fn write_rgb8ui(c: ColorF, dst: &mut [u8]) {
    dst[0] = uint8(c.r);
    dst[1] = uint8(c.g);
    dst[2] = uint8(c.b);
}

fn write_rgba8ui(c: ColorF, dst: &mut [u8]) {
    dst[0] = uint8(c.r);
    dst[1] = uint8(c.g);
    dst[2] = uint8(c.b);
    dst[3] = uint8(c.a);
}

/// Packs a color into `format`. `None` for depth/stencil formats.
pub fn color_write_fn(format: InternalFormat) -> Option<WriteColorFn> {
    use InternalFormat as F;
    let write: WriteColorFn = match format {
        F::R8 => write_r8,
        F::Rg8 => write_rg8,
        F::Rgb8 => write_rgb8,
        F::Rgba8 => write_rgba8,
        F::Alpha8 => write_a8,
        F::Luminance8 => write_r8,
        F::Luminance8Alpha8 => write_l8a8,
        F::Rgb565 => write_rgb565,
        F::Rgba4 => write_rgba4,
        F::Rgb5A1 => write_rgb5a1,
        F::Rgb10A2 => write_rgb10a2,
        F::R16F => write_r16f,
        F::Rg16F => write_rg16f,
        F::Rgb16F => write_rgb16f,
        F::Rgba16F => write_rgba16f,
        F::R32F => write_r32f,
        F::Rg32F => write_rg32f,
        F::Rgb32F => write_rgb32f,
        F::Rgba32F => write_rgba32f,
        F::R8UI => write_r8ui,
        F::Rg8UI => write_rg8ui,
        F::Rgb8UI => write_rgb8ui,
        F::Rgba8UI => write_rgba8ui,
        F::Depth16
        | F::Depth24
        | F::Depth24Stencil8
        | F::Depth32F
        | F::Depth32FStencil8
        | F::Stencil8 => return None,
    };
    Some(write)
}

/// Forces the channels `format` does not store to their defaults (0 for color, 1 for alpha).
pub fn clip_channels(color: ColorF, format: PixelFormat) -> ColorF {
    let ColorF { r, g, b, a } = color;
    match format {
        PixelFormat::Red | PixelFormat::RedInteger => ColorF::new(r, 0.0, 0.0, 1.0),
        PixelFormat::Rg | PixelFormat::RgInteger => ColorF::new(r, g, 0.0, 1.0),
        PixelFormat::Rgb | PixelFormat::RgbInteger | PixelFormat::Luminance => {
            ColorF::new(r, g, b, 1.0)
        }
        PixelFormat::Alpha => ColorF::new(0.0, 0.0, 0.0, a),
        _ => color,
    }
}

/// Applies the alpha operations of `unpack` and clips to `dest_format`.
pub fn convert_pixel(color: ColorF, dest_format: PixelFormat, unpack: UnpackOptions) -> ColorF {
    let mut c = color;
    if unpack.multiply_alpha() {
        c.r *= c.a;
        c.g *= c.a;
        c.b *= c.a;
    } else if unpack.divide_alpha() && c.a != 0.0 {
        c.r /= c.a;
        c.g /= c.a;
        c.b /= c.a;
    }
    clip_channels(c, dest_format)
}

/// Tightly addressed source pixels.
pub struct SourceImage<'a> {
    pub data: &'a [u8],
    pub row_pitch: usize,
    pub pixel_bytes: usize,
    pub read: ReadColorFn,
}

pub struct DestImage<'a> {
    pub data: &'a mut [u8],
    pub row_pitch: usize,
    pub pixel_bytes: usize,
    /// Unsized destination format, used for channel clipping.
    pub format: PixelFormat,
    pub write: WriteColorFn,
}

/// Converts a `width` x `height` block from `src` into `dst`, flipping rows when
/// `unpack.flip_y` is set.
pub fn copy_image(
    src: &SourceImage<'_>,
    dst: &mut DestImage<'_>,
    width: usize,
    height: usize,
    unpack: UnpackOptions,
) {
    debug_assert!(src.data.len() >= src.row_pitch * height);
    debug_assert!(dst.data.len() >= dst.row_pitch * height);

    for y in 0..height {
        let dest_y = if unpack.flip_y { height - 1 - y } else { y };
        let src_row = &src.data[y * src.row_pitch..];
        let dst_row = &mut dst.data[dest_y * dst.row_pitch..];
        for x in 0..width {
            let color = (src.read)(&src_row[x * src.pixel_bytes..]);
            let converted = convert_pixel(color, dst.format, unpack);
            (dst.write)(converted, &mut dst_row[x * dst.pixel_bytes..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(format: InternalFormat, color: ColorF) -> Vec<u8> {
        let mut out = vec![0u8; format.info().pixel_bytes];
        (color_write_fn(format).unwrap())(color, &mut out);
        out
    }

    #[test]
    fn packed_formats() {
        let white = ColorF::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(write(InternalFormat::Rgb565, white), 0xFFFFu16.to_ne_bytes());
        let red = ColorF::new(1.0, 0.0, 0.0, 0.0);
        assert_eq!(write(InternalFormat::Rgb565, red), 0xF800u16.to_ne_bytes());
        assert_eq!(write(InternalFormat::Rgba4, red), 0xF000u16.to_ne_bytes());
        assert_eq!(write(InternalFormat::Rgb5A1, red), 0xF800u16.to_ne_bytes());
        let alpha = ColorF::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(write(InternalFormat::Rgb10A2, alpha), 0xC000_0000u32.to_ne_bytes());
        assert_eq!(write(InternalFormat::Rgb10A2, red), 0x0000_03FFu32.to_ne_bytes());
    }

    #[test]
    fn half_and_float_formats() {
        let c = ColorF::new(0.5, 0.25, 1.0, 0.0);
        let half = write(InternalFormat::Rgba16F, c);
        let decoded: Vec<f32> = half
            .chunks_exact(2)
            .map(|b| f16::from_ne_bytes([b[0], b[1]]).to_f32())
            .collect();
        assert_eq!(decoded, vec![0.5, 0.25, 1.0, 0.0]);

        let single = write(InternalFormat::Rg32F, c);
        assert_eq!(&single[..4], &0.5f32.to_ne_bytes());
        assert_eq!(&single[4..], &0.25f32.to_ne_bytes());
    }

    #[test]
    fn unorm_clamps_and_rounds() {
        let color = ColorF::new(-1.0, 2.0, 0.5, 0.2);
        assert_eq!(write(InternalFormat::Rgba8, color), [0, 255, 128, 51]);
        let color = ColorF::new(1.0, 0.0, 0.5, 0.2);
        assert_eq!(write(InternalFormat::Rgba8UI, color), [255, 0, 128, 51]);
    }

    #[test]
    fn luma_formats_store_luminance_and_alpha() {
        let c = ColorF::new(0.2, 0.4, 0.6, 0.8);
        assert_eq!(write(InternalFormat::Luminance8, c), [51]);
        assert_eq!(write(InternalFormat::Alpha8, c), [204]);
        assert_eq!(write(InternalFormat::Luminance8Alpha8, c), [51, 204]);
    }

    #[test]
    fn depth_formats_have_no_color_writer() {
        assert!(color_write_fn(InternalFormat::Depth24Stencil8).is_none());
        assert!(color_write_fn(InternalFormat::Stencil8).is_none());
    }

    #[test]
    fn channel_clipping() {
        let c = ColorF::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(clip_channels(c, PixelFormat::Red), ColorF::new(0.1, 0.0, 0.0, 1.0));
        assert_eq!(clip_channels(c, PixelFormat::Rg), ColorF::new(0.1, 0.2, 0.0, 1.0));
        assert_eq!(clip_channels(c, PixelFormat::Rgb), ColorF::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(clip_channels(c, PixelFormat::Luminance), ColorF::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(clip_channels(c, PixelFormat::Alpha), ColorF::new(0.0, 0.0, 0.0, 0.4));
        assert_eq!(clip_channels(c, PixelFormat::LuminanceAlpha), c);
        assert_eq!(clip_channels(c, PixelFormat::Rgba), c);
    }

    #[test]
    fn alpha_operations() {
        let c = ColorF::new(0.5, 1.0, 0.25, 0.5);
        let pre = UnpackOptions {
            premultiply_alpha: true,
            ..Default::default()
        };
        let un = UnpackOptions {
            unmultiply_alpha: true,
            ..Default::default()
        };
        let both = UnpackOptions {
            premultiply_alpha: true,
            unmultiply_alpha: true,
            ..Default::default()
        };
        assert_eq!(convert_pixel(c, PixelFormat::Rgba, pre), ColorF::new(0.25, 0.5, 0.125, 0.5));
        assert_eq!(convert_pixel(c, PixelFormat::Rgba, un), ColorF::new(1.0, 2.0, 0.5, 0.5));
        assert_eq!(convert_pixel(c, PixelFormat::Rgba, both), c);

        let transparent = ColorF::new(0.3, 0.6, 0.9, 0.0);
        assert_eq!(convert_pixel(transparent, PixelFormat::Rgba, un), transparent);
    }

    #[test]
    fn premultiply_then_unmultiply_round_trips_opaque() {
        let pre = UnpackOptions {
            premultiply_alpha: true,
            ..Default::default()
        };
        let un = UnpackOptions {
            unmultiply_alpha: true,
            ..Default::default()
        };
        for v in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let c = ColorF::new(v, 1.0 - v, v * 0.5, 1.0);
            let round_trip =
                convert_pixel(convert_pixel(c, PixelFormat::Rgba, pre), PixelFormat::Rgba, un);
            assert_eq!(round_trip, c);
        }
    }

    #[test]
    fn copy_image_flips_rows() {
        // 2x2 RGBA8: rows [red, green], [blue, white].
        let src = [
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let mut out = [0u8; 16];
        let source = SourceImage {
            data: &src,
            row_pitch: 8,
            pixel_bytes: 4,
            read: read_rgba8,
        };
        let mut dest = DestImage {
            data: &mut out,
            row_pitch: 8,
            pixel_bytes: 4,
            format: PixelFormat::Rgba,
            write: write_rgba8,
        };
        copy_image(
            &source,
            &mut dest,
            2,
            2,
            UnpackOptions {
                flip_y: true,
                ..Default::default()
            },
        );
        assert_eq!(&out[..8], &src[8..]);
        assert_eq!(&out[8..], &src[..8]);
    }

    #[test]
    fn integer_sources_read_back_as_integer_format() {
        assert_eq!(
            readback_format(ComponentType::UnsignedInt),
            (PixelFormat::RgbaInteger, PixelType::UnsignedByte)
        );
        assert_eq!(
            readback_format(ComponentType::UnsignedNormalized),
            (PixelFormat::Rgba, PixelType::UnsignedByte)
        );
    }
}
