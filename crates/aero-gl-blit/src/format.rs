//! GL pixel format vocabulary and the sized-format table used by the blit paths.
//!
//! Discriminants are the GL enum values so a native backend can pass them straight through.

use crate::error::BlitError;

/// Unsized (client) pixel format.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    StencilIndex = 0x1901,
    DepthComponent = 0x1902,
    Red = 0x1903,
    Alpha = 0x1906,
    Rgb = 0x1907,
    Rgba = 0x1908,
    Luminance = 0x1909,
    LuminanceAlpha = 0x190A,
    Rg = 0x8227,
    RgInteger = 0x8228,
    DepthStencil = 0x84F9,
    RedInteger = 0x8D94,
    RgbInteger = 0x8D98,
    RgbaInteger = 0x8D99,
}

impl PixelFormat {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::RedInteger | Self::RgInteger | Self::RgbInteger | Self::RgbaInteger
        )
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte = 0x1401,
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
    Float = 0x1406,
    HalfFloat = 0x140B,
    UnsignedShort4444 = 0x8033,
    UnsignedShort5551 = 0x8034,
    UnsignedShort565 = 0x8363,
    UnsignedInt2101010Rev = 0x8368,
    UnsignedInt248 = 0x84FA,
    Float32UnsignedInt248Rev = 0x8DAD,
}

impl PixelType {
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// How the channel values of a format are interpreted by shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Float,
    UnsignedNormalized,
    SignedNormalized,
    Int,
    UnsignedInt,
}

impl ComponentType {
    pub fn is_float_like(self) -> bool {
        matches!(
            self,
            Self::Float | Self::UnsignedNormalized | Self::SignedNormalized
        )
    }
}

/// Sized internal formats the engine knows how to clear, copy into, or convert to.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Alpha8 = 0x803C,
    Luminance8 = 0x8040,
    Luminance8Alpha8 = 0x8045,
    Rgb8 = 0x8051,
    Rgba4 = 0x8056,
    Rgb5A1 = 0x8057,
    Rgba8 = 0x8058,
    Rgb10A2 = 0x8059,
    R8 = 0x8229,
    Rg8 = 0x822B,
    R16F = 0x822D,
    R32F = 0x822E,
    Rg16F = 0x822F,
    Rg32F = 0x8230,
    R8UI = 0x8232,
    Rg8UI = 0x8238,
    Rgba32F = 0x8814,
    Rgb32F = 0x8815,
    Rgba16F = 0x881A,
    Rgb16F = 0x881B,
    Rgba8UI = 0x8D7C,
    Rgb8UI = 0x8D7D,
    Rgb565 = 0x8D62,
    Depth16 = 0x81A5,
    Depth24 = 0x81A6,
    Depth24Stencil8 = 0x88F0,
    Depth32F = 0x8CAC,
    Depth32FStencil8 = 0x8CAD,
    Stencil8 = 0x8D48,
}

/// Per-format properties consulted by the clear and CPU conversion paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatInfo {
    /// Unsized format used when (re)specifying the image or uploading pixels.
    pub format: PixelFormat,
    /// Client type used when uploading pixels.
    pub ty: PixelType,
    pub component_type: ComponentType,
    pub pixel_bytes: usize,
    pub depth_bits: u32,
    pub stencil_bits: u32,
}

impl FormatInfo {
    const fn color(
        format: PixelFormat,
        ty: PixelType,
        component_type: ComponentType,
        pixel_bytes: usize,
    ) -> Self {
        Self {
            format,
            ty,
            component_type,
            pixel_bytes,
            depth_bits: 0,
            stencil_bits: 0,
        }
    }

    const fn depth_stencil(
        format: PixelFormat,
        ty: PixelType,
        pixel_bytes: usize,
        depth_bits: u32,
        stencil_bits: u32,
    ) -> Self {
        Self {
            format,
            ty,
            component_type: match depth_bits {
                0 => ComponentType::UnsignedInt,
                16 | 24 => ComponentType::UnsignedNormalized,
                _ => ComponentType::Float,
            },
            pixel_bytes,
            depth_bits,
            stencil_bits,
        }
    }

    pub fn is_color(&self) -> bool {
        self.depth_bits == 0 && self.stencil_bits == 0
    }
}

impl InternalFormat {
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub const fn info(self) -> FormatInfo {
        use ComponentType as C;
        use PixelFormat as F;
        use PixelType as T;
        match self {
            Self::Alpha8 => FormatInfo::color(F::Alpha, T::UnsignedByte, C::UnsignedNormalized, 1),
            Self::Luminance8 => {
                FormatInfo::color(F::Luminance, T::UnsignedByte, C::UnsignedNormalized, 1)
            }
            Self::Luminance8Alpha8 => {
                FormatInfo::color(F::LuminanceAlpha, T::UnsignedByte, C::UnsignedNormalized, 2)
            }
            Self::R8 => FormatInfo::color(F::Red, T::UnsignedByte, C::UnsignedNormalized, 1),
            Self::Rg8 => FormatInfo::color(F::Rg, T::UnsignedByte, C::UnsignedNormalized, 2),
            Self::Rgb8 => FormatInfo::color(F::Rgb, T::UnsignedByte, C::UnsignedNormalized, 3),
            Self::Rgba8 => FormatInfo::color(F::Rgba, T::UnsignedByte, C::UnsignedNormalized, 4),
            Self::Rgb565 => {
                FormatInfo::color(F::Rgb, T::UnsignedShort565, C::UnsignedNormalized, 2)
            }
            Self::Rgba4 => {
                FormatInfo::color(F::Rgba, T::UnsignedShort4444, C::UnsignedNormalized, 2)
            }
            Self::Rgb5A1 => {
                FormatInfo::color(F::Rgba, T::UnsignedShort5551, C::UnsignedNormalized, 2)
            }
            Self::Rgb10A2 => {
                FormatInfo::color(F::Rgba, T::UnsignedInt2101010Rev, C::UnsignedNormalized, 4)
            }
            Self::R16F => FormatInfo::color(F::Red, T::HalfFloat, C::Float, 2),
            Self::Rg16F => FormatInfo::color(F::Rg, T::HalfFloat, C::Float, 4),
            Self::Rgb16F => FormatInfo::color(F::Rgb, T::HalfFloat, C::Float, 6),
            Self::Rgba16F => FormatInfo::color(F::Rgba, T::HalfFloat, C::Float, 8),
            Self::R32F => FormatInfo::color(F::Red, T::Float, C::Float, 4),
            Self::Rg32F => FormatInfo::color(F::Rg, T::Float, C::Float, 8),
            Self::Rgb32F => FormatInfo::color(F::Rgb, T::Float, C::Float, 12),
            Self::Rgba32F => FormatInfo::color(F::Rgba, T::Float, C::Float, 16),
            Self::R8UI => FormatInfo::color(F::RedInteger, T::UnsignedByte, C::UnsignedInt, 1),
            Self::Rg8UI => FormatInfo::color(F::RgInteger, T::UnsignedByte, C::UnsignedInt, 2),
            Self::Rgb8UI => FormatInfo::color(F::RgbInteger, T::UnsignedByte, C::UnsignedInt, 3),
            Self::Rgba8UI => {
                FormatInfo::color(F::RgbaInteger, T::UnsignedByte, C::UnsignedInt, 4)
            }
            Self::Depth16 => {
                FormatInfo::depth_stencil(F::DepthComponent, T::UnsignedShort, 2, 16, 0)
            }
            Self::Depth24 => {
                FormatInfo::depth_stencil(F::DepthComponent, T::UnsignedInt, 4, 24, 0)
            }
            Self::Depth32F => FormatInfo::depth_stencil(F::DepthComponent, T::Float, 4, 32, 0),
            Self::Depth24Stencil8 => {
                FormatInfo::depth_stencil(F::DepthStencil, T::UnsignedInt248, 4, 24, 8)
            }
            Self::Depth32FStencil8 => FormatInfo::depth_stencil(
                F::DepthStencil,
                T::Float32UnsignedInt248Rev,
                8,
                32,
                8,
            ),
            Self::Stencil8 => FormatInfo::depth_stencil(F::StencilIndex, T::UnsignedByte, 1, 0, 8),
        }
    }

    /// Resolves a client `(format, type)` pair to its sized format.
    pub fn from_format_type(format: PixelFormat, ty: PixelType) -> Option<Self> {
        use PixelFormat as F;
        use PixelType as T;
        let sized = match (format, ty) {
            (F::Alpha, T::UnsignedByte) => Self::Alpha8,
            (F::Luminance, T::UnsignedByte) => Self::Luminance8,
            (F::LuminanceAlpha, T::UnsignedByte) => Self::Luminance8Alpha8,
            (F::Red, T::UnsignedByte) => Self::R8,
            (F::Rg, T::UnsignedByte) => Self::Rg8,
            (F::Rgb, T::UnsignedByte) => Self::Rgb8,
            (F::Rgba, T::UnsignedByte) => Self::Rgba8,
            (F::Rgb, T::UnsignedShort565) => Self::Rgb565,
            (F::Rgba, T::UnsignedShort4444) => Self::Rgba4,
            (F::Rgba, T::UnsignedShort5551) => Self::Rgb5A1,
            (F::Rgba, T::UnsignedInt2101010Rev) => Self::Rgb10A2,
            (F::Red, T::HalfFloat) => Self::R16F,
            (F::Rg, T::HalfFloat) => Self::Rg16F,
            (F::Rgb, T::HalfFloat) => Self::Rgb16F,
            (F::Rgba, T::HalfFloat) => Self::Rgba16F,
            (F::Red, T::Float) => Self::R32F,
            (F::Rg, T::Float) => Self::Rg32F,
            (F::Rgb, T::Float) => Self::Rgb32F,
            (F::Rgba, T::Float) => Self::Rgba32F,
            (F::RedInteger, T::UnsignedByte) => Self::R8UI,
            (F::RgInteger, T::UnsignedByte) => Self::Rg8UI,
            (F::RgbInteger, T::UnsignedByte) => Self::Rgb8UI,
            (F::RgbaInteger, T::UnsignedByte) => Self::Rgba8UI,
            (F::DepthComponent, T::UnsignedShort) => Self::Depth16,
            (F::DepthComponent, T::UnsignedInt) => Self::Depth24,
            (F::DepthComponent, T::Float) => Self::Depth32F,
            (F::DepthStencil, T::UnsignedInt248) => Self::Depth24Stencil8,
            (F::DepthStencil, T::Float32UnsignedInt248Rev) => Self::Depth32FStencil8,
            (F::StencilIndex, T::UnsignedByte) => Self::Stencil8,
            _ => return None,
        };
        Some(sized)
    }
}

/// Format to use when copying a framebuffer region into a scratch texture with
/// `copy_tex_image_2d`, given the framebuffer's implementation read format/type.
pub fn copy_tex_image_format(
    read_format: PixelFormat,
    read_type: PixelType,
) -> Result<InternalFormat, BlitError> {
    InternalFormat::from_format_type(read_format, read_type).ok_or(BlitError::UnsupportedFormat {
        format: read_format,
        ty: read_type,
    })
}

/// Legacy luminance/alpha formats emulated on top of RGBA storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LumaFormat {
    Alpha,
    Luminance,
    LuminanceAlpha,
}

/// Source of one channel in a texture swizzle.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Swizzle {
    Zero = 0,
    One = 1,
    Red = 0x1903,
    Green = 0x1904,
    Blue = 0x1905,
    Alpha = 0x1906,
}

impl LumaFormat {
    /// Swizzle applied to an RGBA copy of a framebuffer so that drawing it stores the emulated
    /// channels in the layout the luma texture uses: luminance (or alpha, for alpha-only) in red,
    /// and alpha in green for luminance-alpha.
    pub fn storage_swizzle(self) -> [Swizzle; 4] {
        [
            if self == Self::Alpha {
                Swizzle::Alpha
            } else {
                Swizzle::Red
            },
            if self == Self::LuminanceAlpha {
                Swizzle::Alpha
            } else {
                Swizzle::Zero
            },
            Swizzle::Zero,
            Swizzle::Zero,
        ]
    }

    /// Swizzle applied to a luma-emulating texture so that sampling it yields the emulated
    /// `(L, L, L, A)` color.
    pub fn sampling_swizzle(self) -> [Swizzle; 4] {
        let luminance = match self {
            Self::Alpha => Swizzle::Zero,
            Self::Luminance | Self::LuminanceAlpha => Swizzle::Red,
        };
        let alpha = match self {
            Self::Luminance => Swizzle::One,
            Self::LuminanceAlpha => Swizzle::Green,
            Self::Alpha => Swizzle::Red,
        };
        [luminance, luminance, luminance, alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InternalFormat; 29] = [
        InternalFormat::Alpha8,
        InternalFormat::Luminance8,
        InternalFormat::Luminance8Alpha8,
        InternalFormat::Rgb8,
        InternalFormat::Rgba4,
        InternalFormat::Rgb5A1,
        InternalFormat::Rgba8,
        InternalFormat::Rgb10A2,
        InternalFormat::R8,
        InternalFormat::Rg8,
        InternalFormat::R16F,
        InternalFormat::R32F,
        InternalFormat::Rg16F,
        InternalFormat::Rg32F,
        InternalFormat::R8UI,
        InternalFormat::Rg8UI,
        InternalFormat::Rgba32F,
        InternalFormat::Rgb32F,
        InternalFormat::Rgba16F,
        InternalFormat::Rgb16F,
        InternalFormat::Rgba8UI,
        InternalFormat::Rgb8UI,
        InternalFormat::Rgb565,
        InternalFormat::Depth16,
        InternalFormat::Depth24,
        InternalFormat::Depth24Stencil8,
        InternalFormat::Depth32F,
        InternalFormat::Depth32FStencil8,
        InternalFormat::Stencil8,
    ];

    #[test]
    fn format_type_lookup_inverts_info() {
        for format in ALL {
            let info = format.info();
            assert_eq!(
                InternalFormat::from_format_type(info.format, info.ty),
                Some(format),
                "{format:?}"
            );
        }
    }

    #[test]
    fn depth_stencil_bits() {
        assert!(InternalFormat::Rgba8.info().is_color());
        assert_eq!(InternalFormat::Depth24Stencil8.info().depth_bits, 24);
        assert_eq!(InternalFormat::Depth24Stencil8.info().stencil_bits, 8);
        assert_eq!(InternalFormat::Stencil8.info().depth_bits, 0);
        assert!(!InternalFormat::Depth16.info().is_color());
    }

    #[test]
    fn integer_formats_report_unsigned_int() {
        assert_eq!(
            InternalFormat::Rgba8UI.info().component_type,
            ComponentType::UnsignedInt
        );
        assert!(InternalFormat::Rgba8UI.info().format.is_integer());
        assert!(InternalFormat::Rgba16F.info().component_type.is_float_like());
    }

    #[test]
    fn unknown_format_type_pairs_are_rejected() {
        assert_eq!(
            InternalFormat::from_format_type(PixelFormat::Luminance, PixelType::Float),
            None
        );
        assert!(matches!(
            copy_tex_image_format(PixelFormat::Rgba, PixelType::UnsignedShort),
            Err(BlitError::UnsupportedFormat { .. })
        ));
        assert_eq!(
            copy_tex_image_format(PixelFormat::Rgba, PixelType::UnsignedByte).unwrap(),
            InternalFormat::Rgba8
        );
    }

    #[test]
    fn luma_swizzles() {
        use Swizzle::*;
        assert_eq!(LumaFormat::Alpha.storage_swizzle(), [Alpha, Zero, Zero, Zero]);
        assert_eq!(LumaFormat::Luminance.storage_swizzle(), [Red, Zero, Zero, Zero]);
        assert_eq!(
            LumaFormat::LuminanceAlpha.storage_swizzle(),
            [Red, Alpha, Zero, Zero]
        );

        assert_eq!(LumaFormat::Alpha.sampling_swizzle(), [Zero, Zero, Zero, Red]);
        assert_eq!(LumaFormat::Luminance.sampling_swizzle(), [Red, Red, Red, One]);
        assert_eq!(
            LumaFormat::LuminanceAlpha.sampling_swizzle(),
            [Red, Red, Red, Green]
        );
    }
}
