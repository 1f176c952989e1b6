//! Geometry and image addressing types shared by the blit operations.

/// Integer rectangle in framebuffer/texture pixels.
///
/// A negative `width` or `height` encodes a reversed (mirrored) axis, matching
/// `glBlitFramebuffer` where `x1 < x0` flips the copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering `[x0, x1) x [y0, y1)`; `x1 < x0` / `y1 < y0` produce reversed axes.
    pub const fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn is_reversed_x(&self) -> bool {
        self.width < 0
    }

    pub fn is_reversed_y(&self) -> bool {
        self.height < 0
    }

    /// Same pixel coverage with non-negative extents.
    pub fn remove_reversal(&self) -> Self {
        let mut out = *self;
        if out.width < 0 {
            out.x += out.width;
            out.width = -out.width;
        }
        if out.height < 0 {
            out.y += out.height;
            out.height = -out.height;
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersects two non-reversed rectangles. Returns `None` when the overlap is empty.
    pub fn clip(&self, bounds: &Rect) -> Option<Rect> {
        let x0 = self.x.max(bounds.x);
        let y0 = self.y.max(bounds.y);
        let x1 = (self.x + self.width).min(bounds.x + bounds.width);
        let y1 = (self.y + self.height).min(bounds.y + bounds.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::from_corners(x0, y0, x1, y1))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extents {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

impl Extents {
    pub const fn new(width: i32, height: i32, depth: i32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureType {
    Texture2D,
    Texture2DArray,
    Texture3D,
    CubeMap,
}

impl TextureType {
    /// Whether images of this type are specified with the 3D (layered) entry points.
    pub fn is_layered(self) -> bool {
        matches!(self, Self::Texture2DArray | Self::Texture3D)
    }
}

/// Image target of a texture level (a cube map has one target per face).
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D = 0x0DE1,
    Texture3D = 0x806F,
    Texture2DArray = 0x8C1A,
    CubeMapPositiveX = 0x8515,
    CubeMapNegativeX = 0x8516,
    CubeMapPositiveY = 0x8517,
    CubeMapNegativeY = 0x8518,
    CubeMapPositiveZ = 0x8519,
    CubeMapNegativeZ = 0x851A,
}

impl TextureTarget {
    pub const CUBE_FACES: [TextureTarget; 6] = [
        Self::CubeMapPositiveX,
        Self::CubeMapNegativeX,
        Self::CubeMapPositiveY,
        Self::CubeMapNegativeY,
        Self::CubeMapPositiveZ,
        Self::CubeMapNegativeZ,
    ];

    pub fn texture_type(self) -> TextureType {
        match self {
            Self::Texture2D => TextureType::Texture2D,
            Self::Texture3D => TextureType::Texture3D,
            Self::Texture2DArray => TextureType::Texture2DArray,
            Self::CubeMapPositiveX
            | Self::CubeMapNegativeX
            | Self::CubeMapPositiveY
            | Self::CubeMapNegativeY
            | Self::CubeMapPositiveZ
            | Self::CubeMapNegativeZ => TextureType::CubeMap,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Contiguous range of array layers / 3D slices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerRange {
    pub first: u32,
    pub count: u32,
}

impl LayerRange {
    pub const fn new(first: u32, count: u32) -> Self {
        Self { first, count }
    }

    /// One past the last layer, or `None` when the range runs past `u32::MAX`.
    pub fn end(&self) -> Option<u32> {
        self.first.checked_add(self.count)
    }

    pub fn iter(&self) -> std::ops::Range<u32> {
        self.first..self.first.saturating_add(self.count)
    }
}

/// Addresses a single image (or a range of layers) of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageIndex {
    pub target: TextureTarget,
    pub level: u32,
    /// `None` addresses every layer of the level.
    pub layers: Option<LayerRange>,
}

impl ImageIndex {
    pub const fn new(target: TextureTarget, level: u32) -> Self {
        Self {
            target,
            level,
            layers: None,
        }
    }

    pub const fn with_layers(target: TextureTarget, level: u32, layers: LayerRange) -> Self {
        Self {
            target,
            level,
            layers: Some(layers),
        }
    }

    pub fn has_layer(&self) -> bool {
        self.layers.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_reversal_keeps_coverage() {
        let r = Rect::from_corners(10, 8, 2, 4);
        assert!(r.is_reversed_x());
        assert!(r.is_reversed_y());
        assert_eq!(r.remove_reversal(), Rect::new(2, 4, 8, 4));

        let plain = Rect::new(1, 2, 3, 4);
        assert_eq!(plain.remove_reversal(), plain);
    }

    #[test]
    fn clip_never_produces_negative_sizes() {
        let bounds = Rect::new(0, 0, 16, 16);
        for x in -20..20 {
            for w in 1..24 {
                let r = Rect::new(x, x / 2, w, w);
                if let Some(clipped) = r.clip(&bounds) {
                    assert!(clipped.width > 0 && clipped.height > 0, "{r:?} -> {clipped:?}");
                    assert!(clipped.x >= 0 && clipped.y >= 0);
                    assert!(clipped.x + clipped.width <= 16);
                    assert!(clipped.y + clipped.height <= 16);
                }
            }
        }
    }

    #[test]
    fn disjoint_or_touching_rects_clip_to_none() {
        let bounds = Rect::new(0, 0, 4, 4);
        assert_eq!(Rect::new(4, 0, 2, 2).clip(&bounds), None);
        assert_eq!(Rect::new(-3, 0, 3, 2).clip(&bounds), None);
        assert_eq!(Rect::new(1, 1, 0, 2).clip(&bounds), None);
        assert_eq!(
            Rect::new(-1, 2, 3, 5).clip(&bounds),
            Some(Rect::new(0, 2, 2, 2))
        );
    }

    #[test]
    fn cube_faces_map_to_cube_type() {
        for face in TextureTarget::CUBE_FACES {
            assert_eq!(face.texture_type(), TextureType::CubeMap);
        }
        assert!(TextureTarget::Texture3D.texture_type().is_layered());
        assert!(!TextureTarget::Texture2D.texture_type().is_layered());
    }

    #[test]
    fn layer_range_iterates_first_to_last() {
        let range = LayerRange::new(1, 2);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(range.end(), Some(3));
    }

    #[test]
    fn overflowing_layer_range_has_no_end() {
        let range = LayerRange::new(u32::MAX, 2);
        assert_eq!(range.end(), None);
        assert_eq!(range.iter().count(), 0);
    }
}
