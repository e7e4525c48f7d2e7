use crate::foundation::math::unpremultiply_rgba8;

/// Tightly packed, row-major, premultiplied RGBA8 pixels.
///
/// `data.len() == width * height * 4` always holds; [`PremulImage::from_premul`] and
/// [`PremulImage::transparent`] are the only constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PremulImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Flattened result of blending a [`crate::Composition`].
///
/// Shared read-only between the dedup cache and persistence workers.
pub type CompositeImage = PremulImage;

impl PremulImage {
    /// Wrap a premultiplied buffer, checking its length against the dimensions.
    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent image.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied bytes, `width * height * 4` long.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte length of one row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Premultiplied pixel at `(x, y)`, if inside the bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.stride() + x as usize * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Straight-alpha copy of the pixels, as written by PNG encoders.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        unpremultiply_rgba8(&self.data)
    }
}
