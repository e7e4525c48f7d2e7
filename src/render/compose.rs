use crate::foundation::math::mul_div255_u8;
use crate::layers::Composition;
use crate::render::raster::{CompositeImage, PremulImage};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Porter-Duff "source over destination" on premultiplied pixels.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Blend `src` over `dst` with both images anchored at the origin.
///
/// Only the overlapping region is touched: `src` pixels outside `dst` bounds are clipped.
pub fn over_at_origin(dst: &mut PremulImage, src: &PremulImage) {
    let w = dst.width().min(src.width()) as usize;
    let h = dst.height().min(src.height()) as usize;
    if w == 0 || h == 0 {
        return;
    }

    let dst_stride = dst.stride();
    let src_stride = src.stride();
    let dst_data = dst.data_mut();
    let src_data = src.data();
    for y in 0..h {
        let d_row = &mut dst_data[y * dst_stride..y * dst_stride + w * 4];
        let s_row = &src_data[y * src_stride..y * src_stride + w * 4];
        for (d, s) in d_row.chunks_exact_mut(4).zip(s_row.chunks_exact(4)) {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        }
    }
}

/// Flatten a composition, bottom layer first.
///
/// The canvas is a verbatim copy of the bottom layer and keeps its bounds; each following
/// layer is blended over it in order.
pub fn compose(composition: &Composition) -> CompositeImage {
    let Some((bottom, upper)) = composition.layers().split_first() else {
        return PremulImage::transparent(0, 0);
    };

    let mut canvas = bottom.pixels.clone();
    for layer in upper {
        over_at_origin(&mut canvas, &layer.pixels);
    }
    canvas
}

#[cfg(test)]
#[path = "../../tests/unit/render/compose.rs"]
mod tests;
