//! Alpha blending math for feathered tile merges.
//!
//! Each tile is composited over the canvas with the standard "over" rule:
//! `out = src * alpha + dst * (1 - alpha)`
//!
//! applied to every channel, where `alpha` comes from a [`BlendMask`] shared
//! by every tile of a grid. A tile's own alpha channel is blended like the
//! color channels, so an untouched tile composited over its source leaves the
//! source unchanged.

use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, Rgba, RgbaImage};

/// An owned 8-bit image buffer with pixel type `P`.
pub type TileImage<P> = ImageBuffer<P, Vec<u8>>;

/// Opacity of a pixel that fully shows the tile.
const OPAQUE: u8 = u8::MAX;

/// Pixel layouts that can be split, transformed and merged.
///
/// Feathered merges work on an RGBA canvas, so every supported layout must
/// convert losslessly to RGBA and back.
pub trait TilePixel: Pixel<Subpixel = u8> + Send + Sync + 'static {
    /// Expand to RGBA. Layouts without alpha are fully opaque.
    fn to_rgba8(self) -> Rgba<u8>;

    /// Narrow an RGBA pixel back to this layout.
    fn from_rgba8(px: Rgba<u8>) -> Self;

    /// Fully opaque black, used for placeholder tiles.
    #[must_use]
    fn placeholder() -> Self {
        Self::from_rgba8(Rgba([0, 0, 0, OPAQUE]))
    }
}

impl TilePixel for Rgb<u8> {
    fn to_rgba8(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, OPAQUE])
    }

    fn from_rgba8(px: Rgba<u8>) -> Self {
        let [r, g, b, _] = px.0;
        Rgb([r, g, b])
    }
}

impl TilePixel for Rgba<u8> {
    fn to_rgba8(self) -> Rgba<u8> {
        self
    }

    fn from_rgba8(px: Rgba<u8>) -> Self {
        px
    }
}

/// Single-channel opacity map sized to one tile.
///
/// The mask is made of concentric rectangular bands. The pixel at inset `i`
/// from the nearest tile edge gets opacity `i * 255 / bands`, so the outer
/// ring is fully transparent and opacity never decreases moving inward.
/// Everything deeper than the last band is the fully opaque core.
#[derive(Debug, Clone)]
pub struct BlendMask {
    opacity: GrayImage,
    bands: u32,
}

impl BlendMask {
    /// Build the mask for tiles of `width x height` with the given overlap.
    ///
    /// The nominal band count is `max(1, 2 * overlap)`, limited so that at
    /// least one pixel of opaque core remains. `overlap == 0` yields an
    /// all-opaque mask, which turns a feathered merge into a hard paste.
    #[must_use]
    pub fn new(width: u32, height: u32, overlap: u32) -> Self {
        let bands = band_count(width, height, overlap);
        let opacity = GrayImage::from_fn(width, height, |x, y| {
            let inset = x
                .min(y)
                .min(width.saturating_sub(1) - x)
                .min(height.saturating_sub(1) - y);
            Luma([band_opacity(inset, bands)])
        });

        Self { opacity, bands }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.opacity.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.opacity.height()
    }

    /// Number of gradient bands between the tile edge and the opaque core.
    #[must_use]
    pub fn bands(&self) -> u32 {
        self.bands
    }

    /// Opacity at `(x, y)` in tile coordinates, `0` (transparent) to `255`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the mask.
    #[must_use]
    pub fn opacity(&self, x: u32, y: u32) -> u8 {
        self.opacity.get_pixel(x, y)[0]
    }

    /// Borrow the mask as a grayscale image.
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.opacity
    }
}

fn band_count(width: u32, height: u32, overlap: u32) -> u32 {
    if overlap == 0 {
        return 0;
    }
    let nominal = overlap.saturating_mul(2).max(1);
    let core_inset = width.min(height).saturating_sub(1) / 2;
    nominal.min(core_inset)
}

fn band_opacity(inset: u32, bands: u32) -> u8 {
    if inset >= bands {
        return OPAQUE;
    }
    let level = u64::from(inset) * u64::from(OPAQUE) / u64::from(bands);
    u8::try_from(level).unwrap_or(OPAQUE)
}

/// `src * alpha + dst * (1 - alpha)` in 8-bit fixed point.
fn mix(src: u8, dst: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let value = (u32::from(src) * a + u32::from(dst) * (255 - a) + 127) / 255;
    u8::try_from(value).unwrap_or(OPAQUE)
}

/// Composite `tile` over `canvas` at `(pos_x, pos_y)` using `mask` as opacity.
///
/// The region is clipped to both the canvas and the mask. Pixels where the
/// mask is transparent are left untouched; where it is opaque the tile pixel
/// is copied exactly.
pub fn composite_masked<P: TilePixel>(
    canvas: &mut RgbaImage,
    tile: &TileImage<P>,
    mask: &BlendMask,
    pos_x: u32,
    pos_y: u32,
) {
    let x2 = pos_x
        .saturating_add(tile.width().min(mask.width()))
        .min(canvas.width());
    let y2 = pos_y
        .saturating_add(tile.height().min(mask.height()))
        .min(canvas.height());

    if pos_x >= x2 || pos_y >= y2 {
        return;
    }

    for dy in 0..(y2 - pos_y) {
        for dx in 0..(x2 - pos_x) {
            let alpha = mask.opacity(dx, dy);
            if alpha == 0 {
                continue;
            }

            let src = tile.get_pixel(dx, dy).to_rgba8();
            let dst = canvas.get_pixel_mut(pos_x + dx, pos_y + dy);
            if alpha == OPAQUE {
                *dst = src;
                continue;
            }
            for ch in 0..4 {
                dst[ch] = mix(src[ch], dst[ch], alpha);
            }
        }
    }
}

/// Expand any supported image to an RGBA canvas.
#[must_use]
pub fn to_rgba_canvas<P: TilePixel>(image: &TileImage<P>) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        image.get_pixel(x, y).to_rgba8()
    })
}

/// Narrow an RGBA canvas back to the caller's pixel layout.
#[must_use]
pub fn from_rgba_canvas<P: TilePixel>(canvas: &RgbaImage) -> TileImage<P> {
    ImageBuffer::from_fn(canvas.width(), canvas.height(), |x, y| {
        P::from_rgba8(*canvas.get_pixel(x, y))
    })
}
