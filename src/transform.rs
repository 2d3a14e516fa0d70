//! The per-tile transform contract.
//!
//! The crate never looks inside a transform. It hands over each tile with a
//! [`TileContext`] and only checks that the returned buffer has the tile's
//! size before merging.

use image::imageops;

use crate::blending::{TileImage, TilePixel};

/// Everything a transform may know about the tile it is working on.
///
/// Seeds and iteration counters are passed here explicitly instead of living
/// in shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileContext {
    /// Row index within the grid.
    pub row: usize,
    /// Column index within the row.
    pub col: usize,
    /// Row-major position of the tile.
    pub index: usize,
    /// Number of tiles in the grid.
    pub tile_count: usize,
    /// Left edge in source coordinates.
    pub x_offset: u32,
    /// Top edge in source coordinates.
    pub y_offset: u32,
    /// Tile width the replacement must have.
    pub width: u32,
    /// Tile height the replacement must have.
    pub height: u32,
    /// Seed for this pass.
    pub seed: u64,
    /// Zero-based pass number when the same image is processed repeatedly.
    pub iteration: u32,
}

/// A caller-supplied transform applied to each tile independently.
///
/// Implementations must not assume anything about neighbouring tiles; the
/// engine may call them in any order and from several threads.
pub trait TileTransform<P: TilePixel>: Sync {
    /// Produce the replacement for one tile.
    ///
    /// The result should have the same dimensions as `tile`. A result of any
    /// other size is replaced by a placeholder when merging.
    fn transform(&self, tile: &TileImage<P>, ctx: &TileContext) -> TileImage<P>;

    /// Produce replacements for a batch of tiles.
    ///
    /// Returning fewer images than `tiles` is allowed (an aborted or partially
    /// failed batch); the missing trailing slots are merged as placeholders.
    fn transform_batch(
        &self,
        tiles: &[&TileImage<P>],
        contexts: &[TileContext],
    ) -> Vec<TileImage<P>> {
        tiles
            .iter()
            .zip(contexts)
            .map(|(tile, ctx)| self.transform(tile, ctx))
            .collect()
    }
}

impl<P, F> TileTransform<P> for F
where
    P: TilePixel,
    F: Fn(&TileImage<P>, &TileContext) -> TileImage<P> + Sync,
{
    fn transform(&self, tile: &TileImage<P>, ctx: &TileContext) -> TileImage<P> {
        self(tile, ctx)
    }
}

/// Simple transforms for demos and pipeline checks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BuiltinTransform {
    /// Return the tile unchanged.
    #[default]
    Identity,
    /// Invert the color channels.
    Invert,
    /// Add a constant to every color channel.
    Brighten(i32),
    /// Gaussian blur with the given sigma.
    Blur(f32),
}

impl BuiltinTransform {
    /// Apply the transform to one image.
    #[must_use]
    pub fn apply<P: TilePixel>(&self, tile: &TileImage<P>) -> TileImage<P> {
        match *self {
            Self::Identity => tile.clone(),
            Self::Invert => {
                let mut out = tile.clone();
                imageops::colorops::invert(&mut out);
                out
            }
            Self::Brighten(value) => imageops::colorops::brighten(tile, value),
            Self::Blur(sigma) => imageops::blur(tile, sigma),
        }
    }
}

impl<P: TilePixel> TileTransform<P> for BuiltinTransform {
    fn transform(&self, tile: &TileImage<P>, _ctx: &TileContext) -> TileImage<P> {
        self.apply(tile)
    }
}
