//! Reassemble a grid of tiles into one image.
//!
//! Two strategies are available:
//! - **Hard paste**: tiles overwrite the canvas in row-major order.
//! - **Feathered**: tiles are alpha-composited over the original image with a
//!   shared [`BlendMask`] so seams fade out.
//!
//! Neither strategy fails because of tile content. A slot that is empty or
//! holds a buffer of the wrong size is replaced by an opaque black placeholder.

use std::borrow::Cow;

use image::imageops;

use crate::blending::{self, BlendMask, TileImage, TilePixel};
use crate::error::{Error, Result};
use crate::grid::{Grid, Tile};

/// How overlapping tiles are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Overwrite; the later tile in row-major order wins every overlap.
    HardPaste,
    /// Fade tile edges over the original image.
    #[default]
    Feathered,
}

impl MergeStrategy {
    /// Merge `grid` with this strategy.
    ///
    /// `original` is the image the grid was split from; hard paste ignores it
    /// but still checks its size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `original` differs in size from
    /// the grid's source.
    pub fn merge<P: TilePixel>(
        self,
        original: &TileImage<P>,
        grid: &Grid<P>,
    ) -> Result<TileImage<P>> {
        match self {
            Self::HardPaste => {
                check_source(original, grid)?;
                Ok(merge(grid))
            }
            Self::Feathered => merge_feathered(original, grid),
        }
    }
}

/// A fully opaque black tile of the given size.
#[must_use]
pub fn placeholder<P: TilePixel>(width: u32, height: u32) -> TileImage<P> {
    TileImage::from_pixel(width, height, P::placeholder())
}

fn tile_content<P: TilePixel>(tile: &Tile<P>) -> Cow<'_, TileImage<P>> {
    if let Some(img) = tile.valid_image() {
        return Cow::Borrowed(img);
    }
    match tile.image() {
        Some(img) => tracing::warn!(
            row = tile.row(),
            col = tile.col(),
            "replacement tile is {}x{}, expected {}x{}; using placeholder",
            img.width(),
            img.height(),
            tile.width(),
            tile.height()
        ),
        None => tracing::warn!(
            row = tile.row(),
            col = tile.col(),
            "tile slot was never filled; using placeholder"
        ),
    }
    Cow::Owned(placeholder(tile.width(), tile.height()))
}

fn check_source<P: TilePixel>(original: &TileImage<P>, grid: &Grid<P>) -> Result<()> {
    let (actual_width, actual_height) = original.dimensions();
    if (actual_width, actual_height) != (grid.source_width(), grid.source_height()) {
        return Err(Error::DimensionMismatch {
            expected_width: grid.source_width(),
            expected_height: grid.source_height(),
            actual_width,
            actual_height,
        });
    }
    Ok(())
}

/// Paste every tile at its offsets onto a blank canvas of the source size.
#[must_use]
pub fn merge<P: TilePixel>(grid: &Grid<P>) -> TileImage<P> {
    let mut canvas = TileImage::new(grid.source_width(), grid.source_height());
    for tile in grid.tiles() {
        let content = tile_content(tile);
        imageops::replace(
            &mut canvas,
            &*content,
            i64::from(tile.x_offset()),
            i64::from(tile.y_offset()),
        );
    }
    canvas
}

/// Composite every tile over `original` using a feathered blend mask.
///
/// The mask is built once from the grid's tile size and overlap and shared by
/// all tiles. Compositing runs on an RGBA copy of `original` and the result
/// is converted back to `P`.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if `original` differs in size from
/// the grid's source.
pub fn merge_feathered<P: TilePixel>(
    original: &TileImage<P>,
    grid: &Grid<P>,
) -> Result<TileImage<P>> {
    check_source(original, grid)?;

    let mask = BlendMask::new(grid.tile_width(), grid.tile_height(), grid.overlap());
    tracing::debug!(bands = mask.bands(), "built blend mask");

    let mut canvas = blending::to_rgba_canvas(original);
    for tile in grid.tiles() {
        let content = tile_content(tile);
        blending::composite_masked(
            &mut canvas,
            &*content,
            &mask,
            tile.x_offset(),
            tile.y_offset(),
        );
    }

    Ok(blending::from_rgba_canvas(&canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::split;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x ^ y) % 256) as u8])
        })
    }

    #[test]
    fn hard_paste_round_trip_is_identity() {
        let img = gradient(100, 100);
        let grid = split(&img, 64, 64, 16).unwrap();
        assert_eq!(merge(&grid), img);
    }

    #[test]
    fn later_tile_wins_overlap() {
        let img = gradient(100, 40);
        let mut grid = split(&img, 64, 40, 16).unwrap();
        grid.tile_mut(0, 0)
            .unwrap()
            .set_image(RgbImage::from_pixel(64, 40, Rgb([255, 0, 0])));
        grid.tile_mut(0, 1)
            .unwrap()
            .set_image(RgbImage::from_pixel(64, 40, Rgb([0, 0, 255])));

        let out = merge(&grid);
        // Second column starts at 36
        assert_eq!(*out.get_pixel(35, 10), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(36, 10), Rgb([0, 0, 255]));
        assert_eq!(*out.get_pixel(63, 10), Rgb([0, 0, 255]));
    }

    #[test]
    fn wrong_size_tile_becomes_placeholder() {
        let img = RgbImage::from_pixel(128, 128, Rgb([9, 9, 9]));
        let mut grid = split(&img, 64, 64, 0).unwrap();
        grid.tile_mut(1, 1).unwrap().set_image(RgbImage::new(10, 10));

        let out = merge(&grid);
        assert_eq!(out.dimensions(), (128, 128));
        assert_eq!(*out.get_pixel(100, 100), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(10, 10), Rgb([9, 9, 9]));
    }

    #[test]
    fn empty_slot_becomes_opaque_placeholder() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([5, 6, 7, 8]));
        let mut grid = split(&img, 32, 32, 0).unwrap();
        grid.tile_mut(0, 0).unwrap().take_image();

        let out = merge(&grid);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(40, 40), Rgba([5, 6, 7, 8]));
    }

    #[test]
    fn feathered_without_overlap_matches_hard_paste() {
        let img = gradient(128, 128);
        let mut grid = split(&img, 64, 64, 0).unwrap();
        for tile in grid.tiles_mut() {
            let mut data = tile.take_image().unwrap();
            imageops::colorops::invert(&mut data);
            tile.set_image(data);
        }

        let hard = merge(&grid);
        let feathered = merge_feathered(&img, &grid).unwrap();
        assert_eq!(hard, feathered);
    }

    #[test]
    fn feathered_untouched_tiles_reproduce_original() {
        let img = gradient(150, 90);
        let grid = split(&img, 64, 48, 16).unwrap();
        assert_eq!(merge_feathered(&img, &grid).unwrap(), img);
    }

    #[test]
    fn feathered_blends_seams_between_neighbours() {
        let img = RgbImage::from_pixel(96, 64, Rgb([0, 0, 0]));
        let mut grid = split(&img, 64, 64, 32).unwrap();
        for tile in grid.tiles_mut() {
            tile.set_image(RgbImage::from_pixel(64, 64, Rgb([200, 200, 200])));
        }

        let out = merge_feathered(&img, &grid).unwrap();
        // Image border keeps the original, tile cores show the tile
        assert_eq!(*out.get_pixel(0, 32), Rgb([0, 0, 0]));
        let edge = out.get_pixel(2, 32)[0];
        let inner = out.get_pixel(20, 32)[0];
        assert!(edge < inner, "edge {edge} inner {inner}");
        assert!(inner <= 200);
    }

    #[test]
    fn feathered_rejects_mismatched_original() {
        let img = gradient(64, 64);
        let grid = split(&img, 32, 32, 8).unwrap();
        assert!(matches!(
            merge_feathered(&gradient(60, 64), &grid),
            Err(Error::DimensionMismatch { actual_width: 60, .. })
        ));
        assert!(MergeStrategy::HardPaste
            .merge(&gradient(64, 10), &grid)
            .is_err());
    }

    #[test]
    fn strategy_dispatch_selects_merger() {
        let img = gradient(80, 80);
        let grid = split(&img, 48, 48, 8).unwrap();
        assert_eq!(MergeStrategy::default(), MergeStrategy::Feathered);
        assert_eq!(MergeStrategy::HardPaste.merge(&img, &grid).unwrap(), img);
        assert_eq!(MergeStrategy::Feathered.merge(&img, &grid).unwrap(), img);
    }
}
