//! Partition an image into a grid of overlapping tiles.
//!
//! Tiles advance by `tile - overlap` along each axis. The last tile of every
//! row and column is pinned to the image edge, so every tile of a grid has the
//! same size and no tile ever extends past the source.

use image::imageops;

use crate::blending::{TileImage, TilePixel};
use crate::error::{Error, Result};

/// One rectangular crop of the source image plus its placement.
///
/// Geometry is fixed at split time. The pixel buffer can be taken out for
/// transformation and put back with [`Tile::set_image`].
#[derive(Debug, Clone)]
pub struct Tile<P: TilePixel> {
    row: usize,
    col: usize,
    x_offset: u32,
    y_offset: u32,
    width: u32,
    height: u32,
    image: Option<TileImage<P>>,
}

impl<P: TilePixel> Tile<P> {
    /// Row index within the grid.
    #[must_use]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Column index within the row.
    #[must_use]
    pub fn col(&self) -> usize {
        self.col
    }

    /// Left edge in source coordinates.
    #[must_use]
    pub fn x_offset(&self) -> u32 {
        self.x_offset
    }

    /// Top edge in source coordinates.
    #[must_use]
    pub fn y_offset(&self) -> u32 {
        self.y_offset
    }

    /// Declared tile width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Declared tile height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The current pixel buffer, if the slot is filled.
    #[must_use]
    pub fn image(&self) -> Option<&TileImage<P>> {
        self.image.as_ref()
    }

    /// Take the pixel buffer out, leaving the slot empty.
    pub fn take_image(&mut self) -> Option<TileImage<P>> {
        self.image.take()
    }

    /// Fill the slot with a replacement buffer, returning the previous one.
    ///
    /// The buffer is accepted even when its size differs from the tile;
    /// merging substitutes a placeholder for such slots.
    pub fn set_image(&mut self, image: TileImage<P>) -> Option<TileImage<P>> {
        self.image.replace(image)
    }

    /// The pixel buffer, but only if it matches the declared geometry.
    #[must_use]
    pub fn valid_image(&self) -> Option<&TileImage<P>> {
        self.image
            .as_ref()
            .filter(|img| img.dimensions() == (self.width, self.height))
    }
}

/// A borrowed view of one grid row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a, P: TilePixel> {
    /// Row index.
    pub index: usize,
    /// Top edge of every tile in the row.
    pub y_offset: u32,
    /// Height of every tile in the row.
    pub height: u32,
    /// Tiles ordered by column index.
    pub tiles: &'a [Tile<P>],
}

/// Overlapping tiles covering one source image.
///
/// Tiles live in a row-major arena and are addressed by `(row, col)`.
#[derive(Debug, Clone)]
pub struct Grid<P: TilePixel> {
    source_width: u32,
    source_height: u32,
    tile_width: u32,
    tile_height: u32,
    overlap: u32,
    col_offsets: Vec<u32>,
    row_offsets: Vec<u32>,
    tiles: Vec<Tile<P>>,
}

impl<P: TilePixel> Grid<P> {
    /// Width of the split source image.
    #[must_use]
    pub fn source_width(&self) -> u32 {
        self.source_width
    }

    /// Height of the split source image.
    #[must_use]
    pub fn source_height(&self) -> u32 {
        self.source_height
    }

    /// Effective tile width (clamped to the source width).
    #[must_use]
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Effective tile height (clamped to the source height).
    #[must_use]
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Nominal overlap between neighbouring tiles.
    #[must_use]
    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Number of tile rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_offsets.len()
    }

    /// Number of tiles per row.
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.col_offsets.len()
    }

    /// Total number of tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Left edges of the columns, in order.
    #[must_use]
    pub fn col_offsets(&self) -> &[u32] {
        &self.col_offsets
    }

    /// Top edges of the rows, in order.
    #[must_use]
    pub fn row_offsets(&self) -> &[u32] {
        &self.row_offsets
    }

    /// All tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile<P>] {
        &self.tiles
    }

    /// All tiles in row-major order, mutably.
    pub fn tiles_mut(&mut self) -> &mut [Tile<P>] {
        &mut self.tiles
    }

    /// The tile at `(row, col)`.
    #[must_use]
    pub fn tile(&self, row: usize, col: usize) -> Option<&Tile<P>> {
        self.index_of(row, col).map(|i| &self.tiles[i])
    }

    /// The tile at `(row, col)`, mutably.
    pub fn tile_mut(&mut self, row: usize, col: usize) -> Option<&mut Tile<P>> {
        self.index_of(row, col).map(move |i| &mut self.tiles[i])
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_, P>> {
        let cols = self.col_count();
        self.row_offsets
            .iter()
            .zip(self.tiles.chunks(cols))
            .enumerate()
            .map(|(index, (&y_offset, tiles))| Row {
                index,
                y_offset,
                height: self.tile_height,
                tiles,
            })
    }

    fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.row_count() && col < self.col_count()).then(|| row * self.col_count() + col)
    }
}

/// Start offsets along one axis.
///
/// Offsets advance by `step` until a tile would reach the end of the axis;
/// that last tile is pinned to `source - tile`. A source no longer than one
/// tile yields the single offset `0`.
fn axis_offsets(source: u32, tile: u32, step: u32) -> Vec<u32> {
    if source <= tile {
        return vec![0];
    }

    let mut offsets = Vec::with_capacity((source - tile).div_ceil(step) as usize + 1);
    let mut pos = 0u32;
    loop {
        if pos + tile >= source {
            offsets.push(source - tile);
            break;
        }
        offsets.push(pos);
        pos += step;
    }
    offsets
}

/// Check split parameters before anything is allocated.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for a zero-sized tile or an overlap
/// that leaves no positive step.
pub fn validate_tiling(tile_width: u32, tile_height: u32, overlap: u32) -> Result<()> {
    if tile_width == 0 {
        return Err(Error::invalid("tile_width", "must be at least 1"));
    }
    if tile_height == 0 {
        return Err(Error::invalid("tile_height", "must be at least 1"));
    }
    let min_side = tile_width.min(tile_height);
    if overlap >= min_side {
        return Err(Error::invalid(
            "overlap",
            format!("{overlap} must be smaller than the smallest tile side ({min_side})"),
        ));
    }
    Ok(())
}

/// Split `image` into overlapping tiles of `tile_width x tile_height`.
///
/// Each tile owns an independent copy of its pixels, so tiles can be
/// transformed in any order or in parallel.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if the image is empty, a tile side is
/// zero, or `overlap >= min(tile_width, tile_height)`.
pub fn split<P: TilePixel>(
    image: &TileImage<P>,
    tile_width: u32,
    tile_height: u32,
    overlap: u32,
) -> Result<Grid<P>> {
    let (source_width, source_height) = image.dimensions();
    if source_width == 0 || source_height == 0 {
        return Err(Error::invalid(
            "image",
            format!("dimensions must be positive, got {source_width}x{source_height}"),
        ));
    }
    validate_tiling(tile_width, tile_height, overlap)?;

    let tile_w = tile_width.min(source_width);
    let tile_h = tile_height.min(source_height);
    let col_offsets = axis_offsets(source_width, tile_w, tile_width - overlap);
    let row_offsets = axis_offsets(source_height, tile_h, tile_height - overlap);

    let mut tiles = Vec::with_capacity(row_offsets.len() * col_offsets.len());
    for (row, &y) in row_offsets.iter().enumerate() {
        for (col, &x) in col_offsets.iter().enumerate() {
            tiles.push(Tile {
                row,
                col,
                x_offset: x,
                y_offset: y,
                width: tile_w,
                height: tile_h,
                image: Some(imageops::crop_imm(image, x, y, tile_w, tile_h).to_image()),
            });
        }
    }

    tracing::debug!(
        source = %format!("{source_width}x{source_height}"),
        tile = %format!("{tile_w}x{tile_h}"),
        overlap,
        cols = col_offsets.len(),
        rows = row_offsets.len(),
        "split image into grid"
    );

    Ok(Grid {
        source_width,
        source_height,
        tile_width: tile_w,
        tile_height: tile_h,
        overlap,
        col_offsets,
        row_offsets,
        tiles,
    })
}
