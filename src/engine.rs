//! Split → transform → merge orchestration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, Rgba};

use crate::blending::{TileImage, TilePixel};
use crate::error::{Error, Result};
use crate::grid::{self, Grid};
use crate::merge::MergeStrategy;
use crate::transform::{TileContext, TileTransform};

/// Options controlling tiling and merging.
#[derive(Debug, Clone)]
pub struct TileOptions {
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Pixels shared by neighbouring tiles.
    pub overlap: u32,
    /// How transformed tiles are recombined.
    pub strategy: MergeStrategy,
    /// Integer factor the source is upscaled by (Lanczos3) before splitting.
    pub scale_factor: u32,
    /// Number of tiles handed to the transform per call.
    pub batch_size: usize,
    /// Seed passed to the transform via [`TileContext::seed`].
    pub seed: u64,
    /// Reuse `seed` for every iteration instead of `seed + iteration`.
    pub fix_seed: bool,
    /// Passes [`TileEngine::process_file`] runs over each input.
    pub iterations: u32,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            tile_width: 512,
            tile_height: 512,
            overlap: 64,
            strategy: MergeStrategy::default(),
            scale_factor: 1,
            batch_size: 1,
            seed: 0,
            fix_seed: true,
            iterations: 1,
        }
    }
}

impl TileOptions {
    /// Check every option that can be checked without an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an invalid tiling or a zero
    /// scale factor, batch size or iteration count.
    pub fn validate(&self) -> Result<()> {
        grid::validate_tiling(self.tile_width, self.tile_height, self.overlap)?;
        if self.scale_factor == 0 {
            return Err(Error::invalid("scale_factor", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", "must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(Error::invalid("iterations", "must be at least 1"));
        }
        Ok(())
    }
}

/// Outcome of one transform stage over a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Slots holding a transform result of the tile's size.
    pub transformed: usize,
    /// Slots left empty or holding a wrong-size result; these merge as
    /// placeholders.
    pub missing: usize,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Number of tiles the image was split into.
    pub tile_count: usize,
    /// Number of tiles merged as placeholders.
    pub placeholders: usize,
    /// Human-readable status message.
    pub message: String,
}

struct Job<'a, P: TilePixel> {
    index: usize,
    image: &'a TileImage<P>,
    ctx: TileContext,
}

/// Runs the full tiling pipeline with a fixed set of options.
///
/// Create once with [`TileEngine::new()`] and reuse for multiple images.
#[derive(Debug, Clone)]
pub struct TileEngine {
    options: TileOptions,
}

impl TileEngine {
    /// Create an engine after validating `options`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the options are invalid.
    pub fn new(options: TileOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options this engine was built with.
    #[must_use]
    pub fn options(&self) -> &TileOptions {
        &self.options
    }

    /// Seed handed to the transform on the given iteration.
    #[must_use]
    pub fn seed_for(&self, iteration: u32) -> u64 {
        if self.options.fix_seed {
            self.options.seed
        } else {
            self.options.seed.wrapping_add(u64::from(iteration))
        }
    }

    /// Split `image` with the configured tile size and overlap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the image is empty.
    pub fn split<P: TilePixel>(&self, image: &TileImage<P>) -> Result<Grid<P>> {
        grid::split(
            image,
            self.options.tile_width,
            self.options.tile_height,
            self.options.overlap,
        )
    }

    /// Merge `grid` with the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `original` is not the image
    /// the grid was split from.
    pub fn merge<P: TilePixel>(
        &self,
        original: &TileImage<P>,
        grid: &Grid<P>,
    ) -> Result<TileImage<P>> {
        self.options.strategy.merge(original, grid)
    }

    /// Upscale `image` by the configured scale factor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the scaled size overflows `u32`.
    pub fn upscale<'a, P: TilePixel>(
        &self,
        image: &'a TileImage<P>,
    ) -> Result<Cow<'a, TileImage<P>>> {
        let factor = self.options.scale_factor;
        if factor <= 1 {
            return Ok(Cow::Borrowed(image));
        }
        let (w, h) = image.dimensions();
        let (Some(nw), Some(nh)) = (w.checked_mul(factor), h.checked_mul(factor)) else {
            return Err(Error::invalid(
                "scale_factor",
                format!("{w}x{h} scaled by {factor} overflows"),
            ));
        };
        tracing::debug!(factor, "upscaling {w}x{h} to {nw}x{nh}");
        Ok(Cow::Owned(imageops::resize(image, nw, nh, FilterType::Lanczos3)))
    }

    /// Replace every filled tile of `grid` with the transform's output.
    ///
    /// Tiles are sent in row-major batches of `batch_size`. Batches run in
    /// parallel when the `parallel` feature is enabled; all of them complete
    /// before this returns. Slots the transform produced nothing for are
    /// emptied so the merge substitutes placeholders; those and any
    /// wrong-size results are counted in [`TransformStats::missing`].
    pub fn transform_grid<P, T>(
        &self,
        grid: &mut Grid<P>,
        transform: &T,
        iteration: u32,
    ) -> TransformStats
    where
        P: TilePixel,
        T: TileTransform<P> + ?Sized,
    {
        let seed = self.seed_for(iteration);
        let tile_count = grid.tile_count();

        let results: Vec<Vec<(usize, TileImage<P>)>> = {
            let jobs: Vec<Job<'_, P>> = grid
                .tiles()
                .iter()
                .enumerate()
                .filter_map(|(index, tile)| {
                    tile.image().map(|image| Job {
                        index,
                        image,
                        ctx: TileContext {
                            row: tile.row(),
                            col: tile.col(),
                            index,
                            tile_count,
                            x_offset: tile.x_offset(),
                            y_offset: tile.y_offset(),
                            width: tile.width(),
                            height: tile.height(),
                            seed,
                            iteration,
                        },
                    })
                })
                .collect();
            let batches: Vec<&[Job<'_, P>]> = jobs.chunks(self.options.batch_size).collect();
            tracing::debug!(
                tiles = jobs.len(),
                batches = batches.len(),
                seed,
                iteration,
                "dispatching tile batches"
            );
            run_batches(transform, &batches)
        };

        let mut filled = vec![false; tile_count];
        let tiles = grid.tiles_mut();
        for (index, image) in results.into_iter().flatten() {
            tiles[index].set_image(image);
            filled[index] = true;
        }
        for (tile, done) in tiles.iter_mut().zip(&filled) {
            if !done {
                tile.take_image();
            }
        }

        // Wrong-size results stay in their slot but still merge as placeholders
        let transformed = tiles
            .iter()
            .filter(|tile| tile.valid_image().is_some())
            .count();
        TransformStats {
            transformed,
            missing: tile_count - transformed,
        }
    }

    fn run_pass<P, T>(
        &self,
        source: &TileImage<P>,
        transform: &T,
        iteration: u32,
    ) -> Result<(TileImage<P>, TransformStats)>
    where
        P: TilePixel,
        T: TileTransform<P> + ?Sized,
    {
        let mut grid = self.split(source)?;
        let stats = self.transform_grid(&mut grid, transform, iteration);
        if stats.missing > 0 {
            tracing::warn!(
                missing = stats.missing,
                total = grid.tile_count(),
                "merging with placeholder tiles"
            );
        }
        let merged = self.merge(source, &grid)?;
        Ok((merged, stats))
    }

    /// Upscale, split, transform every tile, and merge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the image is empty or cannot be
    /// upscaled.
    pub fn process<P, T>(&self, image: &TileImage<P>, transform: &T) -> Result<TileImage<P>>
    where
        P: TilePixel,
        T: TileTransform<P> + ?Sized,
    {
        let source = self.upscale(image)?;
        self.run_pass(&*source, transform, 0).map(|(merged, _)| merged)
    }

    /// Run the pipeline `count` times over the same source.
    ///
    /// Each pass gets a fresh grid and the seed from [`Self::seed_for`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the image is empty or cannot be
    /// upscaled.
    pub fn process_iterations<P, T>(
        &self,
        image: &TileImage<P>,
        count: u32,
        transform: &T,
    ) -> Result<Vec<TileImage<P>>>
    where
        P: TilePixel,
        T: TileTransform<P> + ?Sized,
    {
        let source = self.upscale(image)?;
        (0..count)
            .map(|iteration| {
                self.run_pass(&*source, transform, iteration)
                    .map(|(merged, _)| merged)
            })
            .collect()
    }

    /// Process a decoded image of any layout.
    ///
    /// Images with an alpha channel are processed as RGBA8, everything else
    /// as RGB8.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the image is empty or cannot be
    /// upscaled.
    pub fn process_dynamic<T>(
        &self,
        image: &DynamicImage,
        transform: &T,
    ) -> Result<(DynamicImage, TransformStats)>
    where
        T: TileTransform<Rgb<u8>> + TileTransform<Rgba<u8>> + ?Sized,
    {
        self.process_dynamic_pass(image, transform, 0)
    }

    fn process_dynamic_pass<T>(
        &self,
        image: &DynamicImage,
        transform: &T,
        iteration: u32,
    ) -> Result<(DynamicImage, TransformStats)>
    where
        T: TileTransform<Rgb<u8>> + TileTransform<Rgba<u8>> + ?Sized,
    {
        if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            let source = self.upscale(&rgba)?;
            let (merged, stats) = self.run_pass(&*source, transform, iteration)?;
            Ok((DynamicImage::ImageRgba8(merged), stats))
        } else {
            let rgb = image.to_rgb8();
            let source = self.upscale(&rgb)?;
            let (merged, stats) = self.run_pass(&*source, transform, iteration)?;
            Ok((DynamicImage::ImageRgb8(merged), stats))
        }
    }

    /// Process a single image file: load, tile, transform, merge, save.
    ///
    /// With more than one configured iteration, pass `n` is written to
    /// [`iteration_output_path`]`(output, n)`. `tile_count` and
    /// `placeholders` in the returned [`ProcessResult`] are summed over all
    /// passes.
    #[must_use]
    pub fn process_file<T>(&self, input: &Path, output: &Path, transform: &T) -> ProcessResult
    where
        T: TileTransform<Rgb<u8>> + TileTransform<Rgba<u8>> + ?Sized,
    {
        let mut result = ProcessResult {
            path: input.to_path_buf(),
            success: false,
            tile_count: 0,
            placeholders: 0,
            message: String::new(),
        };

        let dyn_img = match image::open(input) {
            Ok(img) => img,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };
        tracing::info!(
            "processing {} ({}x{})",
            input.display(),
            dyn_img.width(),
            dyn_img.height()
        );

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        let iterations = self.options.iterations;
        for iteration in 0..iterations {
            let (merged, stats) = match self.process_dynamic_pass(&dyn_img, transform, iteration) {
                Ok(out) => out,
                Err(e) => {
                    result.message = format!("Failed to process: {e}");
                    return result;
                }
            };
            result.tile_count += stats.transformed + stats.missing;
            result.placeholders += stats.missing;

            let target = if iterations > 1 {
                iteration_output_path(output, iteration)
            } else {
                output.to_path_buf()
            };
            if let Err(e) = save_image(&merged, &target) {
                result.message = format!("Failed to save {}: {e}", target.display());
                return result;
            }
        }

        result.success = true;
        result.message = if iterations > 1 {
            format!("Merged {} tiles over {iterations} passes", result.tile_count)
        } else {
            format!("Merged {} tiles", result.tile_count)
        };
        result
    }

    /// Process all supported images in a directory.
    ///
    /// Files are processed in parallel when the `parallel` feature is
    /// enabled. Returns a [`ProcessResult`] for each image found.
    #[must_use]
    pub fn process_directory<T>(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        transform: &T,
    ) -> Vec<ProcessResult>
    where
        T: TileTransform<Rgb<u8>> + TileTransform<Rgba<u8>> + ?Sized,
    {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![failure(input_dir, format!("Failed to read directory: {e}"))];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![failure(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let process = |input_path: &PathBuf| match input_path.file_name() {
            Some(filename) => self.process_file(input_path, &output_dir.join(filename), transform),
            None => failure(input_path, "Not a file".to_string()),
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            entries.iter().map(process).collect()
        }
    }
}

fn run_batches<P, T>(
    transform: &T,
    batches: &[&[Job<'_, P>]],
) -> Vec<Vec<(usize, TileImage<P>)>>
where
    P: TilePixel,
    T: TileTransform<P> + ?Sized,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        batches
            .par_iter()
            .map(|batch| run_batch(transform, batch))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        batches
            .iter()
            .map(|batch| run_batch(transform, batch))
            .collect()
    }
}

fn run_batch<P, T>(transform: &T, batch: &[Job<'_, P>]) -> Vec<(usize, TileImage<P>)>
where
    P: TilePixel,
    T: TileTransform<P> + ?Sized,
{
    let tiles: Vec<&TileImage<P>> = batch.iter().map(|job| job.image).collect();
    let contexts: Vec<TileContext> = batch.iter().map(|job| job.ctx).collect();
    let out = transform.transform_batch(&tiles, &contexts);
    if out.len() < batch.len() {
        tracing::warn!(
            expected = batch.len(),
            returned = out.len(),
            first_tile = batch.first().map_or(0, |job| job.index),
            "transform returned a short batch"
        );
    }
    batch.iter().map(|job| job.index).zip(out).collect()
}

fn failure(path: &Path, message: String) -> ProcessResult {
    ProcessResult {
        path: path.to_path_buf(),
        success: false,
        tile_count: 0,
        placeholders: 0,
        message,
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an image with format-specific quality settings.
///
/// JPEG output drops any alpha channel.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&DynamicImage::ImageRgb8(img.to_rgb8()))?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_tiled.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_tiled.{ext}"))
}

/// Output path of pass `iteration` when a file is processed repeatedly.
///
/// Example: `"out.png"`, pass 2 becomes `"out_2.png"`.
#[must_use]
pub fn iteration_output_path(output: &Path, iteration: u32) -> PathBuf {
    let stem = output.file_stem().unwrap_or_default().to_string_lossy();
    let name = match output.extension() {
        Some(ext) => format!("{stem}_{iteration}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{iteration}"),
    };
    output.with_file_name(name)
}
