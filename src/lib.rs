//! Split large images into overlapping tiles and merge them back seamlessly.
//!
//! An image is partitioned into a grid of equally sized tiles that overlap by
//! a fixed number of pixels. Each tile is handed to a caller-supplied
//! transform, and the results are recombined either by hard pasting or by
//! feathered alpha compositing that hides the seams between tiles.
//!
//! # Quick Start
//!
//! ```no_run
//! use seamless_tiles::{BuiltinTransform, TileEngine, TileOptions};
//!
//! let engine = TileEngine::new(TileOptions::default()).expect("valid options");
//! let img = image::open("photo.png").unwrap().to_rgb8();
//! let out = engine.process(&img, &BuiltinTransform::Blur(1.5)).unwrap();
//! out.save("photo_tiled.png").unwrap();
//! ```
//!
//! # Manual split and merge
//!
//! ```
//! use seamless_tiles::{merge, split};
//!
//! let img = image::RgbImage::new(100, 100);
//! let grid = split(&img, 64, 64, 16).unwrap();
//! assert_eq!(grid.col_offsets(), &[0, 36]);
//! assert_eq!(merge(&grid), img);
//! ```

#![deny(missing_docs)]

pub mod blending;
mod engine;
pub mod error;
pub mod grid;
pub mod merge;
pub mod transform;

pub use blending::{BlendMask, TileImage, TilePixel};
pub use engine::{
    default_output_path, is_supported_image, iteration_output_path, save_image, ProcessResult,
    TileEngine, TileOptions, TransformStats,
};
pub use error::{Error, Result};
pub use grid::{split, Grid, Row, Tile};
pub use merge::{merge, merge_feathered, MergeStrategy};
pub use transform::{BuiltinTransform, TileContext, TileTransform};
