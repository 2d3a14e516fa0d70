//! Split an image, blur every tile independently, and merge it back.
//!
//! Usage:
//! ```sh
//! cargo run --example tile_image -- input.png output.png
//! ```

use std::env;
use std::process;

use seamless_tiles::{BuiltinTransform, MergeStrategy, TileContext, TileEngine, TileOptions};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output>", args[0]);
        process::exit(1);
    }

    let img = match image::open(&args[1]) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let engine = TileEngine::new(TileOptions {
        tile_width: 256,
        tile_height: 256,
        overlap: 32,
        strategy: MergeStrategy::Feathered,
        ..TileOptions::default()
    })
    .expect("valid options");

    // Tiles in odd columns get a stronger blur so the feathering has seams to hide
    let blur = |tile: &image::RgbImage, ctx: &TileContext| {
        let sigma = if ctx.col % 2 == 0 { 1.0 } else { 3.0 };
        BuiltinTransform::Blur(sigma).apply(tile)
    };

    match engine.process(&img, &blur) {
        Ok(out) => {
            if let Err(e) = out.save(&args[2]) {
                eprintln!("Error: {e}");
                process::exit(1);
            }
            println!("Done: {}", args[2]);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
