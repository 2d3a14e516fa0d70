use image::{Rgb, RgbImage, Rgba, RgbaImage};
use seamless_tiles::{
    merge, merge_feathered, split, BlendMask, BuiltinTransform, Error, MergeStrategy, TileContext,
    TileEngine, TileOptions,
};

fn noise(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
        let [a, b, c, _] = v.to_le_bytes();
        Rgb([a, b, c])
    })
}

#[test]
fn tiles_cover_every_pixel() {
    let cases = [
        (100, 100, 64, 64, 16),
        (129, 77, 32, 16, 5),
        (10, 300, 64, 64, 8),
        (1, 1, 1, 1, 0),
        (513, 257, 128, 64, 63),
    ];
    for (w, h, tw, th, overlap) in cases {
        let grid = split(&RgbImage::new(w, h), tw, th, overlap).unwrap();
        let mut hits = vec![0u32; (w * h) as usize];
        for tile in grid.tiles() {
            assert!(tile.x_offset() + tile.width() <= w);
            assert!(tile.y_offset() + tile.height() <= h);
            for y in tile.y_offset()..tile.y_offset() + tile.height() {
                for x in tile.x_offset()..tile.x_offset() + tile.width() {
                    hits[(y * w + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&n| n > 0), "gap in {w}x{h} / {tw}x{th} / {overlap}");
    }
}

#[test]
fn hard_paste_reproduces_source_exactly() {
    for (w, h) in [(100, 100), (257, 100), (64, 64), (33, 200)] {
        let img = noise(w, h);
        let grid = split(&img, 64, 48, 16).unwrap();
        assert_eq!(merge(&grid), img, "{w}x{h}");
    }
}

#[test]
fn last_row_and_column_pin_to_edge() {
    let grid = split(&RgbImage::new(100, 100), 64, 64, 16).unwrap();
    assert_eq!(grid.col_offsets(), &[0, 36]);
    assert_eq!(grid.row_offsets(), &[0, 36]);
    assert!(grid.tiles().iter().all(|t| t.width() == 64 && t.height() == 64));
}

#[test]
fn zero_overlap_gives_four_disjoint_tiles() {
    let img = noise(128, 128);
    let mut grid = split(&img, 64, 64, 0).unwrap();

    let offsets: Vec<_> = grid
        .tiles()
        .iter()
        .map(|t| (t.x_offset(), t.y_offset()))
        .collect();
    assert_eq!(offsets, vec![(0, 0), (64, 0), (0, 64), (64, 64)]);

    for tile in grid.tiles_mut() {
        let data = tile.take_image().unwrap();
        tile.set_image(BuiltinTransform::Brighten(40).apply(&data));
    }
    assert_eq!(merge(&grid), merge_feathered(&img, &grid).unwrap());
}

#[test]
fn wrong_size_replacement_still_merges() {
    let img = noise(100, 100);
    let mut grid = split(&img, 64, 64, 16).unwrap();
    grid.tile_mut(0, 1).unwrap().set_image(RgbImage::new(12, 5));

    let hard = merge(&grid);
    assert_eq!(hard.dimensions(), (100, 100));
    let feathered = merge_feathered(&img, &grid).unwrap();
    assert_eq!(feathered.dimensions(), (100, 100));
}

#[test]
fn blend_mask_never_decreases_toward_center() {
    for (w, h, overlap) in [(64, 64, 16), (48, 96, 8), (17, 9, 3), (512, 512, 64)] {
        let mask = BlendMask::new(w, h, overlap);
        let (cx, cy) = (w / 2, h / 2);
        let samples = [
            (0..=cx).map(|x| mask.opacity(x, cy)).collect::<Vec<_>>(),
            (cx..w).rev().map(|x| mask.opacity(x, cy)).collect(),
            (0..=cy).map(|y| mask.opacity(cx, y)).collect(),
            (cy..h).rev().map(|y| mask.opacity(cx, y)).collect(),
        ];
        for line in samples {
            assert_eq!(line.first(), Some(&0));
            assert!(line.windows(2).all(|p| p[0] <= p[1]));
        }
        assert_eq!(mask.opacity(cx, cy), 255);
    }
}

#[test]
fn invalid_parameters_fail_fast() {
    let img = RgbImage::new(50, 50);
    assert!(matches!(
        split(&img, 32, 32, 32),
        Err(Error::InvalidParameter { .. })
    ));
    assert!(matches!(
        split(&img, 32, 8, 8),
        Err(Error::InvalidParameter { .. })
    ));
    assert!(TileEngine::new(TileOptions {
        tile_height: 0,
        ..TileOptions::default()
    })
    .is_err());
}

#[test]
fn rgba_images_merge_in_their_own_layout() {
    let img = RgbaImage::from_fn(80, 60, |x, y| Rgba([x as u8, y as u8, 9, 200]));
    let grid = split(&img, 32, 32, 8).unwrap();
    assert_eq!(merge(&grid), img);
    assert_eq!(merge_feathered(&img, &grid).unwrap(), img);
}

#[test]
fn engine_transforms_every_tile_once() {
    let engine = TileEngine::new(TileOptions {
        tile_width: 64,
        tile_height: 64,
        overlap: 16,
        strategy: MergeStrategy::HardPaste,
        batch_size: 2,
        ..TileOptions::default()
    })
    .unwrap();

    let seen = std::sync::Mutex::new(Vec::new());
    let record = |tile: &RgbImage, ctx: &TileContext| {
        seen.lock().unwrap().push((ctx.row, ctx.col));
        tile.clone()
    };

    let img = noise(150, 100);
    let out = engine.process(&img, &record).unwrap();
    assert_eq!(out, img);

    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
}

#[test]
fn feathered_engine_hides_per_tile_brightness_drift() {
    let engine = TileEngine::new(TileOptions {
        tile_width: 64,
        tile_height: 64,
        overlap: 16,
        ..TileOptions::default()
    })
    .unwrap();
    let img = RgbImage::from_pixel(112, 64, Rgb([100, 100, 100]));

    // Alternate tiles drift in brightness, as a generative transform might
    let drift = |tile: &RgbImage, ctx: &TileContext| {
        let offset = if ctx.col % 2 == 0 { 60 } else { -60 };
        BuiltinTransform::Brighten(offset).apply(tile)
    };
    let out = engine.process(&img, &drift).unwrap();
    let hard = TileEngine::new(TileOptions {
        strategy: MergeStrategy::HardPaste,
        ..engine.options().clone()
    })
    .unwrap()
    .process(&img, &drift)
    .unwrap();

    // The hard seam is a single-pixel jump; feathering spreads it out
    let step = |im: &RgbImage, x: u32| {
        (i32::from(im.get_pixel(x + 1, 32)[0]) - i32::from(im.get_pixel(x, 32)[0])).abs()
    };
    let hard_max = (20..90).map(|x| step(&hard, x)).max().unwrap();
    let soft_max = (20..90).map(|x| step(&out, x)).max().unwrap();
    assert_eq!(hard_max, 120);
    assert!(soft_max < hard_max / 2, "soft {soft_max} hard {hard_max}");
}
