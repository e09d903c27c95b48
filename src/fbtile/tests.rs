use rand::prelude::*;

use super::{
    check_pixel_formats, detile, detile_parallel, frame_copy, layout_from_drm_modifier, tile,
    tile_parallel, Frame, FrameCopyStatus, PixelFormat, TileLayout, WalkMode,
    DRM_FORMAT_MOD_LINEAR, I915_FORMAT_MOD_X_TILED, I915_FORMAT_MOD_YF_TILED,
    I915_FORMAT_MOD_Y_TILED,
};

const TILED_LAYOUTS: [TileLayout; 3] = [TileLayout::IntelX, TileLayout::IntelY, TileLayout::IntelYf];

/// 各ピクセルに自分の座標を書き込んだ線形フレーム.
fn coordinate_frame(width: usize, height: usize) -> Frame {
    let mut frame = Frame::new(width, height, PixelFormat::Rgba);
    let line = frame.line_size();
    for y in 0..height {
        for x in 0..width {
            let p = y * line + x * 4;
            frame.data_mut()[p..p + 4].copy_from_slice(&encode(x, y));
        }
    }
    frame
}

fn encode(x: usize, y: usize) -> [u8; 4] {
    [x as u8, (x >> 8) as u8, y as u8, (y >> 8) as u8]
}

fn decode(pixel: &[u8]) -> (usize, usize) {
    (
        pixel[0] as usize | (pixel[1] as usize) << 8,
        pixel[2] as usize | (pixel[3] as usize) << 8,
    )
}

fn tiled_pixels(layout: TileLayout, width: usize, height: usize) -> Vec<(usize, usize)> {
    let src = coordinate_frame(width, height);
    let mut dst = Frame::new(width, height, PixelFormat::Rgba);
    let status = frame_copy(&mut dst, layout, &src, TileLayout::Linear, WalkMode::Serial).unwrap();
    assert_eq!(status, FrameCopyStatus::TileCopy);
    dst.data().chunks(4).map(decode).collect()
}

#[test]
fn drm_modifiers() {
    assert_eq!(DRM_FORMAT_MOD_LINEAR, 0);
    assert_eq!(I915_FORMAT_MOD_X_TILED, 0x0100_0000_0000_0001);
    assert_eq!(layout_from_drm_modifier(0), Some(TileLayout::Linear));
    assert_eq!(
        layout_from_drm_modifier(I915_FORMAT_MOD_X_TILED),
        Some(TileLayout::IntelX)
    );
    assert_eq!(
        layout_from_drm_modifier(I915_FORMAT_MOD_Y_TILED),
        Some(TileLayout::IntelY)
    );
    assert_eq!(
        layout_from_drm_modifier(I915_FORMAT_MOD_YF_TILED),
        Some(TileLayout::IntelYf)
    );
    assert_eq!(layout_from_drm_modifier(0x0100_0000_0000_0004), None);
}

#[test]
fn pixel_formats() {
    assert!(check_pixel_formats(PixelFormat::Bgra, PixelFormat::Rgb0).is_ok());
    assert!(check_pixel_formats(PixelFormat::Rgb24, PixelFormat::Rgba).is_err());
    assert!(check_pixel_formats(PixelFormat::Abgr, PixelFormat::Rgb24).is_err());
}

#[test]
fn tile_x_is_row_segments() {
    let (width, height) = (256, 16);
    let pixels = tiled_pixels(TileLayout::IntelX, width, height);

    // 128x8 のタイルが左上から行ごとに並ぶ
    for (i, &pos) in pixels.iter().enumerate() {
        let (tile, within) = (i / 1024, i % 1024);
        let tiles_per_row = width / 128;
        let expected = (
            tile % tiles_per_row * 128 + within % 128,
            tile / tiles_per_row * 8 + within / 128,
        );
        assert_eq!(pos, expected, "index: {}", i);
    }
}

#[test]
fn tile_y_is_column_strips() {
    let (width, height) = (64, 64);
    let pixels = tiled_pixels(TileLayout::IntelY, width, height);

    // 4x32 のサブタイルが横に 8 つ並んで 32x32 のタイルになる
    for (i, &pos) in pixels.iter().enumerate() {
        let (sub_tile, within) = (i / 128, i % 128);
        let strips_per_row = width / 4;
        let expected = (
            sub_tile % strips_per_row * 4 + within % 4,
            sub_tile / strips_per_row * 32 + within / 4,
        );
        assert_eq!(pos, expected, "index: {}", i);
    }
}

#[test]
fn tile_yf_sub_tile_origins() {
    let (width, height) = (64, 64);
    let pixels = tiled_pixels(TileLayout::IntelYf, width, height);

    // サブタイルは 4x8 = 32 ピクセル
    let origin = |s: usize| pixels[s * 32];
    let expected = [
        (0, 0),
        (4, 0),
        (0, 8),
        (4, 8),
        (8, 0),
        (12, 0),
        (8, 8),
        (12, 8),
        (0, 16),
    ];
    for (s, &e) in expected.iter().enumerate() {
        assert_eq!(origin(s), e, "sub tile: {}", s);
    }
    // 2 つ目のタイルとタイルの 2 行目
    assert_eq!(origin(32), (32, 0));
    assert_eq!(origin(64), (0, 32));

    // サブタイルの中は 4 ピクセルずつの行
    assert_eq!(pixels[1], (1, 0));
    assert_eq!(pixels[4], (0, 1));
}

#[test]
fn round_trip_random_frames() {
    // fixed rng for stabilize test results
    let mut rng = StdRng::seed_from_u64(0);
    let (width, height) = (256, 96);
    let linear_line = width * 4 + 40;

    for layout in TILED_LAYOUTS {
        let walk = layout.walk().unwrap();

        let mut linear = vec![0u8; linear_line * height];
        rng.fill(&mut linear[..]);

        let mut tiled = vec![0u8; width * height * 4];
        tile(&walk, width, height, &linear, linear_line, &mut tiled).unwrap();

        let mut tiled_par = vec![0u8; width * height * 4];
        tile_parallel(&walk, width, height, &linear, linear_line, &mut tiled_par).unwrap();
        assert_eq!(tiled, tiled_par, "{:?}", layout);

        let mut back = vec![0u8; linear_line * height];
        detile(&walk, width, height, &tiled, &mut back, linear_line).unwrap();
        let mut back_par = vec![0u8; linear_line * height];
        detile_parallel(&walk, width, height, &tiled, &mut back_par, linear_line).unwrap();
        assert_eq!(back, back_par, "{:?}", layout);

        // 行末の余白には触れない
        for y in 0..height {
            let row = y * linear_line..y * linear_line + width * 4;
            assert_eq!(back[row.clone()], linear[row], "{:?} row {}", layout, y);
            assert!(back[y * linear_line + width * 4..(y + 1) * linear_line]
                .iter()
                .all(|&b| b == 0));
        }
    }
}

#[test]
fn frame_copy_round_trip() {
    let src = coordinate_frame(256, 64);

    for layout in TILED_LAYOUTS {
        for mode in [WalkMode::Serial, WalkMode::Parallel] {
            let mut tiled = Frame::new(256, 64, PixelFormat::Rgba);
            let status = frame_copy(&mut tiled, layout, &src, TileLayout::Linear, mode).unwrap();
            assert_eq!(status, FrameCopyStatus::TileCopy);
            assert_ne!(tiled, src);

            let mut back = Frame::new(256, 64, PixelFormat::Rgba);
            let status = frame_copy(&mut back, TileLayout::Linear, &tiled, layout, mode).unwrap();
            assert_eq!(status, FrameCopyStatus::TileCopy);
            assert_eq!(back, src, "{:?} {:?}", layout, mode);
        }
    }
}

#[test]
fn frame_copy_falls_back_to_plain_copy() {
    let src = coordinate_frame(128, 32);

    // 両方とも線形
    let mut dst = Frame::new(128, 32, PixelFormat::Rgba);
    let status = frame_copy(
        &mut dst,
        TileLayout::Linear,
        &src,
        TileLayout::Linear,
        WalkMode::Serial,
    )
    .unwrap();
    assert_eq!(status, FrameCopyStatus::CopyOnly);
    assert_eq!(dst, src);

    // 両方ともタイル
    let mut dst = Frame::new(128, 32, PixelFormat::Rgba);
    let status = frame_copy(
        &mut dst,
        TileLayout::IntelX,
        &src,
        TileLayout::IntelY,
        WalkMode::Serial,
    )
    .unwrap();
    assert_eq!(status, FrameCopyStatus::CopyOnly);
    assert_eq!(dst, src);

    // 幅がタイル幅の倍数でない
    let src = coordinate_frame(96, 32);
    let mut dst = Frame::new(96, 32, PixelFormat::Rgba);
    let status = frame_copy(
        &mut dst,
        TileLayout::IntelX,
        &src,
        TileLayout::Linear,
        WalkMode::Parallel,
    )
    .unwrap();
    assert_eq!(status, FrameCopyStatus::CopyOnly);
    assert_eq!(dst, src);
}

#[test]
fn frame_copy_rejects_size_mismatch() {
    let src = coordinate_frame(128, 32);
    let mut dst = Frame::new(128, 64, PixelFormat::Rgba);
    assert!(frame_copy(
        &mut dst,
        TileLayout::IntelX,
        &src,
        TileLayout::Linear,
        WalkMode::Serial
    )
    .is_err());
}

#[test]
fn height_is_truncated_to_whole_tiles() {
    let walk = TileLayout::IntelY.walk().unwrap();
    let (width, height) = (32, 40);
    let linear = (0..width * height * 4).map(|i| i as u8).collect::<Vec<_>>();

    let mut tiled = vec![0xaa; width * height * 4];
    tile(&walk, width, height, &linear, width * 4, &mut tiled).unwrap();

    // 32 行ぶんだけ並べ替え, 残りには触れない
    assert!(tiled[width * 32 * 4..].iter().all(|&b| b == 0xaa));
    assert_eq!(&tiled[..4], &linear[..4]);
    assert_eq!(&tiled[16..20], &linear[width * 4..width * 4 + 4]);
}

#[test]
fn rejects_bad_geometry() {
    let walk = TileLayout::IntelYf.walk().unwrap();

    let linear = vec![0; 48 * 32 * 4];
    let mut tiled = vec![0; 48 * 32 * 4];
    assert!(tile(&walk, 48, 32, &linear, 48 * 4, &mut tiled).is_err());

    let linear = vec![0; 64 * 32 * 4];
    let mut short = vec![0; 64 * 31 * 4];
    assert!(tile(&walk, 64, 32, &linear, 64 * 4, &mut short).is_err());
    assert!(tile(&walk, 64, 32, &linear, 60 * 4, &mut tiled).is_err());
}

#[test]
fn frame_rgba_image_drops_padding() {
    let mut data = vec![0u8; 2 * 12];
    data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    data[12..20].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
    let frame = Frame::from_data(2, 2, PixelFormat::Rgba, 12, data).unwrap();

    let image = frame.to_rgba_image().unwrap();
    assert_eq!(image.into_raw(), (1..=16).collect::<Vec<u8>>());

    assert!(Frame::from_data(4, 2, PixelFormat::Rgba, 12, vec![0; 24]).is_err());
    assert!(Frame::from_data(2, 3, PixelFormat::Rgba, 12, vec![0; 24]).is_err());
}

#[test]
fn parallel_truncates_height_like_serial() {
    let (width, height) = (64, 72);
    let linear = (0..width * height * 4).map(|i| (i * 7) as u8).collect::<Vec<_>>();

    for layout in TILED_LAYOUTS {
        let walk = layout.walk().unwrap();
        let usable = height / walk.tile_height * walk.tile_height;

        let mut tiled = vec![0xaa; width * height * 4];
        tile(&walk, width, height, &linear, width * 4, &mut tiled).unwrap();
        let mut tiled_par = vec![0xaa; width * height * 4];
        tile_parallel(&walk, width, height, &linear, width * 4, &mut tiled_par).unwrap();
        assert_eq!(tiled, tiled_par, "{:?}", layout);
        assert!(tiled_par[width * usable * 4..].iter().all(|&b| b == 0xaa));

        let mut back = vec![0x55; width * height * 4];
        detile_parallel(&walk, width, height, &tiled_par, &mut back, width * 4).unwrap();
        assert_eq!(
            back[..width * usable * 4],
            linear[..width * usable * 4],
            "{:?}",
            layout
        );
        assert!(back[width * usable * 4..].iter().all(|&b| b == 0x55));
    }
}

#[test]
fn frame_saves_as_png_regardless_of_extension() {
    let frame = coordinate_frame(16, 4);
    let path = std::env::temp_dir().join(format!("tile_probe_frame_{}.jpg", std::process::id()));

    frame.save_png(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let loaded = image::open(&path).unwrap().to_rgba8();
    std::fs::remove_file(&path).ok();

    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(loaded.into_raw(), frame.data());
}
