//! フレームバッファの線形レイアウトと GPU のタイルレイアウトを CPU で相互に変換する.
//!
//! タイル側のデータは隙間なく詰まっているものとして扱う. 線形側は 1 行の末尾に余白があってもよい.

use std::path::Path;

use anyhow::{bail, ensure, Context as _, Result};
use easy_parallel::Parallel;
use image::ImageFormat;
use log::{debug, info, warn};

use crate::step::{StepRule, StepTable, TileWalker, Wrap};

#[cfg(test)]
mod tests;

pub const DRM_FORMAT_MOD_VENDOR_NONE: u64 = 0x00;
pub const DRM_FORMAT_MOD_VENDOR_INTEL: u64 = 0x01;

const fn fourcc_mod_code(vendor: u64, val: u64) -> u64 {
    (vendor << 56) | (val & 0x00ff_ffff_ffff_ffff)
}

pub const DRM_FORMAT_MOD_LINEAR: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_NONE, 0);
pub const I915_FORMAT_MOD_X_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 1);
pub const I915_FORMAT_MOD_Y_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 2);
pub const I915_FORMAT_MOD_YF_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 3);

/// 並列に変換するときの最大スレッド数.
const MAX_JOBS: usize = 8;

/// `TileOp` は線形からタイルへ (`Tile`) か, タイルから線形へ (`Detile`) かを表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileOp {
    Tile,
    Detile,
}

/// `TileLayout` はフレームバッファのメモリ上の並べ方を表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileLayout {
    Linear,
    IntelX,
    IntelY,
    IntelYf,
}

const TILE_YF_CHANGES: &[StepRule] = &[
    StepRule::new(8, 4, 0),
    StepRule::new(16, -4, 8),
    StepRule::new(32, 4, -8),
    StepRule::new(64, -12, 8),
    StepRule::new(128, 4, -24),
    StepRule::new(256, 4, -24),
];

const TILE_X_CHANGES: &[StepRule] = &[StepRule::new(8, 128, 0)];

const TILE_Y_CHANGES: &[StepRule] = &[StepRule::new(32, 4, 0), StepRule::new(256, 4, 0)];

impl TileLayout {
    /// タイルを走査する手順. `Linear` には手順がないので `None` を返す.
    pub fn walk(self) -> Option<LayoutWalk> {
        let (sub_tile, tile, changes) = match self {
            TileLayout::Linear => return None,
            TileLayout::IntelX => ((128, 8), (128, 8), TILE_X_CHANGES),
            TileLayout::IntelY => ((4, 32), (32, 32), TILE_Y_CHANGES),
            TileLayout::IntelYf => ((4, 8), (32, 32), TILE_YF_CHANGES),
        };

        Some(LayoutWalk {
            bytes_per_pixel: 4,
            sub_tile_width: sub_tile.0,
            sub_tile_height: sub_tile.1,
            tile_width: tile.0,
            tile_height: tile.1,
            changes: StepTable::from_static(changes),
        })
    }
}

/// DRM の format modifier に対応するレイアウトを返す. 知らない modifier なら `None`.
pub fn layout_from_drm_modifier(modifier: u64) -> Option<TileLayout> {
    let layout = match modifier {
        DRM_FORMAT_MOD_LINEAR => Some(TileLayout::Linear),
        I915_FORMAT_MOD_X_TILED => Some(TileLayout::IntelX),
        I915_FORMAT_MOD_Y_TILED => Some(TileLayout::IntelY),
        I915_FORMAT_MOD_YF_TILED => Some(TileLayout::IntelYf),
        _ => None,
    };
    debug!("drm modifier {:#018x} maps to {:?}", modifier, layout);
    layout
}

/// `LayoutWalk` はタイルの中をサブタイル単位で走査する手順を表す.
///
/// タイル側のバッファはサブタイルを順に詰めたもので, サブタイルの中は `sub_tile_width` ピクセルの行が
/// `sub_tile_height` 行並ぶ. `changes` はそれまでに走査したサブタイル行の数で引き,
/// 次のサブタイルの左上が線形側のどこにあるかを決める.
#[derive(Clone, Debug)]
pub struct LayoutWalk {
    pub bytes_per_pixel: usize,
    pub sub_tile_width: usize,
    pub sub_tile_height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub changes: StepTable<'static>,
}

impl LayoutWalk {
    /// 変換できる高さ. タイルの高さの倍数に切り詰める.
    fn usable_height(&self, height: usize) -> usize {
        let usable = height / self.tile_height * self.tile_height;
        if usable != height {
            info!(
                "limiting height [{}] to be a multiple of tile height [{}], new height [{}]",
                height, self.tile_height, usable
            );
        }
        usable
    }

    /// 大きさとバッファの長さを確かめ, 変換する高さを返す.
    fn check(
        &self,
        width: usize,
        height: usize,
        tiled_len: usize,
        linear_len: usize,
        linear_line: usize,
    ) -> Result<usize> {
        let bpp = self.bytes_per_pixel;

        ensure!(
            width % self.tile_width == 0,
            "width [{}] must be a multiple of tile width [{}]",
            width,
            self.tile_width
        );
        ensure!(
            linear_line >= width * bpp,
            "linear line size [{}] is smaller than width [{}] x {} bytes",
            linear_line,
            width,
            bpp
        );

        let height = self.usable_height(height);
        if height == 0 {
            return Ok(0);
        }

        ensure!(
            tiled_len >= width * height * bpp,
            "tiled buffer too small: {} < {}",
            tiled_len,
            width * height * bpp
        );
        ensure!(
            linear_len >= (height - 1) * linear_line + width * bpp,
            "linear buffer too small: {} bytes for {}x{} with line size {}",
            linear_len,
            width,
            height,
            linear_line
        );
        ensure!(
            width * height / self.sub_tile_width <= u32::MAX as usize,
            "frame too large to walk: {}x{}",
            width,
            height
        );

        Ok(height)
    }

    /// サブタイルの 1 行ごとに `copy(tiled_offset, linear_offset, len)` を呼ぶ.
    ///
    /// `height` はタイルの高さの倍数であること.
    fn for_each_row(
        &self,
        width: usize,
        height: usize,
        linear_line: usize,
        mut copy: impl FnMut(usize, usize, usize),
    ) -> Result<()> {
        let bpp = self.bytes_per_pixel;
        let row_len = self.sub_tile_width * bpp;
        let mut walker = TileWalker::new(
            &self.changes,
            Wrap {
                width: i32::try_from(width).context("frame width overflows i32")?,
                row_height: self.tile_height as i32,
            },
        );

        let lines = width * height / self.sub_tile_width;
        let mut line = 0;
        let mut tiled_offset = 0;

        while line < lines {
            let pos = walker.position();
            let x = usize::try_from(pos.x).context("tile walk left the frame")?;
            let y = usize::try_from(pos.y).context("tile walk left the frame")?;
            let linear_offset = y * linear_line + x * bpp;

            for k in 0..self.sub_tile_height {
                copy(
                    tiled_offset + k * row_len,
                    linear_offset + k * linear_line,
                    row_len,
                );
            }

            tiled_offset += self.sub_tile_height * row_len;
            line += self.sub_tile_height;
            walker.step(line as u32);
        }

        Ok(())
    }

    /// 並列に変換するときの 1 仕事あたりの行数. 常にタイルの高さの倍数.
    fn band_height(&self, height: usize) -> usize {
        let tile_rows = height / self.tile_height;
        let jobs = tile_rows.min(MAX_JOBS).max(1);
        (tile_rows + jobs - 1) / jobs * self.tile_height
    }
}

/// 線形の `linear` をタイルの `tiled` に並べ替える.
pub fn tile(
    walk: &LayoutWalk,
    width: usize,
    height: usize,
    linear: &[u8],
    linear_line: usize,
    tiled: &mut [u8],
) -> Result<()> {
    let height = walk.check(width, height, tiled.len(), linear.len(), linear_line)?;

    walk.for_each_row(width, height, linear_line, |t, l, len| {
        tiled[t..t + len].copy_from_slice(&linear[l..l + len]);
    })
}

/// タイルの `tiled` を線形の `linear` に並べ替える.
pub fn detile(
    walk: &LayoutWalk,
    width: usize,
    height: usize,
    tiled: &[u8],
    linear: &mut [u8],
    linear_line: usize,
) -> Result<()> {
    let height = walk.check(width, height, tiled.len(), linear.len(), linear_line)?;

    walk.for_each_row(width, height, linear_line, |t, l, len| {
        linear[l..l + len].copy_from_slice(&tiled[t..t + len]);
    })
}

/// `tile` と同じ結果を, タイル行の帯ごとに別スレッドで作る.
pub fn tile_parallel(
    walk: &LayoutWalk,
    width: usize,
    height: usize,
    linear: &[u8],
    linear_line: usize,
    tiled: &mut [u8],
) -> Result<()> {
    let height = walk.check(width, height, tiled.len(), linear.len(), linear_line)?;
    if height == 0 {
        return Ok(());
    }

    let band = walk.band_height(height);
    let tiled_band = width * band * walk.bytes_per_pixel;
    let bands = tiled[..width * height * walk.bytes_per_pixel]
        .chunks_mut(tiled_band)
        .zip(linear.chunks(band * linear_line));

    Parallel::new()
        .each(bands, move |(tiled, linear)| {
            let rows = tiled.len() / (width * walk.bytes_per_pixel);
            tile(walk, width, rows, linear, linear_line, tiled)
        })
        .run()
        .into_iter()
        .collect()
}

/// `detile` と同じ結果を, タイル行の帯ごとに別スレッドで作る.
pub fn detile_parallel(
    walk: &LayoutWalk,
    width: usize,
    height: usize,
    tiled: &[u8],
    linear: &mut [u8],
    linear_line: usize,
) -> Result<()> {
    let height = walk.check(width, height, tiled.len(), linear.len(), linear_line)?;
    if height == 0 {
        return Ok(());
    }

    let band = walk.band_height(height);
    let tiled_band = width * band * walk.bytes_per_pixel;
    let bands = tiled[..width * height * walk.bytes_per_pixel]
        .chunks(tiled_band)
        .zip(linear.chunks_mut(band * linear_line));

    Parallel::new()
        .each(bands, move |(tiled, linear)| {
            let rows = tiled.len() / (width * walk.bytes_per_pixel);
            detile(walk, width, rows, tiled, linear, linear_line)
        })
        .run()
        .into_iter()
        .collect()
}

/// `PixelFormat` はピクセルの並びを表す. タイル変換は 32 ビットの RGB 系だけに対応する.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb0,
    ZeroRgb,
    Bgr0,
    ZeroBgr,
    Rgba,
    Argb,
    Bgra,
    Abgr,
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            _ => 4,
        }
    }

    pub fn is_tileable(self) -> bool {
        !matches!(self, PixelFormat::Rgb24)
    }
}

pub fn check_pixel_formats(src: PixelFormat, dst: PixelFormat) -> Result<()> {
    ensure!(
        src.is_tileable() && dst.is_tileable(),
        "unsupported pixel formats for (de)tiling: src {:?}, dst {:?}",
        src,
        dst
    );
    Ok(())
}

/// `Frame` は 1 枚の画像のピクセルデータを表す. `line_size` は 1 行のバイト数で, 幅より長くてもよい.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    format: PixelFormat,
    line_size: usize,
    data: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("line_size", &self.line_size)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl Frame {
    /// 行の末尾に余白のない, 0 で埋めたフレームを作る.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let line_size = width * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            line_size,
            data: vec![0; line_size * height],
        }
    }

    pub fn from_data(
        width: usize,
        height: usize,
        format: PixelFormat,
        line_size: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        ensure!(
            line_size >= width * format.bytes_per_pixel(),
            "line size [{}] is smaller than width [{}]",
            line_size,
            width
        );
        ensure!(
            data.len() >= line_size * height,
            "frame data too small: {} < {}",
            data.len(),
            line_size * height
        );
        Ok(Self {
            width,
            height,
            format,
            line_size,
            data,
        })
    }

    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        Self {
            width,
            height,
            format: PixelFormat::Rgba,
            line_size: width * 4,
            data: image.into_raw(),
        }
    }

    /// RGBA として解釈した画像を作る. 行の余白は取り除く.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        ensure!(
            self.format.bytes_per_pixel() == 4,
            "{:?} frame cannot be viewed as RGBA",
            self.format
        );

        let mut raw = Vec::with_capacity(self.width * self.height * 4);
        for y in 0..self.height {
            raw.extend_from_slice(self.row(y));
        }

        image::RgbaImage::from_raw(self.width as u32, self.height as u32, raw)
            .context("frame size does not fit in an image")
    }

    /// RGBA の PNG として `path` に書き出す. 拡張子は見ない.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_rgba_image()?
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to save {}", path.display()))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn line_size(&self) -> usize {
        self.line_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.line_size;
        &self.data[start..start + self.width * self.format.bytes_per_pixel()]
    }
}

/// `WalkMode` は変換を 1 スレッドで行うか, タイル行の帯ごとに並列で行うかを表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkMode {
    Serial,
    Parallel,
}

/// `frame_copy` が実際にタイル変換をしたか, そのままコピーしただけかを表す.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameCopyStatus {
    TileCopy,
    CopyOnly,
}

/// `src` を `dst` にコピーし, その途中で必要ならタイル化またはタイル解除をする.
///
/// どちらか一方は `Linear` でなければならない. 変換できないときは警告を出してそのままコピーする.
pub fn frame_copy(
    dst: &mut Frame,
    dst_layout: TileLayout,
    src: &Frame,
    src_layout: TileLayout,
    mode: WalkMode,
) -> Result<FrameCopyStatus> {
    ensure!(
        dst.width == src.width && dst.height == src.height,
        "frame size mismatch: dst {}x{}, src {}x{}",
        dst.width,
        dst.height,
        src.width,
        src.height
    );

    let converted = match (dst_layout, src_layout) {
        (TileLayout::Linear, TileLayout::Linear) => {
            debug!("both layouts are linear, not (de)tiling");
            plain_copy(dst, src)?;
            return Ok(FrameCopyStatus::CopyOnly);
        }
        (TileLayout::Linear, layout) => convert(TileOp::Detile, layout, dst, src, mode),
        (layout, TileLayout::Linear) => convert(TileOp::Tile, layout, dst, src, mode),
        _ => Err(anyhow::anyhow!(
            "both src [{:?}] and dst [{:?}] layouts can't be tiled",
            src_layout,
            dst_layout
        )),
    };

    match converted {
        Ok(()) => Ok(FrameCopyStatus::TileCopy),
        Err(e) => {
            warn!("{:#}; falling back to plain copy", e);
            plain_copy(dst, src)?;
            Ok(FrameCopyStatus::CopyOnly)
        }
    }
}

fn convert(
    op: TileOp,
    layout: TileLayout,
    dst: &mut Frame,
    src: &Frame,
    mode: WalkMode,
) -> Result<()> {
    check_pixel_formats(src.format, dst.format)?;

    let walk = match layout.walk() {
        Some(walk) => walk,
        None => bail!("{:?} layout has no tile walk", layout),
    };

    let (tiled, linear) = match op {
        TileOp::Tile => (&*dst, src),
        TileOp::Detile => (src, &*dst),
    };
    ensure!(
        tiled.line_size == tiled.width * walk.bytes_per_pixel,
        "tiled frame line size [{}] going beyond width [{}] is not supported",
        tiled.line_size,
        tiled.width
    );
    let linear_line = linear.line_size;

    debug!(
        "{:?} {}x{} frame with {:?} layout ({:?})",
        op, src.width, src.height, layout, mode
    );

    let (width, height) = (src.width, src.height);
    match (op, mode) {
        (TileOp::Tile, WalkMode::Serial) => {
            tile(&walk, width, height, &src.data, linear_line, &mut dst.data)
        }
        (TileOp::Tile, WalkMode::Parallel) => {
            tile_parallel(&walk, width, height, &src.data, linear_line, &mut dst.data)
        }
        (TileOp::Detile, WalkMode::Serial) => {
            detile(&walk, width, height, &src.data, &mut dst.data, linear_line)
        }
        (TileOp::Detile, WalkMode::Parallel) => {
            detile_parallel(&walk, width, height, &src.data, &mut dst.data, linear_line)
        }
    }
}

fn plain_copy(dst: &mut Frame, src: &Frame) -> Result<()> {
    ensure!(
        dst.format.bytes_per_pixel() == src.format.bytes_per_pixel(),
        "cannot copy {:?} frame into {:?} frame",
        src.format,
        dst.format
    );

    let len = src.width * src.format.bytes_per_pixel();
    for y in 0..src.height {
        let d = y * dst.line_size;
        dst.data[d..d + len].copy_from_slice(src.row(y));
    }
    Ok(())
}
