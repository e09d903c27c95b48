use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use image::io::Reader;

use tile_probe::fbtile::{self, Frame, FrameCopyStatus, PixelFormat, TileLayout, WalkMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Op {
    /// Rearrange a linear image into the tiled layout
    Tile,
    /// Rearrange a tiled image back into a linear one
    Detile,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    Linear,
    Intelx,
    Intely,
    Intelyf,
}

impl From<Layout> for TileLayout {
    fn from(l: Layout) -> Self {
        match l {
            Layout::Linear => TileLayout::Linear,
            Layout::Intelx => TileLayout::IntelX,
            Layout::Intely => TileLayout::IntelY,
            Layout::Intelyf => TileLayout::IntelYf,
        }
    }
}

/// Tile or detile the pixels of an image as a GPU framebuffer would store them
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(value_enum)]
    op: Op,

    #[arg(long, value_enum, default_value_t = Layout::Intelx)]
    layout: Layout,

    /// Walk the whole frame on one thread
    #[arg(long)]
    serial: bool,

    input: PathBuf,
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let src = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let rgba = Reader::new(BufReader::new(src))
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("failed to decode {}", args.input.display()))?
        .to_rgba8();

    let src = Frame::from_rgba_image(rgba);
    let mut dst = Frame::new(src.width(), src.height(), PixelFormat::Rgba);
    let mode = if args.serial {
        WalkMode::Serial
    } else {
        WalkMode::Parallel
    };

    let layout = TileLayout::from(args.layout);
    let (dst_layout, src_layout) = match args.op {
        Op::Tile => (layout, TileLayout::Linear),
        Op::Detile => (TileLayout::Linear, layout),
    };
    let status = fbtile::frame_copy(&mut dst, dst_layout, &src, src_layout, mode)?;
    if status == FrameCopyStatus::CopyOnly {
        eprintln!("warning: {:?} with {:?} layout was not applied, copied as is", args.op, layout);
    }

    dst.save_png(&args.output)?;
    println!(
        "{:?} {}x{} ({:?}) -> {}",
        args.op,
        src.width(),
        src.height(),
        layout,
        args.output.display()
    );

    Ok(())
}
