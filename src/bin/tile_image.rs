use anyhow::{bail, Result};

use tile_probe::{
    config::{Config, BLOCK_HEIGHT, BLOCK_WIDTH, CANVAS_HEIGHT, CANVAS_WIDTH, PALETTE, TWO_COLORS},
    fill::{BlockFill, ColorCycle},
};

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::from_env()?;

    let cycle = match std::env::args().nth(1).as_deref() {
        None | Some("two") => ColorCycle::Toggle(TWO_COLORS.0, TWO_COLORS.1),
        Some("palette") => ColorCycle::Palette(PALETTE.to_vec()),
        Some(other) => bail!("unknown variant '{}', expected 'two' or 'palette'", other),
    };

    let fill = BlockFill::new(CANVAS_WIDTH, CANVAS_HEIGHT, BLOCK_WIDTH, BLOCK_HEIGHT, cycle)?;
    fill.save(&config.image_output)?;

    println!("saved tiled image to {}", config.image_output.display());
    Ok(())
}
