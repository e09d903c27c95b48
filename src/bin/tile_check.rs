use anyhow::{bail, Result};
use cfg_if::cfg_if;

use tile_probe::{
    config::{Config, DUAL_LABEL_GAP, TILEYF_CHECK_DUAL, TILEYF_CHECK_SINGLE},
    plot::{self, Figure, LabelMode, PLOT_WRAP},
    step::StepTable,
};

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::from_env()?;

    let (rules, mode) = match std::env::args().nth(1).as_deref() {
        Some("single") => (TILEYF_CHECK_SINGLE, LabelMode::Single),
        None | Some("dual") => (
            TILEYF_CHECK_DUAL,
            LabelMode::Dual {
                gap: DUAL_LABEL_GAP,
            },
        ),
        Some(other) => bail!("unknown variant '{}', expected 'single' or 'dual'", other),
    };

    let table = StepTable::new(rules)?;
    let placements = plot::place_labels(&table, config.walk_count, mode, PLOT_WRAP);

    for p in &placements {
        if let Some(period) = p.period {
            println!("{} {} {} {}", period, p.pos.x, p.pos.y, p.labels[0].text);
        }
    }
    log::info!(
        "{} placements for {} indices ({} wrapped)",
        placements.len(),
        config.walk_count,
        placements.iter().filter(|p| p.wrapped).count()
    );

    let figure = Figure::from_placements(&placements);

    cfg_if! {
        if #[cfg(feature = "gui")] {
            use tile_probe::plot::FigureRenderer;

            let mut renderer = plot::gui::SdlRenderer::new("tile_check");
            figure.render(&mut renderer)?;
            renderer.show()?;
        } else {
            let (min, max) = figure.bounds();
            println!("gui feature disabled; figure spans {:?} to {:?}", min, max);
        }
    }

    Ok(())
}
