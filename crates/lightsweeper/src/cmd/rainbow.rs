use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lightsweeper_serial::LinkConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{
    all_dead, floor_exit_code, install_ctrlc_handler, open_floor, parse_duration, RainbowArgs,
};
use crate::exit::{floor_error, CliResult};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct RainbowOutput {
    cycles: usize,
    tiles: usize,
    dead_channels: Vec<String>,
}

pub fn run(args: RainbowArgs, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    let mut config = args.floor.floor_config()?;
    if let Some(interval) = &args.interval {
        config.rainbow_interval = parse_duration(interval)?;
    }
    let mut floor = open_floor(&args.floor.layout, link, config)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut cycles = 0usize;
    while running.load(Ordering::SeqCst) && args.cycles.is_none_or(|max| cycles < max) {
        floor
            .rainbow_mode(config.rainbow_interval)
            .map_err(|err| floor_error("rainbow", err))?;
        cycles += 1;
        if all_dead(&floor) {
            warn!("every channel is dead, stopping");
            break;
        }
    }
    info!(cycles, "rainbow stopped");

    floor.clear_board().map_err(|err| floor_error("clear", err))?;

    let out = RainbowOutput {
        cycles,
        tiles: floor.grid().len(),
        dead_channels: floor.dead_channels().map(str::to_string).collect(),
    };
    let dead = if out.dead_channels.is_empty() {
        "none".to_string()
    } else {
        out.dead_channels.join(", ")
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["CYCLES", "TILES", "DEAD CHANNELS"],
            vec![vec![out.cycles.to_string(), out.tiles.to_string(), dead]],
        ),
        OutputFormat::Pretty => {
            println!("{} cycles over {} tiles, dead channels: {dead}", out.cycles, out.tiles);
        }
    }

    Ok(floor_exit_code(&floor))
}
