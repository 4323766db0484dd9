use lightsweeper_serial::LinkConfig;
use serde::Serialize;

use crate::cmd::{floor_exit_code, open_floor, ClearArgs};
use crate::exit::{floor_error, CliResult};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct ClearOutput {
    rows: usize,
    cols: usize,
    dead_channels: Vec<String>,
}

pub fn run(args: ClearArgs, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    let config = args.floor.floor_config()?;
    let mut floor = open_floor(&args.floor.layout, link, config)?;
    floor.clear_board().map_err(|err| floor_error("clear", err))?;

    let out = ClearOutput {
        rows: floor.rows(),
        cols: floor.cols(),
        dead_channels: floor.dead_channels().map(str::to_string).collect(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["ROWS", "COLS", "DEAD CHANNELS"],
            vec![vec![
                out.rows.to_string(),
                out.cols.to_string(),
                out.dead_channels.join(", "),
            ]],
        ),
        OutputFormat::Pretty => println!("cleared {}x{} floor", out.rows, out.cols),
    }

    Ok(floor_exit_code(&floor))
}
