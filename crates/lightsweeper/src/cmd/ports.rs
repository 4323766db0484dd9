use lightsweeper_serial::available_ports;
use serde::Serialize;

use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct PortsOutput {
    ports: Vec<String>,
}

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports = available_ports().map_err(|err| channel_error("enumerate failed", err))?;

    match format {
        OutputFormat::Json => print_json(&PortsOutput { ports }),
        OutputFormat::Table => print_table(
            &["PORT"],
            ports.into_iter().map(|port| vec![port]).collect(),
        ),
        OutputFormat::Pretty => {
            for port in ports {
                println!("{port}");
            }
        }
    }

    Ok(SUCCESS)
}
