use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lightsweeper_floor::{PortMap, SensorEvent};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One JSON document per line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct PortEntry<'a> {
    port: &'a str,
    addresses: Vec<u8>,
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    port: &'a str,
    error: String,
}

#[derive(Serialize)]
struct PortMapOutput<'a> {
    tiles: usize,
    ports: Vec<PortEntry<'a>>,
    failures: Vec<FailureEntry<'a>>,
}

pub fn print_port_map(map: &PortMap, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PortMapOutput {
                tiles: map.tile_count(),
                ports: map
                    .channels
                    .iter()
                    .map(|(port, addresses)| PortEntry {
                        port,
                        addresses: addresses.iter().map(|a| a.get()).collect(),
                    })
                    .collect(),
                failures: map
                    .failures
                    .iter()
                    .map(|f| FailureEntry {
                        port: &f.port,
                        error: f.error.to_string(),
                    })
                    .collect(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut rows: Vec<Vec<String>> = map
                .channels
                .iter()
                .map(|(port, addresses)| {
                    vec![
                        port.clone(),
                        addresses.len().to_string(),
                        join_addresses(addresses.iter().map(|a| a.get())),
                    ]
                })
                .collect();
            rows.extend(
                map.failures
                    .iter()
                    .map(|f| vec![f.port.clone(), "-".to_string(), f.error.to_string()]),
            );
            print_table(&["PORT", "TILES", "ADDRESSES"], rows);
        }
        OutputFormat::Pretty => {
            for (port, addresses) in &map.channels {
                println!("{port}: {}", join_addresses(addresses.iter().map(|a| a.get())));
            }
            for failure in &map.failures {
                println!("{}: failed: {}", failure.port, failure.error);
            }
            println!("{} tiles", map.tile_count());
        }
    }
}

pub fn print_event(event: &SensorEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Table => print_table(
            &["ROW", "COL", "INTENSITY"],
            vec![vec![
                event.row.to_string(),
                event.col.to_string(),
                event.intensity.to_string(),
            ]],
        ),
        OutputFormat::Pretty => {
            println!("row={} col={} intensity={}", event.row, event.col, event.intensity);
        }
    }
}

fn join_addresses(addresses: impl Iterator<Item = u8>) -> String {
    addresses
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
