use lightsweeper_floor::{Discovery, FloorLayout, PortMap, PortOpener, SystemPorts};
use lightsweeper_serial::{LinkConfig, SerialLink};
use tracing::info;

use crate::cmd::DiscoverArgs;
use crate::exit::{floor_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_port_map, OutputFormat};

/// System ports, limited to the ones named with `--port`.
struct SelectedPorts {
    ports: Vec<String>,
    system: SystemPorts,
}

impl PortOpener for SelectedPorts {
    fn list(&mut self) -> lightsweeper_serial::Result<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn open(&mut self, name: &str) -> lightsweeper_serial::Result<SerialLink> {
        self.system.open(name)
    }
}

pub fn run(args: DiscoverArgs, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    let map = if args.ports.is_empty() {
        port_map(Discovery::new(link))?
    } else {
        port_map(Discovery::with_opener(SelectedPorts {
            ports: args.ports,
            system: SystemPorts::new(link),
        }))?
    };

    print_port_map(&map, format);

    if let (Some(path), Some(cols)) = (&args.write_layout, args.cols) {
        let layout =
            FloorLayout::from_port_map(&map, cols).map_err(|err| floor_error("layout", err))?;
        layout.save(path).map_err(|err| floor_error("write layout", err))?;
        info!(path = %path.display(), rows = layout.rows, cols, "layout ready");
    }

    Ok(if map.is_empty() { FAILURE } else { SUCCESS })
}

fn port_map<O: PortOpener>(mut discovery: Discovery<O>) -> CliResult<PortMap> {
    let map = discovery
        .build_port_map()
        .map_err(|err| floor_error("discovery failed", err))?;
    discovery.into_registry().close_all();
    Ok(map)
}
