use lightsweeper_floor::FloorConfig;
use lightsweeper_frame::{TileAddress, MAX_ARGS};
use lightsweeper_serial::LinkConfig;
use lightsweeper_tile::{NO_CONTACT, RESET_SETTLE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("lightsweeper {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let link = LinkConfig::default();
    let floor = FloorConfig::default();

    println!("lightsweeper {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build: {} ({}/{})",
        option_env!("LIGHTSWEEPER_BUILD_TARGET").unwrap_or("unknown"),
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!("features: floor={}, cli=true", cfg!(feature = "floor"));
    println!();
    println!("link:");
    println!("  baud: {}", link.baud_rate);
    println!("  read timeout: {:?}", link.read_timeout);
    println!("  min write gap: {:?}", link.min_write_gap);
    println!("tiles:");
    println!(
        "  addresses: {}..{} step {} ({} per port, 0 = broadcast)",
        TileAddress::FIRST,
        TileAddress::LAST,
        TileAddress::STRIDE,
        TileAddress::SLOTS
    );
    println!("  max frame args: {MAX_ARGS}");
    println!("  reset settle: {RESET_SETTLE:?}");
    println!("floor:");
    println!(
        "  sensor threshold: {} (no contact reads {NO_CONTACT})",
        floor.sensor_threshold
    );
    println!("  tile write delay: {:?}", floor.tile_write_delay);
    println!("  rainbow interval: {:?}", floor.rainbow_interval);

    Ok(SUCCESS)
}
