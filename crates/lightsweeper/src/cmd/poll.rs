use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use lightsweeper_serial::LinkConfig;
use lightsweeper_tile::NO_CONTACT;
use tracing::{info, warn};

use crate::cmd::{
    all_dead, floor_exit_code, install_ctrlc_handler, open_floor, parse_duration, PollArgs,
};
use crate::exit::{floor_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: PollArgs, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    let mut config = args.floor.floor_config()?;
    if let Some(threshold) = args.threshold {
        config.sensor_threshold = check_threshold(threshold)?;
    }
    let interval = parse_duration(&args.interval)?;
    let mut floor = open_floor(&args.floor.layout, link, config)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(
        rows = floor.rows(),
        cols = floor.cols(),
        threshold = config.sensor_threshold,
        "polling sensors"
    );

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let events = floor
            .poll_sensors()
            .map_err(|err| floor_error("poll", err))?;

        for event in &events {
            print_event(event, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }

        if all_dead(&floor) {
            warn!("every channel is dead, stopping");
            break;
        }
        thread::sleep(interval);
    }

    Ok(floor_exit_code(&floor))
}

/// Readings run 0-255; a threshold past [`NO_CONTACT`] means nothing.
fn check_threshold(threshold: u16) -> CliResult<u16> {
    if threshold > NO_CONTACT {
        return Err(CliError::usage(format!(
            "threshold {threshold} is above the sensor range (max {NO_CONTACT})"
        )));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_range() {
        assert_eq!(check_threshold(100).unwrap(), 100);
        assert_eq!(check_threshold(NO_CONTACT).unwrap(), NO_CONTACT);
        assert_eq!(check_threshold(300).unwrap_err().code, crate::exit::USAGE);
    }
}
