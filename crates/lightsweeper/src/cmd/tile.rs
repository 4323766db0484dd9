use lightsweeper_frame::{Color, Shape, TileAddress};
use lightsweeper_serial::{open_link, LinkConfig};
use lightsweeper_tile::{RealTile, TileControl, NO_CONTACT};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cmd::{TileAction, TileArgs};
use crate::exit::{channel_error, frame_error, tile_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct TileOutput<'a> {
    port: &'a str,
    address: u8,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
}

pub fn run(args: TileArgs, format: OutputFormat, link: LinkConfig) -> CliResult<i32> {
    let address =
        TileAddress::new(args.address).map_err(|err| frame_error("tile address", err))?;
    // Bad arguments fail before the port is touched.
    validate(&args.action)?;

    let link = open_link(&args.port, link).map_err(|err| channel_error("open failed", err))?;
    let mut tile = RealTile::new(link, address);
    let action = action_name(&args.action);
    let result = execute(&mut tile, &args.action).map_err(|err| match err {
        Failure::Tile(err) => tile_error(action, err),
        Failure::Cli(err) => err,
    })?;
    tile.link().close();

    let out = TileOutput {
        port: &args.port,
        address: address.get(),
        action,
        result,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["PORT", "ADDRESS", "ACTION", "RESULT"],
            vec![vec![
                out.port.to_string(),
                out.address.to_string(),
                out.action.to_string(),
                out.result.as_ref().map_or_else(|| "ok".to_string(), Value::to_string),
            ]],
        ),
        OutputFormat::Pretty => match &out.result {
            Some(result) => println!("{} @ {} {}: {result}", out.port, out.address, out.action),
            None => println!("{} @ {} {}: ok", out.port, out.address, out.action),
        },
    }

    Ok(SUCCESS)
}

enum Failure {
    Tile(lightsweeper_tile::TileError),
    Cli(CliError),
}

impl From<lightsweeper_tile::TileError> for Failure {
    fn from(err: lightsweeper_tile::TileError) -> Self {
        Failure::Tile(err)
    }
}

impl From<CliError> for Failure {
    fn from(err: CliError) -> Self {
        Failure::Cli(err)
    }
}

fn validate(action: &TileAction) -> CliResult<()> {
    match action {
        TileAction::Color { name } => parse_color(name).map(drop),
        TileAction::Shape { mask } => parse_mask(mask).map(drop),
        TileAction::Digit { digit } => digit_shape(*digit).map(drop),
        TileAction::SetAddress { address } => new_address(*address).map(drop),
        _ => Ok(()),
    }
}

fn execute(tile: &mut RealTile, action: &TileAction) -> Result<Option<Value>, Failure> {
    let result = match action {
        TileAction::Version => Some(json!(tile.version()?)),
        TileAction::Color { name } => {
            tile.set_color(parse_color(name)?)?;
            None
        }
        TileAction::Shape { mask } => {
            tile.set_shape(parse_mask(mask)?)?;
            None
        }
        TileAction::Digit { digit } => {
            tile.set_shape(digit_shape(*digit)?)?;
            None
        }
        TileAction::EepromRead { offset } => Some(json!(tile.eeprom_read(*offset)?)),
        TileAction::EepromWrite { offset, value } => {
            tile.eeprom_write(*offset, *value)?;
            None
        }
        TileAction::Sensor => match tile.sensor_status()? {
            NO_CONTACT => Some(json!("no contact")),
            reading => Some(json!(reading)),
        },
        TileAction::Status => {
            let status = tile.status()?;
            Some(json!({
                "raw": status.0,
                "flipped": status.is_flipped(),
                "errors": status.has_errors(),
                "calibrating": status.is_calibrating(),
            }))
        }
        TileAction::Errors => Some(json!(tile.error_read()?)),
        TileAction::Adc => {
            let stats = tile.adc_stats()?;
            Some(json!({ "min": stats.min, "max": stats.max, "threshold": stats.threshold }))
        }
        TileAction::Locate => {
            tile.locate()?;
            None
        }
        TileAction::Flip => {
            tile.flip()?;
            None
        }
        TileAction::Unflip => {
            tile.unflip()?;
            None
        }
        TileAction::Reset => {
            tile.reset()?;
            None
        }
        TileAction::Latch { all } => {
            tile.latch(*all)?;
            None
        }
        TileAction::Randomize => {
            tile.randomize_address()?;
            None
        }
        TileAction::Sync => {
            tile.sync_comm()?;
            None
        }
        TileAction::SetAddress { address } => {
            let address = new_address(*address)?;
            tile.store_address(address)?;
            Some(json!(address.get()))
        }
    };
    Ok(result)
}

fn action_name(action: &TileAction) -> &'static str {
    match action {
        TileAction::Version => "version",
        TileAction::Color { .. } => "color",
        TileAction::Shape { .. } => "shape",
        TileAction::Digit { .. } => "digit",
        TileAction::EepromRead { .. } => "eeprom-read",
        TileAction::EepromWrite { .. } => "eeprom-write",
        TileAction::Sensor => "sensor",
        TileAction::Status => "status",
        TileAction::Errors => "errors",
        TileAction::Adc => "adc",
        TileAction::Locate => "locate",
        TileAction::Flip => "flip",
        TileAction::Unflip => "unflip",
        TileAction::Reset => "reset",
        TileAction::Latch { .. } => "latch",
        TileAction::Randomize => "randomize",
        TileAction::Sync => "sync",
        TileAction::SetAddress { .. } => "set-address",
    }
}

fn parse_color(name: &str) -> CliResult<Color> {
    Color::from_name(name).ok_or_else(|| CliError::usage(format!("unknown color: {name}")))
}

/// `0x7E`, `0b1111110` or plain decimal; only the seven segment bits.
fn parse_mask(mask: &str) -> CliResult<Shape> {
    let mask = mask.trim();
    let parsed = if let Some(hex) = mask.strip_prefix("0x").or_else(|| mask.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = mask.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        mask.parse()
    };
    match parsed {
        Ok(bits) if bits <= 0x7F => Ok(Shape::from_raw(bits)),
        _ => Err(CliError::usage(format!("invalid segment mask: {mask}"))),
    }
}

fn digit_shape(digit: u8) -> CliResult<Shape> {
    Shape::digit(digit).map_err(|err| frame_error("digit", err))
}

fn new_address(raw: u16) -> CliResult<TileAddress> {
    let address = TileAddress::new(raw).map_err(|err| frame_error("new address", err))?;
    if address.is_broadcast() {
        return Err(CliError::usage("a tile can't be given the broadcast address"));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_forms() {
        assert_eq!(parse_mask("0x7E").unwrap(), Shape::ZERO);
        assert_eq!(parse_mask("127").unwrap(), Shape::EIGHT);
        assert_eq!(parse_mask("0b0000001").unwrap(), Shape::DASH);
        assert!(parse_mask("0x80").is_err());
        assert!(parse_mask("seven").is_err());
    }

    #[test]
    fn bad_arguments_rejected_up_front() {
        let color = TileAction::Color {
            name: "mauve".into(),
        };
        assert_eq!(validate(&color).unwrap_err().code, crate::exit::USAGE);
        assert!(validate(&TileAction::Digit { digit: 10 }).is_err());
        assert!(validate(&TileAction::SetAddress { address: 0 }).is_err());
        assert!(validate(&TileAction::SetAddress { address: 12 }).is_err());
        assert!(validate(&TileAction::SetAddress { address: 24 }).is_ok());
    }
}
