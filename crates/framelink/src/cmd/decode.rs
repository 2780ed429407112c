use std::fs;
use std::io::Read;

use framelink_wire::decode;
use serde_json::Value;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{packet_kind, print_packet, OutputFormat, PacketView};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = read_wire(&args)?;
    let view = inspect(wire.trim())?;
    print_packet(&view, format);
    Ok(SUCCESS)
}

fn read_wire(args: &DecodeArgs) -> CliResult<String> {
    if let Some(wire) = &args.wire {
        return Ok(wire.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut wire = String::new();
    std::io::stdin()
        .read_to_string(&mut wire)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(wire)
}

/// Links drop non-protocol traffic silently; here it is reported.
fn inspect(wire: &str) -> CliResult<PacketView> {
    let packet = decode::<Value>(wire)
        .ok_or_else(|| CliError::new(DATA_INVALID, "not a framelink envelope"))?;
    Ok(PacketView {
        kind: packet_kind(&packet.message),
        from_id: packet.from_id,
        message: packet.message,
    })
}
