use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("framelink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: framelink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FRAMELINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "wire_marker: {} / {}",
        framelink_wire::MARKER_KEY,
        framelink_wire::INTERNAL_KEY
    );
    println!(
        "features: peer={}, web={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "web")
    );

    Ok(SUCCESS)
}
