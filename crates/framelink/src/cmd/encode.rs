use std::fs;

use framelink_wire::{encode, PrivateMessage};
use serde_json::Value;

use crate::cmd::EncodeArgs;
use crate::exit::{io_error, wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{packet_kind, print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    if let Some(id) = &args.mounted {
        let from_id = args.from_id.as_deref().unwrap_or(id);
        let announcement = PrivateMessage::mounted(id.as_str());
        let wire = encode(&announcement, Some(from_id))
            .map_err(|err| wire_error("encode failed", err))?;
        print_encoded(&wire, "mounted", Some(from_id), format);
        return Ok(SUCCESS);
    }

    let message = resolve_message(&args)?;
    let wire = encode(&message, args.from_id.as_deref())
        .map_err(|err| wire_error("encode failed", err))?;
    print_encoded(&wire, packet_kind(&message), args.from_id.as_deref(), format);
    Ok(SUCCESS)
}

fn resolve_message(args: &EncodeArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return parse_json("--json", json);
    }
    if let Some(data) = &args.data {
        return Ok(Value::String(data.clone()));
    }
    if let Some(path) = &args.file {
        let text = fs::read_to_string(path).map_err(|err| {
            io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return parse_json(&path.display().to_string(), &text);
    }
    Err(CliError::new(
        USAGE,
        "one of --json, --data, --file or --mounted is required",
    ))
}

fn parse_json(source: &str, text: &str) -> CliResult<Value> {
    serde_json::from_str(text)
        .map_err(|err| CliError::new(USAGE, format!("{source} is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args() -> EncodeArgs {
        EncodeArgs {
            json: None,
            data: None,
            file: None,
            mounted: None,
            from_id: None,
        }
    }

    #[test]
    fn data_becomes_a_json_string() {
        let message = resolve_message(&EncodeArgs {
            data: Some("hello".to_string()),
            ..args()
        })
        .expect("data should resolve");
        assert_eq!(message, json!("hello"));
    }

    #[test]
    fn invalid_json_is_a_usage_error() {
        let err = resolve_message(&EncodeArgs {
            json: Some("{nope".to_string()),
            ..args()
        })
        .expect_err("invalid json should fail");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_message_is_a_usage_error() {
        let err = resolve_message(&args()).expect_err("empty args should fail");
        assert_eq!(err.code, USAGE);
    }
}
