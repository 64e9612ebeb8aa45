use std::fs;
use std::time::Duration;

use dbgwire_frame::{Envelope, FrameReader, FrameWriter};
use dbgwire_transport::Endpoint;
use serde_json::Value;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let stream = Endpoint::parse(&args.endpoint)
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = stream.peer_label();

    FrameWriter::new(&stream)
        .send_envelope(payload, &args.message_type)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        stream
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| transport_error("configure timeout failed", err))?;
        let message = FrameReader::new(&stream)
            .read_message()
            .map_err(|err| frame_error("receive failed", err))?;
        print_message(&message, &peer, format);
    }

    stream
        .shutdown()
        .map_err(|err| transport_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Envelope> {
    let (source, text) = if let Some(json) = &args.json {
        ("--json", json.clone())
    } else if let Some(path) = &args.file {
        let text = fs::read_to_string(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        ("--file", text)
    } else {
        return Err(CliError::new(USAGE, "one of --json or --file is required"));
    };

    parse_object(source, &text)
}

fn parse_object(source: &str, text: &str) -> CliResult<Envelope> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(CliError::new(
            USAGE,
            format!("{source} must be a JSON object"),
        )),
        Err(err) => Err(CliError::new(
            USAGE,
            format!("{source} is not valid JSON: {err}"),
        )),
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn payload_must_be_object() {
        let object = parse_object("--json", r#"{"seq":1,"command":"threads"}"#).unwrap();
        assert_eq!(object["command"], "threads");

        let err = parse_object("--json", "[1,2]").unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("JSON object"));

        let err = parse_object("--json", "{oops").unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
