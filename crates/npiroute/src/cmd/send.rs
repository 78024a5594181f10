use std::time::Duration;

use npiroute_frame::{FrameConfig, FrameReader, FrameWriter, MessageClass};
use npiroute_transport::HostSocket;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let class = MessageClass::from_cmd0(args.cmd0).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("cmd0 {:#04x} does not carry a known message class", args.cmd0),
        )
    })?;
    let data = resolve_data(&args)?;

    let stream =
        HostSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;

    let config = FrameConfig {
        read_timeout: Some(wait_timeout),
        write_timeout: Some(wait_timeout),
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config_host(stream, config.clone())
        .map_err(|err| frame_error("connect failed", err))?;

    tracing::debug!(%class, cmd0 = args.cmd0, cmd1 = args.cmd1, size = data.len(), "sending frame");
    writer
        .send(args.cmd0, args.cmd1, &data)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let mut reader = FrameReader::with_config_host(read_half, config)
            .map_err(|err| frame_error("receive failed", err))?;
        let reply = reader
            .read_frame()
            .map_err(|err| frame_error("receive failed", err))?;
        print_frame(&reply, format);
    }

    Ok(SUCCESS)
}

fn resolve_data(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(text) = &args.text {
        return Ok(text.as_bytes().to_vec());
    }
    Ok(Vec::new())
}

/// Parse a byte given as `0x..` hex or decimal.
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid byte value: {input}"))
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, format!("invalid hex data: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex data must have an even number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex data: {input}")))
        })
        .collect()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
