//! Event framing for stdout

use crate::args::OutputFormat;
use council_domain::DeliberationEvent;
use std::io::{self, Write};

/// Write one event and flush so consumers see it immediately.
pub fn write_event(
    out: &mut impl Write,
    format: OutputFormat,
    event: &DeliberationEvent,
) -> io::Result<()> {
    match (format, event) {
        (OutputFormat::Sse, DeliberationEvent::Keepalive) => out.write_all(b": keepalive\n\n")?,
        (OutputFormat::Sse, event) => {
            let json = serde_json::to_string(event)?;
            write!(out, "data: {json}\n\n")?;
        }
        (OutputFormat::Ndjson, event) => {
            let json = serde_json::to_string(event)?;
            writeln!(out, "{json}")?;
        }
    }
    out.flush()
}
