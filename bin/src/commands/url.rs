//! Url command implementation.

use anyhow::Result;
use std::io::{self, Write};
use tickwire_lib::prelude::*;

/// Prints the request a stream command would send, without connecting.
pub(crate) fn show_url(request: &StreamRequest) -> Result<()> {
    let stdout = io::stdout();
    write_request(&mut stdout.lock(), request)?;
    Ok(())
}

/// Writes the method, URI, and redacted headers of `request`.
pub(crate) fn write_request<W: Write>(out: &mut W, request: &StreamRequest) -> io::Result<()> {
    let prepared = request.prepare();
    writeln!(out, "{} {}", prepared.method, prepared.uri)?;
    for (name, value) in prepared.redacted_headers() {
        writeln!(out, "{name}: {value}")?;
    }
    Ok(())
}
