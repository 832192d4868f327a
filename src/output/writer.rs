//! Low-level writing logic for output routing

use super::config::OutputMode;
use std::io::{self, Write};

/// Write user-facing text to the stream the mode assigns it
pub fn write_output(mode: OutputMode, args: std::fmt::Arguments, newline: bool) -> io::Result<()> {
    match mode {
        OutputMode::Human => {
            let mut stdout = io::stdout().lock();
            write_to(&mut stdout, args, newline)
        }
        OutputMode::Json => {
            let mut stderr = io::stderr().lock();
            write_to(&mut stderr, args, newline)
        }
    }
}

/// Write a machine-readable document to stdout regardless of mode
pub fn write_document(document: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{document}")?;
    stdout.flush()
}

fn write_to<W: Write>(out: &mut W, args: std::fmt::Arguments, newline: bool) -> io::Result<()> {
    out.write_fmt(args)?;
    if newline {
        out.write_all(b"\n")?;
    }
    out.flush()
}
