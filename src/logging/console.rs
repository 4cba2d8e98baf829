//! Console output for rendered log lines.

use std::io::Write;

use crate::logging::level::ConsoleStream;

/// Writes a rendered line to a console stream.
pub trait ConsoleWriter: Send + Sync {
    fn write_line(&self, stream: ConsoleStream, line: &str);
}

/// Process stdout/stderr: debug and info go to stdout, warn and error to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl ConsoleWriter for StdConsole {
    fn write_line(&self, stream: ConsoleStream, line: &str) {
        // Write errors are dropped: the console is the sink of last resort.
        let _ = match stream {
            ConsoleStream::Debug | ConsoleStream::Info => writeln!(std::io::stdout().lock(), "{}", line),
            ConsoleStream::Warn | ConsoleStream::Error => writeln!(std::io::stderr().lock(), "{}", line),
        };
    }
}
