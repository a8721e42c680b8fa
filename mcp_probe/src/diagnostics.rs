//! The human-readable diagnostic stream.
//!
//! Protocol traffic and step results go here, never to stdout. The binary
//! writes to the terminal's stderr; tests swap in a [`CapturedOutput`].

use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use console::{style, Term};
use parking_lot::Mutex;

pub struct Diagnostics {
    out: Box<dyn Write + Send>,
    styled: bool,
}

impl Diagnostics {
    /// Plain lines to an arbitrary writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            styled: false,
        }
    }

    /// Coloured lines to stderr (colour is dropped when stderr is not a tty).
    pub fn stderr() -> Self {
        Self {
            out: Box::new(Term::stderr()),
            styled: true,
        }
    }

    /// A diagnostic stream whose contents can be read back.
    pub fn capture() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(captured.clone()), captured)
    }

    pub fn line(&mut self, message: impl Display) {
        self.write(message.to_string());
    }

    pub fn success(&mut self, message: impl Display) {
        let text = if self.styled {
            style(message).green().for_stderr().to_string()
        } else {
            message.to_string()
        };
        self.write(text);
    }

    pub fn failure(&mut self, message: impl Display) {
        let text = if self.styled {
            style(message).red().for_stderr().to_string()
        } else {
            message.to_string()
        };
        self.write(text);
    }

    fn write(&mut self, text: String) {
        // A broken diagnostic stream must not abort the run.
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            tracing::warn!("Failed to write diagnostic line: {}", e);
        }
    }
}

/// Shared in-memory buffer behind [`Diagnostics::capture`].
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
