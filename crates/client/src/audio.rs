//! Audio cue played when a new exit confirmation arrives.

use std::io::Write;

pub trait AudioCue: Send + Sync + 'static {
    fn play(&self);
}

/// No sound at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl AudioCue for Silent {
    fn play(&self) {}
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            tracing::debug!(error = %e, "failed to ring terminal bell");
        }
    }
}
