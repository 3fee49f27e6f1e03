//! The injection audit log.
//!
//! One line per mutation, `key: value` pairs separated by commas, masks
//! rendered as fixed-width binary.  The stream is opened once at engine
//! construction, append-only, and flushed after every line so a crashed
//! simulation still leaves a complete record.  Write failures are reported
//! through the host's warn channel and never surface to the event loop.

use std::io::Write;

use chaos_sim::output::{OutputDirectory, OutputStream};
use chaos_sim::Tick;
use log::warn;

use crate::engine::BuildError;
use crate::policy::AppliedFaultType;

/// Per-engine audit log writer.
#[derive(Debug)]
pub struct Auditor {
    stream: Option<OutputStream>,
}

impl Auditor {
    /// An auditor that records nothing (disabled engine, or `write_log`
    /// off).
    pub fn disabled() -> Self {
        Self { stream: None }
    }

    /// Open the engine's log file. Fatal if the stream cannot be created.
    pub fn new(out: &OutputDirectory, file: &str, write_log: bool) -> Result<Self, BuildError> {
        if !write_log {
            return Ok(Self::disabled());
        }
        let stream = out.create(file, true).map_err(|e| BuildError::LogFile {
            name: file.to_owned(),
            source: e,
        })?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Whether lines are actually being written.
    pub fn is_enabled(&self) -> bool {
        self.stream.is_some()
    }

    /// Record one applied mutation.
    ///
    /// `location` is the adapter's descriptor, e.g.
    /// `Cache Block Addr: 0x1c0, Byte Offset: 3`.
    pub fn injection(
        &mut self,
        tick: Tick,
        location: &str,
        fault_type: AppliedFaultType,
        mask: u64,
        mask_bits: u32,
    ) {
        self.append(format!(
            "Tick: {tick}, {location}, FaultType: {fault_type}, Mask: {mask:0width$b}",
            width = mask_bits as usize
        ));
    }

    /// Record a failed access: the firing is dropped but the run continues.
    pub fn error(&mut self, context: &str, target: &str, detail: Option<&str>) {
        match detail {
            Some(detail) => self.append(format!("Error: {context}, {target}, Error: {detail}")),
            None => self.append(format!("Error: {context}, {target}")),
        }
    }

    fn append(&mut self, line: String) {
        let Some(stream) = &mut self.stream else {
            return;
        };
        if let Err(e) = writeln!(stream, "{line}").and_then(|_| stream.flush()) {
            warn!("failed to append to injection log: {e}");
        }
    }
}
