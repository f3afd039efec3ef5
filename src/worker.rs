//! Capture-and-scan worker loop
//!
//! Runs in its own process: read a command, block on the frame source, scan,
//! write exactly one response. The loop keeps no state between commands apart
//! from the open frame source.

use std::io::{Read, Write};

use crate::capture::{FrameSource, ScanDispatcher};
use crate::protocol::{self, MessageKind, ProtocolError, WorkerResponse};

/// Serve commands until terminated or the front end hangs up.
///
/// Returns `Err` only for protocol violations and channel I/O failures.
pub fn run<R, W, S>(
    reader: &mut R,
    writer: &mut W,
    source: &mut S,
    dispatcher: &ScanDispatcher,
) -> Result<(), ProtocolError>
where
    R: Read,
    W: Write,
    S: FrameSource + ?Sized,
{
    let mut cycles = 0u64;
    loop {
        let Some(message) = protocol::read_message(reader)? else {
            log::info!("Front end closed the channel, worker exiting");
            break;
        };
        if message.kind() != MessageKind::Command {
            log::error!("Invalid worker command ({:?}), worker exiting", message.kind());
        }
        let command = message.into_command()?;

        if command.terminate {
            log::info!("Terminate received after {} cycles, worker exiting", cycles);
            break;
        }

        let frame = source.get_frame(&command.source_selector);
        let codes = dispatcher.scan(&frame.rgba, command.enabled);
        log::trace!(
            "Cycle {}: {}x{} frame, {} code(s)",
            cycles,
            frame.width(),
            frame.height(),
            codes.len()
        );

        protocol::write_message(writer, &WorkerResponse { frame, codes }.encode()?)?;
        cycles += 1;
    }
    Ok(())
}

/// Entry point of the `--worker` process: protocol on stdin/stdout
pub fn run_process() -> anyhow::Result<()> {
    use anyhow::Context;

    log::info!("Capture worker started (pid {})", std::process::id());
    let dispatcher = crate::capture::default_dispatcher();
    let mut source = crate::capture::ImageFileSource::new();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = stdin.lock();
    let mut writer = std::io::BufWriter::new(stdout.lock());

    run(&mut reader, &mut writer, &mut source, &dispatcher).context("Worker channel failed")
}
