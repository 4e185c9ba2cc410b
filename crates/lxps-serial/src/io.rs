//! Raw single-shot I/O on a configured handle
//!
//! One call, one syscall. Short reads and short writes are returned as-is;
//! callers that need a full buffer loop themselves.

use crate::error::LineError;
use crate::handle::LineHandle;
use crate::status::StatusSink;

/// Capacity of the buffer used by [`read_frame`]
pub const FRAME_CAPACITY: usize = 100;

fn ensure_open<H: LineHandle + ?Sized>(handle: &H, sink: &impl StatusSink) -> Result<(), LineError> {
    if handle.is_open() {
        Ok(())
    } else {
        sink.error(&format!("Serial port {} is not open", handle.path()));
        Err(LineError::InvalidHandle {
            path: handle.path().to_string(),
        })
    }
}

/// Read at most [`FRAME_CAPACITY`] bytes with a single read call
pub fn read_frame<H>(handle: &mut H, sink: &impl StatusSink) -> Result<Vec<u8>, LineError>
where
    H: LineHandle + ?Sized,
{
    ensure_open(handle, sink)?;

    let mut buffer = [0u8; FRAME_CAPACITY];
    match handle.read(&mut buffer) {
        Ok(n) => {
            sink.info(&format!("Read serial port: Success. Read {} bytes.", n));
            Ok(buffer[..n].to_vec())
        }
        Err(e) => {
            sink.error(&format!("Read serial port: Fail. Error: {}", e));
            Err(LineError::IoFailure {
                path: handle.path().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Write `data` with a single write call, returning the bytes accepted
pub fn write_frame<H>(handle: &mut H, data: &[u8], sink: &impl StatusSink) -> Result<usize, LineError>
where
    H: LineHandle + ?Sized,
{
    ensure_open(handle, sink)?;

    let written = handle.write(data).and_then(|n| handle.flush().map(|()| n));
    match written {
        Ok(n) => {
            sink.info(&format!("Writing to serial: Success. Wrote {} bytes.", n));
            Ok(n)
        }
        Err(e) => {
            sink.error(&format!("Writing to serial: Fail. Error: {}", e));
            Err(LineError::IoFailure {
                path: handle.path().to_string(),
                reason: e.to_string(),
            })
        }
    }
}
