//! Frame reader for the kernel log device
//!
//! The log device yields one binary entry per read of a sufficiently sized
//! buffer. Each entry starts with a fixed little-endian header followed by a
//! payload of process name, a NUL separator, and the message text. This
//! module turns each entry into one text line.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};

/// Default path of the kernel log character device.
pub const DEFAULT_LOG_DEVICE: &str = "/dev/log/main";

/// Fixed entry header length: u16 + u16 + 4 × i32.
pub const HEADER_LEN: usize = 20;

/// The device guarantees one full entry per read of this size.
const READ_BUF_LEN: usize = 5 * 1024;

/// Per-entry header of the kernel logger wire format, little-endian.
#[derive(Debug, Clone, Copy)]
pub struct EntryHeader {
    /// Payload length in bytes.
    pub length: u16,
    pub pad: u16,
    pub pid: i32,
    pub tid: i32,
    /// Seconds since epoch.
    pub sec: i32,
    pub nsec: i32,
}

impl EntryHeader {
    /// Decode the header from the first [`HEADER_LEN`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::Framing { len: buf.len() });
        }

        Ok(Self {
            length: u16::from_le_bytes([buf[0], buf[1]]),
            pad: u16::from_le_bytes([buf[2], buf[3]]),
            pid: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            tid: i32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            sec: i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            nsec: i32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }
}

/// Extract the text line from one raw entry.
///
/// Trailing NUL padding is trimmed, the header is decoded and cut off, and
/// the payload is normalized: newlines become spaces (the renderer logs
/// multi-line messages, logcat flattens them, so do we) and NUL bytes become
/// tabs, which promotes the process-name separator into a printable tab.
///
/// Returns `Ok(None)` for empty frames and frames whose header declares a
/// zero-length payload.
pub fn frame_entry(raw: &[u8]) -> Result<Option<String>> {
    let end = raw
        .iter()
        .rposition(|&b| b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let entry = &raw[..end];

    if entry.is_empty() {
        return Ok(None);
    }

    let header = EntryHeader::decode(entry)?;
    if header.length == 0 {
        return Ok(None);
    }

    let mut payload = entry[HEADER_LEN..].to_vec();
    for b in &mut payload {
        match *b {
            b'\n' => *b = b' ',
            0 => *b = b'\t',
            _ => {}
        }
    }

    Ok(Some(String::from_utf8_lossy(&payload).into_owned()))
}

/// Read entries from `source` until end of stream, sending one text line per
/// entry to `entries`.
///
/// Framing failures are reported on `errors` and reading continues; a read
/// error from the device is reported and terminates the reader.
pub async fn read_device<R>(mut source: R, entries: mpsc::Sender<String>, errors: mpsc::Sender<Error>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        match source.read(&mut buf).await {
            Ok(0) => {
                debug!("log device reached end of stream");
                break;
            }
            Ok(n) => match frame_entry(&buf[..n]) {
                Ok(Some(line)) => {
                    if entries.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = errors.send(e).await;
                }
            },
            Err(e) => {
                let _ = errors.send(e.into()).await;
                break;
            }
        }
    }
}
