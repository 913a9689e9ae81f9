//! Bidirectional byte relay between two video sockets.
//!
//! Each direction runs as its own task. Both share one cancellation token:
//! whichever direction stops first cancels the token, the sibling stops at
//! its next suspension point, and dropping the socket halves closes both
//! connections. Bytes are copied as-is; backpressure is the transport's.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use duet_common::DuetError;

/// Why one direction of a relay stopped.
#[derive(Debug)]
pub enum PipeEnd {
    /// The reading side closed its stream.
    Eof,
    /// A read or write failed.
    Failed(DuetError),
    /// The sibling direction stopped first.
    Cancelled,
}

/// Why a whole relay session stopped.
#[derive(Debug)]
pub enum RelayEnd {
    SourceClosed,
    DestinationClosed,
    Failed(DuetError),
    Cancelled,
}

/// Byte counts and end reason of a finished relay session.
#[derive(Debug)]
pub struct RelayReport {
    /// Bytes copied from source to destination.
    pub forward: u64,
    /// Bytes copied from destination to source.
    pub backward: u64,
    pub end: RelayEnd,
}

struct Pipe {
    bytes: u64,
    end: PipeEnd,
}

/// Relay between `source` and `destination` until either side closes, an
/// I/O error occurs, or `cancel` fires. Both sockets are closed on return.
pub async fn relay(
    source: TcpStream,
    destination: TcpStream,
    cancel: CancellationToken,
    buffer_size: usize,
) -> RelayReport {
    // Dropping this future must still stop both directions.
    let _guard = cancel.clone().drop_guard();

    let (source_read, source_write) = source.into_split();
    let (dest_read, dest_write) = destination.into_split();

    let forward = tokio::spawn(pipe(source_read, dest_write, cancel.clone(), buffer_size));
    let backward = tokio::spawn(pipe(dest_read, source_write, cancel.clone(), buffer_size));

    let forward = joined(forward.await);
    let backward = joined(backward.await);

    let end = match (forward.end, backward.end) {
        (PipeEnd::Eof, _) => RelayEnd::SourceClosed,
        (PipeEnd::Failed(e), _) => RelayEnd::Failed(e),
        (PipeEnd::Cancelled, PipeEnd::Eof) => RelayEnd::DestinationClosed,
        (PipeEnd::Cancelled, PipeEnd::Failed(e)) => RelayEnd::Failed(e),
        (PipeEnd::Cancelled, PipeEnd::Cancelled) => RelayEnd::Cancelled,
    };

    RelayReport {
        forward: forward.bytes,
        backward: backward.bytes,
        end,
    }
}

fn joined(result: Result<Pipe, tokio::task::JoinError>) -> Pipe {
    result.unwrap_or_else(|e| Pipe {
        bytes: 0,
        end: PipeEnd::Failed(DuetError::RelayIo(std::io::Error::other(e.to_string()))),
    })
}

/// Copy one direction. Cancels `cancel` on the way out so the sibling stops.
async fn pipe(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    cancel: CancellationToken,
    buffer_size: usize,
) -> Pipe {
    let _sibling = cancel.clone().drop_guard();
    let mut buf = vec![0u8; buffer_size];
    let mut bytes = 0u64;

    let end = loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => break PipeEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break PipeEnd::Eof,
                Ok(n) => n,
                Err(e) => break PipeEnd::Failed(DuetError::RelayIo(e)),
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => break PipeEnd::Cancelled,
            written = writer.write_all(&buf[..n]) => {
                if let Err(e) = written {
                    break PipeEnd::Failed(DuetError::RelayIo(e));
                }
            }
        }
        bytes += n as u64;
    };

    debug!(bytes, end = ?end, "Relay direction stopped");
    Pipe { bytes, end }
}
