//! Bridge between the UI side and the privileged host
//!
//! In-process the two halves talk over a tokio channel: `BridgeClient`
//! sends a `BridgeRequest` and awaits the matching `BridgeResponse`.
//! `serve_frames` exposes the same messages to an external front end as
//! length-prefixed JSON (u32 little-endian length, then the payload).

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::io::{self, Read, Write};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::PreferenceStore;
use crate::constants::ipc::{MAX_MESSAGE_SIZE, REQUEST_QUEUE_DEPTH};
use crate::resolver::{HostFilesystem, PathResolver};
use crate::storage::{Dialogs, DiskStorage};

mod client;
mod host;
mod messages;
pub use client::BridgeClient;
pub use host::BridgeHost;
pub use messages::{BridgeRequest, BridgeResponse};

/// Create a connected client/host pair
///
/// The host does nothing until `BridgeHost::run` is awaited.
pub fn channel<D: Dialogs>(
    storage: DiskStorage<D>,
    resolver: PathResolver<HostFilesystem>,
    preferences: PreferenceStore,
) -> (BridgeClient, BridgeHost<D>) {
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    (
        BridgeClient::new(tx),
        BridgeHost::new(storage, resolver, preferences, rx),
    )
}

/// Relay framed requests from `input` to the host until EOF or `Shutdown` (blocking)
///
/// Must run on a plain thread, never inside the async runtime. A frame that
/// is not a valid request is answered with `BridgeResponse::Error`.
pub fn serve_frames<R: Read, W: Write>(
    client: &BridgeClient,
    mut input: R,
    mut output: W,
) -> Result<()> {
    info!("bridge listening on frame stream");

    loop {
        let frame = match read_frame(&mut input) {
            Ok(frame) => frame,
            Err(e) if is_eof(&e) => {
                info!("front end closed the frame stream");
                if let Err(e) = client.blocking_request(BridgeRequest::Shutdown) {
                    warn!(error = %e, "host already stopped");
                }
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let request: BridgeRequest = match serde_json::from_slice(&frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "discarding malformed request frame");
                write_message(&mut output, &BridgeResponse::Error(format!("invalid request: {e}")))?;
                continue;
            }
        };

        let shutdown = matches!(request, BridgeRequest::Shutdown);
        let response = client.blocking_request(request).unwrap_or_else(|e| {
            error!(error = %e, "bridge request failed");
            BridgeResponse::Error(e.to_string())
        });
        write_message(&mut output, &response)?;

        if shutdown {
            info!("front end requested shutdown");
            return Ok(());
        }
    }
}

fn is_eof(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::UnexpectedEof)
}

/// Write length-prefixed message to stream
pub fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = u32::try_from(json.len()).context("Message length does not fit in u32")?;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;

    stream
        .write_all(&json)
        .context("Failed to write message payload")?;

    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

fn read_frame<R: Read>(stream: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;
    Ok(json_buf)
}
