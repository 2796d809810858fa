//! Auto-reconnect wrapper around the telemetry stream, mirroring the
//! SHM-attach-with-retries pattern `lkas_detect`/`lkas_orchestrate` use for
//! their ring attachments, generalized to a TCP connect loop that never
//! gives up (the viewer is optional and has no upstream to report failure
//! to besides its own log).

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::client::{read_message, TelemetryMessage};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connect to the broadcaster and invoke `on_message` for every telemetry
/// message received, reconnecting with a fixed backoff whenever the
/// connection drops or a malformed frame is seen.
pub async fn stream_forever<F>(broadcast_addr: &str, mut on_message: F) -> !
where
    F: FnMut(TelemetryMessage),
{
    loop {
        match TcpStream::connect(broadcast_addr).await {
            Ok(mut socket) => {
                info!(addr = broadcast_addr, "connected to broadcaster");
                loop {
                    match read_message(&mut socket).await {
                        Ok(message) => on_message(message),
                        Err(e) => {
                            warn!(error = %e, "telemetry stream ended, reconnecting");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, addr = broadcast_addr, "failed to connect to broadcaster");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
