use std::{io, sync::Arc};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    hub::Hub,
    message::{display_line, parse_line, Event},
};

/// Counters reported once the input stream ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: u64,
    pub skipped: u64,
}

/// Reads newline-delimited JSON from `reader` and broadcasts each value as an
/// `avatar_json` event. Malformed lines are logged and skipped.
pub async fn relay_lines<R>(reader: &mut R, hub: &Hub) -> io::Result<RelayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = RelayStats::default();
    let mut line = Vec::new();
    let mut line_number: u64 = 0;

    loop {
        line.clear();
        let bytes = reader.read_until(b'\n', &mut line).await?;
        if bytes == 0 {
            return Ok(stats);
        }
        line_number += 1;

        match parse_line(&line) {
            Ok(Some(payload)) => {
                let receivers = hub.broadcast(Event::avatar(payload));
                debug!(line = line_number, receivers, "relayed input line");
                stats.forwarded += 1;
            }
            Ok(None) => {}
            Err(error) => {
                warn!(
                    line = line_number,
                    %error,
                    input = %display_line(&line),
                    "skipping malformed json line"
                );
                stats.skipped += 1;
            }
        }
    }
}

/// Runs [`relay_lines`] over the process's standard input.
pub async fn relay_stdin(hub: Arc<Hub>) -> io::Result<RelayStats> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let stats = relay_lines(&mut stdin, &hub).await?;
    info!(
        forwarded = stats.forwarded,
        skipped = stats.skipped,
        "standard input closed"
    );
    Ok(stats)
}
