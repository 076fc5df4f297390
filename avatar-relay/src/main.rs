use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tokio::{select, sync::oneshot};
use tracing::{info, warn};

use avatar_relay::{cli::Cli, relay, server::Server};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Piped stdout is parsed by supervisors, so colour only on a terminal.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    // Blocking stdin reads cannot be cancelled; don't wait for them on exit.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let server = Server::bind(cli.listen, cli.index.clone()).await?;
    let addr = server.local_addr()?;
    info!("listening on {}", addr);

    let (eof_tx, eof_rx) = oneshot::channel::<()>();
    let hub = server.hub();
    let relay_task = tokio::spawn(async move {
        if let Err(err) = relay::relay_stdin(hub).await {
            warn!(error = ?err, "failed to read standard input");
        }
        let _ = eof_tx.send(());
    });

    let exit_on_eof = cli.exit_on_eof;
    let shutdown = async move {
        select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = ?err, "failed to install ctrl-c handler");
                }
            }
            _ = eof_rx, if exit_on_eof => {}
        }
    };

    if let Err(err) = server.run_until(shutdown).await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }

    relay_task.abort();
    Ok(())
}
