//! jam-target — the implementation-under-test side of the conformance
//! harness. Binds a local socket, accepts one fuzzer connection, and runs
//! the message loop until `Kill` or stream EOF.

use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use jam_target::{ReferenceStf, TargetSession};
use jam_wire::params::ParamsProfile;
use jam_wire::message::Version;
use tokio::net::UnixListener;

struct Cli {
    socket: PathBuf,
    verbose: bool,
    trace_scope: Option<String>,
    params: Option<ParamsProfile>,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut socket = None;
    let mut verbose = false;
    let mut trace_scope = None;
    let mut params = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--socket" => {
                i += 1;
                socket = Some(PathBuf::from(
                    args.get(i).context("--socket requires a value")?,
                ));
            }
            "--verbose" => verbose = true,
            "--trace-scope" => {
                i += 1;
                trace_scope = Some(args.get(i).context("--trace-scope requires a value")?.clone());
            }
            "--params" => {
                i += 1;
                let value = args.get(i).context("--params requires a value")?;
                params = Some(value.parse().context("--params must be \"tiny\" or \"full\"")?);
            }
            other => bail!("unknown option: {other}"),
        }
        i += 1;
    }

    Ok(Cli {
        socket: socket.context("--socket is required")?,
        verbose,
        trace_scope,
        params,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let filter = if cli.verbose {
        "jam_target=debug,jam_wire=debug,jam_state=debug"
    } else {
        "jam_target=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let params = jam_wire::Params::resolve(cli.params);
    tracing::info!(profile = params.profile.as_str(), scope = ?cli.trace_scope, "jam-target starting");

    if let Ok(meta) = std::fs::symlink_metadata(&cli.socket) {
        if meta.file_type().is_socket() {
            std::fs::remove_file(&cli.socket)
                .with_context(|| format!("removing stale socket at {}", cli.socket.display()))?;
        }
    }

    let listener = UnixListener::bind(&cli.socket)
        .with_context(|| format!("binding socket at {}", cli.socket.display()))?;
    tracing::info!(socket = %cli.socket.display(), "listening");

    let (mut stream, _addr) = listener.accept().await.context("accepting connection")?;
    tracing::info!("fuzzer connected");

    let mut session = TargetSession::new(
        Box::new(ReferenceStf::default()),
        "jam-target",
        Version {
            major: 0,
            minor: 1,
            patch: 0,
        },
    );

    if let Err(e) = jam_target::run_session(&mut stream, &mut session).await {
        tracing::error!(error = %e, "session ended with an error");
        return Err(e.into());
    }

    tracing::info!("session closed");
    Ok(())
}
