//! jam-fuzzer — the block-producing driver side of the conformance
//! harness. Connects to a target's socket, runs a generator or trace
//! provider against it, and writes a JSON report.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use jam_fuzzer::{report, runner, FuzzerClient, GeneratorProvider, TraceProvider};
use jam_wire::params::ParamsProfile;
use tokio::net::UnixStream;

struct Cli {
    socket: PathBuf,
    seed: u64,
    blocks: usize,
    output: Option<PathBuf>,
    verbose: bool,
    params: Option<ParamsProfile>,
    trace: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let mut socket = None;
    let mut seed = 0u64;
    let mut blocks = 100usize;
    let mut output = None;
    let mut verbose = false;
    let mut params = None;
    let mut trace = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--socket" => {
                i += 1;
                socket = Some(PathBuf::from(
                    args.get(i).context("--socket requires a value")?,
                ));
            }
            "--seed" => {
                i += 1;
                seed = args
                    .get(i)
                    .context("--seed requires a value")?
                    .parse()
                    .context("--seed must be a u64")?;
            }
            "--blocks" => {
                i += 1;
                blocks = args
                    .get(i)
                    .context("--blocks requires a value")?
                    .parse()
                    .context("--blocks must be a number")?;
            }
            "--output" => {
                i += 1;
                output = Some(PathBuf::from(
                    args.get(i).context("--output requires a value")?,
                ));
            }
            "--verbose" => verbose = true,
            "--params" => {
                i += 1;
                let value = args.get(i).context("--params requires a value")?;
                params = Some(value.parse().context("--params must be \"tiny\" or \"full\"")?);
            }
            "--trace" => {
                i += 1;
                trace = Some(PathBuf::from(
                    args.get(i).context("--trace requires a value")?,
                ));
            }
            other => bail!("unknown option: {other}"),
        }
        i += 1;
    }

    Ok(Cli {
        socket: socket.context("--socket is required")?,
        seed,
        blocks,
        output,
        verbose,
        params,
        trace,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let filter = if cli.verbose {
        "jam_fuzzer=debug,jam_wire=debug,jam_state=debug"
    } else {
        "jam_fuzzer=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let params = jam_wire::Params::resolve(cli.params);
    tracing::info!(seed = cli.seed, blocks = cli.blocks, profile = params.profile.as_str(), "jam-fuzzer starting");

    let stream = UnixStream::connect(&cli.socket)
        .await
        .with_context(|| format!("connecting to {}", cli.socket.display()))?;
    let mut client = FuzzerClient::new(stream, cli.seed);

    let result = if let Some(trace_path) = &cli.trace {
        let mut provider = TraceProvider::load(trace_path)
            .with_context(|| format!("loading trace {}", trace_path.display()))?;
        runner::run(&mut client, &mut provider, cli.seed).await?
    } else {
        let mut provider = GeneratorProvider::new(cli.seed, cli.blocks, &params);
        runner::run(&mut client, &mut provider, cli.seed).await?
    };

    let report = report::build(&result, cli.blocks, params.profile.as_str());
    let json = serde_json::to_string_pretty(&report)?;

    match &cli.output {
        Some(path) => std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }

    if result.success {
        tracing::info!(blocks_processed = result.blocks_processed, "run succeeded");
        Ok(())
    } else {
        tracing::error!(err = ?result.err, "run ended with a mismatch or error");
        std::process::exit(1);
    }
}
