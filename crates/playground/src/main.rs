use std::process;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::StreamExt;
use rand::Rng;
use select_parallel::{CancellationToken, MaxParallel, Outcome, SelectOptions, Strategy};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq)]
struct Args {
    strategy: Strategy,
    count: u64,
    /// `None` defers to `SelectOptions::default()`, which reads the environment.
    max_parallel: Option<usize>,
    max_delay_ms: u64,
    even_only: bool,
    json: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            strategy: Strategy::SlotPipeline,
            count: 10,
            max_parallel: None,
            max_delay_ms: 1000,
            even_only: false,
            json: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    strategy: Strategy,
    count: u64,
    max_parallel: usize,
    values: Vec<u64>,
    faults: usize,
    cancelled: usize,
    elapsed_ms: u64,
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: select-parallel-playground [options]");
            eprintln!();
            eprintln!("Options:");
            eprintln!(
                "  --strategy <name>     gate-and-race, slot-pipeline, managed-pipe, data-parallel [default: slot-pipeline]"
            );
            eprintln!("  --count <n>           Number of elements [default: 10]");
            eprintln!(
                "  --max-parallel <n>    Transforms in flight at once [default: $SELECT_PARALLEL_MAX or host parallelism]"
            );
            eprintln!("  --max-delay-ms <ms>   Upper bound of the random delay [default: 1000]");
            eprintln!("  --even                Only report even values");
            eprintln!("  --json                Print a JSON summary instead of one line per value");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_directives(
            std::env::var("SELECT_PARALLEL_LOG").ok().as_deref(),
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    let json_layer = use_json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!use_json).then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}

/// Filter directives for both crates at the level named by `SELECT_PARALLEL_LOG`.
fn default_directives(level: Option<&str>) -> String {
    let level = match level {
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };
    format!("select_parallel={level},select_parallel_playground={level}")
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();

    let mut i = 1; // skip argv[0]
    while i < argv.len() {
        match argv[i].as_str() {
            "--strategy" => {
                i += 1;
                let name = argv.get(i).ok_or("--strategy requires a value")?;
                args.strategy = name.parse().map_err(|e| format!("{e}"))?;
            }
            "--count" => {
                i += 1;
                args.count = parse_number(argv.get(i), "--count")?;
            }
            "--max-parallel" => {
                i += 1;
                let max_parallel: usize = parse_number(argv.get(i), "--max-parallel")?;
                if max_parallel == 0 {
                    return Err("--max-parallel must be at least 1".to_string());
                }
                args.max_parallel = Some(max_parallel);
            }
            "--max-delay-ms" => {
                i += 1;
                args.max_delay_ms = parse_number(argv.get(i), "--max-delay-ms")?;
            }
            "--even" => args.even_only = true,
            "--json" => args.json = true,
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(args)
}

fn parse_number<N: std::str::FromStr>(value: Option<&String>, flag: &str) -> Result<N, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{value}'"))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = match args.max_parallel {
        Some(n) => SelectOptions::new(MaxParallel::new(n).context("invalid --max-parallel")?),
        None => SelectOptions::default(),
    };
    let max_parallel = options.max_parallel;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling remaining work");
            ctrl_c.cancel();
        }
    });

    let max_delay_ms = args.max_delay_ms;
    let transform = move |v: u64| {
        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..=max_delay_ms));
        async move {
            tokio::time::sleep(delay).await;
            Ok::<_, anyhow::Error>(v)
        }
    };

    tracing::info!(
        strategy = %args.strategy,
        count = args.count,
        max_parallel = %max_parallel,
        "Running"
    );

    let started = Instant::now();
    let options = options.with_cancel_token(cancel);
    let mut outcomes = args
        .strategy
        .select_parallel(0..args.count, transform, options);

    let mut summary = Summary {
        strategy: args.strategy,
        count: args.count,
        max_parallel: max_parallel.get(),
        values: Vec::new(),
        faults: 0,
        cancelled: 0,
        elapsed_ms: 0,
    };

    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Outcome::Value(v) if args.even_only && v % 2 != 0 => {}
            Outcome::Value(v) => {
                if !args.json {
                    println!("{v}");
                }
                summary.values.push(v);
            }
            Outcome::Fault(e) => {
                tracing::warn!(error = %e, "Transform failed");
                summary.faults += 1;
            }
            Outcome::Cancelled => summary.cancelled += 1,
        }
    }
    summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("serializing summary")?;
        println!("{json}");
    } else {
        tracing::info!(
            values = summary.values.len(),
            faults = summary.faults,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed_ms,
            "Done"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("select-parallel-playground")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn log_level_directives() {
        assert_eq!(
            default_directives(None),
            "select_parallel=info,select_parallel_playground=info"
        );
        assert_eq!(
            default_directives(Some("warning")),
            "select_parallel=warn,select_parallel_playground=warn"
        );
        assert_eq!(
            default_directives(Some("debug")),
            "select_parallel=debug,select_parallel_playground=debug"
        );
        assert_eq!(
            default_directives(Some("verbose")),
            "select_parallel=info,select_parallel_playground=info"
        );
    }

    #[test]
    fn defaults_without_flags() {
        assert_eq!(Args::default().max_parallel, None);
        assert_eq!(parse_args(&argv(&[])), Ok(Args::default()));
    }

    #[test]
    fn all_flags() {
        let args = parse_args(&argv(&[
            "--strategy",
            "managed-pipe",
            "--count",
            "100",
            "--max-parallel",
            "10",
            "--max-delay-ms",
            "50",
            "--even",
            "--json",
        ]))
        .unwrap();
        assert_eq!(
            args,
            Args {
                strategy: Strategy::ManagedPipe,
                count: 100,
                max_parallel: Some(10),
                max_delay_ms: 50,
                even_only: true,
                json: true,
            }
        );
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = parse_args(&argv(&["--strategy", "round-robin"])).unwrap_err();
        assert!(err.starts_with("unknown strategy 'round-robin'"));
    }

    #[test]
    fn rejects_zero_parallelism() {
        let err = parse_args(&argv(&["--max-parallel", "0"])).unwrap_err();
        assert_eq!(err, "--max-parallel must be at least 1");
    }

    #[test]
    fn missing_value() {
        let err = parse_args(&argv(&["--count"])).unwrap_err();
        assert_eq!(err, "--count requires a value");
    }

    #[test]
    fn summary_json_shape() {
        let summary = Summary {
            strategy: Strategy::ManagedPipe,
            count: 4,
            max_parallel: 2,
            values: vec![2, 0],
            faults: 1,
            cancelled: 1,
            elapsed_ms: 1234,
        };
        insta::assert_json_snapshot!(summary, @r#"
        {
          "strategy": "managed-pipe",
          "count": 4,
          "max_parallel": 2,
          "values": [
            2,
            0
          ],
          "faults": 1,
          "cancelled": 1,
          "elapsed_ms": 1234
        }
        "#);
    }

    #[test]
    fn rejects_positional_arguments() {
        let err = parse_args(&argv(&["extra"])).unwrap_err();
        assert_eq!(err, "unexpected argument: extra");
    }
}
