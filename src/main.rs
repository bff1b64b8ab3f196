mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use stitch_av::ToolRegistry;
use stitch_core::config::Config;
use stitch_core::events::{CompositeObserver, JobEventLog, JobObserver, TracingObserver};
use stitch_core::{JobRequest, RawResolution};
use stitch_pipeline::JobRunner;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelstitch=trace,stitch_pipeline=trace,stitch_av=trace,stitch_core=debug,stitch_server=debug,tower_http=debug".to_string()
        } else {
            "reelstitch=info,stitch_pipeline=info,stitch_av=info,stitch_core=info,stitch_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = Config::load_or_default(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!(
                "Server will listen on {}:{}",
                config.server.host,
                config.server.port
            );

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(stitch_server::start(config))?;
            Ok(())
        }
        Commands::Run {
            url,
            format,
            resolution,
            events,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let request = JobRequest {
                playlist_url: url,
                format,
                resolution: resolution.map(RawResolution::Text),
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_once(config, request, events))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelstitch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_once(config: Config, request: JobRequest, print_events: bool) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let log = Arc::new(JobEventLog::default());
    let observers: Vec<Arc<dyn JobObserver>> =
        vec![Arc::new(TracingObserver), log.clone() as Arc<dyn JobObserver>];
    let runner =
        JobRunner::from_config(&config, &tools)?.with_observer(Arc::new(CompositeObserver::new(observers)));

    let outcome = runner.run_job(request).await;

    if print_events {
        let mut recorded = log.recent_events(usize::MAX);
        recorded.reverse();
        for event in &recorded {
            eprintln!("{}", serde_json::to_string(event)?);
        }
    }

    let descriptor = outcome.into_result()?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("Some tools are missing. Install yt-dlp and ffmpeg or set tools.*_path.")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Downloads: {} (served at {})",
        config.server.downloads_dir.display(),
        config.server.download_url_prefix
    );
    println!("  Work dir: {}", config.jobs.work_dir.display());
    println!(
        "  Timeouts: job {}s, merge {}s",
        config.jobs.job_timeout_secs, config.jobs.merge_timeout_secs
    );
    for warning in config.validate() {
        println!("  ! {warning}");
    }

    Ok(())
}
