// mixtape CLI - download a YouTube playlist as MP3 files

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use mixtape::{
    default_dest_root, DownloadError, Downloader, EventLevel, PlaylistRequest, RunPolicy,
    YtDlpEngine,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Playlist or video URL; prompted for when omitted
    url: Option<String>,

    /// Destination root folder (defaults to the downloads folder)
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Skip the URL gate and treat a missing ffmpeg as a warning
    #[arg(long)]
    force: bool,

    /// Show engine progress and state changes
    #[arg(short, long)]
    verbose: bool,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<(), DownloadError> {
    let verbose = args.verbose;
    let quiet = args.quiet;

    let url = match args.url {
        Some(url) => url,
        None => prompt_for_url()?,
    };
    let dest_root = args.dest.unwrap_or_else(default_dest_root);
    let policy = if args.force {
        RunPolicy::lenient()
    } else {
        RunPolicy::strict()
    };

    let engine = YtDlpEngine::detect()?;
    let downloader = Downloader::new(Box::new(engine)).with_policy(policy);

    let request = PlaylistRequest::new(url, dest_root);
    let mut handle = downloader.spawn(request);

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping...");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        match event.level {
            EventLevel::Debug if verbose => println!("{}", event.text),
            EventLevel::Debug => {}
            EventLevel::Info if !quiet => println!("{}", event.text),
            EventLevel::Info => {}
            EventLevel::Warning => eprintln!("warning: {}", event.text),
            // The terminal failure is printed once by main, with its exit code
            EventLevel::Error => {}
        }
    }

    let outcome = handle.wait().await?;
    if !quiet {
        println!(
            "\n✅ Done: {} MP3 file(s) in {}",
            outcome.produced_files,
            outcome.dest_dir.display()
        );
    }
    Ok(())
}

fn prompt_for_url() -> Result<String, DownloadError> {
    print!("Enter the playlist or video URL: ");
    io::stdout()
        .flush()
        .map_err(|e| DownloadError::Unknown(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| DownloadError::Unknown(e.to_string()))?;
    Ok(line.trim().to_string())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
