use clap::{Parser, Subcommand};
use md_poster::presentation::ResolvedPresentation;
use md_poster::server::{self, ServerConfig};
use md_poster::{config, generate, output};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "md-poster")]
#[command(about = "Render Markdown as a themed poster page ready for screenshots")]
#[command(long_about = "\
Render Markdown as a themed poster page ready for screenshots

A poster is a card with a header band, the rendered Markdown, and a footer
band. Its look comes from poster.config.yaml; the Markdown comes from the
first source that has any:

  1. ?md=...       literal Markdown in the page query
  2. ?md_url=...   fetched over http(s), public addresses only, at most
                   1 MiB; the sample is shown if that fails
  3. content.markdown in the config
  4. the built-in sample document

Screenshot tooling should wait for

  #poster-root[data-config-ready=\"true\"]

which appears shortly after the page loads.

Run 'md-poster gen-config' to print a documented poster.config.yaml.")]
#[command(version = version_string())]
struct Cli {
    /// Poster config layered over the bundled one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve poster pages over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: String,
        /// Milliseconds from page load until the poster reports ready
        #[arg(long, default_value_t = 300)]
        ready_delay_ms: u64,
        /// Timeout for md_url fetches, in seconds
        #[arg(long, default_value_t = 10)]
        fetch_timeout_secs: u64,
        /// Allow md_url to fetch from loopback and private network addresses
        #[arg(long)]
        allow_private_fetch: bool,
    },
    /// Write one poster page per `## ` section of a Markdown file or directory
    Render {
        /// Markdown file, or a directory searched for .md files
        path: PathBuf,
        /// Output directory
        #[arg(long, default_value = "posters")]
        output: PathBuf,
        /// Milliseconds from page load until the poster reports ready
        #[arg(long, default_value_t = 300)]
        ready_delay_ms: u64,
    },
    /// Show how the config resolves, and which values fell back to defaults
    Check,
    /// Print a stock poster.config.yaml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Serve {
            listen,
            ready_delay_ms,
            fetch_timeout_secs,
            allow_private_fetch,
        } => {
            let poster_config = config::load_config(cli.config.as_deref())?;
            let server_config = ServerConfig {
                listen_addr: listen,
                ready_delay: Duration::from_millis(ready_delay_ms),
                fetch_timeout: Duration::from_secs(fetch_timeout_secs),
                allow_private_fetch,
            };
            println!("==> Serving posters on http://{}/", server_config.listen_addr);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(server_config, poster_config))?;
        }
        Command::Render {
            path,
            output: output_dir,
            ready_delay_ms,
        } => {
            let poster_config = config::load_config(cli.config.as_deref())?;
            let presentation = ResolvedPresentation::resolve_today(poster_config.as_ref());
            let ready_delay = Duration::from_millis(ready_delay_ms);
            println!("==> Rendering {} \u{2192} {}", path.display(), output_dir.display());
            let posters = generate::generate(&path, &output_dir, &presentation, ready_delay)?;
            output::print_generate_output(&posters, &output_dir);
        }
        Command::Check => {
            let poster_config = config::load_config(cli.config.as_deref())?;
            let (presentation, rejections) = ResolvedPresentation::resolve_with_report(
                poster_config.as_ref(),
                md_poster::presentation::today(),
            );
            output::print_presentation(&presentation, &rejections);
            if rejections.is_empty() {
                println!("==> Config is valid");
            } else {
                println!("==> {} value(s) fell back to defaults", rejections.len());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_yaml());
        }
    }

    Ok(())
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for `gen-config`.
fn init_logging(verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
