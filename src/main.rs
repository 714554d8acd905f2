mod cli;
mod init;
mod mirror_cmd;
mod query_cmd;

use clap::Parser;
use cli::{Cli, Commands};
use repo_context::config::{self, Settings};
use repo_context::error::MirrorError;
use repo_context::output::{self, ErrorOutput, OutputFormat};
use std::error::Error;
use std::time::Duration;

/// Failures that do not map onto a single library error.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{failed} of {total} repositories failed to synchronize")]
    Incomplete { failed: usize, total: usize },

    #[error("{0} could not be removed")]
    CleanupIncomplete(String),
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let format = match cli.format.as_deref().map(str::parse::<OutputFormat>) {
        None => OutputFormat::Text,
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            eprintln!("error[validation_failure]: {}", e);
            std::process::exit(1);
        }
    };

    let result = load_settings(&cli).and_then(|settings| match cli.command {
        Commands::Sync(args) => mirror_cmd::sync(args, &settings, format),
        Commands::SyncAll(args) => mirror_cmd::sync_all(args, &settings, format),
        Commands::Cleanup(args) => mirror_cmd::cleanup(args, &settings, format),
        Commands::Status(args) => mirror_cmd::status(args, &settings, format),
        Commands::Validate(args) => mirror_cmd::validate(args, &settings),
        Commands::Files(args) => query_cmd::files(args, &settings, format),
        Commands::Rank(args) => query_cmd::rank(args, &settings, format),
        Commands::Summary(args) => query_cmd::summary(args, &settings, format),
        Commands::Context(args) => query_cmd::context(args, &settings, format),
        Commands::Init(args) => init::run(args),
    });

    if let Err(e) = result {
        report_error(e.as_ref(), format);
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

/// Defaults, then config files and environment, then command-line flags.
fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut config = config::load_config();
    config.merge(config::Config {
        base_path: cli.base_path.clone(),
        command_timeout_secs: cli.timeout,
        ..config::Config::default()
    });
    let settings = Settings::from_config(config)?;
    log::debug!(
        "Mirrors under {}, command timeout {:?}",
        settings.base_path.display(),
        settings.command_timeout
    );
    Ok(settings)
}

fn report_error(err: &(dyn Error + 'static), format: OutputFormat) {
    let Some(mirror_err) = err.downcast_ref::<MirrorError>() else {
        eprintln!("error: {}", err);
        return;
    };

    let report = mirror_err.report();
    let rendered = match format {
        OutputFormat::Text => None,
        OutputFormat::Json => output::json::render(&ErrorOutput { error: &report }).ok(),
        OutputFormat::Xml => output::xml::render_error(&report).ok(),
    };
    match rendered {
        Some(doc) => println!("{}", doc),
        None => eprintln!("error[{}]: {}", report.kind, report.detail),
    }
}

pub(crate) fn deadline_from_secs(secs: Option<u64>) -> Option<std::time::Instant> {
    secs.map(|s| std::time::Instant::now() + Duration::from_secs(s))
}
