use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use layerscan::{
    catalog::{catalog_source, CatalogOptions},
    cataloger::{all_catalogers, get_cataloger, Cataloger},
    config::Config,
    indexer::{index, DigestIndexer, FileDigest},
    logging::init_tracing,
    model::{CatalogResult, Ecosystem, SourceInfo},
    output::{format_result_to_string, print_result, OutputFormat},
    source::{Scope, Source},
};
use serde::Serialize;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    /// Results were produced but some files could not be cataloged.
    pub const PARTIAL: u8 = 2;
}

#[derive(Parser)]
#[command(name = "layerscan")]
#[command(
    author,
    version,
    about = "Inventory the packages inside a container image or directory"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the packages found in an image or directory
    Packages {
        /// Source to catalog: dir:<path>, image:<path>, or a bare path
        source: String,

        #[command(flatten)]
        args: CatalogArgs,

        /// Only run these catalogers (python, rust, javascript)
        #[arg(short, long, value_delimiter = ',')]
        cataloger: Vec<String>,

        /// Skip CPE generation
        #[arg(long)]
        no_cpes: bool,

        /// Run catalogers one after another
        #[arg(long)]
        no_parallel: bool,
    },

    /// Catalog packages and record a digest of every visible file
    PowerUser {
        /// Source to catalog: dir:<path>, image:<path>, or a bare path
        source: String,

        #[command(flatten)]
        args: CatalogArgs,
    },

    /// List available catalogers
    ListCatalogers,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Show version information
    Version {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = VersionFormat::Text)]
        output: VersionFormat,
    },
}

#[derive(clap::Args)]
struct CatalogArgs {
    /// Which layers to look at (squashed, all-layers)
    #[arg(short, long)]
    scope: Option<String>,

    /// Output format (table, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to file
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum VersionFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_tracing(&config.log, cli.verbose, cli.quiet)?;
    if let Some(e) = config_error {
        tracing::warn!(error = %format!("{:#}", e), "ignoring unreadable config file");
    }

    match cli.command {
        Commands::Packages {
            source,
            args,
            cataloger,
            no_cpes,
            no_parallel,
        } => {
            let catalogers = select_catalogers(&cataloger, &config)?;
            let mut options = config.catalog_options();
            options.generate_cpes &= !no_cpes;
            options.parallel &= !no_parallel;

            run_catalog(&source, &args, &config, catalogers, options, false).await
        }
        Commands::PowerUser { source, args } => {
            let catalogers = all_catalogers()?;
            let options = config.catalog_options();

            run_catalog(&source, &args, &config, catalogers, options, true).await
        }
        Commands::ListCatalogers => {
            list_catalogers()?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Version { output } => {
            print_version(output)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn select_catalogers(filter: &[String], config: &Config) -> Result<Vec<Box<dyn Cataloger>>> {
    let ecosystems: Vec<Ecosystem> = if filter.is_empty() {
        config.catalogers.clone()
    } else {
        filter
            .iter()
            .map(|name| Ecosystem::from_str(name).map_err(|e| anyhow::anyhow!(e)))
            .collect::<Result<_>>()?
    };

    if ecosystems.is_empty() {
        anyhow::bail!("No catalogers selected");
    }

    ecosystems
        .into_iter()
        .map(|ecosystem| get_cataloger(ecosystem).map_err(Into::into))
        .collect()
}

async fn run_catalog(
    specifier: &str,
    args: &CatalogArgs,
    config: &Config,
    catalogers: Vec<Box<dyn Cataloger>>,
    options: CatalogOptions,
    with_digests: bool,
) -> Result<u8> {
    let format_str = args.format.clone().unwrap_or(config.default_format.clone());
    let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
    let scope = match &args.scope {
        Some(scope) => Scope::from_str(scope)?,
        None => config.scope,
    };
    let is_interactive = format == OutputFormat::Table && args.output.is_none();

    let source = Source::open(specifier).with_context(|| format!("Failed to open {}", specifier))?;
    let info = SourceInfo {
        specifier: specifier.to_string(),
        kind: source.kind(),
        scope: source.image().map(|_| scope),
    };
    let image = source.image().cloned();
    let (resolver, cleanup) = source.into_resolver(scope)?;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Cataloging {} ({})...", specifier, scope));
        Some(pb)
    } else {
        None
    };

    let report = catalog_source(resolver.as_ref(), &catalogers, &options).await;

    let mut result = CatalogResult::new(info, report.packages);
    result.errors = report.errors.iter().map(|e| e.to_string()).collect();

    if with_digests {
        match image {
            Some(image) => {
                if let Some(ref pb) = progress {
                    pb.set_message("Indexing file digests...");
                }
                result.digests = tokio::task::spawn_blocking(move || -> layerscan::Result<Vec<FileDigest>> {
                    let digests = DigestIndexer::new(resolver.as_ref());
                    index(image.as_ref(), &[&digests])?;
                    Ok(digests.into_digests())
                })
                .await
                .context("Digest indexing panicked")??;
            }
            None => tracing::warn!("file digests are only recorded for image sources"),
        }
    }
    cleanup.run();

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Found {} packages", result.packages.len()));
    }

    if let Some(path) = &args.output {
        let content = format_result_to_string(&result, format)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
        eprintln!("Results written to: {}", path);
    } else {
        print_result(&result, format)?;
    }

    if result.errors.is_empty() {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::PARTIAL)
    }
}

fn list_catalogers() -> Result<()> {
    println!("Available catalogers:");
    println!();

    for cataloger in all_catalogers()? {
        println!(
            "  {:<12} {:<22}",
            cataloger.ecosystem().as_str(),
            cataloger.name()
        );
        println!("  {:<12} Files: {}", "", cataloger.patterns().join(", "));
        println!();
    }

    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'layerscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    application: &'static str,
    version: &'static str,
    platform: String,
    catalogers: Vec<String>,
}

fn print_version(format: VersionFormat) -> Result<()> {
    let info = VersionInfo {
        application: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        catalogers: all_catalogers()?.iter().map(|c| c.name().to_string()).collect(),
    };

    match format {
        VersionFormat::Text => {
            println!("Application: {}", info.application);
            println!("Version:     {}", info.version);
            println!("Platform:    {}", info.platform);
            println!("Catalogers:  {}", info.catalogers.join(", "));
        }
        VersionFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
    }

    Ok(())
}
