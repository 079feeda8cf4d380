//! CLI entry point for figdice

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "figdice")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Configuration file (defaults to <cwd>/figdice.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template
    #[command(alias = "r")]
    Render {
        /// Template path, relative to the template root
        template: String,

        /// JSON or YAML file with the data to render
        #[arg(long)]
        data: Option<PathBuf>,

        /// Target language
        #[arg(short, long)]
        lang: Option<String>,

        /// Write the output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the dictionaries of a translation folder
    Check {
        /// Translation folder (defaults to the configured one)
        folder: Option<PathBuf>,
    },

    /// Compile every template of a folder into the cache
    Compile {
        /// Template folder (defaults to the template root)
        folder: Option<PathBuf>,
    },

    /// Empty the compile cache
    Clean,

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "figdice=debug,info"
    } else {
        "figdice=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workspace = figdice::Workspace::new(&base_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            template,
            data,
            lang,
            output,
        } => {
            tracing::debug!("Rendering {}", template);
            workspace.render(&template, data.as_deref(), lang.as_deref(), output.as_deref())?;
        }

        Commands::Check { folder } => {
            let report = workspace.check(folder.as_deref())?;
            for (file, key) in &report.duplicates {
                println!("{}: duplicate key \"{}\"", file, key);
            }
            for (file, message) in &report.errors {
                println!("{}: {}", file, message);
            }
            println!(
                "Checked {} dictionaries ({} entries)",
                report.files, report.entries
            );
            if !report.is_clean() {
                bail!(
                    "{} duplicate key(s), {} unreadable file(s)",
                    report.duplicates.len(),
                    report.errors.len()
                );
            }
        }

        Commands::Compile { folder } => {
            let report = workspace.compile(folder.as_deref())?;
            for (template, message) in &report.failures {
                println!("{}: {}", template, message);
            }
            println!("Compiled {} templates", report.compiled);
            if !report.failures.is_empty() {
                bail!("{} template(s) failed to compile", report.failures.len());
            }
        }

        Commands::Clean => {
            tracing::info!("Cleaning compile cache...");
            workspace.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Version => {
            println!("figdice version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_reads_crate_metadata() {
        let command = Cli::command();
        command.clone().debug_assert();
        assert_eq!(command.get_version(), Some(env!("CARGO_PKG_VERSION")));
        assert_eq!(
            command.get_about().map(|about| about.to_string()),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
    }

    #[test]
    fn test_parse_render_arguments() {
        let cli = Cli::try_parse_from([
            "figdice", "--debug", "render", "page.xml", "--lang", "fr", "--data", "data.yml",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Render {
                template,
                lang,
                data,
                output,
            } => {
                assert_eq!(template, "page.xml");
                assert_eq!(lang.as_deref(), Some("fr"));
                assert_eq!(data, Some(PathBuf::from("data.yml")));
                assert!(output.is_none());
            }
            _ => panic!("expected the render command"),
        }
    }
}
