// SPDX-License-Identifier: MIT

mod inspect;
mod size;
mod template;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::template::Template;

#[derive(Parser)]
#[command(name = "hdfinspect", version, about = "Create, inspect and check hdf container files", long_about = None)]
struct Cli {
    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty container file
    Create {
        /// File to create
        file: PathBuf,
        /// Creation and access template
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// Truncate the file if it already exists
        #[arg(long)]
        force: bool,
    },
    /// Print the superblock of a container file
    Info {
        file: PathBuf,
        /// Template whose [access] section selects the driver
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
    /// Verify signature, superblock and root group of a container file
    Check {
        file: PathBuf,
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
}

fn load_template(path: Option<&Path>) -> anyhow::Result<Template> {
    match path {
        Some(path) => {
            let template = Template::from_file(path)?;
            template.print_summary();
            Ok(template)
        }
        None => Ok(Template::default()),
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Create { file, template, force } => {
            let template = load_template(template.as_deref())?;
            println!("[hdfinspect] Creating container: {}", file.display());
            inspect::create(&file, &template, force)?.print();
        }
        Commands::Info { file, template } => {
            let template = load_template(template.as_deref())?;
            inspect::info(&file, &template)?.print();
        }
        Commands::Check { file, template } => {
            let template = load_template(template.as_deref())?;
            println!("[hdfinspect] Checking {}", file.display());
            let checks = inspect::check(&file, &template)?;
            checks.iter().for_each(inspect::Check::print);
            if !checks.iter().all(inspect::Check::passed) {
                anyhow::bail!("{} failed its checks", file.display());
            }
            println!("[hdfinspect] {}", "All checks passed".green());
        }
    }

    Ok(())
}
