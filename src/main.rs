//! mountck - Disk image mount checker
//!
//! Build images from model assertions and verify their partitions mount.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;

use mountck::config::{self, Config};
use mountck::corpus;
use mountck::exe::SystemRunner;
use mountck::gadget::{self, Gadget};
use mountck::RunSummary;

#[derive(Parser)]
#[command(name = "mountck")]
#[command(about = "Verify that gadget-built disk images mount and are labeled correctly")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every model in a corpus directory and verify the images
    Run {
        /// Directory holding model assertion files
        corpus: PathBuf,
        /// Snap channel passed to the image builder
        #[arg(short, long, default_value = "edge")]
        channel: String,
        /// Only treat files with this suffix as models
        #[arg(long, default_value = config::MODEL_SUFFIX)]
        suffix: String,
    },
    /// Verify an already built image against its gadget description
    Verify {
        /// Path to gadget.yaml
        #[arg(short, long)]
        gadget: PathBuf,
        /// Path to the disk image
        #[arg(short, long)]
        image: PathBuf,
        /// Name to report the image under (default: image file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print which partitions a gadget expects to be mountable
    Expect {
        /// Path to gadget.yaml
        gadget: PathBuf,
    },
}

#[derive(Args)]
struct Options {
    /// Run tools directly even when not root
    #[arg(long, global = true)]
    no_sudo: bool,
    /// Where workdirs and mount points are created
    #[arg(long, global = true, value_name = "DIR")]
    mount_root: Option<PathBuf>,
    /// Required label of the root filesystem
    #[arg(long, global = true, default_value = config::ROOT_LABEL)]
    root_label: String,
    /// Image builder command
    #[arg(long, global = true, default_value = "ubuntu-image")]
    builder: String,
    /// Partition mapper command
    #[arg(long, global = true, default_value = "kpartx")]
    kpartx: String,
    /// Mount command
    #[arg(long, global = true, default_value = "mount")]
    mount: String,
    /// Unmount command
    #[arg(long, global = true, default_value = "umount")]
    umount: String,
    /// Label probe command
    #[arg(long, global = true, default_value = "blkid")]
    blkid: String,
}

impl Options {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            tools: config::Tools {
                builder: self.builder,
                kpartx: self.kpartx,
                mount: self.mount,
                umount: self.umount,
                blkid: self.blkid,
            },
            root_label: self.root_label,
            mount_root: self.mount_root.unwrap_or(defaults.mount_root.clone()),
            sudo: defaults.sudo && !self.no_sudo,
            ..defaults
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::builder();
    builder.format_timestamp(None).filter_level(level);
    // RUST_LOG still wins when set
    builder.parse_default_env();
    builder.init();
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = cli.options.into_config();

    match cli.command {
        Commands::Run {
            corpus,
            channel,
            suffix,
        } => {
            config.channel = channel;
            config.model_suffix = suffix;
            cmd_run(&config, &corpus)
        }
        Commands::Verify {
            gadget,
            image,
            name,
        } => cmd_verify(&config, &gadget, &image, name),
        Commands::Expect { gadget } => cmd_expect(&gadget),
    }
}

fn cmd_run(config: &Config, corpus_dir: &PathBuf) -> Result<bool> {
    if config.sudo {
        eprintln!("Note: not running as root, privileged commands will use sudo.");
    }

    let runner = SystemRunner::new(config.sudo);
    let summary = corpus::run_corpus(&runner, config, corpus_dir, &mut |result| {
        println!("{}", result.render())
    })
    .with_context(|| format!("Failed to verify models in {}", corpus_dir.display()))?;

    print_summary(&summary);
    Ok(summary.is_success())
}

fn cmd_verify(
    config: &Config,
    gadget_path: &PathBuf,
    image: &PathBuf,
    name: Option<String>,
) -> Result<bool> {
    let gadget = Gadget::load(gadget_path).context("Failed to load gadget description")?;
    let (_, volume) = gadget.single_volume()?;
    let name = name.unwrap_or_else(|| corpus::model_name(image));

    let runner = SystemRunner::new(config.sudo);
    let result = mountck::verify_image(&runner, config, &name, volume, image)
        .with_context(|| format!("Failed to verify {}", image.display()))?;

    println!("{}", result.render());
    Ok(result.is_ok())
}

fn cmd_expect(gadget_path: &PathBuf) -> Result<bool> {
    let gadget = Gadget::load(gadget_path).context("Failed to load gadget description")?;
    let (volume_name, volume) = gadget.single_volume()?;
    let expected = gadget::expected_mountability(volume);

    println!("=== Volume: {} ===", volume_name);
    let declared = volume.structures.iter().filter(|s| !s.is_mbr());
    for (slot, structure) in declared.enumerate() {
        let name = structure.name.as_deref().unwrap_or("(unnamed)");
        let fs = structure
            .filesystem
            .map(|fs| fs.to_string())
            .unwrap_or_else(|| "none".to_string());
        let status = if expected[slot] { "mount" } else { "skip" };
        println!("  {:>2}  [{}] {} ({})", slot, status, name, fs);
    }
    println!("  {:>2}  [mount] writable (implicit)", expected.len() - 1);

    Ok(true)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", summary.render());
}
