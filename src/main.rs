//! `edfuse` — mounts an EdFS image at a mount point via FUSE.
//!
//! This binary is the only stand-in for the "host-kernel user-space
//! filesystem bridge" spec.md §1 declares an external collaborator: it opens
//! the image, builds an [`edfs::Fs`], wraps it in the `fuser`-facing
//! [`edfs::fuse_adapter::FuseFs`], and hands both to `fuser::mount2`. Argument
//! parsing uses `clap`'s derive API, the way `fuse-ufs`'s bridge binary does,
//! rather than the hand-rolled `ArgsOs` parser this repository's other
//! binaries use — see DESIGN.md for why this one surface departs from the
//! teacher's own arg parsing idiom.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;

use edfs::fuse_adapter::FuseFs;
use edfs::Fs;

/// Mount an EdFS image as a FUSE filesystem.
#[derive(Parser, Debug)]
#[command(name = "edfuse", version, about)]
struct Cli {
    /// Path to the EdFS image file.
    image: PathBuf,

    /// Directory to mount the filesystem at.
    mount_point: PathBuf,

    /// Stay attached to the controlling terminal instead of backgrounding.
    ///
    /// `fuser` defaults to foreground operation already (it does not
    /// reimplement libfuse's daemonizing fork); this flag exists so the
    /// CLI documents that behavior rather than silently diverging from
    /// tools built on the C `libfuse`.
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Mount option in `-o key[=value]` form, forwarded to the FUSE session.
    /// May be repeated.
    #[arg(short = 'o', long = "option", value_name = "OPT")]
    options: Vec<String>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (repeatable).
    #[arg(short = 'q', long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn verbosity_filter(verbose: u8, quiet: u8) -> log::LevelFilter {
    let level = 2 + verbose as i8 - quiet as i8;
    match level {
        i8::MIN..=0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn mount_options(cli: &Cli) -> Vec<MountOption> {
    let mut opts = vec![MountOption::FSName("edfs".into())];
    for raw in &cli.options {
        match raw.as_str() {
            "ro" => opts.push(MountOption::RO),
            "rw" => opts.push(MountOption::RW),
            "allow_other" => opts.push(MountOption::AllowOther),
            "allow_root" => opts.push(MountOption::AllowRoot),
            "auto_unmount" => opts.push(MountOption::AutoUnmount),
            other => opts.push(MountOption::CUSTOM(other.to_string())),
        }
    }
    opts
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(verbosity_filter(cli.verbose, cli.quiet))
        .format_timestamp(None)
        .init();

    log::info!(
        "mounting {} at {} (foreground={})",
        cli.image.display(),
        cli.mount_point.display(),
        cli.foreground
    );

    let fs = Fs::open(&cli.image)?;
    let options = mount_options(&cli);
    fuser::mount2(FuseFs::new(fs), &cli.mount_point, &options)?;

    log::info!("unmounted {}", cli.mount_point.display());
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = run() {
        log::error!("edfuse: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
