//! mountfs server binary
//!
//! Rebuilds the virtual namespace from its RON config and runs one
//! inspection command against it.
//!
//! ## Usage
//!
//! ```bash
//! mountfs-server mounts
//! mountfs-server links
//! mountfs-server --config ~/mounts.ron ls /scratch
//! mountfs-server stat /scratch/project
//! mountfs-server cat /scratch/project/README.md
//! mountfs-server readlink /scratch/project
//! ```

mod constants;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use mountfs_kernel::{FileSystem, MountConfig, MountableFs};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use constants::{CONFIG_DIR_NAME, CONFIG_ENV_VAR, CONFIG_FILE_NAME};

fn print_usage() {
    eprintln!(
        r#"mountfs-server - mountable virtual filesystem

USAGE:
    mountfs-server [OPTIONS] <COMMAND>

COMMANDS:
    mounts                        List mount points and their backends
    links                         List symlinks and their raw targets
    ls <path>                     List a directory
    stat <path>                   Show metadata for a path
    cat <path>                    Print a file's contents
    readlink <path>               Print a symlink's raw target

OPTIONS:
    --config <PATH>               Config file (default: {config})
    --help, -h                    Show this help

ENVIRONMENT:
    {env_var}                Overrides the default config path
    RUST_LOG                      Log filter (default: info)
"#,
        config = default_config_path().display(),
        env_var = CONFIG_ENV_VAR,
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let explicit_config = match take_config_flag(&mut args) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = args.first().cloned() else {
        print_usage();
        return ExitCode::FAILURE;
    };

    if command == "--help" || command == "-h" {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let fs = match load_namespace(explicit_config).await {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command.as_str() {
        "mounts" => cmd_mounts(&fs),
        "links" => cmd_links(&fs),
        "ls" => cmd_ls(&fs, &args[1..]).await,
        "stat" => cmd_stat(&fs, &args[1..]).await,
        "cat" => cmd_cat(&fs, &args[1..]).await,
        "readlink" => cmd_readlink(&fs, &args[1..]),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs.shutdown().await {
        tracing::warn!("shutdown failed: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Remove `--config PATH` from `args`, returning the path if present.
fn take_config_flag(args: &mut Vec<String>) -> Result<Option<PathBuf>> {
    let Some(idx) = args.iter().position(|a| a == "--config") else {
        return Ok(None);
    };
    if idx + 1 >= args.len() {
        bail!("--config requires a path");
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Ok(Some(shellexpand::tilde(&value).as_ref().into()))
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Resolve the config path: `--config`, then the env var, then the default.
///
/// A missing default config yields an empty namespace; a missing explicit
/// one is an error.
async fn load_namespace(explicit: Option<PathBuf>) -> Result<MountableFs> {
    let (path, required) = match explicit {
        Some(path) => (path, true),
        None => match env::var(CONFIG_ENV_VAR) {
            Ok(value) => (PathBuf::from(shellexpand::tilde(&value).as_ref()), true),
            Err(_) => (default_config_path(), false),
        },
    };

    if !required && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, starting with an empty namespace");
        return Ok(MountableFs::new());
    }

    let config = MountConfig::load(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let fs = MountableFs::from_config(&config)
        .await
        .with_context(|| format!("replaying {}", path.display()))?;
    Ok(fs)
}

fn path_arg<'a>(args: &'a [String], command: &str) -> Result<&'a str> {
    match args.first() {
        Some(path) => Ok(path.as_str()),
        None => bail!("Usage: mountfs-server {command} <path>"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_mounts(fs: &MountableFs) -> Result<()> {
    let mounts: Vec<_> = fs
        .list_mounts()
        .into_iter()
        .map(|m| json!({ "path": m.path, "backend": m.backend }))
        .collect();
    print_json(&mounts)
}

fn cmd_links(fs: &MountableFs) -> Result<()> {
    let links: Vec<_> = fs
        .list_symlinks()
        .into_iter()
        .map(|l| json!({ "link": l.link_path, "target": l.target }))
        .collect();
    print_json(&links)
}

async fn cmd_ls(fs: &MountableFs, args: &[String]) -> Result<()> {
    let path = path_arg(args, "ls")?;
    let entries = fs
        .read_dir(path)
        .await
        .with_context(|| format!("ls {path}"))?;
    print_json(&entries)
}

async fn cmd_stat(fs: &MountableFs, args: &[String]) -> Result<()> {
    let path = path_arg(args, "stat")?;
    let info = fs.stat(path).await.with_context(|| format!("stat {path}"))?;
    print_json(&info)
}

async fn cmd_cat(fs: &MountableFs, args: &[String]) -> Result<()> {
    let path = path_arg(args, "cat")?;
    let data = fs.read_all(path).await.with_context(|| format!("cat {path}"))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_readlink(fs: &MountableFs, args: &[String]) -> Result<()> {
    let path = path_arg(args, "readlink")?;
    let target = fs.readlink(path).with_context(|| format!("readlink {path}"))?;
    println!("{target}");
    Ok(())
}
