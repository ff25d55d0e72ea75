#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::fs;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::info;

use gaspp::{process, GaspConfig};

/// Translate gas assembly into the dialect accepted by Apple's legacy
/// assembler, then either print the result or pipe it into the real
/// assembler binary.
///
/// This is a minimal stand-in for the outer command-line driver: input
/// type detection, argument-list rewriting for the downstream assembler,
/// and architecture autodetection from the tool binary name are all
/// external collaborators this crate does not attempt to reproduce in
/// full.
#[derive(Parser, Debug)]
#[command(name = "gaspp-cli", version, about)]
struct Cli {
    /// Target architecture; selects the comment character and the
    /// architecture-specific rewrites.
    #[arg(long, value_enum, default_value_t = ArchArg::Arm)]
    arch: ArchArg,

    /// Disable `.unreq` uppercase duplication (enabled by default).
    #[arg(long)]
    no_fix_unreq: bool,

    /// Assembler binary to pipe the result into. If omitted, the result
    /// is printed to stdout instead.
    #[arg(long)]
    assembler: Option<String>,

    /// Input file. Reads stdin if omitted.
    input: Option<String>,

    /// Arguments forwarded verbatim to the assembler, after `--`.
    #[arg(last = true)]
    assembler_args: Vec<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ArchArg {
    Arm,
    Powerpc,
}

impl std::fmt::Display for ArchArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchArg::Arm => write!(f, "arm"),
            ArchArg::Powerpc => write!(f, "powerpc"),
        }
    }
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{}: {err}", "gaspp-cli".red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    info!("target architecture: {}", cli.arch);

    let source = match &cli.input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    let lines: Vec<String> = source.lines().map(str::to_string).collect();

    let base = match cli.arch {
        ArchArg::Arm => GaspConfig::for_arm(),
        ArchArg::Powerpc => GaspConfig::for_powerpc(),
    };
    let config = base.with_fix_unreq(!cli.no_fix_unreq);

    let output = process(&config, &lines)?;
    info!("produced {} output lines", output.len());
    let rendered = format!("{}\n", output.join("\n"));

    match &cli.assembler {
        Some(assembler) => {
            info!("piping output into assembler `{assembler}`");
            pipe_to_assembler(assembler, &cli.assembler_args, &rendered)
        }
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

fn pipe_to_assembler(assembler: &str, extra_args: &[String], rendered: &str) -> Result<()> {
    let mut child = Command::new(assembler)
        .args(extra_args)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning assembler `{assembler}`"))?;

    {
        let stdin = child
            .stdin
            .as_mut()
            .context("assembler did not expose a stdin pipe")?;
        stdin
            .write_all(rendered.as_bytes())
            .context("writing to assembler stdin")?;
    }

    let status = child.wait().context("waiting on assembler process")?;
    if !status.success() {
        anyhow::bail!(
            "assembler `{assembler}` exited with status {}",
            status.code().unwrap_or(-1)
        );
    }
    Ok(())
}
