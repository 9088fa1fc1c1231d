use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use miette::Result;

use lc3vm::{Image, Machine, TermConsole, FAULT_STATUS};

/// A terminal virtual machine for the LC-3 instruction set architecture.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Assembled image files, loaded in order at their own origins
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut machine = Machine::new(TermConsole::new());
    for path in &args.images {
        if !args.minimal {
            file_message(MsgColor::Green, "Loading", path);
        }
        let image = Image::load_file(path)?;
        machine.load_image(&image);
    }

    if !args.minimal {
        message(MsgColor::Green, "Running", "loaded image");
    }
    if let Err(err) = machine.run() {
        message(MsgColor::Red, "Fault", &err.to_string());
        std::process::exit(FAULT_STATUS);
    }
    if !args.minimal {
        message(MsgColor::Green, "Completed", "execution halted");
    }
    Ok(())
}

enum MsgColor {
    Green,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Red => left.red(),
    };
    eprintln!("{left:>12} {right}");
}
