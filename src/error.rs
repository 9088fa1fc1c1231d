use std::fmt;
use std::io;
use std::path::Path;

use miette::{miette, Report, Severity};

// Image load errors. All are fatal before any instruction executes.

pub fn image_unreadable(path: &Path, err: &io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::unreadable",
        help = "check that the path points to an assembled LC-3 image",
        "Failed to load image {}: {err}",
        path.display(),
    )
}

pub fn image_empty(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::empty",
        help = "an image starts with a 16-bit origin word",
        "Image {} is missing an origin word",
        path.display(),
    )
}

pub fn image_misaligned(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::misaligned",
        help = "an image is a stream of big-endian 16-bit words",
        "Image {} is not aligned to 16 bits",
        path.display(),
    )
}

/// Faults raised by the run loop. These model undefined hardware behavior;
/// execution aborts, no recovery is attempted.
#[derive(Clone, Copy, Debug)]
pub enum RuntimeError {
    ReservedOpcode { opcode: u8, addr: u16 },
    UnknownTrap { vect: u8, addr: u16 },
}

impl std::error::Error for RuntimeError {}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedOpcode { opcode, addr } => {
                write!(f, "reserved opcode 0x{opcode:X} at address 0x{addr:04X}")
            }
            Self::UnknownTrap { vect, addr } => {
                write!(f, "unknown trap vector 0x{vect:02X} at address 0x{addr:04X}")
            }
        }
    }
}
