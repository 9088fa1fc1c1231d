// Instruction-set engine
mod instruction;
mod machine;
mod memory;
mod register;
pub use machine::{Machine, State};

// Boundary collaborators
mod console;
pub use console::{Console, TermConsole};
mod image;
pub use image::Image;

mod error;
pub use error::RuntimeError;

pub mod term;

/// Process exit status for a runtime fault (reserved opcode or unknown
/// trap vector), distinct from load failures and usage errors.
pub const FAULT_STATUS: i32 = 0xDD;
