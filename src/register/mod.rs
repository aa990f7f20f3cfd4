#[macro_use]
mod abi;
mod mem;
mod regs;

pub use self::mem::{read_into, read_to_vec};
pub use self::regs::Register::*;
pub use self::regs::{Register, Registers, Word};
