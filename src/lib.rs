//! A CHIP-8 virtual machine.
//!
//! The [`Chip8`] engine executes one instruction per [`Chip8::step`] call and
//! leaves pacing, rendering and input to the caller. Timers are ticked
//! separately through [`Chip8::tick_timers`].

pub mod chip8;
pub mod config;
pub mod display;
pub mod error;
pub mod instr;
pub mod rom;

pub use chip8::{Chip8, Key, RunState, Step};
pub use config::{Config, IndexMode};
pub use display::{Display, HEIGHT, WIDTH};
pub use error::{Fault, KeyError, RomError};
pub use instr::{Instruction, Opcode};
pub use rom::Rom;
