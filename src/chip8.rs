use std::ops::Range;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Config, IndexMode};
use crate::display::Display;
use crate::error::{Fault, KeyError};
use crate::instr::{Instruction, Opcode};
use crate::rom::Rom;

/// Number of bytes in the Chip8's memory.
pub const MEM_BYTES: usize = 4096;
/// Address programs are loaded at, and where execution starts.
pub const PROGRAM_START: u16 = 0x200;
/// Maximum allowed bytes of a user's ROM.
pub const MAX_ROM_BYTES: usize = MEM_BYTES - PROGRAM_START as usize;

const STACK_DEPTH: usize = 16;
// VF: carry, borrow, shifted-out bit and sprite collision.
const FLAG: usize = 0x0F;
const GLYPH_BYTES: u16 = 5;

// Hex digit glyphs 0-F, 4x5 pixels each, installed at address 0.
const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// A key on the 16-key hex keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u8);

impl Key {
    pub fn code(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Key {
    type Error = KeyError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        if code <= 0x0F {
            Ok(Key(code))
        } else {
            Err(KeyError::OutOfRange(code))
        }
    }
}

/// Whether the machine can make progress on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Parked on FX0A until a key is reported; the result goes to `V[reg]`.
    AwaitingKey { reg: u8 },
}

/// Outcome of a step that didn't fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Executed(Instruction),
    /// FX0A found no key latched. `pc` didn't move.
    AwaitingKey,
}

// A pc must leave room for a whole two-byte instruction.
fn checked_pc(addr: u16) -> Result<u16, Fault> {
    if (addr as usize) + 1 < MEM_BYTES {
        Ok(addr)
    } else {
        Err(Fault::PcOutOfBounds { pc: addr })
    }
}

// How pc moves once an instruction has done its work.
enum Flow {
    Next,
    Skip,
    Jump(u16),
    Wait { reg: u8 },
}

impl Flow {
    fn skip_if(cond: bool) -> Self {
        if cond {
            Flow::Skip
        } else {
            Flow::Next
        }
    }
}

/// A Chip8 interpreter.
#[derive(Debug, Clone)]
pub struct Chip8 {
    memory: [u8; MEM_BYTES],
    registers: [u8; 16],
    stack: [u16; STACK_DEPTH],
    sp: u8,
    pc: u16,
    index: u16,
    dt: u8,
    st: u8,
    display: Display,
    key: Option<Key>,
    run_state: RunState,
    draw_dirty: bool,
    index_mode: IndexMode,
    rng: StdRng,
}

impl Chip8 {
    /// Returns a new Chip8 interpreter with the font installed and `rom` loaded.
    pub fn new(rom: &Rom, config: Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut chip8 = Chip8 {
            memory: [0; MEM_BYTES],
            registers: [0; 16],
            stack: [0; STACK_DEPTH],
            sp: 0,
            pc: PROGRAM_START,
            index: 0,
            dt: 0,
            st: 0,
            display: Display::new(),
            key: None,
            run_state: RunState::Running,
            draw_dirty: false,
            index_mode: config.index_mode,
            rng,
        };
        chip8.memory[..FONT.len()].copy_from_slice(&FONT);
        chip8.load(rom);
        debug!("loaded {} byte ROM, index mode {:?}", rom.len(), config.index_mode);
        chip8
    }

    // Loads the provided bytes into memory.
    fn load(&mut self, code: &[u8]) {
        let start = PROGRAM_START as usize;
        self.memory[start..start + code.len()].copy_from_slice(code);
    }

    /// Latches `key` as the currently pressed key, or releases it with `None`.
    pub fn report_key(&mut self, key: Option<Key>) {
        self.key = key;
    }

    /// Reports `key` and then executes one instruction.
    pub fn step_with_key(&mut self, key: Option<Key>) -> Result<Step, Fault> {
        self.report_key(key);
        self.step()
    }

    /// Fetches, decodes and executes the instruction at `pc`.
    pub fn step(&mut self) -> Result<Step, Fault> {
        self.advance().map_err(|fault| {
            warn!("{fault}");
            fault
        })
    }

    fn advance(&mut self) -> Result<Step, Fault> {
        let op = self.fetch()?;
        let Some(instr) = Instruction::decode(op) else {
            self.pc = checked_pc(self.pc + 2)?;
            self.run_state = RunState::Running;
            return Err(Fault::UnknownOpcode { pc: self.pc - 2, opcode: op.0 });
        };
        trace!("{:#05X}: {op}  {instr}", self.pc);

        // Falling through the last word of memory is caught before any effect lands.
        if !instr.transfers_control() {
            checked_pc(self.pc + 2)?;
        }
        match self.execute(instr)? {
            Flow::Next => self.pc += 2,
            Flow::Skip => self.pc = checked_pc(self.pc + 4)?,
            Flow::Jump(addr) => self.pc = addr,
            Flow::Wait { reg } => {
                if self.run_state == RunState::Running {
                    debug!("waiting for key into V{reg:X} at {:#05X}", self.pc);
                }
                self.run_state = RunState::AwaitingKey { reg };
                return Ok(Step::AwaitingKey);
            }
        }
        self.run_state = RunState::Running;
        Ok(Step::Executed(instr))
    }

    /// Counts both timers down by one, stopping at zero.
    pub fn tick_timers(&mut self) {
        self.dt = self.dt.saturating_sub(1);
        self.st = self.st.saturating_sub(1);
    }

    // Fetches the word at pc without moving it.
    fn fetch(&self) -> Result<Opcode, Fault> {
        let pc = checked_pc(self.pc)? as usize;
        Ok(Opcode::from_bytes(self.memory[pc], self.memory[pc + 1]))
    }

    // Memory range of `len` bytes starting at I.
    fn index_range(&self, len: usize) -> Result<Range<usize>, Fault> {
        let start = self.index as usize;
        let end = start + len;
        if end > MEM_BYTES {
            return Err(Fault::IndexOutOfBounds { index: self.index, len });
        }
        Ok(start..end)
    }

    fn execute(&mut self, instr: Instruction) -> Result<Flow, Fault> {
        use Instruction::*;

        let v = &mut self.registers;
        let flow = match instr {
            Clear => {
                self.display.clear();
                self.draw_dirty = true;
                Flow::Next
            }
            Return => {
                if self.sp == 0 {
                    return Err(Fault::StackUnderflow { pc: self.pc });
                }
                let ret = checked_pc(self.stack[self.sp as usize - 1])?;
                self.sp -= 1;
                Flow::Jump(ret)
            }
            Jump { addr } => Flow::Jump(checked_pc(addr)?),
            Call { addr } => {
                if self.sp as usize == STACK_DEPTH {
                    return Err(Fault::StackOverflow { pc: self.pc });
                }
                let addr = checked_pc(addr)?;
                self.stack[self.sp as usize] = self.pc + 2;
                self.sp += 1;
                Flow::Jump(addr)
            }
            SkipEqImm { x, nn } => Flow::skip_if(v[x as usize] == nn),
            SkipNeImm { x, nn } => Flow::skip_if(v[x as usize] != nn),
            SkipEqReg { x, y } => Flow::skip_if(v[x as usize] == v[y as usize]),
            SkipNeReg { x, y } => Flow::skip_if(v[x as usize] != v[y as usize]),
            LoadImm { x, nn } => {
                v[x as usize] = nn;
                Flow::Next
            }
            AddImm { x, nn } => {
                v[x as usize] = v[x as usize].wrapping_add(nn);
                Flow::Next
            }
            Copy { x, y } => {
                v[x as usize] = v[y as usize];
                Flow::Next
            }
            Or { x, y } => {
                v[x as usize] |= v[y as usize];
                Flow::Next
            }
            And { x, y } => {
                v[x as usize] &= v[y as usize];
                Flow::Next
            }
            Xor { x, y } => {
                v[x as usize] ^= v[y as usize];
                Flow::Next
            }
            // Flag writes come last so VF holds the flag even when X is F.
            AddReg { x, y } => {
                let (res, carry) = v[x as usize].overflowing_add(v[y as usize]);
                v[x as usize] = res;
                v[FLAG] = carry as u8;
                Flow::Next
            }
            SubReg { x, y } => {
                let (res, borrow) = v[x as usize].overflowing_sub(v[y as usize]);
                v[x as usize] = res;
                v[FLAG] = !borrow as u8;
                Flow::Next
            }
            ShiftRight { x, .. } => {
                let vx = v[x as usize];
                v[x as usize] = vx >> 1;
                v[FLAG] = vx & 0x01;
                Flow::Next
            }
            SubNeg { x, y } => {
                let (res, borrow) = v[y as usize].overflowing_sub(v[x as usize]);
                v[x as usize] = res;
                v[FLAG] = !borrow as u8;
                Flow::Next
            }
            ShiftLeft { x, .. } => {
                let vx = v[x as usize];
                v[x as usize] = vx << 1;
                v[FLAG] = vx >> 7;
                Flow::Next
            }
            LoadIndex { addr } => {
                self.index = addr;
                Flow::Next
            }
            JumpOffset { addr } => Flow::Jump(checked_pc(addr + v[0] as u16)?),
            Random { x, nn } => {
                let r: u8 = self.rng.gen();
                v[x as usize] = r & nn;
                Flow::Next
            }
            Draw { x, y, n } => {
                let (x0, y0) = (v[x as usize] as usize, v[y as usize] as usize);
                let sprite = self.index_range(n as usize)?;
                let blit = self.display.draw(x0, y0, &self.memory[sprite]);
                self.registers[FLAG] = blit.collision as u8;
                if blit.changed {
                    self.draw_dirty = true;
                }
                Flow::Next
            }
            SkipKey { x } => Flow::skip_if(self.key.map(Key::code) == Some(v[x as usize])),
            SkipNotKey { x } => Flow::skip_if(self.key.map(Key::code) != Some(v[x as usize])),
            LoadDelay { x } => {
                v[x as usize] = self.dt;
                Flow::Next
            }
            WaitKey { x } => match self.key.take() {
                Some(key) => {
                    v[x as usize] = key.code();
                    Flow::Next
                }
                None => Flow::Wait { reg: x },
            },
            SetDelay { x } => {
                self.dt = v[x as usize];
                Flow::Next
            }
            SetSound { x } => {
                self.st = v[x as usize];
                Flow::Next
            }
            AddIndex { x } => {
                self.index = self.index.wrapping_add(v[x as usize] as u16);
                Flow::Next
            }
            LoadGlyph { x } => {
                let digit = v[x as usize];
                if digit > 0x0F {
                    warn!("no glyph for {digit:#04X} in V{x:X}");
                }
                self.index = digit as u16 * GLYPH_BYTES;
                Flow::Next
            }
            StoreBcd { x } => {
                let vx = v[x as usize];
                let range = self.index_range(3)?;
                self.memory[range].copy_from_slice(&[vx / 100, vx / 10 % 10, vx % 10]);
                Flow::Next
            }
            StoreRegs { x } => {
                let count = x as usize + 1;
                let range = self.index_range(count)?;
                self.memory[range].copy_from_slice(&self.registers[..count]);
                self.advance_index(count);
                Flow::Next
            }
            LoadRegs { x } => {
                let count = x as usize + 1;
                let range = self.index_range(count)?;
                self.registers[..count].copy_from_slice(&self.memory[range]);
                self.advance_index(count);
                Flow::Next
            }
        };
        Ok(flow)
    }

    fn advance_index(&mut self, count: usize) {
        if self.index_mode == IndexMode::Advance {
            self.index += count as u16;
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.registers
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Return addresses currently on the stack, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp as usize]
    }

    pub fn delay_timer(&self) -> u8 {
        self.dt
    }

    pub fn sound_timer(&self) -> u8 {
        self.st
    }

    /// True while the sound timer is running.
    pub fn is_sound_active(&self) -> bool {
        self.st > 0
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// The latched key, if any.
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_waiting_for_key(&self) -> bool {
        matches!(self.run_state, RunState::AwaitingKey { .. })
    }

    /// Whether the display changed since the last [`Chip8::clear_draw_dirty`].
    pub fn is_draw_dirty(&self) -> bool {
        self.draw_dirty
    }

    pub fn clear_draw_dirty(&mut self) {
        self.draw_dirty = false;
    }
}
