use std::error::Error;
use std::fs::File;
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use chip8_vm::{Chip8, Config, Display, Fault, IndexMode, Key, Rom, Step};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::{cursor, queue, terminal, ExecutableCommand};
use log::{error, info};

// Timers and the screen run at 60 Hz.
const FRAME: Duration = Duration::from_micros(16_667);
// Terminals rarely report key releases, so a press is held this many frames.
const KEY_HOLD_FRAMES: u8 = 6;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Runs a Chip-8 ROM in the terminal.
///
/// Keypad: 1 2 3 4 / q w e r / a s d f / z x c v. Esc quits.
/// Logging is off unless --log-file is given; RUST_LOG sets the filter.
struct Cli {
    /// The binary ROM file to run
    #[arg(long, value_name = "BINARY")]
    rom: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = 700)]
    ips: u32,

    /// Leave I unchanged after FX55/FX65 instead of advancing it
    #[arg(long)]
    fixed_index: bool,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Stop on any fault, not only addressing faults
    #[arg(long)]
    halt_on_fault: bool,

    /// Write logs to this file; the terminal is busy drawing the screen
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Cli::parse();
    if let Some(path) = &args.log_file {
        if let Err(e) = init_logging(path) {
            eprintln!("error opening log file {}: {e}", path.display());
            process::exit(1);
        }
    }
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// Sends env_logger output to `path` instead of stderr.
fn init_logging(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run(args: &Cli) -> Result<(), Box<dyn Error>> {
    let rom = Rom::from_file(&args.rom)?;
    let mut config = Config::default();
    if args.fixed_index {
        config = config.with_index_mode(IndexMode::Fixed);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let mut chip8 = Chip8::new(&rom, config);
    info!("running {}", args.rom.display());

    let mut term = Terminal::enter()?;
    let per_frame = (args.ips / 60).max(1);
    let mut keypad = Keypad::default();

    loop {
        let started = Instant::now();

        while event::poll(Duration::ZERO)? {
            if let Event::Key(ev) = event::read()? {
                if is_quit(&ev) {
                    return Ok(());
                }
                if let Some(latch) = keypad.handle(&ev) {
                    chip8.report_key(latch);
                }
            }
        }

        if let Err(fault) = run_frame(&mut chip8, &mut keypad, per_frame, args.halt_on_fault) {
            error!("halting: {fault}");
            return Err(fault.into());
        }

        if chip8.is_draw_dirty() {
            term.render(chip8.display())?;
            chip8.clear_draw_dirty();
        }
        term.status(&chip8)?;

        if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
}

// Runs one 60 Hz frame: up to `per_frame` instructions, then the timers and
// the keypad hold countdown.
fn run_frame(chip8: &mut Chip8, keypad: &mut Keypad, per_frame: u32, halt_on_fault: bool) -> Result<(), Fault> {
    for _ in 0..per_frame {
        match chip8.step() {
            Ok(Step::AwaitingKey) => break,
            Ok(Step::Executed(_)) => {}
            Err(fault) if halts(&fault, halt_on_fault) => return Err(fault),
            Err(_) => {}
        }
    }
    chip8.tick_timers();
    if let Some(latch) = keypad.tick() {
        chip8.report_key(latch);
    }
    Ok(())
}

fn halts(fault: &Fault, halt_on_fault: bool) -> bool {
    halt_on_fault || fault.is_fatal()
}

fn is_quit(ev: &KeyEvent) -> bool {
    ev.code == KeyCode::Esc
        || (ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL))
}

// Maps the left-hand block of a QWERTY keyboard onto the hex keypad:
// 1 2 3 C / 4 5 6 D / 7 8 9 E / A 0 B F.
fn hex_key(code: KeyCode) -> Option<Key> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    let hex = match c.to_ascii_lowercase() {
        '1' => 0x1,
        '2' => 0x2,
        '3' => 0x3,
        '4' => 0xC,
        'q' => 0x4,
        'w' => 0x5,
        'e' => 0x6,
        'r' => 0xD,
        'a' => 0x7,
        's' => 0x8,
        'd' => 0x9,
        'f' => 0xE,
        'z' => 0xA,
        'x' => 0x0,
        'c' => 0xB,
        'v' => 0xF,
        _ => return None,
    };
    Key::try_from(hex).ok()
}

// The last pressed key, released on a release event or after a timeout.
//
// `handle` and `tick` return the new latch only when it changes, so the
// machine sees each press once and FX0A can't consume it twice.
#[derive(Default)]
struct Keypad {
    held: Option<(Key, u8)>,
}

impl Keypad {
    fn handle(&mut self, ev: &KeyEvent) -> Option<Option<Key>> {
        let key = hex_key(ev.code)?;
        match ev.kind {
            KeyEventKind::Press => {
                self.held = Some((key, KEY_HOLD_FRAMES));
                Some(Some(key))
            }
            KeyEventKind::Repeat => {
                let repeat_of_held = matches!(self.held, Some((k, _)) if k == key);
                self.held = Some((key, KEY_HOLD_FRAMES));
                if repeat_of_held {
                    None
                } else {
                    Some(Some(key))
                }
            }
            KeyEventKind::Release => match self.held {
                Some((k, _)) if k == key => {
                    self.held = None;
                    Some(None)
                }
                _ => None,
            },
        }
    }

    fn tick(&mut self) -> Option<Option<Key>> {
        match self.held {
            Some((key, frames)) if frames > 1 => {
                self.held = Some((key, frames - 1));
                None
            }
            Some(_) => {
                self.held = None;
                Some(None)
            }
            None => None,
        }
    }

    fn latched(&self) -> Option<Key> {
        self.held.map(|(key, _)| key)
    }
}

// Owns raw mode and the alternate screen; restores both on drop.
struct Terminal {
    out: Stdout,
}

impl Terminal {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        out.execute(terminal::EnterAlternateScreen)?;
        out.execute(cursor::Hide)?;
        out.execute(terminal::Clear(terminal::ClearType::All))?;
        Ok(Terminal { out })
    }

    // Two pixel rows per text line, using half blocks.
    fn render(&mut self, display: &Display) -> io::Result<()> {
        let rows: Vec<_> = display.rows().collect();
        for (line, pair) in rows.chunks(2).enumerate() {
            let s: String = pair[0]
                .iter()
                .zip(pair[1].iter())
                .map(|(top, bottom)| match (top, bottom) {
                    (true, true) => '\u{2588}',
                    (true, false) => '\u{2580}',
                    (false, true) => '\u{2584}',
                    (false, false) => ' ',
                })
                .collect();
            queue!(self.out, cursor::MoveTo(0, line as u16), Print(s))?;
        }
        self.out.flush()
    }

    fn status(&mut self, chip8: &Chip8) -> io::Result<()> {
        let state = if chip8.is_waiting_for_key() { "waiting for key" } else { "running" };
        let sound = if chip8.is_sound_active() { "\u{266A}" } else { " " };
        let line = format!("pc {:#05X}  I {:#05X}  {sound} {state:<16}", chip8.pc(), chip8.index());
        queue!(self.out, cursor::MoveTo(0, 17), Print(line))?;
        self.out.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.out.execute(cursor::Show);
        let _ = self.out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn hex_keys_follow_keypad_layout() {
        let layout = "1234qwerasdfzxcv";
        let expected = [0x1, 0x2, 0x3, 0xC, 0x4, 0x5, 0x6, 0xD, 0x7, 0x8, 0x9, 0xE, 0xA, 0x0, 0xB, 0xF];
        for (c, hex) in layout.chars().zip(expected) {
            assert_eq!(hex_key(KeyCode::Char(c)).map(Key::code), Some(hex), "key {c}");
        }
        assert_eq!(hex_key(KeyCode::Char('p')), None);
        assert_eq!(hex_key(KeyCode::Enter), None);
    }

    fn with_kind(c: char, kind: KeyEventKind) -> KeyEvent {
        let mut ev = press(c);
        ev.kind = kind;
        ev
    }

    #[test]
    fn keypad_releases_after_hold_timeout() {
        let mut keypad = Keypad::default();
        let w = Key::try_from(0x5).unwrap();
        assert_eq!(keypad.handle(&press('w')), Some(Some(w)));
        for _ in 0..KEY_HOLD_FRAMES - 1 {
            assert_eq!(keypad.tick(), None);
            assert_eq!(keypad.latched(), Some(w));
        }
        assert_eq!(keypad.tick(), Some(None));
        assert_eq!(keypad.latched(), None);
        assert_eq!(keypad.tick(), None);
    }

    #[test]
    fn keypad_releases_on_release_event() {
        let mut keypad = Keypad::default();
        keypad.handle(&press('v'));
        assert_eq!(keypad.handle(&with_kind('c', KeyEventKind::Release)), None);
        assert_eq!(keypad.handle(&with_kind('v', KeyEventKind::Release)), Some(None));
        assert_eq!(keypad.latched(), None);
    }

    #[test]
    fn keypad_repeat_of_held_key_is_not_a_new_press() {
        let mut keypad = Keypad::default();
        keypad.handle(&press('1'));
        assert_eq!(keypad.handle(&with_kind('1', KeyEventKind::Repeat)), None);
        assert_eq!(keypad.handle(&press('p')), None);
    }

    #[test]
    fn one_press_completes_one_key_wait() {
        let rom = Rom::with_code(vec![
            0xF0, 0x0A, // wait for key into V0
            0xF1, 0x0A, // wait for key into V1
            0x12, 0x04, // spin
        ])
        .unwrap();
        let mut chip8 = Chip8::new(&rom, Config::default().with_seed(0));
        let mut keypad = Keypad::default();

        if let Some(latch) = keypad.handle(&press('1')) {
            chip8.report_key(latch);
        }
        for _ in 0..KEY_HOLD_FRAMES + 2 {
            run_frame(&mut chip8, &mut keypad, 10, false).unwrap();
        }
        assert_eq!(chip8.registers()[0], 0x1);
        assert_eq!(chip8.registers()[1], 0);
        assert_eq!(chip8.pc(), 0x202);
        assert!(chip8.is_waiting_for_key());

        if let Some(latch) = keypad.handle(&press('2')) {
            chip8.report_key(latch);
        }
        run_frame(&mut chip8, &mut keypad, 10, false).unwrap();
        assert_eq!(chip8.registers()[1], 0x2);
        assert_eq!(chip8.pc(), 0x204);
    }

    #[test]
    fn run_frame_stops_on_fatal_fault() {
        let rom = Rom::with_code(vec![0x1F, 0xFF]).unwrap();
        let mut chip8 = Chip8::new(&rom, Config::default());
        let mut keypad = Keypad::default();
        assert_eq!(run_frame(&mut chip8, &mut keypad, 10, false), Err(Fault::PcOutOfBounds { pc: 0xFFF }));
    }

    #[test]
    fn log_file_flag_is_optional() {
        let args = Cli::try_parse_from(["chip8-vm", "--rom", "game.ch8"]).unwrap();
        assert_eq!(args.log_file, None);
        let args = Cli::try_parse_from(["chip8-vm", "--rom", "game.ch8", "--log-file", "vm.log"]).unwrap();
        assert_eq!(args.log_file, Some(PathBuf::from("vm.log")));
    }

    #[test]
    fn init_logging_fails_on_unwritable_path() {
        assert!(init_logging(Path::new("/this/dir/does/not/exist/vm.log")).is_err());
    }

    #[test]
    fn only_addressing_faults_halt_by_default() {
        assert!(halts(&Fault::PcOutOfBounds { pc: 0xFFF }, false));
        assert!(!halts(&Fault::UnknownOpcode { pc: 0x200, opcode: 0x0123 }, false));
        assert!(halts(&Fault::StackUnderflow { pc: 0x200 }, true));
    }
}
