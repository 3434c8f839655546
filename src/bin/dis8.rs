use std::path::PathBuf;
use std::process;

use chip8_vm::{Instruction, Opcode, Rom};
use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// A Chip-8 disassembler.
struct Cli {
    /// The binary ROM file to disassemble
    #[arg(long, value_name = "BINARY")]
    rom: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Cli::parse();
    let rom = match Rom::from_file(&args.rom) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("error reading Chip-8 ROM: {e}");
            process::exit(1);
        }
    };
    for line in disassemble(&rom) {
        println!("{line}");
    }
}

// One line per word; data that doesn't decode is emitted as DW/DB.
fn disassemble(rom: &Rom) -> Vec<String> {
    rom.words()
        .map(|(addr, word)| match *word {
            [hi, lo] => {
                let op = Opcode::from_bytes(hi, lo);
                match Instruction::decode(op) {
                    Some(instr) => format!("{addr:03X}: {op}  {instr}"),
                    None => format!("{addr:03X}: {op}  DW {:#06X}", op.0),
                }
            }
            [b] => format!("{addr:03X}: {b:02X}    DB {b:#04X}"),
            _ => unreachable!("ROM words are one or two bytes"),
        })
        .collect()
}
