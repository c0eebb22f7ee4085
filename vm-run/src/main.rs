mod args;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use vm::layout::{FREE_BITMAP_HIGH, PAGES_PER_TABLE};
use vm::{IoConsole, Machine, PageTable, ProcessError};

use args::Args;

fn words_hex(words: impl IntoIterator<Item = u16>) -> String {
    words
        .into_iter()
        .map(|word| hex::encode(word.to_be_bytes()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prints the OS region, then each PCB with its page table.
fn dump(machine: &Machine) {
    let memory = machine.memory();

    eprintln!("os: {}", words_hex((0..=FREE_BITMAP_HIGH).map(|a| memory.read(a))));

    for pid in 0..machine.process_count() {
        let pcb = machine.pcb(pid);
        let table = PageTable::at(pcb.ptbr);

        eprintln!(
            "pcb {pid}: {}  pt: {}",
            words_hex([pcb.pid, pcb.pc, pcb.ptbr]),
            words_hex((0..PAGES_PER_TABLE).map(|page| table.get(memory, page).raw()))
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse(std::env::args().skip(1))?;

    let mut machine = Machine::with_config(args.config)?;

    for (code, heap) in &args.images {
        match machine.create_process_from_files(code, heap) {
            Ok(pid) => info!("vm-run: pid {} from {} and {}", pid, code.display(), heap.display()),
            Err(e @ ProcessError::TableFull) => return Err(e.into()),
            Err(e) => warn!("vm-run: skipping {} and {}: {}", code.display(), heap.display(), e),
        }
    }

    if machine.process_count() == 0 {
        bail!("no process could be created");
    }

    machine.load_process(0)?;

    let mut console = IoConsole::stdio();
    let result = machine.run(&mut console);

    if args.dump {
        dump(&machine);
    }

    result.context("machine stopped")
}
