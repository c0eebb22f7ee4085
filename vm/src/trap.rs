//! Trap handlers. The scheduling traps (yield, halt) and heap-break run
//! the OS side of the machine; the rest are console I/O.

use log::{error, info, warn};

use crate::console::Console;
use crate::error::{AllocError, FreeError, VmError};
use crate::frame_allocator::{FrameAllocator, FrameNumber};
use crate::layout::page_number;
use crate::machine::Machine;
use crate::page_table::{PageTable, PteFlags};
use crate::process::Pcb;

pub const TRAP_GETC: u16 = 0x20;
pub const TRAP_OUT: u16 = 0x21;
pub const TRAP_PUTS: u16 = 0x22;
pub const TRAP_IN: u16 = 0x23;
pub const TRAP_PUTSP: u16 = 0x24;
pub const TRAP_HALT: u16 = 0x25;
pub const TRAP_INU16: u16 = 0x26;
pub const TRAP_OUTU16: u16 = 0x27;
pub const TRAP_YIELD: u16 = 0x28;
pub const TRAP_BRK: u16 = 0x29;

/// Heap-break request bits in R0.
const BRK_GROW: u16 = 1 << 0;
const BRK_READ: u16 = 1 << 1;
const BRK_WRITE: u16 = 1 << 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapBreak {
    Grow {
        page_number: u16,
        result: Result<FrameNumber, AllocError>,
    },
    Shrink {
        page_number: u16,
        result: Result<FrameNumber, FreeError>,
    },
}

/// A yield's outcome. `from == to` when nothing else could run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Switch {
    pub from: u16,
    pub to: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltOutcome {
    Switched(Switch),
    /// The halted process was the last one; the machine is stopped.
    MachineStopped,
}

impl Machine {
    pub(crate) fn trap<C: Console>(&mut self, vector: u16, console: &mut C) -> Result<(), VmError> {
        match vector {
            TRAP_GETC => {
                let c = console.get_char()?;
                self.regs.set(0, c);
            }
            TRAP_OUT => {
                console.put_char(self.regs.get(0) as u8)?;
                console.flush()?;
            }
            TRAP_PUTS => {
                self.put_string(console, false)?;
            }
            TRAP_IN => {
                let c = console.get_char()?;
                self.regs.set(0, c);
                if c != 0xFFFF {
                    console.put_char(c as u8)?;
                    console.flush()?;
                }
            }
            TRAP_PUTSP => {
                self.put_string(console, true)?;
            }
            TRAP_HALT => {
                self.dispatch_halt()?;
            }
            TRAP_INU16 => {
                if let Some(value) = console.get_u16()? {
                    self.regs.set(0, value);
                }
            }
            TRAP_OUTU16 => {
                console.put_str(&format!("{}\n", self.regs.get(0)))?;
                console.flush()?;
            }
            TRAP_YIELD => {
                self.dispatch_yield()?;
            }
            TRAP_BRK => {
                self.dispatch_heap_break()?;
            }
            _ => warn!("trap: unknown trap vector {:#04X}, ignoring", vector),
        }

        Ok(())
    }

    /// Writes the NUL-terminated string at the virtual address in R0, one
    /// character per word, or two per word (low byte first) when `packed`.
    fn put_string<C: Console>(&mut self, console: &mut C, packed: bool) -> Result<(), VmError> {
        let mut address = self.regs.get(0);

        loop {
            let word = self.read(address)?;

            if word == 0 {
                break;
            }

            if packed {
                console.put_char((word & 0xFF) as u8)?;
                let high = (word >> 8) as u8;
                if high != 0 {
                    console.put_char(high)?;
                }
            } else {
                console.put_char(word as u8)?;
            }

            address = address.wrapping_add(1);
        }

        console.flush()?;

        Ok(())
    }

    /// Grows or shrinks the heap of the running process by one page, as
    /// encoded in R0: bit 0 grow, bits 1-2 read/write, bits 11-15 the page.
    pub fn dispatch_heap_break(&mut self) -> Result<HeapBreak, VmError> {
        let pid = self.running_pid()?;
        let request = self.regs.get(0);
        let page = page_number(request);
        let table = PageTable::at(self.pcb(pid).ptbr);
        let mut frames = FrameAllocator::new(&mut self.memory);

        if request & BRK_GROW != 0 {
            let mut permissions = PteFlags::empty();
            permissions.set(PteFlags::READ, request & BRK_READ != 0);
            permissions.set(PteFlags::WRITE, request & BRK_WRITE != 0);

            info!("trap: heap increase requested by process {}", pid);

            let result = frames.allocate(table, page, permissions);
            if let Err(e) = result {
                warn!("trap: cannot allocate memory for page {} of pid {}: {}", page, pid, e);
            }

            Ok(HeapBreak::Grow {
                page_number: page,
                result,
            })
        } else {
            info!("trap: heap decrease requested by process {}", pid);

            let result = frames.free(table, page);
            if let Err(e) = result {
                warn!("trap: cannot free memory of pid {}: {}", pid, e);
            }

            Ok(HeapBreak::Shrink {
                page_number: page,
                result,
            })
        }
    }

    /// First live process after `from` in circular pid order. `from` itself
    /// is only a candidate when `include_self` is set, as the last one.
    fn next_runnable(&self, from: u16, include_self: bool) -> Option<u16> {
        let count = self.memory.process_count();
        let steps = if include_self { count } else { count.saturating_sub(1) };

        (1..=steps)
            .map(|step| ((from as u32 + step as u32) % count as u32) as u16)
            .find(|&pid| !self.pcb(pid).is_terminated())
    }

    fn running_pid(&mut self) -> Result<u16, VmError> {
        match self.memory.current_pid() {
            Some(pid) if pid < self.memory.process_count() => Ok(pid),
            _ => {
                error!("trap: scheduling trap with no process loaded");
                self.stop();
                Err(VmError::NoProcess)
            }
        }
    }

    /// Saves the running process's PC and passes the CPU to the next live
    /// process in pid order, possibly itself.
    pub fn dispatch_yield(&mut self) -> Result<Switch, VmError> {
        let from = self.running_pid()?;

        Pcb::save_pc(&mut self.memory, from, self.regs.pc);

        let to = self.next_runnable(from, true).unwrap_or(from);
        self.dispatch(to);

        if from != to {
            info!("trap: switching from process {} to {}", from, to);
        }

        Ok(Switch { from, to })
    }

    /// Terminates the running process, frees all of its frames and passes
    /// the CPU to the next live process. Stops the machine when none is left.
    pub fn dispatch_halt(&mut self) -> Result<HaltOutcome, VmError> {
        let from = self.running_pid()?;
        let table = PageTable::at(self.pcb(from).ptbr);

        Pcb::terminate(&mut self.memory, from);
        let freed = FrameAllocator::new(&mut self.memory).free_all(table);

        info!("trap: process {} halted, {} frames freed", from, freed);

        match self.next_runnable(from, false) {
            Some(to) => {
                self.dispatch(to);
                info!("trap: switching from process {} to {}", from, to);
                Ok(HaltOutcome::Switched(Switch { from, to }))
            }
            None => {
                info!("trap: no runnable process left, stopping");
                self.memory.set_current_pid(None);
                self.stop();
                Ok(HaltOutcome::MachineStopped)
            }
        }
    }
}
