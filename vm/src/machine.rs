use log::{error, trace, warn};

use crate::config::MachineConfig;
use crate::console::Console;
use crate::cpu::{Instruction, Opcode, Registers};
use crate::error::{Fault, VmError};
use crate::memory::PhysicalMemory;
use crate::mmu::{self, Access};
use crate::page_table::PageTable;

/// Physical memory, the live register set and the running flag. Several
/// machines can exist side by side.
pub struct Machine {
    pub(crate) memory: PhysicalMemory,
    pub(crate) regs: Registers,
    pub(crate) running: bool,
    pub(crate) config: MachineConfig,
}

impl Machine {
    /// A booted machine with the default configuration.
    pub fn new() -> Self {
        let mut machine = Machine {
            memory: PhysicalMemory::new(),
            regs: Registers::default(),
            running: true,
            config: MachineConfig::default(),
        };
        machine.init_os();
        machine
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, VmError> {
        config.validate()?;

        let mut machine = Machine::new();
        machine.config = config;

        Ok(machine)
    }

    /// Resets the OS bookkeeping region and marks the machine running.
    pub fn init_os(&mut self) {
        self.memory.init_os();
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn current_pid(&self) -> Option<u16> {
        self.memory.current_pid()
    }

    pub fn process_count(&self) -> u16 {
        self.memory.process_count()
    }

    fn translate(&mut self, address: u16, access: Access) -> Result<u16, Fault> {
        let table = PageTable::at(self.regs.ptbr);

        mmu::translate(&self.memory, table, address, access).map_err(|fault| {
            error!("{fault}");
            self.stop();
            fault
        })
    }

    /// Physical address of `address` in the running process, for a load.
    /// A fault stops the machine.
    pub fn translate_for_read(&mut self, address: u16) -> Result<u16, Fault> {
        self.translate(address, Access::Read)
    }

    /// Physical address of `address` in the running process, for a store.
    /// A fault stops the machine.
    pub fn translate_for_write(&mut self, address: u16) -> Result<u16, Fault> {
        self.translate(address, Access::Write)
    }

    pub fn read(&mut self, address: u16) -> Result<u16, Fault> {
        let physical = self.translate_for_read(address)?;

        Ok(self.memory.read(physical))
    }

    pub fn write(&mut self, address: u16, value: u16) -> Result<(), Fault> {
        let physical = self.translate_for_write(address)?;

        self.memory.write(physical, value);

        Ok(())
    }

    /// Runs until the last process halts or something stops the machine.
    pub fn run<C: Console>(&mut self, console: &mut C) -> Result<(), VmError> {
        while self.running {
            self.step(console)?;
        }

        console.flush()?;

        Ok(())
    }

    /// Fetches and executes one instruction. Any error stops the machine.
    pub fn step<C: Console>(&mut self, console: &mut C) -> Result<(), VmError> {
        let result = self.cycle(console);

        if result.is_err() {
            self.stop();
        }

        result
    }

    fn cycle<C: Console>(&mut self, console: &mut C) -> Result<(), VmError> {
        let pc = self.regs.pc;
        let inst = Instruction(self.read(pc)?);
        self.regs.pc = pc.wrapping_add(1);

        trace!("cpu: {:#06X}: {:?}", pc, inst);

        let regs = &mut self.regs;

        match inst.opcode() {
            Opcode::Br => {
                if regs.cond.intersects(inst.nzp()) {
                    regs.pc = regs.pc.wrapping_add(inst.offset9());
                }
            }
            Opcode::Add => {
                let rhs = if inst.is_immediate() { inst.imm5() } else { regs.get(inst.sr2()) };
                regs.set_cc(inst.dr(), regs.get(inst.sr1()).wrapping_add(rhs));
            }
            Opcode::And => {
                let rhs = if inst.is_immediate() { inst.imm5() } else { regs.get(inst.sr2()) };
                regs.set_cc(inst.dr(), regs.get(inst.sr1()) & rhs);
            }
            Opcode::Not => {
                regs.set_cc(inst.dr(), !regs.get(inst.sr1()));
            }
            Opcode::Jmp => {
                regs.pc = regs.get(inst.base_r());
            }
            Opcode::Jsr => {
                let target = if inst.is_long() {
                    regs.pc.wrapping_add(inst.offset11())
                } else {
                    regs.get(inst.base_r())
                };
                regs.set(7, regs.pc);
                regs.pc = target;
            }
            Opcode::Lea => {
                let address = regs.pc.wrapping_add(inst.offset9());
                regs.set_cc(inst.dr(), address);
            }
            Opcode::Ld => {
                let address = regs.pc.wrapping_add(inst.offset9());
                let value = self.read(address)?;
                self.regs.set_cc(inst.dr(), value);
            }
            Opcode::Ldi => {
                let pointer = regs.pc.wrapping_add(inst.offset9());
                let address = self.read(pointer)?;
                let value = self.read(address)?;
                self.regs.set_cc(inst.dr(), value);
            }
            Opcode::Ldr => {
                let address = regs.get(inst.base_r()).wrapping_add(inst.offset6());
                let value = self.read(address)?;
                self.regs.set_cc(inst.dr(), value);
            }
            Opcode::St => {
                let address = regs.pc.wrapping_add(inst.offset9());
                let value = regs.get(inst.dr());
                self.write(address, value)?;
            }
            Opcode::Sti => {
                let pointer = regs.pc.wrapping_add(inst.offset9());
                let value = regs.get(inst.dr());
                let address = self.read(pointer)?;
                self.write(address, value)?;
            }
            Opcode::Str => {
                let address = regs.get(inst.base_r()).wrapping_add(inst.offset6());
                let value = regs.get(inst.dr());
                self.write(address, value)?;
            }
            Opcode::Rti | Opcode::Res => {
                warn!("cpu: {:?} at {:#06X} is not supported, ignoring", inst, pc);
            }
            Opcode::Trap => {
                self.trap(inst.trap_vector(), console)?;
            }
        }

        Ok(())
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
