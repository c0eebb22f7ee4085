use std::fmt;
use std::io;

use crate::layout::page_number;

/// A memory access the running process is not allowed to make. Every fault
/// stops the whole machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The address lies in one of the reserved pages 0-5.
    ReservedPage { address: u16 },
    /// The page has no frame behind it.
    InvalidPage { address: u16 },
    /// A store to a page without the write bit.
    ReadOnlyPage { address: u16 },
    /// A load from a page without the read bit.
    WriteOnlyPage { address: u16 },
}

impl Fault {
    pub fn address(self) -> u16 {
        match self {
            Fault::ReservedPage { address }
            | Fault::InvalidPage { address }
            | Fault::ReadOnlyPage { address }
            | Fault::WriteOnlyPage { address } => address,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.address();
        let page = page_number(address);

        match self {
            Fault::ReservedPage { .. } => {
                write!(f, "segmentation fault at {address:#06X} (reserved page {page})")
            }
            Fault::InvalidPage { .. } => write!(
                f,
                "segmentation fault inside free space at {address:#06X} (page {page})"
            ),
            Fault::ReadOnlyPage { .. } => {
                write!(f, "cannot write to read-only page {page} at {address:#06X}")
            }
            Fault::WriteOnlyPage { .. } => {
                write!(f, "cannot read from write-only page {page} at {address:#06X}")
            }
        }
    }
}

impl std::error::Error for Fault {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    AlreadyAllocated { page_number: u16 },
    NoFreeFrames,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::AlreadyAllocated { page_number } => {
                write!(f, "page {page_number} is already allocated")
            }
            AllocError::NoFreeFrames => f.write_str("no free page frames"),
        }
    }
}

impl std::error::Error for AllocError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    NotAllocated { page_number: u16 },
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeError::NotAllocated { page_number } => {
                write!(f, "page {page_number} is not allocated")
            }
        }
    }
}

impl std::error::Error for FreeError {}

#[derive(Debug)]
pub enum ProcessError {
    /// The process table has no room for another PCB.
    TableFull,
    CodeSegment(AllocError),
    HeapSegment(AllocError),
    Image(io::Error),
    /// `load_process` was given a pid that was never created or has halted.
    NoSuchProcess(u16),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::TableFull => {
                f.write_str("the OS memory region is full, cannot create a new PCB")
            }
            ProcessError::CodeSegment(e) => write!(f, "cannot create code segment: {e}"),
            ProcessError::HeapSegment(e) => write!(f, "cannot create heap segment: {e}"),
            ProcessError::Image(e) => write!(f, "cannot load program image: {e}"),
            ProcessError::NoSuchProcess(pid) => write!(f, "no runnable process with pid {pid}"),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::CodeSegment(e) | ProcessError::HeapSegment(e) => Some(e),
            ProcessError::Image(e) => Some(e),
            _ => None,
        }
    }
}

/// Why [`crate::Machine::run`] stopped other than by its last process halting.
#[derive(Debug)]
pub enum VmError {
    Fault(Fault),
    Process(ProcessError),
    Console(io::Error),
    /// A scheduling trap ran while no process was loaded.
    NoProcess,
    InvalidConfig(&'static str),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Fault(e) => write!(f, "{e}"),
            VmError::Process(e) => write!(f, "{e}"),
            VmError::Console(e) => write!(f, "console error: {e}"),
            VmError::NoProcess => f.write_str("no process is loaded"),
            VmError::InvalidConfig(reason) => write!(f, "invalid machine configuration: {reason}"),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VmError::Fault(e) => Some(e),
            VmError::Process(e) => Some(e),
            VmError::Console(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Fault> for VmError {
    fn from(value: Fault) -> Self {
        VmError::Fault(value)
    }
}

impl From<ProcessError> for VmError {
    fn from(value: ProcessError) -> Self {
        VmError::Process(value)
    }
}

impl From<io::Error> for VmError {
    fn from(value: io::Error) -> Self {
        VmError::Console(value)
    }
}
