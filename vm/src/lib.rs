//! A 16-bit word machine whose operating system lives in the same flat
//! memory it manages.
//!
//! Every load and store a guest program performs is translated through the
//! page table of the running process. Process control blocks, page tables
//! and the free-frame bitmaps are themselves words of that one physical
//! memory, laid out as described in [`layout`].

pub mod config;
pub mod console;
pub mod cpu;
pub mod error;
pub mod frame_allocator;
pub mod image;
pub mod layout;
pub mod machine;
pub mod memory;
pub mod mmu;
pub mod page_table;
pub mod process;
pub mod trap;

pub use config::MachineConfig;
pub use console::{Console, IoConsole};
pub use error::{AllocError, Fault, FreeError, ProcessError, VmError};
pub use frame_allocator::{FrameAllocator, FrameNumber};
pub use image::{ByteOrder, FileImage, ImageLoader, WordImage};
pub use machine::Machine;
pub use memory::{OsStatus, PhysicalMemory};
pub use mmu::Access;
pub use page_table::{PageTable, PageTableEntry, PteFlags};
pub use process::Pcb;
pub use trap::{HaltOutcome, HeapBreak, Switch};
