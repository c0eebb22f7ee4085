//! Where everything lives in physical memory.
//!
//! | words             | contents                                   |
//! |-------------------|--------------------------------------------|
//! | `0`               | id of the running process (`0xFFFF`: none) |
//! | `1`               | processes ever created                     |
//! | `2`               | OS status flags                            |
//! | `3..=4`           | free-frame bitmaps (frames 0-15, 16-31)    |
//! | `12..`            | process control blocks, 3 words each       |
//! | `4096..6144`      | page tables, 32 entries per process        |
//! | `6144..`          | frames 3-31, handed out to processes       |

/// Words of physical memory.
pub const MEMORY_WORDS: usize = 1 << 16;

/// Words per page and per physical frame.
pub const PAGE_WORDS: usize = 2048;

/// Bits of a virtual address that address a word inside its page.
pub const OFFSET_BITS: u16 = 11;
pub const OFFSET_MASK: u16 = (1 << OFFSET_BITS) - 1;

/// Physical frames, and virtual pages in one address space.
pub const FRAME_COUNT: u16 = 32;
pub const PAGES_PER_TABLE: u16 = 32;

pub const CUR_PROC_ID: u16 = 0;
pub const PROC_COUNT: u16 = 1;
pub const OS_STATUS: u16 = 2;
pub const FREE_BITMAP_LOW: u16 = 3;
pub const FREE_BITMAP_HIGH: u16 = 4;

/// Stored in [`CUR_PROC_ID`] when nothing runs and in a PCB's pid field once
/// the process has halted.
pub const NO_PROCESS: u16 = 0xFFFF;

pub const PCB_BASE: u16 = 12;
pub const PCB_SIZE: u16 = 3;
pub const PCB_PID: u16 = 0;
pub const PCB_PC: u16 = 1;
pub const PCB_PTBR: u16 = 2;

pub const PAGE_TABLE_BASE: u16 = 4096;

/// Page tables must fit in frame 2.
pub const MAX_PROCESSES: u16 = (3 * PAGE_WORDS as u16 - PAGE_TABLE_BASE) / PAGES_PER_TABLE;

/// Virtual pages `0..=LAST_RESERVED_PAGE` never map to anything.
pub const LAST_RESERVED_PAGE: u16 = 5;

/// First virtual page of the code segment.
pub const CODE_FIRST_PAGE: u16 = 6;

/// Virtual address of the first word of the code segment.
pub const DEFAULT_ENTRY_POINT: u16 = CODE_FIRST_PAGE << OFFSET_BITS;

/// Frames 0-2 hold the OS region, the PCBs and the page tables.
pub const INITIAL_FREE_LOW: u16 = 0b0001_1111_1111_1111;
pub const INITIAL_FREE_HIGH: u16 = 0xFFFF;

pub const fn pcb_address(pid: u16) -> u16 {
    PCB_BASE + pid * PCB_SIZE
}

pub const fn page_table_base(pid: u16) -> u16 {
    PAGE_TABLE_BASE + pid * PAGES_PER_TABLE
}

pub const fn page_number(address: u16) -> u16 {
    address >> OFFSET_BITS
}

pub const fn page_offset(address: u16) -> u16 {
    address & OFFSET_MASK
}
