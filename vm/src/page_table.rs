use bitflags::bitflags;

use crate::frame_allocator::FrameNumber;
use crate::layout::{page_table_base, OFFSET_BITS, PAGES_PER_TABLE};
use crate::memory::PhysicalMemory;

bitflags! {
    /// Low bits of a page table entry. Bits 3-10 are unused and the frame
    /// number sits in bits 11-15.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u16 {
        const VALID = 1 << 0;
        const READ = 1 << 1;
        const WRITE = 1 << 2;
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct PageTableEntry(u16);

impl PageTableEntry {
    /// A valid entry mapping `frame` with the read/write bits of `permissions`.
    pub fn new(frame: FrameNumber, permissions: PteFlags) -> Self {
        let flags = PteFlags::VALID | (permissions & (PteFlags::READ | PteFlags::WRITE));

        PageTableEntry((frame.index() << OFFSET_BITS) | flags.bits())
    }

    pub const fn from_raw(raw: u16) -> Self {
        PageTableEntry(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    pub fn is_valid(self) -> bool {
        self.flags().contains(PteFlags::VALID)
    }

    pub fn can_read(self) -> bool {
        self.flags().contains(PteFlags::READ)
    }

    pub fn can_write(self) -> bool {
        self.flags().contains(PteFlags::WRITE)
    }

    pub fn frame(self) -> FrameNumber {
        FrameNumber::from_entry_bits(self.0 >> OFFSET_BITS)
    }

    /// The same entry with the valid bit cleared. Permission and frame bits
    /// stay behind but are never consulted again.
    pub fn invalidated(self) -> Self {
        PageTableEntry(self.0 & !PteFlags::VALID.bits())
    }
}

/// Handle on the 32 entries at `base..base + 32`, the value a process keeps
/// in its PTBR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageTable {
    base: u16,
}

impl PageTable {
    pub const fn at(base: u16) -> Self {
        PageTable { base }
    }

    pub const fn for_process(pid: u16) -> Self {
        PageTable::at(page_table_base(pid))
    }

    pub const fn base(self) -> u16 {
        self.base
    }

    fn entry_address(self, page_number: u16) -> u16 {
        debug_assert!(page_number < PAGES_PER_TABLE);

        self.base + page_number
    }

    pub fn get(self, memory: &PhysicalMemory, page_number: u16) -> PageTableEntry {
        PageTableEntry(memory.read(self.entry_address(page_number)))
    }

    pub fn set(self, memory: &mut PhysicalMemory, page_number: u16, entry: PageTableEntry) {
        memory.write(self.entry_address(page_number), entry.raw());
    }

    /// Virtual pages currently backed by a frame.
    pub fn valid_pages(self, memory: &PhysicalMemory) -> impl Iterator<Item = (u16, PageTableEntry)> + '_ {
        (0..PAGES_PER_TABLE)
            .map(move |page| (page, self.get(memory, page)))
            .filter(|(_, entry)| entry.is_valid())
    }
}
