//! Physical frame allocation over the two free-frame bitmap words.
//!
//! A bit set in a bitmap word means the frame is free. Frame `i` is bit
//! `15 - i % 16` of word `3 + i / 16`, so scanning a word from its most
//! significant bit visits frames in increasing order.
//!
//! A frame is owned when its bitmap bit is clear and exactly one valid page
//! table entry names it. [`FrameAllocator`] is the only code that touches
//! either side, and it always changes both together.

use std::fmt;

use log::debug;

use crate::error::{AllocError, FreeError};
use crate::layout::{FRAME_COUNT, FREE_BITMAP_HIGH, FREE_BITMAP_LOW, OFFSET_BITS};
use crate::memory::{OsStatus, PhysicalMemory};
use crate::page_table::{PageTable, PageTableEntry, PteFlags};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameNumber(u8);

impl FrameNumber {
    pub const LAST: FrameNumber = FrameNumber(FRAME_COUNT as u8 - 1);

    pub fn new(index: u16) -> Option<Self> {
        (index < FRAME_COUNT).then(|| FrameNumber(index as u8))
    }

    /// The frame named by the top five bits of a page table entry.
    pub(crate) fn from_entry_bits(bits: u16) -> Self {
        FrameNumber((bits % FRAME_COUNT) as u8)
    }

    pub fn index(self) -> u16 {
        self.0 as u16
    }

    pub fn base_address(self) -> u16 {
        self.index() << OFFSET_BITS
    }

    fn bitmap_slot(self) -> (u16, u16) {
        let word = if self.0 < 16 { FREE_BITMAP_LOW } else { FREE_BITMAP_HIGH };

        (word, 1 << (15 - self.0 % 16))
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct FrameAllocator<'a> {
    memory: &'a mut PhysicalMemory,
}

impl<'a> FrameAllocator<'a> {
    pub fn new(memory: &'a mut PhysicalMemory) -> Self {
        FrameAllocator { memory }
    }

    /// Backs `page_number` of `table` with the lowest free frame.
    ///
    /// Nothing changes when the entry is already valid or no frame is free.
    pub fn allocate(
        &mut self,
        table: PageTable,
        page_number: u16,
        permissions: PteFlags,
    ) -> Result<FrameNumber, AllocError> {
        if table.get(self.memory, page_number).is_valid() {
            return Err(AllocError::AlreadyAllocated { page_number });
        }

        let frame = self.take_first_free().ok_or(AllocError::NoFreeFrames)?;

        table.set(self.memory, page_number, PageTableEntry::new(frame, permissions));

        if frame == FrameNumber::LAST {
            self.memory.set_status(OsStatus::LAST_FRAME_TAKEN, true);
        }

        debug!(
            "frame_allocator: page {} of table {:#06X} -> frame {} ({:?})",
            page_number,
            table.base(),
            frame,
            permissions
        );

        Ok(frame)
    }

    /// Returns the frame behind `page_number` of `table` to the bitmap and
    /// invalidates the entry.
    pub fn free(&mut self, table: PageTable, page_number: u16) -> Result<FrameNumber, FreeError> {
        let entry = table.get(self.memory, page_number);

        if !entry.is_valid() {
            return Err(FreeError::NotAllocated { page_number });
        }

        let frame = entry.frame();

        self.release(frame);
        table.set(self.memory, page_number, entry.invalidated());
        self.memory.set_status(OsStatus::LAST_FRAME_TAKEN, false);

        debug!(
            "frame_allocator: freed frame {} from page {} of table {:#06X}",
            frame,
            page_number,
            table.base()
        );

        Ok(frame)
    }

    /// Frees every valid entry of `table`, returning how many there were.
    pub fn free_all(&mut self, table: PageTable) -> usize {
        let pages: Vec<u16> = table.valid_pages(self.memory).map(|(page, _)| page).collect();

        pages
            .into_iter()
            .filter(|&page| self.free(table, page).is_ok())
            .count()
    }

    pub fn is_free(&self, frame: FrameNumber) -> bool {
        let (word, mask) = frame.bitmap_slot();

        self.memory.read(word) & mask != 0
    }

    pub fn free_count(&self) -> u32 {
        self.memory
            .free_bitmaps()
            .iter()
            .map(|word| word.count_ones())
            .sum()
    }

    fn take_first_free(&mut self) -> Option<FrameNumber> {
        for (first_frame, word) in [(0, FREE_BITMAP_LOW), (16, FREE_BITMAP_HIGH)] {
            let bits = self.memory.read(word);

            if bits != 0 {
                let frame = FrameNumber(first_frame + bits.leading_zeros() as u8);
                let (_, mask) = frame.bitmap_slot();

                self.memory.write(word, bits & !mask);

                return Some(frame);
            }
        }

        None
    }

    fn release(&mut self, frame: FrameNumber) {
        let (word, mask) = frame.bitmap_slot();

        debug_assert!(!self.is_free(frame), "frame {frame} released twice");

        let bits = self.memory.read(word);
        self.memory.write(word, bits | mask);
    }
}
