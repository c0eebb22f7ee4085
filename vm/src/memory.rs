use bitflags::bitflags;

use crate::frame_allocator::FrameNumber;
use crate::layout::{
    pcb_address, CUR_PROC_ID, FREE_BITMAP_HIGH, FREE_BITMAP_LOW, INITIAL_FREE_HIGH,
    INITIAL_FREE_LOW, MAX_PROCESSES, MEMORY_WORDS, NO_PROCESS, OS_STATUS, PAGE_WORDS, PCB_PID,
    PROC_COUNT,
};

bitflags! {
    /// Flags kept in the OS status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OsStatus: u16 {
        /// The process table has no slot left for another PCB.
        const TABLE_FULL = 1 << 0;
        /// Frame 31 was the last frame handed out. Any free clears it.
        const LAST_FRAME_TAKEN = 1 << 1;
    }
}

/// The one flat array of words everything lives in.
pub struct PhysicalMemory {
    words: Box<[u16]>,
}

impl PhysicalMemory {
    pub fn new() -> Self {
        PhysicalMemory {
            words: vec![0; MEMORY_WORDS].into_boxed_slice(),
        }
    }

    pub fn read(&self, address: u16) -> u16 {
        self.words[address as usize]
    }

    pub fn write(&mut self, address: u16, value: u16) {
        self.words[address as usize] = value;
    }

    pub fn frame(&self, frame: FrameNumber) -> &[u16] {
        let start = frame.base_address() as usize;

        &self.words[start..start + PAGE_WORDS]
    }

    pub fn frame_mut(&mut self, frame: FrameNumber) -> &mut [u16] {
        let start = frame.base_address() as usize;

        &mut self.words[start..start + PAGE_WORDS]
    }

    /// Resets the bookkeeping region to a freshly booted OS: no process, no
    /// status flags, every PCB slot unused, and every frame past the OS
    /// frames free.
    pub fn init_os(&mut self) {
        for slot in 0..MAX_PROCESSES {
            self.write(pcb_address(slot) + PCB_PID, NO_PROCESS);
        }

        self.write(CUR_PROC_ID, NO_PROCESS);
        self.write(PROC_COUNT, 0);
        self.write(OS_STATUS, 0);
        self.write(FREE_BITMAP_LOW, INITIAL_FREE_LOW);
        self.write(FREE_BITMAP_HIGH, INITIAL_FREE_HIGH);
    }

    pub fn current_pid(&self) -> Option<u16> {
        match self.read(CUR_PROC_ID) {
            NO_PROCESS => None,
            pid => Some(pid),
        }
    }

    pub fn set_current_pid(&mut self, pid: Option<u16>) {
        self.write(CUR_PROC_ID, pid.unwrap_or(NO_PROCESS));
    }

    pub fn process_count(&self) -> u16 {
        self.read(PROC_COUNT)
    }

    pub(crate) fn set_process_count(&mut self, count: u16) {
        self.write(PROC_COUNT, count);
    }

    pub fn status(&self) -> OsStatus {
        OsStatus::from_bits_retain(self.read(OS_STATUS))
    }

    pub fn set_status(&mut self, flags: OsStatus, value: bool) {
        let mut status = self.status();
        status.set(flags, value);
        self.write(OS_STATUS, status.bits());
    }

    /// The two free-frame bitmap words, frames 0-15 first.
    pub fn free_bitmaps(&self) -> [u16; 2] {
        [self.read(FREE_BITMAP_LOW), self.read(FREE_BITMAP_HIGH)]
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_state() {
        let mut memory = PhysicalMemory::new();
        memory.init_os();

        assert_eq!(memory.current_pid(), None);
        assert_eq!(memory.process_count(), 0);
        assert!(memory.status().is_empty());
        assert_eq!(memory.free_bitmaps(), [0x1FFF, 0xFFFF]);
        assert_eq!(memory.read(pcb_address(0) + PCB_PID), NO_PROCESS);
        assert_eq!(memory.read(pcb_address(MAX_PROCESSES - 1) + PCB_PID), NO_PROCESS);
    }

    #[test]
    fn status_flags_are_independent() {
        let mut memory = PhysicalMemory::new();
        memory.init_os();

        memory.set_status(OsStatus::TABLE_FULL, true);
        memory.set_status(OsStatus::LAST_FRAME_TAKEN, true);
        memory.set_status(OsStatus::LAST_FRAME_TAKEN, false);

        assert_eq!(memory.status(), OsStatus::TABLE_FULL);
        assert_eq!(memory.read(OS_STATUS), 1);
    }

    #[test]
    fn frames_cover_their_words() {
        let mut memory = PhysicalMemory::new();
        let frame = FrameNumber::new(31).unwrap();

        memory.frame_mut(frame)[PAGE_WORDS - 1] = 0xABCD;

        assert_eq!(memory.read(0xFFFF), 0xABCD);
        assert_eq!(memory.frame(frame).len(), PAGE_WORDS);
    }
}
