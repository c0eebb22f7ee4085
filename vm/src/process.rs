//! Process control blocks, process creation and dispatch.

use log::{debug, error, info, warn};
use std::path::Path;

use crate::error::{AllocError, ProcessError};
use crate::frame_allocator::{FrameAllocator, FrameNumber};
use crate::image::{FileImage, ImageLoader};
use crate::layout::{
    page_table_base, pcb_address, MAX_PROCESSES, NO_PROCESS, PAGE_WORDS, PCB_PC, PCB_PID, PCB_PTBR,
};
use crate::machine::Machine;
use crate::memory::{OsStatus, PhysicalMemory};
use crate::page_table::{PageTable, PteFlags};

/// The three words of a process control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pcb {
    /// [`NO_PROCESS`] once the process has halted.
    pub pid: u16,
    pub pc: u16,
    pub ptbr: u16,
}

impl Pcb {
    pub fn read(memory: &PhysicalMemory, slot: u16) -> Pcb {
        let base = pcb_address(slot);

        Pcb {
            pid: memory.read(base + PCB_PID),
            pc: memory.read(base + PCB_PC),
            ptbr: memory.read(base + PCB_PTBR),
        }
    }

    pub fn write(self, memory: &mut PhysicalMemory, slot: u16) {
        let base = pcb_address(slot);

        memory.write(base + PCB_PID, self.pid);
        memory.write(base + PCB_PC, self.pc);
        memory.write(base + PCB_PTBR, self.ptbr);
    }

    pub fn is_terminated(self) -> bool {
        self.pid == NO_PROCESS
    }

    pub(crate) fn save_pc(memory: &mut PhysicalMemory, slot: u16, pc: u16) {
        memory.write(pcb_address(slot) + PCB_PC, pc);
    }

    pub(crate) fn terminate(memory: &mut PhysicalMemory, slot: u16) {
        memory.write(pcb_address(slot) + PCB_PID, NO_PROCESS);
    }
}

impl Machine {
    pub fn pcb(&self, pid: u16) -> Pcb {
        Pcb::read(&self.memory, pid)
    }

    /// Opens both image files, then creates a process from them.
    pub fn create_process_from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        code: P,
        heap: Q,
    ) -> Result<u16, ProcessError> {
        let byte_order = self.config.byte_order;
        let mut code = FileImage::open(code, byte_order).map_err(ProcessError::Image)?;
        let mut heap = FileImage::open(heap, byte_order).map_err(ProcessError::Image)?;

        self.create_process(&mut code, &mut heap)
    }

    /// Creates the next process with its code and heap segments backed by
    /// fresh frames, returning its pid.
    ///
    /// A full process table stops the machine. On any other failure every
    /// frame taken so far is returned and the process count is unchanged.
    pub fn create_process<C: ImageLoader, H: ImageLoader>(
        &mut self,
        code: &mut C,
        heap: &mut H,
    ) -> Result<u16, ProcessError> {
        if self.memory.status().contains(OsStatus::TABLE_FULL) {
            error!("process: the OS memory region is full, cannot create a new PCB");
            self.stop();
            return Err(ProcessError::TableFull);
        }

        let pid = self.memory.process_count();
        let table = PageTable::at(page_table_base(pid));

        let code_pages = self.config.code_range();
        let heap_pages = self.config.heap_range();

        let code_frames = self
            .allocate_segment(table, code_pages.clone(), PteFlags::READ)
            .map_err(ProcessError::CodeSegment)?;
        let heap_frames = match self.allocate_segment(table, heap_pages, PteFlags::READ | PteFlags::WRITE) {
            Ok(frames) => frames,
            Err(e) => {
                self.release_pages(table, code_pages);
                return Err(ProcessError::HeapSegment(e));
            }
        };

        let loaded = self
            .load_segment(code, &code_frames, "code")
            .and_then(|_| self.load_segment(heap, &heap_frames, "heap"));

        if let Err(e) = loaded {
            FrameAllocator::new(&mut self.memory).free_all(table);
            return Err(ProcessError::Image(e));
        }

        Pcb {
            pid,
            pc: self.config.entry_point,
            ptbr: table.base(),
        }
        .write(&mut self.memory, pid);

        debug!("process: pcb {} at {:#06X}, ptbr {:#06X}", pid, pcb_address(pid), table.base());

        self.memory.set_process_count(pid + 1);

        if pid + 1 == MAX_PROCESSES {
            self.memory.set_status(OsStatus::TABLE_FULL, true);
        }

        info!(
            "process: created pid {} (code frames {:?}, heap frames {:?})",
            pid, code_frames, heap_frames
        );

        Ok(pid)
    }

    fn allocate_segment(
        &mut self,
        table: PageTable,
        pages: std::ops::Range<u16>,
        permissions: PteFlags,
    ) -> Result<Vec<FrameNumber>, AllocError> {
        let mut frames = Vec::with_capacity(pages.len());
        let mut allocator = FrameAllocator::new(&mut self.memory);

        for page in pages.clone() {
            match allocator.allocate(table, page, permissions) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!("process: cannot allocate page {}: {}", page, e);

                    for allocated in pages.start..page {
                        let _ = allocator.free(table, allocated);
                    }

                    return Err(e);
                }
            }
        }

        Ok(frames)
    }

    fn release_pages(&mut self, table: PageTable, pages: std::ops::Range<u16>) {
        let mut allocator = FrameAllocator::new(&mut self.memory);

        for page in pages {
            let _ = allocator.free(table, page);
        }
    }

    /// Zero-fills each frame, then copies the image into them page by page.
    fn load_segment<L: ImageLoader>(
        &mut self,
        image: &mut L,
        frames: &[FrameNumber],
        segment: &str,
    ) -> std::io::Result<()> {
        let words = image.word_count()?;
        let capacity = frames.len() * PAGE_WORDS;

        if words > capacity {
            warn!(
                "process: {} image has {} words, only the first {} are loaded",
                segment, words, capacity
            );
        }

        for (page_index, &frame) in frames.iter().enumerate() {
            let target = self.memory.frame_mut(frame);
            target.fill(0);

            if page_index * PAGE_WORDS < words {
                image.load_page_into(page_index, target)?;
            }
        }

        Ok(())
    }

    /// Makes `pid` the running process, restoring its PTBR and PC.
    pub fn load_process(&mut self, pid: u16) -> Result<(), ProcessError> {
        if pid >= self.memory.process_count() || self.pcb(pid).is_terminated() {
            return Err(ProcessError::NoSuchProcess(pid));
        }

        self.dispatch(pid);

        Ok(())
    }

    pub(crate) fn dispatch(&mut self, pid: u16) {
        let pcb = self.pcb(pid);

        self.memory.set_current_pid(Some(pid));
        self.regs.ptbr = pcb.ptbr;
        self.regs.pc = pcb.pc;
    }
}
