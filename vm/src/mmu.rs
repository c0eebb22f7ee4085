use log::trace;

use crate::error::Fault;
use crate::layout::{page_number, page_offset, LAST_RESERVED_PAGE, OFFSET_BITS};
use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Maps `address` through `table` to a physical address.
///
/// Pages up to [`LAST_RESERVED_PAGE`] are never mapped, whatever their page
/// table entries hold.
pub fn translate(
    memory: &PhysicalMemory,
    table: PageTable,
    address: u16,
    access: Access,
) -> Result<u16, Fault> {
    let page = page_number(address);
    let offset = page_offset(address);

    if page <= LAST_RESERVED_PAGE {
        return Err(Fault::ReservedPage { address });
    }

    let entry = table.get(memory, page);

    if !entry.is_valid() {
        return Err(Fault::InvalidPage { address });
    }

    match access {
        Access::Read if !entry.can_read() => return Err(Fault::WriteOnlyPage { address }),
        Access::Write if !entry.can_write() => return Err(Fault::ReadOnlyPage { address }),
        _ => {}
    }

    let physical = (entry.frame().index() << OFFSET_BITS) | offset;

    trace!(
        "mmu: {:?} {:#06X} page={} offset={:#05X} -> {:#06X}",
        access,
        address,
        page,
        offset,
        physical
    );

    Ok(physical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_allocator::FrameNumber;
    use crate::page_table::{PageTableEntry, PteFlags};

    fn mapped(page: u16, frame: u16, permissions: PteFlags) -> (PhysicalMemory, PageTable) {
        let mut memory = PhysicalMemory::new();
        let table = PageTable::for_process(0);
        let entry = PageTableEntry::new(FrameNumber::new(frame).unwrap(), permissions);
        table.set(&mut memory, page, entry);
        (memory, table)
    }

    #[test]
    fn reserved_pages_always_fault() {
        let (memory, table) = mapped(5, 9, PteFlags::READ | PteFlags::WRITE);

        for address in [0x0000, 0x0002, 0x1000, 0x2FFF] {
            assert_eq!(
                translate(&memory, table, address, Access::Read),
                Err(Fault::ReservedPage { address })
            );
        }
    }

    #[test]
    fn unmapped_page_faults() {
        let (memory, table) = mapped(6, 9, PteFlags::READ);

        assert_eq!(
            translate(&memory, table, 0x3800, Access::Read),
            Err(Fault::InvalidPage { address: 0x3800 })
        );
    }

    #[test]
    fn permissions_are_checked_per_direction() {
        let (memory, table) = mapped(6, 9, PteFlags::READ);

        assert_eq!(translate(&memory, table, 0x3001, Access::Read), Ok((9 << 11) | 1));
        assert_eq!(
            translate(&memory, table, 0x3001, Access::Write),
            Err(Fault::ReadOnlyPage { address: 0x3001 })
        );

        let (memory, table) = mapped(12, 30, PteFlags::WRITE);

        assert_eq!(translate(&memory, table, 0x67FF, Access::Write), Ok(0xF7FF));
        assert_eq!(
            translate(&memory, table, 0x6000, Access::Read),
            Err(Fault::WriteOnlyPage { address: 0x6000 })
        );
    }

    #[test]
    fn translation_uses_the_given_table() {
        let (memory, _) = mapped(8, 4, PteFlags::READ);

        assert_eq!(
            translate(&memory, PageTable::for_process(1), 0x4000, Access::Read),
            Err(Fault::InvalidPage { address: 0x4000 })
        );
    }
}
