use crate::error::VmError;
use crate::image::ByteOrder;
use crate::layout::{CODE_FIRST_PAGE, DEFAULT_ENTRY_POINT, PAGES_PER_TABLE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Initial PC of every process.
    pub entry_point: u16,
    /// Byte order of the words in program image files.
    pub byte_order: ByteOrder,
    /// Read-only pages mapped from [`CODE_FIRST_PAGE`] on.
    pub code_pages: u16,
    /// Read-write pages mapped directly after the code.
    pub heap_pages: u16,
}

impl MachineConfig {
    pub(crate) fn validate(&self) -> Result<(), VmError> {
        if self.code_pages == 0 {
            return Err(VmError::InvalidConfig("a process needs at least one code page"));
        }

        if CODE_FIRST_PAGE + self.code_pages + self.heap_pages > PAGES_PER_TABLE {
            return Err(VmError::InvalidConfig(
                "code and heap segments do not fit in one address space",
            ));
        }

        Ok(())
    }

    pub(crate) fn code_range(&self) -> std::ops::Range<u16> {
        CODE_FIRST_PAGE..CODE_FIRST_PAGE + self.code_pages
    }

    pub(crate) fn heap_range(&self) -> std::ops::Range<u16> {
        let start = CODE_FIRST_PAGE + self.code_pages;

        start..start + self.heap_pages
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            entry_point: DEFAULT_ENTRY_POINT,
            byte_order: ByteOrder::Little,
            code_pages: 2,
            heap_pages: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_segments() {
        let config = MachineConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.code_range(), 6..8);
        assert_eq!(config.heap_range(), 8..10);
    }

    #[test]
    fn oversized_segments_are_rejected() {
        let config = MachineConfig {
            code_pages: 10,
            heap_pages: 17,
            ..MachineConfig::default()
        };

        assert!(matches!(config.validate(), Err(VmError::InvalidConfig(_))));
    }
}
