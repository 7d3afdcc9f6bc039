use std::fmt;

/// Identifies a fixed-size block within a named file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    file_name: String,
    block_number: u64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, block_number: u64) -> Self {
        Self {
            file_name: file_name.into(),
            block_number,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Byte offset of this block within its file.
    pub fn offset(&self, block_size: usize) -> u64 {
        self.block_number * block_size as u64
    }

    /// The block immediately before this one in the same file, if any.
    pub fn previous(&self) -> Option<BlockId> {
        self.block_number
            .checked_sub(1)
            .map(|number| BlockId::new(self.file_name.clone(), number))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(BlockId::new("data.tbl", 0).offset(4096), 0);
        assert_eq!(BlockId::new("data.tbl", 3).offset(4096), 3 * 4096);
    }

    #[test]
    fn test_equality() {
        assert_eq!(BlockId::new("a", 1), BlockId::new("a", 1));
        assert_ne!(BlockId::new("a", 1), BlockId::new("a", 2));
        assert_ne!(BlockId::new("a", 1), BlockId::new("b", 1));
    }

    #[test]
    fn test_previous() {
        let block = BlockId::new("log", 2);
        assert_eq!(block.previous(), Some(BlockId::new("log", 1)));
        assert_eq!(BlockId::new("log", 0).previous(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockId::new("log", 7).to_string(), "[file log, block 7]");
    }
}
