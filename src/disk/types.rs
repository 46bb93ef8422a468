/// Size of one logical block. The filesystem reads and writes the disk in
/// whole blocks only.
pub const BLOCK_SIZE: usize = 4096;

/// Block count used when a new disk image is created (16 MB volume).
pub const DEFAULT_BLOCK_COUNT: u32 = 4096;

/// One logical block's worth of bytes.
pub type Block = [u8; BLOCK_SIZE];

/// A block of all zeroes, used for formatting and for scrubbing freed blocks.
pub const ZERO_BLOCK: Block = [0; BLOCK_SIZE];
