use std::fmt;

/// Filesystem error type.
///
/// Every variant is recoverable at the caller; library code never panics.
/// End-of-file during read and out-of-space during write are reported as
/// short byte counts, not as errors.
#[derive(Debug)]
pub enum FsError {
    Io(std::io::Error),     // underlying device I/O failure
    NotMounted,             // operation requires a mounted volume
    AlreadyMounted,         // format would destroy the resident volume
    InvalidMagic,           // superblock signature mismatch
    OutOfRange(u32),        // inode number 0 or past the table
    InvalidInode(u32),      // in range but not currently allocated
    NoFreeInode,            // create with a full inode table
    Corrupted(String),      // on-disk state violates an invariant
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        FsError::Io(e)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::NotMounted => write!(f, "No volume is mounted"),
            Self::AlreadyMounted => write!(f, "A volume is already mounted"),
            Self::InvalidMagic => write!(f, "Superblock magic number is invalid"),
            Self::OutOfRange(inumber) => write!(f, "Inode number out of range: {}", inumber),
            Self::InvalidInode(inumber) => write!(f, "Inode is not allocated: {}", inumber),
            Self::NoFreeInode => write!(f, "No free inode available"),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Filesystem result type.
pub type Result<T> = std::result::Result<T, FsError>;
