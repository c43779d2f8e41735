use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A bounded block pool has no free blocks left.
    #[error("Out of memory")]
    OutOfMemory,

    /// The scheduler has no record of the thread (it exited or never existed).
    #[error("No such thread")]
    NoSuchThread,

    #[error("Invalid value")]
    InvalidValue,
}

pub type Result<T> = core::result::Result<T, KernelError>;
