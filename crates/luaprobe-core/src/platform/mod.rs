//! # Platform Accessors
//!
//! [`MemoryAccessor`](crate::memory::MemoryAccessor) implementations backed by
//! a live process.
//!
//! - **Linux**: reads and writes `/proc/<pid>/mem`
//! - **Other platforms**: not implemented yet; use a
//!   [`SnapshotMemory`](crate::memory::SnapshotMemory) dump instead

#[cfg(target_os = "linux")]
pub mod linux;

use crate::error::ProbeResult;
use crate::memory::MemoryAccessor;

/// Open the memory of process `pid` with the accessor for the current platform
///
/// ## Errors
///
/// - `ProcessNotFound`: no such process
/// - `Io`: the memory file cannot be opened (usually missing ptrace permission)
/// - `InvalidArgument`: unsupported platform or executable format
pub fn attach_process(pid: u32) -> ProbeResult<Box<dyn MemoryAccessor>>
{
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::ProcessMemory::attach(pid)?))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(crate::error::ProbeError::InvalidArgument(format!(
            "live process access is not implemented for platform {} (pid {pid})",
            std::env::consts::OS
        )))
    }
}
