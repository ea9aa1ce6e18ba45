//! # Linux Process Memory
//!
//! Reads target memory through `/proc/<pid>/mem`. The caller needs ptrace
//! access to the target (same user with `kernel.yama.ptrace_scope` allowing
//! it, or `CAP_SYS_PTRACE`).
//!
//! The pointer width is taken from the class of the target's executable
//! (`/proc/<pid>/exe`), so a 64-bit Luaprobe can inspect a 32-bit target.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::FileExt;

use object::FileKind;
use tracing::{debug, trace};

use crate::error::{ProbeError, ProbeResult};
use crate::memory::{MemoryAccessor, PointerWidth};
use crate::types::Address;

const STRING_CHUNK: u64 = 256;

/// Memory of a live Linux process
#[derive(Debug)]
pub struct ProcessMemory
{
    pid: u32,
    mem: File,
    pointer_width: PointerWidth,
}

impl ProcessMemory
{
    /// Open the memory of `pid` for reading and writing
    ///
    /// ## Errors
    ///
    /// - `ProcessNotFound`: `/proc/<pid>` does not exist
    /// - `Io`: permission denied or other I/O failure
    /// - `Object`/`InvalidArgument`: the executable is not a 32- or 64-bit ELF
    pub fn attach(pid: u32) -> ProbeResult<Self>
    {
        let pointer_width = detect_pointer_width(pid)?;
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/proc/{pid}/mem"))
            .or_else(|_| File::open(format!("/proc/{pid}/mem")))
            .map_err(|err| not_found_as_process(pid, err))?;
        debug!(pid, ?pointer_width, "opened process memory");
        Ok(Self { pid, mem, pointer_width })
    }

    /// Process ID of the target
    pub fn pid(&self) -> u32
    {
        self.pid
    }
}

fn not_found_as_process(pid: u32, err: std::io::Error) -> ProbeError
{
    if err.kind() == ErrorKind::NotFound {
        ProbeError::ProcessNotFound(pid)
    } else {
        ProbeError::Io(err)
    }
}

fn detect_pointer_width(pid: u32) -> ProbeResult<PointerWidth>
{
    let exe = File::open(format!("/proc/{pid}/exe")).map_err(|err| not_found_as_process(pid, err))?;
    let mut header = Vec::with_capacity(64);
    exe.take(64).read_to_end(&mut header)?;
    match FileKind::parse(header.as_slice())? {
        FileKind::Elf32 => Ok(PointerWidth::Four),
        FileKind::Elf64 => Ok(PointerWidth::Eight),
        other => Err(ProbeError::InvalidArgument(format!(
            "unsupported executable format {other:?} for pid {pid}"
        ))),
    }
}

impl MemoryAccessor for ProcessMemory
{
    fn read_bytes(&self, address: Address, len: usize) -> ProbeResult<Vec<u8>>
    {
        let mut buffer = vec![0u8; len];
        self.mem.read_exact_at(&mut buffer, address.value()).map_err(|err| {
            trace!(pid = self.pid, %address, len, error = %err, "process read failed");
            ProbeError::ReadFailed { address, len }
        })?;
        Ok(buffer)
    }

    fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> ProbeResult<()>
    {
        self.mem
            .write_all_at(bytes, address.value())
            .map_err(|_| ProbeError::WriteFailed { address, len: bytes.len() })
    }

    fn pointer_width(&self) -> PointerWidth
    {
        self.pointer_width
    }

    // Reads in chunks that never cross a 256-byte boundary, so a failing chunk
    // only loses bytes that sit in an unmapped page.
    fn read_c_string(&self, address: Address, max_len: usize) -> ProbeResult<Vec<u8>>
    {
        let mut output = Vec::new();
        let mut position = address;
        let mut read_any = false;

        while output.len() < max_len {
            let to_boundary = STRING_CHUNK - position.value() % STRING_CHUNK;
            let wanted = usize::try_from(to_boundary).unwrap_or(usize::MAX).min(max_len - output.len());
            let mut chunk = vec![0u8; wanted];
            let read = match self.mem.read_at(&mut chunk, position.value()) {
                Ok(0) | Err(_) => break,
                Ok(read) => read,
            };
            read_any = true;
            chunk.truncate(read);
            if let Some(terminator) = chunk.iter().position(|byte| *byte == 0) {
                output.extend_from_slice(&chunk[..terminator]);
                return Ok(output);
            }
            output.extend_from_slice(&chunk);
            position = position + read as u64;
        }

        if read_any || max_len == 0 {
            Ok(output)
        } else {
            Err(ProbeError::ReadFailed { address, len: 1 })
        }
    }
}
