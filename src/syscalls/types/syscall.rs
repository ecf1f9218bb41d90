/*!
 * Kernel Call Numbers
 * The pipe IPC calls and how their parameters travel in `Param1..3`
 */

use serde::{Deserialize, Serialize};

/// Kernel call numbers handled by the IPC core
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyscallNumber {
    /// P1 = class, P2 = subclass, P3 = max connections (i32, -1 = unlimited)
    RegisterPipeOutpoint = 0x40,
    /// P1 = class, P2 = subclass; R2 = count
    GetNumPipeOutpoints = 0x41,
    /// P1 = class, P2 = subclass, P3 = `ListEndpointsRequest` ptr; R2 = written
    GetPipeOutpoints = 0x42,
    /// P1 = `WaitForConnectRequest` ptr; R2 = channel id
    WaitOnPipeCreate = 0x43,
    /// P1 = target (writer) pid, P2 = `CreateChannelRequest` ptr; R2 = channel id
    CreatePipe = 0x44,
    /// P1 = `ReadRequest` ptr; R2 = bytes read
    ReadPipe = 0x45,
    /// P1 = `WriteRequest` ptr; R2 = bytes written
    WritePipe = 0x46,
    /// P1 = channel id
    AbortPipeReadWrite = 0x47,
}

impl SyscallNumber {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0x40 => Self::RegisterPipeOutpoint,
            0x41 => Self::GetNumPipeOutpoints,
            0x42 => Self::GetPipeOutpoints,
            0x43 => Self::WaitOnPipeCreate,
            0x44 => Self::CreatePipe,
            0x45 => Self::ReadPipe,
            0x46 => Self::WritePipe,
            0x47 => Self::AbortPipeReadWrite,
            _ => return None,
        })
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::RegisterPipeOutpoint => "register_pipe_outpoint",
            Self::GetNumPipeOutpoints => "get_num_pipe_outpoints",
            Self::GetPipeOutpoints => "get_pipe_outpoints",
            Self::WaitOnPipeCreate => "wait_on_pipe_create",
            Self::CreatePipe => "create_pipe",
            Self::ReadPipe => "read_pipe",
            Self::WritePipe => "write_pipe",
            Self::AbortPipeReadWrite => "abort_pipe_read_write",
        }
    }
}

impl std::fmt::Display for SyscallNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
