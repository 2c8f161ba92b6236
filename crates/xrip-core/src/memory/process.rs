//! Windows process attachment and memory reads.

use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_TIMEOUT};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ, SYNCHRONIZE,
    WaitForSingleObject,
};

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, RemotePtr};

#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

impl ProcessInfo {
    /// Enumerate running processes and return the first whose executable
    /// name matches one of `names` (case-insensitive).
    pub fn find(names: &[&str]) -> Result<ProcessInfo> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::ProcessAccess(format!("toolhelp snapshot failed: {e}")))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        if unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok() {
            loop {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                if names.iter().any(|n| exe.eq_ignore_ascii_case(n)) {
                    found = Some(ProcessInfo {
                        pid: entry.th32ProcessID,
                        name: exe,
                    });
                    break;
                }
                if unsafe { Process32NextW(snapshot, &mut entry) }.is_err() {
                    break;
                }
            }
        }
        unsafe {
            let _ = CloseHandle(snapshot);
        }

        found.ok_or_else(|| Error::ProcessNotFound(names.join(", ")))
    }
}

/// An opened handle to the target process.
pub struct ProcessHandle {
    handle: HANDLE,
    pid: u32,
}

// HANDLE is a kernel object reference, valid from any thread.
unsafe impl Send for ProcessHandle {}
unsafe impl Sync for ProcessHandle {}

impl ProcessHandle {
    pub fn open(info: &ProcessInfo) -> Result<ProcessHandle> {
        let handle = unsafe {
            OpenProcess(
                PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_VM_READ | SYNCHRONIZE,
                false,
                info.pid,
            )
        }
        .map_err(|e| {
            Error::ProcessAccess(format!("OpenProcess({}) failed: {e}", info.pid))
        })?;
        debug!("Opened process {} (pid {})", info.name, info.pid);
        Ok(ProcessHandle {
            handle,
            pid: info.pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl ReadMemory for ProcessHandle {
    fn read_into(&self, addr: RemotePtr, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let result = unsafe {
            ReadProcessMemory(
                self.handle,
                addr.0 as *const std::ffi::c_void,
                buf.as_mut_ptr() as *mut std::ffi::c_void,
                buf.len(),
                None,
            )
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                if !self.is_alive() {
                    warn!("Target process {} exited mid-read", self.pid);
                    return Err(Error::ProcessAccess(format!(
                        "process {} exited: {e}",
                        self.pid
                    )));
                }
                Err(Error::ReadFault { address: addr.0 })
            }
        }
    }

    fn is_alive(&self) -> bool {
        // Zero-wait: WAIT_TIMEOUT means the process object is unsignaled,
        // i.e. still running.
        unsafe { WaitForSingleObject(self.handle, 0) == WAIT_TIMEOUT }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
