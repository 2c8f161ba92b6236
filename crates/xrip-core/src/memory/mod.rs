pub mod field;
pub mod reader;

#[cfg(target_os = "windows")]
mod process;

#[cfg(test)]
pub mod mock;

pub use reader::{ReadMemory, RemotePtr, SliceReader};

#[cfg(target_os = "windows")]
pub use process::{ProcessHandle, ProcessInfo};

#[cfg(test)]
pub use mock::{MockMemoryBuilder, MockMemoryReader};
