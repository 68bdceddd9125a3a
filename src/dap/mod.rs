//! Debug Adapter Protocol (DAP) implementation
//!
//! Client side of DAP for driving debug adapters such as `gdb -i dap`
//! and lldb-dap.

pub mod client;
pub mod codec;
pub mod types;

pub use client::DapClient;
pub use types::*;
