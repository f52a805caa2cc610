//! C3 — Instance Registry, and the StartLock/DownloadLock tables (spec §3,
//! §4.3, §9 "lazy per-key mutexes").

pub mod instance;
pub mod locks;
pub mod registry;

pub use instance::Instance;
pub use locks::LockTable;
pub use registry::Registry;
