//! Typed data model: snapshots and their per-subsystem regions.

pub mod cgroup;
pub mod process;
pub mod snapshot;
pub mod system;

pub use cgroup::{CgroupInfo, CgroupIoDevice};
pub use process::ProcessInfo;
pub use snapshot::Snapshot;
pub use system::{
    CloseWaitInfo, CloseWaitLeaker, ConntrackInfo, CpuTimes, DeletedOpenFile, DiskInfo,
    EphemeralPortInfo, FileHandleInfo, FilelessProcess, IfaceKind, KernelStatInfo, LoadInfo,
    MemInfo, MountInfo, NetIfaceInfo, NetSnmpInfo, PortUser, PsiInfo, PsiRecord, SentinelOomKill,
    SentinelSample, SoftirqInfo, SystemIdentity, TcpStateCensus, VmstatInfo,
};
