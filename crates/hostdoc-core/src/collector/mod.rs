//! Metric collection from kernel pseudo-filesystems.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Collector                            │
//! │  ┌───────────────┐ ┌──────────────────┐ ┌─────────────────┐  │
//! │  │SystemCollector│ │ProcessCollector  │ │ SocketCollector │  │
//! │  │ /proc, /sys   │ │ /proc/[pid]/*    │ │ /proc/net/tcp*  │  │
//! │  └───────┬───────┘ └────────┬─────────┘ └────────┬────────┘  │
//! │  ┌───────┴────────┐ ┌───────┴────────┐  ┌────────┴────────┐  │
//! │  │CgroupCollector │ │FilelessScanner │  │DeletedOpenScan. │  │
//! │  │ /sys/fs/cgroup │ │ (10 s gate)    │  │ (30 s gate)     │  │
//! │  └────────────────┘ └────────────────┘  └─────────────────┘  │
//! │                           │                                  │
//! │                    ┌──────▼──────┐                           │
//! │                    │  FileSystem │ (trait)                   │
//! │                    └──────┬──────┘                           │
//! └───────────────────────────┼──────────────────────────────────┘
//!                 ┌───────────┴───────────┐
//!          ┌──────▼──────┐         ┌──────▼──────┐
//!          │   RealFs    │         │   MockFs    │
//!          │  (Linux)    │         │  (tests)    │
//!          └─────────────┘         └─────────────┘
//! ```
//!
//! Every collector owns exactly one region of the snapshot and never
//! reads another collector's output within a tick. Failures degrade
//! the region to its zero value and add one short string to
//! `snapshot.errors`; the tick itself never fails in this module.

pub mod cgroup;
#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use cgroup::CgroupCollector;
pub use collector::{Collector, CollectorTiming, DEFAULT_TOP_PROCESSES};
pub use mock::MockFs;
pub use procfs::{CollectError, ProcessCollector, SocketCollector, SystemCollector};
pub use traits::{FileSystem, FsUsage, RealFs};
