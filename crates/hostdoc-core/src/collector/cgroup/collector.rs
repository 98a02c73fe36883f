//! Cgroup tree collector. Prefers the unified (v2) hierarchy and
//! falls back to the legacy split controllers when `cgroup.controllers`
//! is absent.

use std::path::{Path, PathBuf};

use crate::collector::cgroup::parser::{
    parse_cpu_max, parse_cpu_stat, parse_cpu_stat_v1, parse_io_stat, parse_limit, parse_number,
    parse_oom_kills,
};
use crate::collector::traits::FileSystem;
use crate::model::CgroupInfo;

/// How deep below the cgroup root the walk descends. Three levels
/// cover `system.slice/app.service` and kubepods pod/container nests.
const MAX_DEPTH: usize = 3;

/// Collects per-cgroup resource usage from a cgroup filesystem root.
pub struct CgroupCollector<F: FileSystem> {
    fs: F,
    root: String,
}

impl<F: FileSystem> CgroupCollector<F> {
    pub fn new(fs: F, root: impl Into<String>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Walks the tree and returns every group that exposes CPU or
    /// memory accounting. Empty when no cgroup filesystem is mounted.
    pub fn collect(&self) -> Vec<CgroupInfo> {
        if self
            .fs
            .exists(Path::new(&format!("{}/cgroup.controllers", self.root)))
        {
            self.collect_v2()
        } else {
            self.collect_v1()
        }
    }

    fn collect_v2(&self) -> Vec<CgroupInfo> {
        let mut groups = Vec::new();
        self.walk_v2(Path::new(&self.root), 0, &mut groups);
        groups.sort_by(|a, b| a.path.cmp(&b.path));
        groups
    }

    fn walk_v2(&self, dir: &Path, depth: usize, out: &mut Vec<CgroupInfo>) {
        if depth > MAX_DEPTH {
            return;
        }
        if depth > 0
            && let Some(info) = self.read_v2_group(dir)
        {
            out.push(info);
        }

        let Ok(entries) = self.fs.read_dir(dir) else {
            return;
        };
        for entry in entries {
            // Control files live beside child directories; only
            // directories have their own cgroup.controllers-style files
            if self.fs.exists(&entry.join("cgroup.procs")) {
                self.walk_v2(&entry, depth + 1, out);
            }
        }
    }

    fn read_v2_group(&self, dir: &Path) -> Option<CgroupInfo> {
        let rel = dir
            .strip_prefix(&self.root)
            .ok()?
            .to_string_lossy()
            .trim_start_matches('/')
            .to_string();

        let cpu_stat = self
            .fs
            .read_to_string(&dir.join("cpu.stat"))
            .map(|c| parse_cpu_stat(&c))
            .ok();
        let mem_current = self
            .fs
            .read_to_string(&dir.join("memory.current"))
            .map(|c| parse_number(&c))
            .ok();
        // A group with neither accounting surface is not worth keeping
        if cpu_stat.is_none() && mem_current.is_none() {
            return None;
        }

        let cpu = cpu_stat.unwrap_or_default();
        let (cpu_quota_usec, cpu_period_usec) = self
            .fs
            .read_to_string(&dir.join("cpu.max"))
            .map(|c| parse_cpu_max(&c))
            .unwrap_or((-1, 100_000));

        let mem_limit = self
            .fs
            .read_to_string(&dir.join("memory.max"))
            .map(|c| parse_limit(&c, u64::MAX))
            .unwrap_or(u64::MAX);
        let oom_kills = self
            .fs
            .read_to_string(&dir.join("memory.events"))
            .map(|c| parse_oom_kills(&c))
            .unwrap_or(0);

        let pids_current = self
            .fs
            .read_to_string(&dir.join("pids.current"))
            .map(|c| parse_number(&c))
            .unwrap_or(0);
        let pids_max = self
            .fs
            .read_to_string(&dir.join("pids.max"))
            .map(|c| parse_limit(&c, u64::MAX))
            .unwrap_or(u64::MAX);

        let io = self
            .fs
            .read_to_string(&dir.join("io.stat"))
            .map(|c| parse_io_stat(&c))
            .unwrap_or_default();

        Some(CgroupInfo {
            path: rel,
            version: 2,
            cpu_usage_usec: cpu.usage_usec,
            cpu_user_usec: cpu.user_usec,
            cpu_system_usec: cpu.system_usec,
            nr_periods: cpu.nr_periods,
            nr_throttled: cpu.nr_throttled,
            throttled_usec: cpu.throttled_usec,
            cpu_quota_usec,
            cpu_period_usec,
            mem_current: mem_current.unwrap_or(0),
            mem_limit,
            oom_kills,
            pids_current,
            pids_max,
            io,
        })
    }

    /// Legacy hierarchy: per-controller trees. Groups are keyed by
    /// their path under the memory controller; CPU figures are merged
    /// in from the matching `cpu,cpuacct` (or `cpu`) path.
    fn collect_v1(&self) -> Vec<CgroupInfo> {
        let mem_root = PathBuf::from(format!("{}/memory", self.root));
        if !self.fs.exists(&mem_root) {
            return Vec::new();
        }
        let cpu_root = ["cpu,cpuacct", "cpu"]
            .iter()
            .map(|c| PathBuf::from(format!("{}/{}", self.root, c)))
            .find(|p| self.fs.exists(p));

        let mut groups = Vec::new();
        self.walk_v1(&mem_root, &mem_root, cpu_root.as_deref(), 0, &mut groups);
        groups.sort_by(|a, b| a.path.cmp(&b.path));
        groups
    }

    fn walk_v1(
        &self,
        mem_root: &Path,
        dir: &Path,
        cpu_root: Option<&Path>,
        depth: usize,
        out: &mut Vec<CgroupInfo>,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        if depth > 0
            && let Some(info) = self.read_v1_group(mem_root, dir, cpu_root)
        {
            out.push(info);
        }

        let Ok(entries) = self.fs.read_dir(dir) else {
            return;
        };
        for entry in entries {
            if self.fs.exists(&entry.join("cgroup.procs")) {
                self.walk_v1(mem_root, &entry, cpu_root, depth + 1, out);
            }
        }
    }

    fn read_v1_group(
        &self,
        mem_root: &Path,
        dir: &Path,
        cpu_root: Option<&Path>,
    ) -> Option<CgroupInfo> {
        let rel = dir
            .strip_prefix(mem_root)
            .ok()?
            .to_string_lossy()
            .trim_start_matches('/')
            .to_string();

        let mem_current = self
            .fs
            .read_to_string(&dir.join("memory.usage_in_bytes"))
            .map(|c| parse_number(&c))
            .ok()?;
        let mem_limit = self
            .fs
            .read_to_string(&dir.join("memory.limit_in_bytes"))
            .map(|c| parse_limit(&c, u64::MAX))
            .unwrap_or(u64::MAX);
        let oom_kills = self
            .fs
            .read_to_string(&dir.join("memory.oom_control"))
            .map(|c| parse_oom_kills(&c))
            .unwrap_or(0);

        let mut info = CgroupInfo {
            path: rel.clone(),
            version: 1,
            mem_current,
            mem_limit,
            oom_kills,
            cpu_quota_usec: -1,
            cpu_period_usec: 100_000,
            pids_max: u64::MAX,
            ..Default::default()
        };

        if let Some(cpu_root) = cpu_root {
            let cpu_dir = cpu_root.join(&rel);
            if let Ok(content) = self.fs.read_to_string(&cpu_dir.join("cpuacct.usage")) {
                info.cpu_usage_usec = parse_number(&content) / 1000;
            }
            if let Ok(content) = self.fs.read_to_string(&cpu_dir.join("cpu.stat")) {
                let stat = parse_cpu_stat_v1(&content);
                info.nr_periods = stat.nr_periods;
                info.nr_throttled = stat.nr_throttled;
                info.throttled_usec = stat.throttled_usec;
            }
        }

        Some(info)
    }
}
