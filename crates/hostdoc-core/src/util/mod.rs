//! Shared helpers: kernel-thread identification, cgroup unit name
//! cleanup, container environment detection.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Name prefixes of kernel threads. Processes matching these (or whose
/// name is bracketed `[...]`) are never blamed as culprits.
const KERNEL_THREAD_PREFIXES: &[&str] = &[
    "kworker/",
    "jbd2/",
    "ksoftirqd/",
    "kswapd",
    "khugepaged",
    "kcompactd",
    "writeback",
    "flush-",
    "dm-",
    "md/",
    "loop",
    "irq/",
    "migration/",
    "rcu_",
    "watchdog/",
    "cpuhp/",
    "netns",
    "kdevtmpfs",
    "oom_reaper",
    "kauditd",
    "kthreadd",
    "scsi_",
    "nvme-",
    "blkcg_punt",
];

/// True when a process name belongs to a kernel thread.
pub fn is_kernel_thread_name(name: &str) -> bool {
    if name.starts_with('[') && name.ends_with(']') {
        return true;
    }
    KERNEL_THREAD_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Strips systemd unit suffixes from the last component of a cgroup
/// path, for human-facing culprit names:
/// `system.slice/nginx.service` becomes `nginx`.
pub fn clean_cgroup_name(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    let cleaned = last
        .strip_suffix(".scope")
        .or_else(|| last.strip_suffix(".service"))
        .or_else(|| last.strip_suffix(".slice"))
        .unwrap_or(last);
    if cleaned.is_empty() {
        path.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Cached result of container detection.
static IS_CONTAINER: LazyLock<bool> = LazyLock::new(detect_container);

/// Returns `true` if the current process runs inside a container.
/// The result is cached after the first call.
pub fn is_container() -> bool {
    *IS_CONTAINER
}

fn detect_container() -> bool {
    env::var("KUBERNETES_SERVICE_HOST").is_ok()
        || Path::new("/.dockerenv").exists()
        || Path::new("/run/.containerenv").exists()
        || check_cgroup_markers()
}

fn check_cgroup_markers() -> bool {
    let Ok(content) = fs::read_to_string("/proc/1/cgroup") else {
        return false;
    };
    ["kubepods", "docker", "containerd", "lxc"]
        .iter()
        .any(|p| content.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_thread_names() {
        assert!(is_kernel_thread_name("kworker/0:1H"));
        assert!(is_kernel_thread_name("jbd2/sda1-8"));
        assert!(is_kernel_thread_name("kswapd0"));
        assert!(is_kernel_thread_name("[rcu_sched]"));
        assert!(is_kernel_thread_name("nvme-wq"));

        assert!(!is_kernel_thread_name("nginx"));
        assert!(!is_kernel_thread_name("postgres"));
        assert!(!is_kernel_thread_name("mysqld"));
    }

    #[test]
    fn cgroup_name_cleanup() {
        assert_eq!(clean_cgroup_name("system.slice/nginx.service"), "nginx");
        assert_eq!(
            clean_cgroup_name("kubepods.slice/pod-abc.scope"),
            "pod-abc"
        );
        assert_eq!(clean_cgroup_name("user.slice"), "user");
        assert_eq!(clean_cgroup_name("plain"), "plain");
    }

    #[test]
    fn container_detection_is_stable() {
        assert_eq!(is_container(), is_container());
    }
}
