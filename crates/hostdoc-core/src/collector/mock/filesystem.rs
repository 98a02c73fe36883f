//! In-memory mock filesystem for testing collectors without a real
//! `/proc`. Also fakes symlinks (for `exe`/`fd` resolution), statvfs
//! results and file sizes, which the real kernel surfaces provide out
//! of band.

use crate::collector::traits::{FileSystem, FsUsage};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for tests.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
    links: HashMap<PathBuf, PathBuf>,
    statvfs: HashMap<PathBuf, FsUsage>,
    sizes: HashMap<PathBuf, u64>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content; parent directories are
    /// created implicitly.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symlink with an explicit target.
    pub fn add_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.links.insert(path, target.as_ref().to_path_buf());
    }

    /// Registers a statvfs answer for a mount point.
    pub fn add_statvfs(&mut self, path: impl AsRef<Path>, usage: FsUsage) {
        self.statvfs.insert(path.as_ref().to_path_buf(), usage);
    }

    /// Registers a file size (for deleted-open scanning of link targets).
    pub fn add_size(&mut self, path: impl AsRef<Path>, size: u64) {
        self.sizes.insert(path.as_ref().to_path_buf(), size);
    }

    /// Adds a process with its typical `/proc/[pid]/` files.
    pub fn add_process(
        &mut self,
        pid: u32,
        stat: &str,
        status: &str,
        io: &str,
        cgroup: &str,
        exe: &str,
    ) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_dir(base.join("fd"));
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("status"), status);
        if !io.is_empty() {
            self.add_file(base.join("io"), io);
        }
        self.add_file(base.join("cgroup"), cgroup);
        if !exe.is_empty() {
            self.add_link(base.join("exe"), exe);
        }
    }

    /// Adds a numbered fd symlink under `/proc/[pid]/fd/`.
    pub fn add_fd(&mut self, pid: u32, fd: u32, target: &str) {
        self.add_link(format!("/proc/{}/fd/{}", pid, fd), target);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("file not found: {:?}", path))
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.directories.contains(path)
            || self.links.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();
        for candidate in self
            .files
            .keys()
            .chain(self.links.keys())
            .chain(self.directories.iter())
        {
            if candidate.parent().is_some_and(|p| p == path) && candidate != path {
                entries.insert(candidate.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.links.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("link not found: {:?}", path))
        })
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsUsage> {
        self.statvfs.get(path).copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no statvfs for {:?}", path))
        })
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.sizes.get(path).copied().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no size for {:?}", path))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fs_files_and_parents() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc")));
        assert_eq!(
            fs.read_to_string(Path::new("/proc/meminfo")).unwrap(),
            "MemTotal: 16384 kB\n"
        );
    }

    #[test]
    fn mock_fs_read_dir_lists_children() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "x");
        fs.add_file("/proc/1/status", "y");
        fs.add_file("/proc/2/stat", "z");

        assert_eq!(fs.read_dir(Path::new("/proc")).unwrap().len(), 2);
        assert_eq!(fs.read_dir(Path::new("/proc/1")).unwrap().len(), 2);
    }

    #[test]
    fn mock_fs_links_and_sizes() {
        let mut fs = MockFs::new();
        fs.add_fd(100, 3, "socket:[4242]");
        fs.add_link("/proc/100/exe", "/usr/bin/true");
        fs.add_size("/proc/100/fd/3", 0);

        assert_eq!(
            fs.read_link(Path::new("/proc/100/fd/3")).unwrap(),
            PathBuf::from("socket:[4242]")
        );
        let entries = fs.read_dir(Path::new("/proc/100/fd")).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn mock_fs_statvfs() {
        let mut fs = MockFs::new();
        fs.add_statvfs(
            "/",
            FsUsage {
                total_bytes: 100,
                free_bytes: 40,
                avail_bytes: 35,
                total_inodes: 10,
                free_inodes: 9,
            },
        );
        assert_eq!(fs.statvfs(Path::new("/")).unwrap().free_bytes, 40);
        assert!(fs.statvfs(Path::new("/data")).is_err());
    }
}
