//! Filesystem abstraction so collectors can read the real `/proc` and
//! `/sys` on Linux or an in-memory mock in tests.

use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};

/// Capacity figures returned by a statvfs call on a mount point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub avail_bytes: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
}

/// Abstraction over the pieces of the filesystem the collectors touch.
///
/// Implemented by [`RealFs`] in production and by the in-memory
/// `MockFs` in tests, which also fakes symlinks and statvfs results.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries of a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Resolves a symlink target without following further links.
    /// Used for `/proc/[pid]/exe`, `fd/*` and sysfs `master` links.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Queries capacity of the filesystem mounted at `path`.
    fn statvfs(&self, path: &Path) -> io::Result<FsUsage>;

    /// Size in bytes of the file a path (or symlink target) refers to.
    fn file_size(&self, path: &Path) -> io::Result<u64>;
}

/// Real filesystem implementation delegating to `std::fs` and, for
/// statvfs, to libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsUsage> {
        let c_path = CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;

        // SAFETY: c_path is a valid NUL-terminated string and the out
        // parameter is a properly aligned, writable statvfs struct.
        let mut vfs: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut vfs) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let frsize = if vfs.f_frsize > 0 {
            vfs.f_frsize as u64
        } else {
            vfs.f_bsize as u64
        };
        Ok(FsUsage {
            total_bytes: vfs.f_blocks as u64 * frsize,
            free_bytes: vfs.f_bfree as u64 * frsize,
            avail_bytes: vfs.f_bavail as u64 * frsize,
            total_inodes: vfs.f_files as u64,
            free_inodes: vfs.f_ffree as u64,
        })
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn real_fs_read_to_string() {
        let fs = RealFs::new();
        let cargo_toml = env::current_dir().unwrap().join("Cargo.toml");
        let content = fs.read_to_string(&cargo_toml).unwrap();
        assert!(content.contains("[package]"));
    }

    #[test]
    fn real_fs_exists() {
        let fs = RealFs::new();
        assert!(fs.exists(&env::current_dir().unwrap().join("Cargo.toml")));
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn real_fs_statvfs_current_dir() {
        let fs = RealFs::new();
        let usage = fs.statvfs(&env::current_dir().unwrap()).unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.free_bytes <= usage.total_bytes);
    }

    #[test]
    fn real_fs_read_dir_and_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"12345").unwrap();
        std::fs::write(dir.path().join("b"), b"").unwrap();

        let fs = RealFs::new();
        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(fs.file_size(&dir.path().join("a")).unwrap(), 5);
    }
}
