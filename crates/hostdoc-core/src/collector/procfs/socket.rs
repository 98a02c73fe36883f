//! Socket collector: TCP state census, ephemeral port accounting and
//! CLOSE_WAIT leak attribution.
//!
//! One collect pass scans every socket in both address families and
//! performs a single walk over `/proc/[pid]/fd/` to resolve socket
//! inodes to owning PIDs. That one inode map serves both consumers:
//! the ephemeral-port top users and the close-wait leaker list.

use std::collections::HashMap;
use std::path::Path;

use crate::collector::procfs::parser::{parse_port_range, parse_socket_table, tcp_state, SocketEntry};
use crate::collector::procfs::CollectError;
use crate::collector::traits::FileSystem;
use crate::model::system::{
    CloseWaitInfo, CloseWaitLeaker, EphemeralPortInfo, PortUser, TcpStateCensus,
};

/// Smoothing factor for the CLOSE_WAIT growth EWMA.
const CLOSE_WAIT_ALPHA: f64 = 0.3;

/// How many ephemeral-port owners to keep.
const TOP_PORT_USERS: usize = 5;

/// Sample remote addresses retained per leaker.
const LEAKER_IP_SAMPLES: usize = 3;

/// Fallback when the port-range sysctl is unreadable.
const DEFAULT_PORT_RANGE: (u16, u16) = (32768, 60999);

/// Everything the socket scan contributes to a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SocketSample {
    pub tcp_states: TcpStateCensus,
    pub ephemeral_ports: EphemeralPortInfo,
    pub close_wait: CloseWaitInfo,
}

/// Collects socket state. Owns the close-wait first-seen map (keyed by
/// the socket's local→remote hex pair) and the EWMA accumulator; both
/// are mutated only here.
pub struct SocketCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
    /// hex pair → unix seconds the socket was first seen in CLOSE_WAIT.
    first_seen: HashMap<String, i64>,
    close_wait_ewma: f64,
    samples: u64,
}

impl<F: FileSystem> SocketCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            first_seen: HashMap::new(),
            close_wait_ewma: 0.0,
            samples: 0,
        }
    }

    /// Scans both socket tables and the process fd tree.
    ///
    /// `now` is the wall-clock second of the current tick; ages in the
    /// leaker list are relative to it.
    pub fn collect(&mut self, now: i64) -> Result<SocketSample, CollectError> {
        let mut sockets = Vec::new();
        let mut any = false;
        for table in ["net/tcp", "net/tcp6"] {
            let path = format!("{}/{}", self.proc_path, table);
            if let Ok(content) = self.fs.read_to_string(Path::new(&path)) {
                sockets.extend(parse_socket_table(&content));
                any = true;
            }
        }
        if !any {
            return Err(CollectError::Parse("no tcp socket tables readable".into()));
        }

        let census = census_states(&sockets);
        let inode_owners = self.resolve_inode_owners();
        let ephemeral_ports = self.ephemeral_ports(&sockets, &inode_owners);
        let close_wait = self.close_wait(&sockets, &inode_owners, now);

        Ok(SocketSample {
            tcp_states: census,
            ephemeral_ports,
            close_wait,
        })
    }

    /// One pass over every process's fd directory, mapping socket
    /// inodes to `(pid, comm)`.
    fn resolve_inode_owners(&self) -> HashMap<u64, (u32, String)> {
        let mut owners = HashMap::new();

        let Ok(entries) = self.fs.read_dir(Path::new(&self.proc_path)) else {
            return owners;
        };

        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let fd_dir = format!("{}/{}/fd", self.proc_path, pid);
            // Often unreadable for foreign processes without privileges
            let Ok(fds) = self.fs.read_dir(Path::new(&fd_dir)) else {
                continue;
            };

            let mut comm: Option<String> = None;
            for fd in fds {
                let Ok(target) = self.fs.read_link(&fd) else {
                    continue;
                };
                let target = target.to_string_lossy();
                let Some(inode) = target
                    .strip_prefix("socket:[")
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| s.parse::<u64>().ok())
                else {
                    continue;
                };
                let comm = comm.get_or_insert_with(|| self.read_comm(pid));
                owners.insert(inode, (pid, comm.clone()));
            }
        }

        owners
    }

    fn read_comm(&self, pid: u32) -> String {
        let path = format!("{}/{}/comm", self.proc_path, pid);
        self.fs
            .read_to_string(Path::new(&path))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("pid-{}", pid))
    }

    fn ephemeral_ports(
        &self,
        sockets: &[SocketEntry],
        owners: &HashMap<u64, (u32, String)>,
    ) -> EphemeralPortInfo {
        let range_path = format!("{}/sys/net/ipv4/ip_local_port_range", self.proc_path);
        let (low, high) = self
            .fs
            .read_to_string(Path::new(&range_path))
            .ok()
            .and_then(|s| parse_port_range(&s))
            .unwrap_or(DEFAULT_PORT_RANGE);

        let mut info = EphemeralPortInfo {
            range_low: low,
            range_high: high,
            ..Default::default()
        };

        let mut per_pid: HashMap<u32, (String, u32)> = HashMap::new();
        for s in sockets {
            if s.local_port < low || s.local_port > high {
                continue;
            }
            info.in_use += 1;
            match s.state {
                tcp_state::ESTABLISHED => info.established += 1,
                tcp_state::TIME_WAIT => info.time_wait += 1,
                _ => {}
            }
            if let Some((pid, comm)) = owners.get(&s.inode) {
                let entry = per_pid.entry(*pid).or_insert_with(|| (comm.clone(), 0));
                entry.1 += 1;
            }
        }

        let mut users: Vec<PortUser> = per_pid
            .into_iter()
            .map(|(pid, (process, socket_count))| PortUser {
                pid,
                process,
                socket_count,
            })
            .collect();
        users.sort_by(|a, b| b.socket_count.cmp(&a.socket_count).then(a.pid.cmp(&b.pid)));
        users.truncate(TOP_PORT_USERS);
        info.top_users = users;

        info
    }

    fn close_wait(
        &mut self,
        sockets: &[SocketEntry],
        owners: &HashMap<u64, (u32, String)>,
        now: i64,
    ) -> CloseWaitInfo {
        struct Agg {
            process: String,
            count: u32,
            oldest: i64,
            newest: i64,
            remote_ips: Vec<String>,
        }

        let mut observed: HashMap<String, i64> = HashMap::new();
        let mut per_pid: HashMap<u32, Agg> = HashMap::new();
        let mut total = 0u32;

        for s in sockets {
            if s.state != tcp_state::CLOSE_WAIT {
                continue;
            }
            total += 1;

            let first = *self.first_seen.entry(s.hex_pair.clone()).or_insert(now);
            observed.insert(s.hex_pair.clone(), first);

            let Some((pid, comm)) = owners.get(&s.inode) else {
                continue;
            };
            let agg = per_pid.entry(*pid).or_insert_with(|| Agg {
                process: comm.clone(),
                count: 0,
                oldest: first,
                newest: first,
                remote_ips: Vec::new(),
            });
            agg.count += 1;
            agg.oldest = agg.oldest.min(first);
            agg.newest = agg.newest.max(first);
            if agg.remote_ips.len() < LEAKER_IP_SAMPLES {
                let ip = format!("{}:{}", s.remote_ip, s.remote_port);
                if !agg.remote_ips.contains(&ip) {
                    agg.remote_ips.push(ip);
                }
            }
        }

        // Prune tracked sockets that disappeared
        self.first_seen = observed;

        if self.samples == 0 {
            self.close_wait_ewma = total as f64;
        } else {
            self.close_wait_ewma =
                CLOSE_WAIT_ALPHA * total as f64 + (1.0 - CLOSE_WAIT_ALPHA) * self.close_wait_ewma;
        }
        self.samples += 1;

        let mut leakers: Vec<CloseWaitLeaker> = per_pid
            .into_iter()
            .map(|(pid, agg)| CloseWaitLeaker {
                pid,
                process: agg.process,
                count: agg.count,
                oldest_age_secs: (now - agg.oldest).max(0) as u64,
                newest_age_secs: (now - agg.newest).max(0) as u64,
                remote_ips: agg.remote_ips,
            })
            .collect();
        leakers.sort_by(|a, b| b.count.cmp(&a.count).then(a.pid.cmp(&b.pid)));

        CloseWaitInfo {
            total,
            smoothed: self.close_wait_ewma,
            leakers,
        }
    }
}

fn census_states(sockets: &[SocketEntry]) -> TcpStateCensus {
    let mut census = TcpStateCensus::default();
    for s in sockets {
        match s.state {
            tcp_state::ESTABLISHED => census.established += 1,
            tcp_state::SYN_SENT => census.syn_sent += 1,
            tcp_state::SYN_RECV => census.syn_recv += 1,
            tcp_state::FIN_WAIT1 => census.fin_wait1 += 1,
            tcp_state::FIN_WAIT2 => census.fin_wait2 += 1,
            tcp_state::TIME_WAIT => census.time_wait += 1,
            tcp_state::CLOSE => census.close += 1,
            tcp_state::CLOSE_WAIT => census.close_wait += 1,
            tcp_state::LAST_ACK => census.last_ack += 1,
            tcp_state::LISTEN => census.listen += 1,
            tcp_state::CLOSING => census.closing += 1,
            _ => {}
        }
    }
    census
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    /// Builds a tcp table row. Addresses are already hex-encoded.
    fn row(sl: u32, local: &str, remote: &str, state: u8, inode: u64) -> String {
        format!(
            "   {}: {} {} {:02X} 00000000:00000000 00:00000000 00000000  1000        0 {} 1 0 100 0 0 10 0\n",
            sl, local, remote, state, inode
        )
    }

    fn tcp_file(rows: &[String]) -> String {
        let mut out = String::from(
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n",
        );
        for r in rows {
            out.push_str(r);
        }
        out
    }

    fn fs_with_sockets(rows: &[String]) -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/tcp", tcp_file(rows));
        fs.add_file("/proc/net/tcp6", tcp_file(&[]));
        fs.add_file("/proc/sys/net/ipv4/ip_local_port_range", "32768\t60999\n");
        fs
    }

    fn add_socket_owner(fs: &mut MockFs, pid: u32, comm: &str, inodes: &[u64]) {
        fs.add_dir(format!("/proc/{}", pid));
        fs.add_dir(format!("/proc/{}/fd", pid));
        fs.add_file(format!("/proc/{}/comm", pid), format!("{}\n", comm));
        for (i, inode) in inodes.iter().enumerate() {
            fs.add_fd(pid, i as u32, &format!("socket:[{}]", inode));
        }
    }

    #[test]
    fn census_counts_states() {
        let rows = vec![
            row(0, "0100007F:1F90", "00000000:0000", tcp_state::LISTEN, 1),
            row(1, "0100007F:D431", "0100007F:0050", tcp_state::ESTABLISHED, 2),
            row(2, "0100007F:D432", "0100007F:0050", tcp_state::TIME_WAIT, 3),
            row(3, "0100007F:D433", "0100007F:0050", tcp_state::TIME_WAIT, 4),
            row(4, "0100007F:D434", "0100007F:0050", tcp_state::CLOSE_WAIT, 5),
        ];
        let fs = fs_with_sockets(&rows);
        let mut collector = SocketCollector::new(fs, "/proc");
        let sample = collector.collect(1000).unwrap();

        assert_eq!(sample.tcp_states.listen, 1);
        assert_eq!(sample.tcp_states.established, 1);
        assert_eq!(sample.tcp_states.time_wait, 2);
        assert_eq!(sample.tcp_states.close_wait, 1);
    }

    #[test]
    fn ephemeral_ports_attributed_to_owners() {
        // Ports 0xD431.. are 54321.., inside the default range
        let rows = vec![
            row(0, "0100007F:D431", "0A000001:0050", tcp_state::ESTABLISHED, 10),
            row(1, "0100007F:D432", "0A000001:0050", tcp_state::ESTABLISHED, 11),
            row(2, "0100007F:D433", "0A000001:0050", tcp_state::TIME_WAIT, 12),
            // port 80: outside the ephemeral range
            row(3, "0100007F:0050", "00000000:0000", tcp_state::LISTEN, 13),
        ];
        let mut fs = fs_with_sockets(&rows);
        add_socket_owner(&mut fs, 500, "curlpool", &[10, 11]);
        add_socket_owner(&mut fs, 501, "other", &[12]);

        let mut collector = SocketCollector::new(fs, "/proc");
        let sample = collector.collect(1000).unwrap();

        let eph = &sample.ephemeral_ports;
        assert_eq!(eph.in_use, 3);
        assert_eq!(eph.established, 2);
        assert_eq!(eph.time_wait, 1);
        assert_eq!(eph.top_users[0].pid, 500);
        assert_eq!(eph.top_users[0].process, "curlpool");
        assert_eq!(eph.top_users[0].socket_count, 2);
    }

    #[test]
    fn close_wait_ages_survive_ticks_and_prune() {
        let rows = vec![
            row(0, "0100007F:D431", "0A000001:0050", tcp_state::CLOSE_WAIT, 20),
            row(1, "0100007F:D432", "0A000002:0050", tcp_state::CLOSE_WAIT, 21),
        ];
        let mut fs = fs_with_sockets(&rows);
        add_socket_owner(&mut fs, 700, "leaky", &[20, 21]);

        let mut collector = SocketCollector::new(fs, "/proc");

        let s1 = collector.collect(1000).unwrap();
        assert_eq!(s1.close_wait.total, 2);
        assert_eq!(s1.close_wait.leakers[0].oldest_age_secs, 0);

        // 60 s later, same sockets: ages grow from the first-seen map
        let s2 = collector.collect(1060).unwrap();
        let leaker = &s2.close_wait.leakers[0];
        assert_eq!(leaker.pid, 700);
        assert_eq!(leaker.count, 2);
        assert_eq!(leaker.oldest_age_secs, 60);
        assert_eq!(leaker.newest_age_secs, 60);
        assert_eq!(leaker.remote_ips.len(), 2);

        // One socket closes; its first-seen entry must be pruned
        let remaining = vec![row(0, "0100007F:D431", "0A000001:0050", tcp_state::CLOSE_WAIT, 20)];
        let mut fs2 = fs_with_sockets(&remaining);
        add_socket_owner(&mut fs2, 700, "leaky", &[20]);
        collector.fs = fs2;

        let s3 = collector.collect(1120).unwrap();
        assert_eq!(s3.close_wait.total, 1);
        assert_eq!(collector.first_seen.len(), 1);
        assert_eq!(s3.close_wait.leakers[0].oldest_age_secs, 120);
    }

    #[test]
    fn close_wait_ewma_smooths() {
        let rows = vec![row(
            0,
            "0100007F:D431",
            "0A000001:0050",
            tcp_state::CLOSE_WAIT,
            20,
        )];
        let fs = fs_with_sockets(&rows);
        let mut collector = SocketCollector::new(fs, "/proc");

        let s1 = collector.collect(1000).unwrap();
        // First sample seeds the EWMA directly
        assert!((s1.close_wait.smoothed - 1.0).abs() < 1e-9);

        // Sockets vanish; smoothed value decays instead of dropping to 0
        collector.fs = fs_with_sockets(&[]);
        let s2 = collector.collect(1010).unwrap();
        assert_eq!(s2.close_wait.total, 0);
        assert!((s2.close_wait.smoothed - 0.7).abs() < 1e-9);
    }
}
