//! Parsers for cgroup control files, unified (v2) and legacy (v1).

use crate::model::cgroup::CgroupIoDevice;

/// Parses `cpu.max`: `"quota period"` or `"max period"`.
/// Returns `(quota_usec, period_usec)`; quota -1 means unlimited.
pub fn parse_cpu_max(content: &str) -> (i64, u64) {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 2 {
        return (-1, 100_000);
    }
    let quota = if parts[0] == "max" {
        -1
    } else {
        parts[0].parse().unwrap_or(-1)
    };
    (quota, parts[1].parse().unwrap_or(100_000))
}

/// Fields pulled from a v2 `cpu.stat` file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStat {
    pub usage_usec: u64,
    pub user_usec: u64,
    pub system_usec: u64,
    pub nr_periods: u64,
    pub nr_throttled: u64,
    pub throttled_usec: u64,
}

/// Parses a v2 `cpu.stat` file (`key value` per line).
pub fn parse_cpu_stat(content: &str) -> CpuStat {
    let mut stat = CpuStat::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = parts[1].parse().unwrap_or(0);
        match parts[0] {
            "usage_usec" => stat.usage_usec = value,
            "user_usec" => stat.user_usec = value,
            "system_usec" => stat.system_usec = value,
            "nr_periods" => stat.nr_periods = value,
            "nr_throttled" => stat.nr_throttled = value,
            "throttled_usec" => stat.throttled_usec = value,
            _ => {}
        }
    }
    stat
}

/// Parses a v1 `cpu.stat` file. Times there are nanoseconds; the
/// result is scaled to microseconds to match v2.
pub fn parse_cpu_stat_v1(content: &str) -> CpuStat {
    let mut stat = CpuStat::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = parts[1].parse().unwrap_or(0);
        match parts[0] {
            "nr_periods" => stat.nr_periods = value,
            "nr_throttled" => stat.nr_throttled = value,
            "throttled_time" => stat.throttled_usec = value / 1000,
            _ => {}
        }
    }
    stat
}

/// Parses a single-number control file, with `"max"` mapping to
/// `u64::MAX` (memory.max, pids.max) and absence of content to the
/// provided default.
pub fn parse_limit(content: &str, default: u64) -> u64 {
    let trimmed = content.trim();
    if trimmed == "max" {
        u64::MAX
    } else {
        trimmed.parse().unwrap_or(default)
    }
}

/// Parses a plain single-number file (memory.current, pids.current,
/// v1 cpuacct.usage).
pub fn parse_number(content: &str) -> u64 {
    content.trim().parse().unwrap_or(0)
}

/// Extracts `oom_kill` from `memory.events` (v2) or `memory.oom_control`
/// (v1); both are `key value` files.
pub fn parse_oom_kills(content: &str) -> u64 {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 && parts[0] == "oom_kill" {
            return parts[1].parse().unwrap_or(0);
        }
    }
    0
}

/// Parses `io.stat`: one device per line,
/// `MAJOR:MINOR rbytes=.. wbytes=.. rios=.. wios=.. [...]`.
pub fn parse_io_stat(content: &str) -> Vec<CgroupIoDevice> {
    let mut devices = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let Some(dev) = parts.next() else {
            continue;
        };
        let Some((major_s, minor_s)) = dev.split_once(':') else {
            continue;
        };
        let (Ok(major), Ok(minor)) = (major_s.parse::<u32>(), minor_s.parse::<u32>()) else {
            continue;
        };

        let mut info = CgroupIoDevice {
            major,
            minor,
            ..Default::default()
        };
        for kv in parts {
            let Some((k, v)) = kv.split_once('=') else {
                continue;
            };
            let value: u64 = v.parse().unwrap_or(0);
            match k {
                "rbytes" => info.rbytes = value,
                "wbytes" => info.wbytes = value,
                "rios" => info.rios = value,
                "wios" => info.wios = value,
                _ => {}
            }
        }
        devices.push(info);
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_max_quota_and_unlimited() {
        assert_eq!(parse_cpu_max("100000 100000\n"), (100_000, 100_000));
        assert_eq!(parse_cpu_max("max 100000\n"), (-1, 100_000));
        assert_eq!(parse_cpu_max("garbage\n"), (-1, 100_000));
    }

    #[test]
    fn cpu_stat_v2_fields() {
        let stat = parse_cpu_stat(
            "usage_usec 123456\nuser_usec 100000\nsystem_usec 23456\nnr_periods 500\nnr_throttled 360\nthrottled_usec 7200000\n",
        );
        assert_eq!(stat.usage_usec, 123456);
        assert_eq!(stat.nr_periods, 500);
        assert_eq!(stat.nr_throttled, 360);
        assert_eq!(stat.throttled_usec, 7_200_000);
    }

    #[test]
    fn cpu_stat_v1_scales_ns() {
        let stat = parse_cpu_stat_v1("nr_periods 10\nnr_throttled 2\nthrottled_time 5000000\n");
        assert_eq!(stat.throttled_usec, 5000);
    }

    #[test]
    fn limits_and_numbers() {
        assert_eq!(parse_limit("1073741824\n", 0), 1_073_741_824);
        assert_eq!(parse_limit("max\n", 0), u64::MAX);
        assert_eq!(parse_number("536870912\n"), 536_870_912);
    }

    #[test]
    fn oom_kills_from_events() {
        assert_eq!(parse_oom_kills("low 0\nhigh 0\nmax 0\noom 0\noom_kill 3\n"), 3);
        assert_eq!(parse_oom_kills("low 0\n"), 0);
    }

    #[test]
    fn io_stat_devices() {
        let devices = parse_io_stat(
            "8:0 rbytes=123 wbytes=456 rios=7 wios=8 dbytes=0 dios=0\n8:16 rbytes=0 wbytes=1 rios=0 wios=2\n",
        );
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].rbytes, 123);
        assert_eq!(devices[1].minor, 16);
        assert_eq!(devices[1].wios, 2);
    }
}
