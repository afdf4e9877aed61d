//! Host probes backed by sysinfo, plus `/proc/stat` for the CPU time buckets
//! (sysinfo does not expose steal time).

use crate::error::ProbeError;
use crate::types::{CpuTimes, HostInfo, RawCounterSample, ResourceLevels};
use chrono::Utc;
use std::path::Path;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

/// Source of raw counters and absolute resource levels.
pub trait HostProbe: Send {
    /// Cumulative CPU and network counters, stamped with the capture time.
    fn counters(&mut self) -> Result<RawCounterSample, ProbeError>;
    /// Memory, root disk, load average and uptime.
    fn levels(&mut self) -> Result<ResourceLevels, ProbeError>;
    /// Static facts; read once at startup.
    fn host_info(&mut self) -> HostInfo;
}

pub struct SysinfoProbe {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing())
            .with_memory(MemoryRefreshKind::everything());
        Self {
            sys: System::new_with_specifics(refresh_kind),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn counters(&mut self) -> Result<RawCounterSample, ProbeError> {
        let cpu = read_cpu_times()?;
        self.networks.refresh(true);
        let (bytes_sent, bytes_recv) = self
            .networks
            .list()
            .iter()
            .filter(|(name, _)| !is_loopback(name))
            .fold((0u64, 0u64), |(tx, rx), (_, data)| {
                (
                    tx.saturating_add(data.total_transmitted()),
                    rx.saturating_add(data.total_received()),
                )
            });
        Ok(RawCounterSample {
            cpu,
            bytes_sent,
            bytes_recv,
            captured_at: Utc::now(),
        })
    }

    fn levels(&mut self) -> Result<ResourceLevels, ProbeError> {
        self.sys.refresh_memory();
        let mem_total = self.sys.total_memory();
        if mem_total == 0 {
            return Err(ProbeError::Unavailable("memory"));
        }
        let mem_used = mem_total.saturating_sub(self.sys.available_memory());

        self.disks.refresh(true);
        let root = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| self.disks.list().first())
            .ok_or(ProbeError::Unavailable("root disk"))?;
        let disk_total = root.total_space();
        let disk_used = disk_total.saturating_sub(root.available_space());

        let load = System::load_average();
        Ok(ResourceLevels {
            cores: self.sys.cpus().len(),
            load_1: load.one,
            load_5: load.five,
            load_15: load.fifteen,
            mem_used,
            mem_total,
            disk_used,
            disk_total,
            uptime: System::uptime(),
        })
    }

    fn host_info(&mut self) -> HostInfo {
        let cpu_model = self
            .sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty());
        let cpu_cores_detail = cores_detail(self.sys.cpus().len());
        HostInfo {
            host_name: System::host_name(),
            os_distro: System::long_os_version(),
            kernel_version: System::kernel_version(),
            cpu_model,
            cpu_cores_detail,
            boot_time: Some(System::boot_time()).filter(|t| *t > 0),
            public_ip: None,
        }
    }
}

fn cores_detail(logical: usize) -> Option<String> {
    match logical {
        0 => None,
        1 => Some("1 logical core".into()),
        n => Some(format!("{n} logical cores")),
    }
}

fn is_loopback(iface: &str) -> bool {
    iface == "lo" || iface.starts_with("lo0") || iface.eq_ignore_ascii_case("loopback")
}

#[cfg(target_os = "linux")]
fn read_cpu_times() -> Result<CpuTimes, ProbeError> {
    let s = std::fs::read_to_string("/proc/stat")?;
    let line = s
        .lines()
        .next()
        .ok_or_else(|| ProbeError::Parse("empty /proc/stat".into()))?;
    parse_cpu_line(line)
}

// No steal accounting off Linux; zero buckets make the steal rate zero.
#[cfg(not(target_os = "linux"))]
fn read_cpu_times() -> Result<CpuTimes, ProbeError> {
    Ok(CpuTimes::default())
}

/// Parse the aggregate line of `/proc/stat`:
/// "cpu  user nice system idle iowait irq softirq steal guest guest_nice".
/// Older kernels omit the trailing columns; missing ones read as zero.
pub fn parse_cpu_line(line: &str) -> Result<CpuTimes, ProbeError> {
    let mut it = line.split_whitespace();
    if it.next() != Some("cpu") {
        return Err(ProbeError::Parse(format!("not an aggregate cpu line: {line:?}")));
    }
    let mut vals = [0u64; 8];
    let mut seen = 0;
    for (slot, tok) in vals.iter_mut().zip(it) {
        *slot = tok
            .parse::<u64>()
            .map_err(|e| ProbeError::Parse(format!("bad cpu column {tok:?}: {e}")))?;
        seen += 1;
    }
    if seen < 4 {
        return Err(ProbeError::Parse(format!("too few cpu columns: {line:?}")));
    }
    let [user, nice, system, idle, iowait, irq, softirq, steal] = vals;
    Ok(CpuTimes {
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
        steal,
    })
}
