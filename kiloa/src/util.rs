//! Formatting helpers for log lines.

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K {
        return format!("{b:.0}B");
    }
    let kb = b / K;
    if kb < K {
        return format!("{kb:.1}KB");
    }
    let mb = kb / K;
    if mb < K {
        return format!("{mb:.1}MB");
    }
    let gb = mb / K;
    if gb < K {
        return format!("{gb:.1}GB");
    }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

/// `used/total` in human units, e.g. `1.5GB/4.0GB`.
pub fn usage_pair(used: u64, total: u64) -> String {
    format!("{}/{}", human(used), human(total))
}

/// MiB/s rate with two decimals.
pub fn rate(mib_per_sec: f64) -> String {
    format!("{mib_per_sec:.2}MiB/s")
}
