//! CPU accounting from `cpu.stat`

pub const CPU_STAT: &str = "cpu.stat";

/// Find the first `usage_usec <n>` record in `cpu.stat` text.
///
/// Records that do not parse are skipped, so `None` just means no usage has
/// been reported.
pub fn parse_usage_usec(stat: &str) -> Option<u64> {
    stat.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("usage_usec"), Some(value)) => value.parse().ok(),
            _ => None,
        }
    })
}

pub fn usec_to_ms(usec: u64) -> u64 {
    usec / 1000
}

/// CPU time in milliseconds, zero when `usage_usec` is absent
pub fn run_time_ms(stat: &str) -> u64 {
    parse_usage_usec(stat).map_or(0, usec_to_ms)
}
