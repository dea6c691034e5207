//! Console report helpers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use randomjs_pow::{ListStats, MiningSession, StatsRun};
use sysinfo::System;

const GIB: f64 = 1_073_741_824.0;

/// Width of the longest histogram bar
const HISTOGRAM_BAR: usize = 50;

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let hours = (now % 86400) / 3600;
    let minutes = (now % 3600) / 60;
    let seconds = now % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn log(msg: &str) {
    println!("[{}] {}", timestamp(), msg);
}

pub fn log_separator() {
    println!("\n{}", "=".repeat(60));
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}

pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        return format!("{:.3}s", elapsed.as_secs_f64());
    }
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Host summary printed before a run
pub fn system_banner(title: &str) {
    let mut sys = System::new_all();
    sys.refresh_all();

    log_separator();
    println!("  {} v{}", title, env!("CARGO_PKG_VERSION"));
    log_separator();
    println!("\n[System Info]");
    println!("    CPU Cores: {}", sys.cpus().len());
    if let Some(cpu) = sys.cpus().first() {
        println!("    CPU Model: {}", cpu.brand());
    }
    println!("    Total Memory: {:.2} GB", sys.total_memory() as f64 / GIB);
    println!("    Available Memory: {:.2} GB", sys.available_memory() as f64 / GIB);
}

/// Number of logical CPUs, at least one
pub fn cpu_count() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.cpus().len().max(1)
}

pub fn print_session(session: &MiningSession) {
    log_separator();
    println!("  MINING SUMMARY");
    log_separator();
    println!("    Duration:      {}", format_duration(session.elapsed));
    println!("    Trials:        {}", format_number(session.trials));
    println!("    Skipped:       {}", format_number(session.skipped));
    println!("    Solutions:     {}", session.solutions.len());
    println!("    Solutions/s:   {:.4}", session.solutions_per_second());

    let nonces: Vec<String> = session
        .solutions
        .iter()
        .map(|s| s.nonce.to_string())
        .collect();
    println!("    Nonces:        [{}]", nonces.join(", "));
}

fn print_list(name: &str, stats: &ListStats, scale: f64, unit: &str) {
    println!(
        "    {:<12} min {:.3}{u}, max {:.3}{u}, avg {:.3}{u}, stdev {:.3}{u}",
        name,
        stats.min * scale,
        stats.max * scale,
        stats.average * scale,
        stats.std_dev * scale,
        u = unit,
    );
}

fn print_histogram(stats: &ListStats, scale: f64, unit: &str) {
    let buckets = stats.histogram();
    let peak = buckets.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1);
    println!("\n[Runtime Histogram] (bucket width {:.4}{})", stats.std_dev * scale / 10.0, unit);
    for (lower, count) in buckets {
        let bar = "#".repeat(count * HISTOGRAM_BAR / peak);
        println!("    {:>10.3}{} {:>8} {}", lower * scale, unit, count, bar);
    }
}

pub fn print_stats(run: &StatsRun) {
    let total = run.reports.len() + run.failures.len();

    log_separator();
    println!("  STATISTICS ({} programs)", format_number(total as u64));
    log_separator();
    println!("    Total time:    {}", format_duration(run.elapsed));
    println!("    Failures:      {}", run.failures.len());

    let slowest = run.slowest(10);
    if !slowest.is_empty() {
        println!("\n[Slowest Programs]");
        for report in slowest {
            println!("    {}  {:.3} ms", report.key, report.elapsed.as_secs_f64() * 1e3);
        }
    }

    let Some(runtime) = run.runtime() else {
        println!("\n    No program ran successfully.");
        return;
    };
    println!("\n[Distributions]");
    print_list("Runtime", &runtime, 1e3, " ms");
    if let Some(cyclomatic) = run.cyclomatic() {
        print_list("Cyclomatic", &cyclomatic, 1.0, "");
    }
    if let Some(halstead) = run.halstead() {
        print_list("Halstead", &halstead, 1.0, "");
    }
    println!(
        "    99.99th percentile runtime: {:.3} ms",
        runtime.percentile(0.9999) * 1e3
    );
    println!("    Output entropy: {:.2} bits", run.entropy);

    print_histogram(&runtime, 1e3, " ms");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "0.250s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
