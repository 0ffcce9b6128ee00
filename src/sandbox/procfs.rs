//! procfs readers used for memory sampling
//!
//! Resident memory is summed over every live process in a process group, so
//! children spawned by the submission count against its limit.

use std::fs;

/// Process group id from the contents of `/proc/<pid>/stat`
pub fn parse_stat_pgrp(content: &str) -> Option<i32> {
    // comm may contain spaces and parentheses; fields resume after the last ')'
    let rest = &content[content.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    // state, ppid, pgrp
    fields.nth(2)?.parse().ok()
}

/// `VmRSS` in KB from the contents of `/proc/<pid>/status`
pub fn parse_vm_rss_kb(content: &str) -> Option<u64> {
    for line in content.lines() {
        let parts: Vec<&str> = line.splitn(2, ':').collect();
        if parts.len() != 2 || parts[0].trim() != "VmRSS" {
            continue;
        }
        return parts[1]
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok());
    }
    None
}

/// Resident memory of one process in KB; 0 once it is gone or a zombie
pub fn process_rss_kb(pid: i32) -> u64 {
    fs::read_to_string(format!("/proc/{}/status", pid))
        .ok()
        .and_then(|s| parse_vm_rss_kb(&s))
        .unwrap_or(0)
}

/// Pids of every process in group `pgid`, zombies included
pub fn group_pids(pgid: i32) -> Vec<i32> {
    let entries = match fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().and_then(|n| n.parse::<i32>().ok()))
        .filter(|pid| {
            fs::read_to_string(format!("/proc/{}/stat", pid))
                .ok()
                .and_then(|s| parse_stat_pgrp(&s))
                .map(|pgrp| pgrp == pgid)
                .unwrap_or(false)
        })
        .collect()
}

/// Sum of resident memory in KB over all processes in group `pgid`
pub fn group_rss_kb(pgid: i32) -> u64 {
    group_pids(pgid).into_iter().map(process_rss_kb).sum()
}
