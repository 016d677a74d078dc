//! get_system_info tool - time, CPU, load, memory and disk usage of this host

use std::path::{Path, PathBuf};

use serde_json::Value;
use sysinfo::{Disks, System};

use crate::error::ToolError;
use crate::tools::{BoxFuture, Tool, ToolOutput};

/// Reports local time and resource usage of the host
pub struct SystemInfo {
    disk_path: PathBuf,
}

impl SystemInfo {
    pub fn new() -> Self {
        Self {
            disk_path: PathBuf::from("/"),
        }
    }

    async fn snapshot(&self) -> Snapshot {
        let mut system = System::new();

        // CPU usage is a delta between two refreshes
        system.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let load = System::load_average();
        let disks = Disks::new_with_refreshed_list();
        let disk = disk_for_path(
            disks
                .list()
                .iter()
                .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
            &self.disk_path,
        );

        Snapshot {
            time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string(),
            cpu_percent: system.global_cpu_usage(),
            load: (load.one, load.five, load.fifteen),
            memory: Usage::new(system.total_memory(), system.used_memory()),
            disk: disk.map(|(total, available)| Usage::new(total, total.saturating_sub(available))),
            disk_path: self.disk_path.display().to_string(),
        }
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SystemInfo {
    fn execute(&self, _params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move { Ok(ToolOutput::text(self.snapshot().await.render())) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Usage {
    total: u64,
    used: u64,
}

impl Usage {
    fn new(total: u64, used: u64) -> Self {
        Self { total, used }
    }

    fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 * 100.0 / self.total as f64
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    time: String,
    cpu_percent: f32,
    load: (f64, f64, f64),
    memory: Usage,
    disk: Option<Usage>,
    disk_path: String,
}

impl Snapshot {
    fn render(&self) -> String {
        let mut lines = vec![
            format!("Current time: {}", self.time),
            format!("CPU usage: {:.1}%", self.cpu_percent),
        ];

        let (one, five, fifteen) = self.load;
        lines.push(format!(
            "Load average: {:.2} (1m), {:.2} (5m), {:.2} (15m)",
            one, five, fifteen
        ));

        if self.memory.total == 0 {
            lines.push("Memory: unavailable".to_string());
        } else {
            lines.push(format!(
                "Memory: {} used of {} ({:.0}%)",
                format_bytes(self.memory.used),
                format_bytes(self.memory.total),
                self.memory.percent()
            ));
        }

        match self.disk {
            Some(disk) => lines.push(format!(
                "Disk ({}): {} used of {} ({:.0}%)",
                self.disk_path,
                format_bytes(disk.used),
                format_bytes(disk.total),
                disk.percent()
            )),
            None => lines.push("Disk: unavailable".to_string()),
        }

        lines.join("\n")
    }
}

/// Total and available bytes of the mount that holds `path` (longest mount prefix)
fn disk_for_path<'a>(
    mounts: impl Iterator<Item = (&'a Path, u64, u64)>,
    path: &Path,
) -> Option<(u64, u64)> {
    mounts
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.as_os_str().len())
        .map(|(_, total, available)| (total, available))
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.0} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{} KiB", bytes / KIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            time: "2026-01-01 12:00:00 UTC".to_string(),
            cpu_percent: 12.5,
            load: (0.52, 0.58, 0.59),
            memory: Usage::new(8 * 1024 * 1024 * 1024, 2 * 1024 * 1024 * 1024),
            disk: Some(Usage::new(100 * 1024 * 1024 * 1024, 25 * 1024 * 1024 * 1024)),
            disk_path: "/".to_string(),
        }
    }

    #[test]
    fn test_render() {
        let text = snapshot().render();
        assert_eq!(
            text,
            "Current time: 2026-01-01 12:00:00 UTC\n\
             CPU usage: 12.5%\n\
             Load average: 0.52 (1m), 0.58 (5m), 0.59 (15m)\n\
             Memory: 2.0 GiB used of 8.0 GiB (25%)\n\
             Disk (/): 25.0 GiB used of 100.0 GiB (25%)"
        );
    }

    #[test]
    fn test_render_missing_disk() {
        let mut snap = snapshot();
        snap.disk = None;
        snap.memory = Usage::new(0, 0);
        let text = snap.render();
        assert!(text.contains("Memory: unavailable"));
        assert!(text.ends_with("Disk: unavailable"));
    }

    #[test]
    fn test_disk_for_path_picks_longest_mount() {
        let mounts = [
            (Path::new("/"), 100, 40),
            (Path::new("/home"), 50, 10),
            (Path::new("/boot"), 1, 1),
        ];
        let pick = |p: &str| disk_for_path(mounts.iter().copied(), Path::new(p));
        assert_eq!(pick("/home/bob"), Some((50, 10)));
        assert_eq!(pick("/"), Some((100, 40)));
        assert_eq!(pick("/var"), Some((100, 40)));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512 * 1024), "512 KiB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[tokio::test]
    async fn test_report_has_cpu_line() {
        let output = SystemInfo::new().execute(Value::Null).await.unwrap();
        assert!(output.content.starts_with("Current time:"));
        assert!(output.content.contains("CPU usage:"));
        assert!(output.content.contains("Disk"));
    }
}
