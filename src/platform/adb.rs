//! Platform implementation that drives a device through the `adb` binary.
//!
//! Usage comes from `dumpsys usagestats`, which prints the daily interval stats the device
//! keeps in memory. Labels aren't reachable through the shell, so the inventory only reports
//! whether a package exists and whether it has a launcher entry.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::usage::entities::{QueryWindow, UsageRecord};

use super::{
    LookupError, PackageInfo, PackageInventory, ResourceLabel, UsageAccess, UsageSource,
};

const USAGE_ACCESS_SETTINGS: &str = "android.settings.USAGE_ACCESS_SETTINGS";
const DAILY_SECTION: &str = "In-memory daily stats";
const SECTION_PREFIX: &str = "In-memory ";
const LAST_USED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn default_program() -> PathBuf {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            PathBuf::from("adb.exe")
        } else {
            PathBuf::from("adb")
        }
    }
}

pub struct AdbPlatform {
    program: PathBuf,
    serial: Option<String>,
    /// Package whose usage access is checked.
    own_package: String,
}

impl AdbPlatform {
    pub fn new(program: PathBuf, serial: Option<String>, own_package: String) -> Self {
        Self {
            program,
            serial,
            own_package,
        }
    }

    #[instrument(skip(self))]
    async fn shell(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            command.args(["-s", serial.as_str()]);
        }
        command.arg("shell").args(args);

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.program))?;
        if !output.status.success() {
            bail!(
                "adb shell {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl UsageAccess for AdbPlatform {
    async fn is_usage_access_granted(&self) -> Result<bool> {
        if !is_package_name(&self.own_package) {
            bail!("Invalid package name {:?}", self.own_package);
        }
        let output = self
            .shell(&["appops", "get", self.own_package.as_str(), "GET_USAGE_STATS"])
            .await?;
        Ok(parse_usage_access(&output))
    }

    async fn open_usage_access_settings(&self) -> Result<()> {
        self.shell(&["am", "start", "-a", USAGE_ACCESS_SETTINGS])
            .await
            .context("Failed to open usage access settings")?;
        Ok(())
    }
}

#[async_trait]
impl UsageSource for AdbPlatform {
    async fn query_usage(&self, window: QueryWindow) -> Result<Option<Vec<UsageRecord>>> {
        let output = self.shell(&["dumpsys", "usagestats"]).await?;
        Ok(parse_daily_usage(&output, &window, &Local))
    }
}

#[async_trait]
impl PackageInventory for AdbPlatform {
    async fn lookup_package(&self, package: &str) -> Result<PackageInfo, LookupError> {
        // The device shell interprets its arguments, only plain identifiers are passed on.
        if !is_package_name(package) {
            warn!("Refusing to look up invalid package name {package:?}");
            return Err(LookupError::NotFound {
                package: package.to_owned(),
            });
        }

        let listed = self.shell(&["pm", "list", "packages", package]).await?;
        if !is_package_listed(&listed, package) {
            return Err(LookupError::NotFound {
                package: package.to_owned(),
            });
        }

        let resolved = self
            .shell(&[
                "cmd",
                "package",
                "resolve-activity",
                "--brief",
                "-a",
                "android.intent.action.MAIN",
                "-c",
                "android.intent.category.LAUNCHER",
                package,
            ])
            .await?;

        Ok(PackageInfo {
            launchable: has_launcher_activity(&resolved, package),
            resource_label: ResourceLabel::Undeclared,
            application_label: None,
        })
    }
}

fn is_package_name(package: &str) -> bool {
    !package.is_empty()
        && package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// `appops get` prints `GET_USAGE_STATS: allow; time=...` once the user granted access.
fn parse_usage_access(output: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("GET_USAGE_STATS:"))
        .filter_map(|rest| rest.split(';').next())
        .any(|mode| mode.trim() == "allow")
}

fn is_package_listed(output: &str, package: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .any(|listed| listed == package)
}

/// The brief output ends with `package/activity` when a launcher activity exists.
fn has_launcher_activity(output: &str, package: &str) -> bool {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .and_then(|line| line.split_once('/'))
        .is_some_and(|(owner, _)| owner == package)
}

/// Extracts usage from the first daily section of `dumpsys usagestats`. Returns `None` when the
/// output has no daily section at all.
fn parse_daily_usage<Tz: TimeZone>(
    output: &str,
    window: &QueryWindow,
    timezone: &Tz,
) -> Option<Vec<UsageRecord>> {
    let mut lines = output
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.starts_with(DAILY_SECTION));
    lines.next()?;

    let mut records = vec![];
    for line in lines.take_while(|line| !line.starts_with(SECTION_PREFIX)) {
        if !line.starts_with("package=") {
            continue;
        }
        let fields = parse_fields(line);
        let field = |name: &str| fields.iter().find(|(key, _)| *key == name).map(|v| v.1);

        let (Some(package), Some(total)) = (field("package"), field("totalTimeUsed")) else {
            continue;
        };
        let Some(foreground_ms) = parse_elapsed_ms(total) else {
            warn!("Unexpected totalTimeUsed {total} for {package}");
            continue;
        };

        let last_used = field("lastTimeUsed")
            .and_then(|v| NaiveDateTime::parse_from_str(v, LAST_USED_FORMAT).ok())
            .and_then(|v| timezone.from_local_datetime(&v).earliest())
            .map(|v| v.to_utc());
        if matches!(last_used, Some(last_used) if last_used < window.start) {
            debug!("Skipping {package}, last used before the window");
            continue;
        }

        records.push(UsageRecord::new(package, foreground_ms));
    }
    Some(records)
}

/// Splits `key=value key="quoted value"` pairs.
fn parse_fields(line: &str) -> Vec<(&str, &str)> {
    let mut fields = vec![];
    let mut rest = line.trim();
    while let Some((key, after)) = rest.split_once('=') {
        let (value, remaining) = match after.strip_prefix('"') {
            Some(quoted) => quoted.split_once('"').unwrap_or((quoted, "")),
            None => after.split_once(' ').unwrap_or((after, "")),
        };
        fields.push((key.trim(), value));
        rest = remaining.trim_start();
    }
    fields
}

/// Parses `MM:SS` or `H:MM:SS` into milliseconds. `None` when the value doesn't fit.
fn parse_elapsed_ms(value: &str) -> Option<u64> {
    let parts = value
        .split(':')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let seconds = parts
        .iter()
        .try_fold(0u64, |total, part| total.checked_mul(60)?.checked_add(*part))?;
    seconds.checked_mul(1000)
}
