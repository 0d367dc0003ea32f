pub mod report;
pub mod watch;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{process_name_command, process_permission_command, process_usage_command, UsageCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, level_filters::LevelFilter};
use watch::{detect_shutdown, process_watch_command};

use crate::{
    config::AppConfig,
    platform::{
        adb::{default_program, AdbPlatform},
        snapshot::SnapshotPlatform,
        Platform,
    },
    usage::{
        names::{NameResolver, PolicyPreset},
        refresh::RefreshOptions,
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Timewell", version, long_about = None)]
#[command(about = "Shows which apps were used on an Android device in the last 24 hours", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to use $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(clap::Args, Debug)]
struct BackendArgs {
    #[arg(long, help = "Read device state from a JSON snapshot instead of adb")]
    snapshot: Option<PathBuf>,
    #[arg(long, help = "Serial of the device adb should talk to")]
    serial: Option<String>,
    #[arg(long, help = "Path to the adb executable")]
    adb: Option<PathBuf>,
    #[arg(
        long = "package",
        help = "Package whose usage access is checked. Overrides own_package from config.json"
    )]
    own_package: Option<String>,
}

/// Options shared by commands that show usage.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct ReportArgs {
    #[arg(short, long, help = "Number of apps to show")]
    top: Option<usize>,
    #[arg(
        short,
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Include apps without a launcher entry. Overrides include_system_apps from config.json, --system=false turns it off"
    )]
    system: Option<bool>,
    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct PolicyArgs {
    #[arg(long, help = "Which platform labels are trusted. Overrides label_policy from config.json")]
    policy: Option<PolicyPreset>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show the most used apps of the last 24 hours")]
    Usage {
        #[command(flatten)]
        command: UsageCommand,
    },
    #[command(about = "Keep refreshing the usage report until interrupted")]
    Watch {
        #[command(flatten)]
        report: ReportArgs,
        #[arg(short, long, default_value_t = 30, help = "Seconds between refreshes")]
        interval: u64,
    },
    #[command(about = "Check usage access and optionally open its settings screen")]
    Permission {
        #[arg(long, help = "Open the usage access settings screen on the device")]
        open: bool,
    },
    #[command(about = "Resolve the display name of a package")]
    Name {
        package: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

/// Everything a command needs to talk to the device.
pub struct Session {
    pub platform: Platform,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
}

impl Session {
    pub fn resolver(&self, policy: PolicyArgs) -> NameResolver {
        let resolver = self.config.name_resolver();
        match policy.policy {
            Some(preset) => NameResolver::new(resolver.known().clone(), preset.into()),
            None => resolver,
        }
    }

    pub fn refresh_options(&self, report: &ReportArgs) -> RefreshOptions {
        let defaults = self.config.refresh_options();
        RefreshOptions {
            top: report.top.unwrap_or(defaults.top),
            include_system_apps: report.system.unwrap_or(defaults.include_system_apps),
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&app_dir.join("logs"), logging_level, args.log)?;

    let config = AppConfig::load(&app_dir)?;
    debug!("Using config {config:?}");
    let platform = create_platform(&args.backend, &config).await?;
    let session = Session {
        platform,
        config,
        clock: Arc::new(DefaultClock),
    };

    match args.commands {
        Commands::Usage { command } => process_usage_command(&session, command).await,
        Commands::Watch { report, interval } => {
            let shutdown = CancellationToken::new();
            tokio::spawn(detect_shutdown(shutdown.clone()));
            process_watch_command(&session, report, Duration::from_secs(interval), shutdown).await
        }
        Commands::Permission { open } => process_permission_command(&session, open).await,
        Commands::Name { package, policy } => process_name_command(&session, &package, policy).await,
    }
}

async fn create_platform(backend: &BackendArgs, config: &AppConfig) -> Result<Platform> {
    if let Some(path) = &backend.snapshot {
        return Ok(Platform::from_backend(SnapshotPlatform::load(path).await?));
    }
    let own_package = backend
        .own_package
        .clone()
        .unwrap_or_else(|| config.own_package.clone());
    Ok(Platform::from_backend(AdbPlatform::new(
        backend.adb.clone().unwrap_or_else(default_program),
        backend.serial.clone(),
        own_package,
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use clap::Parser;

    use crate::{
        config::AppConfig,
        platform::{
            snapshot::{SnapshotDocument, SnapshotPlatform},
            Platform,
        },
        utils::clock::FixedClock,
    };

    use super::{Args, Commands, Session};

    fn session(config: AppConfig) -> Session {
        Session {
            platform: Platform::from_backend(SnapshotPlatform::new(SnapshotDocument::default())),
            config,
            clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap())),
        }
    }

    fn include_system_apps(session: &Session, args: &[&str]) -> bool {
        let args = Args::try_parse_from(["timewell", "watch"].iter().chain(args)).unwrap();
        let Commands::Watch { report, .. } = args.commands else {
            panic!("Expected watch");
        };
        session.refresh_options(&report).include_system_apps
    }

    #[test]
    fn system_flag_overrides_config_both_ways() {
        let enabled = session(AppConfig {
            include_system_apps: true,
            ..Default::default()
        });
        assert!(include_system_apps(&enabled, &[]));
        assert!(!include_system_apps(&enabled, &["--system=false"]));
        assert!(include_system_apps(&enabled, &["--system"]));

        let disabled = session(AppConfig::default());
        assert!(!include_system_apps(&disabled, &[]));
        assert!(include_system_apps(&disabled, &["-s"]));
        assert!(!include_system_apps(&disabled, &["--system", "false"]));
    }

    #[test]
    fn top_falls_back_to_config() {
        let session = session(AppConfig {
            top: 3,
            ..Default::default()
        });
        let args = Args::try_parse_from(["timewell", "watch", "--top", "5"]).unwrap();
        let Commands::Watch { report, .. } = args.commands else {
            panic!("Expected watch");
        };
        assert_eq!(session.refresh_options(&report).top, 5);

        let args = Args::try_parse_from(["timewell", "watch"]).unwrap();
        let Commands::Watch { report, .. } = args.commands else {
            panic!("Expected watch");
        };
        assert_eq!(session.refresh_options(&report).top, 3);
    }
}
