use ansi_term::Colour::{Green, Yellow};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::info;

use crate::usage::{
    entities::DisplayEntry,
    refresh::{refresh, ScreenState},
};
use crate::utils::{
    clock::Clock,
    time::{parse_moment, DateStyle},
};

use super::{PolicyArgs, ReportArgs, Session};

#[derive(Debug, Clone, clap::Args)]
pub struct UsageCommand {
    #[command(flatten)]
    report: ReportArgs,
    #[arg(short, long, help = "Print the report as JSON")]
    json: bool,
    #[arg(
        short,
        long = "end",
        help = "End of the 24 hour window. Examples are \"1 hour ago\", \"12:00 16/03/2025\". Defaults to now"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Runs a single refresh and prints it.
pub async fn process_usage_command(
    session: &Session,
    UsageCommand {
        report,
        json,
        end_date,
        date_style,
    }: UsageCommand,
) -> Result<()> {
    let now = window_end(session.clock.as_ref(), end_date.as_deref(), date_style)?;
    let state = refresh(
        &session.platform,
        &session.resolver(report.policy),
        &session.refresh_options(&report),
        now,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::from(&state))?);
    } else {
        print_screen(&state);
    }
    Ok(())
}

/// End of the usage window. `--end` is read relative to the session clock.
fn window_end(
    clock: &dyn Clock,
    end_date: Option<&str>,
    style: DateStyle,
) -> Result<DateTime<Utc>> {
    match end_date {
        Some(end) => parse_moment(end, clock.time().with_timezone(&Local), style),
        None => Ok(clock.time()),
    }
}

pub async fn process_permission_command(session: &Session, open: bool) -> Result<()> {
    let granted = session.platform.access.is_usage_access_granted().await?;
    if granted {
        println!("{}", Green.paint("Usage access granted"));
    } else {
        println!("{}", Yellow.paint("Usage access permission is required."));
    }
    if open {
        session.platform.access.open_usage_access_settings().await?;
        info!("Requested usage access settings");
        println!("Opened usage access settings");
    }
    Ok(())
}

pub async fn process_name_command(
    session: &Session,
    package: &str,
    policy: PolicyArgs,
) -> Result<()> {
    let name = session
        .resolver(policy)
        .resolve_name(package, session.platform.inventory.as_ref())
        .await;
    println!("{name}");
    Ok(())
}

pub fn print_screen(state: &ScreenState) {
    println!("{}", render_screen(state));
}

pub fn render_screen(state: &ScreenState) -> String {
    match state {
        ScreenState::PermissionRequired => format!(
            "{}\nRun `timewell permission --open` to open the settings screen.",
            Yellow.paint("Usage access permission is required.")
        ),
        ScreenState::Usage(entries) if entries.is_empty() => format!(
            "{}\nNo app was used in the last 24 hours.",
            Green.paint("Usage access granted")
        ),
        ScreenState::Usage(entries) => {
            let mut lines = vec![
                Green.paint("Usage access granted").to_string(),
                "Top used apps today:".to_owned(),
            ];
            lines.extend(entries.iter().map(render_entry));
            lines.join("\n")
        }
    }
}

fn render_entry(entry: &DisplayEntry) -> String {
    format!("{}\t{}", entry.formatted_duration, entry.name)
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    permission_granted: bool,
    entries: &'a [DisplayEntry],
}

impl<'a> From<&'a ScreenState> for JsonReport<'a> {
    fn from(value: &'a ScreenState) -> Self {
        match value {
            ScreenState::PermissionRequired => Self {
                permission_granted: false,
                entries: &[],
            },
            ScreenState::Usage(entries) => Self {
                permission_granted: true,
                entries,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::{
        usage::{entities::DisplayEntry, refresh::ScreenState},
        utils::{clock::FixedClock, time::DateStyle},
    };

    use super::{render_screen, window_end, JsonReport};

    fn entries() -> Vec<DisplayEntry> {
        vec![
            DisplayEntry {
                name: "Maps".into(),
                formatted_duration: "1h 06m".into(),
            },
            DisplayEntry {
                name: "WhatsApp".into(),
                formatted_duration: "10m 00s".into(),
            },
        ]
    }

    #[test]
    fn usage_lists_entries_in_order() {
        let rendered = render_screen(&ScreenState::Usage(entries()));
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1h 06m\tMaps");
        assert_eq!(lines[3], "10m 00s\tWhatsApp");
    }

    #[test]
    fn permission_screen_points_to_settings() {
        let rendered = render_screen(&ScreenState::PermissionRequired);
        assert!(rendered.contains("timewell permission --open"));
    }

    #[test]
    fn json_report_shape() {
        let state = ScreenState::Usage(entries());
        let value = serde_json::to_value(JsonReport::from(&state)).unwrap();
        assert_eq!(value["permission_granted"], true);
        assert_eq!(value["entries"][1]["name"], "WhatsApp");
        assert_eq!(value["entries"][0]["formatted_duration"], "1h 06m");

        let value = serde_json::to_value(JsonReport::from(&ScreenState::PermissionRequired)).unwrap();
        assert_eq!(value["permission_granted"], false);
        assert_eq!(value["entries"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn end_is_relative_to_session_clock() {
        let now = Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap();
        let clock = FixedClock(now);

        assert_eq!(window_end(&clock, None, DateStyle::Uk).unwrap(), now);
        assert_eq!(
            window_end(&clock, Some("1 hour ago"), DateStyle::Uk).unwrap(),
            now - Duration::hours(1)
        );
        assert!(window_end(&clock, Some("not a date"), DateStyle::Uk).is_err());
    }
}
