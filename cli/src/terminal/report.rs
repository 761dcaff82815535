//! Prints acquisition updates as they arrive.

use std::time::Duration;

use chrono::Utc;
use colored::*;
use lookout_common::error::FetchError;
use lookout_common::models::{HostStatus, ScanResult, TargetScan, WeatherData};
use lookout_core::cache::{Acquired, Freshness};
use lookout_core::coordinator::{AcquisitionOutcome, AcquisitionSink, AcquisitionUpdate};
use lookout_core::fetcher::FeedResult;
use lookout_core::weather::WeatherOutcome;
use tracing::{error, warn};

use crate::terminal::{colors, print};

const ITEMS_PER_FEED: usize = 5;

pub struct PrintSink;

impl AcquisitionSink for PrintSink {
    fn publish(&self, update: AcquisitionUpdate) {
        match update {
            AcquisitionUpdate::FeedPreview { source, outcome } => {
                print::print_status(format!(
                    "{}: {} cached item(s) {} while refreshing",
                    source.name.color(colors::PRIMARY),
                    outcome.value.len(),
                    freshness_label(&outcome.freshness)
                ));
            }
            AcquisitionUpdate::WeatherPreview(outcome) => {
                print::print_status(format!(
                    "{}: cached weather {} while refreshing",
                    outcome.value.location_name.color(colors::PRIMARY),
                    freshness_label(&outcome.freshness)
                ));
            }
            AcquisitionUpdate::Completed(outcome) => match &*outcome {
                AcquisitionOutcome::Feeds(results) => feeds(results),
                AcquisitionOutcome::Weather(result) => weather(result),
                AcquisitionOutcome::Network(reports) => reports.iter().for_each(network),
                AcquisitionOutcome::Failed(failure) => {
                    error!("{} refresh failed: {}", failure.kind, failure.reason);
                }
            },
        }
    }
}

fn feeds(results: &[FeedResult]) {
    print::header("feeds");
    let now = Utc::now();
    for (idx, (source, result)) in results.iter().enumerate() {
        match result {
            Ok(outcome) => {
                print::tree_head(idx, &format!("{} {}", source.name, freshness_label(&outcome.freshness)));
                let items: Vec<(String, ColoredString)> = outcome
                    .value
                    .iter()
                    .take(ITEMS_PER_FEED)
                    .map(|item| (item.relative_time(now), item.display_title().normal()))
                    .collect();
                print::as_tree_one_level(&items);
                stale_reason(outcome);
            }
            Err(e) => warn!("{}: {e}", source.name),
        }
    }
}

fn weather(result: &Result<WeatherOutcome, FetchError>) {
    print::header("weather");
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("weather unavailable: {e}");
            return;
        }
    };
    let data: &WeatherData = &outcome.value;
    let width = 11;

    print::aligned_line("Location", format!("{} {}", data.location_name, freshness_label(&outcome.freshness)), width);
    if let Some(current) = &data.current {
        print::aligned_line(
            "Temperature",
            format!("{:.1}{}", current.temperature, current.temperature_unit),
            width,
        );
        print::aligned_line("Wind", format!("{:.1} {}", current.wind_speed, current.wind_speed_unit), width);
        print::aligned_line("Trend", data.temperature_trend(current.time), width);
    }
    for day in &data.daily {
        print::aligned_line(
            &day.date.format("%a %d").to_string(),
            format!(
                "{:.0}..{:.0}°, {}% rain",
                day.temp_min, day.temp_max, day.precipitation_probability
            ),
            width,
        );
    }
    stale_reason(outcome);
}

fn network(report: &TargetScan) {
    print::header(&format!("{} ({})", report.target_name, report.target_range));
    if let Some(e) = &report.error {
        warn!("{}: {e}", report.target_name);
    }

    for (idx, host) in report.hosts.iter().enumerate() {
        print::tree_head(idx, &host_title(host));
        let mut details: Vec<(String, ColoredString)> = Vec::new();
        if let Some(ip) = host.ip {
            details.push(("IP".into(), ip.to_string().normal()));
        }
        if let Some(mac) = host.mac {
            details.push(("MAC".into(), mac.to_string().normal()));
        }
        if let Some(vendor) = &host.vendor {
            details.push(("Vendor".into(), vendor.as_str().normal()));
        }
        print::as_tree_one_level(&details);
    }

    print::print_status(format!(
        "{} up, {} down, {} new in {}",
        report.hosts_up().to_string().green(),
        report.hosts_down().to_string().color(colors::DOWN),
        report.new_hosts().count().to_string().color(colors::ACCENT),
        format_age(report.duration)
    ));
    print::fat_separator();
}

fn host_title(host: &ScanResult) -> String {
    let status = match host.status {
        HostStatus::Up => "up".green(),
        HostStatus::Down => "down".color(colors::DOWN),
        HostStatus::Unknown => "unknown".dimmed(),
    };
    let mut title = format!("{} {status}", host.display_name());
    if host.is_new {
        title.push_str(&format!(" {}", "NEW".color(colors::ACCENT).bold()));
    }
    if host.is_expected {
        title.push_str(&format!(" {}", "expected".dimmed()));
    }
    title
}

fn stale_reason<T>(outcome: &Acquired<T>) {
    if let Some(e) = &outcome.error {
        warn!("showing cached data, refresh failed: {e}");
    }
}

fn freshness_label(freshness: &Freshness) -> ColoredString {
    match freshness {
        Freshness::Fresh => "".normal(),
        Freshness::Cached { age } => format!("(cached {} ago)", format_age(*age)).dimmed(),
        Freshness::Stale { age } => format!("(stale, {} old)", format_age(*age)).color(colors::STALE),
    }
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0 => format!("{}ms", age.as_millis()),
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s => format!("{}h", s / 3_600),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_are_compact() {
        assert_eq!(format_age(Duration::from_millis(250)), "250ms");
        assert_eq!(format_age(Duration::from_secs(42)), "42s");
        assert_eq!(format_age(Duration::from_secs(600)), "10m");
        assert_eq!(format_age(Duration::from_secs(7_200)), "2h");
    }
}
