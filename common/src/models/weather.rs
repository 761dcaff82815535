use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const TREND_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub wind_speed: f64,
    pub time: NaiveDateTime,
    pub temperature_unit: String,
    pub wind_speed_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub humidity: u8,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: chrono::NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default)]
    pub precipitation_sum: f64,
    #[serde(default)]
    pub precipitation_probability: u8,
}

/// Forecast for one location. Times are local to `timezone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub current: Option<CurrentWeather>,
    #[serde(default)]
    pub hourly: Vec<HourlyForecast>,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherData {
    /// Up to twelve hourly slots at or after `now`.
    pub fn next_hours(&self, now: NaiveDateTime) -> Vec<&HourlyForecast> {
        self.hourly.iter().filter(|h| h.time >= now).take(12).collect()
    }

    /// Arrow describing the temperature change over the next six hours.
    pub fn temperature_trend(&self, now: NaiveDateTime) -> &'static str {
        let upcoming: Vec<&HourlyForecast> = self.next_hours(now).into_iter().take(6).collect();
        let (Some(first), Some(last)) = (upcoming.first(), upcoming.last()) else {
            return "→";
        };
        if upcoming.len() < 2 {
            return "→";
        }

        let diff = last.temperature - first.temperature;
        if diff > TREND_THRESHOLD {
            "↑"
        } else if diff < -TREND_THRESHOLD {
            "↓"
        } else {
            "→"
        }
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
    use chrono::{Duration, NaiveDate};

    fn data(temps: &[f64], start: NaiveDateTime) -> WeatherData {
        WeatherData {
            location_name: "Berlin".into(),
            latitude: 52.52,
            longitude: 13.41,
            timezone: "Europe/Berlin".into(),
            current: None,
            hourly: temps
                .iter()
                .enumerate()
                .map(|(i, t)| HourlyForecast {
                    time: start + Duration::hours(i as i64),
                    temperature: *t,
                    humidity: 50,
                    wind_speed: 3.0,
                })
                .collect(),
            daily: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn trend_follows_six_hour_window() {
        assert_eq!(data(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0], noon()).temperature_trend(noon()), "↑");
        assert_eq!(data(&[15.0, 14.0, 13.0, 12.0, 11.0, 10.0], noon()).temperature_trend(noon()), "↓");
        assert_eq!(data(&[10.0, 10.5, 10.2, 10.9], noon()).temperature_trend(noon()), "→");
        assert_eq!(data(&[10.0], noon()).temperature_trend(noon()), "→");
    }

    #[test]
    fn next_hours_skips_past_slots() {
        let start = noon() - Duration::hours(2);
        let weather = data(&[1.0; 20], start);
        let next = weather.next_hours(noon());
        assert_eq!(next.len(), 12);
        assert_eq!(next[0].time, noon());
    }
}
