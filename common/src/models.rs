//! # Domain Models
//!
//! Values produced by the acquisition core and handed to the presentation layer.

pub mod feed;
pub mod host;
pub mod weather;

pub use feed::FeedItem;
pub use host::{HostObservation, HostRecord, HostStatus, ScanResult, TargetScan};
pub use weather::{CurrentWeather, DailyForecast, HourlyForecast, WeatherData};
