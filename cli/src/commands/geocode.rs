use std::time::Duration;

use lookout_core::weather::OpenMeteoClient;

use crate::terminal::print;

pub async fn lookup(query: &str) -> anyhow::Result<()> {
    let client = OpenMeteoClient::new(Duration::from_secs(10))?;
    match client.geocode(query).await? {
        Some(place) => {
            print::aligned_line("Name", &place.name, 9);
            print::aligned_line("Latitude", format!("{:.4}", place.latitude), 9);
            print::aligned_line("Longitude", format!("{:.4}", place.longitude), 9);
        }
        None => print::print_status(format!("no match for '{query}'")),
    }
    Ok(())
}
