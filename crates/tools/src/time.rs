//! Local time for major cities.
//!
//! Resolution is offline: city names map to IANA zones through a fixed
//! table. Cities outside the table get UTC time plus a `note`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::{OffsetComponents, Tz};
use serde_json::{Value, json};
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::Tool;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CITY_ZONES: &[(&str, Tz)] = &[
    ("new york", chrono_tz::America::New_York),
    ("london", chrono_tz::Europe::London),
    ("paris", chrono_tz::Europe::Paris),
    ("tokyo", chrono_tz::Asia::Tokyo),
    ("sydney", chrono_tz::Australia::Sydney),
    ("los angeles", chrono_tz::America::Los_Angeles),
    ("chicago", chrono_tz::America::Chicago),
    ("berlin", chrono_tz::Europe::Berlin),
    ("beijing", chrono_tz::Asia::Shanghai),
    ("moscow", chrono_tz::Europe::Moscow),
    ("dubai", chrono_tz::Asia::Dubai),
    ("singapore", chrono_tz::Asia::Singapore),
    ("hong kong", chrono_tz::Asia::Hong_Kong),
    ("toronto", chrono_tz::America::Toronto),
    ("sao paulo", chrono_tz::America::Sao_Paulo),
    ("mumbai", chrono_tz::Asia::Kolkata),
    ("istanbul", chrono_tz::Europe::Istanbul),
    ("rome", chrono_tz::Europe::Rome),
    ("madrid", chrono_tz::Europe::Madrid),
    ("amsterdam", chrono_tz::Europe::Amsterdam),
];

pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "TimeTool"
    }

    fn alias(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Useful for getting current time information for a specific city. Input should be a city name."
    }

    async fn lookup(&self, city: &str) -> Result<Value, ToolError> {
        Ok(local_time(city, Utc::now()))
    }
}

/// Zone for a city name. Accepts "Paris" as well as "Paris, France".
pub fn zone_for(city: &str) -> Option<Tz> {
    let key = city
        .split(',')
        .next()
        .unwrap_or(city)
        .trim()
        .to_lowercase();
    CITY_ZONES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, tz)| *tz)
}

/// Describe `now` as seen in `city`.
pub fn local_time(city: &str, now: DateTime<Utc>) -> Value {
    let Some(tz) = zone_for(city) else {
        return json!({
            "city": city,
            "timezone": "UTC",
            "datetime": now.format(DATETIME_FORMAT).to_string(),
            "note": format!("Timezone for {city} not found. Showing UTC time instead."),
        });
    };

    let local = now.with_timezone(&tz);
    let is_dst = local.offset().dst_offset().num_seconds() != 0;

    json!({
        "city": city,
        "timezone": tz.name(),
        "datetime": local.format(DATETIME_FORMAT).to_string(),
        "day_of_week": local.format("%A").to_string(),
        "day_of_year": local.format("%j").to_string(),
        "week_number": local.format("%U").to_string(),
        "is_dst": is_dst,
        "utc_offset": local.format("%z").to_string(),
    })
}
