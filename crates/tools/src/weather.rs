//! Current weather from WeatherAPI.com.

use crate::http::transport_error;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::Tool;

pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl WeatherTool {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "WeatherTool"
    }

    fn alias(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Useful for getting current weather information for a specific city. Input should be a city name."
    }

    async fn lookup(&self, city: &str) -> Result<Value, ToolError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::Unavailable(
                "WeatherAPI.com API key not found. Please set the WEATHERAPI_KEY environment variable."
                    .into(),
            )
        })?;

        let url = format!("{}/current.json", self.base_url);
        debug!(city, "Fetching current weather");

        let response = self
            .client
            .get(&url)
            .query(&[("key", api_key), ("q", city)])
            .send()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let payload: CurrentWeather = response
            .json()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout_secs, e))?;

        Ok(payload.into_observation())
    }
}

fn status_error(status: StatusCode) -> ToolError {
    let message = match status {
        StatusCode::UNAUTHORIZED => {
            "Invalid WeatherAPI.com API key. Please check your API key and try again.".to_string()
        }
        StatusCode::FORBIDDEN => {
            "Access to WeatherAPI.com is forbidden. Your API key may have exceeded its quota."
                .to_string()
        }
        other => format!("HTTP error from WeatherAPI.com: {other}"),
    };
    ToolError::Unavailable(message)
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    pressure_mb: f64,
    wind_kph: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

impl CurrentWeather {
    fn into_observation(self) -> Value {
        let current = self.current;
        json!({
            "city": self.location.name,
            "country": self.location.country,
            "temperature": format!("{:.1}°C", current.temp_c),
            "feels_like": format!("{:.1}°C", current.feelslike_c),
            "humidity": format!("{}%", current.humidity),
            "pressure": format!("{} hPa", current.pressure_mb),
            "weather": current.condition.text,
            "description": current.condition.text,
            "wind_speed": format!("{} km/h", current.wind_kph),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "location": {"name": "Tokyo", "region": "Tokyo", "country": "Japan"},
        "current": {
            "temp_c": 22.04,
            "feelslike_c": 24.5,
            "humidity": 65,
            "pressure_mb": 1012.0,
            "wind_kph": 11.2,
            "condition": {"text": "Partly cloudy", "code": 1003}
        }
    }"#;

    #[test]
    fn formats_weatherapi_payload() {
        let payload: CurrentWeather = serde_json::from_str(SAMPLE).unwrap();
        let observation = payload.into_observation();

        assert_eq!(observation["city"], "Tokyo");
        assert_eq!(observation["country"], "Japan");
        assert_eq!(observation["temperature"], "22.0°C");
        assert_eq!(observation["feels_like"], "24.5°C");
        assert_eq!(observation["humidity"], "65%");
        assert_eq!(observation["pressure"], "1012 hPa");
        assert_eq!(observation["weather"], "Partly cloudy");
        assert_eq!(observation["description"], "Partly cloudy");
        assert_eq!(observation["wind_speed"], "11.2 km/h");
    }

    #[test]
    fn status_errors_are_specific() {
        assert!(status_error(StatusCode::UNAUTHORIZED).to_string().contains("Invalid"));
        assert!(status_error(StatusCode::FORBIDDEN).to_string().contains("quota"));
        assert!(
            status_error(StatusCode::BAD_REQUEST)
                .to_string()
                .starts_with("HTTP error from WeatherAPI.com: 400")
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let tool = WeatherTool::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Some("   ".into()),
            1,
        );
        let err = tool.lookup("Tokyo").await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(ref m) if m.contains("WEATHERAPI_KEY")));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let tool = WeatherTool::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/",
            Some("key".into()),
            1,
        );
        let err = tool.lookup("Tokyo").await.unwrap_err();
        assert!(err.to_string().contains("WeatherTool"));
    }
}
