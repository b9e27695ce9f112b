//! City lookup tools for Wayfarer.
//!
//! Each tool takes a city name and answers with a flat JSON object:
//! current weather from WeatherAPI.com, local time from a built-in
//! timezone table, and a short Wikipedia summary.

pub mod city_facts;
pub mod http;
pub mod time;
pub mod weather;

use wayfarer_config::ToolsConfig;
use wayfarer_core::tool::ToolRegistry;

pub use city_facts::CityFactsTool;
pub use time::TimeTool;
pub use weather::WeatherTool;

/// Create the registry with all three city tools, in prompt order.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let client = http::client(config.request_timeout_secs);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WeatherTool::new(
        client.clone(),
        &config.weather_api_url,
        config.weather_api_key.clone(),
        config.request_timeout_secs,
    )));
    registry.register(Box::new(TimeTool));
    registry.register(Box::new(CityFactsTool::new(
        client,
        &config.wikipedia_api_url,
        config.request_timeout_secs,
    )));
    registry
}
