use serde::Serialize;
use std::error::Error;

pub fn render<T: Serialize>(data: &T) -> Result<String, Box<dyn Error>> {
    Ok(serde_json::to_string_pretty(data)?)
}
