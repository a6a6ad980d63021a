//! Upstream payload normalization.

use serde_json::{json, Map, Value};

/// Maps one upstream's JSON body into the common field set.
pub trait Normalizer: Send + Sync {
    /// Query-string pairs for the outbound request.
    fn query_params(&self, query: &str, api_key: &str) -> Vec<(&'static str, String)>;

    /// Extract the common fields, or describe what was missing.
    fn normalize(&self, provider_id: &str, body: &Value) -> Result<Map<String, Value>, String>;
}

fn field<'a>(body: &'a Value, pointer: &str) -> Result<&'a Value, String> {
    body.pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| format!("missing field {pointer}"))
}

fn weather_fields(source: &str, city: &Value, temperature: &Value, condition: &Value) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("source".into(), json!(source));
    fields.insert("city".into(), city.clone());
    fields.insert("temperature".into(), temperature.clone());
    fields.insert("condition".into(), condition.clone());
    fields
}

/// weatherapi.com current-conditions responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherApiNormalizer;

impl Normalizer for WeatherApiNormalizer {
    fn query_params(&self, query: &str, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("q", query.to_string()), ("key", api_key.to_string())]
    }

    fn normalize(&self, provider_id: &str, body: &Value) -> Result<Map<String, Value>, String> {
        Ok(weather_fields(
            provider_id,
            field(body, "/location/name")?,
            field(body, "/current/temp_c")?,
            field(body, "/current/condition/text")?,
        ))
    }
}

/// weatherstack.com current-conditions responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherstackNormalizer;

impl Normalizer for WeatherstackNormalizer {
    fn query_params(&self, query: &str, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("access_key", api_key.to_string()), ("query", query.to_string())]
    }

    fn normalize(&self, provider_id: &str, body: &Value) -> Result<Map<String, Value>, String> {
        Ok(weather_fields(
            provider_id,
            field(body, "/location/name")?,
            field(body, "/current/temperature")?,
            field(body, "/current/weather_descriptions/0")?,
        ))
    }
}

/// Generic upstream: `?query=<q>&key=<k>`, JSON object returned as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

impl Normalizer for PassthroughNormalizer {
    fn query_params(&self, query: &str, api_key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", query.to_string())];
        if !api_key.is_empty() {
            params.push(("key", api_key.to_string()));
        }
        params
    }

    fn normalize(&self, provider_id: &str, body: &Value) -> Result<Map<String, Value>, String> {
        let mut fields = body
            .as_object()
            .cloned()
            .ok_or_else(|| "expected a JSON object".to_string())?;
        fields
            .entry("source")
            .or_insert_with(|| json!(provider_id));
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weatherapi_fields() {
        let body = json!({
            "location": {"name": "London"},
            "current": {"temp_c": 11.0, "condition": {"text": "Partly cloudy"}}
        });
        let fields = WeatherApiNormalizer.normalize("weatherapi", &body).unwrap();
        assert_eq!(fields["source"], "weatherapi");
        assert_eq!(fields["city"], "London");
        assert_eq!(fields["temperature"], 11.0);
        assert_eq!(fields["condition"], "Partly cloudy");
    }

    #[test]
    fn test_weatherstack_fields() {
        let body = json!({
            "location": {"name": "Paris"},
            "current": {"temperature": 14, "weather_descriptions": ["Sunny", "Clear"]}
        });
        let fields = WeatherstackNormalizer.normalize("weatherstack", &body).unwrap();
        assert_eq!(fields["city"], "Paris");
        assert_eq!(fields["temperature"], 14);
        assert_eq!(fields["condition"], "Sunny");
    }

    #[test]
    fn test_missing_field_is_reported() {
        let body = json!({"location": {"name": "Paris"}, "current": {"weather_descriptions": []}});
        let err = WeatherstackNormalizer.normalize("weatherstack", &body).unwrap_err();
        assert!(err.contains("/current/temperature"));
    }

    #[test]
    fn test_passthrough_keeps_object() {
        let fields = PassthroughNormalizer
            .normalize("mirror", &json!({"value": 42}))
            .unwrap();
        assert_eq!(fields["value"], 42);
        assert_eq!(fields["source"], "mirror");
        assert!(PassthroughNormalizer.normalize("mirror", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_query_params() {
        let params = WeatherApiNormalizer.query_params("Oslo", "k1");
        assert_eq!(params, vec![("q", "Oslo".to_string()), ("key", "k1".to_string())]);
        let params = PassthroughNormalizer.query_params("Oslo", "");
        assert_eq!(params, vec![("query", "Oslo".to_string())]);
    }
}
