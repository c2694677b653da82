//! BMI arithmetic for the rater endpoints.

use serde_json::Value;

/// Lenient numeric read for rater inputs. Missing values, blank strings, and
/// anything unparseable all read as zero; inputs never fail.
pub fn numeric_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// BMI in kg/m^2. A non-positive height yields zero rather than a division
/// blowup, so absent inputs produce a zero rating.
pub fn bmi(height_cm: f64, weight_kg: f64) -> f64 {
    if height_cm > 0.0 {
        weight_kg / (height_cm / 100.0).powi(2)
    } else {
        0.0
    }
}
