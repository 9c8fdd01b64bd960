//! Raw car records
//!
//! Manual form input and raw training rows both end up as [`CarAttributes`]
//! before encoding.

use crate::errors::EncodeError;
use crate::schema::{
    CategoricalAttribute, CAR_AGE_FEATURE, ENGINE_FEATURE, KM_DRIVEN_FEATURE, MAX_POWER_FEATURE,
    MILEAGE_FEATURE, SEATS_FEATURE,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Required manual-input fields, in validation order
pub const MANUAL_FIELDS: [&str; 11] = [
    "car_name",
    "year",
    "km",
    "engine",
    "power",
    "mileage",
    "seats",
    "fuel",
    "transmission",
    "seller",
    "owner",
];

/// Semantic attributes of one car, before any encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarAttributes {
    pub name: String,
    pub year: i32,
    pub km_driven: f64,
    pub engine: f64,
    pub max_power: f64,
    pub mileage: f64,
    pub seats: f64,
    pub fuel: String,
    pub seller_type: String,
    pub transmission: String,
    pub owner: String,
}

impl CarAttributes {
    /// Validate and convert a manual-input JSON object
    ///
    /// Presence of every field is checked before any type conversion, so a
    /// missing field is always reported as [`EncodeError::MissingField`].
    /// `null` counts as missing.
    pub fn from_manual_json(value: &Value) -> Result<Self, EncodeError> {
        let object = value.as_object().ok_or_else(|| EncodeError::InvalidFieldType {
            field: "body".to_string(),
            expected: "a JSON object",
        })?;

        if let Some(missing) = MANUAL_FIELDS
            .iter()
            .find(|f| object.get(**f).map_or(true, Value::is_null))
        {
            return Err(EncodeError::MissingField((*missing).to_string()));
        }

        Ok(Self {
            name: text_field(object, "car_name")?,
            year: year_field(object, "year")?,
            km_driven: number_field(object, "km")?,
            engine: number_field(object, "engine")?,
            max_power: number_field(object, "power")?,
            mileage: number_field(object, "mileage")?,
            seats: number_field(object, "seats")?,
            fuel: text_field(object, "fuel")?,
            transmission: text_field(object, "transmission")?,
            seller_type: text_field(object, "seller")?,
            owner: text_field(object, "owner")?,
        })
    }

    pub fn categorical(&self, attribute: CategoricalAttribute) -> &str {
        match attribute {
            CategoricalAttribute::Fuel => &self.fuel,
            CategoricalAttribute::SellerType => &self.seller_type,
            CategoricalAttribute::Transmission => &self.transmission,
            CategoricalAttribute::Owner => &self.owner,
        }
    }

    /// Unscaled numeric features, including the derived `car_age`
    pub fn numeric_features(&self, reference_year: i32) -> [(&'static str, f64); 6] {
        [
            (KM_DRIVEN_FEATURE, self.km_driven),
            (ENGINE_FEATURE, self.engine),
            (MAX_POWER_FEATURE, self.max_power),
            (MILEAGE_FEATURE, self.mileage),
            (SEATS_FEATURE, self.seats),
            (
                CAR_AGE_FEATURE,
                f64::from(reference_year) - f64::from(self.year),
            ),
        ]
    }
}

fn number_field(object: &Map<String, Value>, field: &str) -> Result<f64, EncodeError> {
    let invalid = || EncodeError::InvalidFieldType {
        field: field.to_string(),
        expected: "a finite number",
    };

    let parsed = match object.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|v| v.is_finite()).ok_or_else(invalid)
}

fn year_field(object: &Map<String, Value>, field: &str) -> Result<i32, EncodeError> {
    let invalid = || EncodeError::InvalidFieldType {
        field: field.to_string(),
        expected: "an integer year",
    };

    let parsed = match object.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|y| i32::try_from(y).ok())
        .ok_or_else(invalid)
}

fn text_field(object: &Map<String, Value>, field: &str) -> Result<String, EncodeError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(EncodeError::InvalidFieldType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn swift() -> Value {
        json!({
            "car_name": "Maruti Swift",
            "year": 2015,
            "km": 70000,
            "engine": "1200",
            "power": 82.5,
            "mileage": 21.4,
            "seats": 5,
            "fuel": "Diesel",
            "transmission": "Manual",
            "seller": "Individual",
            "owner": "First Owner"
        })
    }

    #[test]
    fn parses_complete_manual_input() {
        let car = CarAttributes::from_manual_json(&swift()).unwrap();
        assert_eq!(car.name, "Maruti Swift");
        assert_eq!(car.year, 2015);
        assert_eq!(car.km_driven, 70000.0);
        assert_eq!(car.engine, 1200.0);
        assert_eq!(car.seller_type, "Individual");
        assert_eq!(car.numeric_features(2025)[5], (CAR_AGE_FEATURE, 10.0));
    }

    #[test]
    fn reports_first_missing_field() {
        let mut input = swift();
        input.as_object_mut().unwrap().remove("seats");
        input.as_object_mut().unwrap().remove("owner");
        assert_eq!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::MissingField("seats".to_string()))
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let mut input = swift();
        input["fuel"] = Value::Null;
        assert_eq!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::MissingField("fuel".to_string()))
        );
    }

    #[test]
    fn missing_beats_invalid() {
        let mut input = swift();
        input["km"] = json!("lots");
        input.as_object_mut().unwrap().remove("owner");
        assert_eq!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::MissingField("owner".to_string()))
        );
    }

    #[test]
    fn rejects_non_numeric_values() {
        let mut input = swift();
        input["engine"] = json!("big");
        assert!(matches!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::InvalidFieldType { field, .. }) if field == "engine"
        ));

        let mut input = swift();
        input["km"] = json!(true);
        assert!(matches!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::InvalidFieldType { field, .. }) if field == "km"
        ));

        let mut input = swift();
        input["year"] = json!("twenty");
        assert!(matches!(
            CarAttributes::from_manual_json(&input),
            Err(EncodeError::InvalidFieldType { field, .. }) if field == "year"
        ));
    }

    #[test]
    fn rejects_non_object_body() {
        assert!(matches!(
            CarAttributes::from_manual_json(&json!([1, 2, 3])),
            Err(EncodeError::InvalidFieldType { .. })
        ));
    }
}
