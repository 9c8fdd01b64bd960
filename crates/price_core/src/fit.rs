//! Fit mode: derive encoding artifacts from training records

use crate::artifacts::{CategoricalLevels, EncodingArtifacts, FeatureOrder, NameCodeMap, ScalerParams};
use crate::errors::{ArtifactLoadError, FitError};
use crate::record::CarAttributes;
use crate::schema::{CategoricalAttribute, NAME_CODE_FEATURE, NUMERIC_FEATURES};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

impl EncodingArtifacts {
    /// Fit name codes, categorical levels, scaler and feature order
    ///
    /// Name codes are assigned in sorted order starting at 0, matching a
    /// label encoder. Scales are population standard deviations; a constant
    /// column gets scale 1.0.
    pub fn fit(records: &[CarAttributes], reference_year: i32) -> Result<Self, FitError> {
        if records.is_empty() {
            return Err(FitError::EmptyInput);
        }

        let names: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let name_codes = NameCodeMap(
            names
                .into_iter()
                .zip(0i64..)
                .map(|(name, code)| (name.to_string(), code))
                .collect(),
        );

        let mut levels = BTreeMap::new();
        for attribute in CategoricalAttribute::ALL {
            let values: BTreeSet<&str> = records.iter().map(|r| r.categorical(attribute)).collect();
            levels.insert(
                attribute.attribute_name().to_string(),
                values.into_iter().map(str::to_string).collect::<Vec<_>>(),
            );
        }
        let levels = CategoricalLevels(levels);

        let scaler = fit_scaler(records, reference_year);

        let mut feature_names: Vec<String> = NUMERIC_FEATURES.iter().map(|f| f.to_string()).collect();
        feature_names.push(NAME_CODE_FEATURE.to_string());
        for attribute in CategoricalAttribute::ALL {
            for value in levels.levels(attribute) {
                feature_names.push(attribute.one_hot_column(value));
            }
        }
        let feature_order = FeatureOrder::new(feature_names).map_err(|err| match err {
            ArtifactLoadError::DuplicateFeature(name) => FitError::DuplicateFeature(name),
            other => FitError::DuplicateFeature(other.to_string()),
        })?;

        debug!(
            "Fitted encoders: {} names, {} features",
            name_codes.len(),
            feature_order.len()
        );

        Ok(Self {
            feature_order,
            scaler,
            name_codes,
            levels,
            reference_year,
        })
    }
}

fn fit_scaler(records: &[CarAttributes], reference_year: i32) -> ScalerParams {
    let n = records.len() as f64;
    let columns: Vec<[(&'static str, f64); 6]> = records
        .iter()
        .map(|r| r.numeric_features(reference_year))
        .collect();

    let mut scaler = ScalerParams::default();
    for (i, feature) in NUMERIC_FEATURES.iter().enumerate() {
        let mean = columns.iter().map(|c| c[i].1).sum::<f64>() / n;
        let variance = columns
            .iter()
            .map(|c| (c[i].1 - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };

        scaler.means.insert(feature.to_string(), mean);
        scaler.scales.insert(feature.to_string(), scale);
    }
    scaler
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(name: &str, year: i32, km: f64, fuel: &str, owner: &str) -> CarAttributes {
        CarAttributes {
            name: name.into(),
            year,
            km_driven: km,
            engine: 1200.0,
            max_power: 80.0,
            mileage: 20.0,
            seats: 5.0,
            fuel: fuel.into(),
            seller_type: "Individual".into(),
            transmission: "Manual".into(),
            owner: owner.into(),
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(EncodingArtifacts::fit(&[], 2025), Err(FitError::EmptyInput));
    }

    #[test]
    fn name_codes_follow_sorted_order() {
        let records = vec![
            car("Tata Nano", 2012, 1000.0, "Petrol", "First Owner"),
            car("Hyundai i20", 2016, 2000.0, "Diesel", "First Owner"),
            car("Tata Nano", 2013, 3000.0, "Petrol", "Second Owner"),
        ];
        let fitted = EncodingArtifacts::fit(&records, 2025).unwrap();
        assert_eq!(fitted.name_codes.get("Hyundai i20"), Some(0));
        assert_eq!(fitted.name_codes.get("Tata Nano"), Some(1));
    }

    #[test]
    fn feature_order_groups_one_hots_by_attribute() {
        let records = vec![
            car("A", 2015, 1000.0, "Petrol", "Second Owner"),
            car("B", 2016, 2000.0, "Diesel", "First Owner"),
        ];
        let fitted = EncodingArtifacts::fit(&records, 2025).unwrap();
        assert_eq!(
            fitted.feature_order.names(),
            &[
                "km_driven",
                "engine",
                "max_power",
                "mileage",
                "seats",
                "car_age",
                "name_le",
                "fuel_Diesel",
                "fuel_Petrol",
                "seller_Individual",
                "trans_Manual",
                "owner_First Owner",
                "owner_Second Owner",
            ]
        );
        assert_eq!(
            fitted.levels.levels(CategoricalAttribute::Fuel),
            &["Diesel", "Petrol"]
        );
    }

    #[test]
    fn scaler_uses_population_std_and_guards_constants() {
        let records = vec![
            car("A", 2015, 1000.0, "Petrol", "First Owner"),
            car("B", 2015, 3000.0, "Petrol", "First Owner"),
        ];
        let fitted = EncodingArtifacts::fit(&records, 2025).unwrap();
        assert_eq!(fitted.scaler.means["km_driven"], 2000.0);
        assert_eq!(fitted.scaler.scales["km_driven"], 1000.0);
        // engine is constant across both records
        assert_eq!(fitted.scaler.scales["engine"], 1.0);
        assert_eq!(fitted.scaler.means["car_age"], 10.0);
    }
}
