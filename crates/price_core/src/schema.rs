//! Encoding schema shared by training (fit) and serving (transform)
//!
//! Column names, one-hot prefixes and the numeric feature set live here and
//! nowhere else, so the trainer and the server cannot drift apart.

use serde::{Deserialize, Serialize};

/// Prediction target in raw and engineered datasets
pub const TARGET_COLUMN: &str = "selling_price";

/// Label-encoded car name feature
pub const NAME_CODE_FEATURE: &str = "name_le";

/// Code used for names never seen during training
pub const UNKNOWN_NAME_CODE: i64 = 0;

/// Derived age feature (`reference_year - year`)
pub const CAR_AGE_FEATURE: &str = "car_age";

/// Training cutoff year used when the metadata does not record one
pub const DEFAULT_REFERENCE_YEAR: i32 = 2025;

pub const KM_DRIVEN_FEATURE: &str = "km_driven";
pub const ENGINE_FEATURE: &str = "engine";
pub const MAX_POWER_FEATURE: &str = "max_power";
pub const MILEAGE_FEATURE: &str = "mileage";
pub const SEATS_FEATURE: &str = "seats";

/// Numeric features eligible for standardization, in feature-order position
pub const NUMERIC_FEATURES: [&str; 6] = [
    KM_DRIVEN_FEATURE,
    ENGINE_FEATURE,
    MAX_POWER_FEATURE,
    MILEAGE_FEATURE,
    SEATS_FEATURE,
    CAR_AGE_FEATURE,
];

/// Categorical attributes expanded into one-hot indicator columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalAttribute {
    Fuel,
    SellerType,
    Transmission,
    Owner,
}

impl CategoricalAttribute {
    /// Attributes in one-hot column order
    pub const ALL: [CategoricalAttribute; 4] = [
        CategoricalAttribute::Fuel,
        CategoricalAttribute::SellerType,
        CategoricalAttribute::Transmission,
        CategoricalAttribute::Owner,
    ];

    /// Key used in the raw dataset and in `categorical_levels.json`
    pub fn attribute_name(self) -> &'static str {
        match self {
            CategoricalAttribute::Fuel => "fuel",
            CategoricalAttribute::SellerType => "seller_type",
            CategoricalAttribute::Transmission => "transmission",
            CategoricalAttribute::Owner => "owner",
        }
    }

    /// Prefix of the one-hot column names
    pub fn column_prefix(self) -> &'static str {
        match self {
            CategoricalAttribute::Fuel => "fuel",
            CategoricalAttribute::SellerType => "seller",
            CategoricalAttribute::Transmission => "trans",
            CategoricalAttribute::Owner => "owner",
        }
    }

    /// `"<prefix>_<value>"`
    pub fn one_hot_column(self, value: &str) -> String {
        format!("{}_{}", self.column_prefix(), value)
    }

    pub fn from_attribute_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.attribute_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_columns_use_short_prefixes() {
        assert_eq!(CategoricalAttribute::Fuel.one_hot_column("Diesel"), "fuel_Diesel");
        assert_eq!(
            CategoricalAttribute::SellerType.one_hot_column("Dealer"),
            "seller_Dealer"
        );
        assert_eq!(
            CategoricalAttribute::Transmission.one_hot_column("Manual"),
            "trans_Manual"
        );
        assert_eq!(
            CategoricalAttribute::Owner.one_hot_column("First Owner"),
            "owner_First Owner"
        );
    }

    #[test]
    fn attribute_names_round_trip() {
        for attr in CategoricalAttribute::ALL {
            assert_eq!(
                CategoricalAttribute::from_attribute_name(attr.attribute_name()),
                Some(attr)
            );
        }
        assert_eq!(CategoricalAttribute::from_attribute_name("color"), None);
    }
}
