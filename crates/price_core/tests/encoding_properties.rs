use carprice_core::schema::TARGET_COLUMN;
use carprice_core::{
    CarAttributes, Cell, Dataset, EncodingArtifacts, FeatureEncoder, UnknownCategoryPolicy,
};
use proptest::prelude::*;

const NAMES: [&str; 4] = ["Maruti Swift", "Hyundai i20", "Tata Nano", "Honda City"];
const FUELS: [&str; 3] = ["Diesel", "Petrol", "CNG"];
const OWNERS: [&str; 3] = ["First Owner", "Second Owner", "Third Owner"];

fn car_strategy() -> impl Strategy<Value = CarAttributes> {
    (
        0usize..NAMES.len(),
        1995i32..2024,
        0.0f64..300_000.0,
        600.0f64..3000.0,
        30.0f64..250.0,
        8.0f64..30.0,
        2u8..9,
        0usize..FUELS.len(),
        any::<bool>(),
        0usize..OWNERS.len(),
    )
        .prop_map(
            |(name, year, km, engine, power, mileage, seats, fuel, manual, owner)| CarAttributes {
                name: NAMES[name].to_string(),
                year,
                km_driven: km,
                engine,
                max_power: power,
                mileage,
                seats: f64::from(seats),
                fuel: FUELS[fuel].to_string(),
                seller_type: "Individual".to_string(),
                transmission: if manual { "Manual" } else { "Automatic" }.to_string(),
                owner: OWNERS[owner].to_string(),
            },
        )
}

proptest! {
    #[test]
    fn vector_length_matches_feature_order(
        training in prop::collection::vec(car_strategy(), 1..30),
        probe in car_strategy(),
    ) {
        let artifacts = EncodingArtifacts::fit(&training, 2025).unwrap();
        let encoder = FeatureEncoder::new(&artifacts, UnknownCategoryPolicy::Ignore);
        let vector = encoder.encode_attributes(&probe).unwrap();
        prop_assert_eq!(vector.len(), artifacts.feature_order.len());
        prop_assert!(vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn at_most_one_hot_per_attribute(
        training in prop::collection::vec(car_strategy(), 1..30),
        probe in car_strategy(),
    ) {
        let artifacts = EncodingArtifacts::fit(&training, 2025).unwrap();
        let encoder = FeatureEncoder::new(&artifacts, UnknownCategoryPolicy::Ignore);
        let vector = encoder.encode_attributes(&probe).unwrap();

        for prefix in ["fuel_", "seller_", "trans_", "owner_"] {
            let hot: f64 = artifacts
                .feature_order
                .names()
                .iter()
                .zip(vector.iter())
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(_, v)| *v)
                .sum();
            prop_assert!(hot == 0.0 || hot == 1.0);
        }
    }

    #[test]
    fn training_records_encode_under_reject(
        training in prop::collection::vec(car_strategy(), 1..30),
    ) {
        let artifacts = EncodingArtifacts::fit(&training, 2025).unwrap();
        let encoder = FeatureEncoder::new(&artifacts, UnknownCategoryPolicy::Reject);
        for car in &training {
            prop_assert!(encoder.encode_attributes(car).is_ok());
        }
    }

    #[test]
    fn encoding_is_deterministic(
        training in prop::collection::vec(car_strategy(), 1..20),
        probe in car_strategy(),
    ) {
        let first = EncodingArtifacts::fit(&training, 2025).unwrap();
        let second = EncodingArtifacts::fit(&training, 2025).unwrap();
        prop_assert_eq!(&first, &second);

        let a = FeatureEncoder::new(&first, UnknownCategoryPolicy::Ignore).encode_attributes(&probe).unwrap();
        let b = FeatureEncoder::new(&second, UnknownCategoryPolicy::Ignore).encode_attributes(&probe).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn row_encoding_is_stable_for_every_index(
        training in prop::collection::vec(car_strategy(), 1..30),
    ) {
        let artifacts = EncodingArtifacts::fit(&training, 2025).unwrap();
        let encoder = FeatureEncoder::new(&artifacts, UnknownCategoryPolicy::Reject);

        let mut columns = artifacts.feature_order.names().to_vec();
        columns.push(TARGET_COLUMN.to_string());
        let mut rows = Vec::with_capacity(training.len());
        for car in &training {
            let mut row: Vec<Cell> = encoder
                .encode_attributes(car)
                .unwrap()
                .iter()
                .map(|&v| Cell::Number(v))
                .collect();
            row.push(Cell::Number(100_000.0));
            rows.push(row);
        }
        let dataset = Dataset::new(columns, rows).unwrap();

        for (i, car) in training.iter().enumerate() {
            let first = encoder.encode_from_row(&dataset, i as i64).unwrap();
            let second = encoder.encode_from_row(&dataset, i as i64).unwrap();
            prop_assert_eq!(first.len(), artifacts.feature_order.len());
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first, encoder.encode_attributes(car).unwrap());
        }
        prop_assert!(encoder.encode_from_row(&dataset, training.len() as i64).is_err());
    }
}
