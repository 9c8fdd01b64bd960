//! Used-car price inference core
//!
//! Loads a trained artifact set once, turns user input or dataset rows into
//! feature vectors in the exact column order the model was trained on, and
//! maps raw GBDT scores back to prices.
//!
//! The same encoder is used by `carprice-trainer` after fitting, so the
//! training and serving paths share one definition of every feature.
//!
//! # Example
//!
//! ```no_run
//! use carprice_core::{ArtifactPaths, ArtifactStore, UnknownCategoryPolicy};
//! use serde_json::json;
//!
//! let store = ArtifactStore::load(&ArtifactPaths::in_dir("artifacts"))?;
//! let features = store
//!     .encoder(UnknownCategoryPolicy::Ignore)
//!     .encode_from_manual(&json!({
//!         "car_name": "Maruti Swift", "year": 2015, "km": 70000,
//!         "engine": 1197, "power": 82, "mileage": 21.4, "seats": 5,
//!         "fuel": "Petrol", "transmission": "Manual",
//!         "seller": "Individual", "owner": "First Owner"
//!     }))?;
//! let prediction = store.predictor().predict(&features)?;
//! println!("{:.0}", prediction.price);
//! # Ok::<(), carprice_core::PriceError>(())
//! ```

pub mod artifacts;
pub mod dataset;
pub mod encoder;
pub mod errors;
pub mod fit;
pub mod gbdt;
pub mod model;
pub mod predictor;
pub mod record;
pub mod schema;

pub use artifacts::{
    ArtifactPaths, ArtifactStore, ArtifactWriter, CategoricalLevels, EncodingArtifacts,
    FeatureOrder, NameCodeMap, ScalerParams, TargetTransform, TransformMeta,
};
pub use dataset::{Cell, Dataset};
pub use encoder::{FeatureEncoder, FeatureVector, UnknownCategoryPolicy};
pub use errors::{
    ArtifactLoadError, ArtifactWriteError, AuxArtifact, DatasetError, DegradedArtifact,
    EncodeError, FitError, PredictError, PriceError, Result,
};
pub use gbdt::GbdtModel;
pub use model::{ModelSummary, Regressor};
pub use predictor::{PricePrediction, Predictor};
pub use record::CarAttributes;
