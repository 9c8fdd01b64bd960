//! Artifact Store: the immutable file set shared by training and serving
//!
//! The feature list and the model are mandatory. The four JSON side-files
//! are optional; each one that is missing or unreadable falls back to an
//! empty mapping and is recorded as a [`DegradedArtifact`].

use crate::errors::{ArtifactLoadError, ArtifactWriteError, AuxArtifact, DegradedArtifact};
use crate::gbdt::GbdtModel;
use crate::model::{ModelSummary, Regressor};
use crate::schema::{CategoricalAttribute, DEFAULT_REFERENCE_YEAR, UNKNOWN_NAME_CODE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const FEATURES_FILE: &str = "features.txt";
pub const MODEL_FILE: &str = "model.bin";
pub const META_FILE: &str = "model_meta.json";
pub const SCALER_FILE: &str = "scaler_params.json";
pub const NAME_CODES_FILE: &str = "name_codes.json";
pub const CATEGORICAL_LEVELS_FILE: &str = "categorical_levels.json";

/// Forward/inverse pair names recognized in the metadata
pub const LOG1P: &str = "log1p";
pub const EXPM1: &str = "expm1";

/// Ordered, unique feature names the model was trained on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOrder {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureOrder {
    pub fn new(names: Vec<String>) -> Result<Self, ArtifactLoadError> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(ArtifactLoadError::DuplicateFeature(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    /// Parse the newline-delimited feature list; empty lines are dropped and
    /// names are kept byte-for-byte otherwise
    pub fn parse(text: &str) -> Result<Self, ArtifactLoadError> {
        let names = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(names)
    }

    pub fn to_text(&self) -> String {
        self.names.join("\n")
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// Training-time standardization parameters per numeric feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    #[serde(default)]
    pub means: BTreeMap<String, f64>,
    #[serde(default)]
    pub scales: BTreeMap<String, f64>,
}

impl ScalerParams {
    /// `(value - mean) / scale`, or `value` unchanged when either parameter
    /// is absent or the scale is zero
    pub fn standardize(&self, feature: &str, value: f64) -> f64 {
        match (self.means.get(feature), self.scales.get(feature)) {
            (Some(&mean), Some(&scale)) if scale != 0.0 && scale.is_finite() => {
                (value - mean) / scale
            }
            _ => value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty() && self.scales.is_empty()
    }

    /// Drop entries for features the model never saw; returns the dropped names
    pub fn retain_features(&mut self, order: &FeatureOrder) -> Vec<String> {
        let mut dropped: Vec<String> = self
            .means
            .keys()
            .chain(self.scales.keys())
            .filter(|name| !order.contains(name))
            .cloned()
            .collect();
        dropped.sort();
        dropped.dedup();

        self.means.retain(|name, _| order.contains(name));
        self.scales.retain(|name, _| order.contains(name));
        dropped
    }
}

/// Car name to label-encoder code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameCodeMap(pub BTreeMap<String, i64>);

impl NameCodeMap {
    /// Code for `name`, or [`UNKNOWN_NAME_CODE`] when it was never seen
    pub fn code(&self, name: &str) -> i64 {
        self.0.get(name).copied().unwrap_or(UNKNOWN_NAME_CODE)
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Known names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Levels observed per categorical attribute, for presenting valid choices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoricalLevels(pub BTreeMap<String, Vec<String>>);

impl CategoricalLevels {
    pub fn levels(&self, attribute: CategoricalAttribute) -> &[String] {
        self.0
            .get(attribute.attribute_name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inverse applied to the raw model score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    /// Target trained as `ln(1 + y)`; inverse is `exp(raw) - 1`
    Log1p,
    Identity,
}

impl TargetTransform {
    pub fn inverse(self, raw: f64) -> f64 {
        match self {
            TargetTransform::Log1p => raw.exp_m1(),
            TargetTransform::Identity => raw,
        }
    }
}

/// Training metadata; unrecognized keys are preserved in `extra`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_transform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_transform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_iteration: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_year: Option<i32>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TransformMeta {
    pub fn log1p() -> Self {
        Self {
            target_transform: Some(LOG1P.to_string()),
            inverse_transform: Some(EXPM1.to_string()),
            ..Self::default()
        }
    }

    /// Recognized pair, or identity for anything else
    pub fn target_transform(&self) -> TargetTransform {
        match (
            self.target_transform.as_deref(),
            self.inverse_transform.as_deref(),
        ) {
            (Some(LOG1P), Some(EXPM1)) => TargetTransform::Log1p,
            _ => TargetTransform::Identity,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or(DEFAULT_REFERENCE_YEAR)
    }
}

/// Everything the feature encoder needs; produced by fit, consumed by transform
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingArtifacts {
    pub feature_order: FeatureOrder,
    pub scaler: ScalerParams,
    pub name_codes: NameCodeMap,
    pub levels: CategoricalLevels,
    pub reference_year: i32,
}

/// Locations of the six artifact files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub features: PathBuf,
    pub model: PathBuf,
    pub meta: PathBuf,
    pub scaler: PathBuf,
    pub name_codes: PathBuf,
    pub categorical_levels: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            features: dir.join(FEATURES_FILE),
            model: dir.join(MODEL_FILE),
            meta: dir.join(META_FILE),
            scaler: dir.join(SCALER_FILE),
            name_codes: dir.join(NAME_CODES_FILE),
            categorical_levels: dir.join(CATEGORICAL_LEVELS_FILE),
        }
    }
}

/// Loaded artifact set, shared read-only by every request
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    encoding: EncodingArtifacts,
    meta: TransformMeta,
    model: Arc<dyn Regressor>,
    degraded: Vec<DegradedArtifact>,
}

impl ArtifactStore {
    /// Load the artifact set; fails only on the mandatory files
    #[instrument(skip_all, fields(features = %paths.features.display(), model = %paths.model.display()))]
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactLoadError> {
        let text = fs::read_to_string(&paths.features).map_err(|source| ArtifactLoadError::Read {
            path: paths.features.clone(),
            source,
        })?;
        let feature_order = FeatureOrder::parse(&text)?;
        if feature_order.is_empty() {
            return Err(ArtifactLoadError::EmptyFeatureList(paths.features.clone()));
        }

        let model = load_model(&paths.model)?;

        let mut degraded = Vec::new();
        let meta: TransformMeta =
            load_optional(&paths.meta, AuxArtifact::TransformMeta, &mut degraded);
        let mut scaler: ScalerParams =
            load_optional(&paths.scaler, AuxArtifact::ScalerParams, &mut degraded);
        let name_codes: NameCodeMap =
            load_optional(&paths.name_codes, AuxArtifact::NameCodes, &mut degraded);
        let levels: CategoricalLevels = load_optional(
            &paths.categorical_levels,
            AuxArtifact::CategoricalLevels,
            &mut degraded,
        );

        let dropped = scaler.retain_features(&feature_order);
        if !dropped.is_empty() {
            let record = DegradedArtifact {
                artifact: AuxArtifact::ScalerParams,
                path: paths.scaler.clone(),
                reason: format!("dropped entries for unknown features: {}", dropped.join(", ")),
            };
            warn!("Degraded artifact: {}", record);
            degraded.push(record);
        }

        let encoding = EncodingArtifacts {
            feature_order,
            scaler,
            name_codes,
            levels,
            reference_year: meta.reference_year(),
        };

        let store = Self::assemble(encoding, meta, Arc::new(model), degraded)?;
        info!(
            "Loaded artifacts: {} features, {} trees, {} known names, transform {:?}",
            store.encoding.feature_order.len(),
            store.model.num_trees(),
            store.encoding.name_codes.len(),
            store.meta.target_transform()
        );
        Ok(store)
    }

    /// Build a store from in-memory parts, applying the same checks as `load`
    pub fn from_parts(
        encoding: EncodingArtifacts,
        meta: TransformMeta,
        model: Arc<dyn Regressor>,
    ) -> Result<Self, ArtifactLoadError> {
        if encoding.feature_order.is_empty() {
            return Err(ArtifactLoadError::EmptyFeatureList(PathBuf::new()));
        }
        Self::assemble(encoding, meta, model, Vec::new())
    }

    fn assemble(
        encoding: EncodingArtifacts,
        meta: TransformMeta,
        model: Arc<dyn Regressor>,
        degraded: Vec<DegradedArtifact>,
    ) -> Result<Self, ArtifactLoadError> {
        if model.num_features() != encoding.feature_order.len() {
            return Err(ArtifactLoadError::FeatureCountMismatch {
                model: model.num_features(),
                features: encoding.feature_order.len(),
            });
        }

        Ok(Self {
            encoding,
            meta,
            model,
            degraded,
        })
    }

    pub fn encoding(&self) -> &EncodingArtifacts {
        &self.encoding
    }

    pub fn feature_order(&self) -> &FeatureOrder {
        &self.encoding.feature_order
    }

    pub fn name_codes(&self) -> &NameCodeMap {
        &self.encoding.name_codes
    }

    pub fn levels(&self) -> &CategoricalLevels {
        &self.encoding.levels
    }

    pub fn meta(&self) -> &TransformMeta {
        &self.meta
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    pub fn model_summary(&self) -> ModelSummary {
        ModelSummary::of(self.model.as_ref())
    }

    /// Optional files that fell back to empty during load
    pub fn degraded(&self) -> &[DegradedArtifact] {
        &self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Metadata cutoff first, then the model's own
    pub fn best_iteration(&self) -> Option<usize> {
        self.meta.best_iteration.or_else(|| self.model.best_iteration())
    }
}

fn load_model(path: &Path) -> Result<GbdtModel, ArtifactLoadError> {
    GbdtModel::load(path).map_err(|err| match err {
        crate::gbdt::ModelError::IoError(source) => ArtifactLoadError::Read {
            path: path.to_path_buf(),
            source,
        },
        crate::gbdt::ModelError::ValidationFailed(reason) => ArtifactLoadError::InvalidModel(reason),
        other => ArtifactLoadError::ModelDecode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })
}

fn load_optional<T: DeserializeOwned + Default>(
    path: &Path,
    artifact: AuxArtifact,
    degraded: &mut Vec<DegradedArtifact>,
) -> T {
    let result = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<T>(&text).map_err(|e| e.to_string()));

    match result {
        Ok(value) => value,
        Err(reason) => {
            let record = DegradedArtifact {
                artifact,
                path: path.to_path_buf(),
                reason,
            };
            warn!("Degraded artifact, using empty default: {}", record);
            degraded.push(record);
            T::default()
        }
    }
}

/// Producer side of the artifact contract
pub struct ArtifactWriter {
    paths: ArtifactPaths,
}

impl ArtifactWriter {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(ArtifactPaths::in_dir(dir))
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Write all six files; parent directories are created as needed
    pub fn write(
        &self,
        encoding: &EncodingArtifacts,
        meta: &TransformMeta,
        model: &GbdtModel,
    ) -> Result<(), ArtifactWriteError> {
        for path in [
            &self.paths.features,
            &self.paths.model,
            &self.paths.meta,
            &self.paths.scaler,
            &self.paths.name_codes,
            &self.paths.categorical_levels,
        ] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&self.paths.features, encoding.feature_order.to_text())?;
        model.save(&self.paths.model)?;
        write_json(&self.paths.meta, meta)?;
        write_json(&self.paths.scaler, &encoding.scaler)?;
        write_json(&self.paths.name_codes, &encoding.name_codes)?;
        write_json(&self.paths.categorical_levels, &encoding.levels)?;

        info!("Wrote artifact set ({} features)", encoding.feature_order.len());
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactWriteError> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::{Node, Tree};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_encoding() -> EncodingArtifacts {
        let mut scaler = ScalerParams::default();
        scaler.means.insert("km_driven".into(), 50_000.0);
        scaler.scales.insert("km_driven".into(), 20_000.0);

        EncodingArtifacts {
            feature_order: FeatureOrder::new(names(&["km_driven", "name_le", "fuel_Diesel"]))
                .unwrap(),
            scaler,
            name_codes: NameCodeMap(BTreeMap::from([("Maruti Swift".to_string(), 7)])),
            levels: CategoricalLevels(BTreeMap::from([(
                "fuel".to_string(),
                names(&["Diesel", "Petrol"]),
            )])),
            reference_year: 2025,
        }
    }

    fn sample_model() -> GbdtModel {
        let tree = Tree::new(vec![
            Node::internal(0, 2, 0.5, 1, 2),
            Node::leaf(1, -0.1),
            Node::leaf(2, 0.1),
        ]);
        GbdtModel::new(3, 12.0, 0.05, vec![tree]).with_best_iteration(Some(1))
    }

    fn write_sample(dir: &Path) -> ArtifactPaths {
        let writer = ArtifactWriter::in_dir(dir);
        let mut meta = TransformMeta::log1p();
        meta.best_iteration = Some(1);
        meta.extra.insert("test_r2".into(), Value::from(0.93));
        writer.write(&sample_encoding(), &meta, &sample_model()).unwrap();
        writer.paths().clone()
    }

    #[test]
    fn feature_order_rejects_duplicates() {
        let err = FeatureOrder::parse("a\nb\na\n").unwrap_err();
        assert!(matches!(err, ArtifactLoadError::DuplicateFeature(name) if name == "a"));
    }

    #[test]
    fn feature_order_skips_blank_lines() {
        let order = FeatureOrder::parse("km_driven\n\nowner_First Owner\r\n").unwrap();
        assert_eq!(order.names(), &["km_driven", "owner_First Owner"]);
        assert_eq!(order.position("owner_First Owner"), Some(1));
    }

    #[test]
    fn feature_order_keeps_surrounding_spaces() {
        let order = FeatureOrder::parse("owner_Test Drive Car 
km_driven
").unwrap();
        assert_eq!(order.names(), &["owner_Test Drive Car ", "km_driven"]);
        assert_eq!(order.position("owner_Test Drive Car"), None);
    }

    #[test]
    fn scaler_passthrough_when_scale_zero_or_missing() {
        let mut scaler = ScalerParams::default();
        scaler.means.insert("engine".into(), 1000.0);
        scaler.scales.insert("engine".into(), 0.0);
        scaler.means.insert("seats".into(), 5.0);

        assert_eq!(scaler.standardize("engine", 1200.0), 1200.0);
        assert_eq!(scaler.standardize("seats", 7.0), 7.0);
        assert_eq!(scaler.standardize("mileage", 18.0), 18.0);
    }

    #[test]
    fn transform_requires_recognized_pair() {
        assert_eq!(TransformMeta::log1p().target_transform(), TargetTransform::Log1p);

        let mut half = TransformMeta::log1p();
        half.inverse_transform = Some("exp".into());
        assert_eq!(half.target_transform(), TargetTransform::Identity);
        assert_eq!(TransformMeta::default().target_transform(), TargetTransform::Identity);
    }

    #[test]
    fn load_round_trips_written_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path());

        let store = ArtifactStore::load(&paths).unwrap();
        assert!(!store.is_degraded());
        assert_eq!(store.encoding(), &sample_encoding());
        assert_eq!(store.meta().target_transform(), TargetTransform::Log1p);
        assert_eq!(store.meta().extra.get("test_r2"), Some(&Value::from(0.93)));
        assert_eq!(store.best_iteration(), Some(1));
        assert_eq!(store.model_summary().num_trees, 1);
    }

    #[test]
    fn optional_files_degrade_independently() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path());
        fs::remove_file(&paths.name_codes).unwrap();
        fs::write(&paths.categorical_levels, "{ not json").unwrap();

        let store = ArtifactStore::load(&paths).unwrap();
        assert!(store.name_codes().is_empty());
        assert!(store.levels().is_empty());
        assert!(!store.encoding().scaler.is_empty());

        let kinds: Vec<AuxArtifact> = store.degraded().iter().map(|d| d.artifact).collect();
        assert_eq!(
            kinds,
            vec![AuxArtifact::NameCodes, AuxArtifact::CategoricalLevels]
        );
    }

    #[test]
    fn missing_meta_defaults_reference_year() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path());
        fs::remove_file(&paths.meta).unwrap();

        let store = ArtifactStore::load(&paths).unwrap();
        assert_eq!(store.encoding().reference_year, DEFAULT_REFERENCE_YEAR);
        assert_eq!(store.meta().target_transform(), TargetTransform::Identity);
        // Falls back to the cutoff stored in the model
        assert_eq!(store.best_iteration(), Some(1));
    }

    #[test]
    fn scaler_entries_for_unknown_features_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path());
        fs::write(
            &paths.scaler,
            r#"{"means": {"km_driven": 1.0, "year": 2015.0}, "scales": {"km_driven": 2.0}}"#,
        )
        .unwrap();

        let store = ArtifactStore::load(&paths).unwrap();
        assert!(!store.encoding().scaler.means.contains_key("year"));
        assert_eq!(store.degraded().len(), 1);
        assert_eq!(store.degraded()[0].artifact, AuxArtifact::ScalerParams);
    }

    #[test]
    fn mandatory_files_fail_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path());

        fs::write(&paths.features, "\n\n").unwrap();
        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::EmptyFeatureList(_))
        ));

        fs::write(&paths.features, "km_driven\nname_le\n").unwrap();
        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::FeatureCountMismatch { model: 3, features: 2 })
        ));

        fs::write(&paths.features, "km_driven\nname_le\nfuel_Diesel").unwrap();
        fs::write(&paths.model, b"garbage").unwrap();
        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::ModelDecode { .. })
        ));

        fs::remove_file(&paths.model).unwrap();
        assert!(matches!(
            ArtifactStore::load(&paths),
            Err(ArtifactLoadError::Read { .. })
        ));
    }
}
