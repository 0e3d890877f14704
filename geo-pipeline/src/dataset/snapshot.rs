//! Snapshots GeoJSON d'un dataset
//!
//! Un fichier = une `FeatureCollection`, une feature par ligne. La géométrie
//! est un `Point` quand `latitude`/`longitude` sont renseignées ; toutes les
//! colonnes sont aussi écrites en propriétés. Un dossier de snapshots se
//! relit comme un seul dataset (union des schémas).
//!
//! Seul ce format est lu : les dossiers Parquet d'autres outils ne le sont pas.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue};
use tracing::{debug, info};

use super::{ColumnData, Dataset, Value};
use crate::DatasetError;

const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";

/// Extension des fichiers de snapshot
pub const SNAPSHOT_EXTENSION: &str = "geojson";

/// Écrit un snapshot horodaté `<base>_<YYYYmmdd_HHMMSS>.geojson` dans `dir`
pub fn write_snapshot(dataset: &Dataset, dir: &Path, base: &str) -> Result<PathBuf, DatasetError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}_{}.{}",
        base,
        Local::now().format("%Y%m%d_%H%M%S"),
        SNAPSHOT_EXTENSION
    ));
    write_file(dataset, &path)?;
    Ok(path)
}

/// Écrit le dataset dans un fichier GeoJSON
pub fn write_file(dataset: &Dataset, path: &Path) -> Result<(), DatasetError> {
    let collection = to_feature_collection(dataset);

    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(GeoJson::FeatureCollection(collection).to_string().as_bytes())?;
    writer.flush()?;

    info!(path = %path.display(), rows = dataset.n_rows(), "Snapshot written");
    Ok(())
}

/// Convertit le dataset en `FeatureCollection`
pub fn to_feature_collection(dataset: &Dataset) -> FeatureCollection {
    let latitude = dataset.column(LATITUDE).and_then(ColumnData::as_numbers);
    let longitude = dataset.column(LONGITUDE).and_then(ColumnData::as_numbers);

    let features = (0..dataset.n_rows())
        .map(|row| {
            let geometry = match (
                latitude.and_then(|c| c[row]),
                longitude.and_then(|c| c[row]),
            ) {
                (Some(lat), Some(lon)) => Some(Geometry::new(geojson::Value::Point(vec![lon, lat]))),
                _ => None,
            };

            let properties: JsonObject = dataset
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), to_json(c.data().value(row))))
                .collect();

            Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Charge un snapshot unique
pub fn load_file(path: &Path) -> Result<Dataset, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let mut builder = DatasetBuilder::default();
    builder.read_file(path)?;
    builder.finish()
}

/// Charge tous les snapshots `*.geojson` d'un dossier comme un seul dataset
pub fn load_dir(dir: &Path) -> Result<Dataset, DatasetError> {
    if !dir.is_dir() {
        return Err(DatasetError::NotFound(dir.to_path_buf()));
    }

    let files = snapshot_files(dir)?;
    if files.is_empty() {
        return Err(DatasetError::EmptyDirectory(dir.to_path_buf()));
    }

    let mut builder = DatasetBuilder::default();
    for file in &files {
        builder.read_file(file)?;
    }
    let dataset = builder.finish()?;

    info!(
        dir = %dir.display(),
        files = files.len(),
        rows = dataset.n_rows(),
        columns = dataset.n_columns(),
        "Snapshots loaded"
    );
    Ok(dataset)
}

/// Liste triée des snapshots d'un dossier
pub fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        SNAPSHOT_EXTENSION
    );

    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Number(n) => serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number),
        Value::Bool(b) => JsonValue::Bool(b),
        Value::Text(s) => JsonValue::String(s),
    }
}

/// Accumule les propriétés de plusieurs fichiers avant l'inférence des types
#[derive(Default)]
struct DatasetBuilder {
    order: Vec<String>,
    columns: HashMap<String, Vec<JsonValue>>,
    rows: usize,
}

impl DatasetBuilder {
    fn read_file(&mut self, path: &Path) -> Result<(), DatasetError> {
        let content = fs::read_to_string(path)?;
        let geojson = content
            .parse::<GeoJson>()
            .map_err(|e| DatasetError::invalid_snapshot(path, e.to_string()))?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => {
                return Err(DatasetError::invalid_snapshot(
                    path,
                    "expected a Feature or a FeatureCollection",
                ))
            }
        };

        debug!(path = %path.display(), features = features.len(), "Reading snapshot");
        for feature in features {
            self.push_feature(feature);
        }
        Ok(())
    }

    fn push_feature(&mut self, feature: Feature) {
        let mut properties = feature.properties.unwrap_or_default();

        // Coordonnées depuis la géométrie si absentes des propriétés
        if let Some(geojson::Value::Point(position)) = feature.geometry.map(|g| g.value) {
            if let [lon, lat, ..] = position.as_slice() {
                properties
                    .entry(LATITUDE.to_string())
                    .or_insert_with(|| JsonValue::from(*lat));
                properties
                    .entry(LONGITUDE.to_string())
                    .or_insert_with(|| JsonValue::from(*lon));
            }
        }

        for (name, value) in properties {
            let rows = self.rows;
            let column = self.columns.entry(name.clone()).or_insert_with(|| {
                self.order.push(name);
                vec![JsonValue::Null; rows]
            });
            column.push(value);
        }

        self.rows += 1;
        for column in self.columns.values_mut() {
            column.resize(self.rows, JsonValue::Null);
        }
    }

    fn finish(mut self) -> Result<Dataset, DatasetError> {
        let mut dataset = Dataset::new();
        for name in &self.order {
            let values = self.columns.remove(name).unwrap_or_default();
            dataset.insert_column(name.clone(), infer_column(values))?;
        }
        Ok(dataset)
    }
}

/// Déduit le type d'une colonne ; un mélange de types devient du texte
fn infer_column(values: Vec<JsonValue>) -> ColumnData {
    let non_null = || values.iter().filter(|v| !v.is_null());

    if non_null().next().is_some() && non_null().all(JsonValue::is_number) {
        return ColumnData::Number(values.iter().map(JsonValue::as_f64).collect());
    }
    if non_null().next().is_some() && non_null().all(JsonValue::is_boolean) {
        return ColumnData::Boolean(values.iter().map(JsonValue::as_bool).collect());
    }

    ColumnData::Text(
        values
            .into_iter()
            .map(|v| match v {
                JsonValue::Null => None,
                JsonValue::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_column() {
        let numbers = infer_column(vec![JsonValue::from(1), JsonValue::Null, JsonValue::from(2.5)]);
        assert_eq!(numbers, ColumnData::Number(vec![Some(1.0), None, Some(2.5)]));

        let bools = infer_column(vec![JsonValue::from(true), JsonValue::Null]);
        assert_eq!(bools, ColumnData::Boolean(vec![Some(true), None]));

        let mixed = infer_column(vec![JsonValue::from("75056"), JsonValue::from(38185)]);
        assert_eq!(
            mixed,
            ColumnData::Text(vec![Some("75056".into()), Some("38185".into())])
        );

        let nulls = infer_column(vec![JsonValue::Null, JsonValue::Null]);
        assert_eq!(nulls, ColumnData::Text(vec![None, None]));
    }

    #[test]
    fn test_feature_collection_geometry() {
        let dataset = Dataset::new()
            .with_column("address", ColumnData::Text(vec![Some("a".into()), Some("b".into())]))
            .unwrap()
            .with_column("latitude", ColumnData::Number(vec![Some(45.19), None]))
            .unwrap()
            .with_column("longitude", ColumnData::Number(vec![Some(5.72), None]))
            .unwrap();

        let fc = to_feature_collection(&dataset);
        assert_eq!(fc.features.len(), 2);

        let point = fc.features[0].geometry.as_ref().unwrap();
        assert_eq!(point.value, geojson::Value::Point(vec![5.72, 45.19]));
        assert!(fc.features[1].geometry.is_none());

        let props = fc.features[1].properties.as_ref().unwrap();
        assert_eq!(props["address"], JsonValue::from("b"));
        assert_eq!(props["latitude"], JsonValue::Null);
    }

    #[test]
    fn test_schema_union() {
        let mut builder = DatasetBuilder::default();
        let mut first = JsonObject::new();
        first.insert("address".into(), JsonValue::from("a"));
        first.insert("score".into(), JsonValue::from(0.9));
        let mut second = JsonObject::new();
        second.insert("address".into(), JsonValue::from("b"));
        second.insert("population".into(), JsonValue::from(1200));

        for properties in [first, second] {
            builder.push_feature(Feature {
                bbox: None,
                geometry: None,
                id: None,
                properties: Some(properties),
                foreign_members: None,
            });
        }
        let dataset = builder.finish().unwrap();

        assert_eq!(dataset.n_rows(), 2);
        assert_eq!(dataset.column_names(), vec!["address", "score", "population"]);
        assert_eq!(dataset.value(1, "score"), Some(Value::Null));
        assert_eq!(dataset.value(0, "population"), Some(Value::Null));
        assert_eq!(dataset.value(1, "population"), Some(Value::Number(1200.0)));
    }

    #[test]
    fn test_coordinates_from_geometry() {
        let mut builder = DatasetBuilder::default();
        builder.push_feature(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![2.35, 48.85]))),
            id: None,
            properties: None,
            foreign_members: None,
        });
        let dataset = builder.finish().unwrap();

        assert_eq!(dataset.value(0, "latitude"), Some(Value::Number(48.85)));
        assert_eq!(dataset.value(0, "longitude"), Some(Value::Number(2.35)));
    }
}
