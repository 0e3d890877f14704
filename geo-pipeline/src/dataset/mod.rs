//! Dataset colonnaire en mémoire
//!
//! Colonnes nommées et ordonnées, toutes de même longueur. Chaque cellule
//! peut être nulle.

pub mod snapshot;

use std::collections::HashSet;
use std::fmt;

use geoapi::{EnrichedAddress, GeocodingResult};
use serde::Serialize;

use crate::DatasetError;

/// Colonne portant l'adresse, clé naturelle du dataset
pub const ADDRESS_COLUMN: &str = "address";

/// Type d'une colonne
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Number,
    Boolean,
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Number => write!(f, "number"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Text => write!(f, "text"),
        }
    }
}

/// Valeur d'une cellule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare la cellule à une valeur saisie sous forme de texte
    pub fn matches_str(&self, wanted: &str) -> bool {
        match self {
            Value::Null => false,
            Value::Text(s) => s == wanted,
            Value::Number(n) => wanted.trim().parse::<f64>().map_or(false, |w| w == *n),
            Value::Bool(b) => wanted.trim().parse::<bool>().map_or(false, |w| w == *b),
        }
    }

    fn key(&self) -> CellKey {
        match self {
            Value::Null => CellKey::Null,
            // -0.0 et 0.0 doivent former la même clé
            Value::Number(n) => CellKey::Number((*n + 0.0).to_bits()),
            Value::Bool(b) => CellKey::Bool(*b),
            Value::Text(s) => CellKey::Text(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Clé hashable d'une cellule (comparaison des doublons)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Null,
    Number(u64),
    Bool(bool),
    Text(String),
}

/// Données d'une colonne
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Number(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ColumnData::Number(_) => DataType::Number,
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Text(_) => DataType::Text,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Boolean(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Valeur d'une ligne (`Value::Null` hors limites)
    pub fn value(&self, row: usize) -> Value {
        match self {
            ColumnData::Number(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Number),
            ColumnData::Boolean(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Bool),
            ColumnData::Text(v) => v
                .get(row)
                .cloned()
                .flatten()
                .map_or(Value::Null, Value::Text),
        }
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            ColumnData::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Number(v) => ColumnData::Number(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Boolean(v) => ColumnData::Boolean(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Colonne nommée
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }
}

/// Filtre simple sur une colonne : égalité ou appartenance à une liste
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            column: column.into(),
            values,
        }
    }
}

impl std::str::FromStr for Filter {
    type Err = String;

    /// Format `colonne=valeur` ou `colonne=v1,v2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, values) = s
            .split_once('=')
            .ok_or_else(|| format!("Invalid filter: {}. Use: column=value[,value...]", s))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(format!("Invalid filter: {}. Missing column name", s));
        }
        let values = values.split(',').map(|v| v.trim().to_string()).collect();
        Ok(Self::new(column, values))
    }
}

/// Résumé léger d'un dataset (debug, contexte d'assistant)
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub dtypes: Vec<(String, DataType)>,
    /// Premières lignes, dans l'ordre des colonnes
    pub sample: Vec<Vec<Value>>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows: {}", self.rows)?;
        writeln!(f, "Columns ({}):", self.columns.len())?;
        for (name, dtype) in &self.dtypes {
            writeln!(f, "  {}: {}", name, dtype)?;
        }
        if !self.sample.is_empty() {
            writeln!(f, "Sample:")?;
            writeln!(f, "  {}", self.columns.join(" | "))?;
            for row in &self.sample {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(f, "  {}", cells.join(" | "))?;
            }
        }
        Ok(())
    }
}

/// Nombre de lignes dans l'échantillon du résumé
const SUMMARY_SAMPLE_ROWS: usize = 5;

/// Table colonnaire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute (ou remplace) une colonne, en chaînage
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        data: ColumnData,
    ) -> Result<Self, DatasetError> {
        self.insert_column(name, data)?;
        Ok(self)
    }

    /// Ajoute une colonne, ou remplace celle qui porte le même nom
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        data: ColumnData,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if !self.columns.is_empty() && data.len() != self.rows {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.rows,
                found: data.len(),
            });
        }

        self.replace_column(name, data);
        Ok(())
    }

    /// Remplace (ou ajoute) une colonne dérivée de ce dataset
    ///
    /// La colonne doit avoir autant de lignes que le dataset.
    pub(crate) fn replace_column(&mut self, name: impl Into<String>, data: ColumnData) {
        let name = name.into();
        debug_assert!(
            self.columns.is_empty() || data.len() == self.rows,
            "column {} has {} rows, dataset has {}",
            name,
            data.len(),
            self.rows
        );

        self.rows = data.len();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.data = data,
            None => self.columns.push(Column { name, data }),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Nombre total de cellules
    pub fn size(&self) -> usize {
        self.rows * self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    /// Valeur d'une cellule, `None` si la colonne n'existe pas
    pub fn value(&self, row: usize, column: &str) -> Option<Value> {
        self.column(column).map(|data| data.value(row))
    }

    /// Nombre de valeurs nulles par colonne, dans l'ordre des colonnes
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data.null_count()))
            .collect()
    }

    /// Nombre de cellules non nulles
    pub fn non_null_count(&self) -> usize {
        self.size() - self.columns.iter().map(|c| c.data.null_count()).sum::<usize>()
    }

    /// Colonne clé par défaut : `address`, sinon la première colonne
    pub fn default_key_column(&self) -> Option<&str> {
        if self.has_column(ADDRESS_COLUMN) {
            Some(ADDRESS_COLUMN)
        } else {
            self.columns.first().map(|c| c.name.as_str())
        }
    }

    /// Marque les lignes qui répètent la clé d'une ligne précédente
    ///
    /// La première occurrence n'est jamais marquée.
    pub fn duplicate_mask(&self, subset: &[String]) -> Result<Vec<bool>, DatasetError> {
        let key_columns = subset
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| DatasetError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(self.rows);
        let mask = (0..self.rows)
            .map(|row| {
                let key: Vec<CellKey> = key_columns.iter().map(|c| c.value(row).key()).collect();
                !seen.insert(key)
            })
            .collect();

        Ok(mask)
    }

    /// Nouveau dataset restreint aux lignes données (dans cet ordre)
    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(rows),
                })
                .collect(),
            rows: rows.len(),
        }
    }

    /// Applique des filtres simples ; les colonnes inconnues sont ignorées
    pub fn filter(&self, filters: &[Filter]) -> Dataset {
        let active: Vec<(&ColumnData, &[String])> = filters
            .iter()
            .filter_map(|f| self.column(&f.column).map(|c| (c, f.values.as_slice())))
            .collect();

        let rows: Vec<usize> = (0..self.rows)
            .filter(|&row| {
                active.iter().all(|(column, values)| {
                    let value = column.value(row);
                    values.iter().any(|wanted| value.matches_str(wanted))
                })
            })
            .collect();

        self.take_rows(&rows)
    }

    pub fn summary(&self) -> DatasetSummary {
        let sample_rows = self.rows.min(SUMMARY_SAMPLE_ROWS);
        DatasetSummary {
            rows: self.rows,
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            dtypes: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.data.dtype()))
                .collect(),
            sample: (0..sample_rows)
                .map(|row| self.columns.iter().map(|c| c.data.value(row)).collect())
                .collect(),
        }
    }

    /// Dataset brut issu du géocodage (la requête devient `address`)
    pub fn from_geocoding(results: &[GeocodingResult]) -> Dataset {
        Dataset {
            columns: vec![
                column(ADDRESS_COLUMN, text_column(results, |r| Some(r.query.clone()))),
                column("label", text_column(results, |r| r.label.clone())),
                column("latitude", number_column(results, |r| r.latitude)),
                column("longitude", number_column(results, |r| r.longitude)),
                column("score", number_column(results, |r| Some(r.score))),
                column("city", text_column(results, |r| r.city.clone())),
                column("postcode", text_column(results, |r| r.postcode.clone())),
                column("citycode", text_column(results, |r| r.citycode.clone())),
                column(
                    "fetched_at",
                    text_column(results, |r| Some(r.fetched_at.to_rfc3339())),
                ),
            ],
            rows: results.len(),
        }
    }

    /// Dataset enrichi (géocodage + commune)
    pub fn from_enriched(rows: &[EnrichedAddress]) -> Dataset {
        Dataset {
            columns: vec![
                column(ADDRESS_COLUMN, text_column(rows, |r| Some(r.address.clone()))),
                column("latitude", number_column(rows, |r| Some(r.latitude))),
                column("longitude", number_column(rows, |r| Some(r.longitude))),
                column("score", number_column(rows, |r| Some(r.score))),
                column("city", text_column(rows, |r| Some(r.city.clone()))),
                column("postcode", text_column(rows, |r| Some(r.postcode.clone()))),
                column("citycode", text_column(rows, |r| Some(r.citycode.clone()))),
                column("commune", text_column(rows, |r| Some(r.commune.clone()))),
                column("population", number_column(rows, |r| Some(r.population as f64))),
                column("fetched_at", text_column(rows, |r| Some(r.fetched_at.to_rfc3339()))),
            ],
            rows: rows.len(),
        }
    }
}

fn column(name: &str, data: ColumnData) -> Column {
    Column {
        name: name.to_string(),
        data,
    }
}

fn text_column<T>(rows: &[T], f: impl Fn(&T) -> Option<String>) -> ColumnData {
    ColumnData::Text(rows.iter().map(f).collect())
}

fn number_column<T>(rows: &[T], f: impl Fn(&T) -> Option<f64>) -> ColumnData {
    ColumnData::Number(rows.iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[Option<&str>]) -> ColumnData {
        ColumnData::Text(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn sample() -> Dataset {
        Dataset::new()
            .with_column("address", text(&[Some("a"), Some("b"), Some("a"), None]))
            .unwrap()
            .with_column("score", ColumnData::Number(vec![Some(0.9), None, Some(0.4), Some(0.7)]))
            .unwrap()
            .with_column("city", text(&[Some("paris"), Some("lyon"), Some("paris"), Some("nice")]))
            .unwrap()
    }

    #[test]
    fn test_shape_and_nulls() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.n_columns(), 3);
        assert_eq!(ds.size(), 12);
        assert_eq!(ds.non_null_count(), 10);
        assert_eq!(
            ds.null_counts(),
            vec![
                ("address".to_string(), 1),
                ("score".to_string(), 1),
                ("city".to_string(), 0)
            ]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let err = sample()
            .with_column("bad", ColumnData::Boolean(vec![Some(true)]))
            .unwrap_err();
        assert!(matches!(err, DatasetError::LengthMismatch { expected: 4, found: 1, .. }));
    }

    #[test]
    fn test_replace_column_keeps_position() {
        let ds = sample()
            .with_column("score", ColumnData::Number(vec![Some(1.0); 4]))
            .unwrap();
        assert_eq!(ds.column_names(), vec!["address", "score", "city"]);
        assert_eq!(ds.value(1, "score"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_replace_column_in_place() {
        let mut ds = sample();
        ds.replace_column("city", ColumnData::Text(vec![None; 4]));
        ds.replace_column("flag", ColumnData::Boolean(vec![Some(true); 4]));

        assert_eq!(ds.column_names(), vec!["address", "score", "city", "flag"]);
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.value(0, "city"), Some(Value::Null));
        assert_eq!(ds.value(3, "flag"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_duplicate_mask_keeps_first() {
        let ds = sample();
        let mask = ds.duplicate_mask(&["address".to_string()]).unwrap();
        assert_eq!(mask, vec![false, false, true, false]);

        let mask = ds
            .duplicate_mask(&["address".to_string(), "score".to_string()])
            .unwrap();
        assert_eq!(mask, vec![false, false, false, false]);
    }

    #[test]
    fn test_duplicate_mask_unknown_column() {
        let err = sample().duplicate_mask(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownColumn(c) if c == "nope"));
    }

    #[test]
    fn test_default_key_column() {
        assert_eq!(sample().default_key_column(), Some("address"));

        let ds = Dataset::new()
            .with_column("label", text(&[Some("x")]))
            .unwrap();
        assert_eq!(ds.default_key_column(), Some("label"));
        assert_eq!(Dataset::new().default_key_column(), None);
    }

    #[test]
    fn test_filter() {
        let ds = sample();

        let filtered = ds.filter(&["city=paris,nice".parse().unwrap()]);
        assert_eq!(filtered.n_rows(), 3);

        let filtered = ds.filter(&["city=paris".parse().unwrap(), "score=0.9".parse().unwrap()]);
        assert_eq!(filtered.n_rows(), 1);
        assert_eq!(filtered.value(0, "address"), Some(Value::Text("a".into())));

        // Colonne inconnue : ignorée
        let filtered = ds.filter(&["unknown=1".parse().unwrap()]);
        assert_eq!(filtered.n_rows(), 4);
    }

    #[test]
    fn test_filter_parse_errors() {
        assert!("no-equal-sign".parse::<Filter>().is_err());
        assert!("=value".parse::<Filter>().is_err());
    }

    #[test]
    fn test_summary() {
        let summary = sample().summary();
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.columns, vec!["address", "score", "city"]);
        assert_eq!(summary.dtypes[1], ("score".to_string(), DataType::Number));
        assert_eq!(summary.sample.len(), 4);
        assert!(summary.to_string().contains("score: number"));
    }

    #[test]
    fn test_from_geocoding() {
        let mut result = GeocodingResult::degenerate("rue inconnue");
        result.score = 0.2;
        let ds = Dataset::from_geocoding(&[result, GeocodingResult::degenerate("")]);

        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.value(0, "address"), Some(Value::Text("rue inconnue".into())));
        assert_eq!(ds.value(0, "score"), Some(Value::Number(0.2)));
        assert_eq!(ds.value(0, "latitude"), Some(Value::Null));
    }
}
