use crate::error::{Result, SourceError};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

/// Embedded registry of the municipal open-data resources, one per station.
pub static SOURCES_CSV: &str = include_str!("../fixtures/api_sources.csv");

/// One upstream dataset and the station it reports for.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiSource {
    /// Datastore resource identifier.
    pub resource_id: String,
    /// Station label attached to every reading of this resource.
    pub station: String,
}

impl ApiSource {
    /// The embedded registry.
    pub fn default_sources() -> Result<Vec<ApiSource>> {
        ApiSource::parse_source_csv(SOURCES_CSV)
    }

    /// Parse a registry with header `resource_id,station`.
    ///
    /// Blank lines are ignored; a row missing either field is rejected.
    pub fn parse_source_csv(csv_object: &str) -> Result<Vec<ApiSource>> {
        let mut sources = Vec::new();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_object.as_bytes());
        for (line, row) in rdr.records().enumerate() {
            let row = row?;
            let resource_id = row.get(0).unwrap_or("");
            let station = row.get(1).unwrap_or("");
            if resource_id.is_empty() && station.is_empty() {
                continue;
            }
            if resource_id.is_empty() || station.is_empty() {
                return Err(SourceError::InvalidSource(format!(
                    "row {} needs both resource_id and station",
                    line + 1
                )));
            }
            sources.push(ApiSource {
                resource_id: resource_id.to_string(),
                station: station.to_string(),
            });
        }
        Ok(sources)
    }

    /// Read a registry file from disk.
    pub fn load_source_file(path: &std::path::Path) -> Result<Vec<ApiSource>> {
        let data = std::fs::read_to_string(path)?;
        ApiSource::parse_source_csv(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiSource;
    use crate::error::SourceError;

    #[test]
    fn embedded_registry_lists_four_stations() {
        let sources = ApiSource::default_sources().unwrap();
        let stations: Vec<&str> = sources.iter().map(|s| s.station.as_str()).collect();
        assert_eq!(stations, vec!["Pance", "Ermita", "Univalle", "Flora"]);
        assert!(sources.iter().all(|s| s.resource_id.len() == 36));
    }

    #[test]
    fn custom_registry_is_trimmed() {
        let sources =
            ApiSource::parse_source_csv("resource_id,station\n abc , Compartir \n").unwrap();
        assert_eq!(
            sources,
            vec![ApiSource {
                resource_id: "abc".to_string(),
                station: "Compartir".to_string(),
            }]
        );
    }

    #[test]
    fn incomplete_row_is_rejected() {
        let err = ApiSource::parse_source_csv("resource_id,station\nabc,\n").unwrap_err();
        assert!(matches!(err, SourceError::InvalidSource(_)));
    }
}
