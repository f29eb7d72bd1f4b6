use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::output::{AddressInfo, OutputRecord};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    MalformedLine(String),
    #[error("record has an empty name: {0}")]
    EmptyName(String),
}

/// One line of an enumeration file as it is stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRecord {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub addresses: Vec<AddressInfo>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cached: bool,
}

impl StoredRecord {
    pub fn to_output(&self) -> OutputRecord {
        OutputRecord::new(self.name.clone(), self.addresses.clone())
    }
}

pub fn parse_record_line(line: &str) -> Result<StoredRecord, RecordError> {
    // One JSON object per line; unknown fields (tag, sources, ...) are ignored
    let mut rec: StoredRecord = serde_json::from_str(line)
        .map_err(|_| RecordError::MalformedLine(line.to_string()))?;
    rec.name = rec.name.trim().to_string();
    rec.domain = rec.domain.trim().to_string();
    if rec.name.is_empty() {
        return Err(RecordError::EmptyName(line.to_string()));
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_line() {
        let line = r#"{"name":"www.example.com","domain":"example.com","addresses":[{"ip":"93.184.216.34","cidr":"93.184.216.0/24","asn":15133,"desc":"EDGECAST"}],"tag":"dns","timestamp":"2019-01-02T03:04:05Z"}"#;
        let r = parse_record_line(line).unwrap();
        assert_eq!(r.name, "www.example.com");
        assert_eq!(r.domain, "example.com");
        assert_eq!(r.addresses.len(), 1);
        assert_eq!(r.addresses[0].asn, Some(15133));
        assert!(!r.cached);
    }

    #[test]
    fn rejects_blank_name_and_bad_timestamp() {
        let blank = r#"{"name":"  ","domain":"example.com","timestamp":"2019-01-02T03:04:05Z"}"#;
        assert!(matches!(parse_record_line(blank), Err(RecordError::EmptyName(_))));
        let stamp = r#"{"name":"b.example.com","domain":"example.com","timestamp":"nope"}"#;
        assert!(matches!(parse_record_line(stamp), Err(RecordError::MalformedLine(_))));
        assert!(parse_record_line("not json").is_err());
    }

    #[test]
    fn missing_addresses_and_cached_flag() {
        let r = parse_record_line(
            r#"{"name":" c.example.com ","domain":"example.com","timestamp":"2019-01-03T00:00:00Z","cached":true}"#,
        )
        .unwrap();
        assert_eq!(r.name, "c.example.com");
        assert!(r.addresses.is_empty());
        assert!(r.cached);
    }

    #[test]
    fn bad_address_is_malformed() {
        let line = r#"{"name":"x.example.com","domain":"example.com","addresses":[{"ip":"999.1.1.1"}],"timestamp":"2019-01-02T03:04:05Z"}"#;
        assert!(matches!(
            parse_record_line(line),
            Err(RecordError::MalformedLine(_))
        ));
    }
}
