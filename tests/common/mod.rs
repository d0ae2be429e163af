#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use occurrence_sweep::storage::OccurrenceRecord;

pub struct RecordBuilder {
    record: OccurrenceRecord,
}

/// A live production record from `device`, submitted 2024-05-01 10:00 in
/// Arroios with anomaly `A1` and no photos.
pub fn record(id: i32, device: &str) -> RecordBuilder {
    RecordBuilder {
        record: OccurrenceRecord {
            id,
            row_id: format!("row-{}", id),
            device_id: device.to_string(),
            is_production: true,
            photo1: None,
            photo2: None,
            photo3: None,
            photo4: None,
            submitted_on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            submitted_at: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            municipality: "Lisboa".to_string(),
            parish: "Arroios".to_string(),
            street: Some("Rua Morais Soares".to_string()),
            door_number: Some("12".to_string()),
            latitude: Some(38.7296),
            longitude: Some(-9.1347),
            main_anomaly: Some("Passeios".to_string()),
            secondary_anomaly: Some("Buraco".to_string()),
            anomaly_code: "A1".to_string(),
            municipality_email: None,
            parish_email: None,
            resolved: false,
            resolved_by_user: false,
            resolved_by_municipality: false,
            resolved_by_parish: false,
            deleted_by_admin: false,
            deleted_by_user: false,
            deleted_by_system: false,
            submitter_key: "0a1b2c3d".to_string(),
            municipality_key: None,
            parish_key: None,
        },
    }
}

impl RecordBuilder {
    pub fn photo(mut self, name: &str) -> Self {
        self.record.photo1 = Some(name.to_string());
        self
    }

    pub fn photos(mut self, names: [&str; 4]) -> Self {
        let [a, b, c, d] = names.map(|n| Some(n.to_string()));
        self.record.photo1 = a;
        self.record.photo2 = b;
        self.record.photo3 = c;
        self.record.photo4 = d;
        self
    }

    pub fn at(mut self, hour: u32, minute: u32) -> Self {
        self.record.submitted_at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        self
    }

    pub fn on(mut self, year: i32, month: u32, day: u32) -> Self {
        self.record.submitted_on = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        self
    }

    pub fn parish(mut self, parish: &str) -> Self {
        self.record.parish = parish.to_string();
        self
    }

    pub fn anomaly(mut self, code: &str) -> Self {
        self.record.anomaly_code = code.to_string();
        self
    }

    pub fn debug(mut self) -> Self {
        self.record.is_production = false;
        self
    }

    pub fn deleted_by_user(mut self) -> Self {
        self.record.deleted_by_user = true;
        self
    }

    pub fn deleted_by_system(mut self) -> Self {
        self.record.deleted_by_system = true;
        self
    }

    pub fn resolved(mut self) -> Self {
        self.record.resolved = true;
        self.record.resolved_by_user = true;
        self
    }

    pub fn keys(mut self, parish: Option<&str>, municipality: Option<&str>) -> Self {
        self.record.parish_key = parish.map(str::to_string);
        self.record.municipality_key = municipality.map(str::to_string);
        self
    }

    pub fn build(self) -> OccurrenceRecord {
        self.record
    }
}

pub fn row_ids(records: &[OccurrenceRecord]) -> Vec<String> {
    records.iter().map(|r| r.row_id.clone()).collect()
}

/// Photo bytes standing in for a JPEG; `seed` makes them distinct.
pub fn jpeg(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(seed).take(2048));
    bytes.extend([0xFF, 0xD9]);
    bytes
}
