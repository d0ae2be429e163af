use super::schema::ocorrencias;
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Number of photo slots carried by every occurrence.
pub const PHOTO_SLOTS: usize = 4;

/// One citizen report, as stored in the `ocorrencias` table.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = ocorrencias)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OccurrenceRecord {
    pub id: i32,
    #[diesel(column_name = table_row_uuid)]
    pub row_id: String,
    #[diesel(column_name = uuid)]
    pub device_id: String,
    #[diesel(column_name = prod)]
    pub is_production: bool,
    #[diesel(column_name = foto1)]
    pub photo1: Option<String>,
    #[diesel(column_name = foto2)]
    pub photo2: Option<String>,
    #[diesel(column_name = foto3)]
    pub photo3: Option<String>,
    #[diesel(column_name = foto4)]
    pub photo4: Option<String>,
    #[diesel(column_name = data_data)]
    pub submitted_on: NaiveDate,
    #[diesel(column_name = data_hora)]
    pub submitted_at: NaiveTime,
    #[diesel(column_name = data_concelho)]
    pub municipality: String,
    #[diesel(column_name = data_freguesia)]
    pub parish: String,
    #[diesel(column_name = data_local)]
    pub street: Option<String>,
    #[diesel(column_name = data_num_porta)]
    pub door_number: Option<String>,
    #[diesel(column_name = data_coord_latit)]
    pub latitude: Option<f64>,
    #[diesel(column_name = data_coord_long)]
    pub longitude: Option<f64>,
    #[diesel(column_name = anomaly1)]
    pub main_anomaly: Option<String>,
    #[diesel(column_name = anomaly2)]
    pub secondary_anomaly: Option<String>,
    pub anomaly_code: String,
    #[diesel(column_name = email_concelho)]
    pub municipality_email: Option<String>,
    #[diesel(column_name = email_freguesia)]
    pub parish_email: Option<String>,
    #[diesel(column_name = ocorrencia_resolvida)]
    pub resolved: bool,
    #[diesel(column_name = ocorrencia_resolvida_por_op)]
    pub resolved_by_user: bool,
    #[diesel(column_name = ocorrencia_resolvida_por_municipio)]
    pub resolved_by_municipality: bool,
    #[diesel(column_name = ocorrencia_resolvida_por_freguesia)]
    pub resolved_by_parish: bool,
    pub deleted_by_admin: bool,
    pub deleted_by_user: bool,
    #[diesel(column_name = deleted_by_sys)]
    pub deleted_by_system: bool,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_op)]
    pub submitter_key: String,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_municipio)]
    pub municipality_key: Option<String>,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_freguesia)]
    pub parish_key: Option<String>,
}

impl OccurrenceRecord {
    /// The four photo slots in order. Empty strings count as empty slots.
    pub fn photo_refs(&self) -> [Option<&str>; PHOTO_SLOTS] {
        [
            non_empty(&self.photo1),
            non_empty(&self.photo2),
            non_empty(&self.photo3),
            non_empty(&self.photo4),
        ]
    }

    pub fn first_photo(&self) -> Option<&str> {
        non_empty(&self.photo1)
    }

    pub fn is_live(&self) -> bool {
        !(self.deleted_by_admin || self.deleted_by_user || self.deleted_by_system)
    }

    pub fn key_for(&self, authority: Authority) -> Option<&str> {
        match authority {
            Authority::Parish => self.parish_key.as_deref(),
            Authority::Municipality => self.municipality_key.as_deref(),
        }
    }
}

fn non_empty(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().filter(|name| !name.is_empty())
}

/// Row written when a new submission is accepted. Resolution and delete
/// flags take their column defaults.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ocorrencias)]
pub struct NewOccurrence {
    #[diesel(column_name = table_row_uuid)]
    pub row_id: String,
    #[diesel(column_name = uuid)]
    pub device_id: String,
    #[diesel(column_name = prod)]
    pub is_production: bool,
    #[diesel(column_name = foto1)]
    pub photo1: Option<String>,
    #[diesel(column_name = foto2)]
    pub photo2: Option<String>,
    #[diesel(column_name = foto3)]
    pub photo3: Option<String>,
    #[diesel(column_name = foto4)]
    pub photo4: Option<String>,
    #[diesel(column_name = data_data)]
    pub submitted_on: NaiveDate,
    #[diesel(column_name = data_hora)]
    pub submitted_at: NaiveTime,
    #[diesel(column_name = data_concelho)]
    pub municipality: String,
    #[diesel(column_name = data_freguesia)]
    pub parish: String,
    #[diesel(column_name = data_local)]
    pub street: Option<String>,
    #[diesel(column_name = data_num_porta)]
    pub door_number: Option<String>,
    #[diesel(column_name = data_coord_latit)]
    pub latitude: Option<f64>,
    #[diesel(column_name = data_coord_long)]
    pub longitude: Option<f64>,
    #[diesel(column_name = anomaly1)]
    pub main_anomaly: Option<String>,
    #[diesel(column_name = anomaly2)]
    pub secondary_anomaly: Option<String>,
    pub anomaly_code: String,
    #[diesel(column_name = email_concelho)]
    pub municipality_email: Option<String>,
    #[diesel(column_name = email_freguesia)]
    pub parish_email: Option<String>,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_op)]
    pub submitter_key: String,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_municipio)]
    pub municipality_key: Option<String>,
    #[diesel(column_name = chave_confirmacao_ocorrencia_resolvida_por_freguesia)]
    pub parish_key: Option<String>,
}

impl NewOccurrence {
    /// Materialize the row the database would hold right after insertion.
    pub fn into_record(self, id: i32) -> OccurrenceRecord {
        OccurrenceRecord {
            id,
            row_id: self.row_id,
            device_id: self.device_id,
            is_production: self.is_production,
            photo1: self.photo1,
            photo2: self.photo2,
            photo3: self.photo3,
            photo4: self.photo4,
            submitted_on: self.submitted_on,
            submitted_at: self.submitted_at,
            municipality: self.municipality,
            parish: self.parish,
            street: self.street,
            door_number: self.door_number,
            latitude: self.latitude,
            longitude: self.longitude,
            main_anomaly: self.main_anomaly,
            secondary_anomaly: self.secondary_anomaly,
            anomaly_code: self.anomaly_code,
            municipality_email: self.municipality_email,
            parish_email: self.parish_email,
            resolved: false,
            resolved_by_user: false,
            resolved_by_municipality: false,
            resolved_by_parish: false,
            deleted_by_admin: false,
            deleted_by_user: false,
            deleted_by_system: false,
            submitter_key: self.submitter_key,
            municipality_key: self.municipality_key,
            parish_key: self.parish_key,
        }
    }
}

/// Fields safe to hand back to clients. Contact names and confirmation keys
/// never leave the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicOccurrence {
    pub table_row_uuid: String,
    pub uuid: String,
    pub foto1: Option<String>,
    pub foto2: Option<String>,
    pub foto3: Option<String>,
    pub foto4: Option<String>,
    pub data_data: NaiveDate,
    pub data_hora: NaiveTime,
    pub data_concelho: String,
    pub data_freguesia: String,
    pub data_local: Option<String>,
    pub data_num_porta: Option<String>,
    pub data_coord_latit: Option<f64>,
    pub data_coord_long: Option<f64>,
    pub anomaly1: Option<String>,
    pub anomaly2: Option<String>,
    pub anomaly_code: String,
    pub email_concelho: Option<String>,
    pub email_freguesia: Option<String>,
    pub ocorrencia_resolvida: bool,
    pub ocorrencia_resolvida_por_op: bool,
    pub ocorrencia_resolvida_por_municipio: bool,
    pub ocorrencia_resolvida_por_freguesia: bool,
}

impl From<&OccurrenceRecord> for PublicOccurrence {
    fn from(record: &OccurrenceRecord) -> Self {
        PublicOccurrence {
            table_row_uuid: record.row_id.clone(),
            uuid: record.device_id.clone(),
            foto1: record.photo1.clone(),
            foto2: record.photo2.clone(),
            foto3: record.photo3.clone(),
            foto4: record.photo4.clone(),
            data_data: record.submitted_on,
            data_hora: record.submitted_at,
            data_concelho: record.municipality.clone(),
            data_freguesia: record.parish.clone(),
            data_local: record.street.clone(),
            data_num_porta: record.door_number.clone(),
            data_coord_latit: record.latitude,
            data_coord_long: record.longitude,
            anomaly1: record.main_anomaly.clone(),
            anomaly2: record.secondary_anomaly.clone(),
            anomaly_code: record.anomaly_code.clone(),
            email_concelho: record.municipality_email.clone(),
            email_freguesia: record.parish_email.clone(),
            ocorrencia_resolvida: record.resolved,
            ocorrencia_resolvida_por_op: record.resolved_by_user,
            ocorrencia_resolvida_por_municipio: record.resolved_by_municipality,
            ocorrencia_resolvida_por_freguesia: record.resolved_by_parish,
        }
    }
}

/// Authority that can confirm an occurrence as resolved through its emailed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Parish,
    Municipality,
}

impl FromStr for Authority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freguesia" => Ok(Authority::Parish),
            "municipio" => Ok(Authority::Municipality),
            other => Err(format!("unknown authority '{}'", other)),
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Parish => write!(f, "parish"),
            Authority::Municipality => write!(f, "municipality"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewOccurrence {
        NewOccurrence {
            row_id: "row-1".to_string(),
            device_id: "device-a".to_string(),
            is_production: true,
            photo1: Some("n1.jpg".to_string()),
            photo2: Some(String::new()),
            photo3: None,
            photo4: Some("n4.jpg".to_string()),
            submitted_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            submitted_at: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
            municipality: "Lisboa".to_string(),
            parish: "Arroios".to_string(),
            street: None,
            door_number: None,
            latitude: None,
            longitude: None,
            main_anomaly: None,
            secondary_anomaly: None,
            anomaly_code: "A1".to_string(),
            municipality_email: None,
            parish_email: Some("junta@example.org".to_string()),
            submitter_key: "abcd1234".to_string(),
            municipality_key: None,
            parish_key: Some("ffff0000".to_string()),
        }
    }

    #[test]
    fn test_photo_refs_treat_empty_strings_as_empty_slots() {
        let record = sample().into_record(1);
        assert_eq!(
            record.photo_refs(),
            [Some("n1.jpg"), None, None, Some("n4.jpg")]
        );
        assert_eq!(record.first_photo(), Some("n1.jpg"));
    }

    #[test]
    fn test_new_record_is_live_and_unresolved() {
        let record = sample().into_record(7);
        assert_eq!(record.id, 7);
        assert!(record.is_live());
        assert!(!record.resolved);
        assert_eq!(record.key_for(Authority::Parish), Some("ffff0000"));
        assert_eq!(record.key_for(Authority::Municipality), None);
    }

    #[test]
    fn test_authority_parses_link_segments() {
        assert_eq!("freguesia".parse::<Authority>(), Ok(Authority::Parish));
        assert_eq!("municipio".parse::<Authority>(), Ok(Authority::Municipality));
        assert!("camara".parse::<Authority>().is_err());
    }
}
