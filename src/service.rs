use crate::error::Error;
use crate::storage::{Authority, NewOccurrence, OccurrenceRepository, PublicOccurrence};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Length of the confirmation keys handed out on submission.
const KEY_LENGTH: usize = 8;

/// Raw request body as posted by the mobile app. Older app versions name
/// the command `dbCommand`; when both keys are present `serverCommand` wins.
#[derive(Debug, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "serverCommand", default)]
    pub server_command: Option<String>,
    #[serde(rename = "dbCommand", default)]
    pub db_command: Option<String>,
    #[serde(rename = "databaseObj")]
    pub database_obj: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum ServerCommand {
    SubmitNewEntry(Submission),
    SetSolvedStatus(SolvedStatus),
    SetDeletedByAdmin(EntryRef),
    SetDeletedByUser(EntryRef),
}

impl ServerCommand {
    pub fn parse(body: &str) -> Result<ServerCommand, Error> {
        let envelope: CommandEnvelope =
            serde_json::from_str(body).map_err(|e| Error::BadRequest(e.to_string()))?;
        ServerCommand::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: CommandEnvelope) -> Result<ServerCommand, Error> {
        let name = envelope
            .server_command
            .filter(|name| !name.is_empty())
            .or(envelope.db_command);
        let (Some(name), Some(object)) = (name, envelope.database_obj) else {
            return Err(Error::BadRequest(
                "property serverCommand or databaseObj of request does not exist".to_string(),
            ));
        };

        let command = match name.as_str() {
            "submitNewEntryToDB" => ServerCommand::SubmitNewEntry(from_object(object)?),
            "setSolvedOccurrenceStatus" => ServerCommand::SetSolvedStatus(from_object(object)?),
            "setEntryInDbAsDeletedByAdmin" => ServerCommand::SetDeletedByAdmin(from_object(object)?),
            "setEntryInDbAsDeletedByUser" => ServerCommand::SetDeletedByUser(from_object(object)?),
            other => {
                return Err(Error::BadRequest(format!(
                    "POST dbCommand {} does not exist",
                    other
                )))
            }
        };
        Ok(command)
    }
}

fn from_object<T: for<'de> Deserialize<'de>>(object: Value) -> Result<T, Error> {
    serde_json::from_value(object).map_err(|e| Error::BadRequest(e.to_string()))
}

/// A new occurrence as filled in on the device.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    #[serde(rename = "PROD", default, deserialize_with = "deserialize_flag")]
    pub is_production: bool,
    #[serde(rename = "uuid")]
    pub device_id: String,
    #[serde(rename = "foto1", default)]
    pub photo1: Option<String>,
    #[serde(rename = "foto2", default)]
    pub photo2: Option<String>,
    #[serde(rename = "foto3", default)]
    pub photo3: Option<String>,
    #[serde(rename = "foto4", default)]
    pub photo4: Option<String>,
    #[serde(rename = "data_data")]
    pub submitted_on: NaiveDate,
    #[serde(rename = "data_hora", deserialize_with = "deserialize_time")]
    pub submitted_at: NaiveTime,
    #[serde(rename = "data_concelho")]
    pub municipality: String,
    #[serde(rename = "data_freguesia")]
    pub parish: String,
    #[serde(rename = "data_local", default)]
    pub street: Option<String>,
    #[serde(rename = "data_num_porta", default)]
    pub door_number: Option<String>,
    #[serde(rename = "data_coord_latit", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "data_coord_long", default)]
    pub longitude: Option<f64>,
    #[serde(rename = "anomaly1", default)]
    pub main_anomaly: Option<String>,
    #[serde(rename = "anomaly2", default)]
    pub secondary_anomaly: Option<String>,
    pub anomaly_code: String,
    #[serde(rename = "email_concelho", default)]
    pub municipality_email: Option<String>,
    #[serde(rename = "email_freguesia", default)]
    pub parish_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolvedStatus {
    #[serde(rename = "uuid")]
    pub device_id: String,
    #[serde(rename = "table_row_uuid")]
    pub row_id: String,
    #[serde(rename = "ocorrencia_resolvida", deserialize_with = "deserialize_flag")]
    pub resolved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryRef {
    #[serde(rename = "uuid")]
    pub device_id: String,
    #[serde(rename = "table_row_uuid")]
    pub row_id: String,
}

/// Flags arrive either as JSON booleans or as 0/1.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Accepts `HH:MM` as sent by the app, or `HH:MM:SS`.
fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(serde::de::Error::custom)
}

/// Returned to the device after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub table_row_uuid: String,
    pub chave_confirmacao_ocorrencia_resolvida_por_op: String,
    pub chave_confirmacao_ocorrencia_resolvida_por_municipio: Option<String>,
    pub chave_confirmacao_ocorrencia_resolvida_por_freguesia: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Submitted(SubmissionReceipt),
    Updated { rows: usize },
}

impl CommandReply {
    /// JSON body for the reply. Updates answer with an empty object.
    pub fn to_json(&self) -> Value {
        match self {
            CommandReply::Submitted(receipt) => {
                serde_json::to_value(receipt).unwrap_or_else(|_| Value::Object(Default::default()))
            }
            CommandReply::Updated { .. } => Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Live occurrences of one device.
    Device(String),
    /// A single occurrence by row id, whatever its state.
    Occurrence(String),
    /// Every live, unresolved production occurrence.
    OpenMap,
}

/// Turns device commands and queries into repository operations.
pub struct OccurrenceService {
    repository: Arc<dyn OccurrenceRepository>,
}

impl OccurrenceService {
    pub fn new(repository: Arc<dyn OccurrenceRepository>) -> Self {
        OccurrenceService { repository }
    }

    pub fn handle(&self, command: ServerCommand) -> Result<CommandReply, Error> {
        debug!("Handling command {:?}", command);
        match command {
            ServerCommand::SubmitNewEntry(submission) => self.submit(submission).map(CommandReply::Submitted),
            ServerCommand::SetSolvedStatus(status) => {
                let rows = self.repository.set_resolved_by_user(
                    &status.device_id,
                    &status.row_id,
                    status.resolved,
                )?;
                Ok(CommandReply::Updated { rows })
            }
            ServerCommand::SetDeletedByAdmin(entry) => {
                let rows = self
                    .repository
                    .mark_deleted_by_admin(&entry.device_id, &entry.row_id)?;
                Ok(CommandReply::Updated { rows })
            }
            ServerCommand::SetDeletedByUser(entry) => {
                let rows = self
                    .repository
                    .mark_deleted_by_user(&entry.device_id, &entry.row_id)?;
                Ok(CommandReply::Updated { rows })
            }
        }
    }

    fn submit(&self, submission: Submission) -> Result<SubmissionReceipt, Error> {
        if submission.device_id.trim().is_empty() {
            return Err(Error::BadRequest("device uuid is empty".to_string()));
        }

        let municipality_email = provided(submission.municipality_email);
        let parish_email = provided(submission.parish_email);

        let occurrence = NewOccurrence {
            row_id: Uuid::new_v4().to_string(),
            device_id: submission.device_id,
            is_production: submission.is_production,
            photo1: submission.photo1,
            photo2: submission.photo2,
            photo3: submission.photo3,
            photo4: submission.photo4,
            submitted_on: submission.submitted_on,
            submitted_at: submission.submitted_at,
            municipality: submission.municipality,
            parish: submission.parish,
            street: submission.street,
            door_number: submission.door_number,
            latitude: submission.latitude,
            longitude: submission.longitude,
            main_anomaly: submission.main_anomaly,
            secondary_anomaly: submission.secondary_anomaly,
            anomaly_code: submission.anomaly_code,
            submitter_key: generate_key(),
            municipality_key: municipality_email.as_ref().map(|_| generate_key()),
            parish_key: parish_email.as_ref().map(|_| generate_key()),
            municipality_email,
            parish_email,
        };

        self.repository.insert(&occurrence)?;
        info!("New occurrence {} stored", occurrence.row_id);

        Ok(SubmissionReceipt {
            table_row_uuid: occurrence.row_id,
            chave_confirmacao_ocorrencia_resolvida_por_op: occurrence.submitter_key,
            chave_confirmacao_ocorrencia_resolvida_por_municipio: occurrence.municipality_key,
            chave_confirmacao_ocorrencia_resolvida_por_freguesia: occurrence.parish_key,
        })
    }

    pub fn history(&self, query: &HistoryQuery) -> Result<Vec<PublicOccurrence>, Error> {
        let records = match query {
            HistoryQuery::Device(device_id) => self.repository.history_for_device(device_id)?,
            HistoryQuery::Occurrence(row_id) => self.repository.find_by_row_id(row_id)?,
            HistoryQuery::OpenMap => self.repository.open_production()?,
        };
        debug!("{} entries for {:?}", records.len(), query);
        Ok(records.iter().map(PublicOccurrence::from).collect())
    }

    /// Handle a click on an authority's emailed confirmation link.
    pub fn confirm_resolution(&self, authority: &str, row_id: &str, key: &str) -> Result<Authority, Error> {
        let authority: Authority = authority.parse().map_err(Error::BadRequest)?;
        if row_id.is_empty() || key.is_empty() {
            return Err(Error::BadRequest("not enough info".to_string()));
        }

        let mut matches = self.repository.find_by_row_id(row_id)?;
        if matches.len() != 1 {
            return Err(Error::InvalidEntry);
        }
        let entry = matches.remove(0);

        if entry.key_for(authority) != Some(key) {
            return Err(Error::WrongKey);
        }

        self.repository.set_resolved_by_authority(&entry.row_id, authority)?;
        info!("Entry {} marked as solved by {}", entry.row_id, authority);
        Ok(authority)
    }
}

fn provided(email: Option<String>) -> Option<String> {
    email.filter(|e| !e.trim().is_empty())
}

fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()[..KEY_LENGTH].to_string()
}
