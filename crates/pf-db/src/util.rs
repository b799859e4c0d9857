use chrono::{DateTime, Utc};
use pf_core::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn sql_err(err: rusqlite::Error) -> StorageError {
    StorageError::Backend {
        message: err.to_string(),
    }
}

pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn from_rfc3339(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Backend {
            message: format!("invalid timestamp: {value}"),
        })
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|err| StorageError::Backend {
        message: format!("json encode failed: {err}"),
    })
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, StorageError> {
    serde_json::from_str(value).map_err(|err| StorageError::Backend {
        message: format!("json decode failed: {err}"),
    })
}

pub fn encode_enum<T: Serialize>(value: &T) -> Result<String, StorageError> {
    let json = serde_json::to_value(value).map_err(|err| StorageError::Backend {
        message: format!("json encode failed: {err}"),
    })?;
    match json {
        Value::String(value) => Ok(value),
        other => Err(StorageError::Backend {
            message: format!("invalid enum value: {other}"),
        }),
    }
}

pub fn decode_enum<T: DeserializeOwned>(value: &str) -> Result<T, StorageError> {
    serde_json::from_value(Value::String(value.to_string())).map_err(|err| {
        StorageError::Backend {
            message: format!("json decode failed: {err}"),
        }
    })
}

pub fn id_err(err: pf_core::types::ids::IdError) -> StorageError {
    StorageError::Backend {
        message: err.to_string(),
    }
}
