//! Conversion between records, bind parameters, rows and cache bytes.
//!
//! A storable type opts in by implementing [`Record`]; serde does the field
//! mapping, so column names are the serialized field names.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::query::builder::INSTANCE_ID_PARAM;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::PgRow;

pub trait Record: Serialize + DeserializeOwned {
    type Id: Serialize;

    fn instance_id(&self) -> Self::Id;

    /// Bind values for the key predicate of [`QueryBuilder`](crate::query::QueryBuilder).
    ///
    /// An id that serializes to an object (a composite key struct) binds each
    /// field under its own name. Anything else binds as `:instance_id`.
    fn id_params(id: &Self::Id) -> DbResult<Map<String, JsonValue>> {
        match serde_json::to_value(id)? {
            JsonValue::Object(fields) => Ok(fields),
            value => {
                let mut params = Map::new();
                params.insert(INSTANCE_ID_PARAM.to_string(), value);
                Ok(params)
            }
        }
    }
}

/// Serialize a record into named bind values.
pub fn to_params<T: Serialize>(instance: &T) -> DbResult<Map<String, JsonValue>> {
    match serde_json::to_value(instance)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(DbError::serialization(format!(
            "Record must serialize to an object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn from_json_map<T: DeserializeOwned>(map: Map<String, JsonValue>) -> DbResult<T> {
    Ok(serde_json::from_value(JsonValue::Object(map))?)
}

pub fn from_row<T: DeserializeOwned>(row: &PgRow) -> DbResult<T> {
    from_json_map(row.to_json_map())
}

pub fn from_rows<T: DeserializeOwned>(rows: &[PgRow]) -> DbResult<Vec<T>> {
    rows.iter().map(from_row::<T>).collect()
}

/// Encode a value (or a list of them) for a byte-oriented cache.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> DbResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode bytes produced by [`encode`]. A cache miss (`None`) decodes to `None`.
pub fn decode<T: DeserializeOwned>(bytes: Option<&[u8]>) -> DbResult<Option<T>> {
    bytes
        .map(|b| serde_json::from_slice(b).map_err(DbError::from))
        .transpose()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
