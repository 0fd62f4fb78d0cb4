use ingest_core::{Error, Result};
use serde_json::{Map, Value};

/// One decoded JSON object, e.g. a day summary or a single trade.
pub type Record = Map<String, Value>;

/// The payload of a single write call.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Single(Record),
    Many(Vec<Record>),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Single(_) => 1,
            Batch::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records in write order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        let (single, many) = match self {
            Batch::Single(record) => (Some(record), &[][..]),
            Batch::Many(records) => (None, records.as_slice()),
        };
        single.into_iter().chain(many.iter())
    }
}

impl From<Record> for Batch {
    fn from(record: Record) -> Self {
        Batch::Single(record)
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Batch::Many(records)
    }
}

impl TryFrom<Value> for Batch {
    type Error = Error;

    /// Objects become `Single`; arrays become `Many`, with nested arrays
    /// flattened in order. Any other value, at any depth, is rejected.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(record) => Ok(Batch::Single(record)),
            Value::Array(values) => {
                let mut records = Vec::with_capacity(values.len());
                flatten_into(values, &mut records)?;
                Ok(Batch::Many(records))
            }
            other => Err(unsupported(other)),
        }
    }
}

fn flatten_into(values: Vec<Value>, out: &mut Vec<Record>) -> Result<()> {
    for value in values {
        match value {
            Value::Object(record) => out.push(record),
            Value::Array(nested) => flatten_into(nested, out)?,
            other => return Err(unsupported(other)),
        }
    }
    Ok(())
}

fn unsupported(value: Value) -> Error {
    Error::DataTypeNotSupported {
        type_name: json_type_name(&value),
        value,
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn object_becomes_single() {
        let batch = Batch::try_from(json!({"date": "2021-01-01"})).unwrap();
        assert_eq!(batch, Batch::Single(record(json!({"date": "2021-01-01"}))));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn nested_arrays_flatten_in_order() {
        let batch = Batch::try_from(json!([{"n": 1}, [{"n": 2}, [{"n": 3}]], {"n": 4}])).unwrap();
        let ns: Vec<i64> = batch
            .records()
            .map(|r| r["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_array_is_an_empty_batch() {
        let batch = Batch::try_from(json!([])).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.records().count(), 0);
    }

    #[test]
    fn scalars_are_rejected_with_their_type() {
        for (value, type_name) in [
            (json!("BTC"), "string"),
            (json!(42), "number"),
            (json!(true), "bool"),
            (json!(null), "null"),
        ] {
            let err = Batch::try_from(value.clone()).unwrap_err();
            assert!(err.to_string().contains(type_name), "{err}");
            match err {
                Error::DataTypeNotSupported { value: rejected, .. } => assert_eq!(rejected, value),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn bad_element_inside_array_is_rejected() {
        let err = Batch::try_from(json!([{"ok": 1}, "oops"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "data type string is not supported for ingestion"
        );
    }
}
