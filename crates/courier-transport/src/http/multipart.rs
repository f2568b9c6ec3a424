//! `multipart/form-data` encoding for requests that carry files.

use courier_core::{InputFile, Object, TransportError, TransportResult, Value};
use reqwest::multipart::{Form, Part};

const JSON_MIME: &str = "application/json";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// How a single non-file field goes on the wire.
#[derive(Debug, PartialEq)]
pub(crate) enum FieldEncoding {
    /// A plain text field.
    Text(String),
    /// A part with `Content-Type: application/json`.
    Json(String),
}

/// Encodes one field. `Null` is omitted.
pub(crate) fn encode_field(value: &Value) -> TransportResult<Option<FieldEncoding>> {
    let encoding = match value {
        Value::Null => return Ok(None),
        Value::String(s) => FieldEncoding::Text(s.clone()),
        Value::Int(i) => FieldEncoding::Text(i.to_string()),
        Value::Float(f) => FieldEncoding::Text(format!("{f:.6}")),
        Value::Bool(b) => FieldEncoding::Text(b.to_string()),
        Value::Array(_) | Value::Object(_) => FieldEncoding::Json(
            serde_json::to_string(value).map_err(|e| TransportError::Encode(e.to_string()))?,
        ),
    };
    Ok(Some(encoding))
}

/// Builds the form for `fields` followed by `files`, in order.
pub(crate) fn build_form(fields: Object, files: Vec<(String, InputFile)>) -> TransportResult<Form> {
    let mut form = Form::new();

    for (name, value) in fields {
        form = match encode_field(&value)? {
            None => form,
            Some(FieldEncoding::Text(text)) => form.text(name, text),
            Some(FieldEncoding::Json(json)) => {
                let part = Part::text(json)
                    .mime_str(JSON_MIME)
                    .map_err(|e| TransportError::Encode(e.to_string()))?;
                form.part(name, part)
            }
        };
    }

    for (field, file) in files {
        let part = Part::bytes(file.data().to_vec())
            .file_name(file.name().to_string())
            .mime_str(OCTET_STREAM_MIME)
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        form = form.part(field, part);
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<FieldEncoding> {
        Some(FieldEncoding::Text(s.to_string()))
    }

    #[test]
    fn test_scalar_fields() {
        assert_eq!(encode_field(&Value::from("hello")).unwrap(), text("hello"));
        assert_eq!(encode_field(&Value::Int(-42)).unwrap(), text("-42"));
        assert_eq!(encode_field(&Value::Float(1.5)).unwrap(), text("1.500000"));
        assert_eq!(encode_field(&Value::Bool(true)).unwrap(), text("true"));
        assert_eq!(encode_field(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_compound_fields_are_json() {
        let markup = Object::new().with("inline_keyboard", Vec::<Value>::new());
        assert_eq!(
            encode_field(&Value::Object(markup)).unwrap(),
            Some(FieldEncoding::Json(r#"{"inline_keyboard":[]}"#.to_string()))
        );
        assert_eq!(
            encode_field(&Value::from(vec![1i64, 2])).unwrap(),
            Some(FieldEncoding::Json("[1,2]".to_string()))
        );
    }

    #[test]
    fn test_build_form() {
        let fields = Object::new()
            .with("chat_id", 7)
            .with("caption", "cat")
            .with("reply_markup", Value::Null);
        let photo = InputFile::from_bytes("cat.jpg", vec![0xff, 0xd8]).unwrap();
        let form = build_form(fields, vec![("photo".to_string(), photo)]).unwrap();
        assert!(!form.boundary().is_empty());
    }
}
