//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod health;
pub mod auth;
pub mod catalog;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod subscriptions;
pub mod downloads;
pub mod webhooks;
pub mod documents;
pub mod gallery;
pub mod links;
pub mod credentials;

use std::collections::HashMap;

use axum::{
    extract::Multipart,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::infrastructure::storage::download_file_name;
use crate::shared::error::AppError;

/// Parse a snowflake id from a path segment.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// File part of a multipart upload
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields plus the `file` part of a multipart form
#[derive(Default)]
pub(crate) struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{}: is required", name)))
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.text(name).as_deref(),
            Some("true" | "1" | "on" | "yes")
        )
    }

    pub fn take_file(&mut self) -> Result<UploadedFile, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::Validation("file: is required".into()))
    }
}

/// Drain a multipart body into an [`UploadForm`].
pub(crate) async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid file upload: {}", e)))?;
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Serve bytes as a file.
pub(crate) fn file_response(
    bytes: Vec<u8>,
    content_type: &str,
    file_name: &str,
    inline: bool,
) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = format!(
        "{}; filename=\"{}\"",
        if inline { "inline" } else { "attachment" },
        download_file_name(file_name)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "order").unwrap(), 42);
        assert!(matches!(
            parse_id("abc", "order"),
            Err(AppError::BadRequest(msg)) if msg == "Invalid order ID"
        ));
    }

    #[test]
    fn test_upload_form_fields() {
        let mut form = UploadForm::default();
        form.fields.insert("title".into(), "  Manual ".into());
        form.fields.insert("is_public".into(), "on".into());
        form.fields.insert("category".into(), "   ".into());

        assert_eq!(form.text("title").as_deref(), Some("Manual"));
        assert!(form.flag("is_public"));
        assert!(!form.flag("missing"));
        assert!(form.required("category").is_err());
        assert!(form.take_file().is_err());
    }

    #[test]
    fn test_file_response_headers() {
        let response = file_response(b"%PDF".to_vec(), "application/pdf", "guide.pdf", false);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"guide.pdf\""
        );
    }
}
