use super::service::DownloadFile;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

/// Streams a compressed file as an attachment. The download lease travels
/// with the body stream and is released when the response is dropped.
pub fn attachment_response(download: DownloadFile) -> Response {
    let DownloadFile {
        file,
        len,
        file_name,
        lease,
    } = download;

    let content_type = mime_guess::from_path(&file_name).first_or_octet_stream();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _lease = &lease;
        chunk
    });

    let disposition = HeaderValue::from_str(&content_disposition(&file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// ASCII fallback in `filename`, exact UTF-8 name in `filename*` (RFC 5987).
fn content_disposition(file_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        header_safe_file_name(file_name),
        urlencoding::encode(file_name)
    )
}

/// Keeps printable ASCII and replaces characters that would break the
/// quoted `filename` parameter.
fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
