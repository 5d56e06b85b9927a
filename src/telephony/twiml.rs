//! Voice-response document that hands an answered call over to the media stream

const CONNECT_NOTICE: &str = "Please wait while we connect your call to my assistant";

/// Build the XML document returned to telephony when an outgoing call is answered
///
/// The caller hears a short notice, then the call audio is streamed to
/// `wss://<host>/media-stream[/<call_id>]`.
pub fn connect_stream_document(public_host: &str, call_id: Option<&str>) -> String {
    let stream_url = media_stream_url(public_host, call_id);

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response>",
            "<Say>{notice}</Say>",
            r#"<Pause length="1"/>"#,
            "<Connect>",
            r#"<Stream url="{url}"/>"#,
            "</Connect>",
            "</Response>"
        ),
        notice = escape_xml(CONNECT_NOTICE),
        url = escape_xml(&stream_url),
    )
}

pub fn media_stream_url(public_host: &str, call_id: Option<&str>) -> String {
    match call_id.filter(|id| !id.is_empty()) {
        Some(id) => format!("wss://{}/media-stream/{}", public_host, id),
        None => format!("wss://{}/media-stream", public_host),
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
