//! Upload classification and payload decoding

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use super::content::ContentKind;
use crate::error::{ChatError, ChatResult};

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Decide which content variant an uploaded file becomes
///
/// The declared MIME type wins; an empty one is guessed from the file name.
/// Returns the kind together with the effective MIME type.
pub fn classify_upload(declared_mime: &str, file_name: &str) -> ChatResult<(ContentKind, String)> {
    let mime = match declared_mime.trim() {
        "" => mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or_default()
            .to_string(),
        declared => declared.to_ascii_lowercase(),
    };

    let kind = if mime == DOCX_MIME || file_name.to_ascii_lowercase().ends_with(".docx") {
        ContentKind::DocxText
    } else if mime.starts_with("image/") {
        ContentKind::Image
    } else if mime == "video/mp4" {
        ContentKind::Video
    } else if mime.starts_with("audio/") {
        ContentKind::Audio
    } else if mime == "application/pdf" {
        ContentKind::Pdf
    } else {
        let shown = if mime.is_empty() { "unknown type" } else { mime.as_str() };
        return Err(ChatError::UnsupportedUpload(format!("{} ({})", file_name, shown)));
    };

    Ok((kind, mime))
}

/// Plain text of a .docx body, paragraphs joined by spaces
pub fn extract_docx_text(bytes: &[u8]) -> ChatResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ChatError::InvalidDocument(format!("missing word/document.xml: {}", e)))?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    let mut content = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ChatError::InvalidDocument(format!("XML decode error: {}", err)))?;
                content.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" if !content.is_empty() && !content.ends_with(' ') => content.push(' '),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChatError::InvalidDocument(format!("XML parsing error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(content.trim_end().to_string())
}

/// Decode an image and return the MIME type of its actual format
pub fn decode_image(bytes: &[u8]) -> ChatResult<&'static str> {
    let format = image::guess_format(bytes).map_err(|e| ChatError::InvalidImage(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ChatError::InvalidImage(e.to_string()))?;
    tracing::debug!(
        "Decoded {:?} image {}x{}",
        format,
        decoded.width(),
        decoded.height()
    );
    Ok(format.to_mime_type())
}
