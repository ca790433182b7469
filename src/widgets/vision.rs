use base64::{ engine::general_purpose::STANDARD as BASE64, Engine as _ };
use thiserror::Error;

use crate::llm::ImageMime;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type '{0}', upload a JPG or PNG image")]
    UnsupportedType(String),
    #[error("image data is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("uploaded file is empty")]
    Empty,
}

/// A decoded image upload ready to be sent to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn decode(file_name: &str, data: &str) -> Result<Self, UploadError> {
        let mime = mime_for_file_name(file_name)?;
        // Browsers hand out data URLs from FileReader; accept those as well.
        let payload = match data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let bytes = BASE64.decode(payload.trim())?;
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        Ok(Self { file_name: file_name.to_string(), mime, bytes })
    }
}

/// Only JPEG and PNG are accepted. PNG is chosen by extension, everything else
/// accepted is sent as JPEG.
pub fn mime_for_file_name(file_name: &str) -> Result<ImageMime, UploadError> {
    let lower = file_name.to_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "png" => Ok(ImageMime::Png),
        "jpg" | "jpeg" => Ok(ImageMime::Jpeg),
        _ => Err(UploadError::UnsupportedType(file_name.to_string())),
    }
}

pub fn analysis_error_message(err: &dyn std::fmt::Display) -> String {
    format!("Error analyzing image: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_mime_from_extension() {
        assert_eq!(mime_for_file_name("Notes.PNG").unwrap(), ImageMime::Png);
        assert_eq!(mime_for_file_name("photo.jpeg").unwrap(), ImageMime::Jpeg);
        assert_eq!(mime_for_file_name("photo.JPG").unwrap(), ImageMime::Jpeg);
        assert!(matches!(mime_for_file_name("scan.gif"), Err(UploadError::UnsupportedType(_))));
        assert!(matches!(mime_for_file_name("noext"), Err(UploadError::UnsupportedType(_))));
    }

    #[test]
    fn decodes_plain_and_data_url_payloads() {
        let plain = ImageUpload::decode("a.png", "AQID").unwrap();
        assert_eq!(plain.bytes, vec![1, 2, 3]);

        let data_url = ImageUpload::decode("a.jpg", "data:image/jpeg;base64,AQID").unwrap();
        assert_eq!(data_url.bytes, vec![1, 2, 3]);
        assert_eq!(data_url.mime, ImageMime::Jpeg);
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(matches!(ImageUpload::decode("a.png", "not base64!"), Err(UploadError::InvalidEncoding(_))));
        assert!(matches!(ImageUpload::decode("a.png", ""), Err(UploadError::Empty)));
    }

    #[test]
    fn formats_tool_panel_error() {
        assert_eq!(analysis_error_message(&"timeout"), "Error analyzing image: timeout");
    }
}
