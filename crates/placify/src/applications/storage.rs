use std::path::Path;

use super::domain::{ApplicationKey, ResumeRef};

pub const MAX_COVER_LETTER_CHARS: usize = 2000;
pub const DEFAULT_MAX_RESUME_BYTES: u64 = 5 * 1024 * 1024;

const DOC_MIME: &str = "application/msword";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Raw resume file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ResumeUpload {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Declared MIME type, or a guess from the file name when the client sent
    /// nothing useful.
    pub fn effective_mime(&self) -> Option<mime::Mime> {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|raw| raw.parse::<mime::Mime>().ok())
            .filter(|mime| *mime != mime::APPLICATION_OCTET_STREAM);

        declared.or_else(|| mime_guess::from_path(Path::new(&self.file_name)).first())
    }
}

/// Input validation failures reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("resume file is required")]
    MissingResume,
    #[error("resume file is empty")]
    EmptyResume,
    #[error("resume exceeds the {limit} byte limit ({size} bytes)")]
    ResumeTooLarge { size: u64, limit: u64 },
    #[error("resume must be a PDF, DOC, or DOCX file (got {0})")]
    DisallowedFileType(String),
    #[error("cover letter exceeds 2000 characters")]
    CoverLetterTooLong,
    #[error("malformed identifier: {0}")]
    MalformedId(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Limits applied to incoming resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_resume_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_resume_bytes: DEFAULT_MAX_RESUME_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, upload: &ResumeUpload) -> Result<(), ValidationError> {
        if upload.bytes.is_empty() {
            return Err(ValidationError::EmptyResume);
        }

        let size = upload.size_bytes();
        if size > self.max_resume_bytes {
            return Err(ValidationError::ResumeTooLarge {
                size,
                limit: self.max_resume_bytes,
            });
        }

        match upload.effective_mime() {
            Some(mime) if is_allowed(&mime) => Ok(()),
            Some(mime) => Err(ValidationError::DisallowedFileType(mime.to_string())),
            None => Err(ValidationError::DisallowedFileType(
                upload.file_name.clone(),
            )),
        }
    }
}

fn is_allowed(mime: &mime::Mime) -> bool {
    *mime == mime::APPLICATION_PDF
        || mime.essence_str() == DOC_MIME
        || mime.essence_str() == DOCX_MIME
}

pub fn validate_cover_letter(cover_letter: Option<&str>) -> Result<(), ValidationError> {
    match cover_letter {
        Some(text) if text.chars().count() > MAX_COVER_LETTER_CHARS => {
            Err(ValidationError::CoverLetterTooLong)
        }
        _ => Ok(()),
    }
}

/// Blob storage seam for resumes. Implementations return the public location.
pub trait ResumeStore: Send + Sync {
    fn store(&self, key: &ApplicationKey, upload: &ResumeUpload)
        -> Result<ResumeRef, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("resume storage unavailable: {0}")]
    Unavailable(String),
    #[error("resume upload rejected: {0}")]
    Rejected(String),
}
