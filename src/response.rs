//! JSON:API shaped documents printed by the `intake` binary.

use serde::Serialize;

/// Resource type used for every stored file
pub const UPLOADS_RESOURCE_TYPE: &str = "uploads";

const UPLOAD_ERROR_CODE: &str = "file.upload.error";
const UPLOAD_ERROR_TITLE: &str = "Error occured while processing the file upload";
const NO_UPLOAD_CODE: &str = "file.upload.none";
const NO_UPLOAD_TITLE: &str = "No file uploaded";

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Document {
    Resource { data: Resource },
    Collection { data: Vec<Resource> },
    Meta { meta: PathMeta },
    Errors { errors: Vec<ApiError> },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub attributes: UploadAttributes,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UploadAttributes {
    pub name: String,
    pub mime: Option<String>,
    pub size: u64,
    pub path: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PathMeta {
    pub path: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ApiError {
    pub status: String,
    pub code: &'static str,
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Resource {
    pub fn upload(file: &intake_files::StoredFile, display_path: String) -> Self {
        Self {
            kind: UPLOADS_RESOURCE_TYPE,
            id: file.name().to_owned(),
            attributes: UploadAttributes {
                name: file.name().to_owned(),
                mime: file.media_type().map(str::to_owned),
                size: file.size_bytes(),
                path: display_path,
            },
        }
    }
}

impl Document {
    /// Error document for a failed intake, promotion or lookup
    pub fn upload_error(detail: impl Into<String>) -> Self {
        Self::Errors {
            errors: vec![ApiError {
                status: "400".into(),
                code: UPLOAD_ERROR_CODE,
                title: UPLOAD_ERROR_TITLE,
                detail: Some(detail.into()),
            }],
        }
    }

    /// Error document for a request that carried no file at all
    pub fn no_upload() -> Self {
        Self::Errors {
            errors: vec![ApiError {
                status: "400".into(),
                code: NO_UPLOAD_CODE,
                title: NO_UPLOAD_TITLE,
                detail: None,
            }],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Errors { .. })
    }
}
