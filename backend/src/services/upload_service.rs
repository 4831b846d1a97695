use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Public URL prefix the file route is mounted under.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload: {0}")]
    InvalidFile(String),
    #[error("Invalid path")]
    InvalidPath,
    #[error("File not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct StoredFile {
    /// Path relative to the upload directory, `/`-separated.
    pub relative_path: String,
    pub public_path: String,
}

/// Raster formats accepted as thumbnails. Uploads are served same-origin, so
/// scriptable formats such as SVG stay out.
const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

fn is_accepted(mime: &mime_guess::Mime) -> bool {
    ACCEPTED_IMAGE_TYPES.contains(&mime.essence_str())
}

/// Picks the image MIME type of an upload from its declared type, falling back to the
/// file name's extension.
fn image_mime(file_name: Option<&str>, content_type: Option<&str>) -> Option<mime_guess::Mime> {
    let declared = content_type
        .and_then(|ct| ct.parse::<mime_guess::Mime>().ok())
        .filter(is_accepted);
    declared.or_else(|| {
        file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .filter(is_accepted)
    })
}

fn extension_for(mime: &mime_guess::Mime, file_name: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .iter()
                .any(|candidate| candidate.essence_str() == mime.essence_str())
        });
    from_name
        .or_else(|| {
            mime_guess::get_mime_extensions(mime)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// Writes a thumbnail to `<upload_dir>/<slug>/<uuid>.<ext>`. Only image uploads are
/// accepted.
pub async fn store_thumbnail(
    upload_dir: &Path,
    slug: &str,
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<StoredFile, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::InvalidFile("file is empty".to_string()));
    }
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(UploadError::InvalidPath);
    }
    let mime = image_mime(file_name, content_type)
        .ok_or_else(|| UploadError::InvalidFile("only image files are accepted".to_string()))?;

    let file = format!("{}.{}", Uuid::new_v4(), extension_for(&mime, file_name));
    let dir = upload_dir.join(slug);
    fs::create_dir_all(&dir).await?;
    fs::write(dir.join(&file), bytes).await?;

    let relative_path = format!("{slug}/{file}");
    Ok(StoredFile {
        public_path: format!("{UPLOADS_PREFIX}/{relative_path}"),
        relative_path,
    })
}

/// Maps a requested relative path onto the upload directory. Anything but plain path
/// segments (`..`, absolute paths, prefixes) is rejected.
pub fn resolve_upload_path(upload_dir: &Path, requested: &str) -> Result<PathBuf, UploadError> {
    let relative = Path::new(requested.trim_start_matches('/'));
    let mut resolved = upload_dir.to_path_buf();
    let mut segments = 0;
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                segments += 1;
            }
            Component::CurDir => {}
            _ => return Err(UploadError::InvalidPath),
        }
    }
    if segments == 0 {
        return Err(UploadError::InvalidPath);
    }
    Ok(resolved)
}

/// Reads an uploaded file and guesses its MIME type from the extension.
pub async fn read_upload(
    upload_dir: &Path,
    requested: &str,
) -> Result<(Vec<u8>, String), UploadError> {
    let path = resolve_upload_path(upload_dir, requested)?;
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
            return Err(UploadError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((bytes, mime.essence_str().to_string()))
}

/// Deletes a previously stored file given its public path. Missing files are ignored.
pub async fn remove_public_file(upload_dir: &Path, public_path: &str) -> Result<(), UploadError> {
    let Some(relative) = public_path.strip_prefix(UPLOADS_PREFIX) else {
        return Ok(());
    };
    let path = resolve_upload_path(upload_dir, relative)?;
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
