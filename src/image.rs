use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tokio::fs;

/// Largest image the API accepts (5MB)
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Image file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("Image too large: {size} bytes (max {max} bytes): {}", .path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Failed to read image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl MediaType {
    /// Candidates tried in order by the fallback policy.
    pub const FALLBACK_ORDER: [MediaType; 3] = [MediaType::Jpeg, MediaType::Png, MediaType::Gif];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }

    /// Detect the format from the file signature.
    pub fn sniff(data: &[u8]) -> Option<MediaType> {
        match data {
            [0xFF, 0xD8, 0xFF, ..] => Some(MediaType::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(MediaType::Png),
            [b'G', b'I', b'F', b'8', ..] => Some(MediaType::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Some(MediaType::Webp)
            }
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw image bytes attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub source: PathBuf,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(source: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::sniff(&self.data)
    }
}

/// Resolve a user-supplied path: trims whitespace, expands a leading `~`
/// and makes relative paths absolute against the current directory.
pub fn sanitize_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path_buf = Path::new(path);
    if path_buf.is_relative() {
        if let Ok(current_dir) = std::env::current_dir() {
            return current_dir.join(path_buf);
        }
    }

    path_buf.to_path_buf()
}

/// Read an image from disk, rejecting missing, empty and oversized files.
pub async fn load_image(path: &str) -> Result<ImageAttachment, ImageError> {
    let resolved = sanitize_path(path);

    let metadata = match fs::metadata(&resolved).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(ImageError::NotFound(PathBuf::from(path))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ImageError::NotFound(PathBuf::from(path)))
        }
        Err(source) => return Err(ImageError::Io { path: resolved, source }),
    };

    if metadata.len() > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge {
            path: resolved,
            size: metadata.len(),
            max: MAX_IMAGE_SIZE,
        });
    }

    let data = fs::read(&resolved).await.map_err(|source| ImageError::Io {
        path: resolved.clone(),
        source,
    })?;

    if data.is_empty() {
        return Err(ImageError::Empty(resolved));
    }

    tracing::debug!("Read image {} ({} bytes)", resolved.display(), data.len());
    Ok(ImageAttachment::new(resolved, data))
}
