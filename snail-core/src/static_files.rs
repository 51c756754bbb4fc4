//! Static files found by convention resolution.
//!
//! The router asks [`StaticFiles::resolve`] whether a normalized request path
//! names a real file under the configured root; the dispatcher then serves it
//! with [`StaticFiles::serve`], bypassing middleware. Paths that escape the
//! root (through `..` or symlinks) never resolve.

use crate::{Error, HttpResponse, Result};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Cache policy attached to served files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// `no-cache, no-store, must-revalidate`
    NoCache,
    /// `public, max-age=N`
    Public(Duration),
    /// `public, max-age=31536000, immutable`
    Immutable,
}

impl CacheStrategy {
    pub fn to_header_value(&self) -> String {
        match self {
            CacheStrategy::NoCache => "no-cache, no-store, must-revalidate".to_string(),
            CacheStrategy::Public(duration) => format!("public, max-age={}", duration.as_secs()),
            CacheStrategy::Immutable => "public, max-age=31536000, immutable".to_string(),
        }
    }
}

/// File classification used for content type and cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    JavaScript,
    Stylesheet,
    Image,
    Font,
    Html,
    Json,
    Text,
    Other,
}

impl FileType {
    pub fn from_path(path: &Path) -> Self {
        match extension(path) {
            Some("js") | Some("mjs") => FileType::JavaScript,
            Some("css") => FileType::Stylesheet,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("svg")
            | Some("webp") | Some("ico") => FileType::Image,
            Some("woff") | Some("woff2") | Some("ttf") | Some("otf") => FileType::Font,
            Some("html") | Some("htm") => FileType::Html,
            Some("json") => FileType::Json,
            Some("txt") | Some("xml") | Some("csv") => FileType::Text,
            _ => FileType::Other,
        }
    }

    pub fn mime_type(&self, path: &Path) -> &'static str {
        match self {
            FileType::JavaScript => "application/javascript",
            FileType::Stylesheet => "text/css",
            FileType::Image => match extension(path) {
                Some("png") => "image/png",
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("gif") => "image/gif",
                Some("svg") => "image/svg+xml",
                Some("webp") => "image/webp",
                Some("ico") => "image/x-icon",
                _ => "image/*",
            },
            FileType::Font => match extension(path) {
                Some("woff") => "font/woff",
                Some("woff2") => "font/woff2",
                Some("ttf") => "font/ttf",
                Some("otf") => "font/otf",
                _ => "font/*",
            },
            FileType::Html => "text/html; charset=utf-8",
            FileType::Json => "application/json",
            FileType::Text => match extension(path) {
                Some("xml") => "application/xml",
                Some("csv") => "text/csv",
                _ => "text/plain; charset=utf-8",
            },
            FileType::Other => "application/octet-stream",
        }
    }

    pub fn cache_strategy(&self) -> CacheStrategy {
        match self {
            FileType::Html | FileType::Json => CacheStrategy::NoCache,
            FileType::Font => CacheStrategy::Immutable,
            FileType::Image => CacheStrategy::Public(Duration::from_secs(86400)),
            _ => CacheStrategy::Public(Duration::from_secs(3600)),
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Root directory for static files.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalized request path to an existing file under the root.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let root = self.root.canonicalize().ok()?;
        let candidate = root.join(relative).canonicalize().ok()?;
        (candidate.starts_with(&root) && candidate.is_file()).then_some(candidate)
    }

    pub fn exists(&self, request_path: &str) -> bool {
        self.resolve(request_path).is_some()
    }

    /// Read a resolved file into a response.
    pub async fn serve(path: &Path) -> Result<HttpResponse> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            Error::Internal(format!("failed to read {}: {}", path.display(), e))
        })?;

        let file_type = FileType::from_path(path);
        Ok(HttpResponse::ok()
            .with_header("Content-Type", file_type.mime_type(path))
            .with_header(
                "Cache-Control",
                &file_type.cache_strategy().to_header_value(),
            )
            .with_body(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path(Path::new("app.js")), FileType::JavaScript);
        assert_eq!(FileType::from_path(Path::new("site.css")), FileType::Stylesheet);
        assert_eq!(FileType::from_path(Path::new("logo.png")), FileType::Image);
        assert_eq!(FileType::from_path(Path::new("robots.txt")), FileType::Text);
        assert_eq!(FileType::from_path(Path::new("archive.bin")), FileType::Other);
    }

    #[test]
    fn test_cache_strategy_headers() {
        assert_eq!(
            CacheStrategy::Public(Duration::from_secs(3600)).to_header_value(),
            "public, max-age=3600"
        );
        assert_eq!(
            FileType::Font.cache_strategy().to_header_value(),
            "public, max-age=31536000, immutable"
        );
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
        let files = StaticFiles::new(dir.path());

        assert!(files.exists("robots.txt"));
        assert!(files.exists("/robots.txt"));
        assert!(!files.exists("missing.txt"));
        assert!(!files.exists("../robots.txt"));
        assert!(!files.exists("/"));
    }

    #[tokio::test]
    async fn test_serve_sets_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let files = StaticFiles::new(dir.path());

        let path = files.resolve("style.css").unwrap();
        let res = StaticFiles::serve(&path).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), Some("text/css"));
        assert_eq!(res.text(), "body{}");
    }
}
