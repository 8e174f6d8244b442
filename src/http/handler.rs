//! Request routing
//!
//! Routes are tried in a fixed order:
//!
//! 1. `/monitor` returns the metrics snapshot as JSON
//! 2. the configured monitor page is served as a file
//! 3. paths under the download prefix resolve through the tier store
//! 4. `POST /upload` stores the body in the tier named by `StorageType`
//! 5. `POST` to a path whose last segment starts with `2` (login) or `3`
//!    (register) goes to the credential store
//! 6. single-character aliases map to fixed pages
//! 7. anything else is a file under the document root

use std::os::unix::fs::PermissionsExt;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::auth::{self, CredentialStore};
use crate::config::StaticConfig;
use crate::error::{Error, Result};
use crate::http::mime;
use crate::http::request::{ByteRange, Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::metrics::ServerMetrics;
use crate::storage::mapped::MappedFile;
use crate::storage::record::ObjectRecord;
use crate::storage::tiers::{Tier, TierStore};

const MONITOR_PATH: &str = "/monitor";
const UPLOAD_PATH: &str = "/upload";

const WELCOME_PAGE: &str = "/welcome.html";
const LOGIN_PAGE: &str = "/log.html";
const LOGIN_ERROR_PAGE: &str = "/logError.html";
const REGISTER_ERROR_PAGE: &str = "/registerError.html";

/// Fixed pages behind the single-character aliases.
fn page_alias(segment: &str) -> Option<&'static str> {
    match segment {
        "0" => Some("/register.html"),
        "1" => Some(LOGIN_PAGE),
        "5" => Some("/picture.html"),
        "6" => Some("/video.html"),
        "7" => Some("/fans.html"),
        "8" => Some("/index.html"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthAction {
    Login,
    Register,
}

pub struct RequestHandler {
    store: Arc<TierStore>,
    metrics: Arc<ServerMetrics>,
    credentials: Arc<dyn CredentialStore>,
    doc_root: PathBuf,
    monitor_page: String,
}

impl RequestHandler {
    pub fn new(
        store: Arc<TierStore>,
        metrics: Arc<ServerMetrics>,
        credentials: Arc<dyn CredentialStore>,
        cfg: &StaticConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            credentials,
            doc_root: cfg.doc_root.clone(),
            monitor_page: format!("/{}", cfg.monitor_page.trim_start_matches('/')),
        }
    }

    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    /// Resolves a parsed request to a response. Never fails: every error is
    /// turned into a status code here.
    pub fn handle(&self, req: &Request, peer: Option<SocketAddr>) -> Response {
        self.metrics.increment_requests();

        let response = self.route(req, peer).with_keep_alive(req.keep_alive());

        info!(
            method = req.method.as_str(),
            path = %req.path,
            status = response.status.as_u16(),
            "Request handled"
        );
        response
    }

    fn route(&self, req: &Request, peer: Option<SocketAddr>) -> Response {
        let path = req.path.as_str();

        if path == MONITOR_PATH {
            return Response::json(self.metrics.to_json());
        }
        if path == self.monitor_page {
            return self.serve_file(path, None);
        }
        if path.starts_with(self.store.download_prefix()) {
            return self.download(req);
        }
        if req.method == Method::POST && path == UPLOAD_PATH {
            return self.upload(req);
        }

        let segment = path.rsplit('/').next().unwrap_or_default();
        if req.method == Method::POST {
            let action = match segment.as_bytes().first() {
                Some(b'2') => Some(AuthAction::Login),
                Some(b'3') => Some(AuthAction::Register),
                _ => None,
            };
            if let Some(action) = action {
                return self.authenticate(req, peer, action);
            }
        }
        if let Some(page) = page_alias(segment) {
            return self.serve_file(page, None);
        }

        self.serve_file(path, req.range())
    }

    fn download(&self, req: &Request) -> Response {
        let key = match urlencoding::decode(&req.path) {
            Ok(key) => key.into_owned(),
            Err(_) => return Response::bad_request(),
        };

        match self.store.open(&key) {
            Ok(download) => {
                let etag = download.record.etag();
                match file_response(download.file, "application/octet-stream", req.range()) {
                    Some(builder) => builder
                        .header("ETag", etag)
                        .header("Accept-Ranges", "bytes")
                        .build(),
                    None => Response::bad_request(),
                }
            }
            Err(e) => error_response(&key, e),
        }
    }

    fn upload(&self, req: &Request) -> Response {
        match self.store_upload(req) {
            Ok(_) => Response::json(
                serde_json::json!({
                    "status": "success",
                    "message": "File uploaded successfully",
                })
                .to_string(),
            ),
            Err(e) => {
                let status = e.status();
                if e.is_client_error() {
                    debug!(error = %e, "Upload rejected");
                } else {
                    error!(error = %e, "Upload failed");
                }
                ResponseBuilder::new(status)
                    .header("Content-Type", "application/json")
                    .body(
                        serde_json::json!({ "status": "error", "message": e.to_string() })
                            .to_string(),
                    )
                    .build()
            }
        }
    }

    fn store_upload(&self, req: &Request) -> Result<ObjectRecord> {
        let filename = req
            .upload_filename()
            .ok_or_else(|| Error::InvalidUpload("missing or undecodable FileName header".into()))?;
        let tier: Tier = req
            .storage_type()
            .ok_or_else(|| Error::InvalidUpload("missing StorageType header".into()))?
            .parse()?;
        self.store.store(&filename, tier, &req.body)
    }

    fn authenticate(&self, req: &Request, peer: Option<SocketAddr>, action: AuthAction) -> Response {
        let credentials = auth::parse_form(&req.body);

        match action {
            AuthAction::Login => match credentials {
                Some(c) if self.credentials.verify(&c.user, &c.password) => {
                    info!(user = %c.user, "Login succeeded");
                    let (ip, port) = peer
                        .map(|p| (p.ip().to_string(), p.port().to_string()))
                        .unwrap_or_default();
                    let query = url::form_urlencoded::Serializer::new(String::new())
                        .append_pair("ip", &ip)
                        .append_pair("port", &port)
                        .finish();
                    Response::redirect(format!("{WELCOME_PAGE}?{query}"))
                }
                _ => self.serve_file(LOGIN_ERROR_PAGE, None),
            },
            AuthAction::Register => match credentials {
                Some(c) if self.credentials.register(&c.user, &c.password) => {
                    info!(user = %c.user, "User registered");
                    self.serve_file(LOGIN_PAGE, None)
                }
                _ => self.serve_file(REGISTER_ERROR_PAGE, None),
            },
        }
    }

    /// Serves `path` relative to the document root.
    fn serve_file(&self, path: &str, range: Option<ByteRange>) -> Response {
        let full = match self.resolve_static(path) {
            Ok(full) => full,
            Err(e) => return error_response(path, e),
        };

        let file = match MappedFile::open(&full) {
            Ok(file) => file,
            Err(e) => return error_response(path, e),
        };
        if file.is_empty() {
            return Response::empty_html();
        }

        match file_response(file, mime::from_path(&full), range) {
            Some(builder) => builder.build(),
            None => Response::bad_request(),
        }
    }

    fn resolve_static(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::Forbidden(path.to_string()));
        }

        let full = self.doc_root.join(relative);
        let meta = std::fs::metadata(&full).map_err(|_| Error::NotFound(path.to_string()))?;
        if meta.permissions().mode() & 0o004 == 0 {
            return Err(Error::Forbidden(path.to_string()));
        }
        if meta.is_dir() {
            return Err(Error::IsDirectory(path.to_string()));
        }
        Ok(full)
    }
}

/// Builds a 200, or a 206 when `range` is satisfiable. `None` means the
/// range selects nothing in the file.
fn file_response(
    file: MappedFile,
    content_type: &str,
    range: Option<ByteRange>,
) -> Option<ResponseBuilder> {
    let total = file.len();

    let Some(range) = range else {
        return Some(
            ResponseBuilder::new(StatusCode::Ok)
                .header("Content-Type", content_type)
                .file_body(file, 0, total),
        );
    };

    let (start, end) = range.resolve(total as u64)?;
    let (start, end) = (start as usize, end as usize);
    Some(
        ResponseBuilder::new(StatusCode::PartialContent)
            .header("Content-Type", content_type)
            .header("Content-Range", format!("bytes {start}-{end}/{total}"))
            .file_body(file, start, end - start + 1),
    )
}

fn error_response(target: &str, e: Error) -> Response {
    if e.is_client_error() {
        debug!(resource = %target, error = %e, "Request refused");
    } else {
        error!(resource = %target, error = %e, "Request failed");
    }
    Response::error(e.status())
}
