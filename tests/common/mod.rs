//! Shared helpers: a scripted in-memory socket and a handler wired to
//! scratch directories.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tierserve::auth::MemoryCredentialStore;
use tierserve::config::{StaticConfig, StorageConfig};
use tierserve::http::handler::RequestHandler;
use tierserve::metrics::ServerMetrics;
use tierserve::server::socket::Socket;
use tierserve::storage::codec::Format;
use tierserve::storage::index::StorageIndex;
use tierserve::storage::tiers::TierStore;

pub enum ReadStep {
    Data(Vec<u8>),
    WouldBlock,
    Eof,
    Fail,
}

pub enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    WouldBlock,
    Fail,
}

/// Socket whose reads and write capacity follow a script. With an empty
/// script reads would-block and writes accept everything.
pub struct ScriptedSocket {
    reads: Mutex<VecDeque<ReadStep>>,
    writes: Mutex<VecDeque<WriteStep>>,
    written: Mutex<Vec<u8>>,
    peer: SocketAddr,
}

impl ScriptedSocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            reads: Mutex::new(VecDeque::new()),
            writes: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            peer: "127.0.0.1:5555".parse().unwrap(),
        })
    }

    pub fn push_read(&self, step: ReadStep) {
        self.reads.lock().unwrap().push_back(step);
    }

    pub fn push_data(&self, data: &[u8]) {
        self.push_read(ReadStep::Data(data.to_vec()));
    }

    pub fn push_write(&self, step: WriteStep) {
        self.writes.lock().unwrap().push_back(step);
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }
}

impl Socket for ScriptedSocket {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reads = self.reads.lock().unwrap();
        match reads.pop_front() {
            None | Some(ReadStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(ReadStep::Eof) => {
                reads.push_front(ReadStep::Eof);
                Ok(0)
            }
            Some(ReadStep::Fail) => Err(io::ErrorKind::ConnectionReset.into()),
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    reads.push_front(ReadStep::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn try_write_vectored(&self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let limit = match self.writes.lock().unwrap().pop_front() {
            None => usize::MAX,
            Some(WriteStep::Accept(n)) => n,
            Some(WriteStep::WouldBlock) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(WriteStep::Fail) => return Err(io::ErrorKind::BrokenPipe.into()),
        };

        let mut written = self.written.lock().unwrap();
        let mut taken = 0;
        for buf in bufs {
            if taken == limit {
                break;
            }
            let n = buf.len().min(limit - taken);
            written.extend_from_slice(&buf[..n]);
            taken += n;
        }
        Ok(taken)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.peer)
    }
}

/// Handler over a document root and two tier directories in a temp dir.
pub struct Fixture {
    pub dir: TempDir,
    pub metrics: Arc<ServerMetrics>,
    pub index: Arc<StorageIndex>,
    pub store: Arc<TierStore>,
    pub handler: Arc<RequestHandler>,
    pub storage: StorageConfig,
}

pub const PAGES: &[(&str, &str)] = &[
    ("judge.html", "<p>judge</p>"),
    ("index.html", "<p>index</p>"),
    ("register.html", "<p>register</p>"),
    ("log.html", "<p>login form</p>"),
    ("logError.html", "<p>login failed</p>"),
    ("registerError.html", "<p>register failed</p>"),
    ("monitor.html", "<p>monitor</p>"),
    ("hello.txt", "hello world"),
    ("ten.bin", "0123456789"),
];

impl Fixture {
    pub fn new() -> Self {
        Self::with_format(Format::Lz4)
    }

    pub fn with_format(format: Format) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(root.join("subdir")).unwrap();
        std::fs::set_permissions(root.join("subdir"), std::fs::Permissions::from_mode(0o755)).unwrap();
        for (name, body) in PAGES {
            write_readable(&root.join(name), body.as_bytes());
        }
        write_readable(&root.join("empty.html"), b"");

        let storage = StorageConfig {
            download_prefix: "/download/".to_string(),
            low_storage_dir: dir.path().join("low"),
            deep_storage_dir: dir.path().join("deep"),
            storage_info: dir.path().join("storage.data"),
            bundle_format: format,
        };
        let static_files = StaticConfig {
            doc_root: root,
            ..StaticConfig::default()
        };

        let metrics = Arc::new(ServerMetrics::new());
        let index = Arc::new(StorageIndex::open(&storage.storage_info));
        let store = Arc::new(TierStore::new(Arc::clone(&index), &storage));
        let handler = Arc::new(RequestHandler::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            Arc::new(MemoryCredentialStore::new()),
            &static_files,
        ));

        Self {
            dir,
            metrics,
            index,
            store,
            handler,
            storage,
        }
    }

    pub fn doc_root(&self) -> PathBuf {
        self.dir.path().join("root")
    }
}

pub fn write_readable(path: &Path, body: &[u8]) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).unwrap();
}
