//! In-process mediator used by tests

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

/// A fake mediator listening on a socket in a temporary directory
pub struct FakeMediator {
    _dir: TempDir,
    path: PathBuf,
}

impl FakeMediator {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serve every connection with `handler`, which maps a request body to a
/// response body. The request id is echoed back automatically.
pub fn spawn_mediator<F>(handler: F) -> FakeMediator
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mediator.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let handler = std::sync::Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let request: Value = serde_json::from_str(&line).unwrap();
                    let id = request["id"].clone();
                    let mut response = handler(request);
                    response["id"] = id;
                    let mut encoded = serde_json::to_string(&response).unwrap();
                    encoded.push('\n');
                    if write_half.write_all(encoded.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    FakeMediator { _dir: dir, path }
}
