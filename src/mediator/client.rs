//! Skill mediator client
//!
//! Holds one connection to the mediator for the lifetime of a run. Dialing
//! is retried with a fixed delay; once connected, failed calls are surfaced
//! to the caller as-is.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::UnixStream;
use tracing::{debug, info};

use super::protocol::{MediatorRequest, MediatorResponse, RequestEnvelope, ResponseEnvelope};
use super::types::{validate_catalog, ModelCredentials, SkillDescriptor, SkillResult};
use super::SkillGateway;
use crate::config::MediatorConfig;
use crate::error::{RunError, RunResult};

/// Dial and call limits for the mediator connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub dial_timeout: Duration,
    /// Total dial attempts (at least one is always made)
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Upper bound of random delay added to each retry
    pub retry_jitter: Duration,
    pub request_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::from(&MediatorConfig::default())
    }
}

impl From<&MediatorConfig> for ConnectOptions {
    fn from(config: &MediatorConfig) -> Self {
        Self {
            dial_timeout: Duration::from_millis(config.dial_timeout_ms),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            retry_jitter: Duration::from_millis(config.retry_jitter_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl ConnectOptions {
    fn retry_backoff(&self) -> Duration {
        let jitter_ms = self.retry_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.retry_delay;
        }
        self.retry_delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Connection to the skill mediator
pub struct MediatorClient<S = UnixStream> {
    endpoint: String,
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    next_id: u64,
    request_timeout: Duration,
}

impl MediatorClient<UnixStream> {
    /// Dial the mediator socket, retrying per `options`
    pub async fn connect(endpoint: impl AsRef<Path>, options: &ConnectOptions) -> RunResult<Self> {
        let path = endpoint.as_ref();
        let shown = path.display().to_string();
        let attempts = options.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(options.dial_timeout, UnixStream::connect(path)).await {
                Ok(Ok(stream)) => {
                    info!("Connected to skill mediator at {} (attempt {})", shown, attempt);
                    return Ok(Self::from_stream(shown, stream, options.request_timeout));
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("dial timed out after {:?}", options.dial_timeout)
                }
            }

            info!(
                "Mediator dial attempt {}/{} to {} failed: {}",
                attempt, attempts, shown, last_error
            );
            if attempt < attempts {
                tokio::time::sleep(options.retry_backoff()).await;
            }
        }

        Err(RunError::Connection {
            endpoint: shown,
            attempts,
            message: last_error,
        })
    }
}

impl<S> MediatorClient<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wrap an already established stream
    pub fn from_stream(endpoint: impl Into<String>, stream: S, request_timeout: Duration) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            endpoint: endpoint.into(),
            reader: BufReader::new(read_half),
            writer,
            next_id: 0,
            request_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and wait for its response
    async fn call(&mut self, request: MediatorRequest) -> RunResult<MediatorResponse> {
        self.next_id += 1;
        let id = self.next_id;
        let method = request.method();

        let mut line = serde_json::to_string(&RequestEnvelope { id, request })
            .map_err(|e| RunError::Mediator(format!("failed to encode {method} request: {e}")))?;
        line.push('\n');

        debug!("Mediator request #{} ({})", id, method);
        let reply = tokio::time::timeout(self.request_timeout, self.exchange(&line))
            .await
            .map_err(|_| {
                RunError::Mediator(format!(
                    "{method} timed out after {:?}",
                    self.request_timeout
                ))
            })??;

        let envelope: ResponseEnvelope = serde_json::from_str(reply.trim_end()).map_err(|e| {
            RunError::Mediator(format!("malformed response to {method}: {e}"))
        })?;

        if envelope.id != id {
            return Err(RunError::Mediator(format!(
                "response id {} does not match request id {}",
                envelope.id, id
            )));
        }

        debug!("Mediator response #{} ({})", id, envelope.response.kind());
        Ok(envelope.response)
    }

    async fn exchange(&mut self, line: &str) -> RunResult<String> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RunError::Mediator(format!("failed to send request: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RunError::Mediator(format!("failed to send request: {e}")))?;

        let mut reply = String::new();
        let read = self
            .reader
            .read_line(&mut reply)
            .await
            .map_err(|e| RunError::Mediator(format!("failed to read response: {e}")))?;
        if read == 0 {
            return Err(RunError::Mediator(
                "connection closed by skill mediator".to_string(),
            ));
        }
        Ok(reply)
    }
}

fn unexpected(method: &str, response: &MediatorResponse) -> RunError {
    RunError::Mediator(format!(
        "unexpected {} response to {}",
        response.kind(),
        method
    ))
}

#[async_trait]
impl<S> SkillGateway for MediatorClient<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn list_skills(&mut self, session_id: &str) -> RunResult<Vec<SkillDescriptor>> {
        let response = self
            .call(MediatorRequest::ListSkills {
                session_id: session_id.to_string(),
            })
            .await?;

        match response {
            MediatorResponse::Skills { skills } => {
                let skills = validate_catalog(skills)?;
                info!("Mediator advertised {} skill(s)", skills.len());
                Ok(skills)
            }
            MediatorResponse::Error { message } => Err(RunError::Mediator(format!(
                "failed to list skills: {message}"
            ))),
            other => Err(unexpected("list_skills", &other)),
        }
    }

    async fn resolve_credentials(
        &mut self,
        session_id: &str,
        invocation_id: &str,
        model: &str,
    ) -> RunResult<ModelCredentials> {
        let response = self
            .call(MediatorRequest::GetContext {
                session_id: session_id.to_string(),
                invocation_id: invocation_id.to_string(),
                name: model.to_string(),
            })
            .await?;

        match response {
            MediatorResponse::Context { value } => ModelCredentials::from_context(value),
            MediatorResponse::Error { message } => Err(RunError::Credential(format!(
                "mediator could not resolve model {model}: {message}"
            ))),
            other => Err(unexpected("get_context", &other)),
        }
    }

    async fn invoke_skill(
        &mut self,
        session_id: &str,
        invocation_id: &str,
        skill_name: &str,
        args: &Value,
    ) -> RunResult<SkillResult> {
        let response = self
            .call(MediatorRequest::InvokeSkill {
                session_id: session_id.to_string(),
                invocation_id: invocation_id.to_string(),
                skill_name: skill_name.to_string(),
                args: args.clone(),
            })
            .await?;

        match response {
            MediatorResponse::SkillResult { output } => Ok(SkillResult { output }),
            MediatorResponse::Error { message } => Err(RunError::SkillInvocation {
                skill: skill_name.to_string(),
                message,
            }),
            other => Err(unexpected("invoke_skill", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::testing::spawn_mediator;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn fast_options() -> ConnectOptions {
        ConnectOptions {
            dial_timeout: Duration::from_millis(200),
            max_retries: 3,
            retry_delay: Duration::from_millis(10),
            retry_jitter: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_connect_exhausts_retries() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("missing.sock");

        let result = MediatorClient::connect(&socket, &fast_options()).await;
        match result {
            Err(RunError::Connection { attempts, endpoint, .. }) => {
                assert_eq!(attempts, 3);
                assert!(endpoint.ends_with("missing.sock"));
            }
            Err(other) => panic!("Expected connection error, got {other}"),
            Ok(_) => panic!("Expected connection error"),
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dial_retries_quiet_at_warn_level() {
        use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new("warn"))
            .with(fmt::layer().with_writer(move || writer.clone()).with_ansi(false));
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempdir().unwrap();
        let socket = dir.path().join("missing.sock");
        let result = MediatorClient::connect(&socket, &fast_options()).await;

        assert!(matches!(result, Err(RunError::Connection { attempts: 3, .. })));
        assert_eq!(String::from_utf8(log.0.lock().unwrap().clone()).unwrap(), "");
    }

    #[tokio::test]
    async fn test_connected_client_keeps_endpoint() {
        let mediator = spawn_mediator(|_| json!({"type": "skills", "skills": []}));

        let client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();
        assert_eq!(client.endpoint(), mediator.path().display().to_string());
    }

    #[tokio::test]
    async fn test_list_skills_over_socket() {
        let mediator = spawn_mediator(|request| {
            assert_eq!(request["type"], "list_skills");
            assert_eq!(request["session_id"], "sess-1");
            json!({
                "type": "skills",
                "skills": [
                    {"name": "lookup", "description": "Look things up", "inputSchema": {"type": "object"}}
                ]
            })
        });

        let mut client = assert_ok!(MediatorClient::connect(mediator.path(), &fast_options()).await);
        let skills = client.list_skills("sess-1").await.unwrap();
        assert_eq!(
            skills,
            vec![SkillDescriptor::new(
                "lookup",
                "Look things up",
                json!({"type": "object"})
            )]
        );
    }

    #[tokio::test]
    async fn test_list_skills_rejects_partial_catalog() {
        let mediator = spawn_mediator(|_| {
            json!({
                "type": "skills",
                "skills": [
                    {"name": "lookup", "inputSchema": {}},
                    {"name": "no_schema"}
                ]
            })
        });

        let mut client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();
        let err = client.list_skills("s").await.unwrap_err();
        assert!(matches!(err, RunError::Schema(_)));
    }

    #[tokio::test]
    async fn test_resolve_credentials() {
        let mediator = spawn_mediator(|request| {
            assert_eq!(request["type"], "get_context");
            assert_eq!(request["name"], "gpt-4");
            json!({"type": "context", "value": {"apiKey": "sk-1", "model": "gpt-4-0613"}})
        });

        let mut client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();
        let creds = client
            .resolve_credentials("s", "i", "gpt-4")
            .await
            .unwrap();
        assert_eq!(creds.api_key, "sk-1");
        assert_eq!(creds.model, "gpt-4-0613");
    }

    #[tokio::test]
    async fn test_resolve_credentials_incomplete() {
        let mediator = spawn_mediator(|_| json!({"type": "context", "value": {"model": "gpt-4"}}));

        let mut client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();
        let err = client.resolve_credentials("s", "i", "gpt-4").await.unwrap_err();
        assert!(matches!(err, RunError::Credential(_)));
    }

    #[tokio::test]
    async fn test_invoke_skill_result_and_error() {
        let mediator = spawn_mediator(|request| {
            if request["skill_name"] == "lookup" {
                assert_eq!(request["args"], json!({"x": 1}));
                json!({"type": "skill_result", "output": {"y": 2}})
            } else {
                json!({"type": "error", "message": "This operation is blocked by Tansive policy"})
            }
        });

        let mut client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();

        let result = client
            .invoke_skill("s", "i", "lookup", &json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result.output, json!({"y": 2}));

        let err = client
            .invoke_skill("s", "i", "restricted", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RunError::SkillInvocation {
                skill: "restricted".to_string(),
                message: "This operation is blocked by Tansive policy".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_mismatched_response_is_protocol_error() {
        let mediator = spawn_mediator(|_| json!({"type": "context", "value": {}}));

        let mut client = MediatorClient::connect(mediator.path(), &fast_options())
            .await
            .unwrap();
        let err = client.list_skills("s").await.unwrap_err();
        assert_eq!(
            err,
            RunError::Mediator("unexpected context response to list_skills".to_string())
        );
    }

    #[tokio::test]
    async fn test_response_id_must_match() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server_io);
            let mut lines = BufReader::new(read_half).lines();
            if let Ok(Some(_)) = lines.next_line().await {
                let _ = write_half
                    .write_all(b"{\"id\": 99, \"type\": \"skills\", \"skills\": []}\n")
                    .await;
            }
        });

        let mut client = MediatorClient::from_stream("duplex", client_io, Duration::from_secs(5));
        let err = client.list_skills("s").await.unwrap_err();
        assert!(err.to_string().contains("does not match request id 1"));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        drop(server_io);

        let mut client = MediatorClient::from_stream("duplex", client_io, Duration::from_secs(5));
        let err = client.list_skills("s").await.unwrap_err();
        assert!(matches!(err, RunError::Mediator(_)));
    }
}
