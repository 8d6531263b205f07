use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;

use super::Dispatcher;
use super::command::CommandError;
use crate::model::config::HostConfig;

type Reply = Result<Value, CommandError>;

/// `None` once the host's stdout has closed.
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Reply>>>>>;

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    command: &'a str,
    payload: &'a Value,
}

#[derive(Debug, Deserialize)]
struct HostReply {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Host process spoken to over stdin/stdout, one JSON message per line.
///
/// Requests carry an `id`; replies may arrive in any order and are routed
/// back to the caller holding that id.
#[derive(Debug, Clone)]
pub struct StdioHost {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    _child: Mutex<Child>,
}

impl StdioHost {
    /// Spawn the host program. Must be called from within a tokio runtime.
    pub fn spawn(config: &HostConfig) -> Result<Self, CommandError> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(CommandError::Disconnected);
        };

        tracing::info!(program = %config.program, "spawned host process");
        Ok(Self::from_pipes(stdin, stdout, child))
    }

    fn from_pipes(stdin: ChildStdin, stdout: ChildStdout, child: Child) -> Self {
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        tokio::spawn(read_replies(stdout, pending.clone()));

        Self {
            inner: Arc::new(Inner {
                stdin: tokio::sync::Mutex::new(stdin),
                pending,
                next_id: AtomicU64::new(1),
                _child: Mutex::new(child),
            }),
        }
    }

    async fn send(&self, id: u64, command: &'static str, payload: &Value) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(&Request {
            id,
            command,
            payload,
        })?;
        line.push(b'\n');

        let mut stdin = self.inner.stdin.lock().await;
        stdin.write_all(&line).await?;
        stdin.flush().await
    }
}

impl Dispatcher for StdioHost {
    async fn dispatch(&self, command: &'static str, payload: Value) -> Result<Value, CommandError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = lock(&self.inner.pending);
            let Some(waiting) = pending.as_mut() else {
                return Err(CommandError::Disconnected);
            };
            waiting.insert(id, tx);
        }

        if let Err(err) = self.send(id, command, &payload).await {
            if let Some(waiting) = lock(&self.inner.pending).as_mut() {
                waiting.remove(&id);
            }
            return Err(CommandError::Transport(err));
        }

        rx.await.unwrap_or(Err(CommandError::Disconnected))
    }
}

async fn read_replies(stdout: ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("failed to read from host: {err}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let (id, reply) = match decode_reply(&line) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!("dropping undecodable host reply: {err}");
                continue;
            }
        };

        let sender = lock(&pending).as_mut().and_then(|waiting| waiting.remove(&id));
        match sender {
            Some(sender) => {
                let _ = sender.send(reply);
            }
            None => tracing::warn!(id, "host replied to an unknown request"),
        }
    }

    // Dropping the senders fails every waiting caller with `Disconnected`.
    let abandoned = lock(&pending).take().map_or(0, |waiting| waiting.len());
    tracing::warn!(abandoned, "host process closed its output");
}

fn decode_reply(line: &str) -> Result<(u64, Reply), serde_json::Error> {
    let reply: HostReply = serde_json::from_str(line)?;
    let outcome = match reply.error {
        Some(message) => Err(CommandError::Host(message)),
        None => Ok(reply.result),
    };
    Ok((reply.id, outcome))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_result_replies() {
        let (id, reply) = decode_reply(r#"{"id":7,"result":[1,2]}"#).unwrap();
        assert_eq!(id, 7);
        assert_eq!(reply.unwrap(), json!([1, 2]));
    }

    #[test]
    fn missing_result_decodes_as_null() {
        let (_, reply) = decode_reply(r#"{"id":3}"#).unwrap();
        assert_eq!(reply.unwrap(), Value::Null);
    }

    #[test]
    fn error_replies_keep_the_host_message() {
        let (id, reply) =
            decode_reply(r#"{"id":2,"error":"Bad HTTP status code: 404 Not Found"}"#).unwrap();
        assert_eq!(id, 2);
        let err = reply.unwrap_err();
        assert_eq!(err.to_string(), "Bad HTTP status code: 404 Not Found");
    }

    #[test]
    fn replies_without_id_are_rejected() {
        assert!(decode_reply(r#"{"result":null}"#).is_err());
        assert!(decode_reply("not json").is_err());
    }

    #[test]
    fn requests_are_single_line_json() {
        let payload = json!({ "url": "https://example.com/repo.json" });
        let encoded = serde_json::to_string(&Request {
            id: 4,
            command: "add_repository",
            payload: &payload,
        })
        .unwrap();

        assert!(!encoded.contains('\n'));
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["id"], 4);
        assert_eq!(decoded["command"], "add_repository");
        assert_eq!(decoded["payload"]["url"], "https://example.com/repo.json");
    }

    // `cat` echoes each request back; a request has an `id` and no `error`,
    // so it decodes as a null result for that same id.
    #[cfg(unix)]
    #[tokio::test]
    async fn echo_host_routes_replies_by_id() {
        let host = StdioHost::spawn(&HostConfig {
            program: "cat".into(),
            args: Vec::new(),
        })
        .unwrap();

        let (first, second) = tokio::join!(
            host.dispatch("get_repositories_view_model", json!({})),
            host.dispatch("delete_resource", json!({ "path": "/repos/a.json" })),
        );

        assert_eq!(first.unwrap(), Value::Null);
        assert_eq!(second.unwrap(), Value::Null);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stray_lines_are_skipped_until_the_real_reply() {
        let script = r#"read request
echo garbage
echo '{"id":999,"result":1}'
echo '{"id":1,"result":[]}'
"#;
        let host = StdioHost::spawn(&HostConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        })
        .unwrap();

        let reply = host
            .dispatch("get_repositories_view_model", json!({}))
            .await
            .unwrap();
        assert_eq!(reply, json!([]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn closed_host_fails_calls_with_disconnected() {
        let host = StdioHost::spawn(&HostConfig {
            program: "true".into(),
            args: Vec::new(),
        })
        .unwrap();

        // Let the reader see end of output before the call goes out.
        while lock(&host.inner.pending).is_some() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let err = host
            .dispatch("get_repositories_view_model", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Disconnected));
    }

    #[test]
    fn missing_program_is_a_transport_error() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _enter = runtime.enter();

        let err = StdioHost::spawn(&HostConfig {
            program: "/nonexistent/jdt-host".into(),
            args: Vec::new(),
        })
        .unwrap_err();
        assert!(matches!(err, CommandError::Transport(_)));
    }
}
