//! services/api/src/adapters/worker.rs
//!
//! Hand-off to the AI worker, implementing the `ProcessingDispatcher` port.
//! Dispatch never blocks the request: the HTTP call runs on its own task and
//! its outcome is only logged.

use neurostudy_core::domain::ProcessingRequest;
use neurostudy_core::ports::ProcessingDispatcher;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Serialize)]
struct ProcessPayload<'a> {
    session_id: Uuid,
    user_id: Uuid,
    image_url: &'a str,
}

/// POSTs `{session_id, user_id, image_url}` to `<base>/api/process`.
#[derive(Clone)]
pub struct HttpWorkerDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWorkerDispatcher {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/process", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ProcessingDispatcher for HttpWorkerDispatcher {
    fn dispatch(&self, request: ProcessingRequest) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let payload = ProcessPayload {
                session_id: request.session_id,
                user_id: request.user_id,
                image_url: &request.image_url,
            };
            match client.post(&endpoint).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Worker accepted session {}", request.session_id);
                }
                Ok(response) => {
                    warn!(
                        "Worker answered {} for session {}",
                        response.status(),
                        request.session_id
                    );
                }
                Err(e) => {
                    error!("Could not reach worker for session {}: {}", request.session_id, e);
                }
            }
        });
    }
}

/// Records the hand-off in the log only, for deployments where the worker
/// polls the database for `processing` sessions instead.
#[derive(Clone, Default)]
pub struct LoggingDispatcher;

impl ProcessingDispatcher for LoggingDispatcher {
    fn dispatch(&self, request: ProcessingRequest) {
        info!(
            "Session {} of user {} is ready for processing ({})",
            request.session_id, request.user_id, request.image_url
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_from_base_url() {
        let dispatcher = HttpWorkerDispatcher::new(reqwest::Client::new(), "http://worker:5000/");
        assert_eq!(dispatcher.endpoint(), "http://worker:5000/api/process");
    }

    #[test]
    fn payload_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ProcessPayload {
            session_id: id,
            user_id: id,
            image_url: "https://img/1.png",
        })
        .unwrap();
        assert_eq!(json["image_url"], "https://img/1.png");
        assert_eq!(json["session_id"], id.to_string());
    }

    #[tokio::test]
    async fn dispatch_returns_before_the_worker_is_reached() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;
        use tokio::time::{timeout, Duration};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let dispatcher = HttpWorkerDispatcher::new(client, &base_url);
        let session_id = Uuid::new_v4();

        // Nothing has accepted the connection yet, so a blocking dispatch would hang here.
        dispatcher.dispatch(ProcessingRequest {
            session_id,
            user_id: Uuid::new_v4(),
            image_url: "https://img/1.png".to_string(),
        });

        let received = timeout(Duration::from_secs(5), async {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 1024];
            while !String::from_utf8_lossy(&received).contains(&session_id.to_string()) {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
            }
            String::from_utf8_lossy(&received).into_owned()
        })
        .await
        .unwrap();

        assert!(received.starts_with("POST /api/process "));
        assert!(received.contains("https://img/1.png"));
    }
}
