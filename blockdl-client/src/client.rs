//! HTTP stream client backed by `reqwest`.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::request::StreamRequest;
use crate::source::HttpChunkSource;
use crate::stream::RecordStream;
use blockdl_protocol::FrameDecoder;
use reqwest::StatusCode;

/// Opens record streams against the remote service.
#[derive(Debug, Clone)]
pub struct StreamClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl StreamClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("blockdl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a stream and returns it ready to decode.
    ///
    /// Fails before any chunk is read if the connection cannot be
    /// established or the server answers with anything but `200 OK`.
    pub async fn open(
        &self,
        request: &StreamRequest,
    ) -> Result<RecordStream<HttpChunkSource>, ClientError> {
        request.validate()?;

        let url = request.url(&self.config.base_url);
        tracing::debug!(
            url = %url,
            from = ?request.from,
            until = ?request.until,
            "opening stream"
        );

        let send = self
            .http
            .get(&url)
            .query(&request.query(&self.config.api_key))
            .send();
        let response = tokio::time::timeout(self.config.read_timeout, send)
            .await
            .map_err(|_| {
                tracing::debug!(url = %url, "stream request timeout");
                ClientError::Timeout {
                    ms: self.config.read_timeout.as_millis() as u64,
                }
            })?
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "stream request failed");
                ClientError::Http(e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = match tokio::time::timeout(self.config.read_timeout, response.text()).await
            {
                Ok(Ok(text)) => error_body(&text),
                Ok(Err(e)) => {
                    tracing::debug!(url = %url, error = %e, "failed to read error body");
                    format!("<unreadable body: {}>", e)
                }
                Err(_) => {
                    tracing::debug!(url = %url, "error body read timeout");
                    "<body read timed out>".to_string()
                }
            };
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            chain = %request.chain,
            table = %request.table,
            "stream opened"
        );

        let source = HttpChunkSource::new(
            response,
            self.config.chunk_size,
            self.config.read_timeout,
        );
        let decoder = FrameDecoder::with_max_payload_size(self.config.max_payload_size);
        Ok(RecordStream::new(source, decoder))
    }
}

/// Renders an error body, normalizing JSON so it fits on one line.
fn error_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdl_protocol::{Encoder, ProtocolError, Record};
    use bytes::Bytes;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one HTTP/1.1 response and returns the raw request it received.
    async fn serve_once(
        head: &'static str,
        chunks: Vec<Vec<u8>>,
    ) -> (SocketAddr, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in chunks {
                socket
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(&chunk).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();

            String::from_utf8_lossy(&request).into_owned()
        });

        (addr, handle)
    }

    const OK_HEAD: &str = "HTTP/1.1 200 OK\r\n\
                           Content-Type: application/octet-stream\r\n\
                           Transfer-Encoding: chunked\r\n\
                           Connection: close\r\n\r\n";

    fn client_for(addr: SocketAddr) -> StreamClient {
        let config = ClientConfig::new("test-key")
            .with_base_url(format!("http://{}/stream", addr))
            .with_read_timeout(Duration::from_secs(5));
        StreamClient::new(config).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(StreamClient::new(ClientConfig::new("")).is_err());
    }

    #[test]
    fn test_error_body() {
        assert_eq!(
            error_body("{\n  \"error\": \"invalid api key\"\n}"),
            r#"{"error":"invalid api key"}"#
        );
        assert_eq!(error_body("  bad gateway \n"), "bad gateway");
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_request() {
        let client = client_for("127.0.0.1:9".parse().unwrap());
        let err = client
            .open(&StreamRequest::new("", "blocks"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_stream_over_http() {
        let records = vec![
            Record::new(5, &b"abc"[..]),
            Record::new(6, Bytes::new()),
            Record::new(7, vec![0x42u8; 5000]),
        ];
        let wire = Encoder::encode_records(&records).unwrap();
        // Split mid-header and mid-payload.
        let chunks = vec![wire[..7].to_vec(), wire[7..30].to_vec(), wire[30..].to_vec()];

        let (addr, server) = serve_once(OK_HEAD, chunks).await;
        let client = client_for(addr);
        let request = StreamRequest::new("eth", "blocks")
            .with_from(0)
            .with_until(100_000);

        let mut stream = client.open(&request).await.unwrap();
        let mut decoded = Vec::new();
        while let Some(record) = stream.next_record().await.unwrap() {
            decoded.push(record);
        }
        assert_eq!(decoded, records);

        let raw_request = server.await.unwrap();
        let request_line = raw_request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /stream/eth/blocks?"));
        assert!(request_line.contains("apikey=test-key"));
        assert!(request_line.contains("gte%3Ablock_number=0"));
        assert!(request_line.contains("lte%3Ablock_number=100000"));
    }

    #[tokio::test]
    async fn test_truncated_http_stream() {
        let wire = Record::new(1, vec![1u8; 32]).encode().unwrap();
        let chunks = vec![wire[..20].to_vec()];

        let (addr, _server) = serve_once(OK_HEAD, chunks).await;
        let client = client_for(addr);

        let mut stream = client
            .open(&StreamRequest::new("eth", "blocks"))
            .await
            .unwrap();
        let err = stream.next_record().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::IncompleteRecord { bytes_remaining: 20 })
        ));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let head = "HTTP/1.1 401 Unauthorized\r\n\
                    Content-Type: application/json\r\n\
                    Transfer-Encoding: chunked\r\n\
                    Connection: close\r\n\r\n";
        let body = br#"{"error": "invalid api key"}"#.to_vec();

        let (addr, _server) = serve_once(head, vec![body]).await;
        let client = client_for(addr);

        let err = client
            .open(&StreamRequest::new("eth", "blocks"))
            .await
            .unwrap_err();
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, r#"{"error":"invalid api key"}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stalled_error_body_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\n\
                      Content-Type: application/json\r\n\
                      Content-Length: 100\r\n\r\n{\"err",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
            // Hold the connection open without finishing the body.
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = ClientConfig::new("test-key")
            .with_base_url(format!("http://{}/stream", addr))
            .with_read_timeout(Duration::from_millis(200));
        let client = StreamClient::new(config).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            client.open(&StreamRequest::new("eth", "blocks")),
        )
        .await
        .expect("open() should give up on the error body after read_timeout");

        match result {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("timed out"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("500 response opened a stream"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client = client_for(addr);

        let err = client
            .open(&StreamRequest::new("eth", "blocks"))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
