//! End-to-end tests for the courtside client.
//! Each test serves one scripted HTTP exchange from a local socket.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use courtside::{
        HttpTransport, ImageUpload, Message, NullView, RequestCoordinator, Role, SessionId,
        TurnOutcome,
    };

    struct Request {
        head: String,
        body: Vec<u8>,
    }

    impl Request {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().skip(1).find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
        }
    }

    enum Reply {
        /// A chunked event stream; `complete` controls whether the terminating
        /// chunk is sent before the connection closes.
        Stream {
            chunks: Vec<Vec<u8>>,
            complete: bool,
        },
        Full {
            status: &'static str,
            content_type: &'static str,
            body: String,
        },
    }

    /// Serves a single exchange and returns the base URL plus the captured
    /// request.
    async fn serve_once(reply: Reply) -> (String, oneshot::Receiver<Request>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);
            write_reply(&mut socket, reply).await;
        });
        (base, rx)
    }

    async fn read_request(socket: &mut TcpStream) -> Request {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut request = Request {
            head,
            body: buf[header_end..].to_vec(),
        };
        let length: usize = request
            .header("content-length")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        while request.body.len() < length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending the body");
            request.body.extend_from_slice(&chunk[..n]);
        }
        request
    }

    async fn write_reply(socket: &mut TcpStream, reply: Reply) {
        match reply {
            Reply::Stream { chunks, complete } => {
                socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                for chunk in chunks {
                    let mut wire = format!("{:x}\r\n", chunk.len()).into_bytes();
                    wire.extend_from_slice(&chunk);
                    wire.extend_from_slice(b"\r\n");
                    socket.write_all(&wire).await.unwrap();
                    socket.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                if complete {
                    socket.write_all(b"0\r\n\r\n").await.unwrap();
                }
                socket.flush().await.unwrap();
            }
            Reply::Full {
                status,
                content_type,
                body,
            } => {
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
        }
        let _ = socket.shutdown().await;
    }

    fn coordinator(base: &str) -> RequestCoordinator<HttpTransport> {
        let transport = HttpTransport::with_options(Some(base), None).unwrap();
        RequestCoordinator::new(transport, Arc::new(NullView))
    }

    fn messages(coordinator: &RequestCoordinator<HttpTransport>) -> Vec<Message> {
        coordinator.read(|store| {
            store
                .session(SessionId::new(0))
                .unwrap()
                .messages()
                .to_vec()
        })
    }

    #[tokio::test]
    async fn streamed_answer_survives_arbitrary_chunking() {
        let stream = "event: message\ndata: {\"type\":\"bot_response\",\"message\":\"Pelé won three World Cups.\"}\n\n\
                      event: message\ndata: {\"type\":\"bot_response\",\"message\":\"1958, 1962 and 1970.\"}\n\n";
        let bytes = stream.as_bytes();
        let accent = stream.find('é').unwrap();
        let first_delimiter = stream.find("\n\n").unwrap();
        // Splits land inside the two-byte 'é' and between the delimiter's newlines.
        let chunks = vec![
            bytes[..accent + 1].to_vec(),
            bytes[accent + 1..first_delimiter + 1].to_vec(),
            bytes[first_delimiter + 1..].to_vec(),
        ];
        let (base, request) = serve_once(Reply::Stream {
            chunks,
            complete: true,
        })
        .await;

        let coordinator = coordinator(&base);
        let outcome = coordinator
            .send_query("How many World Cups did Pelé win?")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                session: SessionId::new(0),
                events: 2
            }
        );
        assert_eq!(
            messages(&coordinator),
            vec![
                Message::user("How many World Cups did Pelé win?"),
                Message::assistant("Pelé won three World Cups."),
                Message::assistant("1958, 1962 and 1970."),
            ]
        );

        let request = request.await.unwrap();
        assert_eq!(request.request_line(), "POST /ask HTTP/1.1");
        assert_eq!(request.header("accept"), Some("text/event-stream"));
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"query": "How many World Cups did Pelé win?"})
        );
    }

    #[tokio::test]
    async fn service_unavailable_becomes_one_error_message() {
        let (base, _request) = serve_once(Reply::Full {
            status: "503 Service Unavailable",
            content_type: "application/json",
            body: r#"{"error": "index not loaded"}"#.to_string(),
        })
        .await;

        let coordinator = coordinator(&base);
        let outcome = coordinator.send_query("Who won in 2010?").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(
            messages(&coordinator),
            vec![
                Message::user("Who won in 2010?"),
                Message::error("Request failed: HTTP error 503: index not loaded"),
            ]
        );
    }

    #[tokio::test]
    async fn dropped_connection_keeps_the_partial_answer() {
        let (base, _request) = serve_once(Reply::Stream {
            chunks: vec![
                b"data: {\"type\":\"bot_response\",\"message\":\"Part one.\"}\n\n".to_vec(),
                b"data: {\"type\":\"bot_resp".to_vec(),
            ],
            complete: false,
        })
        .await;

        let coordinator = coordinator(&base);
        let outcome = coordinator.send_query("Tell me a story").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let messages = messages(&coordinator);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("Part one."));
        assert_eq!(messages[2].role, Role::Error);
        assert!(
            messages[2].body.starts_with("Request failed: "),
            "unexpected error text: {}",
            messages[2].body
        );
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let coordinator = coordinator(&base);
        let outcome = coordinator.send_query("anyone?").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        let last = messages(&coordinator).pop().unwrap();
        assert_eq!(last.role, Role::Error);
        assert!(last.body.starts_with("Request failed: Connection error"));
    }

    #[tokio::test]
    async fn pose_check_uploads_a_multipart_image() {
        let (base, request) = serve_once(Reply::Full {
            status: "200 OK",
            content_type: "application/json",
            body: r#"{"message": "✅ You appear to be standing upright.", "image_path": "/static/pose_ab12.jpg"}"#
                .to_string(),
        })
        .await;

        let coordinator = coordinator(&base);
        let upload = ImageUpload::new("stance.jpg", b"\xff\xd8\xff\xe0fake-jpeg".to_vec());
        let outcome = coordinator.send_image(upload).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Completed { events: 1, .. }));

        let messages = messages(&coordinator);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user(courtside::UPLOAD_NOTICE));
        assert_eq!(
            messages[1],
            Message::assistant("✅ You appear to be standing upright.")
                .with_attachment(Some(format!("{base}static/pose_ab12.jpg")))
        );

        let request = request.await.unwrap();
        assert_eq!(request.request_line(), "POST /check_pose HTTP/1.1");
        assert!(
            request
                .header("content-type")
                .is_some_and(|value| value.starts_with("multipart/form-data"))
        );
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains("name=\"image\""));
        assert!(body.contains("filename=\"stance.jpg\""));
        assert!(body.contains("fake-jpeg"));
    }

    #[tokio::test]
    async fn rejected_image_explanation_is_shown() {
        let (base, _request) = serve_once(Reply::Full {
            status: "400 Bad Request",
            content_type: "application/json",
            body: r#"{"message": "Invalid image"}"#.to_string(),
        })
        .await;

        let coordinator = coordinator(&base);
        coordinator
            .send_image(ImageUpload::new("blank.png", vec![0, 1, 2]))
            .await
            .unwrap();
        assert_eq!(
            messages(&coordinator).pop(),
            Some(Message::assistant("Invalid image"))
        );
    }
}
