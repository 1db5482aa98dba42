//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and connect a real
//! client to it, so bytes actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use vrlink_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};

    /// Binds on port 0 and returns the transport with its `ws://` URL.
    async fn bind_ephemeral() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");
        (transport, format!("ws://{addr}"))
    }

    #[tokio::test]
    async fn test_client_and_server_exchange_bytes() {
        let (mut transport, url) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let client = WebSocketConnection::connect(&url).await.expect("should connect");
        let server_conn = server.await.expect("task should complete");

        client.send(b"hello relay").await.unwrap();
        let received = server_conn.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(&b"hello relay"[..]));

        server_conn.send(b"hello client").await.unwrap();
        let received = client.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(&b"hello client"[..]));
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        // One task parks in recv() while another sends on the same
        // connection; with a single lock around the stream this deadlocks.
        let (mut transport, url) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let client = std::sync::Arc::new(
            WebSocketConnection::connect(&url).await.expect("should connect"),
        );
        let server_conn = server.await.unwrap();

        let reader = {
            let client = std::sync::Arc::clone(&client);
            tokio::spawn(async move { client.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), client.send(b"ping"))
            .await
            .expect("send must not wait for recv")
            .unwrap();
        assert_eq!(server_conn.recv().await.unwrap().as_deref(), Some(&b"ping"[..]));

        server_conn.send(b"pong").await.unwrap();
        let got = reader.await.unwrap().unwrap();
        assert_eq!(got.as_deref(), Some(&b"pong"[..]));
    }

    #[tokio::test]
    async fn test_close_yields_none_on_peer() {
        let (mut transport, url) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let client = WebSocketConnection::connect(&url).await.unwrap();
        let server_conn = server.await.unwrap();

        client.close().await.unwrap();
        let received = server_conn.recv().await.unwrap();
        assert!(received.is_none(), "clean close should read as None");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (mut transport, url) = bind_ephemeral().await;
        let server = tokio::spawn(async move {
            let a = transport.accept().await.unwrap();
            let b = transport.accept().await.unwrap();
            (a.id(), b.id())
        });
        let c1 = WebSocketConnection::connect(&url).await.unwrap();
        let c2 = WebSocketConnection::connect(&url).await.unwrap();
        let (s1, s2) = server.await.unwrap();

        let ids = [c1.id(), c2.id(), s1, s2];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let (transport, url) = bind_ephemeral().await;
        drop(transport);
        let result = WebSocketConnection::connect(&url).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_peer_names_the_other_end() {
        let (mut transport, url) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let client = WebSocketConnection::connect(&url).await.unwrap();
        let server_conn = server.await.unwrap();

        assert_eq!(client.peer(), url);
        let addr: std::net::SocketAddr = server_conn.peer().parse().expect("socket address");
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_twice_on_same_port_fails() {
        let (transport, _) = bind_ephemeral().await;
        let addr = transport.local_addr().unwrap().to_string();
        let result = WebSocketTransport::bind(&addr).await;
        assert!(matches!(result, Err(vrlink_transport::TransportError::Bind { .. })));
    }
}
