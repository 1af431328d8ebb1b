use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use futures_util::{SinkExt, StreamExt};
use http::{
    header::{CONNECTION, USER_AGENT},
    HeaderValue, StatusCode,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
    sync::Semaphore,
};
use tokio_util::codec::{Decoder, Framed};

use crate::{
    error::RequestError,
    http::{
        codec::{ConnectionCodec, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEAD_BYTES},
        ContentEncoding, IntoResponse, Request, Response,
    },
    router::Router,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_CONNECTIONS: usize = 1_000;

const CLOSE: HeaderValue = HeaderValue::from_static("close");

pub struct Server<S> {
    state: S,
    router: Router<S>,
    semaphore: Arc<Semaphore>,
    max_head_bytes: usize,
    max_body_bytes: usize,
    timeout: Duration,
}

impl<S> Server<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(state: S, router: Router<S>) -> Self {
        Self {
            state,
            router,
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_limits(mut self, max_head_bytes: usize, max_body_bytes: usize) -> Self {
        self.max_head_bytes = max_head_bytes;
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Deadline for reading the request, handling it and writing the response.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, permits: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(permits));
        self
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let server = Arc::new(self);

        let addr = listener.local_addr()?;
        tracing::info!(target: "listener", ?addr, "server is running");

        loop {
            let Ok(permit) = Arc::clone(&server.semaphore).acquire_owned().await else {
                return Ok(());
            };

            let (socket, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(target: "listener", %err, "failed to accept connection");
                    continue;
                }
            };

            let server = server.clone();
            tokio::spawn(async move {
                let handled =
                    tokio::time::timeout(server.timeout, server.handle_connection(socket, addr))
                        .await;
                if handled.is_err() {
                    tracing::warn!(%addr, "connection timed out after {:?}", server.timeout);
                }

                drop(permit);
            });
        }
    }

    /// Serves exactly one request on `io`, then drops it.
    ///
    /// Malformed requests are answered with `400`, unrouted ones with `404`
    /// and failed handlers with `500`. Nothing is written when the peer goes
    /// away before a full request arrives.
    #[tracing::instrument(skip(self, io))]
    pub async fn handle_connection<IO>(&self, io: IO, addr: SocketAddr)
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let mut codec = ConnectionCodec::new(self.max_head_bytes, self.max_body_bytes).framed(io);
        let req = match codec.next().await.transpose() {
            Ok(Some(req)) => {
                tracing::debug!(?req, "received request");
                req
            }
            Ok(None) => {
                tracing::debug!("connection ended before request");
                return;
            }
            Err(RequestError::Io(err)) => {
                tracing::warn!(%err, "failed to read request");
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "rejecting malformed request");
                let resp = StatusCode::BAD_REQUEST.into_response();
                send(&mut codec, resp, ContentEncoding::Identity).await;
                return;
            }
        };

        let user = req.headers().get(USER_AGENT).unwrap_or_else(|| {
            static UNKNOWN_AGENT: HeaderValue = HeaderValue::from_static("Unknown");
            &UNKNOWN_AGENT
        });

        let path = request_target(&req);
        tracing::info!(
            target: "requests",
            method = %req.method(),
            %path,
            ?user,
            r#""{} {path}" by {user:?}"#, req.method()
        );

        let encoding = ContentEncoding::negotiate(req.headers());
        let version = req.version();

        let now = Instant::now();
        let mut resp = self.dispatch(req).await;
        *resp.version_mut() = version;
        tracing::debug!(?resp, "handled in {:?}, sending response", now.elapsed());

        send(&mut codec, resp, encoding).await;
    }

    async fn dispatch(&self, req: Request) -> Response {
        let Some((handler, params)) = self.router.find(req.method(), request_target(&req)) else {
            return StatusCode::NOT_FOUND.into_response();
        };

        match handler.call(req, params, self.state.clone()).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::error!("handler failed: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// The request target as sent, query included. Routes match against it verbatim.
fn request_target(req: &Request) -> &str {
    req.uri().path_and_query().map_or("", |target| target.as_str())
}

async fn send<IO>(
    codec: &mut Framed<IO, ConnectionCodec>,
    mut resp: Response,
    encoding: ContentEncoding,
) where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    resp.headers_mut().insert(CONNECTION, CLOSE);

    if let Err(err) = codec.send((resp, encoding)).await {
        tracing::warn!(%err, "failed to send response");
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use http::Method;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use crate::{
        http::encoding,
        router::Params,
    };

    use super::*;

    async fn echo(_: Request, params: Params, _: ()) -> Result<Response> {
        Ok(params[0].to_owned().into_response())
    }

    async fn broken(_: Request, _: Params, _: ()) -> Result<Response> {
        anyhow::bail!("disk on fire")
    }

    fn server() -> Server<()> {
        let router = Router::<()>::new()
            .literal(Method::GET, "/broken", broken)
            .pattern(Method::GET, r"^/echo/([A-Za-z]+)$", echo)
            .unwrap();
        Server::new((), router).with_limits(128, 16)
    }

    async fn exchange(request: &[u8]) -> Vec<u8> {
        let (mut client, io) = duplex(4096);
        let addr = SocketAddr::from(([127, 0, 0, 1], 4221));

        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();
        server().handle_connection(io, addr).await;

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn answers_a_routed_request() {
        let out = exchange(b"GET /echo/abc HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert_eq!(
            out,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\nContent-Length: 3\r\n\r\nabc"
        );
    }

    #[tokio::test]
    async fn negotiates_gzip() {
        let out = exchange(b"GET /echo/abc HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n").await;

        let compressed = encoding::compress(b"abc").unwrap();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            compressed.len()
        );
        assert_eq!(&out[..head.len()], head.as_bytes());
        assert_eq!(encoding::decompress(&out[head.len()..]).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn echoes_the_request_version() {
        let out = exchange(b"GET /nowhere HTTP/1.0\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.0 404 Not Found\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn routes_on_the_full_target() {
        let out = exchange(b"GET /echo/abc?x=1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");

        let out = exchange(b"GET /broken?retry HTTP/1.1\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn rejects_malformed_requests() {
        let out = exchange(b"GET /echo/abc\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");

        let out = exchange(b"GET / HTTP/1.1\r\nno separator\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn rejects_oversized_requests() {
        let out = exchange(b"POST /echo/abc HTTP/1.1\r\nContent-Length: 17\r\n\r\n").await;
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");

        let long_path = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(200));
        let out = exchange(long_path.as_bytes()).await;
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn handler_failures_become_server_errors() {
        let out = exchange(b"GET /broken HTTP/1.1\r\n\r\n").await;
        assert_eq!(
            out,
            b"HTTP/1.1 500 Internal Server Error\r\nConnection: close\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn truncated_requests_get_no_answer() {
        assert!(exchange(b"GET /echo/abc HTTP/1.1\r\nHost: loc").await.is_empty());
        assert!(exchange(b"").await.is_empty());
    }
}
