//! Websocket connector for the game gateway.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Connector, FrameSink, FrameSource, Link};
use crate::config::ServerConfig;
use crate::error::{Result, SessionError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the gateway endpoint with the login code in the query.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    user_agent: String,
    origin: String,
}

impl WsConnector {
    pub fn new(server: &ServerConfig, code: &str) -> Result<Self> {
        let url = Url::parse_with_params(
            &server.url,
            &[
                ("platform", server.platform.as_str()),
                ("os", server.os.as_str()),
                ("ver", server.client_version.as_str()),
                ("code", code),
                ("openID", ""),
            ],
        )
        .map_err(|e| SessionError::Transport(format!("invalid server url: {e}")))?;

        Ok(Self {
            url,
            user_agent: server.user_agent.clone(),
            origin: server.origin.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self) -> Result<Link> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(transport)?;
        let headers = request.headers_mut();
        headers.insert(
            "User-Agent",
            HeaderValue::from_str(&self.user_agent).map_err(transport)?,
        );
        headers.insert("Origin", HeaderValue::from_str(&self.origin).map_err(transport)?);

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(transport)?;
        debug!(target: "sprout::session", status = %response.status(), "websocket handshake complete");

        let (sink, source) = stream.split();
        Ok(Link::new(WsSink { inner: sink }, WsSource { inner: source }))
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        self.inner
            .send(Message::Binary(frame))
            .await
            .map_err(transport)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await.map_err(transport)
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Binary(frame)) => return Some(Ok(frame)),
                Ok(Message::Close(frame)) => {
                    debug!(target: "sprout::session", ?frame, "peer closed websocket");
                    return None;
                }
                // Pings are answered by tungstenite; text frames are not part
                // of the protocol.
                Ok(_) => continue,
                Err(e) => return Some(Err(transport(e))),
            }
        }
    }
}

fn transport(err: impl std::fmt::Display) -> SessionError {
    SessionError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Platform, ServerConfig};

    #[test]
    fn test_query_carries_login_parameters() {
        let server = ServerConfig {
            platform: Platform::Wx,
            ..ServerConfig::default()
        };
        let connector = WsConnector::new(&server, "abc123").unwrap();
        let url = connector.url();

        assert_eq!(url.host_str(), Some("gate-obt.nqf.qq.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("platform".into(), "wx".into()));
        assert_eq!(pairs[1], ("os".into(), "iOS".into()));
        assert_eq!(pairs[3], ("code".into(), "abc123".into()));
        assert_eq!(pairs[4], ("openID".into(), String::new()));
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let server = ServerConfig {
            url: "not a url".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            WsConnector::new(&server, "x"),
            Err(SessionError::Transport(_))
        ));
    }
}
