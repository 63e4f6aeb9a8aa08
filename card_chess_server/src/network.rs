use async_tungstenite::WebSocketStream;
use futures_io::{AsyncRead, AsyncWrite};
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use serde::{de, Serialize};
use tungstenite::Message;


pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug)]
pub enum CommunicationError {
    ConnectionClosed,
    Socket(tungstenite::Error),
    Serde(serde_json::Error),
    Protocol(String),
}

pub async fn write_obj_async<T, S>(
    stream: &mut SplitSink<WebSocketStream<S>, Message>, obj: &T,
) -> Result<(), CommunicationError>
where
    T: Serialize,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let serialized = serde_json::to_string(obj).map_err(CommunicationError::Serde)?;
    stream.send(Message::Text(serialized.into())).await.map_err(|err| match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            CommunicationError::ConnectionClosed
        }
        err => CommunicationError::Socket(err),
    })
}

pub async fn read_obj_async<T, S>(
    stream: &mut SplitStream<WebSocketStream<S>>,
) -> Result<T, CommunicationError>
where
    T: de::DeserializeOwned,
    S: AsyncRead + AsyncWrite + Unpin,
{
    match stream.next().await {
        None => Err(CommunicationError::ConnectionClosed),
        Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
            Err(CommunicationError::ConnectionClosed)
        }
        Some(Err(err)) => Err(CommunicationError::Socket(err)),
        Some(Ok(Message::Text(text))) => {
            serde_json::from_str(&text).map_err(CommunicationError::Serde)
        }
        Some(Ok(Message::Close(_))) => Err(CommunicationError::ConnectionClosed),
        Some(Ok(message)) => {
            Err(CommunicationError::Protocol(format!("Expected text, got {message:?}")))
        }
    }
}
