//! Frame transport seam.
//!
//! The session only needs two halves: an exclusive writer and a sequential
//! reader of whole binary frames. Splitting them lets the receive loop own
//! the reader while callers contend for the writer behind a mutex.

mod ws;

pub use ws::WsConnector;

use async_trait::async_trait;

use crate::error::Result;

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next binary frame. `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>>;
}

/// An open connection, split into its two halves.
pub struct Link {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

impl Link {
    pub fn new(sink: impl FrameSink + 'static, source: impl FrameSource + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            source: Box::new(source),
        }
    }
}

/// Opens connections for a [`Session`](crate::Session).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Link>;
}
