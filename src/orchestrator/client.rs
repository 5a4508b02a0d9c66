//! Client side of the processing round-trip.

use std::io::ErrorKind;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ScrapingConfig;
use crate::observability::metrics;
use crate::protocol::{self, ProcessingRequest, ProcessingResult, ProtocolError};

/// Why a processing round-trip failed.
#[derive(Debug, Error)]
pub enum ProcessingClientError {
    /// Nothing is listening, or the connect attempt timed out.
    #[error("processing server not available: {0}")]
    Unavailable(String),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Talks to the processing server: one connection per request.
#[derive(Debug, Clone)]
pub struct ProcessingClient {
    address: String,
    connect_timeout: Duration,
    reply_timeout: Duration,
}

impl ProcessingClient {
    pub fn new(address: impl Into<String>, connect_timeout: Duration, reply_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            reply_timeout,
        }
    }

    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self::new(
            config.processing_address.clone(),
            Duration::from_secs(config.processing_connect_timeout_secs),
            Duration::from_secs(config.processing_timeout_secs),
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send `request` and return the reply.
    ///
    /// Never fails: an unreachable or misbehaving back-end produces an empty
    /// result carrying an error message.
    pub async fn process(&self, request: &ProcessingRequest) -> ProcessingResult {
        match self.round_trip(request).await {
            Ok(result) => result,
            Err(ProcessingClientError::Unavailable(reason)) => {
                tracing::warn!(address = %self.address, reason = %reason, "Processing server not available");
                ProcessingResult::failed("Processing server not available")
            }
            Err(e) => {
                if let ProcessingClientError::Protocol(p) = &e {
                    metrics::record_protocol_error(p.kind());
                }
                tracing::warn!(address = %self.address, error = %e, "Processing round-trip failed");
                ProcessingResult::failed(format!("Processing failed: {}", e))
            }
        }
    }

    /// One connection, one frame each way, then close.
    pub async fn round_trip(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessingClientError> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                ProcessingClientError::Unavailable(format!("connect timed out after {:?}", self.connect_timeout))
            })?
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused | ErrorKind::NotFound | ErrorKind::AddrNotAvailable => {
                    ProcessingClientError::Unavailable(e.to_string())
                }
                _ => ProcessingClientError::Protocol(ProtocolError::Io(e)),
            })?;

        let exchange = async {
            protocol::send(&mut stream, request).await?;
            protocol::receive::<_, ProcessingResult>(&mut stream).await
        };
        let result = tokio::time::timeout(self.reply_timeout, exchange)
            .await
            .map_err(|_| ProcessingClientError::Timeout(self.reply_timeout))??;

        let _ = stream.shutdown().await;
        Ok(result)
    }
}
