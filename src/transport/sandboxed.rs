//! Transport for sandboxed hosts
//!
//! The host has no filesystem the engine may write to. Exports are offered
//! to the user as downloads and imports come back as uploads.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ExchangeError, ExchangeResult};

use super::{Location, Transport};

/// Capabilities a sandboxed host exposes
#[async_trait]
pub trait SandboxHost: Send + Sync {
    /// Offer bytes as a download; returns the file name the host used
    async fn offer_download(&self, file_name: &str, bytes: Vec<u8>) -> ExchangeResult<String>;

    /// Ask the user for a file; `None` if they cancelled
    async fn request_upload(&self) -> ExchangeResult<Option<Vec<u8>>>;
}

/// Transport over a `SandboxHost`
pub struct SandboxedTransport<H: SandboxHost> {
    host: H,
}

impl<H: SandboxHost> SandboxedTransport<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

#[async_trait]
impl<H: SandboxHost> Transport for SandboxedTransport<H> {
    async fn write(&self, name_hint: &str, bytes: &[u8]) -> ExchangeResult<Location> {
        let name = self.host.offer_download(name_hint, bytes.to_vec()).await?;
        info!(name = %name, bytes = bytes.len(), "Snapshot offered for download");
        Ok(Location::Download(name))
    }

    async fn read(&self) -> ExchangeResult<Vec<u8>> {
        self.host
            .request_upload()
            .await?
            .ok_or(ExchangeError::NoFileSelected)
    }
}

/// In-process host that records downloads and serves queued uploads
#[derive(Debug, Default)]
pub struct MemoryHost {
    downloads: Mutex<Vec<(String, Vec<u8>)>>,
    uploads: Mutex<VecDeque<Vec<u8>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the next `request_upload`
    pub async fn queue_upload(&self, bytes: Vec<u8>) {
        self.uploads.lock().await.push_back(bytes);
    }

    /// Downloads offered so far, oldest first
    pub async fn downloads(&self) -> Vec<(String, Vec<u8>)> {
        self.downloads.lock().await.clone()
    }

    /// Bytes of the most recent download
    pub async fn last_download(&self) -> Option<Vec<u8>> {
        self.downloads.lock().await.last().map(|(_, b)| b.clone())
    }
}

#[async_trait]
impl SandboxHost for MemoryHost {
    async fn offer_download(&self, file_name: &str, bytes: Vec<u8>) -> ExchangeResult<String> {
        self.downloads
            .lock()
            .await
            .push((file_name.to_string(), bytes));
        Ok(file_name.to_string())
    }

    async fn request_upload(&self) -> ExchangeResult<Option<Vec<u8>>> {
        Ok(self.uploads.lock().await.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_offers_download() {
        let transport = SandboxedTransport::new(MemoryHost::new());

        let location = transport.write("export.json", b"{}").await.unwrap();

        assert_eq!(location, Location::Download("export.json".into()));
        assert_eq!(
            transport.host().downloads().await,
            vec![("export.json".to_string(), b"{}".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_read_consumes_uploads_in_order() {
        let transport = SandboxedTransport::new(MemoryHost::new());
        transport.host().queue_upload(b"first".to_vec()).await;
        transport.host().queue_upload(b"second".to_vec()).await;

        assert_eq!(transport.read().await.unwrap(), b"first");
        assert_eq!(transport.read().await.unwrap(), b"second");
        assert!(matches!(
            transport.read().await.unwrap_err(),
            ExchangeError::NoFileSelected
        ));
    }
}
