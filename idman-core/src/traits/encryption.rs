//! Encryption provider seam. The concrete provider is an external
//! collaborator; the core only threads its metadata through storage.

use async_trait::async_trait;

use crate::errors::IdmanResult;
use crate::models::EncryptionMetadata;

/// Encrypts and decrypts backup payloads.
#[async_trait]
pub trait IEncryptionProvider: Send + Sync {
    async fn encrypt(
        &self,
        data: Vec<u8>,
        key_id: Option<&str>,
    ) -> IdmanResult<(Vec<u8>, EncryptionMetadata)>;

    async fn decrypt(
        &self,
        data: Vec<u8>,
        metadata: &EncryptionMetadata,
    ) -> IdmanResult<Vec<u8>>;
}

/// Pass-through provider used when encryption is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEncryption;

#[async_trait]
impl IEncryptionProvider for NoopEncryption {
    async fn encrypt(
        &self,
        data: Vec<u8>,
        _key_id: Option<&str>,
    ) -> IdmanResult<(Vec<u8>, EncryptionMetadata)> {
        Ok((data, EncryptionMetadata::default()))
    }

    async fn decrypt(
        &self,
        data: Vec<u8>,
        _metadata: &EncryptionMetadata,
    ) -> IdmanResult<Vec<u8>> {
        Ok(data)
    }
}
