use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::ByteStream;

use crate::error::StorageError;

/// A fetched state object and the ETag it was read at.
pub struct VersionedObject {
    pub body: Vec<u8>,
    pub etag: String,
}

/// Write guard for [`put_versioned`].
#[derive(Debug, Clone)]
pub enum WriteCondition {
    /// Only succeed if the object is still at this ETag.
    IfMatch(String),
    /// Only succeed if no object exists yet.
    IfAbsent,
}

/// Get an object. Returns `Ok(None)` when the key does not exist.
pub async fn get_versioned(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<Option<VersionedObject>, StorageError> {
    let resp = match client.get_object().bucket(bucket).key(key).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                return Ok(None);
            }
            return Err(StorageError::GetObject(err.to_string()));
        }
    };

    let etag = resp.e_tag().unwrap_or_default().to_string();
    let body = resp
        .body
        .collect()
        .await
        .map_err(|e| StorageError::GetObject(e.to_string()))?
        .into_bytes()
        .to_vec();

    Ok(Some(VersionedObject { body, etag }))
}

/// Conditionally put a JSON object. Returns the new ETag, or
/// `StorageError::PreconditionFailed` if the condition did not hold.
pub async fn put_versioned(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    condition: &WriteCondition,
) -> Result<String, StorageError> {
    let mut req = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type("application/json");

    req = match condition {
        WriteCondition::IfMatch(etag) => req.if_match(etag),
        WriteCondition::IfAbsent => req.if_none_match("*"),
    };

    let resp = req.send().await.map_err(|e| {
        let err = e.into_service_error();
        // S3 answers 412 PreconditionFailed (or 409 ConditionalRequestConflict
        // under concurrent writers) when the guard does not hold.
        let msg = err.to_string();
        if msg.contains("PreconditionFailed") || msg.contains("ConditionalRequestConflict") {
            StorageError::PreconditionFailed {
                key: key.to_string(),
            }
        } else {
            StorageError::PutObject(msg)
        }
    })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}
