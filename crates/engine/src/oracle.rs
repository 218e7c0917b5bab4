//! Best-effort remote existence check for skip detection.

use tracing::debug;

use crate::store::ObjectStore;

/// Returns true only if the object exists at the destination and its
/// reported size equals `expected_size` exactly.
///
/// Any query error, including not-found, is treated as "absent". This
/// is an optimization for skip detection, not a correctness check:
/// size equality does not detect same-size corruption. Integrity is
/// provided by the checksum metadata attached during actual upload,
/// not by this check.
pub async fn object_exists_with_size(
    store: &dyn ObjectStore,
    key: &str,
    expected_size: u64,
) -> bool {
    match store.head_object(key).await {
        Ok(meta) => meta.size == expected_size,
        Err(e) => {
            debug!(key, error = %e, "head query failed, treating object as absent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ObjectMetadata, ProgressFn, StoreError, UploadRequest};
    use std::future::Future;
    use std::pin::Pin;

    struct FixedHead {
        result: Result<u64, ()>,
    }

    impl ObjectStore for FixedHead {
        fn head_object<'a>(
            &'a self,
            key: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + 'a>>
        {
            Box::pin(async move {
                match self.result {
                    Ok(size) => Ok(ObjectMetadata { size }),
                    Err(()) => Err(StoreError::NotFound(key.to_string())),
                }
            })
        }

        fn upload_file<'a>(
            &'a self,
            _request: &'a UploadRequest,
            _progress: ProgressFn,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn matching_size_is_true() {
        let store = FixedHead { result: Ok(1024) };
        assert!(object_exists_with_size(&store, "a", 1024).await);
    }

    #[tokio::test]
    async fn size_mismatch_is_false() {
        let store = FixedHead { result: Ok(1023) };
        assert!(!object_exists_with_size(&store, "a", 1024).await);
    }

    #[tokio::test]
    async fn query_error_is_false() {
        let store = FixedHead { result: Err(()) };
        assert!(!object_exists_with_size(&store, "a", 1024).await);
    }
}
