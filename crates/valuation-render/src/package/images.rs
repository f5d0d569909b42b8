use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{BackendError, PackageBackend};
use super::model::PackagePatch;
use super::slots::{ImageSlot, UnknownSlot};

#[derive(Debug, thiserror::Error)]
pub enum ImageSaveError {
    #[error(transparent)]
    UnknownSlot(#[from] UnknownSlot),
    #[error("image could not be saved: {0}")]
    SaveFailed(#[from] BackendError),
}

/// Writes image URLs chosen in the editor back onto the package record.
#[derive(Clone)]
pub struct ImageAssignmentService {
    backend: Arc<dyn PackageBackend>,
}

impl ImageAssignmentService {
    pub fn new(backend: Arc<dyn PackageBackend>) -> Self {
        Self { backend }
    }

    /// Resolves `slot_id` through the slot registry before anything is sent,
    /// so an unknown slot never produces a backend write.
    pub async fn assign(
        &self,
        package_id: &str,
        slot_id: &str,
        url: &str,
    ) -> Result<ImageSlot, ImageSaveError> {
        let slot = slot_id.parse::<ImageSlot>().map_err(|err| {
            warn!(package_id, slot_id, "rejected image for unknown slot");
            ImageSaveError::from(err)
        })?;

        let patch = PackagePatch::image(slot, url);
        if let Err(err) = self.backend.update_package(package_id, &patch).await {
            warn!(package_id, %slot, error = %err, "image save failed");
            return Err(err.into());
        }

        info!(package_id, %slot, field = slot.field(), "image saved");
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::model::FullPackage;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        updates: Mutex<Vec<(String, Value)>>,
        reject_with: Option<u16>,
    }

    #[async_trait]
    impl PackageBackend for RecordingBackend {
        async fn full_package(&self, _package_id: &str) -> Result<FullPackage, BackendError> {
            Ok(FullPackage::default())
        }

        async fn update_package(
            &self,
            package_id: &str,
            patch: &PackagePatch,
        ) -> Result<(), BackendError> {
            self.updates.lock().expect("updates mutex").push((
                package_id.to_string(),
                serde_json::to_value(patch).expect("patch serializes"),
            ));
            match self.reject_with {
                Some(status) => Err(BackendError::Status {
                    url: "memory".to_string(),
                    status,
                }),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn photo_slot_updates_numbered_column() {
        let backend = Arc::new(RecordingBackend::default());
        let service = ImageAssignmentService::new(backend.clone());

        let slot = service
            .assign("42", "photo-2", "http://x/b.png")
            .await
            .expect("save succeeds");

        assert_eq!(slot, ImageSlot::PropertyPhoto2);
        assert_eq!(
            *backend.updates.lock().unwrap(),
            vec![(
                "42".to_string(),
                json!({ "package": { "property_image_2": "http://x/b.png" } })
            )]
        );
    }

    #[tokio::test]
    async fn unknown_slot_never_reaches_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let service = ImageAssignmentService::new(backend.clone());

        let err = service
            .assign("42", "page-99", "http://x/c.png")
            .await
            .expect_err("unknown slot rejected");

        assert!(matches!(
            err,
            ImageSaveError::UnknownSlot(UnknownSlot(ref id)) if id == "page-99"
        ));
        assert!(backend.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_saves_write_the_same_value() {
        let backend = Arc::new(RecordingBackend::default());
        let service = ImageAssignmentService::new(backend.clone());

        let first = service.assign("8", "side-img", "http://x/s.png").await;
        let second = service.assign("8", "side-img", "http://x/s.png").await;

        assert_eq!(first.ok(), Some(ImageSlot::TableOfContentsSide));
        assert_eq!(second.ok(), Some(ImageSlot::TableOfContentsSide));
        let updates = backend.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], updates[1]);
    }

    #[tokio::test]
    async fn backend_rejection_is_save_failed() {
        let backend = Arc::new(RecordingBackend {
            reject_with: Some(422),
            ..RecordingBackend::default()
        });
        let service = ImageAssignmentService::new(backend);

        assert!(matches!(
            service.assign("42", "page-1", "http://x/a.png").await,
            Err(ImageSaveError::SaveFailed(BackendError::Status { status: 422, .. }))
        ));
    }
}
