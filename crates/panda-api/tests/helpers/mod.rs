//! Test helpers: build AppState and router over a temporary local storage.
//!
//! Run from workspace root: `cargo test -p panda-api --test images_test`.

use axum_test::TestServer;
use panda_api::setup::routes;
use panda_api::state::AppState;
use panda_core::ImageUpload;
use panda_services::{LocalStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

/// Test application: server plus the storage it serves from.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<dyn Storage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Store an image directly through the backend and return its key.
    pub async fn store_image(&self, name: &str, data: &[u8]) -> String {
        self.storage
            .store(&ImageUpload::new(data.to_vec(), name, "image/png"))
            .await
            .expect("Failed to store test image")
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage_path = temp_dir.path().join("listings");

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(storage_path)
            .await
            .expect("Failed to create local storage"),
    );

    let state = Arc::new(AppState::new(storage.clone()));
    let app = routes::setup_routes(state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        _temp_dir: temp_dir,
    }
}
