use mime_guess::from_path;
use spin_sdk::http::Response;
use uuid::Uuid;

use crate::common::db::{image_key, image_type_key, Store};
use crate::common::errors::ApiError;
use crate::config::IMAGE_PREFIX;

const ACCEPTED_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

pub fn is_accepted_type(content_type: &str) -> bool {
    ACCEPTED_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(content_type.trim()))
}

/// Last path segment of an image reference, whatever prefix the client kept.
fn file_name(reference: &str) -> Option<&str> {
    let name = reference.trim().rsplit(|c: char| c == '/' || c == '\\').next()?;
    if name.is_empty() || name == ".." || name == "." {
        return None;
    }
    Some(name)
}

/// Saves the upload and returns its public path, `images/<uuid>-<name>`.
pub fn store_image(
    store: &dyn Store,
    original_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> anyhow::Result<String> {
    let base = file_name(original_name).unwrap_or("upload");
    let name = format!("{}-{}", Uuid::new_v4(), base);

    store.set(&image_key(&name), bytes)?;
    store.set(&image_type_key(&name), content_type.as_bytes())?;

    tracing::info!(file = %name, size = bytes.len(), "image stored");
    Ok(format!("{}/{}", IMAGE_PREFIX, name))
}

/// Drops a stored image. Failures are logged and otherwise ignored.
pub fn clear_image(store: &dyn Store, reference: &str) {
    let Some(name) = file_name(reference) else {
        tracing::warn!(reference, "not an image reference, nothing to clear");
        return;
    };

    let result = store
        .delete(&image_key(name))
        .and_then(|_| store.delete(&image_type_key(name)));
    match result {
        Ok(()) => tracing::info!(file = %name, "image cleared"),
        Err(e) => tracing::warn!(file = %name, error = %e, "failed to clear image"),
    }
}

/// `GET /images/<file>`
pub fn serve_image(store: &dyn Store, path: &str) -> anyhow::Result<Response> {
    let encoded = path
        .trim_start_matches('/')
        .trim_start_matches(IMAGE_PREFIX)
        .trim_start_matches('/');
    let decoded = urlencoding::decode(encoded)
        .unwrap_or(std::borrow::Cow::Borrowed(encoded))
        .to_string();

    let name = match file_name(&decoded) {
        Some(name) if name == decoded => name,
        _ => return Ok(ApiError::NotFound("Image not found".to_string()).into()),
    };

    let Some(bytes) = store.get(&image_key(name))? else {
        return Ok(ApiError::NotFound("Image not found".to_string()).into());
    };

    let mime = match store.get(&image_type_key(name))? {
        Some(stored) => String::from_utf8(stored)
            .unwrap_or_else(|_| from_path(name).first_or_octet_stream().to_string()),
        None => from_path(name).first_or_octet_stream().to_string(),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", mime.as_str())
        .body(bytes)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db::MemoryStore;

    #[test]
    fn only_png_and_jpeg_are_accepted() {
        assert!(is_accepted_type("image/png"));
        assert!(is_accepted_type("image/jpeg"));
        assert!(is_accepted_type("image/jpg"));
        assert!(!is_accepted_type("image/gif"));
        assert!(!is_accepted_type("application/pdf"));
    }

    #[test]
    fn stored_image_is_served_back() {
        let store = MemoryStore::new();
        let path = store_image(&store, "cat.png", "image/png", b"\x89PNG").unwrap();
        assert!(path.starts_with("images/"));
        assert!(path.ends_with("-cat.png"));

        let resp = serve_image(&store, &format!("/{}", path)).unwrap();
        assert_eq!(*resp.status(), 200);
        assert_eq!(resp.body(), b"\x89PNG");
    }

    #[test]
    fn client_supplied_directories_are_stripped() {
        let store = MemoryStore::new();
        let path = store_image(&store, "../../etc/passwd.jpg", "image/jpeg", b"x").unwrap();
        assert!(path.ends_with("-passwd.jpg"));
        assert_eq!(path.matches('/').count(), 1);
    }

    #[test]
    fn clear_removes_image() {
        let store = MemoryStore::new();
        let path = store_image(&store, "cat.png", "image/png", b"png").unwrap();

        clear_image(&store, &path);
        let resp = serve_image(&store, &format!("/{}", path)).unwrap();
        assert_eq!(*resp.status(), 404);

        // second release is harmless
        clear_image(&store, &path);
        clear_image(&store, "");
    }
}
