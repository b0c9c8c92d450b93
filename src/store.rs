use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat};
use uuid::Uuid;

use crate::errors::{Result, SegError};

/// URL prefix the mask directory is served under.
pub const MASKS_URL_PREFIX: &str = "/static/masks";

/// Append-only directory of generated mask PNGs.
///
/// Names are fresh v4 UUIDs, so concurrent writers never collide and nothing
/// from the upload leaks into the path.
#[derive(Debug, Clone)]
pub struct MaskStore {
    dir: PathBuf,
}

impl MaskStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SegError::FileSystem {
            path: dir.clone(),
            operation: "create masks directory".to_string(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `mask` as `<uuid>.png` and returns the bare file name.
    pub fn save(&self, mask: &GrayImage) -> Result<String> {
        let name = format!("{}.png", Uuid::new_v4());
        let path = self.dir.join(&name);
        mask.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| SegError::ImageProcessing {
                operation: format!("write mask {}", path.display()),
                source: Box::new(e),
            })?;
        tracing::debug!(path = %path.display(), "mask saved");
        Ok(name)
    }

    /// Maps a requested file name back to a path, accepting only names this
    /// store could have produced.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let stem = name.strip_suffix(".png")?;
        let id = Uuid::try_parse(stem).ok()?;
        Some(self.dir.join(format!("{}.png", id.hyphenated())))
    }

    pub fn url_for(name: &str) -> String {
        format!("{MASKS_URL_PREFIX}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::TempDir;

    #[test]
    fn save_writes_uuid_named_png() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = MaskStore::open(temp_dir.path().join("static/masks"))?;

        let name = store.save(&GrayImage::from_pixel(5, 7, Luma([255])))?;
        let path = store.resolve(&name).expect("saved name resolves");
        assert!(path.exists());

        let saved = image::open(&path)?.to_luma8();
        assert_eq!(saved.dimensions(), (5, 7));
        Ok(())
    }

    #[test]
    fn names_are_unique() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = MaskStore::open(temp_dir.path())?;
        let mask = GrayImage::new(1, 1);

        assert_ne!(store.save(&mask)?, store.save(&mask)?);
        assert_eq!(fs::read_dir(store.dir())?.count(), 2);
        Ok(())
    }

    #[test]
    fn resolve_rejects_foreign_names() {
        let store = MaskStore {
            dir: PathBuf::from("masks"),
        };
        assert!(store.resolve("../secret.png").is_none());
        assert!(store.resolve("not-a-uuid.png").is_none());
        assert!(store
            .resolve("67e55044-10b1-426f-9247-bb680e5fe0c8.jpg")
            .is_none());
        assert_eq!(
            store.resolve("67e55044-10b1-426f-9247-bb680e5fe0c8.png"),
            Some(PathBuf::from("masks/67e55044-10b1-426f-9247-bb680e5fe0c8.png"))
        );
    }

    #[test]
    fn url_points_under_static_masks() {
        assert_eq!(MaskStore::url_for("a.png"), "/static/masks/a.png");
    }
}
