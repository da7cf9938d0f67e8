use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use image::{imageops::FilterType, ImageError};
use ndarray::Array3;
use nshare::ToNdarray3;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Decodes the heavy artifact behind a decode key.
pub trait Decoder {
    type Artifact: Clone + Serialize + DeserializeOwned;

    fn decode(&self, path: &Path) -> Result<Self::Artifact>;
}

/// Decodes images into `(channels, height, width)` float tensors in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageDecoder {
    /// Images of another size are resized to this `(height, width)`.
    pub target_size: Option<(usize, usize)>,
}

impl ImageDecoder {
    pub fn with_target_size(target_size: (usize, usize)) -> Self {
        Self {
            target_size: Some(target_size),
        }
    }

    pub fn open(&self, path: &Path) -> std::result::Result<Array3<f32>, ImageError> {
        let mut image = image::open(path)?.into_rgb8();
        if let Some((height, width)) = self.target_size {
            let (width, height) = (width as u32, height as u32);
            if image.dimensions() != (width, height) {
                image = image::imageops::resize(&image, width, height, FilterType::Triangle);
            }
        }
        Ok(image.into_ndarray3().mapv(|v| v as f32 / 255.0))
    }
}

impl Decoder for ImageDecoder {
    type Artifact = Array3<f32>;

    fn decode(&self, path: &Path) -> Result<Self::Artifact> {
        Ok(self.open(path)?)
    }
}

/// Process-wide memo of decoded artifacts keyed by their path.
///
/// Entries are never evicted. The cache is a pure performance layer: loading a
/// missing or corrupt file yields an empty cache instead of an error.
///
/// Lookups are safe from any thread. Two threads missing the same key both
/// decode it and the last insert wins; call [`SampleCache::warm_up`] before
/// concurrent access to avoid the duplicate work.
#[derive(Debug)]
pub struct SampleCache<A> {
    entries: RwLock<HashMap<String, Arc<A>>>,
}

impl<A> Default for SampleCache<A> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<A> SampleCache<A> {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already decoded mapping.
    pub fn from_existing_mapping(mapping: HashMap<String, A>) -> Self {
        Self {
            entries: RwLock::new(
                mapping
                    .into_iter()
                    .map(|(key, artifact)| (key, Arc::new(artifact)))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Stored artifact, without decoding.
    pub fn get(&self, key: &str) -> Option<Arc<A>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns the stored artifact or decodes, stores and returns it.
    pub fn get_or_decode<F, E>(&self, key: &str, decode: F) -> std::result::Result<Arc<A>, E>
    where
        F: FnOnce(&str) -> std::result::Result<A, E>,
    {
        if let Some(artifact) = self.get(key) {
            return Ok(artifact);
        }

        let artifact = Arc::new(decode(key)?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), artifact.clone());
        Ok(artifact)
    }

    /// Decodes every key not cached yet.
    pub fn warm_up<I, S, F, E>(&self, keys: I, mut decode: F) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> std::result::Result<A, E>,
    {
        for key in keys {
            self.get_or_decode(key.as_ref(), &mut decode)?;
        }
        Ok(())
    }
}

impl<A: Serialize + DeserializeOwned> SampleCache<A> {
    /// Cache loaded from `path`, empty if it can't be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let cache = Self::new();
        cache.load(path);
        cache
    }

    fn read_mapping(path: &Path) -> Result<HashMap<String, A>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Replaces the contents with the mapping persisted at `path`.
    ///
    /// On any failure the cache is left empty and a warning is logged.
    pub fn load<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        let loaded = match Self::read_mapping(path) {
            Ok(mapping) => {
                info!(
                    "Successfully loaded {} cached samples from {:?}",
                    mapping.len(),
                    path
                );
                mapping
            }
            Err(err) => {
                warn!(
                    "Failed to load cached samples from {:?} ({}), initialized empty cache",
                    path, err
                );
                HashMap::new()
            }
        };

        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = loaded
            .into_iter()
            .map(|(key, artifact)| (key, Arc::new(artifact)))
            .collect();
    }

    /// Persists the full mapping at `path`.
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let ordered = entries
            .iter()
            .map(|(key, artifact)| (key.as_str(), artifact.as_ref()))
            .collect::<BTreeMap<&str, &A>>();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &ordered)?;
        std::io::Write::flush(&mut writer)?;
        info!("Saved {} cached samples to {:?}", ordered.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use std::cell::Cell;

    #[test]
    fn test_get_or_decode_memoizes() {
        let cache = SampleCache::<Vec<f32>>::new();
        let calls = Cell::new(0);
        let decode = |key: &str| -> Result<Vec<f32>> {
            calls.set(calls.get() + 1);
            Ok(vec![key.len() as f32])
        };

        assert_eq!(*cache.get_or_decode("abc", decode).unwrap(), vec![3.0]);
        assert_eq!(*cache.get_or_decode("abc", decode).unwrap(), vec![3.0]);
        assert_eq!(calls.get(), 1);
        assert!(cache.contains("abc"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_decode_failure_is_not_cached() {
        let cache = SampleCache::<Vec<f32>>::new();
        let result = cache.get_or_decode("bad", |_| Err(EvalError::invalid_parameter("bad")));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_gives_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::<Vec<f32>>::from_path(dir.path().join("missing.json"));
        assert!(cache.is_empty());

        let value = cache
            .get_or_decode("x", |_| Ok::<_, EvalError>(vec![1.0]))
            .unwrap();
        assert_eq!(*value, vec![1.0]);
    }

    #[test]
    fn test_corrupt_file_gives_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let cache = SampleCache::<Vec<f32>>::from_existing_mapping(
            [("stale".to_string(), vec![0.0])].into_iter().collect(),
        );
        cache.load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dump_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = SampleCache::<Array3<f32>>::new();
        let artifact = Array3::from_shape_fn((3, 2, 4), |(c, y, x)| (c * 8 + y * 4 + x) as f32 / 7.0);
        cache
            .get_or_decode("seq/rgb/0.png", |_| Ok::<_, EvalError>(artifact.clone()))
            .unwrap();
        cache.dump(&path).unwrap();

        let restored = SampleCache::<Array3<f32>>::from_path(&path);
        assert_eq!(restored.len(), 1);
        assert_eq!(*restored.get("seq/rgb/0.png").unwrap(), artifact);
    }

    #[test]
    fn test_image_decoder_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        image::RgbImage::from_pixel(8, 6, image::Rgb([255, 0, 51]))
            .save(&path)
            .unwrap();

        let original = ImageDecoder::default().decode(&path).unwrap();
        assert_eq!(original.shape(), &[3, 6, 8]);
        assert_eq!(original[[0, 0, 0]], 1.0);
        assert_eq!(original[[2, 5, 7]], 0.2);

        let resized = ImageDecoder::with_target_size((3, 4)).decode(&path).unwrap();
        assert_eq!(resized.shape(), &[3, 3, 4]);
        assert_eq!(resized[[0, 1, 1]], 1.0);
        assert_eq!(resized[[1, 2, 3]], 0.0);
    }

    #[test]
    fn test_warm_up() {
        let cache = SampleCache::<usize>::new();
        cache
            .warm_up(["a", "bb", "ccc"], |key| Ok::<_, EvalError>(key.len()))
            .unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(*cache.get("bb").unwrap(), 2);
    }
}
