//! Checkpoint resolution and restored-value initializers
//!
//! The restore orchestrator talks to checkpoints through two small
//! interfaces: [`CheckpointResolver`] turns a logical checkpoint identifier
//! into a concrete handle and lists the tensors stored in it, and
//! [`RestoreInitializerFactory`] builds the per-tensor value initializers
//! bound to `(checkpoint_id, leaf_name, sub_scope)`.
//!
//! Two implementations ship with the engine: [`DirCheckpointStore`] over a
//! directory of JSON manifests, and [`MemoryCheckpointStore`] for embedding
//! and tests.

use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use voxelflow_core::{dtype_from_type, DType, EngineError, Result, Shape, Tensor};

/// A resolved checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHandle {
    checkpoint_id: String,
    location: String,
}

impl CheckpointHandle {
    pub fn new(checkpoint_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            checkpoint_id: checkpoint_id.into(),
            location: location.into(),
        }
    }

    pub fn checkpoint_id(&self) -> &str {
        &self.checkpoint_id
    }

    /// Human-readable location, for diagnostics
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// One stored tensor as reported by a checkpoint listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorEntry {
    pub name: String,
    pub shape: Shape,
}

/// Resolves logical checkpoint identifiers and lists checkpoint contents
///
/// Treated as an external service: resolution failure is fatal for graph
/// setup and is never retried.
pub trait CheckpointResolver {
    /// Resolve a checkpoint identifier to a concrete handle
    fn resolve(&self, checkpoint_id: &str) -> Result<CheckpointHandle>;

    /// The named tensors stored in the checkpoint, in stored order
    fn list_entries(&self, handle: &CheckpointHandle) -> Result<Vec<TensorEntry>>;
}

/// Materializes a single restored tensor value for a given shape and dtype
pub type ValueInitializer<T> = Box<dyn Fn(&Shape, DType) -> Result<Tensor<T>> + Send + Sync>;

/// Builds value initializers bound to one stored tensor of one checkpoint
pub trait RestoreInitializerFactory<T> {
    fn make_initializer(
        &self,
        checkpoint_id: &str,
        leaf_name: &str,
        sub_scope: Option<&str>,
    ) -> Result<ValueInitializer<T>>;
}

/// Serialized form of one tensor inside a checkpoint manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTensor {
    shape: Vec<usize>,
    values: Vec<f64>,
}

/// On-disk checkpoint format: a map from stored name to tensor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointManifest {
    tensors: BTreeMap<String, StoredTensor>,
}

fn stored_name(leaf_name: &str, sub_scope: Option<&str>) -> String {
    match sub_scope {
        Some(scope) => format!("{}/{}", scope, leaf_name),
        None => leaf_name.to_string(),
    }
}

fn initializer_from_stored<T>(
    stored: StoredTensor,
    checkpoint_id: String,
    name: String,
) -> ValueInitializer<T>
where
    T: FromPrimitive + Clone + Send + Sync + 'static,
{
    Box::new(move |shape: &Shape, dtype: DType| {
        if dtype != dtype_from_type::<T>() {
            return Err(EngineError::invalid_argument(
                "restore_initializer",
                format!(
                    "requested dtype {} does not match stored element type {}",
                    dtype,
                    dtype_from_type::<T>()
                ),
            ));
        }
        if stored.shape != shape.dims() {
            return Err(EngineError::shape_mismatch(
                "restore_initializer",
                shape.to_string(),
                Shape::from_slice(&stored.shape).to_string(),
            ));
        }
        let values = stored
            .values
            .iter()
            .map(|&v| {
                T::from_f64(v).ok_or_else(|| {
                    EngineError::serialization(
                        "restore_initializer",
                        format!(
                            "value in tensor '{}' of checkpoint '{}' not representable",
                            name, checkpoint_id
                        ),
                    )
                })
            })
            .collect::<Result<Vec<T>>>()?;
        Tensor::from_vec(shape.dims(), values)
    })
}

fn manifest_to_stored<T>(entries: &[(&str, &Tensor<T>)]) -> Result<CheckpointManifest>
where
    T: ToPrimitive,
{
    let mut tensors = BTreeMap::new();
    for (name, tensor) in entries {
        let values = tensor
            .data()
            .iter()
            .map(|v| {
                v.to_f64().ok_or_else(|| {
                    EngineError::serialization(
                        "save_checkpoint",
                        format!("value in tensor '{}' not representable as f64", name),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        tensors.insert(
            name.to_string(),
            StoredTensor {
                shape: tensor.shape().to_vec(),
                values,
            },
        );
    }
    Ok(CheckpointManifest { tensors })
}

fn manifest_entries(manifest: &CheckpointManifest) -> Vec<TensorEntry> {
    manifest
        .tensors
        .iter()
        .map(|(name, stored)| TensorEntry {
            name: name.clone(),
            shape: Shape::from_slice(&stored.shape),
        })
        .collect()
}

fn lookup_stored(
    manifest: &CheckpointManifest,
    checkpoint_id: &str,
    name: &str,
) -> Result<StoredTensor> {
    manifest.tensors.get(name).cloned().ok_or_else(|| {
        EngineError::invalid_argument(
            "make_initializer",
            format!(
                "tensor '{}' not stored in checkpoint '{}'",
                name, checkpoint_id
            ),
        )
    })
}

/// Checkpoint store over a directory of `<id>.json` manifests
///
/// Identifiers that are themselves paths to existing manifest files resolve
/// directly; everything else resolves relative to the store root. Loaded
/// manifests are cached for the lifetime of the store.
pub struct DirCheckpointStore {
    root: PathBuf,
    cache: Mutex<HashMap<String, Arc<CheckpointManifest>>>,
}

impl DirCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                EngineError::io(
                    "DirCheckpointStore::new",
                    format!("failed to create checkpoint directory: {}", e),
                    Some(root.display().to_string()),
                )
            })?;
        }
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checkpoint_path(&self, checkpoint_id: &str) -> PathBuf {
        let direct = PathBuf::from(checkpoint_id);
        if direct.is_file() {
            direct
        } else {
            self.root.join(format!("{}.json", checkpoint_id))
        }
    }

    /// Write a checkpoint manifest, replacing any previous one with this id
    pub fn save_checkpoint<T>(
        &self,
        checkpoint_id: &str,
        entries: &[(&str, &Tensor<T>)],
    ) -> Result<PathBuf>
    where
        T: ToPrimitive,
    {
        let manifest = manifest_to_stored(entries)?;
        let serialized = serde_json::to_string_pretty(&manifest).map_err(|e| {
            EngineError::serialization(
                "save_checkpoint",
                format!("failed to serialize checkpoint: {}", e),
            )
        })?;
        let path = self.root.join(format!("{}.json", checkpoint_id));
        std::fs::write(&path, serialized).map_err(|e| {
            EngineError::io(
                "save_checkpoint",
                format!("failed to write checkpoint: {}", e),
                Some(path.display().to_string()),
            )
        })?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(checkpoint_id);
        }
        log::debug!("saved checkpoint '{}' to {}", checkpoint_id, path.display());
        Ok(path)
    }

    fn load_manifest(&self, checkpoint_id: &str) -> Result<Arc<CheckpointManifest>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(manifest) = cache.get(checkpoint_id) {
                return Ok(Arc::clone(manifest));
            }
        }
        let path = self.checkpoint_path(checkpoint_id);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            EngineError::checkpoint_not_found(
                checkpoint_id,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        let manifest: CheckpointManifest = serde_json::from_str(&content).map_err(|e| {
            EngineError::serialization(
                "load_manifest",
                format!("invalid checkpoint manifest {}: {}", path.display(), e),
            )
        })?;
        let manifest = Arc::new(manifest);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(checkpoint_id.to_string(), Arc::clone(&manifest));
        }
        Ok(manifest)
    }
}

impl CheckpointResolver for DirCheckpointStore {
    fn resolve(&self, checkpoint_id: &str) -> Result<CheckpointHandle> {
        let path = self.checkpoint_path(checkpoint_id);
        if !path.is_file() {
            return Err(EngineError::checkpoint_not_found(
                checkpoint_id,
                format!("no checkpoint file at {}", path.display()),
            ));
        }
        log::debug!("resolved checkpoint '{}' to {}", checkpoint_id, path.display());
        Ok(CheckpointHandle::new(
            checkpoint_id,
            path.display().to_string(),
        ))
    }

    fn list_entries(&self, handle: &CheckpointHandle) -> Result<Vec<TensorEntry>> {
        let manifest = self.load_manifest(handle.checkpoint_id())?;
        Ok(manifest_entries(&manifest))
    }
}

impl<T> RestoreInitializerFactory<T> for DirCheckpointStore
where
    T: FromPrimitive + Clone + Send + Sync + 'static,
{
    fn make_initializer(
        &self,
        checkpoint_id: &str,
        leaf_name: &str,
        sub_scope: Option<&str>,
    ) -> Result<ValueInitializer<T>> {
        let manifest = self.load_manifest(checkpoint_id)?;
        let name = stored_name(leaf_name, sub_scope);
        let stored = lookup_stored(&manifest, checkpoint_id, &name)?;
        Ok(initializer_from_stored(
            stored,
            checkpoint_id.to_string(),
            name,
        ))
    }
}

/// In-memory checkpoint store for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: HashMap<String, CheckpointManifest>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one tensor under a checkpoint id, creating the checkpoint on
    /// first use
    pub fn add_tensor<T>(
        &mut self,
        checkpoint_id: &str,
        name: &str,
        tensor: &Tensor<T>,
    ) -> Result<()>
    where
        T: ToPrimitive,
    {
        let manifest = manifest_to_stored(&[(name, tensor)])?;
        let checkpoint = self
            .checkpoints
            .entry(checkpoint_id.to_string())
            .or_default();
        checkpoint.tensors.extend(manifest.tensors);
        Ok(())
    }
}

impl CheckpointResolver for MemoryCheckpointStore {
    fn resolve(&self, checkpoint_id: &str) -> Result<CheckpointHandle> {
        if !self.checkpoints.contains_key(checkpoint_id) {
            return Err(EngineError::checkpoint_not_found(
                checkpoint_id,
                "no such checkpoint in memory store",
            ));
        }
        Ok(CheckpointHandle::new(
            checkpoint_id,
            format!("memory:{}", checkpoint_id),
        ))
    }

    fn list_entries(&self, handle: &CheckpointHandle) -> Result<Vec<TensorEntry>> {
        let manifest = self
            .checkpoints
            .get(handle.checkpoint_id())
            .ok_or_else(|| {
                EngineError::checkpoint_not_found(
                    handle.checkpoint_id(),
                    "no such checkpoint in memory store",
                )
            })?;
        Ok(manifest_entries(manifest))
    }
}

impl<T> RestoreInitializerFactory<T> for MemoryCheckpointStore
where
    T: FromPrimitive + Clone + Send + Sync + 'static,
{
    fn make_initializer(
        &self,
        checkpoint_id: &str,
        leaf_name: &str,
        sub_scope: Option<&str>,
    ) -> Result<ValueInitializer<T>> {
        let manifest = self.checkpoints.get(checkpoint_id).ok_or_else(|| {
            EngineError::checkpoint_not_found(checkpoint_id, "no such checkpoint in memory store")
        })?;
        let name = stored_name(leaf_name, sub_scope);
        let stored = lookup_stored(manifest, checkpoint_id, &name)?;
        Ok(initializer_from_stored(
            stored,
            checkpoint_id.to_string(),
            name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_dir_store_save_resolve_list() {
        let dir = TempDir::new().unwrap();
        let store = DirCheckpointStore::new(dir.path()).unwrap();
        let w = Tensor::<f32>::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        store
            .save_checkpoint("pretrained", &[("net/conv/w", &w)])
            .unwrap();

        let handle = store.resolve("pretrained").unwrap();
        assert_eq!(handle.checkpoint_id(), "pretrained");
        let entries = store.list_entries(&handle).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "net/conv/w");
        assert_eq!(entries[0].shape, Shape::from_slice(&[2, 2]));
    }

    #[test]
    fn test_dir_store_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = DirCheckpointStore::new(dir.path()).unwrap();
        let err = store.resolve("absent").unwrap_err();
        assert!(matches!(err, EngineError::CheckpointNotFound { .. }));
    }

    #[test]
    fn test_dir_store_initializer_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = DirCheckpointStore::new(dir.path()).unwrap();
        let w = Tensor::<f32>::from_vec(&[2], vec![0.5, 1.5]).unwrap();
        store
            .save_checkpoint("pretrained", &[("net/conv/w", &w)])
            .unwrap();

        let initializer: ValueInitializer<f32> = store
            .make_initializer("pretrained", "w", Some("net/conv"))
            .unwrap();
        let restored = initializer(&Shape::from_slice(&[2]), DType::Float32).unwrap();
        assert_relative_eq!(restored.get(&[0]).unwrap(), 0.5);
        assert_relative_eq!(restored.get(&[1]).unwrap(), 1.5);
    }

    #[test]
    fn test_initializer_rejects_wrong_shape() {
        let mut store = MemoryCheckpointStore::new();
        let w = Tensor::<f32>::from_vec(&[2], vec![0.5, 1.5]).unwrap();
        store.add_tensor("ckpt", "w", &w).unwrap();

        let initializer: ValueInitializer<f32> =
            store.make_initializer("ckpt", "w", None).unwrap();
        let err = initializer(&Shape::from_slice(&[3]), DType::Float32).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_memory_store_resolve_and_list() {
        let mut store = MemoryCheckpointStore::new();
        store
            .add_tensor("ckpt", "a/b", &Tensor::<f32>::zeros(&[1]))
            .unwrap();
        store
            .add_tensor("ckpt", "a/c", &Tensor::<f32>::zeros(&[1]))
            .unwrap();

        let handle = store.resolve("ckpt").unwrap();
        let names: Vec<_> = store
            .list_entries(&handle)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a/b", "a/c"]);
        assert!(store.resolve("other").is_err());
    }

    #[test]
    fn test_stored_name_with_and_without_subscope() {
        assert_eq!(stored_name("leaf", Some("ckpt/sub")), "ckpt/sub/leaf");
        assert_eq!(stored_name("leaf", None), "leaf");
    }
}
