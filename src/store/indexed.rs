// src/store/indexed.rs

//! Create/open/query engine for the indexed store.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::StoreConfig;
use crate::dataset::Dataset;
use crate::error::{FeedError, Result};
use crate::item::{Item, Key, Payload};
use crate::scope::Scope;

use super::format::{checksum, StoreHeader, HEADER_LEN};
use super::registry::{self, StoreHandle};

/// A dataset materialized into a single randomly-seekable file.
///
/// A store is write-once: [`IndexedStore::create_at`] produces the file and
/// [`IndexedStore::open`] yields a strictly read-only store that implements
/// [`Dataset`] and can be wrapped like any other. At most one handle is live
/// per path; opening a path again invalidates the earlier handle.
#[derive(Debug)]
pub struct IndexedStore {
    handle: Arc<StoreHandle>,
    path: PathBuf,
    entries: Arc<Vec<(Key, u64)>>,
    lookup: Arc<HashMap<Key, u64>>,
    offset_keyed: bool,
    scope: Scope,
}

impl IndexedStore {
    /// Writes `dataset` into `sink` in the on-disk layout.
    ///
    /// Items are appended in the order of `keys` (defaulting to the
    /// dataset's own enumeration), each start offset recorded; the index,
    /// the optional context map, and finally the real header follow. On any
    /// failure the sink is left unusable and should be discarded by the
    /// caller.
    pub fn create<D, W>(dataset: &D, mut sink: W, keys: Option<Vec<Key>>) -> Result<()>
    where
        D: Dataset + ?Sized,
        W: Write + Seek,
    {
        sink.write_all(&StoreHeader::placeholder().encode())
            .map_err(sink_error)?;

        let keys = match keys {
            Some(keys) => keys,
            None => dataset.list_keys()?,
        };
        let mut entries: Vec<(Key, u64)> = Vec::with_capacity(keys.len());
        for key in keys {
            let offset = sink.stream_position().map_err(sink_error)?;
            let item = dataset.query_item(&key)?;
            bincode::serialize_into(&mut sink, &item).map_err(|e| {
                FeedError::serialization(format!("failed to serialize item for key {key}: {e}"))
            })?;
            entries.push((key, offset));
        }

        let index_offset = sink.stream_position().map_err(sink_error)?;
        let index_bytes = bincode::serialize(&entries)
            .map_err(|e| FeedError::serialization(format!("failed to serialize index: {e}")))?;
        sink.write_all(&index_bytes).map_err(sink_error)?;

        let scope = dataset.scope();
        if !scope.is_empty() {
            bincode::serialize_into(&mut sink, &scope.flatten()).map_err(|e| {
                FeedError::serialization(format!("failed to serialize context map: {e}"))
            })?;
        }

        let header = StoreHeader {
            index_offset,
            index_checksum: checksum(&index_bytes),
        };
        sink.seek(SeekFrom::Start(0)).map_err(sink_error)?;
        sink.write_all(&header.encode()).map_err(sink_error)?;
        sink.flush().map_err(sink_error)?;
        Ok(())
    }

    /// Materializes `dataset` into a file at `path`.
    ///
    /// Any previously tracked handle for the path is closed first. A failure
    /// mid-write surfaces as `PartialWrite`; the half-written file is left
    /// for the caller to discard (see
    /// [`create_or_open`](crate::store::create_or_open)).
    pub fn create_at<D: Dataset + ?Sized>(
        dataset: &D,
        path: impl AsRef<Path>,
        keys: Option<Vec<Key>>,
    ) -> Result<()> {
        Self::create_at_with(dataset, path, keys, &StoreConfig::default())
    }

    /// [`create_at`](Self::create_at) with explicit I/O options.
    pub fn create_at_with<D: Dataset + ?Sized>(
        dataset: &D,
        path: impl AsRef<Path>,
        keys: Option<Vec<Key>>,
        config: &StoreConfig,
    ) -> Result<()> {
        let path = path.as_ref();
        registry::close_path(path);
        let file = File::create(path)
            .map_err(|e| FeedError::storage_with_source(path, "failed to create store file", e))?;
        let mut writer = BufWriter::with_capacity(config.buffer_size, file);
        Self::create(dataset, &mut writer, keys).map_err(|e| {
            FeedError::partial_write_with_source(path, "store creation did not complete", e)
        })?;
        writer.flush().map_err(|e| {
            FeedError::partial_write_with_source(path, "failed to flush store file", e)
        })?;
        writer.get_ref().sync_all().map_err(|e| {
            FeedError::partial_write_with_source(path, "failed to sync store file", e)
        })?;
        debug!(path = %path.display(), "materialized dataset into indexed store");
        Ok(())
    }

    /// Opens a store for reading. Keys are the keys recorded at creation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_impl(path.as_ref(), false, &StoreConfig::default())
    }

    /// Opens a store whose key space is the raw recorded byte offsets.
    ///
    /// `list_keys` yields `Key::Offset` values and `query_item` treats its
    /// argument directly as a byte offset, skipping the index lookup. This
    /// trades semantic keys for one less indirection when offsets are
    /// already known from a previous enumeration.
    pub fn open_offset_keyed(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_impl(path.as_ref(), true, &StoreConfig::default())
    }

    /// [`open`](Self::open) with explicit I/O options.
    pub fn open_with(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        Self::open_impl(path.as_ref(), false, config)
    }

    fn open_impl(path: &Path, offset_keyed: bool, config: &StoreConfig) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| FeedError::storage_with_source(path, "failed to open store file", e))?;
        let file_len = file
            .metadata()
            .map_err(|e| FeedError::storage_with_source(path, "failed to read store metadata", e))?
            .len();
        let mut reader = BufReader::with_capacity(config.buffer_size, file);

        let mut header_bytes = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header_bytes)
            .map_err(|e| FeedError::storage_with_source(path, "failed to read store header", e))?;
        let header = StoreHeader::decode(&header_bytes)?;
        if header.index_offset < HEADER_LEN as u64 || header.index_offset > file_len {
            return Err(FeedError::storage(
                path,
                "store header does not point at a valid index (creation may have been interrupted)",
            ));
        }

        reader
            .seek(SeekFrom::Start(header.index_offset))
            .map_err(|e| FeedError::storage_with_source(path, "failed to seek to store index", e))?;
        let mut tail = Vec::with_capacity((file_len - header.index_offset) as usize);
        reader
            .read_to_end(&mut tail)
            .map_err(|e| FeedError::storage_with_source(path, "failed to read store index", e))?;

        let mut cursor = Cursor::new(tail.as_slice());
        let entries: Vec<(Key, u64)> = bincode::deserialize_from(&mut cursor)
            .map_err(|e| FeedError::serialization(format!("failed to decode store index: {e}")))?;
        let consumed = cursor.position() as usize;
        if checksum(&tail[..consumed]) != header.index_checksum {
            return Err(FeedError::storage(path, "store index checksum mismatch"));
        }

        // The context map may be absent; its presence is detected by
        // leftover trailer bytes.
        let scope = if consumed < tail.len() {
            let context: BTreeMap<String, Payload> =
                bincode::deserialize_from(&mut cursor).map_err(|e| {
                    FeedError::serialization(format!("failed to decode context map: {e}"))
                })?;
            Scope::with(context)
        } else {
            Scope::new()
        };

        for (key, offset) in &entries {
            if *offset < HEADER_LEN as u64 || *offset >= header.index_offset {
                return Err(FeedError::storage(
                    path,
                    format!("index entry for key {key} points outside the item region"),
                ));
            }
        }

        let lookup: HashMap<Key, u64> = entries.iter().cloned().collect();
        let handle = registry::register(path, reader);
        debug!(
            path = %path.display(),
            keys = entries.len(),
            offset_keyed,
            "opened indexed store"
        );
        Ok(Self {
            handle,
            path: path.to_path_buf(),
            entries: Arc::new(entries),
            lookup: Arc::new(lookup),
            offset_keyed,
            scope,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ordering key that sorts store queries by ascending file offset.
    ///
    /// Compose with [`OrderedQueries`](crate::wrappers::OrderedQueries)
    /// around a pipeline over this store to turn random reads into a
    /// forward sweep; keys missing from the index sort last.
    pub fn query_order(&self) -> impl Fn(&Key) -> Key + 'static {
        let lookup = self.lookup.clone();
        let offset_keyed = self.offset_keyed;
        move |key: &Key| {
            if offset_keyed {
                key.clone()
            } else {
                match lookup.get(key) {
                    Some(&offset) => Key::Offset(offset),
                    None => Key::Offset(u64::MAX),
                }
            }
        }
    }

    /// Closes the store and releases its registry slot.
    pub fn close(self) {
        registry::release(&self.handle);
    }
}

impl Drop for IndexedStore {
    fn drop(&mut self) {
        registry::release(&self.handle);
    }
}

impl Dataset for IndexedStore {
    fn list_keys(&self) -> Result<Vec<Key>> {
        Ok(if self.offset_keyed {
            self.entries
                .iter()
                .map(|(_, offset)| Key::Offset(*offset))
                .collect()
        } else {
            self.entries.iter().map(|(key, _)| key.clone()).collect()
        })
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        let offset = if self.offset_keyed {
            match key {
                Key::Offset(offset) => *offset,
                _ => return Err(FeedError::key_not_found(key.clone())),
            }
        } else {
            *self
                .lookup
                .get(key)
                .ok_or_else(|| FeedError::key_not_found(key.clone()))?
        };
        self.handle.with_reader(|reader| {
            reader.seek(SeekFrom::Start(offset)).map_err(|e| {
                FeedError::storage_with_source(
                    &self.path,
                    format!("failed to seek to item at offset {offset}"),
                    e,
                )
            })?;
            bincode::deserialize_from(&mut *reader).map_err(|e| {
                FeedError::serialization(format!("failed to decode item for key {key}: {e}"))
            })
        })
    }

    fn scope(&self) -> Scope {
        self.scope.clone()
    }
}

fn sink_error(e: std::io::Error) -> FeedError {
    FeedError::storage_with_source("<sink>", "write to store sink failed", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressedArray;
    use crate::dataset::MapDataset;
    use crate::item::NdArray;
    use crate::wrappers::{OrderedQueries, TransformedDataset};
    use tempfile::TempDir;

    fn sample_dataset() -> MapDataset {
        MapDataset::new([
            (
                Key::from("a"),
                vec![Payload::from("alpha"), Payload::Int(1)],
            ),
            (
                Key::from("b"),
                vec![
                    Payload::Array(NdArray::from_f32(vec![3], &[1.0, 2.0, 3.0]).unwrap()),
                    Payload::Int(2),
                ],
            ),
            (
                Key::from("c"),
                vec![
                    Payload::Compressed(CompressedArray::new(
                        NdArray::from_i64(vec![2], &[7, 9]).unwrap(),
                    )),
                    Payload::Int(3),
                ],
            ),
        ])
    }

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("dataset.store")
    }

    #[test]
    fn test_roundtrip_every_key() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = sample_dataset();

        IndexedStore::create_at(&dataset, &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();

        assert_eq!(store.len(), 3);
        for key in dataset.list_keys().unwrap() {
            assert_eq!(
                store.query_item(&key).unwrap(),
                dataset.query_item(&key).unwrap()
            );
        }
        // Creation order is preserved.
        assert_eq!(store.list_keys().unwrap(), dataset.list_keys().unwrap());
    }

    #[test]
    fn test_header_points_exactly_at_index() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        IndexedStore::create_at(&sample_dataset(), &path, None).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = StoreHeader::decode(&bytes[..HEADER_LEN].try_into().unwrap()).unwrap();
        let entries: Vec<(Key, u64)> =
            bincode::deserialize(&bytes[header.index_offset as usize..]).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, Key::from("a"));
        // Offsets point into the item region behind the header.
        for (_, offset) in &entries {
            assert!(*offset >= HEADER_LEN as u64);
            assert!(*offset < header.index_offset);
        }
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        IndexedStore::create_at(&sample_dataset(), &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();

        let err = store.query_item(&Key::from("zzz")).unwrap_err();
        assert!(matches!(err, FeedError::KeyNotFound { .. }));
    }

    #[test]
    fn test_explicit_key_subset() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = sample_dataset();

        IndexedStore::create_at(&dataset, &path, Some(vec![Key::from("c"), Key::from("a")]))
            .unwrap();
        let store = IndexedStore::open(&path).unwrap();

        assert_eq!(
            store.list_keys().unwrap(),
            vec![Key::from("c"), Key::from("a")]
        );
        assert!(store.query_item(&Key::from("b")).is_err());
    }

    #[test]
    fn test_offset_keyed_mode() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = sample_dataset();
        IndexedStore::create_at(&dataset, &path, None).unwrap();

        let store = IndexedStore::open_offset_keyed(&path).unwrap();
        let offsets = store.list_keys().unwrap();
        assert_eq!(offsets.len(), 3);
        assert!(offsets.iter().all(|k| matches!(k, Key::Offset(_))));

        // Offsets resolve to the same items, in the same order.
        let semantic_keys = dataset.list_keys().unwrap();
        for (offset_key, semantic_key) in offsets.iter().zip(&semantic_keys) {
            assert_eq!(
                store.query_item(offset_key).unwrap(),
                dataset.query_item(semantic_key).unwrap()
            );
        }

        // Semantic keys are not part of the offset-keyed key space.
        assert!(store.query_item(&Key::from("a")).is_err());
    }

    #[test]
    fn test_corrupted_index_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        IndexedStore::create_at(&sample_dataset(), &path, None).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let header = StoreHeader::decode(&bytes[..HEADER_LEN].try_into().unwrap()).unwrap();
        let flip_at = header.index_offset as usize + 4;
        bytes[flip_at] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        assert!(IndexedStore::open(&path).is_err());
    }

    #[test]
    fn test_placeholder_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        // A file that never got past the placeholder header.
        std::fs::write(&path, StoreHeader::placeholder().encode()).unwrap();

        let err = IndexedStore::open(&path).unwrap_err();
        assert!(matches!(err, FeedError::Storage { .. }));
    }

    #[test]
    fn test_reopen_invalidates_previous_store() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        IndexedStore::create_at(&sample_dataset(), &path, None).unwrap();

        let first = IndexedStore::open(&path).unwrap();
        first.query_item(&Key::from("a")).unwrap();

        let second = IndexedStore::open(&path).unwrap();
        let err = first.query_item(&Key::from("a")).unwrap_err();
        assert!(matches!(err, FeedError::Storage { .. }));
        second.query_item(&Key::from("a")).unwrap();
    }

    #[test]
    fn test_scope_is_persisted_and_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = sample_dataset().with_scope(Scope::with([(
            "split".to_string(),
            Payload::from("train"),
        )]));

        IndexedStore::create_at(&dataset, &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();
        assert_eq!(store.scope().get("split"), Some(&Payload::from("train")));
    }

    #[test]
    fn test_absent_context_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        // sample_dataset carries no scope, so no context block is written.
        IndexedStore::create_at(&sample_dataset(), &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();
        assert!(store.scope().is_empty());
    }

    #[test]
    fn test_store_composes_with_wrappers() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = MapDataset::new(
            (0..10).map(|i| (Key::from(i), vec![Payload::Int(i), Payload::Int(i * i)])),
        );
        IndexedStore::create_at(&dataset, &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();

        let mut pipeline = TransformedDataset::new(store);
        pipeline.add_transform(|mut item| {
            if let Some(Payload::Int(v)) = item.first_mut() {
                *v += 100;
            }
            item
        });

        let batches: Vec<_> = pipeline
            .batches(pipeline.list_keys().unwrap(), 4)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches[0].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [100, 101, 102, 103]
        );
    }

    #[test]
    fn test_query_order_sweeps_file_forward() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let dataset = MapDataset::new(
            (0..6).map(|i| (Key::from(i), vec![Payload::Int(i)])),
        );
        IndexedStore::create_at(&dataset, &path, None).unwrap();
        let store = IndexedStore::open(&path).unwrap();
        let order = store.query_order();

        let ordered = OrderedQueries::new(store, order);
        // Rows come back in caller order even though reads were reordered.
        let batch = ordered
            .query(&[Key::from(4), Key::from(1), Key::from(3)])
            .unwrap();
        assert_eq!(
            batch.column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [4, 1, 3]
        );
    }
}
