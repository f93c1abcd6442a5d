
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ollama::OllamaClient;
use crate::{ColdreachError, Result};

const TABLE_NAME: &str = "portfolio";

/// One embedded portfolio chunk ready to be written to a session store
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// The chunk text
    pub content: String,
    /// Label of the document the chunk came from (file name or staging name)
    pub source: String,
    /// Position of the chunk within its document
    pub chunk_index: u32,
    /// Embedding vector for the chunk
    pub vector: Vec<f32>,
}

/// A chunk returned from similarity search, ordered by retrieval rank
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub similarity: f32,
}

/// Vector store for a single session's portfolio, backed by LanceDB.
///
/// Each session owns an exclusive store directory; deleting that directory
/// removes the session's portfolio knowledge with no residual state. Every
/// vector in a store must come from the same embedding model: appending a
/// batch whose dimension differs from the existing table is a hard error
/// rather than a silent rebuild.
pub struct PortfolioStore {
    connection: Connection,
}

impl PortfolioStore {
    /// Connect to the store at `path`, creating the directory if absent
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        debug!("Opening portfolio store at {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            ColdreachError::StoreAccess(format!(
                "Failed to create store directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            ColdreachError::StoreAccess(format!("Failed to connect to store: {}", e))
        })?;

        Ok(Self { connection })
    }

    /// Append embedded chunks, creating the table from the first batch's
    /// vector dimension if it does not exist yet
    #[inline]
    pub async fn append(&self, records: &[ChunkRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No chunks to store");
            return Ok(());
        };
        let vector_dim = first.vector.len();

        if records.iter().any(|r| r.vector.len() != vector_dim) {
            return Err(ColdreachError::StoreAccess(
                "Embedding batch contains mixed vector dimensions".to_string(),
            ));
        }

        match self.existing_vector_dimension().await? {
            Some(existing) if existing != vector_dim => {
                return Err(ColdreachError::StoreAccess(format!(
                    "Embedding dimension mismatch: store has {} dimensions, batch has {} \
                     (was the embedding model changed?)",
                    existing, vector_dim
                )));
            }
            Some(_) => {}
            None => {
                let schema = create_schema(vector_dim);
                self.connection
                    .create_empty_table(TABLE_NAME, schema)
                    .execute()
                    .await
                    .map_err(|e| {
                        ColdreachError::StoreAccess(format!("Failed to create table: {}", e))
                    })?;
                debug!("Created portfolio table with {} dimensions", vector_dim);
            }
        }

        let record_batch = create_record_batch(records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        table.add(reader).execute().await.map_err(|e| {
            ColdreachError::StoreAccess(format!("Failed to insert chunks: {}", e))
        })?;

        info!("Stored {} portfolio chunks", records.len());
        Ok(())
    }

    /// Number of chunks stored in this session's portfolio
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| ColdreachError::StoreAccess(format!("Failed to count chunks: {}", e)))
    }

    /// Return the `k` chunks nearest to the query vector, best match first
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| {
                ColdreachError::StoreAccess(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| ColdreachError::StoreAccess(format!("Failed to execute search: {}", e)))?;

        let mut chunks = Vec::new();
        let mut stream = results;
        while let Some(batch) = stream.try_next().await.map_err(|e| {
            ColdreachError::StoreAccess(format!("Failed to read search results: {}", e))
        })? {
            chunks.extend(parse_search_batch(&batch)?);
        }

        debug!("Similarity search returned {} chunks", chunks.len());
        Ok(chunks)
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self.connection.table_names().execute().await.map_err(|e| {
            ColdreachError::StoreAccess(format!("Failed to list store tables: {}", e))
        })?;
        Ok(names.iter().any(|n| n == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| ColdreachError::StoreAccess(format!("Failed to open table: {}", e)))
    }

    async fn existing_vector_dimension(&self) -> Result<Option<usize>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| ColdreachError::StoreAccess(format!("Failed to get schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(ColdreachError::StoreAccess(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }
}

/// Number of chunks at `path`; 0 if the store is missing or unreadable.
///
/// Read queries never create store directories as a side effect, so a
/// missing path is answered without connecting.
#[inline]
pub async fn count(path: &Path) -> usize {
    if !path.exists() {
        return 0;
    }

    match open_and_count(path).await {
        Ok(count) => count,
        Err(e) => {
            warn!("Treating unreadable store {:?} as empty: {}", path, e);
            0
        }
    }
}

async fn open_and_count(path: &Path) -> Result<usize> {
    let store = PortfolioStore::open(path).await?;
    store.count().await
}

/// True only if the store is present and holds at least one chunk
#[inline]
pub async fn exists(path: &Path) -> bool {
    count(path).await > 0
}

/// Embed `query` and return the `k` nearest chunks from the store at `path`.
///
/// A missing or empty store yields an empty result rather than an error, so
/// callers can degrade gracefully before a portfolio has been set up. Errors
/// from a store that is present but unreadable still surface.
#[inline]
pub async fn search_text(
    path: &Path,
    client: &OllamaClient,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if !exists(path).await {
        debug!("No portfolio store at {:?}, returning empty context", path);
        return Ok(Vec::new());
    }

    let query_vector = client
        .embed(query)
        .map_err(|e| ColdreachError::Generation(format!("Failed to embed query: {}", e)))?;

    let store = PortfolioStore::open(path).await?;
    store.search(&query_vector, k).await
}

/// Remove the store directory entirely; returns whether removal occurred
#[inline]
pub fn delete(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            info!("Deleted portfolio store at {:?}", path);
            true
        }
        Err(e) => {
            warn!("Failed to delete portfolio store at {:?}: {}", path, e);
            false
        }
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch> {
    let len = records.len();
    let created_at = Utc::now().to_rfc3339();

    let mut ids = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);

    for record in records {
        ids.push(Uuid::new_v4().to_string());
        contents.push(record.content.as_str());
        sources.push(record.source.as_str());
        chunk_indices.push(record.chunk_index);
        created_ats.push(created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| {
                ColdreachError::StoreAccess(format!("Failed to create vector array: {}", e))
            })?;

    let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(
            ids.iter().map(String::as_str).collect::<Vec<_>>(),
        )),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| ColdreachError::StoreAccess(format!("Failed to create record batch: {}", e)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
    let contents = batch
        .column_by_name("content")
        .ok_or_else(|| ColdreachError::StoreAccess("Missing content column".to_string()))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| ColdreachError::StoreAccess("Invalid content column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut chunks = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        chunks.push(RetrievedChunk {
            content: contents.value(row).to_string(),
            // Convert distance to similarity score (higher is better)
            similarity: 1.0 - distance,
        });
    }

    Ok(chunks)
}
