//! Neo4j-backed [`GraphStore`].
//!
//! Documents and chunks are stored as `(:Document)` and `(:Chunk)`
//! nodes with scalar properties only; structured metadata is flattened
//! at this boundary. Similarity search prefers the database's native
//! vector index and falls back to in-process cosine ranking when the
//! index is unavailable (e.g. Neo4j Community without vector support).

use async_trait::async_trait;
use neo4rs::{query, Graph};

use crate::config::{EmbeddingConfig, Neo4jConfig};
use crate::error::{RagError, Result};
use crate::models::{Chunk, DocumentMeta, RepoInfo, SearchHit, StoredChunk};

use super::{rank_by_cosine, GraphStore, RankCandidate};

const VECTOR_INDEX_NAME: &str = "chunk_embedding_index";

/// Production graph store.
pub struct Neo4jStore {
    graph: Graph,
    /// Whether the native vector index is available for search.
    vector_index: bool,
}

fn db_err(e: impl std::fmt::Display) -> RagError {
    RagError::StorageUnavailable(e.to_string())
}

impl Neo4jStore {
    /// Connect and prepare the schema: id uniqueness constraints plus a
    /// best-effort vector index probe. A failed probe downgrades search
    /// to the in-process fallback rather than failing startup.
    pub async fn connect(config: &Neo4jConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(db_err)?;

        graph
            .run(query(
                "CREATE CONSTRAINT document_id IF NOT EXISTS \
                 FOR (d:Document) REQUIRE d.id IS UNIQUE",
            ))
            .await
            .map_err(db_err)?;
        graph
            .run(query(
                "CREATE CONSTRAINT chunk_id IF NOT EXISTS \
                 FOR (c:Chunk) REQUIRE c.id IS UNIQUE",
            ))
            .await
            .map_err(db_err)?;

        // Index options cannot be parameterized; dims comes from
        // validated config.
        let create_index = format!(
            "CREATE VECTOR INDEX {} IF NOT EXISTS \
             FOR (c:Chunk) ON (c.embedding) \
             OPTIONS {{indexConfig: {{\
                `vector.dimensions`: {}, \
                `vector.similarity_function`: 'cosine'\
             }}}}",
            VECTOR_INDEX_NAME, embedding.dims
        );
        let vector_index = match graph.run(query(&create_index)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "vector index unavailable, similarity search will scan in process"
                );
                false
            }
        };

        Ok(Self {
            graph,
            vector_index,
        })
    }

    pub fn has_vector_index(&self) -> bool {
        self.vector_index
    }

    async fn document_exists(&self, document_id: &str) -> Result<bool> {
        let mut rows = self
            .graph
            .execute(
                query("MATCH (d:Document {id: $id}) RETURN count(d) AS n")
                    .param("id", document_id),
            )
            .await
            .map_err(db_err)?;
        let row = rows
            .next()
            .await
            .map_err(db_err)?
            .ok_or_else(|| db_err("empty count result"))?;
        let n: i64 = row.get("n").map_err(db_err)?;
        Ok(n > 0)
    }

    /// Next free global sequence value, used as the search tie-breaker.
    async fn next_seq(&self) -> Result<i64> {
        let mut rows = self
            .graph
            .execute(query(
                "MATCH (c:Chunk) RETURN coalesce(max(c.seq), -1) + 1 AS next",
            ))
            .await
            .map_err(db_err)?;
        let row = rows
            .next()
            .await
            .map_err(db_err)?
            .ok_or_else(|| db_err("empty sequence result"))?;
        row.get("next").map_err(db_err)
    }

    async fn search_native(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let vector: Vec<f64> = embedding.iter().map(|&v| v as f64).collect();
        let mut rows = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index, $k, $embedding) \
                     YIELD node, score \
                     MATCH (node)-[:BELONGS_TO]->(d:Document) \
                     RETURN node.id AS chunk_id, d.id AS document_id, \
                            d.filename AS filename, node.content AS content, \
                            node.chunk_index AS chunk_index, \
                            node.file_path AS file_path, node.language AS language, \
                            score \
                     ORDER BY score DESC, node.seq ASC",
                )
                .param("index", VECTOR_INDEX_NAME)
                .param("k", top_k as i64)
                .param("embedding", vector),
            )
            .await
            .map_err(db_err)?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            hits.push(SearchHit {
                chunk_id: row.get("chunk_id").map_err(db_err)?,
                document_id: row.get("document_id").map_err(db_err)?,
                filename: row.get("filename").map_err(db_err)?,
                content: row.get("content").map_err(db_err)?,
                chunk_index: row.get("chunk_index").map_err(db_err)?,
                file_path: row.get("file_path").map_err(db_err)?,
                language: row.get("language").map_err(db_err)?,
                score: row.get("score").map_err(db_err)?,
            });
        }
        Ok(hits)
    }

    /// Full-scan fallback: load every stored embedding and rank in
    /// process with the same ordering rules as the in-memory store.
    async fn search_fallback(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let mut rows = self
            .graph
            .execute(query(
                "MATCH (c:Chunk)-[:BELONGS_TO]->(d:Document) \
                 RETURN c.id AS chunk_id, d.id AS document_id, \
                        d.filename AS filename, c.content AS content, \
                        c.chunk_index AS chunk_index, c.file_path AS file_path, \
                        c.language AS language, c.seq AS seq, \
                        c.embedding AS embedding",
            ))
            .await
            .map_err(db_err)?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let stored: Vec<f64> = row.get("embedding").map_err(db_err)?;
            candidates.push(RankCandidate {
                seq: row.get("seq").map_err(db_err)?,
                embedding: stored.into_iter().map(|v| v as f32).collect(),
                hit: SearchHit {
                    chunk_id: row.get("chunk_id").map_err(db_err)?,
                    document_id: row.get("document_id").map_err(db_err)?,
                    filename: row.get("filename").map_err(db_err)?,
                    content: row.get("content").map_err(db_err)?,
                    chunk_index: row.get("chunk_index").map_err(db_err)?,
                    file_path: row.get("file_path").map_err(db_err)?,
                    language: row.get("language").map_err(db_err)?,
                    score: 0.0,
                },
            });
        }
        Ok(rank_by_cosine(embedding, candidates, top_k))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn create_document(&self, doc: &DocumentMeta) -> Result<()> {
        let q = match &doc.repo {
            Some(repo) => query(
                "CREATE (d:Document {id: $id, filename: $filename, \
                 uploaded_at: $uploaded_at, file_size: $file_size, \
                 chunk_count: $chunk_count, repo_url: $repo_url, \
                 repo_name: $repo_name, file_count: $file_count})",
            )
            .param("repo_url", repo.url.as_str())
            .param("repo_name", repo.name.as_str())
            .param("file_count", repo.file_count),
            None => query(
                "CREATE (d:Document {id: $id, filename: $filename, \
                 uploaded_at: $uploaded_at, file_size: $file_size, \
                 chunk_count: $chunk_count})",
            ),
        };
        self.graph
            .run(
                q.param("id", doc.id.as_str())
                    .param("filename", doc.filename.as_str())
                    .param("uploaded_at", doc.uploaded_at)
                    .param("file_size", doc.file_size)
                    .param("chunk_count", doc.chunk_count),
            )
            .await
            .map_err(db_err)
    }

    async fn set_chunk_count(&self, document_id: &str, count: i64) -> Result<()> {
        if !self.document_exists(document_id).await? {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }
        self.graph
            .run(
                query("MATCH (d:Document {id: $id}) SET d.chunk_count = $count")
                    .param("id", document_id)
                    .param("count", count),
            )
            .await
            .map_err(db_err)
    }

    async fn create_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        if !self.document_exists(document_id).await? {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let base_seq = self.next_seq().await?;

        let mut queries = Vec::with_capacity(chunks.len() * 2);
        for (i, chunk) in chunks.iter().enumerate() {
            let embedding: Vec<f64> = chunk.embedding.iter().map(|&v| v as f64).collect();
            let q = match &chunk.code {
                Some(code) => query(
                    "MATCH (d:Document {id: $document_id}) \
                     CREATE (c:Chunk {id: $id, document_id: $document_id, \
                        content: $content, chunk_index: $chunk_index, \
                        embedding: $embedding, seq: $seq, length: $length, \
                        file_path: $file_path, language: $language, \
                        file_chunk_index: $file_chunk_index}) \
                     CREATE (c)-[:BELONGS_TO]->(d)",
                )
                .param("file_path", code.file_path.as_str())
                .param("language", code.language.as_str())
                .param("file_chunk_index", code.file_chunk_index),
                None => query(
                    "MATCH (d:Document {id: $document_id}) \
                     CREATE (c:Chunk {id: $id, document_id: $document_id, \
                        content: $content, chunk_index: $chunk_index, \
                        embedding: $embedding, seq: $seq, length: $length}) \
                     CREATE (c)-[:BELONGS_TO]->(d)",
                ),
            };
            queries.push(
                q.param("id", chunk.id.as_str())
                    .param("document_id", document_id)
                    .param("content", chunk.content.as_str())
                    .param("chunk_index", chunk.chunk_index)
                    .param("embedding", embedding)
                    .param("seq", base_seq + i as i64)
                    .param("length", chunk.content.chars().count() as i64),
            );
        }

        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let same_file = match (&a.code, &b.code) {
                (None, None) => true,
                (Some(ca), Some(cb)) => ca.file_path == cb.file_path,
                _ => false,
            };
            if same_file {
                queries.push(
                    query(
                        "MATCH (a:Chunk {id: $from}), (b:Chunk {id: $to}) \
                         CREATE (a)-[:NEXT]->(b)",
                    )
                    .param("from", a.id.as_str())
                    .param("to", b.id.as_str()),
                );
            }
        }

        let mut txn = self.graph.start_txn().await.map_err(db_err)?;
        txn.run_queries(queries).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)
    }

    async fn vector_search(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if self.vector_index {
            self.search_native(query_vec, top_k).await
        } else {
            self.search_fallback(query_vec, top_k).await
        }
    }

    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        let mut rows = self
            .graph
            .execute(query(
                "MATCH (d:Document) \
                 RETURN d.id AS id, d.filename AS filename, \
                        d.uploaded_at AS uploaded_at, d.file_size AS file_size, \
                        d.chunk_count AS chunk_count, d.repo_url AS repo_url, \
                        d.repo_name AS repo_name, d.file_count AS file_count \
                 ORDER BY d.uploaded_at DESC",
            ))
            .await
            .map_err(db_err)?;

        let mut docs = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let repo_url: Option<String> = row.get("repo_url").map_err(db_err)?;
            let repo = match repo_url {
                Some(url) => Some(RepoInfo {
                    url,
                    name: row
                        .get::<Option<String>>("repo_name")
                        .map_err(db_err)?
                        .unwrap_or_default(),
                    file_count: row
                        .get::<Option<i64>>("file_count")
                        .map_err(db_err)?
                        .unwrap_or(0),
                }),
                None => None,
            };
            docs.push(DocumentMeta {
                id: row.get("id").map_err(db_err)?,
                filename: row.get("filename").map_err(db_err)?,
                uploaded_at: row.get("uploaded_at").map_err(db_err)?,
                file_size: row.get("file_size").map_err(db_err)?,
                chunk_count: row.get("chunk_count").map_err(db_err)?,
                repo,
            });
        }
        Ok(docs)
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        if !self.document_exists(document_id).await? {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }
        self.graph
            .run(
                query(
                    "MATCH (d:Document {id: $id}) \
                     OPTIONAL MATCH (c:Chunk)-[:BELONGS_TO]->(d) \
                     DETACH DELETE c, d",
                )
                .param("id", document_id),
            )
            .await
            .map_err(db_err)
    }

    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>> {
        if !self.document_exists(document_id).await? {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }

        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (c:Chunk)-[:BELONGS_TO]->(d:Document {id: $id}) \
                     RETURN c.id AS id, c.chunk_index AS chunk_index, \
                            c.content AS content, c.length AS length, \
                            c.file_path AS file_path, c.language AS language \
                     ORDER BY c.chunk_index ASC",
                )
                .param("id", document_id),
            )
            .await
            .map_err(db_err)?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            chunks.push(StoredChunk {
                id: row.get("id").map_err(db_err)?,
                chunk_index: row.get("chunk_index").map_err(db_err)?,
                content: row.get("content").map_err(db_err)?,
                length: row.get("length").map_err(db_err)?,
                file_path: row.get("file_path").map_err(db_err)?,
                language: row.get("language").map_err(db_err)?,
            });
        }
        Ok(chunks)
    }
}
