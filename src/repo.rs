//! Repository ingestion: shallow clone, walk, chunk, embed, store.
//!
//! A whole repository becomes a single document whose chunks carry
//! source-file attribution. Chunk indices are global across the
//! repository; `file_chunk_index` restarts per file, and `NEXT` chains
//! never cross file boundaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::config::RepositoryConfig;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::{Chunk, CodeRef, DocumentMeta, IngestReport, RepoInfo};
use crate::splitter::TextSplitter;
use crate::store::GraphStore;

/// File extensions treated as source code or project text.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "cs", "go", "rs", "rb", "php",
    "swift", "kt", "scala", "html", "css", "scss", "sass", "vue", "sql", "sh", "bash", "yaml",
    "yml", "json", "xml", "md", "txt", "env", "toml", "ini", "cfg", "conf", "dockerfile",
    "makefile", "gradle",
];

/// Directory names never descended into.
const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "dist",
    "build",
    "target",
    ".idea",
    ".vscode",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    "vendor",
    "packages",
];

/// Human-readable language label for a file extension.
fn language_for(ext: &str) -> &'static str {
    match ext {
        "py" => "Python",
        "js" => "JavaScript",
        "jsx" => "React JSX",
        "ts" => "TypeScript",
        "tsx" => "React TSX",
        "java" => "Java",
        "cpp" => "C++",
        "c" => "C",
        "h" => "C/C++ Header",
        "cs" => "C#",
        "go" => "Go",
        "rs" => "Rust",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "scala" => "Scala",
        "html" => "HTML",
        "css" => "CSS",
        "scss" => "SCSS",
        "vue" => "Vue",
        "sql" => "SQL",
        "sh" => "Shell",
        "bash" => "Bash",
        "yaml" | "yml" => "YAML",
        "json" => "JSON",
        "xml" => "XML",
        "md" => "Markdown",
        _ => "Text",
    }
}

/// Derive a repository name from its clone URL.
///
/// Handles `https://host/user/repo`, a trailing `.git`, and
/// `git@host:user/repo.git` forms.
pub fn extract_repo_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed
        .replace(':', "/")
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown-repo")
        .to_string()
}

pub struct RepositoryProcessor {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    max_file_size: u64,
    excludes: GlobSet,
}

impl RepositoryProcessor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        splitter: TextSplitter,
        config: &RepositoryConfig,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                RagError::Config(format!("invalid exclude glob {:?}: {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let excludes = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            store,
            embedder,
            splitter,
            max_file_size: config.max_file_size,
            excludes,
        })
    }

    /// Clone `repo_url` shallowly into a temporary directory and ingest
    /// it. The clone directory is removed on every path, success or not.
    pub async fn process(&self, repo_url: &str) -> Result<IngestReport> {
        let repo_name = extract_repo_name(repo_url);
        tracing::info!(repo = %repo_name, url = %repo_url, "cloning repository");

        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| RagError::CloneFailed(format!("temp dir creation failed: {}", e)))?;

        let output = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(repo_url)
            .arg(temp_dir.path())
            .output()
            .await
            .map_err(|e| RagError::CloneFailed(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RagError::CloneFailed(format!(
                "git clone failed for {}: {}",
                repo_url,
                stderr.trim()
            )));
        }

        self.ingest_tree(repo_url, &repo_name, temp_dir.path()).await
    }

    /// Ingest an already-materialized tree rooted at `root`.
    pub async fn ingest_tree(
        &self,
        repo_url: &str,
        repo_name: &str,
        root: &Path,
    ) -> Result<IngestReport> {
        let files = self.collect_files(root);
        tracing::info!(repo = %repo_name, files = files.len(), "walking repository tree");

        let mut texts: Vec<String> = Vec::new();
        let mut refs: Vec<CodeRef> = Vec::new();
        let mut file_count = 0i64;
        let mut total_size = 0i64;

        for path in &files {
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let content = match String::from_utf8(bytes.clone()) {
                Ok(s) => s,
                Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
            };
            if content.trim().is_empty() {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            let language = language_for(&ext);

            let header = format!(
                "# File: {}\n# Language: {}\n# Lines: {}\n\n",
                rel.display(),
                language,
                content.lines().count()
            );
            let pieces = self.splitter.split(&format!("{}{}", header, content));
            if pieces.is_empty() {
                continue;
            }

            file_count += 1;
            total_size += bytes.len() as i64;
            for (file_idx, piece) in pieces.into_iter().enumerate() {
                texts.push(piece);
                refs.push(CodeRef {
                    file_path: rel.display().to_string(),
                    language: language.to_string(),
                    file_chunk_index: file_idx as i64,
                });
            }
        }

        if texts.is_empty() {
            return Err(RagError::UnsupportedFormat(format!(
                "no processable files found in {}",
                repo_url
            )));
        }

        tracing::info!(repo = %repo_name, files = file_count, chunks = texts.len(), "embedding repository chunks");
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let uploaded_at = chrono::Utc::now().timestamp();
        let filename = format!("GitHub: {}", repo_name);
        let doc = DocumentMeta {
            id: document_id.clone(),
            filename: filename.clone(),
            uploaded_at,
            file_size: total_size,
            chunk_count: 0,
            repo: Some(RepoInfo {
                url: repo_url.to_string(),
                name: repo_name.to_string(),
                file_count,
            }),
        };

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(embeddings)
            .zip(refs)
            .enumerate()
            .map(|(i, ((content, embedding), code))| Chunk {
                id: format!("{}_chunk_{}", document_id, i),
                document_id: document_id.clone(),
                chunk_index: i as i64,
                content,
                embedding,
                code: Some(code),
            })
            .collect();

        self.store.create_document(&doc).await?;
        self.store.create_chunks(&document_id, &chunks).await?;
        self.store
            .set_chunk_count(&document_id, chunks.len() as i64)
            .await?;

        tracing::info!(repo = %repo_name, document_id = %document_id, chunks = chunks.len(), "repository ingested");

        Ok(IngestReport {
            id: document_id,
            filename,
            size: total_size,
            uploaded_at,
            chunks_created: chunks.len() as i64,
            file_count: Some(file_count),
        })
    }

    /// Retained files in deterministic walk order.
    fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.file_type().is_dir() {
                    let name = entry.file_name().to_string_lossy();
                    return !SKIP_DIRS.contains(&name.as_ref());
                }
                true
            });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .unwrap_or_default();
            if !CODE_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            if self.excludes.is_match(rel) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() > self.max_file_size => {
                    tracing::debug!(path = %rel.display(), size = meta.len(), "skipping oversized file");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %rel.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            }

            out.push(path.to_path_buf());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_from_https_url() {
        assert_eq!(extract_repo_name("https://github.com/user/repo"), "repo");
    }

    #[test]
    fn repo_name_strips_git_suffix() {
        assert_eq!(
            extract_repo_name("https://github.com/user/repo.git"),
            "repo"
        );
    }

    #[test]
    fn repo_name_from_ssh_url() {
        assert_eq!(extract_repo_name("git@github.com:user/repo.git"), "repo");
    }

    #[test]
    fn repo_name_ignores_trailing_slash() {
        assert_eq!(extract_repo_name("https://github.com/user/repo/"), "repo");
    }

    #[test]
    fn language_mapping_covers_common_extensions() {
        assert_eq!(language_for("rs"), "Rust");
        assert_eq!(language_for("py"), "Python");
        assert_eq!(language_for("yml"), "YAML");
        assert_eq!(language_for("weird"), "Text");
    }
}
