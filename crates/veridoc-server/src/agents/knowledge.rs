//! 知识库智能体
//!
//! 扫描知识目录、带变更检测的嵌入入库，以及基于检索上下文的问答。
//! 变更检测用 sha256 清单：内容没变的文件不重复嵌入。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use veridoc_ai::{AiProvider, ChatRequest};
use veridoc_core::{Message, Result, VeriDocError};

use super::retriever::{EmbeddingRetriever, RetrievedDocument};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["md", "txt", "json"];
const MANIFEST_FILE: &str = ".embedding-manifest.json";

/// 知识文件元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub path: String,
    pub size: u64,
    pub modified: Option<i64>,
    pub file_type: String,
}

/// 嵌入运行摘要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedSummary {
    pub total_files: usize,
    pub embedded_files: usize,
    pub skipped_files: usize,
    pub processed: Vec<String>,
}

/// 问答结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct KnowledgeAgent {
    retriever: Arc<EmbeddingRetriever>,
    provider: Arc<dyn AiProvider>,
    model: String,
    dir: PathBuf,
}

impl KnowledgeAgent {
    pub fn new(
        retriever: Arc<EmbeddingRetriever>,
        provider: Arc<dyn AiProvider>,
        model: impl Into<String>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            retriever,
            provider,
            model: model.into(),
            dir: dir.into(),
        }
    }

    fn collect_files(dir: &Path, base: &Path, out: &mut Vec<KnowledgeFile>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::collect_files(&path, base, out)?;
                continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !SUPPORTED_EXTENSIONS.contains(&ext) {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE) {
                continue;
            }

            let metadata = entry.metadata()?;
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64);

            let relative = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();

            out.push(KnowledgeFile {
                path: relative,
                size: metadata.len(),
                modified,
                file_type: ext.to_string(),
            });
        }
        Ok(())
    }

    /// 扫描知识目录，返回受支持文件的元数据
    pub fn scan_knowledge_directory(&self) -> Result<Vec<KnowledgeFile>> {
        if !self.dir.exists() {
            return Err(VeriDocError::Agent(
                "Knowledge directory does not exist".to_string(),
            ));
        }

        let mut files = Vec::new();
        Self::collect_files(&self.dir, &self.dir, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("扫描知识目录: 找到 {} 个文件", files.len());
        Ok(files)
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn load_manifest(&self) -> HashMap<String, String> {
        std::fs::read_to_string(self.manifest_path())
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn save_manifest(&self, manifest: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(self.manifest_path(), content)?;
        Ok(())
    }

    fn content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 嵌入知识文件。force 为 false 时跳过内容未变的文件。
    pub async fn embed_knowledge(&self, force: bool) -> Result<EmbedSummary> {
        let files = self.scan_knowledge_directory()?;
        let mut manifest = self.load_manifest();
        let mut summary = EmbedSummary {
            total_files: files.len(),
            ..Default::default()
        };

        self.retriever.ensure_ready().await?;

        for file in &files {
            let full_path = self.dir.join(&file.path);
            let content = match std::fs::read_to_string(&full_path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("读取知识文件失败 {}: {}", file.path, e);
                    continue;
                }
            };

            let hash = Self::content_hash(&content);
            if !force && manifest.get(&file.path) == Some(&hash) {
                summary.skipped_files += 1;
                continue;
            }

            let metadata = serde_json::json!({
                "source": file.path,
                "type": file.file_type,
            });

            match self.retriever.add_document(&content, metadata).await {
                Ok(()) => {
                    manifest.insert(file.path.clone(), hash);
                    summary.embedded_files += 1;
                    summary.processed.push(file.path.clone());
                }
                Err(e) => {
                    tracing::error!("嵌入知识文件失败 {}: {}", file.path, e);
                }
            }
        }

        self.save_manifest(&manifest)?;
        tracing::info!(
            "知识嵌入完成: {}/{} 个文件入库, {} 个未变跳过",
            summary.embedded_files,
            summary.total_files,
            summary.skipped_files
        );
        Ok(summary)
    }

    fn build_context(documents: &[RetrievedDocument]) -> String {
        documents
            .iter()
            .map(|d| format!("[{}] {}", d.source, d.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// 基于知识库回答问题
    pub async fn answer(&self, question: &str) -> Result<KnowledgeAnswer> {
        let documents = self.retriever.search(question, None).await?;

        if documents.is_empty() {
            return Ok(KnowledgeAnswer {
                answer: "I couldn't find relevant information in the knowledge base to answer \
                         your question."
                    .to_string(),
                sources: vec![],
            });
        }

        let prompt = format!(
            r#"Based on the following retrieved information, answer the user's question.

Retrieved information:
{}

Question: {}

Provide a clear, accurate answer based on the retrieved information. If the information is insufficient, state that clearly."#,
            Self::build_context(&documents),
            question
        );

        let request = ChatRequest::new(&self.model, vec![Message::system(prompt)]);
        let response = self.provider.chat(request).await?;

        Ok(KnowledgeAnswer {
            answer: response.message.text_content().unwrap_or("").to_string(),
            sources: documents.into_iter().map(|d| d.source).collect(),
        })
    }
}
