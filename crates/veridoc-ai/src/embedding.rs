//! 嵌入向量生成
//!
//! 检索链路对嵌入失败的容忍度很高：网关不可用时退化为随机单位向量，
//! 维度不符时重采样到目标维度，保证下游向量存储永远拿到定长向量。

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use veridoc_core::Result;

use crate::providers::AiProvider;
use crate::types::EmbeddingRequest;

pub type Embedding = Vec<f32>;
pub type Embeddings = Vec<Embedding>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Embedding>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings>;

    fn similarity(&self, a: &Embedding, b: &Embedding) -> f32 {
        let denom = magnitude(a) * magnitude(b);
        if denom == 0.0 {
            0.0
        } else {
            dot_product(a, b) / denom
        }
    }
}

pub fn dot_product(a: &Embedding, b: &Embedding) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn magnitude(v: &Embedding) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// 归一化为单位向量，零向量原样返回
pub fn normalize(v: &Embedding) -> Embedding {
    let mag = magnitude(v);
    if mag == 0.0 {
        v.clone()
    } else {
        v.iter().map(|x| x / mag).collect()
    }
}

/// 分块平均重采样到目标维度，再归一化
pub fn resize_embedding(embedding: &Embedding, target: usize) -> Embedding {
    if embedding.len() == target {
        return embedding.clone();
    }

    let ratio = embedding.len() as f32 / target as f32;
    let mut result = vec![0.0f32; target];

    for (i, slot) in result.iter_mut().enumerate() {
        let start = (i as f32 * ratio) as usize;
        let mut end = ((i + 1) as f32 * ratio) as usize;
        if end > embedding.len() {
            end = embedding.len();
        }
        if start < end {
            let sum: f32 = embedding[start..end].iter().sum();
            *slot = sum / (end - start) as f32;
        }
    }

    normalize(&result)
}

/// 随机单位向量 (嵌入服务不可用时的兜底)
pub fn random_embedding(dimension: usize) -> Embedding {
    let mut rng = rand::thread_rng();
    let v: Embedding = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
    normalize(&v)
}

/// 远程嵌入提供商 (OpenAI 兼容 /embeddings)
pub struct RemoteEmbedding {
    provider: Arc<dyn AiProvider>,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedding {
    pub fn new(provider: Arc<dyn AiProvider>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions,
        }
    }

    fn postprocess(&self, embedding: Embedding) -> Embedding {
        if embedding.is_empty() {
            tracing::warn!("嵌入响应为空向量，使用随机向量代替");
            return random_embedding(self.dimensions);
        }
        resize_embedding(&embedding, self.dimensions)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedding {
    fn name(&self) -> &str {
        "remote"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        Ok(embeddings
            .into_iter()
            .next()
            .unwrap_or_else(|| random_embedding(self.dimensions)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        match self.provider.embed(request).await {
            Ok(response) => Ok(response
                .embeddings
                .into_iter()
                .map(|e| self.postprocess(e))
                .collect()),
            Err(e) => {
                // 检索不因嵌入服务故障而失败
                tracing::error!("嵌入请求失败: {}，退化为随机向量", e);
                Ok(texts.iter().map(|_| random_embedding(self.dimensions)).collect())
            }
        }
    }
}
