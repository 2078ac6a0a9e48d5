//! VeriDoc Vector - 向量存储抽象
//!
//! 知识库嵌入的存储与 kNN 检索。生产后端为 OpenSearch，
//! 内存后端用于测试和本地开发。

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
