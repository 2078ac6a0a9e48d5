//! VeriDoc Server - 应用层与 HTTP 服务
//!
//! 两个应用共用一套基础设施：
//! - docverify: 出生证明校验流水线
//! - agents: 多智能体 RAG 问答

pub mod agents;
pub mod api;
pub mod docverify;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::*;
pub use state::*;
