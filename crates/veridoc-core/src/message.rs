//! 消息模型定义
//!
//! 流水线和智能体共享的会话消息。反思步骤需要角色互换
//! (swap_roles)，让上一轮的模型输出作为用户输入重新进入模型。

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 消息内容
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    /// 内嵌图片，data 为 base64 编码
    Image {
        media_type: String,
        data: String,
    },
}

/// 消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: Vec<Content>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: Vec<Content>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Content::Text { text: text.into() }])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::Text { text: text.into() }])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Content::Text { text: text.into() }])
    }

    /// 文本 + 图片的用户消息 (文档抽取节点使用)
    pub fn user_with_image(
        text: impl Into<String>,
        media_type: impl Into<String>,
        image_bytes: &[u8],
    ) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        Self::new(
            Role::User,
            vec![
                Content::Text { text: text.into() },
                Content::Image {
                    media_type: media_type.into(),
                    data,
                },
            ],
        )
    }

    /// 获取第一段文本内容
    pub fn text_content(&self) -> Option<&str> {
        self.content.iter().find_map(|c| {
            if let Content::Text { text } = c {
                Some(text.as_str())
            } else {
                None
            }
        })
    }

    pub fn has_image(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, Content::Image { .. }))
    }

    fn with_role(&self, role: Role) -> Self {
        let mut m = self.clone();
        m.role = role;
        m
    }
}

/// 角色互换：首条消息保持原样，其余消息 assistant 和 user 对调。
///
/// 反思节点把抽取/校验阶段的模型输出当作人类输入送回模型评估。
pub fn swap_roles(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut iter = messages.iter();
    if let Some(first) = iter.next() {
        out.push(first.clone());
    }
    for m in iter {
        let swapped = match m.role {
            Role::Assistant => m.with_role(Role::User),
            Role::User => m.with_role(Role::Assistant),
            Role::System => m.clone(),
        };
        out.push(swapped);
    }
    out
}
