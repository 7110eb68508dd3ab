// ==========================================
// OTD 绩效引擎 - 纠错反馈日志
// ==========================================
// 职责: 追加式记录 {问题, 先前回答, 用户纠正}
// 约定: 每条反馈一个带时间戳的 JSON 文档, 目录即日志;
//       读取按时间倒序, 供叙事协作方取最近 N 条
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// 反馈层错误类型
#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("反馈目录不可用: {0}")]
    Directory(#[from] std::io::Error),

    #[error("反馈文档序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type FeedbackResult<T> = Result<T, FeedbackError>;

/// 单条纠错反馈
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEntry {
    pub question: String,
    pub prior_answer: String,
    pub user_correction: String,
    pub recorded_at: DateTime<Utc>,
}

/// 目录式追加存储
pub struct FeedbackStore {
    directory: PathBuf,
}

impl FeedbackStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> FeedbackResult<Self> {
        fs::create_dir_all(directory.as_ref())?;
        Ok(FeedbackStore {
            directory: directory.as_ref().to_path_buf(),
        })
    }

    /// 追加一条反馈
    ///
    /// 文件名 = 时间戳 + 随机后缀, 同秒多条不互相覆盖
    pub fn append(
        &self,
        question: &str,
        prior_answer: &str,
        user_correction: &str,
    ) -> FeedbackResult<FeedbackEntry> {
        let entry = FeedbackEntry {
            question: question.to_string(),
            prior_answer: prior_answer.to_string(),
            user_correction: user_correction.to_string(),
            recorded_at: Utc::now(),
        };

        let suffix = Uuid::new_v4().simple().to_string();
        let filename = format!(
            "feedback_{}_{}.json",
            entry.recorded_at.format("%Y%m%dT%H%M%S"),
            &suffix[..8]
        );
        let path = self.directory.join(filename);
        fs::write(&path, serde_json::to_string_pretty(&entry)?)?;
        info!(path = %path.display(), "反馈已记录");
        Ok(entry)
    }

    /// 读取最近的反馈, 时间倒序, 至多 limit 条
    ///
    /// 无法解析的文档跳过并告警, 不中断读取
    pub fn load_recent(&self, limit: usize) -> FeedbackResult<Vec<FeedbackEntry>> {
        let mut entries: Vec<FeedbackEntry> = Vec::new();
        for dir_entry in fs::read_dir(&self.directory)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<FeedbackEntry>(&content) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    warn!(path = %path.display(), %error, "反馈文档解析失败, 已跳过");
                }
            }
        }

        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit);
        Ok(entries)
    }

    /// 渲染为纯文本 (叙事协作方的输入)
    pub fn as_text(&self, limit: usize) -> FeedbackResult<String> {
        let entries = self.load_recent(limit)?;
        let blocks: Vec<String> = entries
            .iter()
            .map(|entry| {
                format!(
                    "[{}]\nQ: {}\nA: {}\nCorrectie: {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M"),
                    entry.question,
                    entry.prior_answer,
                    entry.user_correction
                )
            })
            .collect();
        Ok(blocks.join("\n\n"))
    }
}
