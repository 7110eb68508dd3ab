// ==========================================
// OTD 绩效引擎 - Join 引擎
// ==========================================
// 职责: 主数据源 LEFT JOIN 参照数据源 (规范化标识)
// 不变量: 输出行数 == 主数据源行数 (不丢行, 不复制行)
// 红线: 参照侧重复 key (fan-out) 快速失败, 不静默取一条
// 口径: join 后权威日期列仍为空 → 记为无匹配, 按输入顺序上报
// ==========================================

use crate::config::JoinConfig;
use crate::domain::{normalize_id, ReferenceRecord, ShipmentRecord};
use crate::engine::error::{EngineError, EngineResult};
use crate::importer::RawTable;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};

/// Join 产物
#[derive(Debug)]
pub struct JoinOutcome {
    /// 补充了参照字段的主记录 (与输入同序同量)
    pub joined: Vec<ShipmentRecord>,
    /// 无匹配的标识, 输入顺序, 无重复
    pub unmatched: Vec<String>,
}

pub struct JoinEngine;

impl JoinEngine {
    /// 执行 LEFT JOIN
    ///
    /// # 参数
    /// - primary: 去重后的主记录
    /// - reference: 参照数据源原始表 (LIKP)
    /// - cfg: join 配置 (key 列 / 并入字段 / 权威日期列)
    ///
    /// # 错误
    /// - 参照表缺少 key 列 → EngineError::MissingColumn (配置错误类)
    /// - 参照侧同一规范化 key 出现多行 → EngineError::DuplicateReferenceKey
    #[instrument(skip(primary, reference, cfg), fields(primary = primary.len(), reference = reference.rows.len()))]
    pub fn left_join(
        primary: Vec<ShipmentRecord>,
        reference: &RawTable,
        cfg: &JoinConfig,
    ) -> EngineResult<JoinOutcome> {
        if !reference.has_column(&cfg.reference_key) {
            return Err(EngineError::MissingColumn {
                source_name: cfg.reference_label.clone(),
                column: cfg.reference_key.clone(),
            });
        }

        // 参照侧索引: 规范化 key → 记录; 重复 key 快速失败
        let mut index: HashMap<String, ReferenceRecord> = HashMap::new();
        for row in &reference.rows {
            let record = match ReferenceRecord::from_row(row.clone(), &cfg.reference_key) {
                Some(r) => r,
                None => continue, // key 为空的参照行忽略
            };
            if index.insert(record.id.clone(), record.clone()).is_some() {
                return Err(EngineError::DuplicateReferenceKey { id: record.id });
            }
        }

        // LEFT JOIN: 每条主记录恰好保留一次
        let mut joined = Vec::with_capacity(primary.len());
        for mut record in primary {
            let key = normalize_id(&record.id);
            match index.get(&key) {
                Some(reference_record) => {
                    for field in &cfg.reference_fields {
                        let value = reference_record
                            .raw(field)
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        record.set_field(field, value);
                    }
                }
                None => {
                    // 无匹配: 参照字段补 NULL, 保证 schema 一致
                    for field in &cfg.reference_fields {
                        record.set_field(field, String::new());
                    }
                }
            }
            joined.push(record);
        }

        // 无匹配判定: 权威日期列仍为空
        let mut seen: HashSet<&str> = HashSet::new();
        let mut unmatched = Vec::new();
        for record in &joined {
            if record.date(&cfg.authoritative_date_field).is_none()
                && seen.insert(record.id.as_str())
            {
                unmatched.push(record.id.clone());
            }
        }

        if !unmatched.is_empty() {
            warn!(
                unmatched = unmatched.len(),
                reference = cfg.reference_label.as_str(),
                "主记录在参照数据源中无匹配"
            );
        }
        info!(joined = joined.len(), unmatched = unmatched.len(), "join 完成");

        Ok(JoinOutcome { joined, unmatched })
    }
}
