// ==========================================
// OTD 绩效引擎 - 发运记录实体
// ==========================================
// 职责: 承载一条交付记录的原始字段 (Datagrid 行)
// 红线: 引擎评估不得修改原始字段, 派生结果另行分层
// ==========================================

use crate::domain::dates::parse_date_dayfirst;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 规范化发运标识 (join key)
///
/// 规则:
/// - TRIM 首尾空白
/// - 去除数值型导出产生的小数尾巴 ("8001234.0" → "8001234"),
///   使数值型与文本型标识可以相等比较
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(stripped) = trimmed.strip_suffix(".0") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            return stripped.to_string();
        }
    }

    trimmed.to_string()
}

// ==========================================
// ShipmentRecord - 主数据源记录 (Datagrid)
// ==========================================
// 不变量: fields 对数据集中所有表头都有键, 空串代表 NULL,
// 这样"列是否存在"与"值是否为空"可以区分 (配置错误 vs 行级降级)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRecord {
    /// 规范化后的发运标识 (DeliveryNumber)
    pub id: String,
    /// 按原始列名索引的字段值, 空串 = NULL
    pub fields: HashMap<String, String>,
}

impl ShipmentRecord {
    /// 从一行原始数据构造; id 字段缺失或为空时返回 None (行级降级, 由调用方记录)
    pub fn from_row(row: HashMap<String, String>, id_field: &str) -> Option<Self> {
        let raw_id = row.get(id_field)?;
        let id = normalize_id(raw_id);
        if id.is_empty() {
            return None;
        }
        Some(Self { id, fields: row })
    }

    /// 读取字段原始值; 列缺失或值为空白一律返回 None
    pub fn raw(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            None => None,
        }
    }

    /// 按日前置约定解析日期字段; 缺失或格式非法返回 None
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.raw(field).and_then(parse_date_dayfirst)
    }

    /// 数据集中是否存在该列 (与值是否为空无关)
    pub fn has_column(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// 写入 (或覆盖) 一个字段值; 仅供 Join 引擎补充参照字段使用
    pub fn set_field(&mut self, field: &str, value: String) {
        self.fields.insert(field.to_string(), value);
    }
}

// ==========================================
// ReferenceRecord - 参照数据源记录 (LIKP)
// ==========================================
// 提供权威日期字段, 由 Join 引擎按规范化标识并入主记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// 规范化后的发运标识 (Levering)
    pub id: String,
    /// 按原始列名索引的字段值, 空串 = NULL
    pub fields: HashMap<String, String>,
}

impl ReferenceRecord {
    /// 从一行原始数据构造; id 字段缺失或为空时返回 None
    pub fn from_row(row: HashMap<String, String>, id_field: &str) -> Option<Self> {
        let raw_id = row.get(id_field)?;
        let id = normalize_id(raw_id);
        if id.is_empty() {
            return None;
        }
        Some(Self { id, fields: row })
    }

    /// 读取字段原始值; 空白视为 NULL
    pub fn raw(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(v) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            None => None,
        }
    }
}
