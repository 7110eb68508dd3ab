// ==========================================
// OTD 绩效引擎 - 计算模型配置 (rekenmodel)
// ==========================================
// 职责: 加载/校验声明式规则文档, 生成不可变 RuleSet 快照
// 红线: 规则方法是封闭标签联合, 未知标签在加载期拒绝
// 红线: reload 返回全新快照, 不得原地修改共享配置
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

// ==========================================
// 规则方法 (封闭标签联合)
// ==========================================
// - Column: 读取上游预判定列, 先比对 exclude 集合 (→ UNKNOWN),
//   再比对 pass 集合 (→ PASS), 否则 FAIL; 值比较前 TRIM + 小写
// - DateCompare: earlier <= later 为 PASS (同日算准时),
//   任一日期缺失或非法 → UNKNOWN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleMethod {
    Column {
        source_field: String,
        pass_values: Vec<String>,
        exclude_values: Vec<String>,
    },
    DateCompare {
        earlier_field: String,
        later_field: String,
    },
}

impl RuleMethod {
    /// 规则引用的全部字段名 (供数据集级列存在性检查)
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            RuleMethod::Column { source_field, .. } => vec![source_field.as_str()],
            RuleMethod::DateCompare {
                earlier_field,
                later_field,
            } => vec![earlier_field.as_str(), later_field.as_str()],
        }
    }
}

// ==========================================
// 阶段定义 (StageDefinition)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    /// 稳定标识, 例如 "warehouse_performance_ok"
    pub id: String,
    /// 展示名, 例如 "Warehouse Performance"
    pub name: String,
    /// 链路序号, 根因归因按此升序扫描; 必须全局唯一
    pub ordinal: u32,
    /// 不可用阶段恒为 UNKNOWN, 且不参与分母与根因搜索
    pub available: bool,
    /// 评估方法; 不可用阶段可以省略
    pub method: Option<RuleMethod>,
    /// 交叉验证参照列 (独立于引擎口径的外部判定列)
    pub reference_field: Option<String>,
}

// ==========================================
// 辅助策略
// ==========================================

/// 去重策略: 按规范化 key 保留首条 (稳定顺序)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupPolicy {
    pub enabled: bool,
    pub key_field: String,
}

/// Join 配置: 主数据源 LEFT JOIN 参照数据源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// 参照数据源名称 (日志/报错用)
    pub reference_label: String,
    /// 参照数据源的 join key 列
    pub reference_key: String,
    /// 并入主记录的参照字段
    pub reference_fields: Vec<String>,
    /// 权威日期列: join 后该列为空即判定为无匹配
    pub authoritative_date_field: String,
}

/// 必需列清单 (缺失即配置错误, 运行前致命)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredColumns {
    pub primary: Vec<String>,
    pub reference: Vec<String>,
}

// ==========================================
// RuleSet - 不可变配置快照
// ==========================================
// 一次评估过程持有一个快照; 热更新通过重新 load 获得新快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// 按 ordinal 升序排列的全部阶段
    pub stages: Vec<StageDefinition>,
    /// 整体 OTD 判定规则
    pub overall: RuleMethod,
    /// exclude 值是否从整体分母剔除 (false 时按 FAIL 计)
    pub exclude_no_pod: bool,
    pub dedup: DedupPolicy,
    pub join: JoinConfig,
    pub required: RequiredColumns,
}

impl RuleSet {
    /// 可用阶段, 按 ordinal 升序 (防御性重排, 不依赖载入顺序)
    pub fn available_stages(&self) -> Vec<&StageDefinition> {
        let mut stages: Vec<&StageDefinition> =
            self.stages.iter().filter(|s| s.available).collect();
        stages.sort_by_key(|s| s.ordinal);
        stages
    }

    /// 全部阶段, 按 ordinal 升序
    pub fn stages_in_order(&self) -> Vec<&StageDefinition> {
        let mut stages: Vec<&StageDefinition> = self.stages.iter().collect();
        stages.sort_by_key(|s| s.ordinal);
        stages
    }

    /// 按标识查找阶段
    pub fn stage(&self, stage_id: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// 阶段展示名; 未配置时回退到标识本身
    pub fn stage_name(&self, stage_id: &str) -> String {
        self.stage(stage_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| stage_id.to_string())
    }

    /// 从声明式文档加载配置快照
    ///
    /// # 行为
    /// - 文件不存在 → 使用内置默认模型 (记录 warn 日志)
    /// - 文档含未知方法标签 / 序号冲突 / 字段缺失 → ConfigError (致命)
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "规则文档不存在, 使用默认计算模型");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let raw: RawRuleDocument = serde_json::from_str(&content)?;
        let rule_set = raw.validate()?;
        info!(
            path = %path.display(),
            stages = rule_set.stages.len(),
            "规则文档加载完成"
        );
        Ok(rule_set)
    }

    /// 热更新: 重新加载并返回全新快照
    ///
    /// 调用方自行决定何时替换持有的快照; 进行中的评估继续使用旧快照,
    /// 不会观察到半更新状态。
    pub fn reload<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::load(path)
    }
}

impl Default for RuleSet {
    /// 内置默认模型: 交付链六阶段 (与上游 BI 口径一致)
    fn default() -> Self {
        RuleSet {
            stages: vec![
                StageDefinition {
                    id: "planned_performance_ok".to_string(),
                    name: "Planned Performance".to_string(),
                    ordinal: 1,
                    available: true,
                    method: Some(RuleMethod::DateCompare {
                        // 参照数据源字段按 snake_case 规范化后并入主记录
                        earlier_field: "leveringstermijn".to_string(),
                        later_field: "SAP Delivery Date".to_string(),
                    }),
                    reference_field: None,
                },
                StageDefinition {
                    id: "capacity_performance_ok".to_string(),
                    name: "Capacity Performance".to_string(),
                    ordinal: 2,
                    available: true,
                    method: Some(RuleMethod::Column {
                        source_field: "PERFORMANCE_CAPACITY".to_string(),
                        pass_values: vec!["not moved".to_string()],
                        exclude_values: vec![],
                    }),
                    reference_field: Some("PERFORMANCE_CAPACITY".to_string()),
                },
                StageDefinition {
                    id: "warehouse_performance_ok".to_string(),
                    name: "Warehouse Performance".to_string(),
                    ordinal: 3,
                    available: true,
                    method: Some(RuleMethod::Column {
                        source_field: "PERFORMANCE_LOGISTIC".to_string(),
                        pass_values: vec!["On schedule".to_string()],
                        exclude_values: vec![],
                    }),
                    reference_field: Some("PERFORMANCE_LOGISTIC".to_string()),
                },
                StageDefinition {
                    id: "carrier_pickup_ok".to_string(),
                    name: "Carrier Pick-up".to_string(),
                    ordinal: 4,
                    available: false,
                    method: None,
                    reference_field: None,
                },
                StageDefinition {
                    id: "carrier_departure_ok".to_string(),
                    name: "Carrier Departure".to_string(),
                    ordinal: 5,
                    available: false,
                    method: None,
                    reference_field: None,
                },
                StageDefinition {
                    id: "carrier_transit_ok".to_string(),
                    name: "Carrier Transit".to_string(),
                    ordinal: 6,
                    available: true,
                    method: Some(RuleMethod::DateCompare {
                        earlier_field: "PODDeliveryDateShipment".to_string(),
                        later_field: "leveringstermijn".to_string(),
                    }),
                    reference_field: None,
                },
            ],
            overall: RuleMethod::DateCompare {
                earlier_field: "PODDeliveryDateShipment".to_string(),
                later_field: "RequestedDeliveryDateFinal".to_string(),
            },
            exclude_no_pod: true,
            dedup: DedupPolicy {
                enabled: true,
                key_field: "DeliveryNumber".to_string(),
            },
            join: JoinConfig {
                reference_label: "LIKP".to_string(),
                reference_key: "levering".to_string(),
                reference_fields: vec![
                    "leveringstermijn".to_string(),
                    "pickdatum".to_string(),
                    "gecreëerd_op".to_string(),
                ],
                authoritative_date_field: "leveringstermijn".to_string(),
            },
            required: RequiredColumns {
                primary: vec![
                    "DeliveryNumber".to_string(),
                    "SAP Delivery Date".to_string(),
                    "RequestedDeliveryDateFinal".to_string(),
                    "PODDeliveryDateShipment".to_string(),
                    "PERFORMANCE_CAPACITY".to_string(),
                    "PERFORMANCE_LOGISTIC".to_string(),
                ],
                reference: vec![
                    "levering".to_string(),
                    "leveringstermijn".to_string(),
                    "pickdatum".to_string(),
                ],
            },
        }
    }
}

// ==========================================
// 原始文档结构 (serde 反序列化层)
// ==========================================
// 键名沿用既有 rekenmodel 文档约定 (naam/nummer/beschikbaar),
// 保证人工编辑的文档向后兼容

#[derive(Debug, Deserialize)]
struct RawRuleDocument {
    #[serde(default)]
    dedup: Option<RawDedup>,
    #[serde(default)]
    no_pod: Option<RawNoPod>,
    #[serde(default)]
    otd: Option<RawRule>,
    #[serde(default)]
    performances: BTreeMap<String, RawStage>,
    #[serde(default)]
    join: Option<RawJoin>,
    #[serde(default)]
    required: Option<RawRequired>,
}

#[derive(Debug, Deserialize)]
struct RawDedup {
    #[serde(default)]
    enabled: bool,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNoPod {
    #[serde(default)]
    exclude_from_denominator: bool,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    method: Option<String>,
    #[serde(default)]
    dates: Vec<String>,
    source_column: Option<String>,
    #[serde(default)]
    ok_values: Vec<String>,
    #[serde(default, alias = "no_pod_values")]
    exclude_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawStage {
    naam: Option<String>,
    nummer: Option<u32>,
    #[serde(default)]
    beschikbaar: bool,
    #[serde(flatten)]
    rule: RawRule,
    reference_column: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawJoin {
    reference_label: Option<String>,
    reference_key: Option<String>,
    #[serde(default)]
    reference_fields: Vec<String>,
    authoritative_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequired {
    #[serde(default)]
    primary: Vec<String>,
    #[serde(default)]
    reference: Vec<String>,
}

impl RawRule {
    /// 解析方法标签; 未知标签在加载期拒绝
    fn into_method(self, stage_id: &str) -> ConfigResult<RuleMethod> {
        let tag = self.method.as_deref().unwrap_or("");
        match tag {
            "column" => {
                let source_field =
                    self.source_column
                        .filter(|s| !s.trim().is_empty())
                        .ok_or_else(|| ConfigError::MissingField {
                            stage: stage_id.to_string(),
                            field: "source_column".to_string(),
                        })?;
                Ok(RuleMethod::Column {
                    source_field,
                    pass_values: self.ok_values,
                    exclude_values: self.exclude_values,
                })
            }
            "recalculate" => {
                if self.dates.len() != 2 {
                    return Err(ConfigError::MissingField {
                        stage: stage_id.to_string(),
                        field: "dates[2]".to_string(),
                    });
                }
                let mut dates = self.dates;
                let later_field = dates.pop().unwrap_or_default();
                let earlier_field = dates.pop().unwrap_or_default();
                Ok(RuleMethod::DateCompare {
                    earlier_field,
                    later_field,
                })
            }
            other => Err(ConfigError::UnknownMethod {
                stage: stage_id.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

impl RawRuleDocument {
    /// 校验并转换为不可变 RuleSet
    fn validate(self) -> ConfigResult<RuleSet> {
        let defaults = RuleSet::default();

        // 阶段定义
        let mut stages = Vec::new();
        if self.performances.is_empty() {
            stages = defaults.stages.clone();
        } else {
            for (stage_id, raw) in self.performances {
                let available = raw.beschikbaar;
                let method = if available {
                    Some(raw.rule.into_method(&stage_id)?)
                } else {
                    // 不可用阶段不消费规则, 也不校验其方法
                    None
                };
                stages.push(StageDefinition {
                    name: raw.naam.unwrap_or_else(|| stage_id.clone()),
                    ordinal: raw.nummer.unwrap_or(0),
                    available,
                    method,
                    reference_field: raw.reference_column,
                    id: stage_id,
                });
            }
        }

        // 序号必须是严格全序
        stages.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then(a.id.cmp(&b.id)));
        for pair in stages.windows(2) {
            if pair[0].ordinal == pair[1].ordinal {
                return Err(ConfigError::DuplicateOrdinal {
                    ordinal: pair[0].ordinal,
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }

        // 整体 OTD 规则
        let overall = match self.otd {
            Some(raw) => raw.into_method("otd")?,
            None => defaults.overall.clone(),
        };

        let exclude_no_pod = self
            .no_pod
            .map(|n| n.exclude_from_denominator)
            .unwrap_or(defaults.exclude_no_pod);

        let dedup = match self.dedup {
            Some(raw) => DedupPolicy {
                enabled: raw.enabled,
                key_field: raw.key.unwrap_or(defaults.dedup.key_field.clone()),
            },
            None => defaults.dedup.clone(),
        };

        let join = match self.join {
            Some(raw) => JoinConfig {
                reference_label: raw
                    .reference_label
                    .unwrap_or(defaults.join.reference_label.clone()),
                reference_key: raw
                    .reference_key
                    .unwrap_or(defaults.join.reference_key.clone()),
                reference_fields: if raw.reference_fields.is_empty() {
                    defaults.join.reference_fields.clone()
                } else {
                    raw.reference_fields
                },
                authoritative_date_field: raw
                    .authoritative_date
                    .unwrap_or(defaults.join.authoritative_date_field.clone()),
            },
            None => defaults.join.clone(),
        };

        let required = match self.required {
            Some(raw) => RequiredColumns {
                primary: if raw.primary.is_empty() {
                    defaults.required.primary.clone()
                } else {
                    raw.primary
                },
                reference: if raw.reference.is_empty() {
                    defaults.required.reference.clone()
                } else {
                    raw.reference
                },
            },
            None => defaults.required.clone(),
        };

        Ok(RuleSet {
            stages,
            overall,
            exclude_no_pod,
            dedup,
            join,
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_six_stages() {
        let rules = RuleSet::default();
        assert_eq!(rules.stages.len(), 6);
        assert_eq!(rules.available_stages().len(), 4);
        // 序号升序
        let ordinals: Vec<u32> = rules.stages_in_order().iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_unknown_method_rejected_at_load() {
        let raw = RawRule {
            method: Some("llm_magic".to_string()),
            dates: vec![],
            source_column: None,
            ok_values: vec![],
            exclude_values: vec![],
        };
        let err = raw.into_method("planned_performance_ok").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMethod { .. }));
    }

    #[test]
    fn test_column_method_requires_source() {
        let raw = RawRule {
            method: Some("column".to_string()),
            dates: vec![],
            source_column: None,
            ok_values: vec!["ok".to_string()],
            exclude_values: vec![],
        };
        let err = raw.into_method("capacity_performance_ok").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_recalculate_requires_two_dates() {
        let raw = RawRule {
            method: Some("recalculate".to_string()),
            dates: vec!["A".to_string()],
            source_column: None,
            ok_values: vec![],
            exclude_values: vec![],
        };
        assert!(raw.into_method("x").is_err());
    }

    #[test]
    fn test_date_order_earlier_then_later() {
        let raw = RawRule {
            method: Some("recalculate".to_string()),
            dates: vec!["POD".to_string(), "Requested".to_string()],
            source_column: None,
            ok_values: vec![],
            exclude_values: vec![],
        };
        match raw.into_method("otd").unwrap() {
            RuleMethod::DateCompare {
                earlier_field,
                later_field,
            } => {
                assert_eq!(earlier_field, "POD");
                assert_eq!(later_field, "Requested");
            }
            _ => panic!("expected DateCompare"),
        }
    }
}
