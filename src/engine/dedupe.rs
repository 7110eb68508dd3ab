// ==========================================
// OTD 绩效引擎 - 去重引擎
// ==========================================
// 职责: 按规范化标识收敛重复发运记录
// 口径: 保留首条 (稳定原始顺序)
// 说明: "保留首条/末条/最完整" 会给出不同的 OTD 数字,
//       这里固定为保留首条, 并通过测试固化该口径
// ==========================================

use crate::config::DedupPolicy;
use crate::domain::ShipmentRecord;
use std::collections::HashSet;
use tracing::{info, instrument};

/// 去重报告 (遥测用, 非功能输出)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    pub before: usize,
    pub after: usize,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

pub struct DedupEngine;

impl DedupEngine {
    /// 执行去重
    ///
    /// # 行为
    /// - 策略关闭 → 原样返回 (pass-through)
    /// - 策略开启 → 按记录 id 保留首条, 保持输入顺序
    #[instrument(skip(records, policy), fields(count = records.len(), enabled = policy.enabled))]
    pub fn run(records: Vec<ShipmentRecord>, policy: &DedupPolicy) -> (Vec<ShipmentRecord>, DedupReport) {
        let before = records.len();

        if !policy.enabled {
            let report = DedupReport {
                before,
                after: before,
            };
            return (records, report);
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(before);
        let mut unique = Vec::with_capacity(before);
        for record in records {
            if seen.insert(record.id.clone()) {
                unique.push(record);
            }
        }

        let report = DedupReport {
            before,
            after: unique.len(),
        };
        if report.removed() > 0 {
            info!(
                before = report.before,
                after = report.after,
                removed = report.removed(),
                "去重完成"
            );
        }

        (unique, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(id: &str, country: &str) -> ShipmentRecord {
        let mut fields = HashMap::new();
        fields.insert("DeliveryNumber".to_string(), id.to_string());
        fields.insert("Country".to_string(), country.to_string());
        ShipmentRecord::from_row(fields, "DeliveryNumber").unwrap()
    }

    fn policy(enabled: bool) -> DedupPolicy {
        DedupPolicy {
            enabled,
            key_field: "DeliveryNumber".to_string(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let records = vec![record("D1", "NL"), record("D1", "DE"), record("D2", "BE")];
        let (unique, report) = DedupEngine::run(records, &policy(true));

        assert_eq!(unique.len(), 2);
        assert_eq!(report.before, 3);
        assert_eq!(report.after, 2);
        // 保留首条: D1 的 Country 应为 NL
        assert_eq!(unique[0].id, "D1");
        assert_eq!(unique[0].raw("Country"), Some("NL"));
        assert_eq!(unique[1].id, "D2");
    }

    #[test]
    fn test_dedup_disabled_pass_through() {
        let records = vec![record("D1", "NL"), record("D1", "DE")];
        let (out, report) = DedupEngine::run(records, &policy(false));

        assert_eq!(out.len(), 2);
        assert_eq!(report.removed(), 0);
    }

    #[test]
    fn test_dedup_normalized_ids_collide() {
        // "8001234.0" 与 "8001234" 规范化后相同
        let records = vec![record("8001234.0", "NL"), record("8001234", "DE")];
        let (unique, _) = DedupEngine::run(records, &policy(true));
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].id, "8001234");
    }
}
