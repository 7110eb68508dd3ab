// ==========================================
// OTD 绩效引擎 - 领域层
// ==========================================
// 职责: 定义领域实体与核心值类型
// 红线: 领域实体不承载业务规则, 规则全部在 engine 层
// ==========================================

pub mod dates;
pub mod shipment;
pub mod types;

pub use dates::{month_label, parse_date_dayfirst, week_label};
pub use shipment::{normalize_id, ReferenceRecord, ShipmentRecord};
pub use types::{PerformanceOutcome, Period, ValidationStatus};
