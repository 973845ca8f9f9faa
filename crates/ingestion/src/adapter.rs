//! 输入适配器 trait

use std::sync::Arc;

use contracts::{InputRecord, StreamKind};

use crate::metrics::IngestionMetrics;
use crate::slot::SlotBank;

/// Observer called with every accepted record before it is stored.
///
/// Live runs use it to record input streams for later replay.
pub type RecordTap = Arc<dyn Fn(&InputRecord) + Send + Sync>;

/// 输入适配器 trait
///
/// 每个输入源对应一个适配器，负责：
/// 1. 注册数据源回调
/// 2. 规范化记录，丢弃非法记录
/// 3. 写入对应的单槽缓冲
pub trait RecordAdapter: Send + Sync {
    /// 获取输入源 ID
    fn source_id(&self) -> &str;

    /// 获取输入流
    fn stream(&self) -> StreamKind;

    /// 启动数据采集
    ///
    /// # Arguments
    /// * `bank` - 单槽缓冲
    /// * `metrics` - 共享的 ingestion 指标
    /// * `tap` - 可选的记录旁路
    fn start(&self, bank: Arc<SlotBank>, metrics: Arc<IngestionMetrics>, tap: Option<RecordTap>);

    /// 停止数据采集
    fn stop(&self);

    /// 检查是否正在监听
    fn is_listening(&self) -> bool;
}
