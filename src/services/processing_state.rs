//! 申报文件处理状态 - 业务能力层
//!
//! ## 职责
//!
//! - `load`：读取当前状态与已完成阶段的产物
//! - `advance`：状态单调前进，并在同一次记录写入中持久化该阶段的产物
//! - `mark_failed`：记录失败原因，保留已有的产物，下次运行从最后完成的步骤继续
//!
//! 同一份申报文件在一次运行中只有一个写入者（单个流水线任务），因此"读-改-写"不需要额外加锁。

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::Store;
use crate::models::{
    CompositeResult, Filing, FilingId, FilingRecord, FilingStatus, QualitativeSection,
    SectionName, SubScores,
};

/// 阶段产物
#[derive(Debug, Clone)]
pub enum Payload {
    /// 抓取到的原始内容（→ fetching）
    RawContent(String),
    /// 提取出的章节（→ extracting）
    Sections(BTreeMap<SectionName, QualitativeSection>),
    /// 子评分（→ analyzing）
    SubScores(SubScores),
    /// 综合结果（→ scored）
    Composite(CompositeResult),
}

impl Payload {
    /// 该产物对应的状态
    pub fn status(&self) -> FilingStatus {
        match self {
            Payload::RawContent(_) => FilingStatus::Fetching,
            Payload::Sections(_) => FilingStatus::Extracting,
            Payload::SubScores(_) => FilingStatus::Analyzing,
            Payload::Composite(_) => FilingStatus::Scored,
        }
    }
}

/// 处理状态服务
#[derive(Clone)]
pub struct ProcessingState {
    store: Arc<dyn Store>,
}

impl ProcessingState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// 登记申报文件；已存在时返回已有记录（保留其进度）
    pub async fn register(&self, filing: Filing) -> PipelineResult<FilingRecord> {
        let id = filing.id.clone();
        let record = FilingRecord::new(filing);
        if self.store.insert_record_if_absent(&record).await? {
            debug!("登记新的申报文件: {}", id);
            return Ok(record);
        }
        self.require(&id).await
    }

    pub async fn load(&self, id: &FilingId) -> PipelineResult<Option<FilingRecord>> {
        self.store.load_record(id).await
    }

    async fn require(&self, id: &FilingId) -> PipelineResult<FilingRecord> {
        self.store
            .load_record(id)
            .await?
            .ok_or_else(|| PipelineError::Storage(format!("申报文件记录不存在: {}", id)))
    }

    /// 前进到 `to` 并持久化产物（状态与产物在同一次写入中更新）
    ///
    /// 合法转换：`to == last_completed.next()`；
    /// 失败后允许重做最后完成的那一步（`to == last_completed`），产物整体覆盖。
    /// `scored` 之后不再接受任何转换。
    pub async fn advance(
        &self,
        id: &FilingId,
        to: FilingStatus,
        payload: Payload,
    ) -> PipelineResult<FilingRecord> {
        let mut record = self.require(id).await?;

        let invalid = || PipelineError::InvalidTransition {
            filing: id.clone(),
            from: record.status,
            to,
        };

        if payload.status() != to || record.last_completed == FilingStatus::Scored {
            return Err(invalid());
        }
        let forward = record.last_completed.next() == Some(to);
        let redo = record.status == FilingStatus::Failed && record.last_completed == to;
        if !forward && !redo {
            return Err(invalid());
        }

        match payload {
            Payload::RawContent(content) => {
                record.raw_content = Some(content);
            }
            Payload::Sections(sections) => {
                record.sections = sections;
                record.raw_content = None;
            }
            Payload::SubScores(scores) => {
                record.sub_scores = Some(scores);
                record.composite = None;
            }
            Payload::Composite(composite) => {
                record.composite = Some(composite);
            }
        }

        record.status = to;
        record.last_completed = to;
        record.last_error = None;
        record.updated_at = Utc::now();

        self.store.save_record(&record).await?;
        debug!("[{}] 状态前进到 {}", id, to);
        Ok(record)
    }

    /// 标记失败，保留已完成阶段的产物
    pub async fn mark_failed(&self, id: &FilingId, reason: &str) -> PipelineResult<FilingRecord> {
        let mut record = self.require(id).await?;
        if record.status == FilingStatus::Scored {
            return Err(PipelineError::InvalidTransition {
                filing: id.clone(),
                from: record.status,
                to: FilingStatus::Failed,
            });
        }

        record.status = FilingStatus::Failed;
        record.last_error = Some(reason.to_string());
        record.updated_at = Utc::now();

        self.store.save_record(&record).await?;
        debug!("[{}] 标记为失败: {}", id, reason);
        Ok(record)
    }

    /// 所有已评分的记录
    pub async fn scored_records(&self) -> PipelineResult<Vec<FilingRecord>> {
        Ok(self
            .store
            .list_records()
            .await?
            .into_iter()
            .filter(|r| r.is_scored() && r.composite.is_some())
            .collect())
    }
}
