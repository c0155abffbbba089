//! 持久化存储 - 基础设施层
//!
//! 核心只需要"按 id 读写单条记录"的能力，单条记录的写入必须是原子的。
//! 申报文件的状态和各阶段产物放在同一条 [`FilingRecord`] 中，因此一次写入即可保证
//! 状态与产物同时更新或同时不更新。
//!
//! - `MemoryStore`：内存实现，用于测试
//! - `JsonFileStore`：每条记录一个 JSON 文件，先写临时文件再 rename

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Company, FilingId, FilingRecord};

/// 记录存储
#[async_trait]
pub trait Store: Send + Sync {
    // ── 公司 ──

    async fn upsert_company(&self, company: &Company) -> PipelineResult<()>;
    async fn get_company(&self, ticker: &str) -> PipelineResult<Option<Company>>;
    async fn list_companies(&self) -> PipelineResult<Vec<Company>>;

    // ── 申报文件处理记录 ──

    /// 记录不存在时插入，返回是否插入
    async fn insert_record_if_absent(&self, record: &FilingRecord) -> PipelineResult<bool>;
    async fn load_record(&self, id: &FilingId) -> PipelineResult<Option<FilingRecord>>;
    /// 整条覆盖写入
    async fn save_record(&self, record: &FilingRecord) -> PipelineResult<()>;
    async fn list_records(&self) -> PipelineResult<Vec<FilingRecord>>;
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    companies: RwLock<HashMap<String, Company>>,
    records: RwLock<HashMap<FilingId, FilingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_company(&self, company: &Company) -> PipelineResult<()> {
        self.companies
            .write()
            .await
            .insert(company.ticker.clone(), company.clone());
        Ok(())
    }

    async fn get_company(&self, ticker: &str) -> PipelineResult<Option<Company>> {
        Ok(self.companies.read().await.get(ticker).cloned())
    }

    async fn list_companies(&self) -> PipelineResult<Vec<Company>> {
        let mut companies: Vec<Company> = self.companies.read().await.values().cloned().collect();
        companies.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(companies)
    }

    async fn insert_record_if_absent(&self, record: &FilingRecord) -> PipelineResult<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Ok(false);
        }
        records.insert(record.id().clone(), record.clone());
        Ok(true)
    }

    async fn load_record(&self, id: &FilingId) -> PipelineResult<Option<FilingRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save_record(&self, record: &FilingRecord) -> PipelineResult<()> {
        self.records
            .write()
            .await
            .insert(record.id().clone(), record.clone());
        Ok(())
    }

    async fn list_records(&self) -> PipelineResult<Vec<FilingRecord>> {
        let mut records: Vec<FilingRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }
}

/// JSON 文件存储
///
/// 目录结构：
/// ```text
/// <root>/companies/<TICKER>.json
/// <root>/filings/<accession>.json
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    /// 保证 insert_if_absent 的"检查 + 写入"不与其他写入交错
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// 打开（必要时创建）存储目录
    pub async fn open(root: impl AsRef<Path>) -> PipelineResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("companies")).await?;
        fs::create_dir_all(root.join("filings")).await?;
        debug!("📁 状态目录: {}", root.display());
        Ok(Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn company_path(&self, ticker: &str) -> PathBuf {
        self.root
            .join("companies")
            .join(format!("{}.json", sanitize_file_stem(ticker)))
    }

    fn record_path(&self, id: &FilingId) -> PathBuf {
        self.root
            .join("filings")
            .join(format!("{}.json", sanitize_file_stem(id.as_str())))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> PipelineResult<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content).map_err(|e| {
                    PipelineError::Storage(format!("无法解析 {}: {}", path.display(), e))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::Storage(format!(
                "无法读取 {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// 先写同目录下的临时文件，再 rename 覆盖目标文件
    async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
        let content = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await.map_err(|e| {
            PipelineError::Storage(format!("无法写入 {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, path).await.map_err(|e| {
            PipelineError::Storage(format!("无法替换 {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    async fn read_dir_json<T: serde::de::DeserializeOwned>(dir: &Path) -> PipelineResult<Vec<T>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut values = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(value) = Self::read_json(&path).await? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn upsert_company(&self, company: &Company) -> PipelineResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::write_json_atomic(&self.company_path(&company.ticker), company).await
    }

    async fn get_company(&self, ticker: &str) -> PipelineResult<Option<Company>> {
        Self::read_json(&self.company_path(ticker)).await
    }

    async fn list_companies(&self) -> PipelineResult<Vec<Company>> {
        let mut companies: Vec<Company> = Self::read_dir_json(&self.root.join("companies")).await?;
        companies.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(companies)
    }

    async fn insert_record_if_absent(&self, record: &FilingRecord) -> PipelineResult<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.record_path(record.id());
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        Self::write_json_atomic(&path, record).await?;
        Ok(true)
    }

    async fn load_record(&self, id: &FilingId) -> PipelineResult<Option<FilingRecord>> {
        Self::read_json(&self.record_path(id)).await
    }

    async fn save_record(&self, record: &FilingRecord) -> PipelineResult<()> {
        let _guard = self.write_lock.lock().await;
        Self::write_json_atomic(&self.record_path(record.id()), record).await
    }

    async fn list_records(&self) -> PipelineResult<Vec<FilingRecord>> {
        let mut records: Vec<FilingRecord> = Self::read_dir_json(&self.root.join("filings")).await?;
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }
}

/// 只保留文件名安全的字符
fn sanitize_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Filing, FilingStatus};
    use chrono::NaiveDate;

    fn sample_record(accession: &str) -> FilingRecord {
        FilingRecord::new(Filing {
            id: FilingId::new(accession),
            ticker: "MSFT".to_string(),
            cik: "789019".to_string(),
            form_type: "10-K".to_string(),
            filing_date: NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(),
            report_date: NaiveDate::from_ymd_opt(2024, 6, 30),
            fiscal_year: 2024,
            document_url: "https://example.test/msft.htm".to_string(),
        })
    }

    #[tokio::test]
    async fn test_memory_store_insert_if_absent() {
        let store = MemoryStore::new();
        let mut record = sample_record("0000789019-24-000001");

        assert!(store.insert_record_if_absent(&record).await.unwrap());
        record.status = FilingStatus::Failed;
        assert!(!store.insert_record_if_absent(&record).await.unwrap());

        let loaded = store.load_record(record.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status, FilingStatus::Pending);
    }

    #[tokio::test]
    async fn test_json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let company = Company::new("MSFT", "789019", "Microsoft Corporation", None);
        let mut record = sample_record("0000789019-24-000002");

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.upsert_company(&company).await.unwrap();
            assert!(store.insert_record_if_absent(&record).await.unwrap());
            record.status = FilingStatus::Fetching;
            record.last_completed = FilingStatus::Fetching;
            record.raw_content = Some("<html>10-K</html>".to_string());
            store.save_record(&record).await.unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get_company("MSFT").await.unwrap(), Some(company));
        let loaded = reopened.load_record(record.id()).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(reopened.list_records().await.unwrap().len(), 1);

        // 原子写入不会留下临时文件
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("filings"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_json_store_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let missing = store
            .load_record(&FilingId::new("0000000000-00-000000"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
