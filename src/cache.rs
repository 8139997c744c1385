//! 基于文件修改时间的简单下载缓存。
//!
//! 每个 key 对应缓存目录下的一个文件，文件的 mtime 距离现在不超过
//! `expiry` 时视为新鲜，否则需要重新下载。时间来源通过 [`Clock`] 注入，
//! 测试里不用去改真实的文件时间戳。

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::fetcher::Downloader;

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.0.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        match self.0.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

#[async_trait]
pub trait Cache {
    /// 返回缓存内容以及它是否仍然新鲜；不存在时返回 None
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, bool)>>;
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;
}

pub struct FileCache<C = SystemClock> {
    dir: PathBuf,
    expiry: Duration,
    clock: C,
}

impl FileCache<SystemClock> {
    pub fn new(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self::with_clock(dir, expiry, SystemClock)
    }
}

impl<C: Clock> FileCache<C> {
    pub fn with_clock(dir: impl Into<PathBuf>, expiry: Duration, clock: C) -> Self {
        Self {
            dir: dir.into(),
            expiry,
            clock,
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn is_fresh(&self, modified: SystemTime) -> bool {
        match self.clock.now().duration_since(modified) {
            Ok(age) => age < self.expiry,
            // mtime 在"未来"，当作刚写入
            Err(_) => true,
        }
    }
}

#[async_trait]
impl<C: Clock> Cache for FileCache<C> {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, bool)>> {
        let path = self.path(key);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let fresh = self.is_fresh(meta.modified()?);
        let data = fs::read(&path).await?;
        Ok(Some((data, fresh)))
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);
        // 先写临时文件再改名，写到一半失败不会留下损坏的缓存
        let tmp = part_path(&path);
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// 缓存过期或不存在时才去取 URL 并下载
pub struct CachedFetcher<C> {
    cache: C,
    downloader: Downloader,
}

impl<C: Cache> CachedFetcher<C> {
    pub fn new(cache: C, downloader: Downloader) -> Self {
        Self { cache, downloader }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub async fn acquire<F, Fut>(&self, key: &str, url_provider: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some((data, true)) = self.cache.get(key).await? {
            debug!(key, "cache hit");
            return Ok(data);
        }

        let url = url_provider().await?;
        info!(key, "downloading {}", url);
        let data = self.downloader.retrieve_data(&url).await?;
        self.cache.put(key, &data).await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fetcher::testing;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    struct Harness {
        _dir: tempfile::TempDir,
        source: String,
        source_path: PathBuf,
        clock: Arc<ManualClock>,
        fetcher: CachedFetcher<FileCache<Arc<ManualClock>>>,
        calls: AtomicUsize,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let source_path = dir.path().join("remote.xls");
            std::fs::write(&source_path, b"v1").unwrap();
            let clock = Arc::new(ManualClock::new(SystemTime::now()));
            let cache = FileCache::with_clock(dir.path().join("cache"), HOUR, clock.clone());
            Self {
                source: format!("file://{}", source_path.display()),
                source_path,
                clock,
                fetcher: CachedFetcher::new(cache, Downloader::new(HOUR).unwrap()),
                calls: AtomicUsize::new(0),
                _dir: dir,
            }
        }

        async fn acquire(&self) -> Vec<u8> {
            self.fetcher
                .acquire("data.xls", || async {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(self.source.clone())
                })
                .await
                .unwrap()
        }

        fn downloads(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn empty_cache_downloads_once() {
        let h = Harness::new();
        assert_eq!(h.acquire().await, b"v1");
        assert_eq!(h.downloads(), 1);
        assert!(h.fetcher.cache().path("data.xls").exists());
    }

    #[tokio::test]
    async fn fresh_entry_is_reused() {
        let h = Harness::new();
        h.acquire().await;
        std::fs::write(&h.source_path, b"v2").unwrap();

        h.clock.advance(Duration::from_secs(60));
        assert_eq!(h.acquire().await, b"v1");
        assert_eq!(h.downloads(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refreshed_once() {
        let h = Harness::new();
        h.acquire().await;
        std::fs::write(&h.source_path, b"v2").unwrap();

        h.clock.advance(HOUR + Duration::from_secs(1));
        assert_eq!(h.acquire().await, b"v2");
        assert_eq!(h.downloads(), 2);
    }

    #[tokio::test]
    async fn failed_download_keeps_previous_entry() {
        let h = Harness::new();
        h.acquire().await;
        std::fs::remove_file(&h.source_path).unwrap();
        h.clock.advance(HOUR * 2);

        let result = h
            .fetcher
            .acquire("data.xls", || async { Ok(h.source.clone()) })
            .await;
        assert!(result.is_err());
        let kept = std::fs::read(h.fetcher.cache().path("data.xls")).unwrap();
        assert_eq!(kept, b"v1");
    }

    #[tokio::test]
    async fn http_error_never_reaches_the_cache() {
        let h = Harness::new();
        h.acquire().await;
        h.clock.advance(HOUR * 2);

        let addr = testing::serve(testing::NOT_FOUND).await;
        let url = format!("http://{}/data.xls", addr);
        let err = h
            .fetcher
            .acquire("data.xls", || async { Ok(url.clone()) })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::HttpStatus { url: url.clone(), status: 404 })
        );

        let cached = h.fetcher.cache().path("data.xls");
        assert_eq!(std::fs::read(&cached).unwrap(), b"v1");
        assert!(!part_path(&cached).exists());
    }

    #[test]
    fn part_file_sits_next_to_target() {
        assert_eq!(
            part_path(Path::new("/tmp/cache/data.xls")),
            PathBuf::from("/tmp/cache/data.xls.part")
        );
    }
}
