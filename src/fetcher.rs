use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::fs;
use tracing::debug;

use crate::error::Error;

// rust 的 async trait 还没有稳定，可以用async_trait 宏
#[async_trait]
pub trait Fetch {
    type Error;
    async fn fetch(&self) -> Result<Vec<u8>, Self::Error>;
}

/// 所有下载共用一个 http client，请求超时在这里统一设置
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// 从文件源或者 http 源中获取原始字节
    pub async fn retrieve_data(&self, source: impl AsRef<str>) -> Result<Vec<u8>> {
        let name = source.as_ref();
        match name.get(..4) {
            // 包括 http / https
            Some("http") => {
                UrlFetcher {
                    client: &self.client,
                    url: name,
                }
                .fetch()
                .await
            }
            Some("file") => FileFetcher(name).fetch().await,
            _ => Err(Error::UnsupportedSource(name.to_string()).into()),
        }
    }

    /// 按文本读取，用于抓取 HTML 页面
    pub async fn retrieve_text(&self, source: impl AsRef<str>) -> Result<String> {
        let bytes = self.retrieve_data(source).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

struct UrlFetcher<'a> {
    client: &'a Client,
    url: &'a str,
}

#[async_trait]
impl<'a> Fetch for UrlFetcher<'a> {
    type Error = anyhow::Error;

    async fn fetch(&self) -> Result<Vec<u8>, Self::Error> {
        debug!(url = self.url, "GET");
        let resp = self.client.get(self.url).send().await?;
        // 非 2xx 直接报错，避免把错误页面写进缓存
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: self.url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

struct FileFetcher<'a>(pub(crate) &'a str);

#[async_trait]
impl<'a> Fetch for FileFetcher<'a> {
    type Error = anyhow::Error;

    async fn fetch(&self) -> Result<Vec<u8>, Self::Error> {
        // 拼接出来的链接是百分号编码的，交给 Url 解码成本地路径
        let path = Url::parse(self.0)
            .ok()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| Error::UnsupportedSource(self.0.to_string()))?;
        Ok(fs::read(path).await?)
    }
}

/// 本地的假 http 服务
#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 每个连接读完请求后回复 `response`
    pub async fn serve(response: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        addr
    }

    /// 接受连接但永远不回复
    pub async fn silent() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        addr
    }

    pub const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
}
