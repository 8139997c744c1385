//! 在落地页里找到真正的下载链接。
//!
//! 发布方不提供固定的数据地址，只在一个 HTML 页面上挂一个带日期的
//! 表格链接，所以每次下载前都要先抓页面、找 `<a href>`。

use anyhow::Result;
use reqwest::Url;
use tracing::info;

use crate::error::Error;
use crate::fetcher::Downloader;

/// 数据的来源：固定地址，或者需要从页面里抓出来的地址
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Direct(String),
    Scraped { page: String, pattern: String },
}

impl Source {
    /// 得到可以直接下载的 URL
    pub async fn resolve(&self, downloader: &Downloader) -> Result<String> {
        match self {
            Source::Direct(url) => Ok(url.clone()),
            Source::Scraped { page, pattern } => {
                let html = downloader.retrieve_text(page).await?;
                let url = locate(page, &html, pattern)?;
                info!("resolved download link: {}", url);
                Ok(url)
            }
        }
    }
}

/// 在 `html` 中找第一个以 `pattern` 结尾的链接，并按 `page` 补全为绝对地址
pub fn locate(page: &str, html: &str, pattern: &str) -> Result<String> {
    let href = find_link(html, pattern).ok_or_else(|| Error::LinkNotFound {
        page: page.to_string(),
        pattern: pattern.to_string(),
    })?;
    match Url::parse(page) {
        Ok(base) => Ok(base.join(href)?.to_string()),
        // 页面地址本身不是 URL 时原样返回
        Err(_) => Ok(href.to_string()),
    }
}

/// 纯函数：返回第一个 path 以 `pattern` 结尾（不区分大小写）的 href
pub fn find_link<'a>(html: &'a str, pattern: &str) -> Option<&'a str> {
    let lc = html.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    let mut from = 0;

    while let Some(rel) = lc[from..].find("<a") {
        let start = from + rel;
        let end = match lc[start..].find('>') {
            Some(e) => start + e,
            None => break,
        };
        from = end + 1;

        // "<abbr>" 之类的标签不是锚点
        if !lc[start + 2..].starts_with(|c: char| c.is_ascii_whitespace()) {
            continue;
        }

        if let Some(href) = href_attr(&html[start..end], &lc[start..end]) {
            let path = href.split(['?', '#']).next().unwrap_or("");
            let path_lc = path.to_ascii_lowercase();
            if path_lc.len() > pattern.len() && path_lc.ends_with(&pattern) {
                return Some(href);
            }
        }
    }
    None
}

// 取出标签里的 href 值，支持双引号、单引号和不带引号
fn href_attr<'a>(tag: &'a str, tag_lc: &str) -> Option<&'a str> {
    let mut search = 0;
    loop {
        let idx = search + tag_lc[search..].find("href")?;
        search = idx + 4;
        let before_ok = tag_lc[..idx].ends_with(|c: char| c.is_ascii_whitespace());
        let rest = tag[search..].trim_start();
        if !before_ok || !rest.starts_with('=') {
            continue;
        }
        let value = rest[1..].trim_start();
        let offset = tag.len() - value.len();
        return match value.chars().next()? {
            q @ ('"' | '\'') => {
                let close = value[1..].find(q)?;
                Some(&tag[offset + 1..offset + 1 + close])
            }
            _ => {
                let stop = value
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(value.len());
                Some(&tag[offset..offset + stop])
            }
        };
    }
}
