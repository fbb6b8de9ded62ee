use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::strategy::FetchTarget;
use crate::{Result, DEFAULT_USER_AGENT};

const TEMP_SUFFIX_LEN: usize = 10;

/// Downloads fetch targets and persists them into the cache.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream `target` into `dest` and return the number of bytes written.
    ///
    /// The body goes to a temporary file next to `dest` which is renamed
    /// into place once complete, so `dest` only ever holds whole images.
    /// The temporary file is removed on failure.
    pub async fn persist(&self, target: &FetchTarget, dest: &Path) -> Result<u64> {
        let url = request_url(target)?;
        let tmp = temp_path(dest);

        let result: Result<u64> = match self.download(url, &tmp).await {
            Ok(written) => match fs::rename(&tmp, dest).await {
                Ok(()) => Ok(written),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(written) => {
                log::debug!("persisted {} bytes to {}", written, dest.display());
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&tmp).await {
                    log::trace!("no partial file to remove at {}: {}", tmp.display(), rm);
                }
                Err(e)
            }
        }
    }

    async fn download(&self, url: Url, tmp: &Path) -> Result<u64> {
        log::debug!("fetching {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = fs::File::create(tmp).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Target URL with its parameters appended to the query string.
pub fn request_url(target: &FetchTarget) -> Result<Url> {
    let mut url = Url::parse(target.url())?;
    if let Some(params) = target.params() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url)
}

/// `.{md5 of file name}.{random}.part` beside `dest`; fixed length
/// whatever the size of the destination name.
fn temp_path(dest: &Path) -> PathBuf {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(TEMP_SUFFIX_LEN)
        .collect();
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = md5::compute(name.as_bytes());
    dest.with_file_name(format!(".{:x}.{}.part", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempdir::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn leftovers(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".part"))
            .collect()
    }

    #[test]
    fn params_become_query_string() {
        let mut params = BTreeMap::new();
        params.insert("size".to_owned(), "200".to_owned());
        params.insert("d".to_owned(), "identicon".to_owned());
        let target = FetchTarget::WithParams {
            url: "https://gravatar.com/avatar/abc".to_owned(),
            params,
        };
        assert_eq!(
            request_url(&target).unwrap().as_str(),
            "https://gravatar.com/avatar/abc?d=identicon&size=200"
        );
    }

    #[test]
    fn malformed_url_is_rejected() {
        let target = FetchTarget::Url("not a url".to_owned());
        assert!(request_url(&target).is_err());
    }

    #[tokio::test]
    async fn persists_body_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/avatar/abc"))
            .and(query_param("size", "64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new("avatar_fetch").unwrap();
        let dest = dir.path().join("1-64x64.png");
        let mut params = BTreeMap::new();
        params.insert("size".to_owned(), "64".to_owned());
        let target = FetchTarget::WithParams {
            url: format!("{}/avatar/abc", server.uri()),
            params,
        };

        let fetcher = Fetcher::new().unwrap();
        let written = fetcher.persist(&target, &dest).await.unwrap();
        assert_eq!(written, PNG.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), PNG);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn upstream_error_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new("avatar_fetch").unwrap();
        let dest = dir.path().join("1-64x64.png");
        let target = FetchTarget::Url(format!("{}/missing.png", server.uri()));

        let err = Fetcher::new()
            .unwrap()
            .persist(&target, &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert!(!dest.exists());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_a_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .mount(&server)
            .await;

        let dir = TempDir::new("avatar_fetch").unwrap();
        let dest = dir.path().join("absent").join("1-64x64.png");
        let target = FetchTarget::Url(format!("{}/a.png", server.uri()));

        let err = Fetcher::new()
            .unwrap()
            .persist(&target, &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }

    #[tokio::test]
    async fn failed_rename_removes_written_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new("avatar_fetch").unwrap();
        let dest = dir.path().join("1-64x64.png");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), b"untouched").unwrap();
        let target = FetchTarget::Url(format!("{}/a.png", server.uri()));

        let err = Fetcher::new()
            .unwrap()
            .persist(&target, &dest)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert!(leftovers(dir.path()).is_empty());
        assert!(dest.is_dir());
        assert_eq!(std::fs::read(dest.join("keep")).unwrap(), b"untouched");
    }

    #[test]
    fn temp_name_length_is_bounded() {
        let short = temp_path(Path::new("/cache/1-64x64.png"));
        let long = temp_path(&Path::new("/cache").join(format!("{}-64x64.png", "x".repeat(240))));
        let len = |p: &Path| p.file_name().unwrap().len();
        assert_eq!(len(short.as_path()), len(long.as_path()));
        assert!(len(long.as_path()) < 64);
        assert_eq!(long.parent(), Some(Path::new("/cache")));
    }

    #[tokio::test]
    async fn long_identity_still_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .mount(&server)
            .await;

        let dir = TempDir::new("avatar_fetch").unwrap();
        let dest = dir.path().join(format!("{}-64x64.png", "x".repeat(240)));
        let target = FetchTarget::Url(format!("{}/a.png", server.uri()));

        Fetcher::new().unwrap().persist(&target, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), PNG);
        assert!(leftovers(dir.path()).is_empty());
    }
}
