use super::*;
use crate::config::CollectionConfig;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("orgpulse/", env!("CARGO_PKG_VERSION"));
const RATE_REMAINING: &str = "x-ratelimit-remaining";
const UNKNOWN_BUDGET: i64 = -1;

/// REST client for the GitHub API.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    page_size: usize,
    page_delay: Duration,
    min_remaining: u32,
    remaining: AtomicI64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<AccountRef>,
}

impl GitHubClient {
    pub fn new(config: &CollectionConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            page_size: config.page_size,
            page_delay: config.page_delay(),
            min_remaining: config.min_rate_remaining,
            remaining: AtomicI64::new(UNKNOWN_BUDGET),
        })
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("Failed to send request to {path}"))?;
        self.record_budget(response.headers());
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(path, query).await?;
        Self::parse(path, response).await
    }

    async fn parse<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .with_context(|| format!("Failed to parse response from {path}"))
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({status}) for {path}: {body}")
        }
    }

    /// Walks `page=1..` until a short page, a missing `next` link, `limit`
    /// items, or a low rate budget. The last case returns what was gathered.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let per_page = limit.map_or(self.page_size, |l| l.clamp(1, self.page_size));
        let mut items = Vec::new();

        for page in 1.. {
            if page > 1 && self.budget_low() {
                warn!(
                    "Rate budget below {}, stopping pagination of {} after {} items",
                    self.min_remaining,
                    path,
                    items.len()
                );
                break;
            }

            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("per_page", per_page.to_string()));
            query.push(("page", page.to_string()));

            let (batch, more) = match self.fetch_page::<T>(path, &query).await {
                Ok(Some(page_items)) => page_items,
                Ok(None) => break,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        "Page {} of {} failed, keeping {} items: {:#}",
                        page,
                        path,
                        items.len(),
                        e
                    );
                    break;
                }
            };
            let short = batch.len() < per_page;
            items.extend(batch);

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
            if short || !more {
                break;
            }

            tokio::time::sleep(self.page_delay).await;
        }

        debug!("Fetched {} items from {}", items.len(), path);
        Ok(items)
    }

    /// One page and whether a `next` link follows. `None` for an empty
    /// repository, which answers 204 (contributors) or 409 (commits).
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<(Vec<T>, bool)>> {
        let response = self.send(path, query).await?;
        if matches!(response.status(), StatusCode::NO_CONTENT | StatusCode::CONFLICT) {
            return Ok(None);
        }

        let more = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .is_some_and(links::has_next);
        let batch = Self::parse(path, response).await?;
        Ok(Some((batch, more)))
    }

    fn record_budget(&self, headers: &HeaderMap) {
        if let Some(remaining) = headers
            .get(RATE_REMAINING)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
        {
            self.remaining.store(remaining, Ordering::Relaxed);
        }
    }

    fn budget_low(&self) -> bool {
        self.remaining_budget()
            .is_some_and(|remaining| remaining < self.min_remaining)
    }
}

#[async_trait]
impl DataSource for GitHubClient {
    async fn list_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        self.get_paged(
            &format!("/orgs/{org}/repos"),
            &[("type", "all".to_string()), ("sort", "pushed".to_string())],
            None,
        )
        .await
    }

    async fn list_contributors(&self, org: &str, repo: &str) -> Result<Vec<Contributor>> {
        self.get_paged(&format!("/repos/{org}/{repo}/contributors"), &[], None)
            .await
    }

    async fn list_commits(&self, org: &str, repo: &str, limit: usize) -> Result<Vec<Commit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.get_paged(&format!("/repos/{org}/{repo}/commits"), &[], Some(limit))
            .await
    }

    async fn count_commits(&self, org: &str, repo: &str) -> Result<u64> {
        let path = format!("/repos/{org}/{repo}/commits");
        let response = self.send(&path, &[("per_page", "1".to_string())]).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(0);
        }

        let last = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(links::last_page);
        let first_page: Vec<serde_json::Value> = Self::parse(&path, response).await?;

        Ok(last.unwrap_or(first_page.len() as u64))
    }

    async fn list_languages(&self, org: &str, repo: &str) -> Result<LanguageBytes> {
        self.get_json(&format!("/repos/{org}/{repo}/languages"), &[])
            .await
    }

    async fn get_user(&self, login: &str) -> Result<Option<User>> {
        let path = format!("/users/{login}");
        let response = self.send(&path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(&path, response).await.map(Some)
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<String>> {
        let found: SearchResponse = self
            .get_json(
                "/search/users",
                &[
                    ("q", format!("{email} in:email")),
                    ("per_page", "1".to_string()),
                ],
            )
            .await?;
        Ok(found.items.into_iter().next().map(|u| u.login))
    }

    fn remaining_budget(&self) -> Option<u32> {
        let remaining = self.remaining.load(Ordering::Relaxed);
        (remaining >= 0).then(|| remaining.min(u32::MAX as i64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GitHubClient {
        let mut config = Config::default().collection;
        config.api_url = server.uri();
        config.page_size = 2;
        config.page_delay_ms = 0;
        config.min_rate_remaining = 10;
        GitHubClient::new(&config, Some("token".to_string())).unwrap()
    }

    fn repo(name: &str) -> serde_json::Value {
        json!({ "name": name, "stargazers_count": 3, "forks_count": 1 })
    }

    fn next_link(server: &MockServer, page: u32) -> String {
        format!("<{}/orgs/acme/repos?page={page}>; rel=\"next\"", server.uri())
    }

    #[tokio::test]
    async fn repositories_follow_next_links() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next_link(&server, 2).as_str())
                    .set_body_json(json!([repo("core"), repo("docs")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo("api")])))
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories("acme").await.unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["core", "docs", "api"]);
        assert_eq!(repos[0].stars, 3);
    }

    #[tokio::test]
    async fn low_rate_budget_returns_partial_data() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next_link(&server, 2).as_str())
                    .insert_header("x-ratelimit-remaining", "3")
                    .set_body_json(json!([repo("core"), repo("docs")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo("api")])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let repos = client.list_repositories("acme").await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(client.remaining_budget(), Some(3));
    }

    #[tokio::test]
    async fn failed_later_page_keeps_earlier_items() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next_link(&server, 2).as_str())
                    .set_body_json(json!([repo("core"), repo("docs")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let repos = client_for(&server).list_repositories("acme").await.unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["core", "docs"]);
    }

    #[tokio::test]
    async fn failed_first_page_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        assert!(client_for(&server).list_repositories("acme").await.is_err());
    }

    #[tokio::test]
    async fn commit_count_comes_from_last_link() {
        let server = MockServer::start().await;
        let link = format!(
            "<{0}/repos/acme/core/commits?per_page=1&page=2>; rel=\"next\", <{0}/repos/acme/core/commits?per_page=1&page=412>; rel=\"last\"",
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/repos/acme/core/commits"))
            .and(query_param("per_page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", link.as_str())
                    .set_body_json(json!([{ "sha": "abc", "commit": { "message": "init" } }])),
            )
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).count_commits("acme", "core").await.unwrap(), 412);
    }

    #[tokio::test]
    async fn empty_repository_has_no_commits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/empty/commits"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.count_commits("acme", "empty").await.unwrap(), 0);
        assert!(client.list_commits("acme", "empty", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_listing_stops_at_limit() {
        let server = MockServer::start().await;
        let commits = json!([
            { "sha": "a", "commit": { "message": "one" }, "author": null },
            { "sha": "b", "commit": { "message": "two" }, "author": { "login": "octocat" } }
        ]);

        Mock::given(method("GET"))
            .and(path("/repos/acme/core/commits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next_link(&server, 2).as_str())
                    .set_body_json(commits),
            )
            .expect(1)
            .mount(&server)
            .await;

        let found = client_for(&server).list_commits("acme", "core", 2).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].author.is_none());
        assert_eq!(found[1].author.as_ref().unwrap().login, "octocat");
    }

    #[tokio::test]
    async fn missing_user_is_none_and_search_takes_first_hit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/users"))
            .and(query_param("q", "dev@corp.example in:email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "items": [{ "login": "dev-one" }, { "login": "dev-two" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.get_user("ghost").await.unwrap().is_none());
        assert_eq!(
            client.search_user_by_email("dev@corp.example").await.unwrap().as_deref(),
            Some("dev-one")
        );
    }

    #[tokio::test]
    async fn server_errors_propagate() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/core/languages"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_languages("acme", "core")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
