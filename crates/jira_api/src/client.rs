use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::JiraConfig;
use crate::error::{JiraError, Result};
use crate::models::{next_start, Comment, CommentPage, Issue, SearchResults, Worklog, WorklogPage};
use crate::rate_limiter::RateLimiter;

const SEARCH_FIELDS: [&str; 2] = ["issuetype", "assignee"];

#[derive(Clone)]
pub struct JiraClient {
    http: HttpClient,
    config: JiraConfig,
    limiter: RateLimiter,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let limiter = RateLimiter::new(config.cooldown);
        Self::new_with_limiter(config, limiter)
    }

    pub fn new_with_limiter(config: JiraConfig, limiter: RateLimiter) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        let url = self.url_for(path);
        debug!("GET {}", url);
        let response = self.http.get(url).query(query).send().await?;
        Self::parse_json(response).await
    }

    pub async fn send_with_body<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.limiter.hit().await;
        let url = self.url_for(path);
        debug!("{} {}", method, url);
        let response = self.http.request(method, url).json(body).send().await?;
        Self::parse_json(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        base.push_str(path.trim_start_matches('/'));
        base
    }

    async fn parse_json<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(JiraError::from)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(JiraError::Authentication(format!(
                "Access denied ({}) - {}",
                status,
                extract_error_message(&body)
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(JiraError::http(status, extract_error_message(&body)))
        }
    }

    /// Runs a JQL search starting at `start_at`, returning one page of issues.
    pub async fn search_issues(&self, jql: &str, start_at: u32) -> Result<SearchResults> {
        let payload = SearchRequest {
            jql,
            start_at,
            max_results: self.config.page_size,
            fields: &SEARCH_FIELDS,
        };
        self.send_with_body(Method::POST, "search", &payload).await
    }

    /// Collects every issue matched by the JQL query, following pagination.
    pub async fn search_all_issues(&self, jql: &str) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut start_at = 0;
        loop {
            let page = self.search_issues(jql, start_at).await?;
            let received = page.issues.len();
            issues.extend(page.issues);
            match next_start(page.start_at, received, page.total) {
                Some(next) => start_at = next,
                None => break,
            }
        }
        Ok(issues)
    }

    pub async fn get_issue_worklogs(&self, issue_key: &str) -> Result<Vec<Worklog>> {
        let path = format!("issue/{}/worklog", issue_key);
        let mut worklogs = Vec::new();
        let mut start_at = 0;
        loop {
            let page: WorklogPage = self.get_with_query(&path, &self.page_query(start_at)).await?;
            let received = page.worklogs.len();
            worklogs.extend(page.worklogs);
            match next_start(page.start_at, received, page.total) {
                Some(next) => start_at = next,
                None => break,
            }
        }
        Ok(worklogs)
    }

    pub async fn get_issue_comments(&self, issue_key: &str) -> Result<Vec<Comment>> {
        let path = format!("issue/{}/comment", issue_key);
        let mut comments = Vec::new();
        let mut start_at = 0;
        loop {
            let page: CommentPage = self.get_with_query(&path, &self.page_query(start_at)).await?;
            let received = page.comments.len();
            comments.extend(page.comments);
            match next_start(page.start_at, received, page.total) {
                Some(next) => start_at = next,
                None => break,
            }
        }
        Ok(comments)
    }

    fn page_query(&self, start_at: u32) -> [(&'static str, String); 2] {
        [
            ("startAt", start_at.to_string()),
            ("maxResults", self.config.page_size.to_string()),
        ]
    }
}

fn build_http_client(config: &JiraConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    let credentials = BASE64_STANDARD.encode(format!("{}:{}", config.username, config.password));
    let mut auth_value = header_value(format!("Basic {}", credentials))?;
    auth_value.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth_value);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| JiraError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| JiraError::Other(err.to_string()))
}

/// Flattens Jira's `errorMessages`/`errors` payload into one line, falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let mut messages: Vec<String> = value
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        for (field, message) in errors {
            if let Some(text) = message.as_str() {
                messages.push(format!("{}: {}", field, text));
            }
        }
    }
    if messages.is_empty() {
        body.to_string()
    } else {
        messages.join("; ")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    jql: &'a str,
    start_at: u32,
    max_results: u32,
    fields: &'a [&'a str],
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, page_size: u32) -> JiraClient {
        let config = JiraConfig::new(server.url(), "alice", "s3cret").with_page_size(page_size);
        JiraClient::new_with_limiter(config, RateLimiter::unlimited()).expect("client builds")
    }

    #[tokio::test]
    async fn search_all_issues_follows_pagination() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/rest/api/2/search")
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .match_body(Matcher::PartialJson(serde_json::json!({"jql": "project = X", "startAt": 0})))
            .with_body(r#"{"startAt":0,"maxResults":1,"total":2,"issues":[{"key":"X-1","fields":{"issuetype":{"name":"Maintenance"},"assignee":{"name":"alice"}}}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/rest/api/2/search")
            .match_body(Matcher::PartialJson(serde_json::json!({"startAt": 1})))
            .with_body(r#"{"startAt":1,"maxResults":1,"total":2,"issues":[{"key":"X-2","fields":{"issuetype":{"name":"Story"},"assignee":null}}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let issues = client.search_all_issues("project = X").await.expect("search succeeds");

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type_name(), "Maintenance");
        assert_eq!(issues[0].assignee_login().as_deref(), Some("alice"));
        assert_eq!(issues[1].assignee_login(), None);
    }

    #[tokio::test]
    async fn worklogs_are_fetched_with_page_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/2/issue/X-1/worklog")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("startAt".into(), "0".into()),
                Matcher::UrlEncoded("maxResults".into(), "100".into()),
            ]))
            .with_body(r#"{"startAt":0,"maxResults":100,"total":1,"worklogs":[{"id":"7","author":{"name":"alice"},"comment":"fix","started":"2024-05-03T09:00:00.000+0000","timeSpentSeconds":14400}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let worklogs = client.get_issue_worklogs("X-1").await.expect("worklogs load");

        mock.assert_async().await;
        assert_eq!(worklogs.len(), 1);
        assert_eq!(worklogs[0].time_spent_seconds, 14400);
        assert_eq!(worklogs[0].comment.as_deref(), Some("fix"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/api/2/issue/X-1/comment")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"errorMessages":["Login required"],"errors":{}}"#)
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let err = client.get_issue_comments("X-1").await.expect_err("must fail");

        match err {
            JiraError::Authentication(message) => assert!(message.contains("Login required")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_carry_jira_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/api/2/search")
            .with_status(400)
            .with_body(r#"{"errorMessages":[],"errors":{"jql":"bad query"}}"#)
            .create_async()
            .await;

        let client = client_for(&server, 100);
        let err = client.search_issues("nonsense", 0).await.expect_err("must fail");

        match err {
            JiraError::Http { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "jql: bad query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(extract_error_message("<html>gateway</html>"), "<html>gateway</html>");
    }
}
