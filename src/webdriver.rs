//! `UiSurface` backed by a W3C WebDriver server such as geckodriver.

use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::{Client as HttpClient, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map as JsonMap, Value};
use tokio::time::sleep;

use crate::ui::{Element, Selector, UiError, UiSurface};

/// Key under which WebDriver serializes element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct DriverFailure {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: String,
}

/// Settings for starting a browser session.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub server_url: String,
    pub firefox_binary: Option<String>,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
}

impl WebDriverConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            firefox_binary: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_firefox_binary(mut self, binary: Option<String>) -> Self {
        self.firefox_binary = binary;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn capabilities(&self) -> Value {
        let mut firefox_options = JsonMap::new();
        if let Some(binary) = &self.firefox_binary {
            firefox_options.insert("binary".to_string(), Value::String(binary.clone()));
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "firefox",
                    "moz:firefoxOptions": firefox_options,
                }
            }
        })
    }
}

/// An open browser session. Dropping it does not end the session; call [`WebDriverSession::close`].
pub struct WebDriverSession {
    http: HttpClient,
    session_url: String,
    poll_interval: Duration,
}

impl WebDriverSession {
    pub async fn start(config: &WebDriverConfig) -> Result<Self, UiError> {
        let http = HttpClient::builder()
            .timeout(config.command_timeout)
            .build()?;
        let base = config.server_url.trim_end_matches('/').to_string();
        let response = http
            .post(format!("{}/session", base))
            .json(&config.capabilities())
            .send()
            .await?;
        let session: NewSession = parse_value(response).await?;
        info!("Started WebDriver session {}", session.session_id);
        Ok(Self {
            http,
            session_url: format!("{}/session/{}", base, session.session_id),
            poll_interval: config.poll_interval,
        })
    }

    pub async fn close(self) -> Result<(), UiError> {
        let _: Value = self.command(Method::DELETE, "", None).await?;
        info!("Closed WebDriver session");
        Ok(())
    }

    async fn command<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, UiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.session_url, path);
        debug!("{} {}", method, url);
        let mut request = self.http.request(method, url);
        if let Some(payload) = body {
            request = request.json(&payload);
        }
        parse_value(request.send().await?).await
    }

    fn element_path(element: &Element, action: &str) -> String {
        format!("/element/{}/{}", element.id(), action)
    }
}

async fn parse_value<T>(response: Response) -> Result<T, UiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|err| UiError::Transport(err.to_string()))?;
        return Ok(envelope.value);
    }
    match serde_json::from_str::<Envelope<DriverFailure>>(&body) {
        Ok(failure) => Err(UiError::Driver {
            error: failure.value.error,
            message: failure.value.message,
        }),
        Err(_) => Err(UiError::Driver {
            error: status.to_string(),
            message: body,
        }),
    }
}

fn element_from(value: &Value) -> Option<Element> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| Element(id.to_string()))
}

impl UiSurface for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), UiError> {
        let _: Value = self
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn locate(&self, selector: &Selector) -> Result<Vec<Element>, UiError> {
        let payload = json!({ "using": "css selector", "value": selector.to_css() });
        let found: Vec<Value> = self.command(Method::POST, "/elements", Some(payload)).await?;
        Ok(found.iter().filter_map(element_from).collect())
    }

    async fn click(&self, element: &Element) -> Result<(), UiError> {
        let _: Value = self
            .command(
                Method::POST,
                &Self::element_path(element, "click"),
                Some(json!({})),
            )
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &Element, text: &str) -> Result<(), UiError> {
        let _: Value = self
            .command(
                Method::POST,
                &Self::element_path(element, "value"),
                Some(json!({ "text": text })),
            )
            .await?;
        Ok(())
    }

    async fn text(&self, element: &Element) -> Result<String, UiError> {
        self.command(Method::GET, &Self::element_path(element, "text"), None)
            .await
    }

    async fn wait_until_present(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Element, UiError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.locate(selector).await?.into_iter().next() {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(UiError::Timeout {
                    selector: selector.clone(),
                    timeout,
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    async fn session_on(server: &mut mockito::ServerGuard) -> WebDriverSession {
        server
            .mock("POST", "/session")
            .match_body(Matcher::PartialJson(json!({
                "capabilities": {"alwaysMatch": {"browserName": "firefox", "moz:firefoxOptions": {"binary": "/opt/firefox/firefox"}}}
            })))
            .with_body(r#"{"value":{"sessionId":"abc","capabilities":{}}}"#)
            .create_async()
            .await;
        let config = WebDriverConfig::new(server.url())
            .with_firefox_binary(Some("/opt/firefox/firefox".to_string()))
            .with_poll_interval(Duration::from_millis(10));
        WebDriverSession::start(&config).await.expect("session starts")
    }

    #[tokio::test]
    async fn locate_returns_element_handles() {
        let mut server = mockito::Server::new_async().await;
        let session = session_on(&mut server).await;
        let mock = server
            .mock("POST", "/session/abc/elements")
            .match_body(Matcher::Json(json!({"using": "css selector", "value": ".CalendarWeek"})))
            .with_body(format!(r#"{{"value":[{{"{ELEMENT_KEY}":"e1"}},{{"{ELEMENT_KEY}":"e2"}}]}}"#))
            .create_async()
            .await;

        let found = session
            .locate(&Selector::class("CalendarWeek"))
            .await
            .expect("locate succeeds");

        mock.assert_async().await;
        assert_eq!(found, vec![Element("e1".to_string()), Element("e2".to_string())]);
    }

    #[tokio::test]
    async fn text_and_typing_use_element_endpoints() {
        let mut server = mockito::Server::new_async().await;
        let session = session_on(&mut server).await;
        server
            .mock("GET", "/session/abc/element/e7/text")
            .with_body(r#"{"value":"8,00"}"#)
            .create_async()
            .await;
        let typed = server
            .mock("POST", "/session/abc/element/e7/value")
            .match_body(Matcher::Json(json!({"text": "4.5"})))
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;

        let element = Element("e7".to_string());
        assert_eq!(session.text(&element).await.expect("text"), "8,00");
        session.type_text(&element, "4.5").await.expect("typing succeeds");
        typed.assert_async().await;
    }

    #[tokio::test]
    async fn wait_until_present_times_out_on_empty_results() {
        let mut server = mockito::Server::new_async().await;
        let session = session_on(&mut server).await;
        server
            .mock("POST", "/session/abc/elements")
            .with_body(r#"{"value":[]}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let err = session
            .wait_until_present(&Selector::class("weekColumnRow"), Duration::from_millis(50))
            .await
            .expect_err("must time out");

        assert!(matches!(err, UiError::Timeout { .. }));
    }

    #[tokio::test]
    async fn driver_errors_are_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let session = session_on(&mut server).await;
        server
            .mock("POST", "/session/abc/element/gone/click")
            .with_status(404)
            .with_body(r#"{"value":{"error":"stale element reference","message":"element is detached","stacktrace":""}}"#)
            .create_async()
            .await;

        let err = session
            .click(&Element("gone".to_string()))
            .await
            .expect_err("must fail");

        match err {
            UiError::Driver { error, message } => {
                assert_eq!(error, "stale element reference");
                assert_eq!(message, "element is detached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_deletes_the_session() {
        let mut server = mockito::Server::new_async().await;
        let session = session_on(&mut server).await;
        let deleted = server
            .mock("DELETE", "/session/abc")
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;

        session.close().await.expect("close succeeds");
        deleted.assert_async().await;
    }
}
