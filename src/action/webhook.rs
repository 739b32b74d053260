use std::collections::HashMap;

use anyhow::Result;

use crate::action::{ActionContext, ActionExecutor};
use crate::placeholder;
use crate::state::object::StateObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Post,
    Get,
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Option<HttpMethod> {
        match raw.to_ascii_uppercase().as_str() {
            "POST" => Some(HttpMethod::Post),
            "GET" => Some(HttpMethod::Get),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Mapping(serde_json::Map<String, serde_json::Value>),
    Text(String),
}

#[derive(Clone)]
pub struct WebhookAction {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub payload: Option<Payload>,
}

impl ActionExecutor for WebhookAction {
    fn execute(&self, state: &StateObject, _ctx: &ActionContext) -> Result<()> {
        let url = placeholder::format(state, &self.url);
        let result = match self.method {
            HttpMethod::Post => self.send_post(state, &url),
            HttpMethod::Get => self.send_get(state, &url),
        };
        if let Err(e) = result {
            log::warn!("webhook action to '{url}' failed: {e}");
        }
        Ok(())
    }
}

impl WebhookAction {
    fn apply_headers(&self, state: &StateObject, req: ureq::Request) -> ureq::Request {
        let mut req = req;
        for (name, value) in &self.headers {
            req = req.set(name, &placeholder::format(state, value));
        }
        req
    }

    fn send_post(&self, state: &StateObject, url: &str) -> Result<()> {
        let req = self.apply_headers(state, ureq::post(url));
        let response = match &self.payload {
            Some(Payload::Mapping(map)) => {
                let formatted = placeholder::format_json(state, &serde_json::Value::Object(map.clone()));
                req.send_json(formatted)
            }
            Some(Payload::Text(text)) => req.send_string(&placeholder::format(state, text)),
            None => req.call(),
        };
        check_status(response)
    }

    fn send_get(&self, state: &StateObject, url: &str) -> Result<()> {
        let mut req = self.apply_headers(state, ureq::get(url));
        if let Some(Payload::Mapping(map)) = &self.payload {
            for (key, value) in map {
                let formatted = placeholder::format_json(state, value);
                for v in query_values(&formatted) {
                    req = req.query(key, &v);
                }
            }
        }
        let response = if let Some(Payload::Text(text)) = &self.payload {
            req.query("payload", &placeholder::format(state, text)).call()
        } else {
            req.call()
        };
        check_status(response)
    }
}

/// Flatten a JSON value to the list of query-string values it contributes;
/// arrays expand to repeated `key=v1&key=v2` pairs (§4.5).
fn query_values(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().flat_map(query_values).collect(),
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Null => vec![String::new()],
        other => vec![other.to_string()],
    }
}

fn check_status(response: Result<ureq::Response, ureq::Error>) -> Result<()> {
    match response {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(code, resp)) => {
            anyhow::bail!("non-2xx response {code}: {}", resp.into_string().unwrap_or_default())
        }
        Err(e) => Err(e.into()),
    }
}
