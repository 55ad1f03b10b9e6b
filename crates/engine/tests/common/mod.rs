use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use harvest_api::{ClientError, HttpClient};
use harvest_engine::{ApiDefinitions, HttpClients, Requester};
use harvest_types::{HttpRequest, Page};
use indexmap::IndexMap;
use serde_json::Value;

pub fn load_fixture() -> ApiDefinitions {
    let definitions = include_str!("../data/zendesk_definitions.yaml");
    let definitions: ApiDefinitions = serde_yaml::from_str(definitions).expect("load definitions from fixture");
    definitions.validate().expect("fixture is valid");
    definitions
}

/// Serves scripted pages per path, in order, and records every request it receives.
#[derive(Default)]
pub struct RecordingClient {
    responses: Mutex<IndexMap<String, VecDeque<Page>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingClient {
    pub fn with_pages(self, path: &str, pages: impl IntoIterator<Item = Value>) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(path.to_string())
            .or_default()
            .extend(pages.into_iter().map(Page::from_data));
        self
    }

    pub fn with_page(self, path: &str, page: Page) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(path.to_string())
            .or_default()
            .push_back(page);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl HttpClient for RecordingClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Page, ClientError> {
        self.requests.lock().expect("requests lock").push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ClientError::Status {
                method: request.method,
                path: request.path.clone(),
                status: 404,
                body: "no scripted page".into(),
            })
    }
}

pub fn requester(definitions: ApiDefinitions, client: Arc<RecordingClient>) -> Requester {
    let clients: HttpClients = IndexMap::from([("main".to_string(), client as Arc<dyn HttpClient>)]);
    Requester::new(Arc::new(definitions), clients)
}
