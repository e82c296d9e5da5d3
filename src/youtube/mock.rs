//! A scriptable `Transport` fake for tests and the resolver's own test
//! suite -- never touches the network.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::transport::Transport;
use super::transport::TransportResponse;
use crate::keys::ApiKey;

/// One recorded call, for assertions like "the API was called once with
/// `forHandle=MrBeast`".
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: String,
    pub key: String,
    pub params: BTreeMap<String, String>,
}

/// A `Transport` whose responses are scripted in advance, FIFO, per call.
pub struct MockTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: TransportResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, endpoint: &str, key: &ApiKey, params: &BTreeMap<String, String>) -> TransportResponse {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: endpoint.to_string(),
            key: key.as_str().to_string(),
            params: params.clone(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TransportResponse::Network("no scripted response left".to_string()))
    }
}
