//! Scripted [`Api`] stub shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use reqwest::Method;
use serde_json::Value;

use super::{Api, ApiRequest, Service};
use crate::error::{AdminError, Result};

/// One canned reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
}

/// Replies are queued per `METHOD service/path`; the last reply of a queue
/// repeats forever. Unscripted routes answer 404.
#[derive(Default)]
pub struct FakeApi {
    routes: RefCell<HashMap<String, VecDeque<Reply>>>,
    calls:  RefCell<Vec<ApiRequest>>,
}

fn route_key(method: &Method, service: Service, path: &str) -> String {
    format!("{method} {service}/{path}")
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, service: Service, path: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .borrow_mut()
            .insert(route_key(&method, service, path), replies.into());
        self
    }

    pub fn on_get(self, service: Service, path: &str, reply: Reply) -> Self {
        self.on(Method::GET, service, path, vec![reply])
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.path == path).count()
    }
}

impl Api for FakeApi {
    async fn invoke(&self, req: ApiRequest) -> Result<Value> {
        let key = route_key(&req.method, req.service, &req.path);
        let reply = {
            let mut routes = self.routes.borrow_mut();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let service = req.service.to_string();
        let path = req.path.clone();
        self.calls.borrow_mut().push(req);

        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Status(status)) => Err(AdminError::Api {
                service,
                path,
                status,
                message: "scripted failure".into(),
            }),
            None => Err(AdminError::Api {
                service,
                path,
                status: 404,
                message: format!("no route for {key}"),
            }),
        }
    }
}
