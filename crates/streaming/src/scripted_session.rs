use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use futures::FutureExt as _;
use futures::channel::oneshot;
use serde_json::Value;

use crate::protocol::{CallFuture, SessionChannel, TransportError};

enum Scripted {
    Ready(Result<String, TransportError>),
    Deferred(oneshot::Receiver<Result<String, TransportError>>),
}

/// In-process `SessionChannel` answering from a script. Downstream tests
/// enable it with the `testing` feature.
///
/// Responses are matched on method and arguments. The last ready response for
/// a call repeats; deferred responses resolve when their sender fires.
#[derive(Default)]
pub struct ScriptedSession {
    script: RefCell<BTreeMap<String, VecDeque<Scripted>>>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
}

fn script_key(method: &str, args: &[Value]) -> String {
    format!("{method}{}", Value::Array(args.to_vec()))
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, args: Vec<Value>, response: Result<String, TransportError>) {
        self.script
            .borrow_mut()
            .entry(script_key(method, &args))
            .or_default()
            .push_back(Scripted::Ready(response));
    }

    /// Scripts a response that stays pending until the returned sender fires.
    pub fn respond_later(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> oneshot::Sender<Result<String, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.script
            .borrow_mut()
            .entry(script_key(method, &args))
            .or_default()
            .push_back(Scripted::Deferred(rx));
        tx
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|(m, _)| m == method).count()
    }
}

impl SessionChannel for ScriptedSession {
    fn call(&self, method: &str, args: Vec<Value>) -> CallFuture {
        let key = script_key(method, &args);
        self.calls.borrow_mut().push((method.to_string(), args));

        let next = {
            let mut script = self.script.borrow_mut();
            match script.get_mut(&key) {
                Some(q) => {
                    if q.len() == 1
                        && let Some(Scripted::Ready(r)) = q.front()
                    {
                        Some(Scripted::Ready(r.clone()))
                    } else {
                        q.pop_front()
                    }
                }
                None => None,
            }
        };

        match next {
            Some(Scripted::Ready(result)) => futures::future::ready(result).boxed_local(),
            Some(Scripted::Deferred(rx)) => {
                let method = method.to_string();
                rx.map(move |r| {
                    r.unwrap_or_else(|_| {
                        Err(TransportError::Unavailable(format!("{method} dropped")))
                    })
                })
                .boxed_local()
            }
            None => futures::future::ready(Err(TransportError::Remote {
                method: method.to_string(),
                message: "no scripted response".to_string(),
            }))
            .boxed_local(),
        }
    }
}
