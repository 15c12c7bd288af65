//! Session channel backed by a JS callback `(method, args) => result`.
//!
//! The callback may return a value or a promise. String results are passed
//! through; anything else is JSON-stringified.

use futures::FutureExt as _;
use js_sys::{Function, JSON, Promise};
use serde_json::Value;
use streaming::{CallFuture, SessionChannel, TransportError};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

pub struct JsSession {
    call: Function,
}

impl JsSession {
    pub fn new(call: Function) -> Self {
        Self { call }
    }
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| JSON::stringify(value).ok().and_then(|s| s.as_string()))
        .unwrap_or_else(|| "unknown JS error".to_string())
}

impl SessionChannel for JsSession {
    fn call(&self, method: &str, args: Vec<Value>) -> CallFuture {
        let args = match JSON::parse(&Value::Array(args).to_string()) {
            Ok(args) => args,
            Err(err) => {
                return futures::future::ready(Err(TransportError::Unavailable(describe(&err))))
                    .boxed_local();
            }
        };
        let returned = match self
            .call
            .call2(&JsValue::NULL, &JsValue::from_str(method), &args)
        {
            Ok(returned) => returned,
            Err(err) => {
                return futures::future::ready(Err(TransportError::Remote {
                    method: method.to_string(),
                    message: describe(&err),
                }))
                .boxed_local();
            }
        };

        let promise = Promise::resolve(&returned);
        let method = method.to_string();
        async move {
            let value = JsFuture::from(promise)
                .await
                .map_err(|err| TransportError::Remote {
                    method: method.clone(),
                    message: describe(&err),
                })?;
            if let Some(text) = value.as_string() {
                return Ok(text);
            }
            JSON::stringify(&value)
                .ok()
                .and_then(|s| s.as_string())
                .ok_or(TransportError::InvalidResponse {
                    method,
                    detail: "result is neither a string nor JSON".to_string(),
                })
        }
        .boxed_local()
    }
}
