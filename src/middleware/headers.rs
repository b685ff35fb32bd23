//! Uniform header access over the request types that carry headers
//!
//! `QueryData` and `CheckHealth` requests keep one value per header,
//! `CallResource` requests keep a list. Header names are matched
//! case-insensitively.

use std::collections::HashMap;

use crate::plugin::context::PluginContext;
use crate::plugin::models::{CallResourceRequest, CheckHealthRequest, QueryDataRequest};

/// Requests whose outgoing headers middleware may rewrite
pub trait ForwardHeaders {
    fn plugin_context(&self) -> &PluginContext;

    /// Value of `name`; multiple values are joined with `; `
    fn header(&self, name: &str) -> Option<String>;

    /// Replace every value of `name` with `value`
    fn set_header(&mut self, name: &str, value: String);

    fn remove_header(&mut self, name: &str);
}

fn remove_ci<V>(headers: &mut HashMap<String, V>, name: &str) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
}

fn find_ci<'a, V>(headers: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

macro_rules! impl_single_value_headers {
    ($request:ty) => {
        impl ForwardHeaders for $request {
            fn plugin_context(&self) -> &PluginContext {
                &self.plugin_context
            }

            fn header(&self, name: &str) -> Option<String> {
                find_ci(&self.headers, name).cloned()
            }

            fn set_header(&mut self, name: &str, value: String) {
                remove_ci(&mut self.headers, name);
                self.headers.insert(name.to_string(), value);
            }

            fn remove_header(&mut self, name: &str) {
                remove_ci(&mut self.headers, name);
            }
        }
    };
}

impl_single_value_headers!(QueryDataRequest);
impl_single_value_headers!(CheckHealthRequest);

impl ForwardHeaders for CallResourceRequest {
    fn plugin_context(&self) -> &PluginContext {
        &self.plugin_context
    }

    fn header(&self, name: &str) -> Option<String> {
        find_ci(&self.headers, name)
            .filter(|values| !values.is_empty())
            .map(|values| values.join("; "))
    }

    fn set_header(&mut self, name: &str, value: String) {
        remove_ci(&mut self.headers, name);
        self.headers.insert(name.to_string(), vec![value]);
    }

    fn remove_header(&mut self, name: &str) {
        remove_ci(&mut self.headers, name);
    }
}
