// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Float(f64),
}

/// Tuning knobs handed to a congestion control algorithm, keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    inner: HashMap<String, OptionValue>,
}

impl Options {
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.inner.get(key) {
            Some(OptionValue::Bool(b)) => Some(*b),
            Some(other) => {
                warn!("get_bool(): option {} holds {:?}, ignoring it", key, other);
                None
            },
            None => None,
        }
    }

    pub fn insert_bool(&mut self, key: &str, value: bool) {
        self.inner.insert(key.to_string(), OptionValue::Bool(value));
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.inner.get(key) {
            Some(OptionValue::Float(f)) => Some(*f),
            Some(other) => {
                warn!("get_float(): option {} holds {:?}, ignoring it", key, other);
                None
            },
            None => None,
        }
    }

    pub fn insert_float(&mut self, key: &str, value: f64) {
        self.inner.insert(key.to_string(), OptionValue::Float(value));
    }
}
