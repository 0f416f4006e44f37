//! Seeded generator of randomized boundary calls

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use crate::fixtures::{INVALID_PAYLOADS, INVALID_TEMPLATES, VALID_TEMPLATES};

/// Characters that exercise every escaping context
const TRICKY: &[&str] = &["<", ">", "&", "\"", "'", "+", "=", " ", "`", "/", "é", "\u{2028}"];

/// One render call's inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCall {
    pub template: String,
    pub payload: String,
    pub escape_html: bool,
    pub missing_key_zero: bool,
}

/// Produces a reproducible mix of succeeding and failing calls across all
/// four option combinations
#[derive(Debug)]
pub struct CallGenerator {
    rng: StdRng,
}

impl CallGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_call(&mut self) -> GeneratedCall {
        let template = if self.rng.random_bool(0.2) {
            self.pick(INVALID_TEMPLATES)
        } else {
            self.pick(VALID_TEMPLATES)
        };
        let payload = if self.rng.random_bool(0.15) {
            self.pick(INVALID_PAYLOADS).to_string()
        } else {
            self.payload().to_string()
        };
        GeneratedCall {
            template: template.to_string(),
            payload,
            escape_html: self.rng.random_bool(0.5),
            missing_key_zero: self.rng.random_bool(0.5),
        }
    }

    pub fn batch(&mut self, count: usize) -> Vec<GeneratedCall> {
        (0..count).map(|_| self.next_call()).collect()
    }

    fn pick(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.random_range(0..choices.len())]
    }

    fn text(&mut self) -> String {
        let len = self.rng.random_range(0..12);
        (0..len)
            .map(|_| {
                if self.rng.random_bool(0.3) {
                    self.pick(TRICKY).to_string()
                } else {
                    char::from(self.rng.random_range(b'a'..=b'z')).to_string()
                }
            })
            .collect()
    }

    fn payload(&mut self) -> Value {
        let items: Vec<Value> = (0..self.rng.random_range(1..5))
            .map(|_| Value::String(self.text()))
            .collect();
        let mut payload = json!({
            "name": self.text(),
            "title": self.text(),
            "items": items,
            "flag": self.rng.random_bool(0.5),
            "count": self.rng.random_range(-1000i64..1000),
        });
        if self.rng.random_bool(0.7) {
            payload["user"] = json!({ "name": self.text() });
        }
        payload
    }
}
