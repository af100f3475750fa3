// recursive descent flattening
use std::collections::HashMap;

use chrono::SecondsFormat;

use crate::core::value::Value;

impl Value {
    /// Flatten into a map from dotted path to leaf text.
    ///
    /// Walks the tree once, in field/index order:
    /// 1) absent optional  -> nothing; present optional unwraps in place
    /// 2) instant          -> atomic RFC 3339 leaf, zero instant dropped
    /// 3) record           -> recurse per field, path extended by field name
    /// 4) sequence         -> recurse per element, path extended by index
    /// 5) text             -> verbatim leaf, empty string dropped
    /// 6) number/bool      -> leaf in canonical text form, always emitted
    ///
    /// A root-level leaf is keyed by its kind name (`int`, `string`, `time`,
    /// ...), a root-level sequence by `seq.<index>`; record fields at the
    /// root use the bare field name. Empty values per [`Value::is_empty`]
    /// produce no entry at all.
    pub fn flatten(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut HashMap<String, String>) {
        match self {
            Value::Optional(None) => {}
            // unwrapping adds no path segment
            Value::Optional(Some(inner)) => inner.flatten_into(prefix, out),
            Value::Instant(t) => {
                if !self.is_empty() {
                    out.insert(
                        self.leaf_path(prefix),
                        t.to_rfc3339_opts(SecondsFormat::Secs, true),
                    );
                }
            }
            Value::Record(fields) => {
                for (name, field) in fields {
                    field.flatten_into(&join_path(prefix, name), out);
                }
            }
            Value::Seq(items) => {
                // an empty sequence yields nothing, not even a container key
                let base = if prefix.is_empty() { self.kind().name() } else { prefix };
                for (i, item) in items.iter().enumerate() {
                    item.flatten_into(&join_path(base, &i.to_string()), out);
                }
            }
            Value::Text(s) => {
                if !s.is_empty() {
                    out.insert(self.leaf_path(prefix), s.clone());
                }
            }
            Value::Bool(b) => {
                out.insert(self.leaf_path(prefix), b.to_string());
            }
            Value::Int(n) => {
                out.insert(self.leaf_path(prefix), n.to_string());
            }
            Value::Uint(n) => {
                out.insert(self.leaf_path(prefix), n.to_string());
            }
            Value::Float(n) => {
                out.insert(self.leaf_path(prefix), n.to_string());
            }
        }
    }

    // a leaf at the root has no enclosing field/index, so its kind names it
    fn leaf_path(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.kind().name().to_owned()
        } else {
            prefix.to_owned()
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        format!("{prefix}.{segment}")
    }
}
