//! Hand-rolled tagged JSON replies.
//!
//! The reply set is closed and fixed (five shapes), so this builds the JSON
//! by hand rather than pulling in `serde_json` for a handful of format
//! strings.

/// One audio source descriptor as reported by `GET_SOURCES`.
pub struct SourceEntry {
    pub name: String,
    pub desc: String,
}

/// A control-plane reply. `to_json` is the only way out; there is no
/// deserialization path because the daemon never needs to parse its own
/// replies back.
pub enum Response {
    Sources(Vec<SourceEntry>),
    SourceChanged(String),
    SourceError(String),
    FpsChanged(u32),
    FreqMaxChanged(u32),
    BarCountChanged(usize),
}

/// Escape `"` only; names and descriptions are trusted OS strings and no
/// other escaping is performed, per spec.
fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

impl Response {
    pub fn to_json(&self) -> String {
        match self {
            Response::Sources(entries) => {
                let items: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{{\"name\":\"{}\",\"desc\":\"{}\"}}", escape(&e.name), escape(&e.desc)))
                    .collect();
                format!("{{\"sources\":[{}]}}", items.join(","))
            }
            Response::SourceChanged(name) => {
                format!("{{\"sourceChanged\":\"{}\"}}", escape(name))
            }
            Response::SourceError(message) => {
                format!("{{\"sourceError\":\"{}\"}}", escape(message))
            }
            Response::FpsChanged(n) => format!("{{\"fpsChanged\":{n}}}"),
            Response::FreqMaxChanged(hz) => format!("{{\"freqMaxChanged\":{hz}}}"),
            Response::BarCountChanged(k) => format!("{{\"barCountChanged\":{k}}}"),
        }
    }
}
