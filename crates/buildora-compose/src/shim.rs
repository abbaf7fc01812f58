//! Diagnostic shim injected into every composed document
//!
//! The shim wraps `console.log/info/warn/error`, `window.onerror` and
//! `unhandledrejection`, stringifies structured arguments, and forwards each
//! event as `{kind:"diagnostic", level, message}` through the relay transport.
//! The original console methods still run afterwards.

use regex::Regex;
use std::sync::OnceLock;

/// Attribute carried by the injected `<script>` tag
pub const SHIM_MARKER: &str = "data-buildora-relay";

/// How envelopes leave the sandboxed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelayTransport {
    /// `window.parent.postMessage(envelope, '*')`, for iframe hosts
    #[default]
    PostMessage,
    /// Ordered `POST` of the JSON envelope to an HTTP endpoint
    Http { endpoint: String },
}

impl RelayTransport {
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
        }
    }

    fn send_function(&self) -> String {
        match self {
            Self::PostMessage => {
                "function deliver(env) { window.parent.postMessage(env, '*'); }".to_string()
            }
            Self::Http { endpoint } => {
                let endpoint =
                    serde_json::to_string(endpoint).unwrap_or_else(|_| "\"/\"".to_string());
                format!(
                    "var queue = Promise.resolve();\n        \
                     function deliver(env) {{\n          \
                     queue = queue.then(function() {{\n            \
                     return fetch({endpoint}, {{ method: 'POST', keepalive: true, headers: {{ 'Content-Type': 'application/json' }}, body: JSON.stringify(env) }});\n          \
                     }}).catch(function() {{}});\n        \
                     }}"
                )
            }
        }
    }
}

/// The `<script>` element for a transport
pub fn script(transport: &RelayTransport) -> String {
    format!(
        r#"<script {marker}>
      (function() {{
        {deliver}
        function stringify(args) {{
          return Array.prototype.map.call(args, function(a) {{
            if (a !== null && typeof a === 'object') {{
              try {{ return JSON.stringify(a); }} catch (e) {{ return String(a); }}
            }}
            return String(a);
          }}).join(' ');
        }}
        function send(level, args) {{
          try {{ deliver({{ kind: 'diagnostic', level: level, message: stringify(args) }}); }} catch (e) {{}}
        }}
        ['log', 'info', 'warn', 'error'].forEach(function(level) {{
          var original = console[level];
          console[level] = function() {{
            send(level, arguments);
            if (original) {{ original.apply(console, arguments); }}
          }};
        }});
        window.onerror = function(msg, url, line) {{
          send('error', [msg + ' (Line: ' + line + ')']);
        }};
        window.addEventListener('unhandledrejection', function(event) {{
          send('error', ['Unhandled rejection: ' + event.reason]);
        }});
      }})();
    </script>"#,
        marker = SHIM_MARKER,
        deliver = transport.send_function(),
    )
}

fn head_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head\b[^>]*>").expect("valid head pattern"))
}

/// Insert the shim right after the first `<head>` tag, or at the very start
pub fn inject(document: &str, transport: &RelayTransport) -> String {
    let shim = script(transport);
    match head_open().find(document) {
        Some(m) => {
            let mut out = String::with_capacity(document.len() + shim.len());
            out.push_str(&document[..m.end()]);
            out.push_str(&shim);
            out.push_str(&document[m.end()..]);
            out
        }
        None => format!("{}{}", shim, document),
    }
}
