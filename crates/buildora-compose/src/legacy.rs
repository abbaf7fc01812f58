//! Static simulation of the legacy server-templating dialect
//!
//! Nothing is executed. Directives are resolved or stripped in three passes:
//! literal echoes become their operand, variable echoes become a visible
//! placeholder, and every remaining directive block is removed.

use regex::Regex;
use std::sync::OnceLock;

/// Prepended to simulated output so nobody mistakes it for a live server
pub const SIMULATION_BANNER: &str = r#"<div style="background:#fff3cd;color:#856404;padding:8px;font-size:12px;text-align:center;font-family:sans-serif;border-bottom:1px solid #ffeeba;">Buildora Local PHP Server (Simulated) &bull; Static Output Only</div>
"#;

fn literal_echo() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<\?php\s+echo\s+["'](.*?)["'];\s*\?>"#).expect("valid literal echo pattern")
    })
}

fn variable_echo() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<\?php\s+echo\s+\$(.*?);\s*\?>"#).expect("valid variable echo pattern")
    })
}

fn any_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<\?php.*?\?>"#).expect("valid directive pattern"))
}

/// Resolve or strip every directive in `source`
pub fn simulate(source: &str) -> String {
    let resolved = literal_echo().replace_all(source, "$1");
    let resolved = variable_echo().replace_all(&resolved, "{{Variable: $1}}");
    any_directive().replace_all(&resolved, "").into_owned()
}
