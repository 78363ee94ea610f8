//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! LOG_LEVEL accepts either full EnvFilter directives ("info,gamification=trace") or a
//! bare level ("debug"). A bare level applies to this service's targets only; HTTP and
//! client libraries stay at `info`. LOG_FORMAT selects "pretty" (default) or "json".
//!
//! Targets:
//! - `study_tutor`  : tutor flow, LLM calls, cache, calendar, startup
//! - `gamification` : points, levels, achievements, streaks

use tracing_subscriber::EnvFilter;

const SERVICE_TARGETS: [&str; 2] = ["study_tutor", "gamification"];
const DEFAULT_SERVICE_LEVEL: &str = "debug";
const LIBRARY_LEVEL: &str = "info";

/// Directive string for the given LOG_LEVEL value.
fn directives(log_level: Option<&str>) -> String {
  let raw = log_level.map(str::trim).unwrap_or("");
  if raw.contains('=') || raw.contains(',') {
    return raw.to_string();
  }
  let service = if raw.is_empty() { DEFAULT_SERVICE_LEVEL } else { raw };
  let mut out = vec![LIBRARY_LEVEL.to_string()];
  out.extend(SERVICE_TARGETS.iter().map(|t| format!("{}={}", t, service)));
  out.join(",")
}

pub fn init_tracing() {
  let raw = std::env::var("LOG_LEVEL").ok();
  let filter = EnvFilter::try_new(directives(raw.as_deref())).unwrap_or_else(|e| {
    eprintln!("invalid LOG_LEVEL ({}); using defaults", e);
    EnvFilter::new(directives(None))
  });

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  match std::env::var("LOG_FORMAT").as_deref() {
    Ok("json") => builder.json().init(),
    _ => builder.init(),
  }
}
