//! Endpoint resolution for web vs. packaged-app runtimes.
//!
//! Web builds call the API same-origin; native builds run inside an app
//! WebView whose origin is not a reachable host, so they must call the
//! remote functions URL directly. The decision is isolated behind one
//! pure function over an explicit [`Environment`] value, never ambient
//! runtime globals.

/// Runtime environment descriptor, as observed by the host shell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
    /// URL scheme of the runtime origin (e.g. `https`, `capacitor`).
    pub scheme: String,
    /// Hostname of the runtime origin.
    pub host: String,
    /// Port of the runtime origin, when one is bound.
    pub port: Option<u16>,
    /// Explicit base-URL override; wins over all detection.
    pub override_url: Option<String>,
}

impl Environment {
    /// Describes an origin by scheme and host.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port: None,
            override_url: None,
        }
    }

    /// Sets the bound port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets an explicit override.
    pub fn with_override(mut self, url: impl Into<String>) -> Self {
        self.override_url = Some(url.into());
        self
    }
}

/// Resolves the base URL for API calls.
///
/// Returns the empty string for same-origin (web) contexts and
/// `functions_url` for native-app contexts. Total and pure: every input
/// yields exactly one of the two forms, and no branch panics.
///
/// Native detection: a packaged-app scheme (anything other than `http`
/// or `https`), or a loopback host with no bound port (an in-app
/// WebView; a dev server on loopback always binds a port).
pub fn resolve_base_url(env: &Environment, functions_url: &str) -> String {
    if let Some(override_url) = &env.override_url {
        if !override_url.is_empty() {
            return override_url.clone();
        }
    }

    let scheme = env.scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return functions_url.to_string();
    }

    if is_loopback(&env.host) && env.port.is_none() {
        return functions_url.to_string();
    }

    String::new()
}

fn is_loopback(host: &str) -> bool {
    matches!(
        host.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "::1" | "[::1]"
    )
}
