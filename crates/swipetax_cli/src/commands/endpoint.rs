//! Resolve-endpoint command: debug environment detection.

use swipetax_sync::{resolve_base_url, Environment};

/// Prints the base URL the given environment resolves to.
pub fn run(
    scheme: &str,
    host: &str,
    port: Option<u16>,
    override_url: Option<String>,
    functions_url: &str,
) {
    let mut env = Environment::new(scheme, host);
    if let Some(port) = port {
        env = env.with_port(port);
    }
    if let Some(url) = override_url {
        env = env.with_override(url);
    }

    let base = resolve_base_url(&env, functions_url);
    if base.is_empty() {
        println!("(same-origin)");
    } else {
        println!("{base}");
    }
}
