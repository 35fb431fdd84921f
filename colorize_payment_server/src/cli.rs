use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

// Be explicit about which envars to print, so as to avoid accidentally exposing secrets
const DISPLAY_ENVS: [&str; 20] = [
    "RUST_LOG",
    "CPG_HOST",
    "CPG_PORT",
    "CPG_DATABASE_URL",
    "CPG_USE_X_FORWARDED_FOR",
    "CPG_USE_FORWARDED",
    "CPG_GATEWAY_URL",
    "CPG_GATEWAY_CLIENT_ID",
    "CPG_GATEWAY_API_VERSION",
    "CPG_GATEWAY_TIMEOUT_MS",
    "CPG_GATEWAY_RETURN_URL",
    "CPG_ANALYTICS_URL",
    "CPG_ASSET_TIMEOUT_MS",
    "CPG_RECONCILE_INTERVAL_SECS",
    "CPG_RECONCILE_GRACE_SECS",
    "CPG_RECONCILE_BATCH_SIZE",
    "CPG_RECONCILE_BUDGET_SECS",
    "CPG_DISABLE_RECONCILE_WORKER",
    "CPG_STATUS_CACHE_TTL_SECS",
    "CPG_POLL_MAX_ATTEMPTS",
];

fn display_envs() {
    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
