use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("choreboard-{nanos}-{file_name}"))
}

fn run_interactive(input: &str) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_chores");
    let store_path = temp_path("cli-interactive-store.json");
    let users_path = temp_path("cli-interactive-users.json");
    let config_path = temp_path("cli-interactive-config.json");
    std::fs::write(
        &users_path,
        r#"{"users":["alice","bob"],"groups":{"household":["alice","bob"]}}"#,
    )
    .unwrap();

    let mut child = Command::new(exe)
        .env("CHOREBOARD_STORE_PATH", &store_path)
        .env("CHOREBOARD_USERS_PATH", &users_path)
        .env("CHOREBOARD_CONFIG_PATH", &config_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn interactive session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write to stdin");
    }

    let output = child
        .wait_with_output()
        .expect("failed to read interactive output");

    std::fs::remove_file(&store_path).ok();
    std::fs::remove_file(&users_path).ok();
    std::fs::remove_file(&config_path).ok();
    output
}

#[test]
fn interactive_help_shows_usage() {
    let output = run_interactive("help\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage") || stdout.contains("USAGE"));
}

#[test]
fn interactive_invalid_command_prints_error() {
    let output = run_interactive("nope\nexit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: validation"));
}

#[test]
fn interactive_create_command_succeeds() {
    let output =
        run_interactive("create \"demo chore\" --points 5 --as alice\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Created task:"));
}

#[test]
fn interactive_unterminated_quote_prints_error() {
    let output = run_interactive("create \"demo --points 5\nexit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unterminated quote"));
}
