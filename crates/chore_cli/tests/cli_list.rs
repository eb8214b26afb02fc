use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("choreboard-{nanos}-{file_name}"))
}

struct TestEnv {
    store: PathBuf,
    users: PathBuf,
    config: PathBuf,
}

fn setup(prefix: &str) -> TestEnv {
    let env = TestEnv {
        store: temp_path(&format!("{prefix}-store.json")),
        users: temp_path(&format!("{prefix}-users.json")),
        config: temp_path(&format!("{prefix}-config.json")),
    };
    std::fs::write(
        &env.users,
        r#"{"users":["alice","bob","carol"],"groups":{"household":["alice","bob","carol"]}}"#,
    )
    .unwrap();
    env
}

fn cleanup(env: &TestEnv) {
    std::fs::remove_file(&env.store).ok();
    std::fs::remove_file(&env.users).ok();
    std::fs::remove_file(&env.config).ok();
}

fn run(env: &TestEnv, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chores"))
        .args(args)
        .env("CHOREBOARD_STORE_PATH", &env.store)
        .env("CHOREBOARD_USERS_PATH", &env.users)
        .env("CHOREBOARD_CONFIG_PATH", &env.config)
        .output()
        .expect("failed to run chores command")
}

fn create_task(env: &TestEnv, title: &str) -> String {
    let output = run(
        env,
        &["--json", "create", title, "--points", "10", "--as", "alice"],
    );
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("json output");
    parsed["id"].as_str().expect("task id").to_string()
}

fn list_json(env: &TestEnv, which: &str) -> Vec<serde_json::Value> {
    let output = run(env, &["--json", "list", which]);
    assert!(output.status.success());
    serde_json::from_str::<serde_json::Value>(&String::from_utf8_lossy(&output.stdout))
        .expect("json output")
        .as_array()
        .expect("task array")
        .clone()
}

#[test]
fn list_splits_open_review_and_done() {
    let env = setup("cli-list");

    let open_id = create_task(&env, "open chore");
    let review_id = create_task(&env, "review chore");
    let done_id = create_task(&env, "done chore");

    for id in [&review_id, &done_id] {
        assert!(run(&env, &["claim", id, "--as", "bob"]).status.success());
        assert!(run(&env, &["start", id, "--as", "bob"]).status.success());
        assert!(run(&env, &["done", id, "--as", "bob"]).status.success());
    }
    assert!(run(&env, &["approve", &done_id, "--as", "alice"]).status.success());

    let open = list_json(&env, "open");
    let review = list_json(&env, "review");
    let done = list_json(&env, "done");
    let all = list_json(&env, "all");
    cleanup(&env);

    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["id"], open_id.as_str());
    assert_eq!(review.len(), 1);
    assert_eq!(review[0]["id"], review_id.as_str());
    assert_eq!(done.len(), 1);
    assert_eq!(done[0]["id"], done_id.as_str());
    assert_eq!(all.len(), 3);
}

#[test]
fn rejected_tasks_show_up_as_open() {
    let env = setup("cli-list-rejected");
    let task_id = create_task(&env, "greasy pans");

    assert!(run(&env, &["claim", &task_id, "--as", "bob"]).status.success());
    assert!(run(&env, &["start", &task_id, "--as", "bob"]).status.success());
    assert!(run(&env, &["done", &task_id, "--as", "bob"]).status.success());
    assert!(run(&env, &["reject", &task_id, "--as", "alice"]).status.success());

    let open = list_json(&env, "open");
    let review = list_json(&env, "review");
    cleanup(&env);

    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["status"], "rejected");
    assert!(review.is_empty());
}

#[test]
fn show_prints_one_task() {
    let env = setup("cli-show");
    let task_id = create_task(&env, "show me");

    let output = run(&env, &["show", &task_id]);
    cleanup(&env);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&task_id));
    assert!(stdout.contains("show me"));
    assert!(stdout.contains("pending"));
}

#[test]
fn show_reports_missing_task() {
    let env = setup("cli-show-missing");

    let output = run(&env, &["show", "task-404"]);
    cleanup(&env);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: not_found"));
}
