use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskbot-{nanos}-{file_name}"))
}

fn chat_command(store_path: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_taskbot"));
    command
        .env("TASKBOT_CONFIG_PATH", temp_path("missing-config.json"))
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("LLM_PROVIDER")
        .arg("--store-file")
        .arg(store_path)
        .args(["chat", "--user", "alice", "--token", "token-alice"]);
    command
}

fn run_chat(store_path: &Path, input: &str) -> Output {
    let mut child = chat_command(store_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn chat session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write to stdin");
    }

    child.wait_with_output().expect("failed to read chat output")
}

#[test]
fn chat_creates_a_task_over_several_turns() {
    let store_path = temp_path("chat-create.json");

    let output = run_chat(
        &store_path,
        "create a task\nBuy milk\nnone\nmedium\nshow my tasks\nexit\n",
    );

    let content = std::fs::read_to_string(&store_path).unwrap_or_default();
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("What should the title be?"));
    assert!(stdout.contains("Choose one of: low, medium, high."));
    assert!(stdout.contains("✅ Task created successfully!"));
    assert!(stdout.contains("📊 Task Summary: 1 pending, 0 completed"));

    let stored: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(stored["tasks"][0]["title"], "Buy milk");
    assert_eq!(stored["tasks"][0]["description"], serde_json::Value::Null);
    assert_eq!(stored["tasks"][0]["priority"], "medium");
}

#[test]
fn chat_cancel_writes_nothing() {
    let store_path = temp_path("chat-cancel.json");

    let output = run_chat(&store_path, "create a task\ncancel\nquit\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("task creation cancelled"));
    assert!(!store_path.exists());
}

#[test]
fn chat_help_is_local() {
    let store_path = temp_path("chat-help.json");

    let output = run_chat(&store_path, "help\n?\nexit\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("mark task #3 as done").count(), 2);
}

#[test]
fn one_shot_message_without_generator_uses_fallback() {
    let store_path = temp_path("chat-once.json");

    let output = chat_command(&store_path)
        .args(["-m", "what is the weather like?", "--json"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["intent"], "unknown");
    assert!(
        reply["text"]
            .as_str()
            .unwrap()
            .starts_with("I can help you manage your tasks.")
    );
}

#[test]
fn guided_mode_sends_users_to_the_form() {
    let store_path = temp_path("chat-guided.json");

    let output = chat_command(&store_path)
        .args(["-m", "add a new task", "--json"])
        .arg("--config-override")
        .arg("create_task_mode=guided")
        .output()
        .expect("run");

    assert!(output.status.success());
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["action"], serde_json::json!({ "type": "open_create_form" }));
}
