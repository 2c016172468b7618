//! A full governed session against a temporary project directory.

use tiller::prelude::*;
use tiller::tools::names;

fn project() -> (tempfile::TempDir, ToolSet) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/lib.rs"),
        "pub fn greet() -> &'static str {\n    \"hello\"\n}\n",
    )
    .unwrap();
    let config = SandboxConfig::default().with_workdir(dir.path());
    let tools = ToolSet::sandbox(&config).unwrap();
    (dir, tools)
}

#[tokio::test]
async fn evidence_then_craft_session() {
    let (dir, tools) = project();
    let offered = tools.definitions();
    let mut session = Session::new("it-1");

    // Turn 1: the model asks to gather evidence first.
    session.advance_turn();
    let shift = session
        .observe_response("Let me look around first. [stance: evidence]")
        .unwrap();
    assert_eq!(shift.to, Stance::Evidence);

    let visible: Vec<String> = session
        .offered_tools(&offered)
        .resolve(&offered)
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(visible, vec![names::READ_FILE, names::LIST_DIR, names::SEARCH]);

    let found = session
        .run_tool(&tools, names::SEARCH, r#"{"pattern": "hello"}"#, Some("c1"))
        .await;
    assert!(!found.is_error);
    assert!(found.content.contains("src/lib.rs:2:"));

    let denied = session
        .run_tool(
            &tools,
            names::EDIT_FILE,
            r#"{"path": "src/lib.rs", "old_string": "hello", "new_string": "hi"}"#,
            Some("c2"),
        )
        .await;
    assert!(denied.is_error);

    // Turn 2: switch to craft and make the edit.
    session.advance_turn();
    session
        .observe_response("Found it. [stance: craft]")
        .unwrap();
    let edited = session
        .run_tool(
            &tools,
            names::EDIT_FILE,
            r#"{"path": "src/lib.rs", "old_string": "\"hello\"", "new_string": "\"hi\""}"#,
            Some("c3"),
        )
        .await;
    assert!(!edited.is_error, "{}", edited.content);
    assert!(
        std::fs::read_to_string(dir.path().join("src/lib.rs"))
            .unwrap()
            .contains("\"hi\"")
    );

    let check = session
        .run_tool(&tools, names::SHELL, r#"{"command": "grep -c hi src/lib.rs"}"#, None)
        .await;
    assert_eq!(check.content.trim(), "1");

    // Bookkeeping the loop feeds back to the model.
    assert_eq!(session.state.stance_history.len(), 2);
    assert_eq!(session.tracker.len(), 3);
    assert_eq!(session.tracker.files_written(), ["src/lib.rs"]);
    let preamble = session.context_preamble();
    assert!(preamble.starts_with("Current stance: craft"));
    assert!(preamble.contains("3 actions taken"));
}

#[tokio::test]
async fn write_then_read_round_trip() {
    let (_dir, tools) = project();
    let mut session = Session::with_stance("it-2", Stance::Craft);

    let written = session
        .run_tool(
            &tools,
            names::WRITE_FILE,
            r#"{"path": "docs/notes.md", "content": "plan: ship it"}"#,
            None,
        )
        .await;
    assert_eq!(written.content, "Wrote 13 bytes to docs/notes.md");

    let read = session
        .run_tool(&tools, names::READ_FILE, r#"{"path": "docs/notes.md"}"#, None)
        .await;
    assert_eq!(read.content, "plan: ship it");

    let listing = session
        .run_tool(&tools, names::LIST_DIR, "{}", None)
        .await;
    assert_eq!(listing.content, "docs/\nsrc/");
}

#[tokio::test]
async fn escape_attempts_are_refused() {
    let (_dir, tools) = project();
    for (name, args) in [
        (names::READ_FILE, r#"{"path": "../../etc/passwd"}"#),
        (names::WRITE_FILE, r#"{"path": "../outside.txt", "content": "x"}"#),
        (names::LIST_DIR, r#"{"path": "/"}"#),
        (names::SEARCH, r#"{"pattern": "root", "path": "../.."}"#),
    ] {
        let result = tools.execute_tool_call(name, args, None).await;
        assert!(result.is_error, "{name} should be refused");
        assert!(result.content.contains("access denied"), "{}", result.content);
    }
}

#[tokio::test]
async fn plan_stance_offers_nothing_and_spends_budget() {
    let (_dir, tools) = project();
    let offered = tools.definitions();
    let mut session = Session::new("it-3");
    session.observe_response("[stance: plan]").unwrap();

    assert_eq!(
        session.offered_tools(&offered),
        ToolSelection::Exactly(vec![])
    );
    let result = session
        .run_tool(&tools, names::LIST_DIR, "{}", None)
        .await;
    assert!(result.is_error);

    session.advance_turn();
    assert!(session.turn_budget_exhausted());
}

#[tokio::test]
async fn oscillating_stances_raise_thrashing() {
    let mut session = Session::new("it-4");
    session.advance_turn();
    let replies = [
        "[stance: craft]",
        "[stance: evidence]",
        "[stance: craft]",
        "[stance: evidence]",
    ];
    let outcomes: Vec<ShiftOutcome> = replies
        .iter()
        .filter_map(|r| session.observe_response(r))
        .collect();
    assert_eq!(outcomes.len(), 4);
    assert!(!outcomes[2].is_thrashing());
    assert!(outcomes[3].is_thrashing());
    assert_eq!(session.stance(), Stance::Evidence);
}
