use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the binary on `file` inside `dir`, feeding `lines` on stdin.
fn run_session(dir: &Path, file: &str, lines: &[&str]) -> (bool, String) {
    // `cargo test` sets this for integration tests.
    let bin = env!("CARGO_BIN_EXE_astound");

    let mut child = Command::new(bin)
        .arg(file)
        .arg("--name")
        .arg("smoke")
        .current_dir(dir)
        .env_remove("ANTHROPIC_API_KEY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn astound");

    {
        let stdin = child.stdin.as_mut().expect("child stdin");
        for line in lines {
            writeln!(stdin, "{line}").unwrap();
        }
    }

    let out = child.wait_with_output().expect("wait for astound");
    (out.status.success(), String::from_utf8_lossy(&out.stdout).into_owned())
}

#[test]
fn repl_smoke() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("two.py"), "x = 1\nprint(x)\n").unwrap();
    std::fs::write(dir.path().join("util.py"), "def helper():\n    pass\n").unwrap();

    // One malformed line and one navigation error; neither may end the session.
    let (ok, stdout) = run_session(
        dir.path(),
        "two.py",
        &["A 2,0", "P node", "U", "U", "X", "A util.py", "C", "P tree", "S", "Q"],
    );
    assert!(ok);

    assert!(stdout.contains("Cursor 'smoke' at depth 0"), "{stdout}");
    assert!(stdout.contains("Cursor 'smoke' at depth 1"), "{stdout}");
    assert!(stdout.contains("2 | print(x)"), "{stdout}");
    assert!(stdout.contains("already at the root node"), "{stdout}");
    assert!(stdout.contains("invalid command: X"), "{stdout}");
    assert!(stdout.contains("Current node: Module 'util.py'"), "{stdout}");
    assert!(stdout.contains("FunctionDef 'helper' at key '1,0'"), "{stdout}");
    assert!(stdout.contains("  2,0: Call 'print'"), "{stdout}");
    assert!(stdout.contains("  util.py: Module 'util.py' *"), "{stdout}");
    assert!(stdout.contains("no text generation service configured"), "{stdout}");
}

#[test]
fn unmapped_syntax_still_reaches_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("matcher.py"),
        "x = 1\nmatch x:\n    case 1:\n        pass\n",
    )
    .unwrap();

    let (ok, stdout) = run_session(dir.path(), "matcher.py", &["P 1,1", "Q"]);
    assert!(ok);
    assert!(stdout.contains("cannot discover child fields"), "{stdout}");
    assert!(stdout.contains("A/L/D/U/C/P/S/M/Q> "), "{stdout}");
    assert!(stdout.contains("1 | x = 1"), "{stdout}");
}
