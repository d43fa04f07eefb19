use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use baton_core::{registry, EmptyDirectory, MemberId, RecruitmentStatus};
use tempfile::TempDir;

fn baton_bin_path() -> PathBuf {
    PathBuf::from(assert_cmd::cargo::cargo_bin!("baton"))
}

fn baton(binary: &Path, home: &Path) -> Command {
    let mut cmd = Command::new(binary);
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

struct BotProcess {
    child: Child,
    binary: PathBuf,
    home: PathBuf,
}

impl BotProcess {
    fn start(binary: PathBuf, home: PathBuf) -> Self {
        let child = baton(&binary, &home)
            .arg("run")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn bot");

        Self {
            child,
            binary,
            home,
        }
    }

    fn stop(&mut self) {
        let _ = baton(&self.binary, &self.home).arg("stop").status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for BotProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bot_running(binary: &Path, home: &Path) -> bool {
    let Ok(output) = baton(binary, home).arg("status").output() else {
        return false;
    };
    if !output.status.success() {
        return false;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&output.stdout) else {
        return false;
    };
    value
        .get("running")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

fn say(binary: &Path, home: &Path, id: &str, name: &str, message: &str) -> String {
    let output = baton(binary, home)
        .args(["say", "--id", id, "--name", name, message])
        .output()
        .expect("run say");
    assert!(
        output.status.success(),
        "say failed: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn queue_commands_round_trip_through_running_bot() {
    let home = TempDir::new().expect("home");
    let binary = baton_bin_path();

    baton(&binary, home.path())
        .args(["init", "--token", "s3cret"])
        .status()
        .expect("init");

    let mut bot = BotProcess::start(binary.clone(), home.path().to_path_buf());
    assert!(
        wait_until(Duration::from_secs(5), || bot_running(&binary, home.path())),
        "bot did not report running state in time",
    );

    assert_eq!(say(&binary, home.path(), "1", "alice", ".ready"), "alice is now ready.");
    assert_eq!(say(&binary, home.path(), "1", "alice", ".join"), "alice is now active.");
    assert_eq!(
        say(&binary, home.path(), "2", "bob", ".set_status active"),
        "alice is already actively recruiting. Ask them to leave first."
    );
    assert_eq!(
        say(&binary, home.path(), "3", "carol", ".set_status leader"),
        "LEADER is not a valid status. Valid statuses are: READY, ACTIVE."
    );
    assert_eq!(say(&binary, home.path(), "2", "bob", ".ready"), "bob is now ready.");

    // Write-through: the file reflects every reply already given.
    let path = registry::registry_path_at(home.path());
    let on_disk = registry::load_at(&path, &EmptyDirectory).expect("load");
    assert_eq!(on_disk.status_of(MemberId(1)), Some(RecruitmentStatus::Active));
    assert_eq!(on_disk.status_of(MemberId(2)), Some(RecruitmentStatus::Ready));
    assert!(!on_disk.contains(MemberId(3)));

    let display = say(&binary, home.path(), "2", "bob", ".display");
    assert!(display.contains("Current Recruiters"), "got: {display}");
    assert!(display.contains("**alice: ACTIVE**"), "got: {display}");

    assert_eq!(say(&binary, home.path(), "1", "alice", ".leave"), "alice has left the queue.");
    assert_eq!(
        say(&binary, home.path(), "2", "bob", ".join"),
        "bob is now active."
    );

    bot.stop();

    let reloaded = registry::load_at(&path, &EmptyDirectory).expect("reload");
    assert_eq!(reloaded.active_member().map(|m| m.id()), Some(MemberId(2)));
    assert_eq!(reloaded.len(), 1);
}
