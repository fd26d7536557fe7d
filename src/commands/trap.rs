//! `phish-trap`: merge phishing reply addresses into the virtual trap map and
//! regenerate the header checks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};

use crate::cleared::ClearedList;
use crate::cli::TrapInput;
use crate::cmd_abstraction::{CommandExecutor, RealCommandExecutor};
use crate::config::Config;
use crate::fetcher::{Fetcher, Source};
use crate::filter::{single_address, ValidityPolicy};
use crate::fs_abstraction::{real_fs, FileSystem};
use crate::lock::LockGuard;
use crate::merger::{merge, read_address_list};
use crate::publisher::Publisher;
use crate::writer::{header_rule, render, trap_line, BackupPolicy, LookupWriter};

/// Process exit status of `phish-trap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Lists updated, or nothing to change
    Success = 0,
    /// Bad arguments, missing input file or unreadable feed
    Usage = 1,
    /// The virtual map could not be replaced
    WriteFailed = 2,
    /// The virtual map was replaced but the header checks were not
    HeaderRegexFailed = 3,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Run the trap update
pub async fn run(config: &Config, input: &TrapInput, output: Option<&Path>) -> ExitStatus {
    run_with(config, input, output, real_fs(), &RealCommandExecutor::new()).await
}

/// Run the trap update with an injected filesystem and executor
pub async fn run_with<F, E>(
    config: &Config,
    input: &TrapInput,
    output: Option<&Path>,
    fs: &F,
    executor: &E,
) -> ExitStatus
where
    F: FileSystem + ?Sized,
    E: CommandExecutor + ?Sized,
{
    // An empty -o falls back to the configured map
    let virtual_map: PathBuf = output
        .filter(|path| !path.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.trap.virtual_map.clone());

    let lock = match LockGuard::acquire(&config.lock_file) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            return ExitStatus::WriteFailed;
        }
    };
    debug!("Holding {}", lock.path().display());

    let existing = match read_address_list(fs, &virtual_map) {
        Ok(existing) => existing,
        Err(e) => {
            error!("{}", e);
            return ExitStatus::WriteFailed;
        }
    };

    let fetcher = match Fetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            println!("{}", e);
            return ExitStatus::Usage;
        }
    };

    let mut incoming = match input {
        TrapInput::Feed(location) => match read_feed(&fetcher, location).await {
            Ok(lines) => ValidityPolicy::new().apply(&lines),
            Err(status) => return status,
        },
        TrapInput::Address(address) => single_address(address),
    };
    // An empty key would become a header rule matching every message
    incoming.retain(|address| {
        if address.is_empty() {
            debug!("Ignoring empty address");
        }
        !address.is_empty()
    });

    let cleared = match ClearedList::load(&fetcher, config.cleared_source.as_deref()).await {
        Ok(cleared) => cleared,
        Err(e) => {
            println!("Couldn't load cleared addresses: {}", e);
            return ExitStatus::Usage;
        }
    };

    let outcome = merge(&existing, &incoming, &cleared);
    if outcome.is_unchanged() {
        debug!("No changes to the address list. Exiting now.");
        return ExitStatus::Success;
    }
    info!(
        "Adding {} and dropping {} cleared addresses in {} ({} listed before)",
        outcome.added,
        outcome.removed,
        virtual_map.display(),
        outcome.previous
    );

    let writer = LookupWriter::new(fs);
    let reply_trap = &config.trap.reply_trap_address;
    let trap_map = render(&outcome.addresses, |address| trap_line(address, reply_trap));
    if let Err(e) = writer.replace(&virtual_map, BackupPolicy::PREV, &trap_map) {
        error!("{}", e);
        println!("Error! Can't open {} for writing.", virtual_map.display());
        return ExitStatus::WriteFailed;
    }

    let report = Publisher::new(&config.postmap)
        .with_map_type(config.trap_map_type())
        .publish_with_executor(executor, &virtual_map);
    if report.success {
        println!("Updated {}", virtual_map.display());
    } else {
        println!("{}", report.output);
    }

    // Regenerated from the full list, never merged
    debug!("Building header_check file");
    let quarantine = &config.trap.quarantine_address;
    let escape = config.trap.escape_header_patterns;
    let rules = render(&outcome.addresses, |address| {
        header_rule(address, quarantine, escape)
    });

    debug!("Writing phisher header_check file");
    let header_regex = &config.trap.header_regex;
    match writer.write(header_regex, &rules) {
        Ok(()) => {
            println!("Updated {}", header_regex.display());
            ExitStatus::Success
        }
        Err(e) => {
            println!("Couldn't write regex!");
            println!("{}", e);
            println!("Failed to update {}", header_regex.display());
            ExitStatus::HeaderRegexFailed
        }
    }
}

async fn read_feed(fetcher: &Fetcher, location: &str) -> Result<Vec<String>, ExitStatus> {
    let source = Source::parse(location);
    if !source.is_available() {
        println!("Couldn't find input file {}", location);
        return Err(ExitStatus::Usage);
    }

    fetcher.fetch(&source).await.map_err(|e| {
        println!("{}", e);
        ExitStatus::Usage
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_abstraction::{CommandOutput, MockCommandExecutor};
    use crate::fs_abstraction::{MockFileSystem, RealFileSystem};
    use std::io;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut config = Config::default();
            config.lock_file = dir.path().join("phishtrap.lock");
            config.trap.virtual_map = dir.path().join("virtual_trap");
            config.trap.header_regex = dir.path().join("phish_headers.regex");
            Self { dir, config }
        }

        fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.dir.path().join(name)).unwrap()
        }

        fn write(&self, name: &str, content: &str) {
            std::fs::write(self.dir.path().join(name), content).unwrap();
        }

        fn feed(&self, content: &str) -> TrapInput {
            self.write("addresses.txt", content);
            TrapInput::Feed(self.dir.path().join("addresses.txt").display().to_string())
        }
    }

    fn postmap_ok() -> MockCommandExecutor {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, args| cmd == "/usr/sbin/postmap" && args[0].starts_with("hash:"))
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });
        mock
    }

    fn postmap_never() -> MockCommandExecutor {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute().never();
        mock
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Usage.code(), 1);
        assert_eq!(ExitStatus::WriteFailed.code(), 2);
        assert_eq!(ExitStatus::HeaderRegexFailed.code(), 3);
    }

    #[tokio::test]
    async fn test_merge_feed_into_existing_map() {
        let fx = Fixture::new();
        fx.write(
            "virtual_trap",
            "a@x.com\tphish-reply-trap@ourdomain.edu\nb@x.com\tphish-reply-trap@ourdomain.edu\n",
        );
        let input = fx.feed("# comment\nB@x.com,A,20240101\nc@x.com,B,20240102\nnot-an-address\n\n");

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);

        assert_eq!(
            fx.read("virtual_trap"),
            "a@x.com\tphish-reply-trap@ourdomain.edu\n\
             b@x.com\tphish-reply-trap@ourdomain.edu\n\
             c@x.com\tphish-reply-trap@ourdomain.edu\n"
        );
        assert_eq!(
            fx.read("virtual_trap.prev"),
            "a@x.com\tphish-reply-trap@ourdomain.edu\nb@x.com\tphish-reply-trap@ourdomain.edu\n"
        );
        assert_eq!(
            fx.read("phish_headers.regex"),
            "/(From:|Reply-To:).*a@x.com/    REDIRECT phish-quarantine@ourdomain.edu\n\
             /(From:|Reply-To:).*b@x.com/    REDIRECT phish-quarantine@ourdomain.edu\n\
             /(From:|Reply-To:).*c@x.com/    REDIRECT phish-quarantine@ourdomain.edu\n"
        );
    }

    #[tokio::test]
    async fn test_same_address_twice_writes_once() {
        let fx = Fixture::new();
        fx.write("virtual_trap", "");
        let input = TrapInput::Address("Phisher@X.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            fx.read("virtual_trap"),
            "phisher@x.com\tphish-reply-trap@ourdomain.edu\n"
        );

        std::fs::remove_file(fx.dir.path().join("phish_headers.regex")).unwrap();
        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
        assert_eq!(status, ExitStatus::Success);
        // No rewrite: the header file is not regenerated either
        assert!(!fx.dir.path().join("phish_headers.regex").exists());
    }

    #[tokio::test]
    async fn test_output_file_override() {
        let fx = Fixture::new();
        fx.write("other_map", "");
        let output = fx.dir.path().join("other_map");
        let input = TrapInput::Address("a@x.com,A,20240101".to_string());

        let status =
            run_with(&fx.config, &input, Some(&output), &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fx.read("other_map"), "a@x.com\tphish-reply-trap@ourdomain.edu\n");
        assert!(!fx.dir.path().join("virtual_trap").exists());
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let fx = Fixture::new();
        let input = TrapInput::Feed(fx.dir.path().join("absent.txt").display().to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
        assert_eq!(status, ExitStatus::Usage);
    }

    #[tokio::test]
    async fn test_missing_virtual_map_is_write_failure() {
        // The .prev backup cannot be made when there is no current map
        let fx = Fixture::new();
        let input = TrapInput::Address("a@x.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
        assert_eq!(status, ExitStatus::WriteFailed);
        assert!(!fx.dir.path().join("virtual_trap").exists());
        assert!(!fx.dir.path().join("phish_headers.regex").exists());
    }

    #[tokio::test]
    async fn test_header_regex_failure_keeps_new_map() {
        let mut fx = Fixture::new();
        fx.config.trap.header_regex = fx.dir.path().join("no/such/dir/phish_headers.regex");
        fx.write("virtual_trap", "a@x.com\tphish-reply-trap@ourdomain.edu\n");
        let input = TrapInput::Address("b@x.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::HeaderRegexFailed);
        assert_eq!(
            fx.read("virtual_trap"),
            "a@x.com\tphish-reply-trap@ourdomain.edu\nb@x.com\tphish-reply-trap@ourdomain.edu\n"
        );
    }

    #[tokio::test]
    async fn test_postmap_failure_still_writes_header_regex() {
        let fx = Fixture::new();
        fx.write("virtual_trap", "");
        let input = TrapInput::Address("a@x.com".to_string());

        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().times(1).returning(|_, _| {
            Ok(CommandOutput {
                stderr: "postmap: fatal: bad map".to_string(),
                success: false,
                code: Some(1),
                ..Default::default()
            })
        });

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &executor).await;
        assert_eq!(status, ExitStatus::Success);
        assert!(fx.dir.path().join("phish_headers.regex").exists());
    }

    #[tokio::test]
    async fn test_escaped_header_patterns() {
        let mut fx = Fixture::new();
        fx.config.trap.escape_header_patterns = true;
        fx.write("virtual_trap", "");
        let input = TrapInput::Address("a.b@x.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            fx.read("phish_headers.regex"),
            "/(From:|Reply-To:).*a\\.b@x\\.com/    REDIRECT phish-quarantine@ourdomain.edu\n"
        );
    }

    #[tokio::test]
    async fn test_unreadable_virtual_map() {
        let fx = Fixture::new();
        let mut fs = MockFileSystem::new();
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
        fs.expect_write().never();

        let input = TrapInput::Address("a@x.com".to_string());
        let status = run_with(&fx.config, &input, None, &fs, &postmap_never()).await;
        assert_eq!(status, ExitStatus::WriteFailed);
    }

    #[tokio::test]
    async fn test_empty_address_is_ignored() {
        let fx = Fixture::new();
        fx.write("virtual_trap", "");

        for raw in ["", ",A,20240101", "  "] {
            let input = TrapInput::Address(raw.to_string());
            let status =
                run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
            assert_eq!(status, ExitStatus::Success);
        }

        assert_eq!(fx.read("virtual_trap"), "");
        assert!(!fx.dir.path().join("phish_headers.regex").exists());
    }

    #[tokio::test]
    async fn test_empty_output_uses_configured_map() {
        let fx = Fixture::new();
        fx.write("virtual_trap", "");
        let input = TrapInput::Address("a@x.com".to_string());

        let status = run_with(
            &fx.config,
            &input,
            Some(Path::new("")),
            &RealFileSystem,
            &postmap_ok(),
        )
        .await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fx.read("virtual_trap"), "a@x.com\tphish-reply-trap@ourdomain.edu\n");
    }

    #[tokio::test]
    async fn test_cleared_addresses_left_out() {
        let mut fx = Fixture::new();
        fx.write(
            "virtual_trap",
            "a@x.com\tphish-reply-trap@ourdomain.edu\nb@x.com\tphish-reply-trap@ourdomain.edu\n",
        );
        fx.write("cleared", "b@x.com,20240101\nd@x.com,20240101\n");
        fx.config.cleared_source = Some(fx.dir.path().join("cleared").display().to_string());
        let input = fx.feed("c@x.com,A,20240102\nd@x.com,A,20240102\n");

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(
            fx.read("virtual_trap"),
            "a@x.com\tphish-reply-trap@ourdomain.edu\nc@x.com\tphish-reply-trap@ourdomain.edu\n"
        );
        assert_eq!(fx.read("phish_headers.regex").lines().count(), 2);
    }

    #[tokio::test]
    async fn test_clearing_alone_rewrites_map() {
        let mut fx = Fixture::new();
        fx.write("virtual_trap", "a@x.com\tphish-reply-trap@ourdomain.edu\n");
        fx.write("cleared", "a@x.com,20240101\n");
        fx.config.cleared_source = Some(fx.dir.path().join("cleared").display().to_string());
        let input = TrapInput::Address("a@x.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_ok()).await;
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(fx.read("virtual_trap"), "");
        assert_eq!(fx.read("phish_headers.regex"), "");
    }

    #[tokio::test]
    async fn test_unreadable_cleared_list() {
        let mut fx = Fixture::new();
        fx.write("virtual_trap", "");
        fx.config.cleared_source = Some(fx.dir.path().join("absent").display().to_string());
        let input = TrapInput::Address("a@x.com".to_string());

        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
        assert_eq!(status, ExitStatus::Usage);
        assert_eq!(fx.read("virtual_trap"), "");
    }

    #[tokio::test]
    async fn test_held_lock_blocks_run() {
        let fx = Fixture::new();
        fx.write("virtual_trap", "");
        let _held = LockGuard::acquire(&fx.config.lock_file).unwrap();

        let input = TrapInput::Address("a@x.com".to_string());
        let status = run_with(&fx.config, &input, None, &RealFileSystem, &postmap_never()).await;
        assert_eq!(status, ExitStatus::WriteFailed);
        assert_eq!(fx.read("virtual_trap"), "");
    }
}
