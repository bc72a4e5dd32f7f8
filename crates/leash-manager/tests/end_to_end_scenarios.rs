//! End-to-end scenarios from spec.md §8, composed from the library crates
//! the manager binary wires together. These exercise real cross-crate
//! behavior (policy manager + persistence + kernel shim double) without
//! spawning the actual `leash-manager` process or a live network.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use leash_core::Action;
use leash_kernel::NullShim;
use leash_log::Logger;
use leash_policy::PolicyManager;
use leash_test::TempLeashDirs;

/// Scenario 5 ("PATCH preserves ordering"): a runtime overlay prepended in
/// front of a file layer that forbids all connects wins for the allowed
/// host, first-match-wins.
#[tokio::test]
async fn patch_prepend_wins_over_file_forbid() {
    let dirs = TempLeashDirs::new();
    let (logger, _log_task) = Logger::spawn(dirs.shared().join("events.log"), 100).await.unwrap();
    let (manager, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger, dirs.policy_path());

    let file_cedar = r#"forbid (principal, action == Action::"NetConnect", resource);"#;
    let file_compiled = leash_dsl::compile(file_cedar, "file.cedar").unwrap();
    manager.update_file_rules(file_compiled.policy_set, file_compiled.http_rewrites, file_cedar.to_string()).await.unwrap();

    let (policy_set, _) = manager.active_rules().await;
    assert_eq!(policy_set.check_connect(Some("api.anthropic.com"), None, 443), Action::Deny);

    let runtime_cedar = r#"permit (principal, action == Action::"NetConnect", resource) when { resource in [ Host::"api.anthropic.com" ] };"#;
    let runtime_compiled = leash_dsl::compile(runtime_cedar, "runtime.cedar").unwrap();
    manager
        .set_runtime_rules(runtime_compiled.policy_set, runtime_compiled.http_rewrites, runtime_cedar.to_string())
        .await
        .unwrap();

    let (policy_set, _) = manager.active_rules().await;
    assert_eq!(policy_set.check_connect(Some("api.anthropic.com"), None, 443), Action::Allow);

    // Idempotence: applying the identical runtime overlay again yields the
    // same decision (spec.md §8's "PATCH idempotence" property).
    let runtime_compiled_again = leash_dsl::compile(runtime_cedar, "runtime.cedar").unwrap();
    manager
        .set_runtime_rules(runtime_compiled_again.policy_set, runtime_compiled_again.http_rewrites, runtime_cedar.to_string())
        .await
        .unwrap();
    let (policy_set_again, _) = manager.active_rules().await;
    assert_eq!(policy_set_again.check_connect(Some("api.anthropic.com"), None, 443), Action::Allow);
}

/// Scenario 6 ("Persist rollback"): with the canonical policy directory
/// made unwritable, persisting returns an error and a subsequent read
/// returns the pre-persist snapshot byte-for-byte.
#[tokio::test]
async fn persist_rollback_leaves_prior_snapshot_intact() {
    let dirs = TempLeashDirs::new();
    let (logger, _log_task) = Logger::spawn(dirs.shared().join("events.log"), 100).await.unwrap();
    let (manager, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger, dirs.policy_path());

    let baseline_cedar = r#"permit (principal, action == Action::"NetConnect", resource) when { resource in [ Host::"api.anthropic.com" ] };"#;
    let baseline_compiled = leash_dsl::compile(baseline_cedar, "baseline.cedar").unwrap();
    manager
        .update_file_rules(baseline_compiled.policy_set, baseline_compiled.http_rewrites, baseline_cedar.to_string())
        .await
        .unwrap();
    let baseline_snapshot = manager.snapshot().await;

    let original_mode = std::fs::metadata(dirs.shared()).unwrap().permissions().mode();
    std::fs::set_permissions(dirs.shared(), std::fs::Permissions::from_mode(0o500)).unwrap();

    let attempted_cedar = r#"permit (principal, action == Action::"NetConnect", resource) when { resource in [ Host::"evil.example" ] };"#;
    let result = manager.persist_runtime_to_file(attempted_cedar, true).await;

    // Restore permissions before asserting so the temp dir can be cleaned up
    // even if an assertion below fails.
    std::fs::set_permissions(dirs.shared(), std::fs::Permissions::from_mode(original_mode)).unwrap();

    assert!(result.is_err(), "persist into an unwritable directory must fail");
    let snapshot_after = manager.snapshot().await;
    assert_eq!(baseline_snapshot.cedar_file, snapshot_after.cedar_file);
    assert_eq!(baseline_snapshot.cedar_runtime, snapshot_after.cedar_runtime);
}

/// permit-all must actually permit: a connect denied by the file layer is
/// allowed once `/api/policies/permit-all` is applied, matching the
/// glossary's "a permissive overlay is active; the file layer is bypassed".
#[tokio::test]
async fn permit_all_allows_a_connect_the_file_layer_forbids() {
    let dirs = TempLeashDirs::new();
    let (logger, _log_task) = Logger::spawn(dirs.shared().join("events.log"), 100).await.unwrap();
    let (manager, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger, dirs.policy_path());

    let file_cedar = r#"forbid (principal, action == Action::"NetConnect", resource);"#;
    let file_compiled = leash_dsl::compile(file_cedar, "file.cedar").unwrap();
    manager.update_file_rules(file_compiled.policy_set, file_compiled.http_rewrites, file_cedar.to_string()).await.unwrap();

    let (policy_set, _) = manager.active_rules().await;
    assert_eq!(policy_set.check_connect(Some("evil.example"), None, 443), Action::Deny);

    manager.permit_all().await.unwrap();
    let (policy_set, _) = manager.active_rules().await;
    assert_eq!(policy_set.check_connect(Some("evil.example"), None, 443), Action::Allow);
    assert_eq!(policy_set.check_open("/etc/shadow"), Action::Allow);
    assert_eq!(policy_set.check_exec("/usr/bin/anything"), Action::Allow);

    manager.enforce_apply().await.unwrap();
    let (policy_set, _) = manager.active_rules().await;
    assert_eq!(policy_set.check_connect(Some("evil.example"), None, 443), Action::Deny);
}

/// Scenario 9's soft-fail transparency property: a kernel shim that always
/// reports `Unavailable` (soft) still commits the runtime change and
/// returns the post-update snapshot rather than rolling back.
#[tokio::test]
async fn soft_kernel_failure_does_not_block_publish() {
    let dirs = TempLeashDirs::new();
    let (logger, _log_task) = Logger::spawn(dirs.shared().join("events.log"), 100).await.unwrap();
    let (manager, _rx) = PolicyManager::new(Arc::new(NullShim::new()), logger, dirs.policy_path());

    let cedar = leash_test::sample_policy();
    let compiled = leash_dsl::compile(cedar, "sample.cedar").unwrap();
    let snapshot = manager.set_runtime_rules(compiled.policy_set, compiled.http_rewrites, cedar.to_string()).await.unwrap();

    assert!(snapshot.runtime.len() > 0);
    assert_eq!(snapshot.cedar_runtime, cedar);
}
