// src/watch/event_handler.rs

//! Turns one changed path into rule triggers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fileset::relative_slash_path;
use crate::fs::FileSystem;
use crate::watch::hash::ContentFilter;
use crate::watch::rules::WatchRule;
use crate::watch::{RuleId, WatchEvent};

/// Convert `path` into a `/`-separated string relative to `root`.
///
/// Falls back to canonicalized paths, since some platforms report events
/// under a different absolute prefix (symlinked temp dirs on macOS).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Some(rel) = relative_slash_path(root, path) {
        return Some(rel);
    }
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    relative_slash_path(&root, &path)
}

/// Match a changed path against every rule and send a trigger for each hit.
///
/// Returns `false` once the runtime channel is closed, so the caller can stop
/// its event loop.
pub async fn process_file_change(
    fs: Arc<dyn FileSystem>,
    root: &Path,
    path: &Path,
    rules: &[WatchRule],
    filter: Arc<Mutex<ContentFilter>>,
    runtime_tx: &mpsc::Sender<WatchEvent>,
) -> bool {
    let Some(rel) = relative_str(root, path) else {
        warn!(?path, ?root, "could not relativize event path");
        return true;
    };
    if rel.is_empty() {
        return true;
    }

    for rule in rules.iter().filter(|r| r.matches(&rel)) {
        if rule.use_hash && !content_changed(fs.clone(), rule.id, path, filter.clone()).await {
            info!(rule = rule.id, path = %rel, "content unchanged; skipping trigger");
            continue;
        }

        debug!(rule = rule.id, path = %rel, "watch match -> triggering rule");
        let event = WatchEvent::RuleTriggered {
            rule: rule.id,
            path: rel.clone(),
        };
        if let Err(err) = runtime_tx.send(event).await {
            warn!("failed to send WatchEvent::RuleTriggered: {err}");
            return false;
        }
    }
    true
}

async fn content_changed(
    fs: Arc<dyn FileSystem>,
    rule: RuleId,
    path: &Path,
    filter: Arc<Mutex<ContentFilter>>,
) -> bool {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut filter = filter.lock().unwrap_or_else(|e| e.into_inner());
        match filter.changed(fs.as_ref(), rule, &path) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(rule, ?path, error = %err, "hashing failed; triggering anyway");
                true
            }
        }
    })
    .await
    .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::graph::GraphNode;
    use crate::task::Task;

    fn rule(id: usize, pattern: &str, use_hash: bool) -> WatchRule {
        let graph = Arc::new(GraphNode::Leaf(Arc::new(Task::clean())));
        WatchRule::new(id, vec![pattern.to_string()], graph, false, use_hash).unwrap()
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(
            relative_str(Path::new("/site/source"), Path::new("/site/source/less/a.less")),
            Some("less/a.less".to_string())
        );
    }

    #[tokio::test]
    async fn matching_rules_are_triggered_and_hash_filters_repeats() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/source/index.html", "<p>x</p>");
        let rules = vec![rule(0, "*.html", true), rule(1, "less/**/*.less", false)];
        let filter = Arc::new(Mutex::new(ContentFilter::new()));
        let (tx, mut rx) = mpsc::channel(8);
        let path = Path::new("/site/source/index.html");

        for _ in 0..2 {
            assert!(
                process_file_change(
                    Arc::new(fs.clone()),
                    Path::new("/site/source"),
                    path,
                    &rules,
                    filter.clone(),
                    &tx,
                )
                .await
            );
        }
        drop(tx);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(
            events,
            vec![WatchEvent::RuleTriggered {
                rule: 0,
                path: "index.html".to_string()
            }]
        );
    }
}
