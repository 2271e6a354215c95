// src/watch/core.rs

//! Pure watch state machine.
//!
//! [`WatchCore`] consumes [`WatchEvent`]s and returns the [`WatchCommand`]s
//! the async shell (`watch::runtime::WatchRuntime`) should carry out. It has
//! no channels, no Tokio types and performs no IO, so the per-rule
//! Idle/Running/queued transitions can be unit tested directly.

use tracing::{debug, info, warn};

use super::{RuleId, WatchEvent};

/// What the IO shell should do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Start the graph of this rule.
    StartRun { rule: RuleId },
    /// Broadcast a browser reload. Fire and forget.
    Reload,
}

/// Result of a single [`WatchCore::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStep {
    pub commands: Vec<WatchCommand>,
    pub keep_running: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Stop once every rule is idle with nothing queued. Used by tests and
    /// one-shot tooling; the dev session runs until Ctrl-C.
    pub exit_when_idle: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct RuleSlot {
    reload: bool,
    running: bool,
    pending: usize,
}

#[derive(Debug)]
pub struct WatchCore {
    slots: Vec<RuleSlot>,
    queue_length: usize,
    options: WatchOptions,
}

impl WatchCore {
    /// `reload_flags[i]` is the `reload` setting of rule `i`.
    pub fn new(reload_flags: &[bool], queue_length: usize, options: WatchOptions) -> Self {
        Self {
            slots: reload_flags
                .iter()
                .map(|&reload| RuleSlot {
                    reload,
                    ..RuleSlot::default()
                })
                .collect(),
            queue_length: queue_length.max(1),
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| !s.running && s.pending == 0)
    }

    pub fn is_running(&self, rule: RuleId) -> bool {
        self.slots.get(rule).is_some_and(|s| s.running)
    }

    pub fn pending(&self, rule: RuleId) -> usize {
        self.slots.get(rule).map_or(0, |s| s.pending)
    }

    pub fn step(&mut self, event: WatchEvent) -> WatchStep {
        match event {
            WatchEvent::RuleTriggered { rule, path } => self.on_trigger(rule, &path),
            WatchEvent::RunFinished { rule, ok } => self.on_finished(rule, ok),
            WatchEvent::ShutdownRequested => WatchStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    fn on_trigger(&mut self, rule: RuleId, path: &str) -> WatchStep {
        let queue_length = self.queue_length;
        let Some(slot) = self.slots.get_mut(rule) else {
            warn!(rule, "trigger for unknown watch rule ignored");
            return self.continue_with(Vec::new());
        };

        if !slot.running {
            slot.running = true;
            info!(rule, %path, "watch rule triggered");
            return self.continue_with(vec![WatchCommand::StartRun { rule }]);
        }

        if slot.pending < queue_length {
            slot.pending += 1;
            debug!(rule, %path, pending = slot.pending, "rule busy; run queued");
        } else {
            debug!(rule, %path, "rule busy and queue full; coalesced into pending run");
        }
        self.continue_with(Vec::new())
    }

    fn on_finished(&mut self, rule: RuleId, ok: bool) -> WatchStep {
        let Some(slot) = self.slots.get_mut(rule) else {
            warn!(rule, "completion for unknown watch rule ignored");
            return self.continue_with(Vec::new());
        };

        slot.running = false;
        let mut commands = Vec::new();

        if ok && slot.reload {
            commands.push(WatchCommand::Reload);
        }

        if slot.pending > 0 {
            slot.pending -= 1;
            slot.running = true;
            debug!(rule, pending = slot.pending, "starting queued run");
            commands.push(WatchCommand::StartRun { rule });
        }

        self.continue_with(commands)
    }

    fn continue_with(&self, commands: Vec<WatchCommand>) -> WatchStep {
        let keep_running = !(self.options.exit_when_idle && self.is_idle());
        WatchStep {
            commands,
            keep_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(rule: RuleId) -> WatchEvent {
        WatchEvent::RuleTriggered {
            rule,
            path: "index.html".to_string(),
        }
    }

    fn finished(rule: RuleId, ok: bool) -> WatchEvent {
        WatchEvent::RunFinished { rule, ok }
    }

    #[test]
    fn idle_rule_starts_immediately() {
        let mut core = WatchCore::new(&[false], 1, WatchOptions::default());
        let step = core.step(trigger(0));
        assert_eq!(step.commands, vec![WatchCommand::StartRun { rule: 0 }]);
        assert!(step.keep_running);
        assert!(core.is_running(0));
    }

    #[test]
    fn events_while_running_queue_then_coalesce() {
        let mut core = WatchCore::new(&[false], 1, WatchOptions::default());
        core.step(trigger(0));

        assert!(core.step(trigger(0)).commands.is_empty());
        assert!(core.step(trigger(0)).commands.is_empty());
        assert_eq!(core.pending(0), 1);

        let step = core.step(finished(0, true));
        assert_eq!(step.commands, vec![WatchCommand::StartRun { rule: 0 }]);
        assert_eq!(core.pending(0), 0);

        assert!(core.step(finished(0, true)).commands.is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn queue_length_bounds_pending_runs() {
        let mut core = WatchCore::new(&[false], 3, WatchOptions::default());
        core.step(trigger(0));
        for _ in 0..10 {
            core.step(trigger(0));
        }
        assert_eq!(core.pending(0), 3);
    }

    #[test]
    fn distinct_rules_run_concurrently() {
        let mut core = WatchCore::new(&[false, false], 1, WatchOptions::default());
        assert_eq!(
            core.step(trigger(0)).commands,
            vec![WatchCommand::StartRun { rule: 0 }]
        );
        assert_eq!(
            core.step(trigger(1)).commands,
            vec![WatchCommand::StartRun { rule: 1 }]
        );
        assert!(core.is_running(0) && core.is_running(1));
    }

    #[test]
    fn reload_only_after_successful_run() {
        let mut core = WatchCore::new(&[true], 1, WatchOptions::default());
        core.step(trigger(0));
        core.step(trigger(0));

        let failed = core.step(finished(0, false));
        assert_eq!(failed.commands, vec![WatchCommand::StartRun { rule: 0 }]);

        let ok = core.step(finished(0, true));
        assert_eq!(ok.commands, vec![WatchCommand::Reload]);
    }

    #[test]
    fn exit_when_idle_stops_after_last_run() {
        let mut core = WatchCore::new(
            &[false],
            1,
            WatchOptions {
                exit_when_idle: true,
            },
        );
        assert!(core.step(trigger(0)).keep_running);
        assert!(!core.step(finished(0, true)).keep_running);
    }

    #[test]
    fn unknown_rule_is_ignored() {
        let mut core = WatchCore::new(&[false], 1, WatchOptions::default());
        let step = core.step(trigger(7));
        assert!(step.commands.is_empty());
        assert!(step.keep_running);
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = WatchCore::new(&[false], 1, WatchOptions::default());
        assert!(!core.step(WatchEvent::ShutdownRequested).keep_running);
    }
}
