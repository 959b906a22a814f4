//! Decision engine — turns one snapshot into at most one resource action.
//!
//! Rules are evaluated in order and the first match wins. Capacity for
//! new work always outranks teardown, and the "app up without a cluster"
//! cleanup outranks the idle-gated stop.
//!
//! ```text
//! #  condition                                        action
//! 1  queue > 0, cluster absent                        CreateCluster
//! 2  queue > 0, cluster operational, app stopped      StartApp
//! 3  queue = 0, cluster absent, app running           StopApp
//! 4  queue = 0, jobs = 0, operational, app running    StopApp        (after idle threshold)
//! 5  queue = 0, jobs = 0, operational, app stopped    DeleteCluster  (after idle threshold)
//! ```
//!
//! Teardown rules go through a hysteresis step: the first idle-eligible
//! cycle arms a timer, and the action only fires once the timer is at
//! least the configured threshold old.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tidepool_core::{
    ControlError, ControlResult, IdleResource, IdleThresholds, ResourceAction, Source,
    StatusSnapshot, Timestamp,
};

/// Per-resource idle timers. Persist across cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTimerState {
    /// First cycle the app was seen idle-eligible.
    pub app_idle_since: Option<Timestamp>,
    /// First cycle the cluster was seen delete-eligible.
    pub cluster_idle_since: Option<Timestamp>,
}

impl IdleTimerState {
    pub fn since(&self, resource: IdleResource) -> Option<Timestamp> {
        match resource {
            IdleResource::App => self.app_idle_since,
            IdleResource::Cluster => self.cluster_idle_since,
        }
    }

    fn slot(&mut self, resource: IdleResource) -> &mut Option<Timestamp> {
        match resource {
            IdleResource::App => &mut self.app_idle_since,
            IdleResource::Cluster => &mut self.cluster_idle_since,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.app_idle_since.is_none() && self.cluster_idle_since.is_none()
    }
}

/// The structural facts the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facts {
    pub queue_length: u64,
    pub cluster_absent: bool,
    pub cluster_operational: bool,
    pub app_active: bool,
    pub active_jobs: u64,
}

impl Facts {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            queue_length: snapshot.queue_length,
            cluster_absent: snapshot.cluster_status.is_not_found(),
            cluster_operational: snapshot.cluster_status.is_operational(),
            app_active: snapshot.app_active,
            active_jobs: snapshot.active_job_count,
        }
    }

    fn idle(&self) -> bool {
        self.queue_length == 0 && self.active_jobs == 0 && self.cluster_operational
    }
}

/// What a matched rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    /// Emit the action this cycle.
    Act(ResourceAction),
    /// Emit the resource's teardown once its idle timer is old enough.
    AfterIdle(IdleResource),
}

/// One row of the decision table.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: u8,
    pub name: &'static str,
    pub applies: fn(&Facts) -> bool,
    pub effect: RuleEffect,
}

/// The decision table, in priority order.
pub const RULES: [Rule; 5] = [
    Rule {
        id: 1,
        name: "work pending, no cluster",
        applies: |f| f.queue_length > 0 && f.cluster_absent,
        effect: RuleEffect::Act(ResourceAction::CreateCluster),
    },
    Rule {
        id: 2,
        name: "work pending, app stopped",
        applies: |f| f.queue_length > 0 && f.cluster_operational && !f.app_active,
        effect: RuleEffect::Act(ResourceAction::StartApp),
    },
    Rule {
        id: 3,
        name: "app running without a cluster",
        applies: |f| f.queue_length == 0 && f.cluster_absent && f.app_active,
        effect: RuleEffect::Act(ResourceAction::StopApp),
    },
    Rule {
        id: 4,
        name: "app idle",
        applies: |f| f.idle() && f.app_active,
        effect: RuleEffect::AfterIdle(IdleResource::App),
    },
    Rule {
        id: 5,
        name: "cluster idle",
        applies: |f| f.idle() && !f.app_active,
        effect: RuleEffect::AfterIdle(IdleResource::Cluster),
    },
];

/// Result of one `decide` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: ResourceAction,
    /// Id of the rule that matched, if any.
    pub rule: Option<u8>,
    /// Idle timers to carry into the next cycle.
    pub idle: IdleTimerState,
}

/// Sources whose errors make the snapshot unusable.
///
/// Queue, cluster and app errors always block. A job-engine error only
/// blocks when the cluster reports itself operational: an absent or
/// transitioning cluster has no job engine to ask, and no rule reads the
/// job count in that case.
pub fn blocking_errors(snapshot: &StatusSnapshot) -> Vec<Source> {
    snapshot
        .errors()
        .into_iter()
        .map(|(source, _)| source)
        .filter(|source| match source {
            Source::JobEngine => {
                snapshot.cluster_error.is_none() && snapshot.cluster_status.is_operational()
            }
            _ => true,
        })
        .collect()
}

/// Decide this cycle's action using the standard rule table.
pub fn decide(
    snapshot: &StatusSnapshot,
    idle: &IdleTimerState,
    now: Timestamp,
    thresholds: &IdleThresholds,
) -> ControlResult<Decision> {
    decide_with(&RULES, snapshot, idle, now, thresholds)
}

/// Decide against an arbitrary rule table.
///
/// Returns `ControlError::UnusableSnapshot` without touching the idle
/// timers when any relevant source failed. Otherwise every timer whose
/// idle rule did not match this cycle is disarmed, so a teardown only
/// fires after an unbroken idle stretch.
pub fn decide_with(
    rules: &[Rule],
    snapshot: &StatusSnapshot,
    idle: &IdleTimerState,
    now: Timestamp,
    thresholds: &IdleThresholds,
) -> ControlResult<Decision> {
    let failing = blocking_errors(snapshot);
    if !failing.is_empty() {
        return Err(ControlError::UnusableSnapshot(failing));
    }

    let facts = Facts::from_snapshot(snapshot);
    let matched = first_match(rules, &facts);

    // A timer only survives while its own idle rule keeps matching.
    let mut next = *idle;
    let gated = matched.and_then(|rule| match rule.effect {
        RuleEffect::AfterIdle(resource) => Some(resource),
        RuleEffect::Act(_) => None,
    });
    if gated != Some(IdleResource::App) {
        next.app_idle_since = None;
    }
    if gated != Some(IdleResource::Cluster) {
        next.cluster_idle_since = None;
    }

    let Some(rule) = matched else {
        return Ok(Decision {
            action: ResourceAction::NoOp,
            rule: None,
            idle: next,
        });
    };

    let action = match rule.effect {
        RuleEffect::Act(action) => action,
        RuleEffect::AfterIdle(resource) => {
            let threshold = match resource {
                IdleResource::App => thresholds.app,
                IdleResource::Cluster => thresholds.cluster,
            };
            gate(resource, &mut next, now, threshold)
        }
    };

    debug!(rule = rule.id, name = rule.name, %action, "rule matched");

    Ok(Decision {
        action,
        rule: Some(rule.id),
        idle: next,
    })
}

/// First rule whose condition holds. Later rules are not consulted.
pub fn first_match<'a>(rules: &'a [Rule], facts: &Facts) -> Option<&'a Rule> {
    rules.iter().find(|rule| (rule.applies)(facts))
}

/// Hysteresis step for one idle-eligible resource.
fn gate(
    resource: IdleResource,
    idle: &mut IdleTimerState,
    now: Timestamp,
    threshold: Duration,
) -> ResourceAction {
    let slot = idle.slot(resource);
    let Some(since) = *slot else {
        *slot = Some(now);
        debug!(%resource, since = now, "idle timer armed");
        return ResourceAction::NoOp;
    };

    let elapsed = Duration::from_secs(now.saturating_sub(since));
    if elapsed < threshold {
        debug!(
            %resource,
            elapsed_secs = elapsed.as_secs(),
            threshold_secs = threshold.as_secs(),
            "idle, below threshold"
        );
        return ResourceAction::NoOp;
    }

    // The cluster timer stays armed until the delete is known to have
    // succeeded; see `settle`.
    if resource == IdleResource::App {
        *slot = None;
    }
    resource.teardown()
}

/// Fold a dispatch outcome back into the idle timers.
///
/// A successful `DeleteCluster` disarms the cluster timer. A failed one
/// leaves it armed so the next idle-eligible cycle retries at once.
pub fn settle(idle: &IdleTimerState, action: ResourceAction, succeeded: bool) -> IdleTimerState {
    let mut next = *idle;
    if action == ResourceAction::DeleteCluster && succeeded {
        next.cluster_idle_since = None;
    }
    next
}
