//  LIB.rs
//    by Lut99
//
//  Created:
//    17 Apr 2024, 10:02:51
//  Last edited:
//    03 May 2024, 14:21:08
//  Auto updated?
//    Yes
//
//  Description:
//!   Rebuilds the HTML of any stored policy version by locating the
//!   nearest prior checkpoint and replaying line deltas forward.
//

use log::warn;
use policy::{PolicyVersion, VersionNumber};
use serde_json::Value;


/***** ERRORS *****/
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("No versions found for this policy")]
    NoVersions,
    #[error("Version {0} not found for this policy")]
    VersionNotFound(String),
}


/***** LIBRARY *****/
/// How a [`Reconstruction`] came to be: replayed from the start of history, or
/// short-circuited through a checkpoint that skipped at least one prior delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionMethod {
    Sequential,
    Checkpoint,
}

impl ReconstructionMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Checkpoint => "checkpoint",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub html: String,
    pub version: VersionNumber,
    pub method: ReconstructionMethod,
}

/// Whether a version appended at 1-based `position` must carry a full-text
/// checkpoint. Together with the mandatory checkpoint at position 1 this pins
/// the checkpoint set to {1, 11, 21, 31, ...}, bounding replay at ten deltas.
pub fn checkpoint_due(position: usize) -> bool { position >= 11 && position % 10 == 1 }

/// Applies one stored delta on top of `html`, tolerating every malformed shape
/// a row can carry. Damage is logged with the owning version id and treated as
/// an empty delta so the replay keeps moving.
fn apply_step(html: String, version: &PolicyVersion) -> String {
    match &version.diff_data {
        Value::Object(_) => linediff::apply(&html, &version.diff_data),
        Value::String(raw) => {
            if raw.trim().is_empty() {
                html
            } else {
                linediff::apply_str(&html, raw)
            }
        },
        Value::Null => {
            warn!("Version {} ({}) has no usable diff_data; treating as empty delta", version.id, version.version);
            html
        },
        other => {
            warn!("Version {} ({}) has malformed diff_data of type {other:?}; treating as empty delta", version.id, version.version);
            html
        },
    }
}

/// Reconstructs the HTML of `target` (or of the newest version when `None`)
/// from a policy's version sequence, ordered by creation time ascending.
///
/// The replay starts from the nearest checkpoint at or before the target and
/// walks deltas forward from there; a target that is itself a checkpoint is
/// returned directly. Histories are well-formed when the first version is a
/// checkpoint, but a missing one is tolerated by replaying from the empty
/// document.
pub fn reconstruct(versions: &[PolicyVersion], target: Option<VersionNumber>) -> Result<Reconstruction, HistoryError> {
    let last = versions.last().ok_or(HistoryError::NoVersions)?;
    let target = target.unwrap_or(last.version);
    let target_idx = versions.iter().position(|v| v.version == target).ok_or_else(|| HistoryError::VersionNotFound(target.to_string()))?;

    // Nearest checkpoint at or before the target.
    let mut base = String::new();
    let mut start: usize = 0;
    let mut method = ReconstructionMethod::Sequential;
    for k in (0..=target_idx).rev() {
        if let Some(checkpoint) = &versions[k].checkpoint_template {
            if k > 0 {
                method = ReconstructionMethod::Checkpoint;
            }
            if k == target_idx {
                return Ok(Reconstruction { html: checkpoint.clone(), version: target, method });
            }
            base = checkpoint.clone();
            start = k + 1;
            break;
        }
    }

    let mut html = base;
    for version in &versions[start..=target_idx] {
        html = apply_step(html, version);
    }

    Ok(Reconstruction { html, version: target, method })
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use policy::VersionStatus;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::*;

    /// Builds a version row whose delta takes `prev` to `next`, checkpointing
    /// the full text when asked.
    fn version(seq: i64, number: (u32, u32), prev: &str, next: &str, checkpoint: bool) -> PolicyVersion {
        PolicyVersion {
            id: Uuid::new_v4(),
            org_policy_id: Uuid::nil(),
            version: VersionNumber::new(number.0, number.1),
            status: VersionStatus::Draft,
            is_current: false,
            diff_data: linediff::compute(prev, next).to_value(),
            checkpoint_template: if checkpoint { Some(next.to_string()) } else { None },
            expired_at: None,
            published_at: None,
            created_at: Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap(),
            updated_at: Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap(),
        }
    }

    /// A 13-step history with checkpoints at positions 1 and 11, where step i
    /// has the body `<p>step i</p>`.
    fn history() -> (Vec<PolicyVersion>, Vec<String>) {
        let mut versions = Vec::new();
        let mut texts = Vec::new();
        let mut prev = String::new();
        for i in 0..13usize {
            let next = format!("<h1>Policy</h1>\n<p>step {i}</p>");
            let position = i + 1;
            versions.push(version(i as i64, (1, i as u32), &prev, &next, position == 1 || checkpoint_due(position)));
            texts.push(next.clone());
            prev = next;
        }
        (versions, texts)
    }

    #[test]
    fn cadence_is_one_then_every_tenth() {
        let due: Vec<usize> = (1..=45).filter(|p| checkpoint_due(*p)).collect();
        assert_eq!(due, vec![11, 21, 31, 41]);
        assert!(!checkpoint_due(1), "position 1 is a checkpoint by construction, not by cadence");
    }

    #[test]
    fn empty_history_is_an_error() {
        assert!(matches!(reconstruct(&[], None), Err(HistoryError::NoVersions)));
    }

    #[test]
    fn unknown_target_is_an_error() {
        let (versions, _) = history();
        assert!(matches!(reconstruct(&versions, Some(VersionNumber::new(9, 9))), Err(HistoryError::VersionNotFound(_))));
    }

    #[test]
    fn every_version_reconstructs_to_its_own_text() {
        let (versions, texts) = history();
        for (i, text) in texts.iter().enumerate() {
            let rec = reconstruct(&versions, Some(VersionNumber::new(1, i as u32))).unwrap();
            assert_eq!(&rec.html, text, "version 1.{i} reconstructed wrong");
        }
    }

    #[test]
    fn default_target_is_the_newest_version() {
        let (versions, texts) = history();
        let rec = reconstruct(&versions, None).unwrap();
        assert_eq!(rec.version, VersionNumber::new(1, 12));
        assert_eq!(&rec.html, texts.last().unwrap());
    }

    #[test]
    fn first_checkpoint_read_reports_sequential() {
        let (versions, texts) = history();
        let rec = reconstruct(&versions, Some(VersionNumber::new(1, 0))).unwrap();
        assert_eq!(rec.method, ReconstructionMethod::Sequential);
        assert_eq!(&rec.html, &texts[0]);
    }

    #[test]
    fn reads_behind_a_later_checkpoint_report_checkpoint() {
        let (versions, _) = history();
        // Position 11 (version 1.10) carries a checkpoint; position 12 replays from it.
        let rec = reconstruct(&versions, Some(VersionNumber::new(1, 11))).unwrap();
        assert_eq!(rec.method, ReconstructionMethod::Checkpoint);
        let rec = reconstruct(&versions, Some(VersionNumber::new(1, 10))).unwrap();
        assert_eq!(rec.method, ReconstructionMethod::Checkpoint);
    }

    #[test]
    fn malformed_intermediate_delta_does_not_stop_the_replay() {
        let (mut versions, texts) = history();
        for garbage in [Value::Null, json!({}), Value::String("{broken".into()), json!(42)] {
            versions[3].diff_data = garbage;
            versions[3].checkpoint_template = None;
            // The damaged step itself reconstructs to whatever state came before it...
            let rec = reconstruct(&versions, Some(VersionNumber::new(1, 3))).unwrap();
            assert_eq!(rec.html, texts[2]);
            // ...and the checkpoint at position 11 re-establishes later reads.
            let rec = reconstruct(&versions, Some(VersionNumber::new(1, 12))).unwrap();
            assert_eq!(&rec.html, &texts[12]);
        }
    }

    #[test]
    fn history_without_any_checkpoint_replays_from_empty() {
        let (mut versions, texts) = history();
        for v in &mut versions {
            v.checkpoint_template = None;
        }
        let rec = reconstruct(&versions, Some(VersionNumber::new(1, 12))).unwrap();
        assert_eq!(&rec.html, &texts[12]);
        assert_eq!(rec.method, ReconstructionMethod::Sequential);
    }
}
