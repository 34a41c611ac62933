//! Process supervision: the media server and the loop streams feeding it.

pub mod media_server;
pub mod readiness;
pub mod restream;

use std::collections::BTreeMap;

use loopcast_core::StreamAssignment;

pub use media_server::MediaServer;
pub use readiness::{marker_predicate, Readiness, ReadinessMonitor, ServerState};
pub use restream::{StreamOutcome, StreamSupervisor};

/// Decide which valid files get streamed and under which names.
///
/// With `single_name` set only the first valid file is streamed, under that
/// name. Otherwise each file gets its derived name; when two files derive the
/// same name the later one wins.
pub fn plan_streams(valid: &[String], single_name: Option<&str>) -> Vec<StreamAssignment> {
    if let Some(name) = single_name {
        return valid
            .first()
            .map(|file| StreamAssignment {
                stream_name: name.to_string(),
                source_file: file.clone(),
            })
            .into_iter()
            .collect();
    }

    let mut plan: BTreeMap<String, StreamAssignment> = BTreeMap::new();
    for file in valid {
        let assignment = StreamAssignment::derived(file.as_str());
        if let Some(replaced) = plan.insert(assignment.stream_name.clone(), assignment) {
            tracing::warn!(
                stream = %replaced.stream_name,
                dropped = %replaced.source_file,
                kept = %file,
                "Stream name collision"
            );
        }
    }
    plan.into_values().collect()
}
