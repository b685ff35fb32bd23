//! Merging partition results into one response

use std::collections::hash_map::Entry;

use tracing::warn;

use crate::plugin::models::{DataResponse, QueryDataResponse};

/// Merge partition results, in arrival order, into one response.
///
/// The first result for a ref-ID seeds it. Later frames are appended
/// row-wise to the frame with the same name, or added as new frames when no
/// frame of that name exists yet. A frame that cannot be appended is logged
/// and dropped.
pub fn merge_partitions(
    plugin_id: &str,
    partitions: impl IntoIterator<Item = (String, DataResponse)>,
) -> QueryDataResponse {
    let mut merged = QueryDataResponse::new();
    for (ref_id, partition) in partitions {
        match merged.responses.entry(ref_id) {
            Entry::Vacant(slot) => {
                slot.insert(partition);
            }
            Entry::Occupied(mut slot) => {
                let ref_id = slot.key().clone();
                merge_response(plugin_id, &ref_id, slot.get_mut(), partition);
            }
        }
    }
    merged
}

fn merge_response(
    plugin_id: &str,
    ref_id: &str,
    existing: &mut DataResponse,
    incoming: DataResponse,
) {
    for frame in incoming.frames {
        let Some(target) = existing.frames.iter_mut().find(|f| f.name == frame.name) else {
            existing.frames.push(frame);
            continue;
        };
        let frame_name = frame.name.clone();
        if let Err(e) = target.append_rows(frame) {
            warn!(
                plugin_id = %plugin_id,
                ref_id = %ref_id,
                frame = %frame_name,
                error = %e,
                "Dropping partition frame that cannot be merged"
            );
        }
    }

    if let Some(error) = incoming.error {
        if existing.error.is_none() {
            existing.error = Some(error);
            existing.status = incoming.status;
        } else {
            warn!(plugin_id = %plugin_id, ref_id = %ref_id, error = %error, "Partition error not recorded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::frame::{Field, Frame};
    use serde_json::{Value, json};

    fn frame(name: &str, fields: usize, values: Vec<Value>) -> Frame {
        (0..fields).fold(Frame::new(name), |frame, i| {
            frame.with_field(Field::new(format!("f{i}"), values.clone()))
        })
    }

    fn partition(ref_id: &str, frames: Vec<Frame>) -> (String, DataResponse) {
        (ref_id.to_string(), DataResponse::from_frames(frames))
    }

    #[test]
    fn test_rows_appended_by_frame_name() {
        let merged = merge_partitions(
            "sharded",
            vec![
                partition("A", vec![frame("cpu", 2, vec![json!(1)])]),
                partition("A", vec![frame("cpu", 2, vec![json!(2), json!(3)])]),
            ],
        );
        let frames = &merged.get("A").unwrap().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].rows(), 3);
        assert_eq!(frames[0].fields[1].values, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_new_frame_names_are_added() {
        let merged = merge_partitions(
            "sharded",
            vec![
                partition("A", vec![frame("cpu", 1, vec![json!(1)])]),
                partition("A", vec![frame("mem", 1, vec![json!(2)])]),
            ],
        );
        let names: Vec<&str> = merged
            .get("A")
            .unwrap()
            .frames
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["cpu", "mem"]);
    }

    #[test]
    fn test_field_count_mismatch_is_dropped() {
        let merged = merge_partitions(
            "sharded",
            vec![
                partition("A", vec![frame("cpu", 2, vec![json!(1)])]),
                partition("A", vec![frame("cpu", 3, vec![json!(9)])]),
                partition("A", vec![frame("cpu", 2, vec![json!(2)])]),
            ],
        );
        let frames = &merged.get("A").unwrap().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields.len(), 2);
        assert_eq!(frames[0].fields[0].values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_ref_ids_kept_apart() {
        let merged = merge_partitions(
            "sharded",
            vec![
                partition("A", vec![frame("cpu", 1, vec![json!(1)])]),
                partition("B", vec![frame("cpu", 1, vec![json!(2)])]),
            ],
        );
        assert_eq!(merged.responses.len(), 2);
        assert_eq!(merged.get("B").unwrap().frames[0].rows(), 1);
    }

    #[test]
    fn test_first_partition_error_is_kept() {
        let mut failing = DataResponse::from_error("shard 2 timed out");
        failing.status = Some(504);
        let merged = merge_partitions(
            "sharded",
            vec![
                partition("A", vec![frame("cpu", 1, vec![json!(1)])]),
                ("A".to_string(), failing),
                ("A".to_string(), DataResponse::from_error("shard 3 timed out")),
            ],
        );
        let response = merged.get("A").unwrap();
        assert_eq!(response.error.as_deref(), Some("shard 2 timed out"));
        assert_eq!(response.status, Some(504));
        assert_eq!(response.frames[0].rows(), 1);
    }
}
