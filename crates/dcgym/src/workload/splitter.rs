//! Splitting of cloudlets whose core demand exceeds the configured limit.

use crate::workload::CloudletDescriptor;

/// Id offset separating split pieces from original trace jobs.
const SPLIT_ID_OFFSET: u32 = 1_000_000;

/// Partitions every descriptor demanding more than `max_pes` cores into
/// `ceil(pes / max_pes)` pieces.
///
/// Each piece takes at most `max_pes` cores and a length proportional to its
/// core share of the original (at least 1 MI). Pieces keep the original
/// arrival time and draw fresh ids from a range above the trace ids.
pub fn split_oversize(descriptors: Vec<CloudletDescriptor>, max_pes: u32) -> Vec<CloudletDescriptor> {
    let max_id = descriptors.iter().map(|d| d.id).max().unwrap_or(0);
    let mut next_id = max_id + SPLIT_ID_OFFSET;
    let mut result = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if descriptor.pes <= max_pes {
            result.push(descriptor);
            continue;
        }
        let mi_per_pe = descriptor.length / descriptor.pes as f64;
        let mut remaining_pes = descriptor.pes;
        while remaining_pes > 0 {
            let piece_pes = remaining_pes.min(max_pes);
            result.push(CloudletDescriptor {
                id: next_id,
                arrival_time: descriptor.arrival_time,
                length: (mi_per_pe * piece_pes as f64).max(1.),
                pes: piece_pes,
                file_size_in: descriptor.file_size_in,
                file_size_out: descriptor.file_size_out,
            });
            next_id += 1;
            remaining_pes -= piece_pes;
        }
    }
    result
}
