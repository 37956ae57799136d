// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{CategoryPolicy, SponsorSegment};

/// A time range to retain, in seconds; `end == None` runs to the end of the media
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepInterval {
    pub start: f64,
    pub end: Option<f64>,
}

/// Turn sponsor segments into the intervals that survive trimming
///
/// Segments whose category the policy keeps are ignored. The remaining cut
/// ranges are sorted and merged first, so the result is the exact complement
/// of their union. Zero-length keeps are not emitted; the trailing interval
/// to the end of the media always is.
pub fn plan_keep_intervals(
    segments: &[SponsorSegment],
    policy: &CategoryPolicy,
) -> Vec<KeepInterval> {
    let cuts = merged_cuts(segments, policy);

    let mut keeps = Vec::with_capacity(cuts.len() + 1);
    let mut cursor = 0.0;
    for (start, end) in cuts {
        if start > cursor {
            keeps.push(KeepInterval {
                start: cursor,
                end: Some(start),
            });
        }
        cursor = end;
    }
    keeps.push(KeepInterval {
        start: cursor,
        end: None,
    });

    keeps
}

/// A plan that keeps everything needs no transcoding
pub fn is_passthrough(keeps: &[KeepInterval]) -> bool {
    matches!(
        keeps,
        [KeepInterval {
            start,
            end: None
        }] if *start <= 0.0
    )
}

fn merged_cuts(segments: &[SponsorSegment], policy: &CategoryPolicy) -> Vec<(f64, f64)> {
    let mut cuts: Vec<(f64, f64)> = segments
        .iter()
        .filter(|s| policy.cuts(s.category))
        .filter(|s| s.start.is_finite() && s.end.is_finite())
        .map(|s| (s.start.max(0.0), s.end))
        .filter(|(start, end)| end > start)
        .collect();

    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(cuts.len());
    for (start, end) in cuts {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}
