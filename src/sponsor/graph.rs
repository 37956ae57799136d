// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Write;
use std::path::Path;

use super::KeepInterval;
use crate::model::Format;

/// Render keep intervals into an ffmpeg `-filter_complex` expression
///
/// Every interval becomes an `atrim` stage labelled `s{i}a` (plus a `trim`
/// stage `s{i}v` for video), and a final `concat` joins them into `[outa]`
/// (and `[outv]`).
pub fn build_filter_graph(keeps: &[KeepInterval], format: Format) -> String {
    let video = format.has_video();
    let mut graph = String::new();
    let mut inputs = String::new();

    for (idx, keep) in keeps.iter().enumerate() {
        let bounds = trim_bounds(keep);

        // write! into a String cannot fail
        let _ = write!(graph, "[0:a]atrim={bounds},asetpts=PTS-STARTPTS[s{idx}a];");
        if video {
            let _ = write!(graph, "[0:v]trim={bounds},setpts=PTS-STARTPTS[s{idx}v];");
            let _ = write!(inputs, "[s{idx}v]");
        }
        let _ = write!(inputs, "[s{idx}a]");
    }

    graph.push_str(&inputs);
    let _ = write!(
        graph,
        "concat=n={}:v={}:a=1",
        keeps.len(),
        if video { 1 } else { 0 }
    );
    if video {
        graph.push_str("[outv]");
    }
    graph.push_str("[outa]");

    graph
}

/// Arguments for the ffmpeg invocation applying `graph` to `input`
pub fn transcode_args(input: &Path, output: &Path, graph: &str, format: Format) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        format.extension().to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-filter_complex".to_string(),
        graph.to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
    ];
    if format.has_video() {
        args.push("-map".to_string());
        args.push("[outv]".to_string());
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

fn trim_bounds(keep: &KeepInterval) -> String {
    match keep.end {
        Some(end) => format!("start={:.6}:end={:.6}", keep.start, end),
        None => format!("start={:.6}", keep.start),
    }
}
