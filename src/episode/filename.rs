// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::{Episode, Format};

/// Name of the blob holding an episode's media inside its feed
///
/// Format: "<sanitized-id>.<ext>" where ext follows the feed format.
pub fn episode_name(format: Format, episode: &Episode) -> String {
    format!("{}.{}", sanitize_id(&episode.id), format.extension())
}

/// Make a provider ID safe to use as a file stem
fn sanitize_id(id: &str) -> String {
    let sanitized = sanitize_filename::sanitize(id);
    if sanitized.is_empty() {
        "episode".to_string()
    } else {
        sanitized
    }
}
