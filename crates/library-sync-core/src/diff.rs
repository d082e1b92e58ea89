// Snapshot diffing for tracking-service lists

use library_sync_models::{ListItem, WatchedMovie, WatchedSeason, WatchedShow};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Items of `current` whose tracking ID is missing from `previous`.
///
/// Before the tracking state is initialized, items of `current` that are not
/// in the local library are kept as well so a first sync can fill gaps.
/// Swap the arguments to get the removed items. Order is preserved.
pub fn diff_list<F>(previous: &[ListItem], current: &[ListItem], is_initialized: bool, in_library: F) -> Vec<ListItem>
where
    F: Fn(&ListItem) -> bool,
{
    let known: HashSet<i64> = previous.iter().map(|i| i.ids.tracking_id).collect();

    let diff: Vec<ListItem> = current
        .iter()
        .filter(|item| !known.contains(&item.ids.tracking_id) || (!is_initialized && !in_library(item)))
        .cloned()
        .collect();

    debug!(
        "diff_list: previous_count={}, current_count={}, result_count={}",
        previous.len(),
        current.len(),
        diff.len()
    );
    diff
}

/// Watched movies new in `current`.
///
/// With `include_local_check`, only movies whose catalog ID is in
/// `local_catalog_ids` are returned.
pub fn diff_watched_movies(
    previous: &[WatchedMovie],
    current: &[WatchedMovie],
    include_local_check: bool,
    local_catalog_ids: &HashSet<i64>,
) -> Vec<WatchedMovie> {
    let known: HashSet<i64> = previous.iter().map(|m| m.ids.tracking_id).collect();

    current
        .iter()
        .filter(|m| !known.contains(&m.ids.tracking_id))
        .filter(|m| !include_local_check || local_catalog_ids.contains(&m.ids.catalog_id))
        .cloned()
        .collect()
}

/// Watched episodes new in `current`, grouped back into their shows.
///
/// Shows without a new episode are left out.
pub fn diff_watched_shows(previous: &[WatchedShow], current: &[WatchedShow]) -> Vec<WatchedShow> {
    let known: HashMap<i64, &WatchedShow> = previous.iter().map(|s| (s.ids.tracking_id, s)).collect();

    let mut diff = Vec::new();
    for show in current {
        let Some(before) = known.get(&show.ids.tracking_id) else {
            diff.push(show.clone());
            continue;
        };

        let seasons: Vec<WatchedSeason> = show
            .seasons
            .iter()
            .filter_map(|season| {
                let episodes: Vec<_> = season
                    .episodes
                    .iter()
                    .filter(|e| !before.has_episode(season.number, e.number))
                    .cloned()
                    .collect();
                (!episodes.is_empty()).then(|| WatchedSeason {
                    number: season.number,
                    episodes,
                })
            })
            .collect();

        if !seasons.is_empty() {
            diff.push(WatchedShow {
                seasons,
                ..show.clone()
            });
        }
    }
    diff
}
