use super::open_loaded_service;
use crate::output::Output;
use clap::ValueEnum;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use library_sync_core::{LibraryError, ListId};
use library_sync_models::ListKind;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movies,
    Shows,
}

impl From<KindArg> for ListKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movies => ListKind::Movies,
            KindArg::Shows => ListKind::Shows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaArg {
    Movie,
    Show,
}

pub async fn run_list(list: &str, kind: KindArg, force: bool, output: &Output) -> Result<()> {
    let service = open_loaded_service().await?;
    let list = ListId::parse(list);

    let result = service
        .sync_list(&list, kind.into(), force)
        .await
        .map_err(|e| eyre!("Failed to sync {}: {}", list, e))?;

    if output.is_human() {
        output.success(format!(
            "{} synced: {} added, {} removed, {} skipped in {:?}",
            list,
            result.added.len(),
            result.removed,
            result.skipped,
            result.duration
        ));
    } else {
        let mut value = serde_json::to_value(&result)?;
        value["list"] = json!(list.to_string());
        value["duration_seconds"] = json!(result.duration.as_secs_f64());
        output.json(&value);
    }
    Ok(())
}

pub async fn run_add(media: MediaArg, id: i64, force: bool, output: &Output) -> Result<()> {
    let service = open_loaded_service().await?;

    let added = match media {
        MediaArg::Movie => service.add_movie(id, force).await.map(|m| (m.title.clone(), serde_json::to_value(&m))),
        MediaArg::Show => service.add_show(id, force).await.map(|s| (s.name.clone(), serde_json::to_value(&s))),
    };

    match added {
        Ok((title, metadata)) => {
            let metadata = metadata?;
            if output.is_human() {
                output.success(format!("Added {} to the library", title));
            } else {
                output.json(&json!({ "added": true, "item": metadata }));
            }
            Ok(())
        }
        Err(LibraryError::AlreadyExists(title)) => {
            if output.is_human() {
                output.warn(format!("{} is already in the library (use --force to add it anyway)", title));
            } else {
                output.json(&json!({ "added": false, "reason": "already_exists", "title": title }));
            }
            Ok(())
        }
        Err(e) if e.is_video_removed() => Err(eyre!("{}. Use --force to add it again.", e)),
        Err(e) => Err(eyre!("Failed to add {}: {}", id, e)),
    }
}

pub async fn run_remove(media: MediaArg, id: i64, purge: bool, output: &Output) -> Result<()> {
    let service = open_loaded_service().await?;

    let removed = match media {
        MediaArg::Movie => service.remove_movie(id, purge).await,
        MediaArg::Show => service.remove_show(id, purge).await,
    }
    .map_err(|e| eyre!("Failed to remove {}: {}", id, e))?;

    if output.is_human() {
        if removed.is_empty() {
            output.warn(format!("No placeholders found for {}", id));
        }
        for path in &removed {
            output.success(format!("Removed {}", path.display()));
        }
    } else {
        let paths: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
        output.json(&json!({ "id": id, "purged": purge, "removed": paths }));
    }
    Ok(())
}

pub async fn run_duplicates(remove: bool, output: &Output) -> Result<()> {
    let service = open_loaded_service().await?;

    let stats = if remove {
        service.remove_duplicates().await
    } else {
        service.duplicate_stats().await
    };

    if output.is_human() {
        let verb = if remove { "Removed" } else { "Found" };
        if stats.total() == 0 {
            output.success("No duplicates in the library");
        } else {
            output.info(format!(
                "{} {} duplicate movie(s), {} show(s) and {} episode(s)",
                verb, stats.movies, stats.shows, stats.episodes
            ));
            if !remove {
                output.info("Run 'strmsync duplicates --remove' to delete them");
            }
        }
    } else {
        output.json(&json!({ "removed": remove, "duplicates": stats, "total": stats.total() }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_arg_maps_to_list_kind() {
        assert_eq!(ListKind::from(KindArg::Movies), ListKind::Movies);
        assert_eq!(ListKind::from(KindArg::Shows), ListKind::Shows);
    }

    #[test]
    fn test_kind_arg_parses_lowercase() {
        assert_eq!(KindArg::from_str("shows", true).unwrap(), KindArg::Shows);
        assert_eq!(MediaArg::from_str("movie", true).unwrap(), MediaArg::Movie);
    }
}
