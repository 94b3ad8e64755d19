use crate::config::{AppPaths, AppSettings};
use crate::core::merge::Merger;
use crate::core::orchestrator::Orchestrator;
use crate::models::error::SError;
use crate::models::game::GameTarget;
use crate::models::paths::CachePaths;
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::info;

pub fn games(settings: &mut AppSettings, select: Option<usize>) -> Result<(), SError> {
    if let Some(index) = select {
        if GameTarget::by_index(index).is_none() {
            return Err(SError::ParseError(format!("no supported game at index {index}")));
        }
        settings.game_index = index;
        // A CLI run never holds a session across invocations.
        settings.update(false)?;
    }

    for (i, game) in GameTarget::supported().iter().enumerate() {
        let marker = if i == settings.game_index { "*" } else { " " };
        println!("{marker} {i}: {} (app {})", game.name, game.app_id);
    }
    Ok(())
}

/// Merging consumes its inputs, so sources are staged as copies first.
pub fn merge(paths: &AppPaths, sources: &[Utf8PathBuf], destination: &Utf8Path) -> Result<(), SError> {
    let staging = CachePaths::new(&paths.cache_dir).merge;
    FileUtils::remove_dir_if_exists(&staging)?;

    let mut staged = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        if !source.is_dir() {
            return Err(SError::IOError(format!("{source} is not a directory")));
        }
        let copy = staging.join(i.to_string());
        FileUtils::copy_recursive(source, &copy)?;
        staged.push(copy);
    }

    fs::create_dir_all(destination)?;
    let states = Merger::merge_sources(&staged, destination);
    FileUtils::remove_dir_if_exists(&staging)?;

    for state in states {
        info!(
            prefix = %state.merge_prefix,
            scripts = state.script_files.len(),
            globals = state.script_globals.len(),
            "Merged source {}",
            state.index
        );
    }
    Ok(())
}

pub fn clear_cache(orchestrator: &Orchestrator) -> Result<(), SError> {
    orchestrator.clear_cache()?;
    println!("Cleared {}", orchestrator.cache().root());
    Ok(())
}

pub fn recover(orchestrator: &Orchestrator) -> Result<(), SError> {
    match orchestrator.recover()? {
        Some(record) => println!("Removed leftover link at {}", record.destination),
        None => println!("Nothing to recover"),
    }
    Ok(())
}
