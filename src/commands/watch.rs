use anyhow::Result;
use colored::Colorize;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::channel;

use crate::commands::{check, detect_target, Target};
use crate::config::MANIFEST_FILE;
use crate::project::Project;

/// Re-run `check` whenever a prompt or the manifest changes
pub fn execute(target: &str) -> Result<()> {
    let (watch_dir, extension) = match detect_target(target) {
        Target::Project(manifest_path) => {
            let project = Project::load(&manifest_path)?;
            (project.dir.clone(), project.config.prompts.extension.clone())
        }
        Target::SingleFile(file_path) => {
            if !file_path.is_file() {
                anyhow::bail!("File not found: {}", file_path.display());
            }
            let dir = file_path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            let extension = file_path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("promptl")
                .to_string();
            (dir, extension)
        }
    };

    // Initial check
    match check::execute(target) {
        Ok(_) => println!("{}", "   Watching for changes...".green().bold()),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            eprintln!("Watching anyway (will re-check on file changes)...");
        }
    }

    let watch_dir = watch_dir.canonicalize().unwrap_or(watch_dir);
    let gitignore = load_gitignore(&watch_dir);

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;
    watcher.watch(&watch_dir, RecursiveMode::Recursive)?;

    loop {
        let event = rx
            .recv()
            .map_err(|_| anyhow::anyhow!("file watcher stopped unexpectedly"))?;
        if !should_recheck(&event, &extension, &gitignore) {
            continue;
        }

        // Editors often emit several events per save; check once
        while rx.try_recv().is_ok() {}

        let changed_file = event
            .paths
            .first()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        println!("\nChange detected in {}", changed_file);

        match check::execute(target) {
            Ok(_) => {}
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
    }
}

/// Load gitignore from the directory if it exists
fn load_gitignore(dir: &Path) -> Gitignore {
    let gitignore_path = dir.join(".gitignore");
    let mut builder = GitignoreBuilder::new(dir);

    if gitignore_path.exists() {
        let _ = builder.add(&gitignore_path);
    }

    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Whether an event touches a prompt file or the manifest
fn should_recheck(event: &Event, extension: &str, gitignore: &Gitignore) -> bool {
    use notify::EventKind::*;

    match event.kind {
        Modify(_) | Create(_) | Remove(_) => event.paths.iter().any(|p| {
            let is_relevant = p.extension().map_or(false, |ext| ext == extension)
                || p.file_name().map_or(false, |name| name == MANIFEST_FILE);

            is_relevant && !is_ignored(gitignore, p)
        }),
        _ => false,
    }
}

fn is_ignored(gitignore: &Gitignore, path: &Path) -> bool {
    !gitignore.is_empty()
        && path.starts_with(gitignore.path())
        && gitignore
            .matched_path_or_any_parents(path, path.is_dir())
            .is_ignore()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};
    use std::fs;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_should_recheck_prompt_and_manifest() {
        let gitignore = Gitignore::empty();
        let modified = |path: &str| event(EventKind::Modify(ModifyKind::Any), Path::new(path));

        assert!(should_recheck(&modified("prompts/a.promptl"), "promptl", &gitignore));
        assert!(should_recheck(&modified(MANIFEST_FILE), "promptl", &gitignore));
        assert!(!should_recheck(&modified("notes.md"), "promptl", &gitignore));
        assert!(!should_recheck(
            &event(EventKind::Access(notify::event::AccessKind::Any), Path::new("a.promptl")),
            "promptl",
            &gitignore
        ));
    }

    #[test]
    fn test_should_recheck_respects_gitignore() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "drafts/\n").unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        let gitignore = load_gitignore(dir.path());

        let draft = dir.path().join("drafts/new.promptl");
        let kept = dir.path().join("main.promptl");
        let created = |path: &Path| event(EventKind::Create(CreateKind::File), path);
        assert!(!should_recheck(&created(&draft), "promptl", &gitignore));
        assert!(should_recheck(&created(&kept), "promptl", &gitignore));
    }
}
