use std::time::Duration;
use xsnapshot_core::{
    ContentHandle, FileDescriptor, FileSet, PipelineCoordinator, PipelineEvent, PipelinePhase,
    PipelineSettings, RuleSet,
};

fn file(path: &str, size: u64) -> FileDescriptor {
    FileDescriptor::new(path, size, ContentHandle::from_text("x"))
}

fn text_file(path: &str, text: &str) -> FileDescriptor {
    FileDescriptor::new(path, text.len() as u64, ContentHandle::from_text(text))
}

fn file_set(project_name: &str, files: Vec<FileDescriptor>, rule_sets: Vec<RuleSet>) -> FileSet {
    FileSet {
        project_name: project_name.to_string(),
        files,
        rule_sets,
    }
}

async fn next(coordinator: &mut PipelineCoordinator) -> PipelineEvent {
    tokio::time::timeout(Duration::from_secs(10), coordinator.next_update())
        .await
        .expect("pipeline did not report in time")
        .expect("no live stage unit")
}

/// Drives the pipeline until a terminal event, skipping status updates.
async fn settle(coordinator: &mut PipelineCoordinator) -> PipelineEvent {
    loop {
        match next(coordinator).await {
            PipelineEvent::Status(_) => continue,
            event => return event,
        }
    }
}

fn filtered_paths(coordinator: &PipelineCoordinator) -> Vec<&str> {
    coordinator
        .filtered_files()
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect()
}

#[tokio::test]
async fn scenario_a_structural_filters() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![
            file("proj/src/a.ts", 100),
            file("proj/node_modules/x.js", 50),
            file("proj/dist/out.js", 10),
        ],
        vec![RuleSet::new("proj/.gitignore", "*.log")],
    ));
    assert_eq!(coordinator.phase(), PipelinePhase::Filtering);

    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 1 });
    assert_eq!(coordinator.phase(), PipelinePhase::Ready);
    assert_eq!(filtered_paths(&coordinator), vec!["proj/src/a.ts"]);
    assert_eq!(
        coordinator.status(),
        "1 files will be included. Ready to generate snapshot."
    );
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn scenario_b_nested_rules() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![file("proj/src/temp/t.tmp", 5), file("proj/src/keep.ts", 5)],
        vec![RuleSet::new("proj/src/.gitignore", "temp/")],
    ));
    settle(&mut coordinator).await;
    assert_eq!(filtered_paths(&coordinator), vec!["proj/src/keep.ts"]);
}

#[tokio::test]
async fn scenario_c_generates_ordered_document() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![text_file("proj/b.py", "print('b')"), text_file("proj/a.ts", "export {}")],
        vec![RuleSet::new("Default Ignore Rules", "*.log")],
    ));
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 2 });
    assert!(coordinator.can_generate());

    assert!(coordinator.request_snapshot());
    assert_eq!(coordinator.phase(), PipelinePhase::Generating);

    let mut statuses = Vec::new();
    loop {
        match next(&mut coordinator).await {
            PipelineEvent::Status(message) => statuses.push(message),
            PipelineEvent::SnapshotReady => break,
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(
        statuses,
        vec![
            "Generating project tree...".to_string(),
            "Reading contents of 2 files...".to_string()
        ]
    );
    assert_eq!(coordinator.phase(), PipelinePhase::Ready);
    assert_eq!(coordinator.status(), "Snapshot for \"proj\" created successfully!");

    let document = coordinator.snapshot().unwrap();
    assert!(document.starts_with("# Project Snapshot: proj\n\n"));
    assert!(document.contains("Total files included: 2\n"));
    let contents = &document[document.find("## File Contents").unwrap()..];
    let a = contents.find("```typescript:proj/a.ts\nexport {}\n```").unwrap();
    let b = contents.find("```python:proj/b.py\nprint('b')\n```").unwrap();
    assert!(a < b);
}

#[tokio::test]
async fn generation_with_nothing_filtered_only_reports() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![file("proj/image.png", 10)],
        Vec::new(),
    ));
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 0 });

    assert!(!coordinator.request_snapshot());
    assert_eq!(coordinator.phase(), PipelinePhase::Ready);
    assert_eq!(coordinator.status(), "No files to process after filtering.");
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn new_file_set_supersedes_running_filter() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "first",
        (0..500).map(|i| file(&format!("first/f{}.ts", i), 1)).collect(),
        Vec::new(),
    ));
    coordinator.load_file_set(file_set(
        "second",
        vec![file("second/only.ts", 1)],
        Vec::new(),
    ));

    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 1 });
    assert_eq!(filtered_paths(&coordinator), vec!["second/only.ts"]);
    assert_eq!(coordinator.project_name(), "second");
    assert!(coordinator.next_update().await.is_none());
}

#[tokio::test]
async fn rule_edit_without_files_is_only_stored() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.update_rule_set("proj/.gitignore", "*.tmp");
    assert_eq!(coordinator.phase(), PipelinePhase::Idle);
    assert!(!coordinator.is_busy());
    assert_eq!(coordinator.rule_sets().len(), 1);
    assert!(coordinator.next_update().await.is_none());
}

#[tokio::test]
async fn rule_edit_refilters_and_replaces_existing_set() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![file("proj/a.ts", 1), file("proj/b.tmp", 1)],
        vec![RuleSet::new("proj/.gitignore", "*.log")],
    ));
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 2 });

    coordinator.update_rule_set("proj/.gitignore", "*.tmp");
    assert_eq!(coordinator.phase(), PipelinePhase::Filtering);
    assert_eq!(coordinator.status(), "Updating ignore rules... Reapplying filters.");
    assert_eq!(coordinator.rule_sets().len(), 1);

    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 1 });
    assert_eq!(filtered_paths(&coordinator), vec!["proj/a.ts"]);
}

#[tokio::test]
async fn refiltering_discards_in_flight_generation() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![text_file("proj/a.ts", "a"), text_file("proj/b.ts", "b")],
        Vec::new(),
    ));
    settle(&mut coordinator).await;
    assert!(coordinator.request_snapshot());

    coordinator.update_rule_set("proj/.gitignore", "b.ts");
    assert_eq!(coordinator.phase(), PipelinePhase::Filtering);
    assert!(coordinator.snapshot().is_none());

    // Only the new filter unit may report; nothing from the old generation.
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::Filtered { included: 1 });
    assert!(coordinator.snapshot().is_none());
    assert!(coordinator.next_update().await.is_none());
}

#[tokio::test]
async fn repeated_generation_replaces_document() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![text_file("proj/a.ts", "a")],
        Vec::new(),
    ));
    settle(&mut coordinator).await;

    assert!(coordinator.request_snapshot());
    assert!(coordinator.request_snapshot());
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::SnapshotReady);
    assert!(coordinator.next_update().await.is_none());
    assert!(coordinator.take_snapshot().is_some());
    assert!(coordinator.snapshot().is_none());
}

#[tokio::test]
async fn unreadable_file_does_not_fail_generation() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![
            FileDescriptor::new(
                "proj/missing.rs",
                4,
                ContentHandle::Disk("/nonexistent/xsnapshot/missing.rs".into()),
            ),
            text_file("proj/ok.rs", "fn main() {}"),
        ],
        Vec::new(),
    ));
    settle(&mut coordinator).await;
    assert!(coordinator.request_snapshot());
    assert_eq!(settle(&mut coordinator).await, PipelineEvent::SnapshotReady);

    let document = coordinator.snapshot().unwrap();
    assert!(document.contains("```error:Could not read proj/missing.rs\nError: "));
    assert!(document.contains("```rust:proj/ok.rs\nfn main() {}\n```"));
}

#[tokio::test]
async fn reset_returns_to_idle() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set("proj", vec![file("proj/a.ts", 1)], Vec::new()));
    coordinator.reset();

    assert_eq!(coordinator.phase(), PipelinePhase::Idle);
    assert!(!coordinator.is_busy());
    assert!(coordinator.filtered_files().is_empty());
    assert!(coordinator.rule_sets().is_empty());
    assert!(!coordinator.request_snapshot());
}

#[tokio::test]
async fn load_reports_rule_file_count() {
    let mut coordinator = PipelineCoordinator::new(PipelineSettings::default());
    coordinator.load_file_set(file_set(
        "proj",
        vec![file("proj/a.ts", 1), file("proj/src/b.ts", 1)],
        vec![
            RuleSet::new("proj/.gitignore", "*.log"),
            RuleSet::new("proj/src/.gitignore", "*.tmp"),
        ],
    ));
    assert_eq!(
        coordinator.load_summary(),
        "Loaded rules from 2 .gitignore file(s). Found 2 total files."
    );
    assert_eq!(coordinator.status(), "Applying ignore rules in the background...");
    settle(&mut coordinator).await;

    coordinator.load_file_set(file_set(
        "proj",
        vec![file("proj/a.ts", 1)],
        vec![RuleSet::new("Default Ignore Rules", "*.log")],
    ));
    assert_eq!(
        coordinator.load_summary(),
        "No .gitignore found. Using default rules. Found 1 total files."
    );
    settle(&mut coordinator).await;
}
