use drivecrawl::core::crawler::{
    AttemptFailure, FetchOutcome, FileFetcher, FileLink, FileStatus, NoopObserver,
};
use drivecrawl::CrawlSettings;
use std::fs;
use std::io;
use tempfile::TempDir;

use super::fake_site::{url, FakeFile, FakeSite, RecordingObserver};

fn settings(max_attempts: u32) -> CrawlSettings {
    CrawlSettings {
        max_attempts,
        control_poll_attempts: 2,
        ..CrawlSettings::immediate()
    }
}

fn link(path: &str, name: &str) -> FileLink {
    FileLink {
        url: url(path),
        display_name: name.to_string(),
    }
}

#[test]
fn test_navigation_faults_exhaust_attempts() {
    let mut site = FakeSite::new();
    site.file("/arquivo/1", FakeFile::new("a.pdf"))
        .fail_navigation("/arquivo/1", 10);

    let out = TempDir::new().unwrap();
    let settings = settings(3);
    let observer = RecordingObserver::new();
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &observer)
        .unwrap();

    match outcome {
        FetchOutcome::Abandoned {
            attempts,
            last_failure: AttemptFailure::Navigation(_),
        } => assert_eq!(attempts, 3),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(site.navigations_to("/arquivo/1"), 3);
    assert_eq!(site.pages_opened, 3, "each attempt uses a fresh page");
    assert_eq!(site.open_pages(), 0);
    assert_eq!(
        observer.statuses_for(&url("/arquivo/1")),
        vec![
            FileStatus::Downloading(1),
            FileStatus::Error(1),
            FileStatus::Downloading(2),
            FileStatus::Error(2),
            FileStatus::Downloading(3),
            FileStatus::Error(3),
            FileStatus::Skipped,
        ]
    );
}

#[test]
fn test_recovers_after_transient_fault() {
    let mut site = FakeSite::new();
    site.file("/arquivo/1", FakeFile::new("a.pdf"))
        .fail_navigation("/arquivo/1", 2);

    let out = TempDir::new().unwrap();
    let settings = settings(4);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &NoopObserver)
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Saved(out.path().join("Prova.pdf")));
    assert_eq!(site.navigations_to("/arquivo/1"), 3);
}

#[test]
fn test_site_error_banner_counts_as_failed_attempt() {
    let mut site = FakeSite::new();
    site.file(
        "/arquivo/1",
        FakeFile {
            error_banner: Some("Limite de downloads atingido".to_string()),
            ..FakeFile::new("a.pdf")
        },
    );

    let out = TempDir::new().unwrap();
    let settings = settings(2);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &NoopObserver)
        .unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Abandoned {
            attempts: 2,
            last_failure: AttemptFailure::SiteError("Limite de downloads atingido".to_string()),
        }
    );
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_control() {
    let mut site = FakeSite::new();
    site.file(
        "/arquivo/1",
        FakeFile {
            control_label: None,
            ..FakeFile::new("a.pdf")
        },
    );

    let out = TempDir::new().unwrap();
    let settings = settings(1);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &NoopObserver)
        .unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Abandoned {
            attempts: 1,
            last_failure: AttemptFailure::MissingControl,
        }
    );
}

#[test]
fn test_anchor_download_control_is_used() {
    let mut site = FakeSite::new();
    site.file(
        "/arquivo/1",
        FakeFile {
            control_label: None,
            anchor_download: true,
            ..FakeFile::new("notas.txt")
        },
    );

    let out = TempDir::new().unwrap();
    let settings = settings(1);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Notas de aula"), out.path(), &NoopObserver)
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Saved(out.path().join("Notas de aula.txt")));
}

#[test]
fn test_label_match_is_case_insensitive() {
    let mut site = FakeSite::new();
    site.file(
        "/arquivo/1",
        FakeFile {
            control_label: Some("  BAIXAR ARQUIVO ".to_string()),
            ..FakeFile::new("a.pdf")
        },
    );

    let out = TempDir::new().unwrap();
    let settings = settings(1);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &NoopObserver)
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Saved(_)));
}

#[test]
fn test_name_collisions_get_increasing_suffixes() {
    let mut site = FakeSite::new();
    for i in 1..=3 {
        site.file(&format!("/arquivo/{}", i), FakeFile::new("x.pdf"));
    }

    let out = TempDir::new().unwrap();
    let settings = settings(1);
    assert!(settings.skip_existing);
    let fetcher = FileFetcher::new(&settings);

    let saved: Vec<_> = (1..=3)
        .map(|i| {
            fetcher
                .fetch(
                    &mut site,
                    &link(&format!("/arquivo/{}", i), "Prova"),
                    out.path(),
                    &NoopObserver,
                )
                .unwrap()
        })
        .collect();

    assert_eq!(
        saved,
        vec![
            FetchOutcome::Saved(out.path().join("Prova.pdf")),
            FetchOutcome::Saved(out.path().join("Prova (1).pdf")),
            FetchOutcome::Saved(out.path().join("Prova (2).pdf")),
        ]
    );
}

#[test]
fn test_noise_only_name_falls_back_to_suggested_name() {
    let mut site = FakeSite::new();
    site.file("/arquivo/1", FakeFile::new("apostila.pdf"));

    let out = TempDir::new().unwrap();
    let settings = settings(1);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Download PDF"), out.path(), &NoopObserver)
        .unwrap();

    assert_eq!(outcome, FetchOutcome::Saved(out.path().join("apostila.pdf")));
}

#[test]
fn test_permission_denied_while_saving_is_fatal() {
    let mut site = FakeSite::new();
    site.file("/arquivo/1", FakeFile::new("a.pdf"));
    site.save_error = Some(io::ErrorKind::PermissionDenied);

    let out = TempDir::new().unwrap();
    let settings = settings(3);
    let result = FileFetcher::new(&settings).fetch(
        &mut site,
        &link("/arquivo/1", "Prova"),
        out.path(),
        &NoopObserver,
    );

    assert!(result.is_err());
    assert_eq!(site.navigations_to("/arquivo/1"), 1, "no retry after a fatal error");
    assert_eq!(site.open_pages(), 0);
}

#[test]
fn test_other_save_errors_are_retried() {
    let mut site = FakeSite::new();
    site.file("/arquivo/1", FakeFile::new("a.pdf"));
    site.save_error = Some(io::ErrorKind::NotFound);

    let out = TempDir::new().unwrap();
    let settings = settings(2);
    let outcome = FileFetcher::new(&settings)
        .fetch(&mut site, &link("/arquivo/1", "Prova"), out.path(), &NoopObserver)
        .unwrap();

    assert!(matches!(
        outcome,
        FetchOutcome::Abandoned {
            attempts: 2,
            last_failure: AttemptFailure::Save(_),
        }
    ));
}
