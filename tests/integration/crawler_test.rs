use drivecrawl::core::crawler::{Crawler, FileStatus, NoopObserver};
use drivecrawl::CrawlSettings;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

use super::fake_site::{url, FakeFile, FakeSite, RecordingObserver};

fn settings() -> CrawlSettings {
    CrawlSettings {
        max_attempts: 3,
        control_poll_attempts: 2,
        ..CrawlSettings::immediate()
    }
}

#[test]
fn test_folders_are_visited_breadth_first() {
    let mut site = FakeSite::new();
    site.folder("/pasta/a", &[("/pasta/b", "Pasta B"), ("/pasta/c", "Pasta C")])
        .folder("/pasta/b", &[("/pasta/d", "Pasta D")])
        .folder("/pasta/c", &[])
        .folder("/pasta/d", &[]);

    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);
    let stats = crawler.run(&mut site, &url("/pasta/a"), out.path()).unwrap();

    assert_eq!(
        site.folder_visits(),
        vec!["/pasta/a", "/pasta/b", "/pasta/c", "/pasta/d"]
    );
    assert_eq!(stats.folders_scanned, 4);
    assert!(!stats.was_cancelled);
}

#[test]
fn test_cycles_and_diamonds_are_scanned_once() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[("/pasta/x", "X"), ("/pasta/y", "Y")])
        .folder("/pasta/x", &[("/pasta/shared", "Shared"), ("/pasta/root", "Voltar")])
        .folder("/pasta/y", &[("/pasta/shared", "Shared"), ("/pasta/x", "X")])
        .folder(
            "/pasta/shared",
            &[
                ("/pasta/root", "Raiz"),
                ("/pasta/shared", "Aqui"),
                ("/arquivo/s", "Comum"),
            ],
        )
        .file("/arquivo/s", FakeFile::new("s.pdf"));

    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);
    let stats = crawler.run(&mut site, &url("/pasta/root"), out.path()).unwrap();

    for folder in ["/pasta/root", "/pasta/x", "/pasta/y", "/pasta/shared"] {
        assert_eq!(site.navigations_to(folder), 1, "{} scanned more than once", folder);
    }
    assert_eq!(stats.folders_scanned, 4);
    assert_eq!(crawler.visited().len(), 4);

    assert_eq!(stats.files_downloaded, 1);

    // The diamond's target lives under the parent that found it first
    assert!(out.path().join("X").join("Shared").join("Comum.pdf").is_file());
    assert!(!out.path().join("Y").exists());
}

#[test]
fn test_end_to_end_naming() {
    let mut site = FakeSite::new();
    site.folder(
        "/pasta/root",
        &[
            ("/pasta/provas", "Pasta Provas 2024"),
            ("/arquivo/1", "Resolva_prova_final.pdf"),
        ],
    )
    .folder("/pasta/provas", &[("/arquivo/2", "Lista 1")])
    .file("/arquivo/1", FakeFile::new("x7f2.pdf"))
    .file("/arquivo/2", FakeFile::new("lista.docx"));

    let out = TempDir::new().unwrap();
    let settings = settings();
    let observer = RecordingObserver::new();
    let mut crawler = Crawler::new(&settings, &observer);
    let stats = crawler.run(&mut site, &url("/pasta/root"), out.path()).unwrap();

    let root_file = out.path().join("prova_final.pdf");
    assert!(root_file.is_file());
    assert_eq!(fs::read(&root_file).unwrap(), b"x7f2.pdf");

    assert!(out.path().join("Provas 2024").is_dir());
    assert!(out.path().join("Provas 2024").join("Lista 1.docx").is_file());

    assert_eq!(stats.files_found, 2);
    assert_eq!(stats.files_downloaded, 2);
    assert_eq!(stats.bytes_downloaded, ("x7f2.pdf".len() + "lista.docx".len()) as u64);
    assert_eq!(
        observer.statuses_for(&url("/arquivo/1")),
        vec![FileStatus::Queued, FileStatus::Downloading(1), FileStatus::Done]
    );
    assert_eq!(site.open_pages(), 0, "every page is closed after the crawl");
}

#[test]
fn test_failed_folder_is_skipped_not_retried() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[("/pasta/bad", "Bad"), ("/pasta/ok", "Ok")])
        .folder("/pasta/bad", &[])
        .folder("/pasta/ok", &[("/arquivo/1", "Resumo")])
        .file("/arquivo/1", FakeFile::new("r.pdf"))
        .fail_navigation("/pasta/bad", 5);

    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);
    let stats = crawler.run(&mut site, &url("/pasta/root"), out.path()).unwrap();

    assert_eq!(site.navigations_to("/pasta/bad"), 1);
    assert_eq!(stats.folders_failed, 1);
    assert_eq!(stats.folders_scanned, 2);
    assert!(out.path().join("Ok").join("Resumo.pdf").is_file());
}

#[test]
fn test_unreachable_root_yields_empty_stats() {
    let mut site = FakeSite::new();

    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);
    let stats = crawler.run(&mut site, &url("/pasta/nowhere"), out.path()).unwrap();

    assert_eq!(stats.folders_failed, 1);
    assert_eq!(stats.files_found, 0);
    assert_eq!(site.open_pages(), 0);
}

#[test]
fn test_invalid_root_url_is_an_error() {
    let mut site = FakeSite::new();
    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);

    assert!(crawler.run(&mut site, "not a url", out.path()).is_err());
    assert!(crawler.run(&mut site, "ftp://drive.test/pasta/x", out.path()).is_err());
    assert!(site.navigations.is_empty());
}

#[test]
fn test_cancel_stops_before_next_file() {
    let mut site = FakeSite::new();
    site.folder(
        "/pasta/root",
        &[
            ("/pasta/sub", "Sub"),
            ("/arquivo/1", "Um"),
            ("/arquivo/2", "Dois"),
            ("/arquivo/3", "Tres"),
        ],
    )
    .folder("/pasta/sub", &[])
    .file("/arquivo/1", FakeFile::new("1.pdf"))
    .file("/arquivo/2", FakeFile::new("2.pdf"))
    .file("/arquivo/3", FakeFile::new("3.pdf"));

    let out = TempDir::new().unwrap();
    let settings = settings();
    let flag = Arc::new(AtomicBool::new(false));
    let observer = RecordingObserver::cancel_after(1, flag.clone());
    let mut crawler = Crawler::new(&settings, &observer).with_cancel_flag(flag);
    let stats = crawler.run(&mut site, &url("/pasta/root"), out.path()).unwrap();

    assert!(stats.was_cancelled);
    assert_eq!(stats.files_downloaded, 1);
    assert_eq!(site.navigations_to("/arquivo/2"), 0);
    assert_eq!(site.navigations_to("/pasta/sub"), 0, "queued folders are not scanned");
    assert!(out.path().join("Um.pdf").is_file());
    assert_eq!(site.open_pages(), 0);
}

#[test]
fn test_cancel_before_start_scans_nothing() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[]);

    let out = TempDir::new().unwrap();
    let settings = settings();
    let mut crawler = Crawler::new(&settings, &NoopObserver);
    crawler.cancel();
    let stats = crawler.run(&mut site, &url("/pasta/root"), out.path()).unwrap();

    assert!(stats.was_cancelled);
    assert!(site.navigations.is_empty());
}

#[test]
fn test_second_run_skips_existing_files() {
    let build = || {
        let mut site = FakeSite::new();
        site.folder("/pasta/root", &[("/arquivo/1", "Resolva_prova_final.pdf")])
            .file("/arquivo/1", FakeFile::new("x7f2.pdf"));
        site
    };

    let out = TempDir::new().unwrap();
    let settings = settings();

    let mut first = build();
    Crawler::new(&settings, &NoopObserver)
        .run(&mut first, &url("/pasta/root"), out.path())
        .unwrap();

    let mut second = build();
    let observer = RecordingObserver::new();
    let stats = Crawler::new(&settings, &observer)
        .run(&mut second, &url("/pasta/root"), out.path())
        .unwrap();

    assert_eq!(stats.files_present, 1);
    assert_eq!(stats.files_downloaded, 0);
    assert_eq!(second.navigations_to("/arquivo/1"), 0);
    assert_eq!(
        observer.statuses_for(&url("/arquivo/1")),
        vec![FileStatus::Queued, FileStatus::Present]
    );
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn test_same_cleaned_name_in_one_run_is_downloaded_twice() {
    let mut site = FakeSite::new();
    site.folder(
        "/pasta/root",
        &[("/arquivo/1", "Resolva_prova.pdf"), ("/arquivo/2", "Download prova.pdf")],
    )
    .file("/arquivo/1", FakeFile::new("a1.pdf"))
    .file("/arquivo/2", FakeFile::new("b2.pdf"));

    let out = TempDir::new().unwrap();
    let settings = CrawlSettings::immediate();
    assert!(settings.skip_existing);
    let stats = Crawler::new(&settings, &NoopObserver)
        .run(&mut site, &url("/pasta/root"), out.path())
        .unwrap();

    assert_eq!(stats.files_downloaded, 2);
    assert_eq!(stats.files_present, 0);
    assert_eq!(site.navigations_to("/arquivo/2"), 1);
    assert_eq!(fs::read(out.path().join("prova.pdf")).unwrap(), b"a1.pdf");
    assert_eq!(fs::read(out.path().join("prova (1).pdf")).unwrap(), b"b2.pdf");
}

#[test]
fn test_discovered_files_carry_their_local_dir() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[("/pasta/sub", "Pasta Sub")])
        .folder("/pasta/sub", &[("/arquivo/9", "Nove")])
        .file("/arquivo/9", FakeFile::new("9.txt"));

    let out = TempDir::new().unwrap();
    let settings = settings();
    let observer = RecordingObserver::new();
    Crawler::new(&settings, &observer)
        .run(&mut site, &url("/pasta/root"), out.path())
        .unwrap();

    let discovered = observer.discovered.borrow();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].1, "Nove");
    assert_eq!(discovered[0].2, out.path().join("Sub"));
}
