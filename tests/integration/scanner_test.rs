use drivecrawl::core::browser::PageDriver;
use drivecrawl::core::crawler::{FolderScanner, NoopObserver};
use drivecrawl::CrawlSettings;

use super::fake_site::{url, FakeSite, RecordingObserver};

#[test]
fn test_scan_classifies_and_dedups_links() {
    let mut site = FakeSite::new();
    site.folder(
        "/pasta/root",
        &[
            ("/pasta/a", "Pasta A"),
            ("/arquivo/1", "Prova 1"),
            ("/arquivo/1#top", "Prova 1 (de novo)"),
            ("https://drive.test/pdf/2", "Lista"),
            ("/docs/guia.html", "Guia"),
            ("https://elsewhere.test/arquivo/9", "Externo"),
            ("/sobre", "Sobre"),
            ("#", "Topo"),
            ("mailto:contato@drive.test", "Contato"),
        ],
    );

    let settings = CrawlSettings::immediate();
    let page = site.open_page().unwrap();
    let result = FolderScanner::new(&settings).scan(&mut site, &page, &url("/pasta/root"), &NoopObserver);

    assert!(!result.is_failed());
    let folders: Vec<_> = result.subfolders.iter().map(|l| l.url.as_str()).collect();
    let files: Vec<_> = result.files.iter().map(|l| l.url.as_str()).collect();

    assert_eq!(folders, vec![url("/pasta/a").as_str()]);
    assert_eq!(
        files,
        vec![
            url("/arquivo/1").as_str(),
            url("/pdf/2").as_str(),
            url("/docs/guia.html").as_str(),
        ]
    );
    assert_eq!(result.files[0].display_name, "Prova 1");
}

#[test]
fn test_empty_text_falls_back_to_title() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[])
        .titled_link("/pasta/root", "/arquivo/7", "Resumo de física");

    let settings = CrawlSettings::immediate();
    let page = site.open_page().unwrap();
    let result = FolderScanner::new(&settings).scan(&mut site, &page, &url("/pasta/root"), &NoopObserver);

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].display_name, "Resumo de física");
}

#[test]
fn test_navigation_failure_gives_empty_result() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[("/arquivo/1", "Prova")])
        .fail_navigation("/pasta/root", 1);

    let settings = CrawlSettings::immediate();
    let observer = RecordingObserver::new();
    let page = site.open_page().unwrap();
    let result = FolderScanner::new(&settings).scan(&mut site, &page, &url("/pasta/root"), &observer);

    assert!(result.is_failed());
    assert!(result.files.is_empty());
    assert!(result.subfolders.is_empty());
    assert!(observer.lines.borrow().iter().any(|l| l.contains("/pasta/root")));
}

#[test]
fn test_settle_stops_once_height_is_stable() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[]);

    let settings = CrawlSettings::immediate();
    let page = site.open_page().unwrap();
    let rounds = FolderScanner::new(&settings).settle(&mut site, &page);

    // First round records the height, the second sees it unchanged
    assert_eq!(rounds, 2);
}

#[test]
fn test_settle_keeps_scrolling_while_page_grows() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[])
        .scroll_heights(&[800, 1600, 2400, 2400]);

    let settings = CrawlSettings::immediate();
    let page = site.open_page().unwrap();
    let rounds = FolderScanner::new(&settings).settle(&mut site, &page);

    assert_eq!(rounds, 4);
    assert_eq!(site.height_reads, 4);
}

#[test]
fn test_settle_gives_up_after_max_rounds() {
    let heights: Vec<i64> = (1..=50).map(|n| n * 500).collect();
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[]).scroll_heights(&heights);

    let settings = CrawlSettings {
        settle_max_rounds: 5,
        ..CrawlSettings::immediate()
    };
    let page = site.open_page().unwrap();
    let rounds = FolderScanner::new(&settings).settle(&mut site, &page);

    assert_eq!(rounds, 5);
    assert_eq!(site.height_reads, 5);
}

#[test]
fn test_settle_needs_height_stable_for_the_whole_window() {
    let mut site = FakeSite::new();
    site.folder("/pasta/root", &[]);

    // Stable height, but never for a full minute
    let settings = CrawlSettings {
        settle_stable_ms: 60_000,
        settle_max_rounds: 6,
        ..CrawlSettings::immediate()
    };
    let page = site.open_page().unwrap();
    let rounds = FolderScanner::new(&settings).settle(&mut site, &page);

    assert_eq!(rounds, 6);
}

#[test]
fn test_custom_prefixes() {
    let mut site = FakeSite::new();
    site.folder(
        "/pasta/root",
        &[("/folder/a", "A"), ("/file/b", "B"), ("/arquivo/c", "C")],
    );

    let settings = CrawlSettings {
        folder_prefixes: vec!["/folder/".to_string()],
        file_prefixes: vec!["/file/".to_string()],
        ..CrawlSettings::immediate()
    };
    let page = site.open_page().unwrap();
    let result = FolderScanner::new(&settings).scan(&mut site, &page, &url("/pasta/root"), &NoopObserver);

    assert_eq!(result.subfolders.len(), 1);
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].url, url("/file/b"));
}
