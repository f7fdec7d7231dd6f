use std::cell::RefCell;
use std::fs;

use village_dash::chat::{ChatAssistant, ChatRequest, CompletionClient, CompletionRequest};
use village_dash::config::{builtin_domain, DomainConfig};
use village_dash::dashboard::{LoadStatus, PageView, ViewSettings, ViewState};
use village_dash::errors::ChatError;
use village_dash::loader::CsvDirStore;
use village_dash::types::{GroupingLevel, Record};

const HEADER: &str = "nama_kabupaten,nama_kecamatan,nama_desa,cluster,label_cluster,latitude,longitude,skor_kesehatan,jumlah_faskes,jumlah_tenaga_kesehatan,jumlah_posyandu";

fn write_health_table(dir: &std::path::Path) {
    let mut lines = vec![HEADER.to_string()];
    let regencies = [("Bogor", ["Cibinong", "Ciawi"]), ("Garut", ["Tarogong", "Leles"])];
    let mut n = 0;
    for (regency, districts) in regencies {
        for district in districts {
            for v in 0..6 {
                n += 1;
                let cluster = n % 3;
                let label = ["Low", "Medium", "High"][cluster];
                // every fifth village has no score and no coordinates
                let (score, lat, lon) = if n % 5 == 0 {
                    (String::new(), String::new(), String::new())
                } else {
                    (
                        format!("{}", (n * 13) % 100),
                        format!("{:.3}", -6.5 - n as f64 / 100.0),
                        format!("{:.3}", 106.8 + n as f64 / 100.0),
                    )
                };
                lines.push(format!(
                    "{regency},{district},Desa {district} {v},{cluster},{label},{lat},{lon},{score},{},{},{}",
                    n % 4,
                    n % 9,
                    n % 2
                ));
            }
        }
    }
    fs::write(dir.join("cluster_kesehatan.csv"), lines.join("\n")).unwrap();
}

fn settings() -> ViewSettings {
    ViewSettings {
        province: "Jawa Barat".to_string(),
        max_markers: 10,
        min_per_cluster: 2,
        table_page_size: 5,
        top_k: 3,
    }
}

fn loaded_page() -> (tempfile::TempDir, PageView) {
    let dir = tempfile::tempdir().unwrap();
    write_health_table(dir.path());
    let store = CsvDirStore::new(dir.path());
    let domain = builtin_domain("health").unwrap().clone();
    let mut page = PageView::new(domain, settings());
    let report = page.load(&store, 7);
    assert_eq!(report.total_rows, 24);
    assert_eq!(report.pages, 4);
    (dir, page)
}

#[test]
fn csv_backed_page_drills_down() {
    let (_dir, mut page) = loaded_page();
    assert_eq!(page.status(), &LoadStatus::Ready);
    assert_eq!(page.filter().region_options(), ["Bogor", "Garut"]);

    let view = page.view();
    assert_eq!(view.state, ViewState::Ready);
    assert_eq!(view.level, GroupingLevel::Region);
    assert_eq!(view.series.len(), 4);
    assert!(view.markers.len() <= 10);
    let summary = view.summary.as_ref().unwrap();
    assert_eq!(summary.region_label, "Province Jawa Barat");
    assert_eq!(summary.village_count, 24);
    assert!(summary.global_insights.is_some());

    let view = page.set_region("Garut");
    assert_eq!(view.level, GroupingLevel::Subregion);
    assert_eq!(view.series[0].points.len(), 2);
    assert_eq!(page.filter().subregion_options(), ["Leles", "Tarogong"]);

    let view = page.set_subregion("Leles");
    assert_eq!(view.level, GroupingLevel::Locality);
    assert_eq!(view.ranking.as_ref().unwrap().top.len(), 3);
    assert_eq!(view.summary.as_ref().unwrap().village_count, 6);

    let view = page.set_locality("Desa Leles 2");
    assert_eq!(view.summary.as_ref().unwrap().village_count, 1);

    let view = page.reset();
    assert_eq!(view.summary.as_ref().unwrap().village_count, 24);
}

#[test]
fn unmatched_filter_is_no_data() {
    let (_dir, mut page) = loaded_page();
    let view = page.set_region("Depok");
    assert_eq!(view.state, ViewState::NoData);
    assert_eq!(view.summary.as_ref().unwrap().village_count, 0);
}

#[test]
fn detail_table_pages_follow_the_filter() {
    let (_dir, mut page) = loaded_page();
    let first = page.table_page(1);
    assert_eq!((first.items.len(), first.total_pages), (5, 5));
    page.set_region("Bogor");
    let last = page.table_page(3);
    assert_eq!((last.page, last.total_pages, last.items.len()), (3, 3, 2));
    assert!(last.items.iter().all(|r| r.region == "Bogor"));
}

#[test]
fn missing_csv_table_is_an_error_view() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvDirStore::new(dir.path());
    let domain = DomainConfig::new("x", "absent", "X").priority_metric("m", "M");
    let mut page = PageView::new(domain, settings());
    page.load(&store, 100);
    assert!(matches!(page.view().state, ViewState::Error(_)));
    assert!(page.view().summary.is_none());
}

struct Echo {
    prompts: RefCell<Vec<String>>,
}

impl CompletionClient for Echo {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ChatError> {
        let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.borrow_mut().push(last);
        Ok("ok".to_string())
    }
}

#[test]
fn assistant_is_grounded_on_the_current_view() {
    let (_dir, mut page) = loaded_page();
    let client = Echo {
        prompts: RefCell::new(Vec::new()),
    };
    let mut assistant = ChatAssistant::new(client, "model", "system", 20);

    page.set_region("Bogor");
    assistant.publish(page.config(), page.view().summary.as_ref());
    assert!(assistant.context("health").unwrap().contains("Regency Bogor"));

    let request = ChatRequest {
        prompt: "Which district is weakest?".to_string(),
        send_history: false,
    };
    let answer = assistant.ask("user-1", "health", &request).unwrap();
    assert_eq!(answer.response, "ok");
    assert_eq!(assistant.history("user-1").len(), 2);
    assert!(assistant.history("user-2").is_empty());

    assistant.publish(page.config(), None);
    assert!(assistant.context("health").is_none());
}

#[test]
fn markers_keep_cluster_minimum_when_some_villages_lack_coordinates() {
    let mut records = Vec::new();
    for i in 0..10 {
        let lat = -6.0 - i as f64 * 0.01;
        records.push(
            Record::new("Bogor", "Cibinong", &format!("a{i}"))
                .with_cluster(0, "A")
                .with_metric("skor", 50.0)
                .with_position(lat, 106.8),
        );
        let b = Record::new("Bogor", "Cibinong", &format!("b{i}"))
            .with_cluster(1, "B")
            .with_metric("skor", 40.0);
        records.push(if i % 5 == 0 { b } else { b.with_position(lat, 107.0) });
    }
    let domain = DomainConfig::new("health", "t", "Health").priority_metric("skor", "Skor");
    let view_settings = ViewSettings {
        max_markers: 4,
        min_per_cluster: 2,
        ..settings()
    };
    let page = PageView::with_records(domain, view_settings, records);

    let markers = &page.view().markers;
    assert_eq!(markers.len(), 4);
    for cluster in [0, 1] {
        let n = markers.iter().filter(|m| m.cluster_id == cluster).count();
        assert_eq!(n, 2, "cluster {cluster}");
    }
    assert!(markers.iter().all(|m| m.locality != "b0" && m.locality != "b5"));
}

#[test]
fn blank_command_line_levels_do_not_panic() {
    let (_dir, mut page) = loaded_page();

    let view = page.select_path(Some("  "), Some("Cibinong"), None);
    assert_eq!(view.level, GroupingLevel::Region);
    assert!(page.filter().selection().is_empty());

    let view = page.select_path(Some("Bogor"), Some(""), Some("Desa Cibinong 1"));
    assert_eq!(view.level, GroupingLevel::Subregion);
    assert!(page.filter().selection().locality.is_none());

    let view = page.select_path(Some("Bogor"), Some("Cibinong"), Some("Desa Cibinong 1"));
    assert_eq!(view.summary.as_ref().unwrap().village_count, 1);
}
