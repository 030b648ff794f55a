use inspection_choropleth::analyzers::color::Fill;
use inspection_choropleth::config::AppConfig;
use inspection_choropleth::fetch::BasicClient;
use inspection_choropleth::output;
use inspection_choropleth::pipeline;
use inspection_choropleth::present::ChoroplethMap;
use inspection_choropleth::regions::RegionId;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn neighborhoods_config() -> AppConfig {
    let mut config = AppConfig::neighborhoods();
    config.sources.regions = fixture("neighborhoods.json");
    config.sources.inspections = fixture("inspections.json");
    config
}

fn zip_codes_config() -> AppConfig {
    let mut config = AppConfig::zip_codes();
    config.sources.regions = fixture("zip_codes.json");
    config.sources.inspections = fixture("inspections.json");
    config
}

async fn run(config: &AppConfig) -> ChoroplethMap {
    pipeline::run(config, &BasicClient::new()).await.unwrap()
}

fn region<'a>(map: &'a ChoroplethMap, name: &str) -> &'a inspection_choropleth::present::RenderedRegion {
    map.regions
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("region {name} missing"))
}

#[tokio::test]
async fn test_neighborhood_averages() {
    let map = run(&neighborhoods_config()).await;

    // Treasure Island has no geometry and is skipped
    assert_eq!(map.regions.len(), 3);

    let mission = region(&map, "Mission");
    assert_eq!(mission.summary.average, Some(80.0));
    assert_eq!(mission.summary.business_count, 3);
    assert!(mission.popup.contains("Average Inspection Score: 80"));

    let castro = region(&map, "Castro/Upper Market");
    // 85, 91, 96 -> 90.67
    assert_eq!(castro.summary.average, Some(91.0));
    assert_eq!(castro.summary.business_count, 3);
    assert_eq!(castro.summary.highest.as_ref().unwrap().business_name, "Sliders");
    assert_eq!(castro.summary.lowest.as_ref().unwrap().score, 85.0);
    assert_eq!(castro.summary.businesses, vec!["Castro Deli", "Castro Deli", "Sliders"]);

    let presidio = region(&map, "Presidio");
    assert_eq!(presidio.summary.average, None);
    assert_eq!(presidio.fill, Fill::NoData);
    assert_eq!(presidio.fill_color, "#808080");
    assert!(presidio.popup.contains("No data"));
}

#[tokio::test]
async fn test_neighborhood_quantile_colors() {
    let map = run(&neighborhoods_config()).await;

    assert_eq!(region(&map, "Mission").fill, Fill::Bucket(0));
    assert_eq!(region(&map, "Mission").fill_color, "#440154");
    assert_eq!(region(&map, "Castro/Upper Market").fill, Fill::Bucket(3));
    assert_eq!(region(&map, "Castro/Upper Market").fill_color, "#ffff00");

    let labels: Vec<_> = map.legend.entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels.first(), Some(&"80"));
    assert_eq!(labels.last(), Some(&"No data"));
    assert_eq!(map.legend.subtitle, "(by neighborhood)");
}

#[tokio::test]
async fn test_containment_join_counts() {
    let map = run(&neighborhoods_config()).await;
    let stats = &map.stats;

    assert_eq!(stats.inspections_fetched, 12);
    assert_eq!(stats.inspections_kept, 9);
    assert_eq!(stats.missing_score, 1);
    assert_eq!(stats.invalid_score, 1);
    assert_eq!(stats.missing_location, 1);
    assert_eq!(stats.duplicates, 0);

    // Boundary Cafe sits on the Mission/Castro edge, Nowhere Diner is outside every region
    assert_eq!(stats.attributed, 6);
    assert_eq!(stats.unmatched, 2);
    // Postal Only has no coordinate to test
    assert_eq!(stats.missing_key, 1);
    assert_eq!(stats.unique_businesses, 5);
    assert_eq!(stats.regions_with_data, 2);
}

#[tokio::test]
async fn test_zip_code_thresholds() {
    let map = run(&zip_codes_config()).await;

    assert_eq!(map.regions.len(), 3);
    assert_eq!(map.stats.duplicates, 1);
    assert_eq!(map.stats.unmatched, 2);

    // 70, 80, 90, 100
    let mission = region(&map, "94110");
    assert_eq!(mission.summary.average, Some(85.0));
    assert_eq!(mission.fill_color, "#ffff00");
    assert!(!mission.popup.contains("Business Count"));

    // first Castro Deli visit only: 85, 96
    let castro = region(&map, "94114");
    assert_eq!(castro.summary.average, Some(91.0));
    assert_eq!(castro.summary.business_count, 2);
    assert_eq!(castro.fill_color, "#008000");

    let presidio = region(&map, "94129");
    assert_eq!(presidio.fill, Fill::NoData);
    assert_eq!(presidio.fill_color, "#808080");
    assert_eq!(map.legend.subtitle, "(by zip code)");
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let config = neighborhoods_config();
    let first = run(&config).await;
    let second = run(&config).await;

    assert_eq!(first.averages(), second.averages());
    assert_eq!(first.fills(), second.fills());
    assert_eq!(first.legend, second.legend);
}

#[tokio::test]
async fn test_sequential_fetch_matches_concurrent() {
    let concurrent = run(&zip_codes_config()).await;

    let mut config = zip_codes_config();
    config.fetch.sequential = true;
    let sequential = run(&config).await;

    assert_eq!(concurrent.averages(), sequential.averages());
    assert_eq!(concurrent.fills(), sequential.fills());
}

#[tokio::test]
async fn test_missing_region_source_fails() {
    let mut config = neighborhoods_config();
    config.sources.regions = fixture("does_not_exist.json");

    let result = pipeline::run(&config, &BasicClient::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_region_ids_follow_load_order() {
    let map = run(&neighborhoods_config()).await;
    let ids: Vec<RegionId> = map.averages().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![RegionId(0), RegionId(1), RegionId(2)]);
}

#[test]
fn test_load_config_from_toml() {
    let config = AppConfig::load_from_file(Path::new(&fixture("zip_codes.toml"))).unwrap();

    assert_eq!(config.regions.kind, inspection_choropleth::config::RegionKind::ZipCode);
    assert!(config.fetch.sequential);
    assert!(!config.presentation.detailed_popup);
    assert_eq!(config.output.dir, PathBuf::from("output/zip_codes"));
}

#[tokio::test]
async fn test_render_writes_outputs() {
    let config = zip_codes_config();
    let map = run(&config).await;

    let dir = std::env::temp_dir().join("inspection_choropleth_integration_outputs");
    let _ = std::fs::remove_dir_all(&dir);

    let paths = output::write_outputs(&dir, &map, &config.presentation).unwrap();
    let page = std::fs::read_to_string(&paths.page).unwrap();
    assert!(page.contains("94114"));
    assert!(page.contains("L.geoJSON"));

    let csv = std::fs::read_to_string(&paths.csv).unwrap();
    assert_eq!(csv.lines().count(), 4);

    std::fs::remove_dir_all(&dir).unwrap();
}
