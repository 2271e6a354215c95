// tests/build_tree.rs

//! Full builds of the built-in pipeline against a scratch project on disk.

use std::error::Error;
use std::sync::Arc;

use sitepipe::config::{ConfigFile, TransformConfig};
use sitepipe::errors::BuildError;
use sitepipe::fs::RealFileSystem;
use sitepipe::graph::{BuildSummary, Engine, Pipeline};
use sitepipe_test_utils::fixtures::{builtin_with_cat_styles, SiteFixture};
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn build(site: &SiteFixture, cfg: &ConfigFile) -> Result<BuildSummary, BuildError> {
    let pipeline = Pipeline::from_config(cfg).expect("pipeline");
    let target = pipeline.target("build").expect("build graph");
    let engine = Engine::new(Arc::new(RealFileSystem), site.source(), site.output());
    with_timeout(engine.run(&target)).await
}

#[tokio::test]
async fn build_produces_the_expected_tree() -> TestResult {
    init_tracing();
    let site = SiteFixture::standard();

    build(&site, &builtin_with_cat_styles()).await?;

    let files: Vec<String> = site.output_tree().into_iter().map(|(rel, _)| rel).collect();
    for expected in [
        "about.html",
        "css/style.min.css",
        "css/style.min.css.map",
        "favicon.ico",
        "fonts/body.woff2",
        "img/logo.svg",
        "img/sprite.svg",
        "index.html",
        "js/scripts.js",
    ] {
        assert!(files.contains(&expected.to_string()), "missing {expected} in {files:?}");
    }
    // Icons only go into the sprite.
    assert!(!files.iter().any(|f| f.starts_with("img/icons/")));

    let css = String::from_utf8(site.read_output("css/style.min.css").unwrap())?;
    assert!(css.starts_with("body{"), "unexpected css: {css}");
    assert!(css.contains("sourceMappingURL=style.min.css.map"));

    let sprite = String::from_utf8(site.read_output("img/sprite.svg").unwrap())?;
    assert!(sprite.contains(r#"<symbol id="arrow""#));
    assert!(sprite.contains(r#"<symbol id="close""#));

    let logo = String::from_utf8(site.read_output("img/logo.svg").unwrap())?;
    assert!(!logo.contains("<!--"));
    Ok(())
}

#[tokio::test]
async fn two_builds_give_identical_trees() -> TestResult {
    init_tracing();
    let site = SiteFixture::standard();
    let cfg = builtin_with_cat_styles();

    build(&site, &cfg).await?;
    let first = site.output_tree();
    build(&site, &cfg).await?;
    let second = site.output_tree();

    assert!(!first.is_empty());
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn files_not_produced_by_any_task_are_removed() -> TestResult {
    init_tracing();
    let site = SiteFixture::standard();
    site.write_output("leftover.txt", "stale");
    site.write_output("css/old.css", "a{}");

    build(&site, &builtin_with_cat_styles()).await?;

    assert!(site.read_output("leftover.txt").is_none());
    assert!(site.read_output("css/old.css").is_none());
    assert!(site.read_output("index.html").is_some());
    Ok(())
}

#[tokio::test]
async fn failing_style_compile_fails_the_build_without_a_stylesheet() -> TestResult {
    init_tracing();
    let site = SiteFixture::standard();
    let mut cfg = builtin_with_cat_styles();

    build(&site, &cfg).await?;
    assert!(site.read_output("css/style.min.css").is_some());

    cfg.task.get_mut("styles").expect("styles task").transforms = vec![TransformConfig::StyleCompile {
        compiler: "echo 'ParseError: missing }' >&2; exit 1 # {input}".to_string(),
        targets: "defaults".to_string(),
        minify: true,
        rename: Some("style.min.css".to_string()),
        source_map: true,
    }];

    let err = build(&site, &cfg).await.unwrap_err();

    assert_eq!(err.failed_tasks(), vec!["styles"]);
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("ParseError"));
    assert!(site.read_output("css/style.min.css").is_none());
    // Siblings of the failed task still ran.
    assert!(site.read_output("js/scripts.js").is_some());
    Ok(())
}

#[tokio::test]
async fn missing_style_entry_is_a_filesystem_failure() -> TestResult {
    init_tracing();
    let site = SiteFixture::standard();
    site.remove_source("less/style.less");

    let err = build(&site, &builtin_with_cat_styles()).await.unwrap_err();

    assert_eq!(err.failed_tasks(), vec!["styles"]);
    assert!(site.read_output("index.html").is_some());
    Ok(())
}
