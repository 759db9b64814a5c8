//! Single-account scans against an in-memory cloud.

use asset_counter::classify::BillingRules;
use asset_counter::display::Progress;
use asset_counter::models::{Region, ScanOutcome, ServerlessPolicy, TruncatedListing};
use asset_counter::AssetScanner;
use std::sync::Arc;

mod common;
use common::{database, function, instance, node, FakeAccount, FakeCloud, FakeRegion, FakeWorld, CALLER};

fn scanner(policy: ServerlessPolicy) -> AssetScanner {
    AssetScanner::new(
        BillingRules::default(),
        Region::new("eu-west-1"),
        policy,
        Progress::silent(),
    )
}

fn single_account_world() -> Arc<FakeWorld> {
    let west = FakeRegion {
        instances: vec![
            instance("m5.large"),
            instance("t3.nano"),
            instance("t3.nanox"),
            instance("t2.micro"),
            node("t3.micro"),
            node("m5.xlarge"),
        ],
        databases: vec![database("db.r5.large"), database("db.t3.micro")],
        functions: vec![
            function("api", None),
            function("worker", Some("platform-team")),
            function("cg-proxy", Some("Cloudguard Serverless Security")),
        ],
        function_count: 3,
        ..Default::default()
    };
    let east = FakeRegion {
        instances: vec![instance("c6i.2xlarge")],
        databases: vec![database("db.m6g.large")],
        functions: vec![function("ingest", None)],
        function_count: 118,
        ..Default::default()
    };

    Arc::new(
        FakeWorld::new(&["eu-west-1", "us-east-1"]).with_account(
            CALLER,
            FakeAccount::default()
                .with_region("eu-west-1", west)
                .with_region("us-east-1", east),
        ),
    )
}

#[tokio::test]
async fn test_compute_categories_partition_all_instances() -> anyhow::Result<()> {
    let api = FakeCloud::ambient(single_account_world());
    let tally = scanner(ServerlessPolicy::Direct)
        .count_compute(&api, &Region::new("eu-west-1"))
        .await?;

    assert_eq!(tally.billable, 1);
    assert_eq!(tally.excluded, 3);
    assert_eq!(tally.nodes, 2);
    assert_eq!(tally.observed(), 6);
    Ok(())
}

#[tokio::test]
async fn test_single_account_direct_mode() -> anyhow::Result<()> {
    let api = FakeCloud::ambient(single_account_world());
    let result = scanner(ServerlessPolicy::Direct)
        .run_single_account(&api)
        .await?;

    assert_eq!(result.counts.compute, 2);
    assert_eq!(result.counts.database, 2);
    assert_eq!(result.counts.orchestration_nodes, 2);
    // the platform-owned function is skipped
    assert_eq!(result.counts.serverless_raw, 3);
    assert_eq!(result.serverless_units, 1);
    assert_eq!(result.weighted_nodes, 6);
    assert_eq!(result.grand_total, 2 + 2 + 6 + 1);
    assert!(matches!(result.outcome, ScanOutcome::Complete));
    Ok(())
}

#[tokio::test]
async fn test_single_account_usage_mode() -> anyhow::Result<()> {
    let api = FakeCloud::ambient(single_account_world());
    let result = scanner(ServerlessPolicy::Usage)
        .run_single_account(&api)
        .await?;

    // metric counts every function, tags are not inspected: 3 + 118
    assert_eq!(result.counts.serverless_raw, 121);
    assert_eq!(result.counts.serverless_units, 3);
    assert_eq!(result.serverless_units, 3);
    assert_eq!(result.grand_total, 2 + 2 + 6 + 3);
    Ok(())
}

#[tokio::test]
async fn test_region_enumeration_failure_aborts_run() {
    let mut world = FakeWorld::new(&["eu-west-1"]);
    world.fail_region_listing = true;
    let api = FakeCloud::ambient(Arc::new(world));

    let err = scanner(ServerlessPolicy::Direct)
        .run_single_account(&api)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to enumerate regions"));
}

#[tokio::test]
async fn test_failing_region_aborts_account() {
    let world = FakeWorld::new(&["eu-west-1", "us-east-1"]).with_account(
        CALLER,
        FakeAccount::default()
            .with_region(
                "eu-west-1",
                FakeRegion {
                    instances: vec![instance("m5.large")],
                    ..Default::default()
                },
            )
            .with_region(
                "us-east-1",
                FakeRegion {
                    fail: true,
                    ..Default::default()
                },
            ),
    );
    let api = FakeCloud::ambient(Arc::new(world));

    let err = scanner(ServerlessPolicy::Direct)
        .run_single_account(&api)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("RequestLimitExceeded"));
}

#[tokio::test]
async fn test_truncated_listing_still_counts_what_was_seen() -> anyhow::Result<()> {
    let world = FakeWorld::new(&["eu-west-1"]).with_account(
        CALLER,
        FakeAccount::default().with_region(
            "eu-west-1",
            FakeRegion {
                instances: vec![instance("m5.large"), instance("m5.large")],
                truncated: true,
                ..Default::default()
            },
        ),
    );
    let api = FakeCloud::ambient(Arc::new(world));

    let (progress, lines) = Progress::capture();
    let scanner = AssetScanner::new(
        BillingRules::default(),
        Region::new("eu-west-1"),
        ServerlessPolicy::Direct,
        progress,
    );

    let result = scanner.run_single_account(&api).await?;
    assert_eq!(result.counts.compute, 2);
    assert_eq!(
        result.truncated_listings,
        vec![TruncatedListing {
            listing: "EC2 instance".to_string(),
            account_id: None,
            region: Some(Region::new("eu-west-1")),
        }]
    );

    let lines = lines.lock().unwrap();
    assert!(lines
        .iter()
        .any(|l| l.contains("[WARNING]") && l.contains("EC2 instance listing in eu-west-1 was truncated")));
    Ok(())
}

#[tokio::test]
async fn test_complete_listings_report_no_truncation() -> anyhow::Result<()> {
    let api = FakeCloud::ambient(single_account_world());
    let result = scanner(ServerlessPolicy::Direct)
        .run_single_account(&api)
        .await?;
    assert!(result.truncated_listings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_account() -> anyhow::Result<()> {
    let api = FakeCloud::ambient(Arc::new(FakeWorld::new(&["eu-west-1", "eu-north-1"])));
    let result = scanner(ServerlessPolicy::Direct)
        .run_single_account(&api)
        .await?;
    assert_eq!(result.grand_total, 0);
    Ok(())
}
