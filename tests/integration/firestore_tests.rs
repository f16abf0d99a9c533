//! Firestore integration tests.

/// Test Firestore connection.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_firestore_connection() {
    dotenvy::dotenv().ok();

    let client = vms_firestore::FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");

    // Health check document read should return NotFound, which is OK.
    let result = client.get_document("_health", "_check").await;
    match result {
        Ok(None) => println!("Health check document not found (expected)"),
        Ok(Some(_)) => println!("Health check document exists"),
        Err(e) => panic!("Unexpected error: {}", e),
    }
}

/// Test video repository CRUD, listing, and status-transition operations.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_video_repository() {
    use vms_firestore::{VideoListFilter, VideoRepository};
    use vms_models::{OrganizationId, UserId, Video, VideoId, VideoStatus, Visibility};

    dotenvy::dotenv().ok();

    let client = vms_firestore::FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");
    let repo = VideoRepository::new(client);

    let organization_id = OrganizationId::from("test-org-integration".to_string());
    let owner_id = UserId::from("test-user-integration".to_string());

    let videos: Vec<Video> = (0..3)
        .map(|i| {
            Video::new_uploaded(
                format!("Integration Test Video {i}"),
                "uploaded by the integration suite".to_string(),
                "sample.mp4".to_string(),
                format!("videos/{organization_id}/sample-{i}.mp4"),
                1_000_000,
                "mp4".to_string(),
                organization_id.clone(),
                owner_id.clone(),
                Visibility::Organization,
            )
        })
        .collect();

    for video in &videos {
        repo.create(video).await.expect("Failed to create video");
        println!("Created video: {}", video.id);
    }

    // Read one back.
    let fetched = repo.get(&videos[0].id).await.expect("Failed to get video");
    assert!(fetched.is_some());

    // Tenant-scoped listing picks up everything just created.
    let filter = VideoListFilter {
        status: None,
        sensitivity_status: None,
        search: None,
        sort_by: None,
        descending: true,
        page: 1,
        limit: 20,
    };
    let (listed, total) = repo
        .list_for_tenant(&organization_id, &filter)
        .await
        .expect("Failed to list_for_tenant");
    assert!(total >= videos.len() as u32);
    assert!(listed.iter().any(|v| v.id == videos[0].id));

    // Progress and completion transitions.
    repo.update_progress(&videos[0].id, VideoStatus::Processing, 40)
        .await
        .expect("Failed to update_progress");
    repo.mark_completed(&videos[0].id)
        .await
        .expect("Failed to mark_completed");

    let updated = repo
        .get(&videos[0].id)
        .await
        .expect("Failed to get video")
        .expect("video should still exist");
    assert_eq!(updated.status, VideoStatus::Completed);
    assert_eq!(updated.processing_progress, 100);

    // Cleanup.
    for video in &videos {
        repo.delete(&video.id).await.expect("Failed to delete video");
        println!("Deleted video: {}", video.id);
    }
}

/// Test organization and user repository operations, including the
/// one-slot refresh-token compare-and-swap.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_organization_and_user_repository() {
    use vms_firestore::{OrganizationRepository, UserRepository};
    use vms_models::{Organization, Role, User};

    dotenvy::dotenv().ok();

    let client = vms_firestore::FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");
    let org_repo = OrganizationRepository::new(client.clone());
    let user_repo = UserRepository::new(client);

    let organization = Organization::new("Integration Test Org");
    org_repo
        .create(&organization)
        .await
        .expect("Failed to create organization");

    let user = User::new(
        "integration-test@example.com",
        "not-a-real-hash",
        "Integration Tester",
        Role::Admin,
        organization.id.clone(),
    );
    user_repo.create(&user).await.expect("Failed to create user");

    org_repo
        .set_owner(&organization.id, &user.id)
        .await
        .expect("Failed to set_owner");

    let fetched = org_repo
        .get(&organization.id)
        .await
        .expect("Failed to get organization")
        .expect("organization should exist");
    assert_eq!(fetched.owner_id.as_deref(), Some(user.id.as_str()));

    // First refresh-token swap always succeeds against an empty slot.
    user_repo
        .swap_refresh_token(&user.id, None, "token-a")
        .await
        .expect("Failed to swap refresh token");

    // A swap presenting the wrong current token must fail, proving replay
    // of a stale refresh token is rejected.
    let replay = user_repo
        .swap_refresh_token(&user.id, Some("token-a-stale"), "token-b")
        .await;
    assert!(replay.is_err());
}
